use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::enrichment::ExplanationSource;
use crate::models::{Dish, MenuSection, OwnerKind, QuotaUsage, ScanResult, Tier};

fn default_language() -> String {
    "en".to_string()
}

fn default_owner_kind() -> OwnerKind {
    OwnerKind::Session
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ScanMenuRequest {
    #[validate(length(min = 1, message = "image payload is required"))]
    pub image: String,
    #[serde(default = "default_language")]
    #[validate(length(min = 2, max = 16))]
    pub target_language: String,
    #[validate(length(min = 1, max = 255, message = "owner id is required"))]
    pub owner_id: String,
    #[serde(default = "default_owner_kind")]
    pub owner_kind: OwnerKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DishResponse {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub dietary_tags: Vec<String>,
    pub confidence: f32,
}

impl From<Dish> for DishResponse {
    fn from(dish: Dish) -> Self {
        Self {
            name: dish.name,
            description: dish.original_description,
            price: dish.price,
            explanation: dish.explanation,
            dietary_tags: dish.dietary_tags.into_iter().collect(),
            confidence: dish.confidence,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionResponse {
    pub name: String,
    pub dishes: Vec<DishResponse>,
}

impl From<MenuSection> for SectionResponse {
    fn from(section: MenuSection) -> Self {
        Self {
            name: section.name,
            dishes: section.dishes.into_iter().map(DishResponse::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub scan_id: String,
    pub sections: Vec<SectionResponse>,
    pub source_language: String,
    pub target_language: String,
    pub confidence: u8,
    pub warnings: Vec<String>,
    pub processing_time_ms: u64,
    pub total_sections: usize,
    pub total_dishes: usize,
}

impl ScanResponse {
    pub fn from_result(scan_id: String, result: ScanResult) -> Self {
        let total_sections = result.sections.len();
        let total_dishes = result.total_dishes();
        Self {
            scan_id,
            sections: result
                .sections
                .into_iter()
                .map(SectionResponse::from)
                .collect(),
            source_language: result.source_language,
            target_language: result.target_language,
            confidence: result.confidence,
            warnings: result.warnings,
            processing_time_ms: result.duration_ms,
            total_sections,
            total_dishes,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExplainRequest {
    #[validate(length(min = 1, max = 255, message = "dish name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub dietary_tags: BTreeSet<String>,
    #[serde(default = "default_language")]
    #[validate(length(min = 2, max = 16))]
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainResponse {
    pub explanation: String,
    pub source: ExplanationSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatusResponse {
    pub owner_id: String,
    pub tier: Tier,
    pub used: u32,
    /// Absent for unlimited (active pass) owners.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl QuotaStatusResponse {
    pub fn from_usage(usage: QuotaUsage, free_limit: u32) -> Self {
        let unlimited = usage.has_active_pass(Utc::now());
        let (limit, remaining) = if unlimited {
            (None, None)
        } else {
            (
                Some(free_limit),
                Some(free_limit.saturating_sub(usage.used)),
            )
        };
        Self {
            owner_id: usage.owner_id,
            tier: usage.tier,
            used: usage.used,
            limit,
            remaining,
            expires_at: usage.expires_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SeedExplanationsRequest {
    #[validate(length(min = 1, message = "at least one explanation is required"))]
    pub explanations: Vec<SeedExplanation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedExplanation {
    pub name: String,
    #[serde(default = "default_language")]
    pub language: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedExplanationsResponse {
    pub inserted: usize,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GrantPassRequest {
    #[validate(length(min = 1, max = 255, message = "owner id is required"))]
    pub owner_id: String,
    #[serde(default = "default_owner_kind")]
    pub owner_kind: OwnerKind,
    pub tier: Tier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantPassResponse {
    pub owner_id: String,
    pub tier: Tier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_request_defaults() {
        let req: ScanMenuRequest = serde_json::from_str(
            r#"{ "image": "abc", "ownerId": "sess-1" }"#,
        )
        .expect("deserialize");
        assert_eq!(req.target_language, "en");
        assert_eq!(req.owner_kind, OwnerKind::Session);
    }

    #[test]
    fn scan_request_validation_rejects_blank_owner() {
        let req: ScanMenuRequest =
            serde_json::from_str(r#"{ "image": "abc", "ownerId": "" }"#).expect("deserialize");
        assert!(req.validate().is_err());
    }

    #[test]
    fn scan_response_counts_sections_and_dishes() {
        let mut section = MenuSection::new("MAINS");
        section.dishes.push(Dish::new("Pasta", 0.7));
        section.dishes.push(Dish::new("Pizza", 0.7));
        let result = ScanResult {
            sections: vec![section],
            source_language: "en".to_string(),
            target_language: "fr".to_string(),
            confidence: 88,
            warnings: vec![],
            duration_ms: 1200,
        };

        let resp = ScanResponse::from_result("scan-1".to_string(), result);
        assert_eq!(resp.total_sections, 1);
        assert_eq!(resp.total_dishes, 2);

        let json = serde_json::to_value(&resp).expect("serialize");
        assert_eq!(json["scanId"], "scan-1");
        assert_eq!(json["processingTimeMs"], 1200);
        assert_eq!(json["sections"][0]["dishes"][0]["dietaryTags"], serde_json::json!([]));
    }

    #[test]
    fn quota_status_for_free_owner_reports_remaining() {
        let usage = QuotaUsage {
            owner_id: "sess-1".to_string(),
            owner_kind: OwnerKind::Session,
            tier: Tier::Free,
            used: 3,
            expires_at: None,
        };
        let resp = QuotaStatusResponse::from_usage(usage, 5);
        assert_eq!(resp.limit, Some(5));
        assert_eq!(resp.remaining, Some(2));
    }

    #[test]
    fn quota_status_for_pass_owner_is_unlimited() {
        let usage = QuotaUsage {
            owner_id: "user-1".to_string(),
            owner_kind: OwnerKind::User,
            tier: Tier::WeeklyPass,
            used: 41,
            expires_at: Some(Utc::now() + chrono::Duration::days(3)),
        };
        let resp = QuotaStatusResponse::from_usage(usage, 5);
        assert_eq!(resp.limit, None);
        assert_eq!(resp.remaining, None);
    }
}
