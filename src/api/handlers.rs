//! HTTP handlers. Every response is wrapped in the
//! `{ success, data | error + errorKind }` envelope.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{Duration, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::db::{ExplanationStore, QuotaStore};
use crate::error::ErrorKind;
use crate::models::CachedExplanation;
use crate::scan::ScanRequest;

use super::dto::{
    ExplainRequest, ExplainResponse, GrantPassRequest, GrantPassResponse, QuotaStatusResponse,
    ScanMenuRequest, ScanResponse, SeedExplanationsRequest, SeedExplanationsResponse,
};
use super::response::ApiResponse;
use super::state::AppState;

pub async fn health() -> ApiResponse<serde_json::Value> {
    ApiResponse::success(serde_json::json!({ "status": "ok" }))
}

/// `POST /api/v1/scan` — the full pipeline: quota gate, OCR with fallback,
/// layout clustering, segmentation, enrichment.
pub async fn scan_menu(
    State(state): State<AppState>,
    Json(req): Json<ScanMenuRequest>,
) -> ApiResponse<ScanResponse> {
    if let Err(e) = req.validate() {
        return ApiResponse::failure(ErrorKind::InvalidInput, e.to_string());
    }

    let request = ScanRequest {
        image: req.image,
        target_language: req.target_language,
        owner_id: req.owner_id,
        owner_kind: req.owner_kind,
    };

    match state.orchestrator.scan(&request).await {
        Ok(result) => {
            ApiResponse::success(ScanResponse::from_result(Uuid::new_v4().to_string(), result))
        }
        Err(e) => e.into(),
    }
}

/// `POST /api/v1/explain` — resolve a single dish on demand.
pub async fn explain_dish(
    State(state): State<AppState>,
    Json(req): Json<ExplainRequest>,
) -> ApiResponse<ExplainResponse> {
    if let Err(e) = req.validate() {
        return ApiResponse::failure(ErrorKind::InvalidInput, e.to_string());
    }

    match state
        .enricher
        .explain_single(
            &req.name,
            req.description.as_deref(),
            &req.dietary_tags,
            &req.language,
        )
        .await
    {
        Ok((explanation, source)) => ApiResponse::success(ExplainResponse {
            explanation,
            source,
        }),
        Err(e) => e.into(),
    }
}

/// `GET /api/v1/quota/{ownerId}` — current allowance for an owner.
pub async fn quota_status(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> ApiResponse<QuotaStatusResponse> {
    match state.quota.usage(&owner_id).await {
        Ok(Some(usage)) => ApiResponse::success(QuotaStatusResponse::from_usage(
            usage,
            state.quota.free_scan_limit(),
        )),
        Ok(None) => ApiResponse::failure(
            ErrorKind::InvalidInput,
            format!("Unknown owner: {owner_id}"),
        ),
        Err(e) => e.into(),
    }
}

/// `POST /api/v1/admin/explanations:seed` — bulk-load explanations into the
/// cache.
pub async fn seed_explanations(
    State(state): State<AppState>,
    Json(req): Json<SeedExplanationsRequest>,
) -> ApiResponse<SeedExplanationsResponse> {
    if let Err(e) = req.validate() {
        return ApiResponse::failure(ErrorKind::InvalidInput, e.to_string());
    }

    let mut inserted = 0;
    for seed in req.explanations {
        let record = CachedExplanation::new(seed.name, seed.language, seed.explanation);
        match state.db.save_explanation(&record).await {
            Ok(()) => inserted += 1,
            Err(e) => return e.into(),
        }
    }

    ApiResponse::success(SeedExplanationsResponse { inserted })
}

/// `POST /api/v1/admin/passes` — record a purchased pass on an owner. The
/// payment flow itself lives outside this service.
pub async fn grant_pass(
    State(state): State<AppState>,
    Json(req): Json<GrantPassRequest>,
) -> ApiResponse<GrantPassResponse> {
    if let Err(e) = req.validate() {
        return ApiResponse::failure(ErrorKind::InvalidInput, e.to_string());
    }

    let expires_at = req
        .tier
        .duration_hours()
        .map(|hours| Utc::now() + Duration::hours(hours as i64));

    match state
        .db
        .grant_pass(&req.owner_id, req.owner_kind, req.tier, expires_at)
        .await
    {
        Ok(()) => ApiResponse::success(GrantPassResponse {
            owner_id: req.owner_id,
            tier: req.tier,
            expires_at,
        }),
        Err(e) => e.into(),
    }
}
