use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box for a recognized token, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn vertical_center(&self) -> f32 {
        self.y + self.height / 2.0
    }
}

/// One recognized token as returned by an OCR engine. Geometry is optional;
/// engines running in plain-text mode return `bounds: None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTextBlock {
    pub text: String,
    pub bounds: Option<BoundingBox>,
}

impl RawTextBlock {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bounds: None,
        }
    }

    pub fn with_bounds(text: impl Into<String>, bounds: BoundingBox) -> Self {
        Self {
            text: text.into(),
            bounds: Some(bounds),
        }
    }

    /// Block height as a font-size proxy.
    pub fn font_height(&self) -> Option<f32> {
        self.bounds.map(|b| b.height)
    }
}

/// Coarse document-hierarchy bucket inferred from block heights,
/// largest to smallest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontTier {
    Heading,
    Section,
    Dish,
    Description,
}

impl FontTier {
    /// Tier for the n-th largest height bucket. Anything past the fourth
    /// bucket is body text.
    pub fn from_rank(rank: usize) -> Self {
        match rank {
            0 => Self::Heading,
            1 => Self::Section,
            2 => Self::Dish,
            _ => Self::Description,
        }
    }
}

/// One reading-order line produced by layout clustering, ready for
/// classification. `tier` is present only when the source blocks carried
/// geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutLine {
    pub text: String,
    pub tier: Option<FontTier>,
}

impl LayoutLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tier: None,
        }
    }

    pub fn with_tier(text: impl Into<String>, tier: FontTier) -> Self {
        Self {
            text: text.into(),
            tier: Some(tier),
        }
    }
}

/// A single menu item. Owned by exactly one [`MenuSection`]. The price is a
/// display string and is never parsed to a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dish {
    pub name: String,
    pub original_description: Option<String>,
    pub price: Option<String>,
    pub explanation: Option<String>,
    /// Deduplicated, case-normalized dietary markers. `BTreeSet` keeps the
    /// serialized order deterministic.
    pub dietary_tags: BTreeSet<String>,
    /// Classification confidence hint in [0,1].
    pub confidence: f32,
}

impl Dish {
    pub fn new(name: impl Into<String>, confidence: f32) -> Self {
        Self {
            name: name.into(),
            original_description: None,
            price: None,
            explanation: None,
            dietary_tags: BTreeSet::new(),
            confidence,
        }
    }
}

/// An ordered run of dishes under one header. Sections are siblings,
/// never nested; their order follows the top-to-bottom document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuSection {
    pub name: String,
    pub dishes: Vec<Dish>,
}

impl MenuSection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dishes: Vec::new(),
        }
    }
}

/// The finished product of one scan request. Immutable once produced;
/// created per request and never persisted by this service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub sections: Vec<MenuSection>,
    pub source_language: String,
    pub target_language: String,
    /// Overall confidence score in [0,100].
    pub confidence: u8,
    pub warnings: Vec<String>,
    pub duration_ms: u64,
}

impl ScanResult {
    pub fn total_dishes(&self) -> usize {
        self.sections.iter().map(|s| s.dishes.len()).sum()
    }
}
