mod explanation;
mod menu;
mod quota;

pub use explanation::CachedExplanation;
pub use menu::{BoundingBox, Dish, FontTier, LayoutLine, MenuSection, RawTextBlock, ScanResult};
pub use quota::{OwnerKind, QuotaDecision, QuotaUsage, Tier};
