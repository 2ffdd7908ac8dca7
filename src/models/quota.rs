use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of identity the quota counter is tracked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    /// Authenticated user id.
    User,
    /// Anonymous browser session id.
    Session,
}

impl std::fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Session => write!(f, "session"),
        }
    }
}

impl std::str::FromStr for OwnerKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "session" => Ok(Self::Session),
            other => Err(format!("Unknown owner kind: {other}")),
        }
    }
}

/// Subscription level. Passes are unlimited until `expires_at`; an expired
/// pass behaves like the free tier again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Free,
    DailyPass,
    WeeklyPass,
}

impl Tier {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::DailyPass | Self::WeeklyPass)
    }

    /// Pass duration in hours, for grant bookkeeping.
    pub fn duration_hours(&self) -> Option<u32> {
        match self {
            Self::Free => None,
            Self::DailyPass => Some(24),
            Self::WeeklyPass => Some(168),
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::DailyPass => write!(f, "daily_pass"),
            Self::WeeklyPass => write!(f, "weekly_pass"),
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "daily_pass" => Ok(Self::DailyPass),
            "weekly_pass" => Ok(Self::WeeklyPass),
            other => Err(format!("Unknown tier: {other}")),
        }
    }
}

/// Persisted per-owner usage record. Created on the owner's first scan
/// attempt, counter-incremented after each successful scan, never deleted
/// by this service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaUsage {
    pub owner_id: String,
    pub owner_kind: OwnerKind,
    pub tier: Tier,
    pub used: u32,
    pub expires_at: Option<DateTime<Utc>>,
}

impl QuotaUsage {
    /// Whether the owner currently has an unexpired pass.
    pub fn has_active_pass(&self, now: DateTime<Utc>) -> bool {
        self.tier.is_pass() && self.expires_at.map(|at| at > now).unwrap_or(true)
    }
}

/// Outcome of a quota authorization check. `remaining: None` means
/// unlimited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub remaining: Option<u32>,
}
