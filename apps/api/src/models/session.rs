use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// Lifecycle of a CV-creation session. `Paid` is terminal for payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Paid,
    Expired,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Paid => "paid",
            SessionStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "paid" => Ok(SessionStatus::Paid),
            "expired" => Ok(SessionStatus::Expired),
            other => Err(anyhow::anyhow!("unknown session status '{other}'")),
        }
    }
}

/// Purchased service level. Gates which generation features run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageTier {
    Basic,
    Advanced,
    Pro,
}

impl PackageTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageTier::Basic => "basic",
            PackageTier::Advanced => "advanced",
            PackageTier::Pro => "pro",
        }
    }

    /// Pro sessions get a second, English CV alongside the session language.
    pub fn includes_english_variant(&self) -> bool {
        matches!(self, PackageTier::Pro)
    }
}

impl fmt::Display for PackageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageTier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(PackageTier::Basic),
            "advanced" => Ok(PackageTier::Advanced),
            "pro" => Ok(PackageTier::Pro),
            other => Err(anyhow::anyhow!("unknown package '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionRow {
    pub id: String,
    pub status: String,
    pub template_id: String,
    pub language: String,
    pub package: Option<String>,
    pub payment_ref: Option<String>,
    pub metadata: Value,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRow {
    /// Stored status, with `active` sessions past their TTL reported as `expired`.
    pub fn effective_status(&self, now: DateTime<Utc>) -> SessionStatus {
        let stored = self.status.parse().unwrap_or(SessionStatus::Expired);
        if stored == SessionStatus::Active && self.expires_at <= now {
            SessionStatus::Expired
        } else {
            stored
        }
    }

    pub fn package_tier(&self) -> Option<PackageTier> {
        self.package.as_deref().and_then(|p| p.parse().ok())
    }
}

/// Insert parameters for a new session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub id: String,
    pub template_id: String,
    pub language: String,
    pub metadata: Value,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, expires_in_hours: i64) -> SessionRow {
        let now = Utc::now();
        SessionRow {
            id: "S1".to_string(),
            status: status.to_string(),
            template_id: "classic".to_string(),
            language: "he".to_string(),
            package: None,
            payment_ref: None,
            metadata: Value::Null,
            expires_at: now + chrono::Duration::hours(expires_in_hours),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_active_session_within_ttl_stays_active() {
        assert_eq!(
            row("active", 1).effective_status(Utc::now()),
            SessionStatus::Active
        );
    }

    #[test]
    fn test_active_session_past_ttl_reports_expired() {
        assert_eq!(
            row("active", -1).effective_status(Utc::now()),
            SessionStatus::Expired
        );
    }

    #[test]
    fn test_paid_session_does_not_expire() {
        assert_eq!(
            row("paid", -5).effective_status(Utc::now()),
            SessionStatus::Paid
        );
    }

    #[test]
    fn test_package_tier_round_trips_through_str() {
        for tier in [PackageTier::Basic, PackageTier::Advanced, PackageTier::Pro] {
            assert_eq!(tier.as_str().parse::<PackageTier>().unwrap(), tier);
        }
        assert!("platinum".parse::<PackageTier>().is_err());
    }

    #[test]
    fn test_only_pro_includes_english_variant() {
        assert!(PackageTier::Pro.includes_english_variant());
        assert!(!PackageTier::Advanced.includes_english_variant());
        assert!(!PackageTier::Basic.includes_english_variant());
    }
}
