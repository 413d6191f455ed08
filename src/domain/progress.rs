//! Per-user progress record (one row; single-user installs use `default`).

use chrono::{DateTime, NaiveDate, Utc};

use super::JlptLevel;

#[derive(Debug, Clone)]
pub struct Progress {
    pub id: i64,
    pub user_id: String,
    pub current_level: JlptLevel,
    pub target_level: JlptLevel,
    /// Free-form cached stats, owned by the UI layer
    pub stats: serde_json::Value,
    /// Free-form milestone markers, owned by the UI layer
    pub milestones: serde_json::Value,
    pub streak_days: i64,
    /// UTC calendar day of the most recent applied review
    pub last_review_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
