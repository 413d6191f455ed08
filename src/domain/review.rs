//! Review records and their append-only history rows.

use chrono::{DateTime, Utc};

use super::{Card, ItemKind, Rating};

/// Which scheduler owns a review. Flashcard and MCQ reviews live in
/// separate tables; the same item can be due in one mode and not the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewMode {
    Flash,
    Mcq,
}

impl ReviewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flash => "flash",
            Self::Mcq => "mcq",
        }
    }
}

/// One item's scheduling state in one mode.
///
/// `due_date`, `last_reviewed`, and `review_count` are denormalized from
/// the card and the history tail; `apply` keeps them consistent inside a
/// single transaction.
#[derive(Debug, Clone)]
pub struct Review {
    pub id: i64,
    pub item_id: i64,
    pub item_kind: ItemKind,
    pub card: Card,
    pub due_date: DateTime<Utc>,
    pub last_reviewed: Option<DateTime<Utc>>,
    pub review_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only log row for a flashcard review.
#[derive(Debug, Clone)]
pub struct FlashHistoryEntry {
    pub id: i64,
    pub review_id: i64,
    pub rating: Rating,
    pub duration_ms: Option<i64>,
    pub reviewed_at: DateTime<Utc>,
}

/// Append-only log row for an MCQ review.
#[derive(Debug, Clone)]
pub struct McqHistoryEntry {
    pub id: i64,
    pub review_id: i64,
    /// Position the user picked, 0..=3
    pub selected_option: u8,
    pub is_correct: bool,
    pub duration_ms: Option<i64>,
    pub reviewed_at: DateTime<Utc>,
}
