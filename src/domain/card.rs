//! FSRS memory state owned by a review.
//!
//! The card is a closed aggregate: only the SRS engine transitions it, and
//! everything else moves it around as an opaque blob. The blob layout
//! follows the FSRS reference serialization (integer phases, ISO-8601
//! instants) so state survives re-implementation of the outer layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Memory phase. Integer values match the FSRS reference
/// (1=Learning, 2=Review, 3=Relearning).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardPhase {
    Learning,
    Review,
    Relearning,
}

impl CardPhase {
    pub fn from_int(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Learning),
            2 => Some(Self::Review),
            3 => Some(Self::Relearning),
            _ => None,
        }
    }

    pub fn as_int(&self) -> u8 {
        match self {
            Self::Learning => 1,
            Self::Review => 2,
            Self::Relearning => 3,
        }
    }
}

/// Recall quality for a flashcard answer. MCQ answers are mapped onto
/// `Good`/`Again` before reaching the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Again = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

impl Rating {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Again),
            2 => Some(Self::Hard),
            3 => Some(Self::Good),
            4 => Some(Self::Easy),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Binary-answer conversion used by the MCQ scheduler.
    pub fn from_correct(is_correct: bool) -> Self {
        if is_correct { Self::Good } else { Self::Again }
    }
}

/// The FSRS memory unit for one item in one mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    /// Creation instant in epoch milliseconds, per the reference layout
    pub card_id: i64,
    pub state: CardPhase,
    /// Position within the learning/relearning step table
    pub step: u32,
    /// Days-equivalent stability; None until the first memory update
    pub stability: Option<f64>,
    /// Difficulty in [1, 10]; None until the first memory update
    pub difficulty: Option<f64>,
    pub due: DateTime<Utc>,
    pub last_review: Option<DateTime<Utc>>,
}

impl Card {
    /// Fresh card entering the learning phase, due immediately.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            card_id: now.timestamp_millis(),
            state: CardPhase::Learning,
            step: 0,
            stability: None,
            difficulty: None,
            due: now,
            last_review: None,
        }
    }

    pub fn to_json(&self) -> String {
        let blob = CardBlob {
            card_id: self.card_id,
            state: self.state.as_int(),
            step: self.step,
            stability: self.stability,
            difficulty: self.difficulty,
            due: self.due.to_rfc3339(),
            last_review: self.last_review.map(|t| t.to_rfc3339()),
        };
        serde_json::to_string(&blob).expect("card blob serialization cannot fail")
    }

    pub fn from_json(s: &str) -> Result<Self, String> {
        let blob: CardBlob =
            serde_json::from_str(s).map_err(|e| format!("malformed card blob: {}", e))?;
        Ok(Self {
            card_id: blob.card_id,
            state: CardPhase::from_int(blob.state)
                .ok_or_else(|| format!("unknown card state {}", blob.state))?,
            step: blob.step,
            stability: blob.stability,
            difficulty: blob.difficulty,
            due: parse_instant(&blob.due)?,
            last_review: blob.last_review.as_deref().map(parse_instant).transpose()?,
        })
    }
}

fn parse_instant(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("bad instant {:?} in card blob: {}", s, e))
}

/// Wire form of [`Card`].
#[derive(Serialize, Deserialize)]
struct CardBlob {
    card_id: i64,
    state: u8,
    step: u32,
    stability: Option<f64>,
    difficulty: Option<f64>,
    due: String,
    last_review: Option<String>,
}
