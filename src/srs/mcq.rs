//! Multiple-choice review scheduler.
//!
//! Same shape as the flashcard scheduler, against the MCQ table pair. The
//! two schedulers never read or write each other's rows; the same item can
//! be due in one mode and not the other. A binary answer is converted to a
//! rating before reaching the engine: correct maps to Good, incorrect to
//! Again.

use chrono::{DateTime, Utc};

use crate::db::reviews::{DueFilter, ReviewTables};
use crate::db::{self, DbPool};
use crate::domain::{Card, ItemKind, JlptLevel, Rating, Review, ReviewMode};
use crate::error::{Result, StudyError};

use super::engine::{SchedulerConfig, SrsEngine};

pub struct McqScheduler {
    pool: DbPool,
    engine: SrsEngine,
    tables: ReviewTables,
}

impl McqScheduler {
    pub fn new(pool: DbPool) -> Self {
        Self::with_config(pool, SchedulerConfig::default())
    }

    pub fn with_config(pool: DbPool, config: SchedulerConfig) -> Self {
        Self {
            pool,
            engine: SrsEngine::new(config),
            tables: ReviewMode::Mcq.tables(),
        }
    }

    pub fn create_review(&self, item_id: i64, item_kind: ItemKind) -> Result<i64> {
        self.create_review_at(item_id, item_kind, Utc::now())
    }

    pub fn create_review_at(
        &self,
        item_id: i64,
        item_kind: ItemKind,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let mut conn = db::try_lock(&self.pool)?;
        let tx = conn.transaction()?;

        db::items::get_item(&tx, item_kind, item_id)?.ok_or_else(|| {
            StudyError::NotFound(format!("{} item {}", item_kind.as_str(), item_id))
        })?;

        let card = Card::new(now);
        let review_id = db::reviews::insert_review(&tx, self.tables, item_id, item_kind, &card)?;
        tx.commit()?;

        tracing::debug!("created mcq review {} for {} {}", review_id, item_kind.as_str(), item_id);
        Ok(review_id)
    }

    pub fn due(&self, filter: &DueFilter) -> Result<Vec<Review>> {
        self.due_as_of(filter, Utc::now())
    }

    pub fn due_as_of(&self, filter: &DueFilter, as_of: DateTime<Utc>) -> Result<Vec<Review>> {
        let conn = db::try_lock(&self.pool)?;
        Ok(db::reviews::due_reviews(&conn, self.tables, as_of, filter)?)
    }

    pub fn review_by_item(&self, item_id: i64, item_kind: ItemKind) -> Result<Review> {
        let conn = db::try_lock(&self.pool)?;
        db::reviews::get_review_by_item(&conn, self.tables, item_id, item_kind)?.ok_or_else(|| {
            StudyError::NotFound(format!(
                "mcq review for {} item {}",
                item_kind.as_str(),
                item_id
            ))
        })
    }

    /// Apply an answered question. The history row keeps the picked option
    /// position alongside correctness so selection bias stays measurable.
    pub fn apply(
        &self,
        review_id: i64,
        is_correct: bool,
        selected_option: u8,
        duration_ms: Option<i64>,
    ) -> Result<Review> {
        self.apply_at(review_id, is_correct, selected_option, duration_ms, Utc::now())
    }

    pub fn apply_at(
        &self,
        review_id: i64,
        is_correct: bool,
        selected_option: u8,
        duration_ms: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Review> {
        if selected_option > 3 {
            return Err(StudyError::Invalid(format!(
                "selected_option must be in 0..=3, got {}",
                selected_option
            )));
        }
        let rating = Rating::from_correct(is_correct);

        let mut conn = db::try_lock(&self.pool)?;
        let tx = conn.transaction()?;

        let review = db::reviews::get_review(&tx, self.tables, review_id)?
            .ok_or_else(|| StudyError::NotFound(format!("mcq review {}", review_id)))?;

        let (card, log) = self.engine.next_card(&review.card, rating, now, &mut rand::rng());
        db::reviews::update_review_after_apply(&tx, self.tables, review_id, &card, log.reviewed_at)?;
        db::reviews::insert_mcq_history(
            &tx,
            review_id,
            selected_option,
            is_correct,
            duration_ms,
            log.reviewed_at,
        )?;
        db::progress::record_study_day(&tx, log.reviewed_at.date_naive())?;
        tx.commit()?;

        db::reviews::get_review(&conn, self.tables, review_id)?.ok_or_else(|| {
            StudyError::Integrity(format!("mcq review {} vanished after apply", review_id))
        })
    }

    pub fn count(&self, jlpt_level: Option<JlptLevel>, item_kind: Option<ItemKind>) -> Result<i64> {
        let conn = db::try_lock(&self.pool)?;
        Ok(db::reviews::count_reviews(&conn, self.tables, jlpt_level, item_kind)?)
    }
}
