//! Flashcard (free-recall) review scheduler.
//!
//! Owns the flashcard review tables: lazy review minting, the due queue,
//! and atomic application of rated answers. Every `apply` runs the card
//! update, the review-row update, the history append, and the streak bump
//! in one transaction; a failure in any step rolls back all of them.

use chrono::{DateTime, Utc};

use crate::db::reviews::{DueFilter, ReviewTables};
use crate::db::{self, DbPool};
use crate::domain::{Card, ItemKind, JlptLevel, Rating, Review, ReviewMode};
use crate::error::{Result, StudyError};

use super::engine::{SchedulerConfig, SrsEngine};

pub struct FlashScheduler {
    pool: DbPool,
    engine: SrsEngine,
    tables: ReviewTables,
}

impl FlashScheduler {
    pub fn new(pool: DbPool) -> Self {
        Self::with_config(pool, SchedulerConfig::default())
    }

    pub fn with_config(pool: DbPool, config: SchedulerConfig) -> Self {
        Self {
            pool,
            engine: SrsEngine::new(config),
            tables: ReviewMode::Flash.tables(),
        }
    }

    /// Mint a review for an item: fresh Learning card, due immediately.
    /// `Conflict` if the item is already tracked in this mode.
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

        tracing::debug!("created flash review {} for {} {}", review_id, item_kind.as_str(), item_id);
        Ok(review_id)
    }

    /// Due queue: ascending due date, review id as the stable tie-break.
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
                "flash review for {} item {}",
                item_kind.as_str(),
                item_id
            ))
        })
    }

    /// Apply a rated answer. Rating validation happens before any I/O.
    pub fn apply(&self, review_id: i64, rating: u8, duration_ms: Option<i64>) -> Result<Review> {
        self.apply_at(review_id, rating, duration_ms, Utc::now())
    }

    pub fn apply_at(
        &self,
        review_id: i64,
        rating: u8,
        duration_ms: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Review> {
        let rating = Rating::from_u8(rating)
            .ok_or_else(|| StudyError::Invalid(format!("rating must be in 1..=4, got {}", rating)))?;

        let mut conn = db::try_lock(&self.pool)?;
        let tx = conn.transaction()?;

        let review = db::reviews::get_review(&tx, self.tables, review_id)?
            .ok_or_else(|| StudyError::NotFound(format!("flash review {}", review_id)))?;

        let (card, log) = self.engine.next_card(&review.card, rating, now, &mut rand::rng());
        db::reviews::update_review_after_apply(&tx, self.tables, review_id, &card, log.reviewed_at)?;
        db::reviews::insert_flash_history(&tx, review_id, log.rating, duration_ms, log.reviewed_at)?;
        db::progress::record_study_day(&tx, log.reviewed_at.date_naive())?;
        tx.commit()?;

        db::reviews::get_review(&conn, self.tables, review_id)?.ok_or_else(|| {
            StudyError::Integrity(format!("flash review {} vanished after apply", review_id))
        })
    }

    /// Tracked reviews matching the filters.
    pub fn count(&self, jlpt_level: Option<JlptLevel>, item_kind: Option<ItemKind>) -> Result<i64> {
        let conn = db::try_lock(&self.pool)?;
        Ok(db::reviews::count_reviews(&conn, self.tables, jlpt_level, item_kind)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::reviews::flash_history;
    use crate::domain::CardPhase;
    use crate::testing::{TestEnv, insert_vocab_at_level};
    use chrono::{Duration, TimeZone};

    fn scheduler(env: &TestEnv) -> FlashScheduler {
        FlashScheduler::with_config(
            env.pool.clone(),
            SchedulerConfig {
                enable_fuzzing: false,
                ..SchedulerConfig::default()
            },
        )
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn first_review_good_walks_the_learning_steps() {
        let env = TestEnv::new();
        let item_id = insert_vocab_at_level(&env.conn(), "水", "みず", JlptLevel::N5);
        let scheduler = scheduler(&env);

        let now = t0();
        let review_id = scheduler.create_review_at(item_id, ItemKind::Vocab, now).unwrap();
        let review = scheduler.apply_at(review_id, 3, Some(4000), now).unwrap();

        assert_eq!(review.card.state, CardPhase::Learning);
        assert_eq!(review.card.step, 1);
        assert!(review.due_date > now);
        assert_eq!(review.due_date, now + Duration::minutes(10));
        assert_eq!(review.due_date, review.card.due);
        assert_eq!(review.review_count, 1);
        assert_eq!(review.last_reviewed, Some(now));

        let history = flash_history(&env.conn(), review_id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].rating, Rating::Good);
        assert_eq!(history[0].duration_ms, Some(4000));
    }

    #[test]
    fn create_review_requires_the_item() {
        let env = TestEnv::new();
        let scheduler = scheduler(&env);
        let err = scheduler.create_review(999, ItemKind::Vocab).unwrap_err();
        assert!(matches!(err, StudyError::NotFound(_)));
    }

    #[test]
    fn duplicate_create_conflicts_without_writing() {
        let env = TestEnv::new();
        let item_id = insert_vocab_at_level(&env.conn(), "水", "みず", JlptLevel::N5);
        let scheduler = scheduler(&env);

        scheduler.create_review(item_id, ItemKind::Vocab).unwrap();
        let err = scheduler.create_review(item_id, ItemKind::Vocab).unwrap_err();
        assert!(matches!(err, StudyError::Conflict(_)));
        assert_eq!(scheduler.count(None, None).unwrap(), 1);
    }

    #[test]
    fn out_of_range_rating_is_rejected_before_io() {
        let env = TestEnv::new();
        let item_id = insert_vocab_at_level(&env.conn(), "水", "みず", JlptLevel::N5);
        let scheduler = scheduler(&env);
        let review_id = scheduler.create_review_at(item_id, ItemKind::Vocab, t0()).unwrap();

        for bad in [0u8, 5, 9] {
            let err = scheduler.apply_at(review_id, bad, None, t0()).unwrap_err();
            assert!(matches!(err, StudyError::Invalid(_)));
        }

        let review = scheduler.review_by_item(item_id, ItemKind::Vocab).unwrap();
        assert_eq!(review.review_count, 0);
        assert!(flash_history(&env.conn(), review_id).unwrap().is_empty());
    }

    #[test]
    fn apply_missing_review_is_not_found() {
        let env = TestEnv::new();
        let err = scheduler(&env).apply_at(12345, 3, None, t0()).unwrap_err();
        assert!(matches!(err, StudyError::NotFound(_)));
    }

    #[test]
    fn review_count_tracks_history_and_timestamps_are_monotonic() {
        let env = TestEnv::new();
        let item_id = insert_vocab_at_level(&env.conn(), "水", "みず", JlptLevel::N5);
        let scheduler = scheduler(&env);
        let review_id = scheduler.create_review_at(item_id, ItemKind::Vocab, t0()).unwrap();

        let mut now = t0();
        for rating in [3u8, 3, 1, 4] {
            scheduler.apply_at(review_id, rating, None, now).unwrap();
            now += Duration::hours(6);
        }

        let review = scheduler.review_by_item(item_id, ItemKind::Vocab).unwrap();
        let history = flash_history(&env.conn(), review_id).unwrap();
        assert_eq!(review.review_count, 4);
        assert_eq!(history.len(), 4);
        for pair in history.windows(2) {
            assert!(pair[0].reviewed_at <= pair[1].reviewed_at);
        }
        assert_eq!(review.due_date, review.card.due);
    }

    #[test]
    fn due_filters_by_level_and_kind() {
        let env = TestEnv::new();
        let scheduler = scheduler(&env);
        let now = t0();

        let n5 = insert_vocab_at_level(&env.conn(), "水", "みず", JlptLevel::N5);
        let n4 = insert_vocab_at_level(&env.conn(), "天気", "てんき", JlptLevel::N4);
        scheduler.create_review_at(n5, ItemKind::Vocab, now).unwrap();
        scheduler.create_review_at(n4, ItemKind::Vocab, now).unwrap();

        let filtered = scheduler
            .due_as_of(
                &DueFilter {
                    jlpt_level: Some(JlptLevel::N5),
                    item_kind: Some(ItemKind::Vocab),
                    ..DueFilter::default()
                },
                now,
            )
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].item_id, n5);

        let everything = scheduler.due_as_of(&DueFilter::default(), now).unwrap();
        assert_eq!(everything.len(), 2);
    }

    #[test]
    fn applying_on_consecutive_days_builds_the_streak() {
        let env = TestEnv::new();
        let item_id = insert_vocab_at_level(&env.conn(), "水", "みず", JlptLevel::N5);
        let scheduler = scheduler(&env);
        let review_id = scheduler.create_review_at(item_id, ItemKind::Vocab, t0()).unwrap();

        scheduler.apply_at(review_id, 3, None, t0()).unwrap();
        scheduler.apply_at(review_id, 3, None, t0() + Duration::days(1)).unwrap();
        scheduler.apply_at(review_id, 3, None, t0() + Duration::days(2)).unwrap();

        let progress = db::progress::get_progress(&env.conn()).unwrap();
        assert_eq!(progress.streak_days, 3);

        // A gap resets
        scheduler.apply_at(review_id, 3, None, t0() + Duration::days(10)).unwrap();
        let progress = db::progress::get_progress(&env.conn()).unwrap();
        assert_eq!(progress.streak_days, 1);
    }
}
