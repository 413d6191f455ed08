//! Review rows and their history logs.
//!
//! The flashcard and MCQ schedulers persist to structurally identical table
//! pairs; everything here is parameterized over [`ReviewTables`] so the two
//! modes share one set of queries without ever touching each other's rows.
//! History tables are append-only logs: rows are inserted inside the apply
//! transaction and never updated or deleted.

use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{Connection, Result, params, params_from_iter};

use crate::domain::{
    Card, FlashHistoryEntry, ItemKind, JlptLevel, McqHistoryEntry, Rating, Review, ReviewMode,
};

use super::items::parse_timestamp;

/// Table pair backing one review mode.
#[derive(Debug, Clone, Copy)]
pub struct ReviewTables {
    pub reviews: &'static str,
    pub history: &'static str,
}

pub const FLASH_TABLES: ReviewTables = ReviewTables {
    reviews: "reviews",
    history: "review_history",
};

pub const MCQ_TABLES: ReviewTables = ReviewTables {
    reviews: "mcq_reviews",
    history: "mcq_review_history",
};

impl ReviewMode {
    pub fn tables(self) -> ReviewTables {
        match self {
            Self::Flash => FLASH_TABLES,
            Self::Mcq => MCQ_TABLES,
        }
    }
}

/// Filters for the due queue. Compose conjunctively; `limit` truncates
/// after filtering.
#[derive(Debug, Clone, Copy, Default)]
pub struct DueFilter {
    pub limit: Option<usize>,
    pub jlpt_level: Option<JlptLevel>,
    pub item_kind: Option<ItemKind>,
}

const REVIEW_COLUMNS: &str =
    "r.id, r.item_id, r.item_kind, r.fsrs_card_state, r.due_date, r.last_reviewed, \
     r.review_count, r.created_at, r.updated_at";

pub fn insert_review(
    conn: &Connection,
    tables: ReviewTables,
    item_id: i64,
    item_kind: ItemKind,
    card: &Card,
) -> Result<i64> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        &format!(
            r#"
            INSERT INTO {} (item_id, item_kind, fsrs_card_state, due_date, review_count,
                            created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)
            "#,
            tables.reviews
        ),
        params![
            item_id,
            item_kind.as_str(),
            card.to_json(),
            card.due.to_rfc3339(),
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_review(conn: &Connection, tables: ReviewTables, id: i64) -> Result<Option<Review>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM {} r WHERE r.id = ?1",
        REVIEW_COLUMNS, tables.reviews
    ))?;
    let mut rows = stmt.query(params![id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_review(row)?)),
        None => Ok(None),
    }
}

pub fn get_review_by_item(
    conn: &Connection,
    tables: ReviewTables,
    item_id: i64,
    item_kind: ItemKind,
) -> Result<Option<Review>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM {} r WHERE r.item_id = ?1 AND r.item_kind = ?2",
        REVIEW_COLUMNS, tables.reviews
    ))?;
    let mut rows = stmt.query(params![item_id, item_kind.as_str()])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_review(row)?)),
        None => Ok(None),
    }
}

/// Reviews due at `as_of`, ascending by due date with review id as the
/// stable tie-break.
pub fn due_reviews(
    conn: &Connection,
    tables: ReviewTables,
    as_of: DateTime<Utc>,
    filter: &DueFilter,
) -> Result<Vec<Review>> {
    let mut sql = format!(
        r#"
        SELECT {} FROM {} r
        LEFT JOIN vocabulary v ON r.item_kind = 'vocab' AND v.id = r.item_id
        LEFT JOIN kanji k ON r.item_kind = 'kanji' AND k.id = r.item_id
        WHERE r.due_date <= ?
        "#,
        REVIEW_COLUMNS, tables.reviews
    );
    let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(as_of.to_rfc3339())];

    if let Some(level) = filter.jlpt_level {
        sql.push_str(" AND COALESCE(v.jlpt_level, k.jlpt_level) = ?");
        values.push(Box::new(level.as_str().to_string()));
    }
    if let Some(kind) = filter.item_kind {
        sql.push_str(" AND r.item_kind = ?");
        values.push(Box::new(kind.as_str().to_string()));
    }

    sql.push_str(" ORDER BY r.due_date ASC, r.id ASC");
    if let Some(limit) = filter.limit {
        sql.push_str(" LIMIT ?");
        values.push(Box::new(limit as i64));
    }

    let mut stmt = conn.prepare(&sql)?;
    let reviews = stmt
        .query_map(params_from_iter(values), |row| row_to_review(row))?
        .collect::<Result<Vec<_>>>()?;
    Ok(reviews)
}

/// Count tracked reviews matching the filters (due or not).
pub fn count_reviews(
    conn: &Connection,
    tables: ReviewTables,
    jlpt_level: Option<JlptLevel>,
    item_kind: Option<ItemKind>,
) -> Result<i64> {
    let mut sql = format!(
        r#"
        SELECT COUNT(*) FROM {} r
        LEFT JOIN vocabulary v ON r.item_kind = 'vocab' AND v.id = r.item_id
        LEFT JOIN kanji k ON r.item_kind = 'kanji' AND k.id = r.item_id
        WHERE 1=1
        "#,
        tables.reviews
    );
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(level) = jlpt_level {
        sql.push_str(" AND COALESCE(v.jlpt_level, k.jlpt_level) = ?");
        values.push(Box::new(level.as_str().to_string()));
    }
    if let Some(kind) = item_kind {
        sql.push_str(" AND r.item_kind = ?");
        values.push(Box::new(kind.as_str().to_string()));
    }

    conn.query_row(&sql, params_from_iter(values), |row| row.get(0))
}

/// Persist the outcome of one applied review: new card blob, denormalized
/// due date, review counter, and last-reviewed stamp move together.
pub fn update_review_after_apply(
    conn: &Connection,
    tables: ReviewTables,
    review_id: i64,
    card: &Card,
    reviewed_at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        &format!(
            r#"
            UPDATE {}
            SET fsrs_card_state = ?1, due_date = ?2, last_reviewed = ?3,
                review_count = review_count + 1, updated_at = ?3
            WHERE id = ?4
            "#,
            tables.reviews
        ),
        params![
            card.to_json(),
            card.due.to_rfc3339(),
            reviewed_at.to_rfc3339(),
            review_id,
        ],
    )?;
    Ok(())
}

pub fn insert_flash_history(
    conn: &Connection,
    review_id: i64,
    rating: Rating,
    duration_ms: Option<i64>,
    reviewed_at: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO review_history (review_id, rating, duration_ms, reviewed_at)
        VALUES (?1, ?2, ?3, ?4)
        "#,
        params![review_id, rating.as_u8(), duration_ms, reviewed_at.to_rfc3339()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_mcq_history(
    conn: &Connection,
    review_id: i64,
    selected_option: u8,
    is_correct: bool,
    duration_ms: Option<i64>,
    reviewed_at: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO mcq_review_history (review_id, selected_option, is_correct, duration_ms, reviewed_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            review_id,
            selected_option,
            if is_correct { 1 } else { 0 },
            duration_ms,
            reviewed_at.to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn flash_history(conn: &Connection, review_id: i64) -> Result<Vec<FlashHistoryEntry>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, review_id, rating, duration_ms, reviewed_at
        FROM review_history
        WHERE review_id = ?1
        ORDER BY id ASC
        "#,
    )?;
    let entries = stmt
        .query_map(params![review_id], |row| {
            let rating: u8 = row.get(2)?;
            let reviewed_at: String = row.get(4)?;
            Ok(FlashHistoryEntry {
                id: row.get(0)?,
                review_id: row.get(1)?,
                rating: Rating::from_u8(rating).unwrap_or(Rating::Again),
                duration_ms: row.get(3)?,
                reviewed_at: parse_timestamp(&reviewed_at),
            })
        })?
        .collect::<Result<Vec<_>>>()?;
    Ok(entries)
}

pub fn mcq_history(conn: &Connection, review_id: i64) -> Result<Vec<McqHistoryEntry>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, review_id, selected_option, is_correct, duration_ms, reviewed_at
        FROM mcq_review_history
        WHERE review_id = ?1
        ORDER BY id ASC
        "#,
    )?;
    let entries = stmt
        .query_map(params![review_id], |row| {
            let is_correct: i64 = row.get(3)?;
            let reviewed_at: String = row.get(5)?;
            Ok(McqHistoryEntry {
                id: row.get(0)?,
                review_id: row.get(1)?,
                selected_option: row.get(2)?,
                is_correct: is_correct == 1,
                duration_ms: row.get(4)?,
                reviewed_at: parse_timestamp(&reviewed_at),
            })
        })?
        .collect::<Result<Vec<_>>>()?;
    Ok(entries)
}

fn row_to_review(row: &rusqlite::Row) -> Result<Review> {
    let kind: String = row.get(2)?;
    let blob: String = row.get(3)?;
    let due_date: String = row.get(4)?;
    let last_reviewed: Option<String> = row.get(5)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    let card = Card::from_json(&blob).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
    })?;

    Ok(Review {
        id: row.get(0)?,
        item_id: row.get(1)?,
        item_kind: ItemKind::from_str(&kind).unwrap_or(ItemKind::Vocab),
        card,
        due_date: parse_timestamp(&due_date),
        last_reviewed: last_reviewed.as_deref().map(parse_timestamp),
        review_count: row.get(6)?,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StudyError;
    use crate::testing::{TestEnv, insert_vocab_at_level};
    use chrono::Duration;

    #[test]
    fn insert_and_get_roundtrip() {
        let env = TestEnv::new();
        let conn = env.conn();
        let item_id = insert_vocab_at_level(&conn, "水", "みず", JlptLevel::N5);

        let now = Utc::now();
        let card = Card::new(now);
        let review_id = insert_review(&conn, FLASH_TABLES, item_id, ItemKind::Vocab, &card).unwrap();

        let review = get_review(&conn, FLASH_TABLES, review_id).unwrap().unwrap();
        assert_eq!(review.item_id, item_id);
        assert_eq!(review.item_kind, ItemKind::Vocab);
        assert_eq!(review.review_count, 0);
        assert_eq!(review.card, card);
        assert_eq!(review.due_date, card.due);
        assert!(review.last_reviewed.is_none());
    }

    #[test]
    fn duplicate_review_is_a_conflict() {
        let env = TestEnv::new();
        let conn = env.conn();
        let item_id = insert_vocab_at_level(&conn, "水", "みず", JlptLevel::N5);

        let card = Card::new(Utc::now());
        insert_review(&conn, FLASH_TABLES, item_id, ItemKind::Vocab, &card).unwrap();
        let err = insert_review(&conn, FLASH_TABLES, item_id, ItemKind::Vocab, &card).unwrap_err();
        assert!(matches!(StudyError::from(err), StudyError::Conflict(_)));
    }

    #[test]
    fn flash_and_mcq_tables_are_independent() {
        let env = TestEnv::new();
        let conn = env.conn();
        let item_id = insert_vocab_at_level(&conn, "水", "みず", JlptLevel::N5);

        let card = Card::new(Utc::now());
        insert_review(&conn, FLASH_TABLES, item_id, ItemKind::Vocab, &card).unwrap();
        // Same pair in the other mode is fine
        insert_review(&conn, MCQ_TABLES, item_id, ItemKind::Vocab, &card).unwrap();

        assert_eq!(count_reviews(&conn, FLASH_TABLES, None, None).unwrap(), 1);
        assert_eq!(count_reviews(&conn, MCQ_TABLES, None, None).unwrap(), 1);
    }

    #[test]
    fn due_is_ordered_and_filtered() {
        let env = TestEnv::new();
        let conn = env.conn();
        let now = Utc::now();

        let n5_ids: Vec<i64> = ["一", "二", "三"]
            .iter()
            .map(|w| insert_vocab_at_level(&conn, w, "よみ", JlptLevel::N5))
            .collect();
        let n4_ids: Vec<i64> = ["四", "五"]
            .iter()
            .map(|w| insert_vocab_at_level(&conn, w, "よみ", JlptLevel::N4))
            .collect();

        // Stagger due dates in the past, most overdue last inserted
        for (offset, item_id) in n5_ids.iter().chain(n4_ids.iter()).enumerate() {
            let mut card = Card::new(now);
            card.due = now - Duration::minutes(10 + offset as i64);
            insert_review(&conn, FLASH_TABLES, *item_id, ItemKind::Vocab, &card).unwrap();
        }

        let all = due_reviews(&conn, FLASH_TABLES, now, &DueFilter::default()).unwrap();
        assert_eq!(all.len(), 5);
        for pair in all.windows(2) {
            assert!(pair[0].due_date <= pair[1].due_date);
        }

        let n5_only = due_reviews(
            &conn,
            FLASH_TABLES,
            now,
            &DueFilter {
                jlpt_level: Some(JlptLevel::N5),
                ..DueFilter::default()
            },
        )
        .unwrap();
        assert_eq!(n5_only.len(), 3);
        assert!(n5_only.iter().all(|r| n5_ids.contains(&r.item_id)));

        let limited = due_reviews(
            &conn,
            FLASH_TABLES,
            now,
            &DueFilter {
                limit: Some(2),
                ..DueFilter::default()
            },
        )
        .unwrap();
        assert_eq!(limited.len(), 2);
        // Limit truncates after ordering: these are the two most overdue
        assert_eq!(limited[0].id, all[0].id);
        assert_eq!(limited[1].id, all[1].id);
    }

    #[test]
    fn future_reviews_are_not_due() {
        let env = TestEnv::new();
        let conn = env.conn();
        let now = Utc::now();
        let item_id = insert_vocab_at_level(&conn, "水", "みず", JlptLevel::N5);

        let mut card = Card::new(now);
        card.due = now + Duration::days(3);
        insert_review(&conn, FLASH_TABLES, item_id, ItemKind::Vocab, &card).unwrap();

        assert!(due_reviews(&conn, FLASH_TABLES, now, &DueFilter::default())
            .unwrap()
            .is_empty());
        assert_eq!(
            due_reviews(&conn, FLASH_TABLES, now + Duration::days(3), &DueFilter::default())
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn apply_update_keeps_denormalized_fields_consistent() {
        let env = TestEnv::new();
        let conn = env.conn();
        let now = Utc::now();
        let item_id = insert_vocab_at_level(&conn, "水", "みず", JlptLevel::N5);

        let card = Card::new(now);
        let review_id = insert_review(&conn, FLASH_TABLES, item_id, ItemKind::Vocab, &card).unwrap();

        let mut updated = card;
        updated.due = now + Duration::minutes(10);
        updated.last_review = Some(now);
        update_review_after_apply(&conn, FLASH_TABLES, review_id, &updated, now).unwrap();
        insert_flash_history(&conn, review_id, Rating::Good, Some(4000), now).unwrap();

        let review = get_review(&conn, FLASH_TABLES, review_id).unwrap().unwrap();
        assert_eq!(review.review_count, 1);
        assert_eq!(review.due_date, review.card.due);
        assert_eq!(review.last_reviewed, Some(now));

        let history = flash_history(&conn, review_id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].rating, Rating::Good);
        assert_eq!(history[0].duration_ms, Some(4000));
    }
}
