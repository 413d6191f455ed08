//! Read-only statistics derived from the catalog, review state, and the
//! append-only history logs.
//!
//! Every history-based function takes an optional inclusive date range on
//! `reviewed_at`. Nothing here writes; the soundness of retention and bias
//! numbers rests on history rows never being edited.

use std::collections::HashMap;

use chrono::NaiveDate;
use rusqlite::types::ToSql;
use rusqlite::{Connection, Result, params, params_from_iter};

use crate::config::MASTERY_STABILITY_DAYS;
use crate::domain::{Card, ItemKind, JlptLevel};

/// Inclusive calendar-day filter on `reviewed_at` (UTC days).
#[derive(Debug, Clone, Copy, Default)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn last_days(days: i64, today: NaiveDate) -> Self {
        Self {
            start: Some(today - chrono::Duration::days(days - 1)),
            end: Some(today),
        }
    }
}

/// Append the range conditions for `column` and push their bound values.
fn push_range(sql: &mut String, column: &str, range: &DateRange, values: &mut Vec<Box<dyn ToSql>>) {
    if let Some(start) = range.start {
        sql.push_str(&format!(" AND {} >= ?", column));
        values.push(Box::new(format!("{}T00:00:00+00:00", start.format("%Y-%m-%d"))));
    }
    if let Some(end) = range.end {
        let next = end + chrono::Duration::days(1);
        sql.push_str(&format!(" AND {} < ?", column));
        values.push(Box::new(format!("{}T00:00:00+00:00", next.format("%Y-%m-%d"))));
    }
}

fn count_by_level(conn: &Connection, table: &str) -> Result<HashMap<JlptLevel, i64>> {
    let mut counts: HashMap<JlptLevel, i64> = JlptLevel::ALL.iter().map(|l| (*l, 0)).collect();

    let mut stmt = conn.prepare(&format!(
        "SELECT jlpt_level, COUNT(*) FROM {} GROUP BY jlpt_level",
        table
    ))?;
    let rows = stmt.query_map([], |row| {
        let level: String = row.get(0)?;
        let count: i64 = row.get(1)?;
        Ok((level, count))
    })?;

    for row in rows {
        let (level, count) = row?;
        if let Some(level) = JlptLevel::from_str(&level) {
            counts.insert(level, count);
        }
    }
    Ok(counts)
}

pub fn vocab_count_by_level(conn: &Connection) -> Result<HashMap<JlptLevel, i64>> {
    count_by_level(conn, "vocabulary")
}

pub fn kanji_count_by_level(conn: &Connection) -> Result<HashMap<JlptLevel, i64>> {
    count_by_level(conn, "kanji")
}

/// Flashcard reviews whose card stability has reached the mastery
/// threshold. The card blob is opaque to SQL, so rows are deserialized and
/// filtered here.
pub fn mastered_count(conn: &Connection, kind: ItemKind) -> Result<i64> {
    let mut stmt = conn.prepare("SELECT fsrs_card_state FROM reviews WHERE item_kind = ?1")?;
    let blobs = stmt
        .query_map(params![kind.as_str()], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>>>()?;

    let mastered = blobs
        .iter()
        .filter_map(|blob| Card::from_json(blob).ok())
        .filter(|card| card.stability.is_some_and(|s| s >= MASTERY_STABILITY_DAYS))
        .count();
    Ok(mastered as i64)
}

/// Percentage of flashcard answers rated Good or Easy; 0 with no history.
pub fn retention_rate(conn: &Connection, range: &DateRange) -> Result<f64> {
    let mut sql = String::from(
        "SELECT COUNT(*), COALESCE(SUM(CASE WHEN rating >= 3 THEN 1 ELSE 0 END), 0) \
         FROM review_history WHERE 1=1",
    );
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();
    push_range(&mut sql, "reviewed_at", range, &mut values);

    let (total, good): (i64, i64) =
        conn.query_row(&sql, params_from_iter(values), |row| Ok((row.get(0)?, row.get(1)?)))?;
    if total == 0 {
        return Ok(0.0);
    }
    Ok(100.0 * good as f64 / total as f64)
}

/// Mean of non-null durations across both histories; 0 with no samples.
pub fn avg_review_duration_ms(conn: &Connection, range: &DateRange) -> Result<f64> {
    let mut total_sum = 0i64;
    let mut total_count = 0i64;

    for table in ["review_history", "mcq_review_history"] {
        let mut sql = format!(
            "SELECT COALESCE(SUM(duration_ms), 0), COUNT(duration_ms) FROM {} \
             WHERE duration_ms IS NOT NULL",
            table
        );
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();
        push_range(&mut sql, "reviewed_at", range, &mut values);

        let (sum, count): (i64, i64) =
            conn.query_row(&sql, params_from_iter(values), |row| Ok((row.get(0)?, row.get(1)?)))?;
        total_sum += sum;
        total_count += count;
    }

    if total_count == 0 {
        return Ok(0.0);
    }
    Ok(total_sum as f64 / total_count as f64)
}

/// Reviews per UTC day (both modes), ascending by date.
pub fn daily_review_counts(conn: &Connection, range: &DateRange) -> Result<Vec<(NaiveDate, i64)>> {
    let mut sql = String::from(
        "SELECT day, SUM(n) FROM ( \
           SELECT date(reviewed_at) AS day, COUNT(*) AS n FROM review_history WHERE 1=1",
    );
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();
    push_range(&mut sql, "reviewed_at", range, &mut values);
    sql.push_str(
        " GROUP BY day \
          UNION ALL \
          SELECT date(reviewed_at) AS day, COUNT(*) AS n FROM mcq_review_history WHERE 1=1",
    );
    push_range(&mut sql, "reviewed_at", range, &mut values);
    sql.push_str(" GROUP BY day ) GROUP BY day ORDER BY day ASC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), |row| {
            let day: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((day, count))
        })?
        .collect::<Result<Vec<_>>>()?;

    Ok(rows
        .into_iter()
        .filter_map(|(day, count)| {
            NaiveDate::parse_from_str(&day, "%Y-%m-%d")
                .ok()
                .map(|d| (d, count))
        })
        .collect())
}

#[derive(Debug, Clone)]
pub struct MostReviewed {
    pub item_id: i64,
    pub item_kind: ItemKind,
    pub surface: String,
    pub review_count: i64,
}

/// Top items by lifetime review count, both modes summed.
pub fn most_reviewed(conn: &Connection, limit: usize) -> Result<Vec<MostReviewed>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT u.item_id, u.item_kind, SUM(u.review_count) AS total,
               COALESCE(v.word, k.character, '?') AS surface
        FROM (
            SELECT item_id, item_kind, review_count FROM reviews
            UNION ALL
            SELECT item_id, item_kind, review_count FROM mcq_reviews
        ) u
        LEFT JOIN vocabulary v ON u.item_kind = 'vocab' AND v.id = u.item_id
        LEFT JOIN kanji k ON u.item_kind = 'kanji' AND k.id = u.item_id
        GROUP BY u.item_id, u.item_kind
        ORDER BY total DESC
        LIMIT ?1
        "#,
    )?;

    let items = stmt
        .query_map(params![limit as i64], |row| {
            let kind: String = row.get(1)?;
            Ok(MostReviewed {
                item_id: row.get(0)?,
                item_kind: ItemKind::from_str(&kind).unwrap_or(ItemKind::Vocab),
                review_count: row.get(2)?,
                surface: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>>>()?;
    Ok(items)
}

/// MCQ accuracy percentage, optionally narrowed by kind and level;
/// 0 with no history.
pub fn mcq_accuracy_rate(
    conn: &Connection,
    range: &DateRange,
    item_kind: Option<ItemKind>,
    jlpt_level: Option<JlptLevel>,
) -> Result<f64> {
    let mut sql = String::from(
        r#"
        SELECT COUNT(*), COALESCE(SUM(h.is_correct), 0)
        FROM mcq_review_history h
        JOIN mcq_reviews r ON r.id = h.review_id
        LEFT JOIN vocabulary v ON r.item_kind = 'vocab' AND v.id = r.item_id
        LEFT JOIN kanji k ON r.item_kind = 'kanji' AND k.id = r.item_id
        WHERE 1=1
        "#,
    );
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();
    push_range(&mut sql, "h.reviewed_at", range, &mut values);
    if let Some(kind) = item_kind {
        sql.push_str(" AND r.item_kind = ?");
        values.push(Box::new(kind.as_str().to_string()));
    }
    if let Some(level) = jlpt_level {
        sql.push_str(" AND COALESCE(v.jlpt_level, k.jlpt_level) = ?");
        values.push(Box::new(level.as_str().to_string()));
    }

    let (total, correct): (i64, i64) =
        conn.query_row(&sql, params_from_iter(values), |row| Ok((row.get(0)?, row.get(1)?)))?;
    if total == 0 {
        return Ok(0.0);
    }
    Ok(100.0 * correct as f64 / total as f64)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct McqBucket {
    pub total: i64,
    pub correct: i64,
}

impl McqBucket {
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 * self.correct as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct McqTypeStats {
    pub vocab: McqBucket,
    pub kanji: McqBucket,
    pub overall: McqBucket,
}

pub fn mcq_stats_by_type(conn: &Connection, range: &DateRange) -> Result<McqTypeStats> {
    let mut sql = String::from(
        r#"
        SELECT r.item_kind, COUNT(*), COALESCE(SUM(h.is_correct), 0)
        FROM mcq_review_history h
        JOIN mcq_reviews r ON r.id = h.review_id
        WHERE 1=1
        "#,
    );
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();
    push_range(&mut sql, "h.reviewed_at", range, &mut values);
    sql.push_str(" GROUP BY r.item_kind");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), |row| {
            let kind: String = row.get(0)?;
            let total: i64 = row.get(1)?;
            let correct: i64 = row.get(2)?;
            Ok((kind, total, correct))
        })?
        .collect::<Result<Vec<_>>>()?;

    let mut stats = McqTypeStats::default();
    for (kind, total, correct) in rows {
        let bucket = McqBucket { total, correct };
        match ItemKind::from_str(&kind) {
            Some(ItemKind::Vocab) => stats.vocab = bucket,
            Some(ItemKind::Kanji) => stats.kanji = bucket,
            None => {}
        }
        stats.overall.total += total;
        stats.overall.correct += correct;
    }
    Ok(stats)
}

/// How often each option position was picked, indexed 0..=3 (A..D).
/// A heavy skew flags positional selection bias.
pub fn mcq_option_distribution(conn: &Connection, range: &DateRange) -> Result<[i64; 4]> {
    let mut sql = String::from(
        "SELECT selected_option, COUNT(*) FROM mcq_review_history WHERE 1=1",
    );
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();
    push_range(&mut sql, "reviewed_at", range, &mut values);
    sql.push_str(" GROUP BY selected_option");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), |row| {
            let option: i64 = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((option, count))
        })?
        .collect::<Result<Vec<_>>>()?;

    let mut distribution = [0i64; 4];
    for (option, count) in rows {
        if (0..4).contains(&option) {
            distribution[option as usize] = count;
        }
    }
    Ok(distribution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::reviews::{
        FLASH_TABLES, MCQ_TABLES, insert_flash_history, insert_mcq_history, insert_review,
    };
    use crate::domain::{Card, Rating};
    use crate::testing::{TestEnv, insert_kanji_at_level, insert_vocab_at_level};
    use chrono::{TimeZone, Utc};

    #[test]
    fn counts_by_level_cover_all_levels() {
        let env = TestEnv::new();
        let conn = env.conn();
        insert_vocab_at_level(&conn, "水", "みず", JlptLevel::N5);
        insert_vocab_at_level(&conn, "経済", "けいざい", JlptLevel::N3);
        insert_kanji_at_level(&conn, "水", JlptLevel::N5);

        let vocab = vocab_count_by_level(&conn).unwrap();
        assert_eq!(vocab[&JlptLevel::N5], 1);
        assert_eq!(vocab[&JlptLevel::N3], 1);
        assert_eq!(vocab[&JlptLevel::N1], 0);

        let kanji = kanji_count_by_level(&conn).unwrap();
        assert_eq!(kanji[&JlptLevel::N5], 1);
    }

    #[test]
    fn retention_rate_empty_history_is_zero() {
        let env = TestEnv::new();
        let conn = env.conn();
        assert_eq!(retention_rate(&conn, &DateRange::all()).unwrap(), 0.0);
    }

    #[test]
    fn retention_rate_counts_good_and_easy() {
        let env = TestEnv::new();
        let conn = env.conn();
        let now = Utc::now();
        let item_id = insert_vocab_at_level(&conn, "水", "みず", JlptLevel::N5);
        let review_id =
            insert_review(&conn, FLASH_TABLES, item_id, ItemKind::Vocab, &Card::new(now)).unwrap();

        for rating in [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy] {
            insert_flash_history(&conn, review_id, rating, None, now).unwrap();
        }

        let rate = retention_rate(&conn, &DateRange::all()).unwrap();
        assert!((rate - 50.0).abs() < 1e-9);
        assert!((0.0..=100.0).contains(&rate));
    }

    #[test]
    fn mastered_reads_card_stability() {
        let env = TestEnv::new();
        let conn = env.conn();
        let now = Utc::now();

        let strong_id = insert_vocab_at_level(&conn, "水", "みず", JlptLevel::N5);
        let mut strong = Card::new(now);
        strong.stability = Some(30.0);
        insert_review(&conn, FLASH_TABLES, strong_id, ItemKind::Vocab, &strong).unwrap();

        let weak_id = insert_vocab_at_level(&conn, "火", "ひ", JlptLevel::N5);
        let mut weak = Card::new(now);
        weak.stability = Some(3.0);
        insert_review(&conn, FLASH_TABLES, weak_id, ItemKind::Vocab, &weak).unwrap();

        assert_eq!(mastered_count(&conn, ItemKind::Vocab).unwrap(), 1);
        assert_eq!(mastered_count(&conn, ItemKind::Kanji).unwrap(), 0);
    }

    #[test]
    fn avg_duration_ignores_null_samples() {
        let env = TestEnv::new();
        let conn = env.conn();
        let now = Utc::now();
        let item_id = insert_vocab_at_level(&conn, "水", "みず", JlptLevel::N5);
        let review_id =
            insert_review(&conn, FLASH_TABLES, item_id, ItemKind::Vocab, &Card::new(now)).unwrap();

        insert_flash_history(&conn, review_id, Rating::Good, Some(2000), now).unwrap();
        insert_flash_history(&conn, review_id, Rating::Good, Some(4000), now).unwrap();
        insert_flash_history(&conn, review_id, Rating::Good, None, now).unwrap();

        let avg = avg_review_duration_ms(&conn, &DateRange::all()).unwrap();
        assert!((avg - 3000.0).abs() < 1e-9);
    }

    #[test]
    fn daily_counts_and_range_filter() {
        let env = TestEnv::new();
        let conn = env.conn();
        let item_id = insert_vocab_at_level(&conn, "水", "みず", JlptLevel::N5);
        let day1 = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2025, 1, 2, 9, 0, 0).unwrap();
        let review_id =
            insert_review(&conn, FLASH_TABLES, item_id, ItemKind::Vocab, &Card::new(day1)).unwrap();

        insert_flash_history(&conn, review_id, Rating::Good, None, day1).unwrap();
        insert_flash_history(&conn, review_id, Rating::Good, None, day1).unwrap();
        insert_flash_history(&conn, review_id, Rating::Good, None, day2).unwrap();

        let all = daily_review_counts(&conn, &DateRange::all()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], (day1.date_naive(), 2));
        assert_eq!(all[1], (day2.date_naive(), 1));

        let only_first = DateRange {
            start: Some(day1.date_naive()),
            end: Some(day1.date_naive()),
        };
        let filtered = daily_review_counts(&conn, &only_first).unwrap();
        assert_eq!(filtered, vec![(day1.date_naive(), 2)]);
    }

    #[test]
    fn most_reviewed_sums_both_modes() {
        let env = TestEnv::new();
        let conn = env.conn();
        let now = Utc::now();

        let busy = insert_vocab_at_level(&conn, "水", "みず", JlptLevel::N5);
        let quiet = insert_vocab_at_level(&conn, "火", "ひ", JlptLevel::N5);

        let busy_flash =
            insert_review(&conn, FLASH_TABLES, busy, ItemKind::Vocab, &Card::new(now)).unwrap();
        let busy_mcq =
            insert_review(&conn, MCQ_TABLES, busy, ItemKind::Vocab, &Card::new(now)).unwrap();
        insert_review(&conn, FLASH_TABLES, quiet, ItemKind::Vocab, &Card::new(now)).unwrap();

        for _ in 0..3 {
            crate::db::reviews::update_review_after_apply(
                &conn,
                FLASH_TABLES,
                busy_flash,
                &Card::new(now),
                now,
            )
            .unwrap();
        }
        crate::db::reviews::update_review_after_apply(&conn, MCQ_TABLES, busy_mcq, &Card::new(now), now)
            .unwrap();

        let top = most_reviewed(&conn, 1).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].item_id, busy);
        assert_eq!(top[0].review_count, 4);
        assert_eq!(top[0].surface, "水");
    }

    #[test]
    fn option_distribution_detects_bias() {
        let env = TestEnv::new();
        let conn = env.conn();
        let now = Utc::now();
        let item_id = insert_vocab_at_level(&conn, "水", "みず", JlptLevel::N5);
        let review_id =
            insert_review(&conn, MCQ_TABLES, item_id, ItemKind::Vocab, &Card::new(now)).unwrap();

        // A user who always answers A
        let mut correct_count = 0;
        for i in 0..100 {
            let is_correct = i % 4 == 0;
            if is_correct {
                correct_count += 1;
            }
            insert_mcq_history(&conn, review_id, 0, is_correct, Some(1500), now).unwrap();
        }

        let distribution = mcq_option_distribution(&conn, &DateRange::all()).unwrap();
        assert_eq!(distribution, [100, 0, 0, 0]);

        let accuracy = mcq_accuracy_rate(&conn, &DateRange::all(), None, None).unwrap();
        assert!((accuracy - correct_count as f64).abs() < 1e-9);
    }

    #[test]
    fn mcq_stats_split_by_kind() {
        let env = TestEnv::new();
        let conn = env.conn();
        let now = Utc::now();

        let vocab_id = insert_vocab_at_level(&conn, "水", "みず", JlptLevel::N5);
        let kanji_id = insert_kanji_at_level(&conn, "水", JlptLevel::N5);
        let vocab_review =
            insert_review(&conn, MCQ_TABLES, vocab_id, ItemKind::Vocab, &Card::new(now)).unwrap();
        let kanji_review =
            insert_review(&conn, MCQ_TABLES, kanji_id, ItemKind::Kanji, &Card::new(now)).unwrap();

        insert_mcq_history(&conn, vocab_review, 0, true, None, now).unwrap();
        insert_mcq_history(&conn, vocab_review, 1, false, None, now).unwrap();
        insert_mcq_history(&conn, kanji_review, 2, true, None, now).unwrap();

        let stats = mcq_stats_by_type(&conn, &DateRange::all()).unwrap();
        assert_eq!(stats.vocab.total, 2);
        assert_eq!(stats.vocab.correct, 1);
        assert!((stats.vocab.accuracy() - 50.0).abs() < 1e-9);
        assert_eq!(stats.kanji.total, 1);
        assert_eq!(stats.overall.total, 3);
        assert_eq!(stats.overall.correct, 2);

        let kanji_only =
            mcq_accuracy_rate(&conn, &DateRange::all(), Some(ItemKind::Kanji), None).unwrap();
        assert!((kanji_only - 100.0).abs() < 1e-9);
    }
}
