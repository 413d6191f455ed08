//! Progress singleton: levels, streak, cached stat blobs.

use chrono::{Duration, NaiveDate, Utc};
use rusqlite::{Connection, Result, params};

use crate::domain::{JlptLevel, Progress};

use super::items::parse_timestamp;

const DEFAULT_USER: &str = "default";

pub fn get_progress(conn: &Connection) -> Result<Progress> {
    conn.query_row(
        r#"
        SELECT id, user_id, current_level, target_level, stats, milestones, streak_days,
               last_review_date, created_at, updated_at
        FROM progress WHERE user_id = ?1
        "#,
        params![DEFAULT_USER],
        row_to_progress,
    )
}

pub fn set_current_level(conn: &Connection, level: JlptLevel) -> Result<()> {
    conn.execute(
        "UPDATE progress SET current_level = ?1, updated_at = ?2 WHERE user_id = ?3",
        params![level.as_str(), Utc::now().to_rfc3339(), DEFAULT_USER],
    )?;
    Ok(())
}

pub fn set_target_level(conn: &Connection, level: JlptLevel) -> Result<()> {
    conn.execute(
        "UPDATE progress SET target_level = ?1, updated_at = ?2 WHERE user_id = ?3",
        params![level.as_str(), Utc::now().to_rfc3339(), DEFAULT_USER],
    )?;
    Ok(())
}

/// Streak maintenance, called by both schedulers inside the apply
/// transaction. Same day: unchanged. Consecutive day: increment.
/// Gap (or first ever review): reset to 1. Returns the new streak.
pub fn record_study_day(conn: &Connection, today: NaiveDate) -> Result<i64> {
    let progress = get_progress(conn)?;

    let streak = match progress.last_review_date {
        Some(last) if last == today => return Ok(progress.streak_days),
        Some(last) if last + Duration::days(1) == today => progress.streak_days + 1,
        _ => 1,
    };

    conn.execute(
        r#"
        UPDATE progress SET streak_days = ?1, last_review_date = ?2, updated_at = ?3
        WHERE user_id = ?4
        "#,
        params![
            streak,
            today.format("%Y-%m-%d").to_string(),
            Utc::now().to_rfc3339(),
            DEFAULT_USER,
        ],
    )?;
    Ok(streak)
}

fn row_to_progress(row: &rusqlite::Row) -> Result<Progress> {
    let current_level: String = row.get(2)?;
    let target_level: String = row.get(3)?;
    let stats: String = row.get(4)?;
    let milestones: String = row.get(5)?;
    let last_review_date: Option<String> = row.get(7)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;

    Ok(Progress {
        id: row.get(0)?,
        user_id: row.get(1)?,
        current_level: JlptLevel::from_str(&current_level).unwrap_or(JlptLevel::N5),
        target_level: JlptLevel::from_str(&target_level).unwrap_or(JlptLevel::N1),
        stats: serde_json::from_str(&stats).unwrap_or_default(),
        milestones: serde_json::from_str(&milestones).unwrap_or_default(),
        streak_days: row.get(6)?,
        last_review_date: last_review_date
            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}
