//! Grammar point record store.
//!
//! Grammar points are reference material only; they never enter the review
//! schedulers.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Result, params};

use crate::domain::JlptLevel;

use super::items::parse_timestamp;

#[derive(Debug, Clone)]
pub struct GrammarPoint {
    pub id: i64,
    pub title: String,
    pub structure: Option<String>,
    pub explanation: Option<String>,
    pub examples: Vec<String>,
    pub jlpt_level: JlptLevel,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GrammarPoint {
    pub fn new(title: String, jlpt_level: JlptLevel) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            title,
            structure: None,
            explanation: None,
            examples: Vec::new(),
            jlpt_level,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}

pub fn insert_grammar_point(conn: &Connection, point: &GrammarPoint) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO grammar_points (title, structure, explanation, examples, jlpt_level,
                                    notes, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        params![
            point.title,
            point.structure,
            point.explanation,
            serde_json::to_string(&point.examples).unwrap_or_else(|_| "[]".to_string()),
            point.jlpt_level.as_str(),
            point.notes,
            point.created_at.to_rfc3339(),
            point.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_grammar_point(conn: &Connection, id: i64) -> Result<Option<GrammarPoint>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, title, structure, explanation, examples, jlpt_level, notes, created_at, updated_at
        FROM grammar_points WHERE id = ?1
        "#,
    )?;
    let mut rows = stmt.query(params![id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_grammar_point(row)?)),
        None => Ok(None),
    }
}

pub fn list_grammar_points(
    conn: &Connection,
    jlpt_level: Option<JlptLevel>,
) -> Result<Vec<GrammarPoint>> {
    let mut stmt;
    let points = match jlpt_level {
        Some(level) => {
            stmt = conn.prepare(
                r#"
                SELECT id, title, structure, explanation, examples, jlpt_level, notes,
                       created_at, updated_at
                FROM grammar_points WHERE jlpt_level = ?1 ORDER BY id ASC
                "#,
            )?;
            stmt.query_map(params![level.as_str()], row_to_grammar_point)?
                .collect::<Result<Vec<_>>>()?
        }
        None => {
            stmt = conn.prepare(
                r#"
                SELECT id, title, structure, explanation, examples, jlpt_level, notes,
                       created_at, updated_at
                FROM grammar_points ORDER BY id ASC
                "#,
            )?;
            stmt.query_map([], row_to_grammar_point)?
                .collect::<Result<Vec<_>>>()?
        }
    };
    Ok(points)
}

pub fn update_grammar_point(conn: &Connection, point: &GrammarPoint) -> Result<usize> {
    conn.execute(
        r#"
        UPDATE grammar_points
        SET title = ?1, structure = ?2, explanation = ?3, examples = ?4, jlpt_level = ?5,
            notes = ?6, updated_at = ?7
        WHERE id = ?8
        "#,
        params![
            point.title,
            point.structure,
            point.explanation,
            serde_json::to_string(&point.examples).unwrap_or_else(|_| "[]".to_string()),
            point.jlpt_level.as_str(),
            point.notes,
            Utc::now().to_rfc3339(),
            point.id,
        ],
    )
}

pub fn delete_grammar_point(conn: &Connection, id: i64) -> Result<usize> {
    conn.execute("DELETE FROM grammar_points WHERE id = ?1", params![id])
}

fn row_to_grammar_point(row: &rusqlite::Row) -> Result<GrammarPoint> {
    let examples: String = row.get(4)?;
    let level: String = row.get(5)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    Ok(GrammarPoint {
        id: row.get(0)?,
        title: row.get(1)?,
        structure: row.get(2)?,
        explanation: row.get(3)?,
        examples: serde_json::from_str(&examples).unwrap_or_default(),
        jlpt_level: JlptLevel::from_str(&level).unwrap_or(JlptLevel::None),
        notes: row.get(6)?,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}
