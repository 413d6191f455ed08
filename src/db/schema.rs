//! Database schema and migrations.
//!
//! Version-gated migration system: each migration checks the current schema
//! version, runs its SQL, and records the new version in `db_version`.
//! Migrations only run once - the version check ensures idempotency.

use chrono::Utc;
use rusqlite::{Connection, Result, params};

/// Current schema version.
/// Increment this when adding a new migration.
pub const SCHEMA_VERSION: i32 = 2;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    // Bootstrap: ensure db_version table exists (needed to check version)
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS db_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL,
            description TEXT
        );
        "#,
    )?;

    let current_version = get_schema_version(conn)?;
    tracing::trace!("schema version: {}", current_version);

    if current_version < 1 {
        migrate_v0_to_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v1_to_v2(conn)?;
    }

    Ok(())
}

/// v0→v1: item catalog, flashcard reviews, history, progress
fn migrate_v0_to_v1(conn: &Connection) -> Result<()> {
    tracing::info!("Running migration v0→v1: Create base tables");

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS vocabulary (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            word TEXT NOT NULL,
            reading TEXT NOT NULL,
            sino_vietnamese TEXT,
            part_of_speech TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            jlpt_level TEXT NOT NULL DEFAULT 'none',
            meanings TEXT NOT NULL,
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS kanji (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            character TEXT NOT NULL UNIQUE,
            on_readings TEXT NOT NULL DEFAULT '[]',
            kun_readings TEXT NOT NULL DEFAULT '[]',
            sino_vietnamese TEXT,
            stroke_count INTEGER,
            radical TEXT,
            jlpt_level TEXT NOT NULL DEFAULT 'none',
            meanings TEXT NOT NULL,
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS grammar_points (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            structure TEXT,
            explanation TEXT,
            examples TEXT NOT NULL DEFAULT '[]',
            jlpt_level TEXT NOT NULL DEFAULT 'none',
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS reviews (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            item_id INTEGER NOT NULL,
            item_kind TEXT NOT NULL CHECK (item_kind IN ('vocab', 'kanji')),
            fsrs_card_state TEXT NOT NULL,
            due_date TEXT NOT NULL,
            last_reviewed TEXT,
            review_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (item_id, item_kind)
        );

        CREATE TABLE IF NOT EXISTS review_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            review_id INTEGER NOT NULL REFERENCES reviews(id) ON DELETE CASCADE,
            rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 4),
            duration_ms INTEGER,
            reviewed_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS progress (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL UNIQUE,
            current_level TEXT NOT NULL DEFAULT 'n5',
            target_level TEXT NOT NULL DEFAULT 'n1',
            stats TEXT NOT NULL DEFAULT '{}',
            milestones TEXT NOT NULL DEFAULT '{}',
            streak_days INTEGER NOT NULL DEFAULT 0,
            last_review_date TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_vocabulary_level ON vocabulary(jlpt_level);
        CREATE INDEX IF NOT EXISTS idx_kanji_level ON kanji(jlpt_level);
        CREATE INDEX IF NOT EXISTS idx_grammar_points_level ON grammar_points(jlpt_level);
        CREATE INDEX IF NOT EXISTS idx_reviews_due ON reviews(due_date);
        CREATE INDEX IF NOT EXISTS idx_review_history_review ON review_history(review_id);
        CREATE INDEX IF NOT EXISTS idx_review_history_reviewed_at ON review_history(reviewed_at);
        "#,
    )?;

    // Singleton progress row; timestamps need binding so it sits outside the batch
    let now = Utc::now().to_rfc3339();
    conn.execute(
        r#"
        INSERT OR IGNORE INTO progress (user_id, created_at, updated_at)
        VALUES ('default', ?1, ?1)
        "#,
        params![now],
    )?;

    record_version(conn, 1, "Create base tables")?;
    Ok(())
}

/// v1→v2: multiple-choice reviews get their own tables, mirroring the
/// flashcard pair so the two schedulers never share memory state
fn migrate_v1_to_v2(conn: &Connection) -> Result<()> {
    tracing::info!("Running migration v1→v2: Create MCQ review tables");

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS mcq_reviews (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            item_id INTEGER NOT NULL,
            item_kind TEXT NOT NULL CHECK (item_kind IN ('vocab', 'kanji')),
            fsrs_card_state TEXT NOT NULL,
            due_date TEXT NOT NULL,
            last_reviewed TEXT,
            review_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (item_id, item_kind)
        );

        CREATE TABLE IF NOT EXISTS mcq_review_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            review_id INTEGER NOT NULL REFERENCES mcq_reviews(id) ON DELETE CASCADE,
            selected_option INTEGER NOT NULL CHECK (selected_option BETWEEN 0 AND 3),
            is_correct INTEGER NOT NULL CHECK (is_correct IN (0, 1)),
            duration_ms INTEGER,
            reviewed_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_mcq_reviews_due ON mcq_reviews(due_date);
        CREATE INDEX IF NOT EXISTS idx_mcq_review_history_review ON mcq_review_history(review_id);
        CREATE INDEX IF NOT EXISTS idx_mcq_review_history_reviewed_at ON mcq_review_history(reviewed_at);
        "#,
    )?;

    record_version(conn, 2, "Create MCQ review tables")?;
    Ok(())
}

/// Get current schema version (0 if no versions recorded)
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM db_version",
        [],
        |row| row.get(0),
    )
}

/// Record a schema version after successful migration
fn record_version(conn: &Connection, version: i32, description: &str) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO db_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
        params![version, now, description],
    )?;
    tracing::info!("Recorded schema version {} - {}", version, description);
    Ok(())
}
