//! Test utilities for database setup.
//!
//! Reuses the authoritative migrations against a temp-dir database so test
//! schemas can never drift from production, plus small item factories used
//! across the store and scheduler tests.

use std::sync::MutexGuard;

use rusqlite::Connection;
use tempfile::TempDir;

use crate::db::{self, DbPool};
use crate::domain::{JlptLevel, KanjiItem, Lang, Meanings, VocabItem};

/// A fully migrated database in a temporary directory, cleaned up on drop.
pub struct TestEnv {
    /// Kept alive for the database file
    pub temp: TempDir,
    pub pool: DbPool,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("create temp dir");
        let pool = db::init_db(&temp.path().join("study.db")).expect("init test database");
        Self { temp, pool }
    }

    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        db::try_lock(&self.pool).expect("test database lock")
    }
}

pub fn bilingual(vi: &str, en: &str) -> Meanings {
    let mut meanings = Meanings::new();
    meanings.insert(Lang::Vi, vec![vi.to_string()]);
    meanings.insert(Lang::En, vec![en.to_string()]);
    meanings
}

pub fn vocab_fixture(word: &str, reading: &str, level: JlptLevel, vi: &str, en: &str) -> VocabItem {
    VocabItem::new(word.to_string(), reading.to_string(), level, bilingual(vi, en))
}

pub fn kanji_fixture(character: &str, level: JlptLevel, vi: &str, en: &str) -> KanjiItem {
    KanjiItem::new(character.to_string(), level, bilingual(vi, en))
}

pub fn insert_vocab_at_level(conn: &Connection, word: &str, reading: &str, level: JlptLevel) -> i64 {
    db::items::insert_vocab(conn, &vocab_fixture(word, reading, level, "nghĩa", "meaning"))
        .expect("insert vocab fixture")
}

pub fn insert_kanji_at_level(conn: &Connection, character: &str, level: JlptLevel) -> i64 {
    db::items::insert_kanji(conn, &kanji_fixture(character, level, "nghĩa", "meaning"))
        .expect("insert kanji fixture")
}
