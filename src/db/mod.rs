pub mod grammar;
pub mod items;
pub mod progress;
pub mod reviews;
pub mod schema;
pub mod stats;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;

use crate::domain::{JlptLevel, KanjiItem, Lang, Meanings, VocabItem};
use crate::error::{Result, StudyError};

pub use schema::run_migrations;

pub type DbPool = Arc<Mutex<Connection>>;

/// Try to acquire the database lock, surfacing poison as a backend error.
pub fn try_lock(pool: &DbPool) -> Result<MutexGuard<'_, Connection>> {
    pool.lock().map_err(|_: PoisonError<_>| {
        tracing::error!("database mutex poisoned - a thread panicked while holding the lock");
        StudyError::Backend("database unavailable".to_string())
    })
}

/// Open (creating if needed) and migrate the database at `path`.
pub fn init_db(path: &Path) -> Result<DbPool> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let conn = Connection::open(path)
        .map_err(|e| StudyError::Backend(format!("cannot open {}: {}", path.display(), e)))?;
    // History rows cascade from their review; SQLite leaves FKs off by default
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    run_migrations(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// Insert a small N5 starter set so a fresh install has something to study.
/// No-op when the catalog is non-empty.
pub fn seed_starter_items(conn: &Connection) -> Result<usize> {
    let vocab_count: i64 = conn.query_row("SELECT COUNT(*) FROM vocabulary", [], |row| row.get(0))?;
    let kanji_count: i64 = conn.query_row("SELECT COUNT(*) FROM kanji", [], |row| row.get(0))?;
    if vocab_count > 0 || kanji_count > 0 {
        return Ok(0);
    }

    let mut inserted = 0;
    for item in starter_vocab() {
        items::insert_vocab(conn, &item)?;
        inserted += 1;
    }
    for item in starter_kanji() {
        items::insert_kanji(conn, &item)?;
        inserted += 1;
    }
    Ok(inserted)
}

fn meanings(vi: &[&str], en: &[&str]) -> Meanings {
    let mut map = Meanings::new();
    map.insert(Lang::Vi, vi.iter().map(|s| s.to_string()).collect());
    map.insert(Lang::En, en.iter().map(|s| s.to_string()).collect());
    map
}

fn vocab(word: &str, reading: &str, pos: &str, vi: &[&str], en: &[&str]) -> VocabItem {
    let mut item = VocabItem::new(
        word.to_string(),
        reading.to_string(),
        JlptLevel::N5,
        meanings(vi, en),
    );
    item.part_of_speech = Some(pos.to_string());
    item
}

fn kanji(
    character: &str,
    on: &[&str],
    kun: &[&str],
    strokes: u32,
    radical: &str,
    vi: &[&str],
    en: &[&str],
) -> KanjiItem {
    let mut item = KanjiItem::new(character.to_string(), JlptLevel::N5, meanings(vi, en));
    item.on_readings = on.iter().map(|s| s.to_string()).collect();
    item.kun_readings = kun.iter().map(|s| s.to_string()).collect();
    item.stroke_count = Some(strokes);
    item.radical = Some(radical.to_string());
    item
}

fn starter_vocab() -> Vec<VocabItem> {
    vec![
        vocab("水", "みず", "noun", &["nước"], &["water"]),
        vocab("火", "ひ", "noun", &["lửa"], &["fire"]),
        vocab("猫", "ねこ", "noun", &["con mèo"], &["cat"]),
        vocab("犬", "いぬ", "noun", &["con chó"], &["dog"]),
        vocab("食べる", "たべる", "verb", &["ăn"], &["to eat"]),
        vocab("飲む", "のむ", "verb", &["uống"], &["to drink"]),
        vocab("見る", "みる", "verb", &["nhìn", "xem"], &["to see", "to watch"]),
        vocab("行く", "いく", "verb", &["đi"], &["to go"]),
        vocab("大きい", "おおきい", "adjective", &["to lớn"], &["big"]),
        vocab("小さい", "ちいさい", "adjective", &["nhỏ bé"], &["small"]),
        vocab("学校", "がっこう", "noun", &["trường học"], &["school"]),
        vocab("先生", "せんせい", "noun", &["giáo viên"], &["teacher"]),
    ]
}

fn starter_kanji() -> Vec<KanjiItem> {
    vec![
        kanji("水", &["スイ"], &["みず"], 4, "水", &["thủy", "nước"], &["water"]),
        kanji("火", &["カ"], &["ひ"], 4, "火", &["hỏa", "lửa"], &["fire"]),
        kanji("木", &["モク", "ボク"], &["き"], 4, "木", &["mộc", "cây"], &["tree", "wood"]),
        kanji("金", &["キン"], &["かね"], 8, "金", &["kim", "tiền"], &["gold", "money"]),
        kanji("土", &["ド", "ト"], &["つち"], 3, "土", &["thổ", "đất"], &["earth", "soil"]),
        kanji("日", &["ニチ", "ジツ"], &["ひ"], 4, "日", &["nhật", "ngày"], &["sun", "day"]),
        kanji("月", &["ゲツ", "ガツ"], &["つき"], 4, "月", &["nguyệt", "tháng"], &["moon", "month"]),
        kanji("人", &["ジン", "ニン"], &["ひと"], 2, "人", &["nhân", "người"], &["person"]),
    ]
}

#[cfg(test)]
mod tests {
    use crate::testing::TestEnv;

    #[test]
    fn seed_is_idempotent() {
        let env = TestEnv::new();
        let conn = env.conn();
        let first = super::seed_starter_items(&conn).unwrap();
        assert!(first > 0);
        let second = super::seed_starter_items(&conn).unwrap();
        assert_eq!(second, 0);
    }
}
