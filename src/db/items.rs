//! Item catalog: vocabulary and kanji CRUD plus the filtered read API used
//! by the schedulers, the question generator, and the statistics layer.

use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{Connection, Result, params, params_from_iter};

use crate::domain::{Item, ItemKind, JlptLevel, KanjiItem, Meanings, VocabItem};

const VOCAB_COLUMNS: &str = "id, word, reading, sino_vietnamese, part_of_speech, tags, \
                             jlpt_level, meanings, notes, created_at, updated_at";
const KANJI_COLUMNS: &str = "id, character, on_readings, kun_readings, sino_vietnamese, \
                             stroke_count, radical, jlpt_level, meanings, notes, created_at, updated_at";

/// Conjunctive catalog filter. `Default` matches everything.
#[derive(Debug, Clone, Default)]
pub struct ItemQuery {
    pub jlpt_level: Option<JlptLevel>,
    /// Vocabulary: kana reading starts with this.
    /// Kanji: some on-reading starts with this.
    pub reading_prefix: Option<String>,
    /// Any meaning string, in any language, contains this
    pub meaning_substring: Option<String>,
    /// Kanji only
    pub radical: Option<String>,
    /// Kanji only, inclusive bounds
    pub stroke_count_range: Option<(u32, u32)>,
    pub exclude_ids: Vec<i64>,
    pub limit: Option<usize>,
    /// Sample in random order instead of by id
    pub randomize: bool,
}

impl ItemQuery {
    pub fn level(level: JlptLevel) -> Self {
        Self {
            jlpt_level: Some(level),
            ..Self::default()
        }
    }
}

pub fn insert_vocab(conn: &Connection, item: &VocabItem) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO vocabulary (word, reading, sino_vietnamese, part_of_speech, tags,
                                jlpt_level, meanings, notes, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            item.word,
            item.reading,
            item.sino_vietnamese,
            item.part_of_speech,
            to_json(&item.tags),
            item.jlpt_level.as_str(),
            meanings_to_json(&item.meanings),
            item.notes,
            item.created_at.to_rfc3339(),
            item.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_kanji(conn: &Connection, item: &KanjiItem) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO kanji (character, on_readings, kun_readings, sino_vietnamese, stroke_count,
                           radical, jlpt_level, meanings, notes, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
        params![
            item.character,
            to_json(&item.on_readings),
            to_json(&item.kun_readings),
            item.sino_vietnamese,
            item.stroke_count,
            item.radical,
            item.jlpt_level.as_str(),
            meanings_to_json(&item.meanings),
            item.notes,
            item.created_at.to_rfc3339(),
            item.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_vocab(conn: &Connection, id: i64) -> Result<Option<VocabItem>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM vocabulary WHERE id = ?1",
        VOCAB_COLUMNS
    ))?;
    let mut rows = stmt.query(params![id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_vocab(row)?)),
        None => Ok(None),
    }
}

pub fn get_kanji(conn: &Connection, id: i64) -> Result<Option<KanjiItem>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM kanji WHERE id = ?1", KANJI_COLUMNS))?;
    let mut rows = stmt.query(params![id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_kanji(row)?)),
        None => Ok(None),
    }
}

pub fn get_item(conn: &Connection, kind: ItemKind, id: i64) -> Result<Option<Item>> {
    match kind {
        ItemKind::Vocab => Ok(get_vocab(conn, id)?.map(Item::Vocab)),
        ItemKind::Kanji => Ok(get_kanji(conn, id)?.map(Item::Kanji)),
    }
}

/// Full-row update; bumps `updated_at`, leaves review state alone.
pub fn update_vocab(conn: &Connection, item: &VocabItem) -> Result<usize> {
    conn.execute(
        r#"
        UPDATE vocabulary
        SET word = ?1, reading = ?2, sino_vietnamese = ?3, part_of_speech = ?4, tags = ?5,
            jlpt_level = ?6, meanings = ?7, notes = ?8, updated_at = ?9
        WHERE id = ?10
        "#,
        params![
            item.word,
            item.reading,
            item.sino_vietnamese,
            item.part_of_speech,
            to_json(&item.tags),
            item.jlpt_level.as_str(),
            meanings_to_json(&item.meanings),
            item.notes,
            Utc::now().to_rfc3339(),
            item.id,
        ],
    )
}

pub fn update_kanji(conn: &Connection, item: &KanjiItem) -> Result<usize> {
    conn.execute(
        r#"
        UPDATE kanji
        SET character = ?1, on_readings = ?2, kun_readings = ?3, sino_vietnamese = ?4,
            stroke_count = ?5, radical = ?6, jlpt_level = ?7, meanings = ?8, notes = ?9,
            updated_at = ?10
        WHERE id = ?11
        "#,
        params![
            item.character,
            to_json(&item.on_readings),
            to_json(&item.kun_readings),
            item.sino_vietnamese,
            item.stroke_count,
            item.radical,
            item.jlpt_level.as_str(),
            meanings_to_json(&item.meanings),
            item.notes,
            Utc::now().to_rfc3339(),
            item.id,
        ],
    )
}

pub fn list_vocab(conn: &Connection, query: &ItemQuery) -> Result<Vec<VocabItem>> {
    let (sql, values) = build_list_sql("vocabulary", VOCAB_COLUMNS, ItemKind::Vocab, query);
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(params_from_iter(values), |row| row_to_vocab(row))?
        .collect::<Result<Vec<_>>>()?;
    Ok(items)
}

pub fn list_kanji(conn: &Connection, query: &ItemQuery) -> Result<Vec<KanjiItem>> {
    let (sql, values) = build_list_sql("kanji", KANJI_COLUMNS, ItemKind::Kanji, query);
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(params_from_iter(values), |row| row_to_kanji(row))?
        .collect::<Result<Vec<_>>>()?;
    Ok(items)
}

/// Filtered catalog listing over either kind. Filters compose conjunctively.
pub fn list_items(conn: &Connection, kind: ItemKind, query: &ItemQuery) -> Result<Vec<Item>> {
    match kind {
        ItemKind::Vocab => Ok(list_vocab(conn, query)?.into_iter().map(Item::Vocab).collect()),
        ItemKind::Kanji => Ok(list_kanji(conn, query)?.into_iter().map(Item::Kanji).collect()),
    }
}

/// Assemble the WHERE clause for a catalog query. Every value is bound as a
/// parameter; only column names and placeholders reach the SQL text.
fn build_list_sql(
    table: &str,
    columns: &str,
    kind: ItemKind,
    query: &ItemQuery,
) -> (String, Vec<Box<dyn ToSql>>) {
    let mut sql = format!("SELECT {} FROM {} WHERE 1=1", columns, table);
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(level) = query.jlpt_level {
        sql.push_str(" AND jlpt_level = ?");
        values.push(Box::new(level.as_str().to_string()));
    }
    if let Some(prefix) = &query.reading_prefix {
        match kind {
            ItemKind::Vocab => sql.push_str(" AND reading LIKE ? || '%'"),
            // on_readings is a JSON array; an element starting with the
            // prefix follows an opening quote
            ItemKind::Kanji => sql.push_str(" AND on_readings LIKE '%\"' || ? || '%'"),
        }
        values.push(Box::new(prefix.clone()));
    }
    if let Some(substring) = &query.meaning_substring {
        sql.push_str(" AND meanings LIKE '%' || ? || '%'");
        values.push(Box::new(substring.clone()));
    }
    if let Some(radical) = &query.radical {
        sql.push_str(" AND radical = ?");
        values.push(Box::new(radical.clone()));
    }
    if let Some((min, max)) = query.stroke_count_range {
        sql.push_str(" AND stroke_count BETWEEN ? AND ?");
        values.push(Box::new(min));
        values.push(Box::new(max));
    }
    if !query.exclude_ids.is_empty() {
        let placeholders = vec!["?"; query.exclude_ids.len()].join(",");
        sql.push_str(&format!(" AND id NOT IN ({})", placeholders));
        for id in &query.exclude_ids {
            values.push(Box::new(*id));
        }
    }

    if query.randomize {
        sql.push_str(" ORDER BY RANDOM()");
    } else {
        sql.push_str(" ORDER BY id ASC");
    }
    if let Some(limit) = query.limit {
        sql.push_str(" LIMIT ?");
        values.push(Box::new(limit as i64));
    }

    (sql, values)
}

fn to_json(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

fn meanings_to_json(meanings: &Meanings) -> String {
    serde_json::to_string(meanings).unwrap_or_else(|_| "{}".to_string())
}

pub(crate) fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_vocab(row: &rusqlite::Row) -> Result<VocabItem> {
    let tags: String = row.get(5)?;
    let level: String = row.get(6)?;
    let meanings: String = row.get(7)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    Ok(VocabItem {
        id: row.get(0)?,
        word: row.get(1)?,
        reading: row.get(2)?,
        sino_vietnamese: row.get(3)?,
        part_of_speech: row.get(4)?,
        tags: serde_json::from_str(&tags).unwrap_or_default(),
        jlpt_level: JlptLevel::from_str(&level).unwrap_or(JlptLevel::None),
        meanings: serde_json::from_str(&meanings).unwrap_or_default(),
        notes: row.get(8)?,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

fn row_to_kanji(row: &rusqlite::Row) -> Result<KanjiItem> {
    let on_readings: String = row.get(2)?;
    let kun_readings: String = row.get(3)?;
    let level: String = row.get(7)?;
    let meanings: String = row.get(8)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;

    Ok(KanjiItem {
        id: row.get(0)?,
        character: row.get(1)?,
        on_readings: serde_json::from_str(&on_readings).unwrap_or_default(),
        kun_readings: serde_json::from_str(&kun_readings).unwrap_or_default(),
        sino_vietnamese: row.get(4)?,
        stroke_count: row.get(5)?,
        radical: row.get(6)?,
        jlpt_level: JlptLevel::from_str(&level).unwrap_or(JlptLevel::None),
        meanings: serde_json::from_str(&meanings).unwrap_or_default(),
        notes: row.get(9)?,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Lang;
    use crate::error::StudyError;
    use crate::testing::{TestEnv, kanji_fixture, vocab_fixture};

    #[test]
    fn vocab_roundtrip_preserves_meanings() {
        let env = TestEnv::new();
        let conn = env.conn();

        let mut item = vocab_fixture("猫", "ねこ", JlptLevel::N5, "con mèo", "cat");
        item.sino_vietnamese = Some("miêu".to_string());
        item.tags = vec!["animal".to_string()];
        let id = insert_vocab(&conn, &item).unwrap();

        let loaded = get_vocab(&conn, id).unwrap().unwrap();
        assert_eq!(loaded.word, "猫");
        assert_eq!(loaded.reading, "ねこ");
        assert_eq!(loaded.sino_vietnamese.as_deref(), Some("miêu"));
        assert_eq!(loaded.tags, vec!["animal".to_string()]);
        assert_eq!(loaded.meanings.get(&Lang::Vi).unwrap(), &["con mèo".to_string()]);
        assert_eq!(loaded.meanings.get(&Lang::En).unwrap(), &["cat".to_string()]);
    }

    #[test]
    fn duplicate_kanji_character_conflicts() {
        let env = TestEnv::new();
        let conn = env.conn();

        let item = kanji_fixture("水", JlptLevel::N5, "nước", "water");
        insert_kanji(&conn, &item).unwrap();
        let err = insert_kanji(&conn, &item).unwrap_err();
        assert!(matches!(StudyError::from(err), StudyError::Conflict(_)));
    }

    #[test]
    fn missing_item_is_none() {
        let env = TestEnv::new();
        let conn = env.conn();
        assert!(get_item(&conn, ItemKind::Vocab, 999).unwrap().is_none());
    }

    #[test]
    fn level_filter() {
        let env = TestEnv::new();
        let conn = env.conn();

        insert_vocab(&conn, &vocab_fixture("水", "みず", JlptLevel::N5, "nước", "water")).unwrap();
        insert_vocab(&conn, &vocab_fixture("経済", "けいざい", JlptLevel::N3, "kinh tế", "economy"))
            .unwrap();

        let n5 = list_vocab(&conn, &ItemQuery::level(JlptLevel::N5)).unwrap();
        assert_eq!(n5.len(), 1);
        assert_eq!(n5[0].word, "水");
    }

    #[test]
    fn reading_prefix_filter_on_vocab() {
        let env = TestEnv::new();
        let conn = env.conn();

        insert_vocab(&conn, &vocab_fixture("学校", "がっこう", JlptLevel::N5, "trường", "school"))
            .unwrap();
        insert_vocab(&conn, &vocab_fixture("学生", "がくせい", JlptLevel::N5, "học sinh", "student"))
            .unwrap();
        insert_vocab(&conn, &vocab_fixture("水", "みず", JlptLevel::N5, "nước", "water")).unwrap();

        let query = ItemQuery {
            reading_prefix: Some("が".to_string()),
            ..ItemQuery::default()
        };
        let matched = list_vocab(&conn, &query).unwrap();
        assert_eq!(matched.len(), 2);
    }

    #[test]
    fn reading_prefix_matches_kanji_on_reading() {
        let env = TestEnv::new();
        let conn = env.conn();

        let mut first = kanji_fixture("校", JlptLevel::N5, "hiệu", "school");
        first.on_readings = vec!["コウ".to_string()];
        insert_kanji(&conn, &first).unwrap();

        let mut second = kanji_fixture("水", JlptLevel::N5, "nước", "water");
        second.on_readings = vec!["スイ".to_string()];
        insert_kanji(&conn, &second).unwrap();

        let query = ItemQuery {
            reading_prefix: Some("コウ".to_string()),
            ..ItemQuery::default()
        };
        let matched = list_kanji(&conn, &query).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].character, "校");
    }

    #[test]
    fn meaning_substring_filter() {
        let env = TestEnv::new();
        let conn = env.conn();

        insert_vocab(&conn, &vocab_fixture("水", "みず", JlptLevel::N5, "nước", "water")).unwrap();
        insert_vocab(&conn, &vocab_fixture("火", "ひ", JlptLevel::N5, "lửa", "fire")).unwrap();

        let query = ItemQuery {
            meaning_substring: Some("wat".to_string()),
            ..ItemQuery::default()
        };
        let matched = list_vocab(&conn, &query).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].word, "水");
    }

    #[test]
    fn stroke_range_and_radical_filters() {
        let env = TestEnv::new();
        let conn = env.conn();

        let mut water = kanji_fixture("水", JlptLevel::N5, "nước", "water");
        water.stroke_count = Some(4);
        water.radical = Some("水".to_string());
        insert_kanji(&conn, &water).unwrap();

        let mut gold = kanji_fixture("金", JlptLevel::N5, "vàng", "gold");
        gold.stroke_count = Some(8);
        gold.radical = Some("金".to_string());
        insert_kanji(&conn, &gold).unwrap();

        let by_strokes = list_kanji(
            &conn,
            &ItemQuery {
                stroke_count_range: Some((2, 6)),
                ..ItemQuery::default()
            },
        )
        .unwrap();
        assert_eq!(by_strokes.len(), 1);
        assert_eq!(by_strokes[0].character, "水");

        let by_radical = list_kanji(
            &conn,
            &ItemQuery {
                radical: Some("金".to_string()),
                ..ItemQuery::default()
            },
        )
        .unwrap();
        assert_eq!(by_radical.len(), 1);
        assert_eq!(by_radical[0].character, "金");
    }

    #[test]
    fn exclude_and_limit_compose() {
        let env = TestEnv::new();
        let conn = env.conn();

        let a = insert_vocab(&conn, &vocab_fixture("一", "いち", JlptLevel::N5, "một", "one")).unwrap();
        insert_vocab(&conn, &vocab_fixture("二", "に", JlptLevel::N5, "hai", "two")).unwrap();
        insert_vocab(&conn, &vocab_fixture("三", "さん", JlptLevel::N5, "ba", "three")).unwrap();

        let query = ItemQuery {
            exclude_ids: vec![a],
            limit: Some(1),
            ..ItemQuery::default()
        };
        let matched = list_vocab(&conn, &query).unwrap();
        assert_eq!(matched.len(), 1);
        assert_ne!(matched[0].id, a);
    }

    #[test]
    fn update_vocab_bumps_updated_at_only() {
        let env = TestEnv::new();
        let conn = env.conn();

        let id = insert_vocab(&conn, &vocab_fixture("水", "みず", JlptLevel::N5, "nước", "water"))
            .unwrap();
        let mut loaded = get_vocab(&conn, id).unwrap().unwrap();
        loaded.notes = Some("elemental".to_string());
        update_vocab(&conn, &loaded).unwrap();

        let again = get_vocab(&conn, id).unwrap().unwrap();
        assert_eq!(again.notes.as_deref(), Some("elemental"));
        assert!(again.updated_at >= loaded.updated_at);
        assert_eq!(again.created_at, loaded.created_at);
    }
}
