//! Distractor candidate pool for multiple-choice questions.
//!
//! Four strategies feed one unranked union: same JLPT level, similar
//! meanings, similar readings, and (kanji only) visual similarity. The
//! generator dedupes and samples downstream.

use rusqlite::{Connection, Result};

use crate::config::DISTRACTOR_POOL_LIMIT;
use crate::db::items::{self, ItemQuery};
use crate::domain::{Item, ItemKind, KanjiItem, Lang, VocabItem};

pub(crate) fn candidate_pool(conn: &Connection, subject: &Item, lang: Lang) -> Result<Vec<Item>> {
    let mut pool = Vec::new();
    pool.extend(same_level(conn, subject)?);
    pool.extend(similar_meanings(conn, subject, lang)?);
    match subject {
        Item::Vocab(vocab) => pool.extend(similar_vocab_readings(conn, vocab)?),
        Item::Kanji(kanji) => {
            pool.extend(similar_kanji_readings(conn, kanji)?);
            pool.extend(visually_similar(conn, kanji)?);
        }
    }
    Ok(pool)
}

/// Items of the same kind and JLPT level, sampled uniformly.
fn same_level(conn: &Connection, subject: &Item) -> Result<Vec<Item>> {
    let query = ItemQuery {
        jlpt_level: Some(subject.jlpt_level()),
        exclude_ids: vec![subject.id()],
        limit: Some(DISTRACTOR_POOL_LIMIT),
        randomize: true,
        ..ItemQuery::default()
    };
    items::list_items(conn, subject.kind(), &query)
}

/// Items whose meanings share a leading token with any of the subject's
/// meanings in the requested language.
fn similar_meanings(conn: &Connection, subject: &Item, lang: Lang) -> Result<Vec<Item>> {
    let mut tokens: Vec<&str> = Vec::new();
    for meaning in subject.meanings_in(lang) {
        for token in meaning.split_whitespace().take(2) {
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }
    }

    let mut found = Vec::new();
    for token in tokens {
        if found.len() >= DISTRACTOR_POOL_LIMIT {
            break;
        }
        let query = ItemQuery {
            meaning_substring: Some(token.to_string()),
            exclude_ids: vec![subject.id()],
            limit: Some(DISTRACTOR_POOL_LIMIT - found.len()),
            ..ItemQuery::default()
        };
        found.extend(items::list_items(conn, subject.kind(), &query)?);
    }
    Ok(found)
}

/// Vocabulary sharing the first two kana of the subject's reading.
fn similar_vocab_readings(conn: &Connection, subject: &VocabItem) -> Result<Vec<Item>> {
    let prefix: String = subject.reading.chars().take(2).collect();
    if prefix.is_empty() {
        return Ok(Vec::new());
    }
    let query = ItemQuery {
        reading_prefix: Some(prefix),
        exclude_ids: vec![subject.id],
        limit: Some(DISTRACTOR_POOL_LIMIT),
        ..ItemQuery::default()
    };
    items::list_items(conn, ItemKind::Vocab, &query)
}

/// Kanji sharing at least one of the subject's on-readings.
fn similar_kanji_readings(conn: &Connection, subject: &KanjiItem) -> Result<Vec<Item>> {
    let mut found = Vec::new();
    for reading in &subject.on_readings {
        if found.len() >= DISTRACTOR_POOL_LIMIT {
            break;
        }
        let query = ItemQuery {
            reading_prefix: Some(reading.clone()),
            exclude_ids: vec![subject.id],
            limit: Some(DISTRACTOR_POOL_LIMIT - found.len()),
            ..ItemQuery::default()
        };
        found.extend(items::list_items(conn, ItemKind::Kanji, &query)?);
    }
    Ok(found)
}

/// Kanji sharing the radical, or within two strokes of the subject.
fn visually_similar(conn: &Connection, subject: &KanjiItem) -> Result<Vec<Item>> {
    let mut found = Vec::new();

    if let Some(radical) = &subject.radical {
        let query = ItemQuery {
            radical: Some(radical.clone()),
            exclude_ids: vec![subject.id],
            limit: Some(DISTRACTOR_POOL_LIMIT),
            ..ItemQuery::default()
        };
        found.extend(items::list_items(conn, ItemKind::Kanji, &query)?);
    }

    if let Some(strokes) = subject.stroke_count {
        let query = ItemQuery {
            stroke_count_range: Some((strokes.saturating_sub(2), strokes + 2)),
            exclude_ids: vec![subject.id],
            limit: Some(DISTRACTOR_POOL_LIMIT),
            ..ItemQuery::default()
        };
        found.extend(items::list_items(conn, ItemKind::Kanji, &query)?);
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::items::{get_item, insert_kanji, insert_vocab};
    use crate::domain::{ItemKind, JlptLevel};
    use crate::testing::{TestEnv, kanji_fixture, vocab_fixture};

    #[test]
    fn pool_never_contains_the_subject() {
        let env = TestEnv::new();
        let conn = env.conn();

        let subject_id = insert_vocab(
            &conn,
            &vocab_fixture("水", "みず", JlptLevel::N5, "nước", "water"),
        )
        .unwrap();
        for (word, reading) in [("火", "ひ"), ("木", "き"), ("金", "かね")] {
            insert_vocab(&conn, &vocab_fixture(word, reading, JlptLevel::N5, "nghĩa", "meaning"))
                .unwrap();
        }

        let subject = get_item(&conn, ItemKind::Vocab, subject_id).unwrap().unwrap();
        let pool = candidate_pool(&conn, &subject, Lang::En).unwrap();
        assert!(!pool.is_empty());
        assert!(pool.iter().all(|item| item.id() != subject_id));
    }

    #[test]
    fn meaning_tokens_pull_semantic_neighbours() {
        let env = TestEnv::new();
        let conn = env.conn();

        let subject_id = insert_vocab(
            &conn,
            &vocab_fixture("見る", "みる", JlptLevel::N5, "nhìn", "to see"),
        )
        .unwrap();
        // Shares the leading token "to"
        insert_vocab(&conn, &vocab_fixture("聞く", "きく", JlptLevel::N4, "nghe", "to hear"))
            .unwrap();
        insert_vocab(&conn, &vocab_fixture("犬", "いぬ", JlptLevel::N4, "con chó", "dog")).unwrap();

        let subject = get_item(&conn, ItemKind::Vocab, subject_id).unwrap().unwrap();
        let pool = candidate_pool(&conn, &subject, Lang::En).unwrap();
        assert!(pool.iter().any(|item| item.surface() == "聞く"));
    }

    #[test]
    fn kanji_pool_uses_readings_radical_and_strokes() {
        let env = TestEnv::new();
        let conn = env.conn();

        let mut subject = kanji_fixture("校", JlptLevel::N5, "hiệu", "school");
        subject.on_readings = vec!["コウ".to_string()];
        subject.radical = Some("木".to_string());
        subject.stroke_count = Some(10);
        let subject_id = insert_kanji(&conn, &subject).unwrap();

        // Phonetic neighbour: shares コウ
        let mut phonetic = kanji_fixture("高", JlptLevel::N1, "cao", "tall");
        phonetic.on_readings = vec!["コウ".to_string()];
        phonetic.stroke_count = Some(100);
        insert_kanji(&conn, &phonetic).unwrap();

        // Visual neighbour: same radical
        let mut radical = kanji_fixture("林", JlptLevel::N2, "rừng", "woods");
        radical.radical = Some("木".to_string());
        radical.stroke_count = Some(100);
        insert_kanji(&conn, &radical).unwrap();

        // Visual neighbour: stroke count within 2
        let mut strokes = kanji_fixture("時", JlptLevel::N2, "thời", "time");
        strokes.on_readings = vec!["ジ".to_string()];
        strokes.stroke_count = Some(10);
        insert_kanji(&conn, &strokes).unwrap();

        let subject = get_item(&conn, ItemKind::Kanji, subject_id).unwrap().unwrap();
        let pool = candidate_pool(&conn, &subject, Lang::En).unwrap();
        let surfaces: Vec<&str> = pool.iter().map(|item| item.surface()).collect();
        assert!(surfaces.contains(&"高"));
        assert!(surfaces.contains(&"林"));
        assert!(surfaces.contains(&"時"));
    }
}
