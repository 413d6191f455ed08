//! Multiple-choice question assembly.
//!
//! A question is the subject's display text plus three distractors drawn
//! from the strategy pool, deduplicated by displayed text and placed in a
//! uniformly random order. When the pool runs shallow the generator falls
//! back to random same-kind items; when the whole catalog cannot produce
//! four unique strings the question is reported unavailable and the
//! session moves on.

use rand::Rng;
use rand::seq::SliceRandom;
use rusqlite::Connection;

use crate::db::items::{self, ItemQuery};
use crate::db::{self, DbPool};
use crate::domain::{Item, ItemKind, Lang};
use crate::error::{Result, StudyError};

use super::distractors;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionType {
    /// Japanese surface -> meaning options
    WordToMeaning,
    /// Meaning -> Japanese surface options
    MeaningToWord,
    /// Fair coin per generated question
    Mixed,
}

impl QuestionType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "w2m" => Some(Self::WordToMeaning),
            "m2w" => Some(Self::MeaningToWord),
            "mixed" => Some(Self::Mixed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WordToMeaning => "w2m",
            Self::MeaningToWord => "m2w",
            Self::Mixed => "mixed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Question {
    pub prompt: String,
    pub options: [String; 4],
    pub correct_index: usize,
    pub item_kind: ItemKind,
    /// The concrete direction asked; never `Mixed`
    pub question_type: QuestionType,
}

pub struct QuestionGenerator {
    pool: DbPool,
}

impl QuestionGenerator {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn generate(
        &self,
        item_id: i64,
        item_kind: ItemKind,
        question_type: QuestionType,
        language: Lang,
    ) -> Result<Question> {
        self.generate_with_rng(item_id, item_kind, question_type, language, &mut rand::rng())
    }

    pub fn generate_with_rng<R: Rng>(
        &self,
        item_id: i64,
        item_kind: ItemKind,
        question_type: QuestionType,
        language: Lang,
        rng: &mut R,
    ) -> Result<Question> {
        let conn = db::try_lock(&self.pool)?;
        generate_question(&conn, item_id, item_kind, question_type, language, rng)
    }
}

pub fn generate_question<R: Rng>(
    conn: &Connection,
    item_id: i64,
    item_kind: ItemKind,
    question_type: QuestionType,
    language: Lang,
    rng: &mut R,
) -> Result<Question> {
    let subject = items::get_item(conn, item_kind, item_id)?.ok_or_else(|| {
        StudyError::Unavailable(format!("{} item {} does not exist", item_kind.as_str(), item_id))
    })?;

    let resolved = match question_type {
        QuestionType::Mixed => {
            if rng.random_bool(0.5) {
                QuestionType::WordToMeaning
            } else {
                QuestionType::MeaningToWord
            }
        }
        other => other,
    };

    let correct = display_text(&subject, resolved, language).ok_or_else(|| {
        StudyError::Unavailable(format!(
            "{} item {} has no {} meaning",
            item_kind.as_str(),
            item_id,
            language.as_str()
        ))
    })?;
    let prompt = prompt_text(&subject, resolved, language).ok_or_else(|| {
        StudyError::Unavailable(format!(
            "{} item {} has no {} meaning",
            item_kind.as_str(),
            item_id,
            language.as_str()
        ))
    })?;

    let mut options = vec![correct.clone()];
    let mut candidates = distractors::candidate_pool(conn, &subject, language)?;
    candidates.shuffle(rng);
    push_unique(&mut options, &candidates, resolved, language, &subject);

    if options.len() < 4 {
        // Shallow pool: any same-kind item may stand in
        let fallback = items::list_items(
            conn,
            item_kind,
            &ItemQuery {
                exclude_ids: vec![subject.id()],
                randomize: true,
                ..ItemQuery::default()
            },
        )?;
        push_unique(&mut options, &fallback, resolved, language, &subject);
    }

    if options.len() < 4 {
        return Err(StudyError::Unavailable(format!(
            "catalog cannot supply four unique options for {} item {}",
            item_kind.as_str(),
            item_id
        )));
    }

    options.shuffle(rng);
    let correct_index = options
        .iter()
        .position(|option| option == &correct)
        .expect("correct option survives the shuffle");

    Ok(Question {
        prompt,
        options: options.try_into().expect("exactly four options"),
        correct_index,
        item_kind,
        question_type: resolved,
    })
}

/// Add candidate display strings until the option list holds four unique
/// entries. Uniqueness is by displayed text, so homographs collapse.
fn push_unique(
    options: &mut Vec<String>,
    candidates: &[Item],
    question_type: QuestionType,
    language: Lang,
    subject: &Item,
) {
    for candidate in candidates {
        if options.len() == 4 {
            break;
        }
        if candidate.id() == subject.id() && candidate.kind() == subject.kind() {
            continue;
        }
        if let Some(text) = display_text(candidate, question_type, language) {
            if !options.contains(&text) {
                options.push(text);
            }
        }
    }
}

/// The string an item contributes as an option.
fn display_text(item: &Item, question_type: QuestionType, language: Lang) -> Option<String> {
    match question_type {
        QuestionType::WordToMeaning => item.meanings_in(language).first().cloned(),
        _ => Some(item.surface().to_string()),
    }
}

/// The question stem shown to the user.
fn prompt_text(item: &Item, question_type: QuestionType, language: Lang) -> Option<String> {
    match question_type {
        QuestionType::WordToMeaning => match item {
            Item::Vocab(vocab) => Some(format!("{} ({})", vocab.word, vocab.reading)),
            Item::Kanji(kanji) => Some(kanji.character.clone()),
        },
        _ => item.meanings_in(language).first().cloned(),
    }
}
