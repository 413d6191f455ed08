//! Study items: vocabulary entries and kanji.
//!
//! Items are the shared catalog both schedulers draw from. They are created
//! by imports or by hand and never deleted by the core; edits bump
//! `updated_at` and leave review state alone.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// JLPT difficulty tag. `None` marks items outside the JLPT lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JlptLevel {
    N5,
    N4,
    N3,
    N2,
    N1,
    None,
}

impl JlptLevel {
    pub const ALL: [JlptLevel; 6] = [
        Self::N5,
        Self::N4,
        Self::N3,
        Self::N2,
        Self::N1,
        Self::None,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "n5" | "N5" => Some(Self::N5),
            "n4" | "N4" => Some(Self::N4),
            "n3" | "N3" => Some(Self::N3),
            "n2" | "N2" => Some(Self::N2),
            "n1" | "N1" => Some(Self::N1),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::N5 => "n5",
            Self::N4 => "n4",
            Self::N3 => "n3",
            Self::N2 => "n2",
            Self::N1 => "n1",
            Self::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Vocab,
    Kanji,
}

impl ItemKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "vocab" => Some(Self::Vocab),
            "kanji" => Some(Self::Kanji),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vocab => "vocab",
            Self::Kanji => "kanji",
        }
    }
}

/// Meaning language. Meanings are kept per language so questions can be
/// asked in either.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Vi,
    En,
}

impl Lang {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "vi" => Some(Self::Vi),
            "en" => Some(Self::En),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vi => "vi",
            Self::En => "en",
        }
    }
}

/// Language code -> ordered, non-empty meaning strings.
/// Stored as a JSON object in a TEXT column.
pub type Meanings = BTreeMap<Lang, Vec<String>>;

#[derive(Debug, Clone)]
pub struct VocabItem {
    pub id: i64,
    /// Surface form; may contain Han characters
    pub word: String,
    /// Kana-only reading
    pub reading: String,
    pub sino_vietnamese: Option<String>,
    pub part_of_speech: Option<String>,
    pub tags: Vec<String>,
    pub jlpt_level: JlptLevel,
    pub meanings: Meanings,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VocabItem {
    pub fn new(word: String, reading: String, jlpt_level: JlptLevel, meanings: Meanings) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            word,
            reading,
            sino_vietnamese: None,
            part_of_speech: None,
            tags: Vec::new(),
            jlpt_level,
            meanings,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KanjiItem {
    pub id: i64,
    /// Single-character surface; unique in the catalog
    pub character: String,
    pub on_readings: Vec<String>,
    pub kun_readings: Vec<String>,
    pub sino_vietnamese: Option<String>,
    pub stroke_count: Option<u32>,
    pub radical: Option<String>,
    pub jlpt_level: JlptLevel,
    pub meanings: Meanings,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KanjiItem {
    pub fn new(character: String, jlpt_level: JlptLevel, meanings: Meanings) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            character,
            on_readings: Vec::new(),
            kun_readings: Vec::new(),
            sino_vietnamese: None,
            stroke_count: None,
            radical: None,
            jlpt_level,
            meanings,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A catalog item of either kind.
#[derive(Debug, Clone)]
pub enum Item {
    Vocab(VocabItem),
    Kanji(KanjiItem),
}

impl Item {
    pub fn id(&self) -> i64 {
        match self {
            Self::Vocab(v) => v.id,
            Self::Kanji(k) => k.id,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Vocab(_) => ItemKind::Vocab,
            Self::Kanji(_) => ItemKind::Kanji,
        }
    }

    pub fn jlpt_level(&self) -> JlptLevel {
        match self {
            Self::Vocab(v) => v.jlpt_level,
            Self::Kanji(k) => k.jlpt_level,
        }
    }

    /// Japanese display form: the word or the kanji character.
    pub fn surface(&self) -> &str {
        match self {
            Self::Vocab(v) => &v.word,
            Self::Kanji(k) => &k.character,
        }
    }

    pub fn meanings(&self) -> &Meanings {
        match self {
            Self::Vocab(v) => &v.meanings,
            Self::Kanji(k) => &k.meanings,
        }
    }

    /// Meanings in one language; empty if the item has none for it.
    pub fn meanings_in(&self, lang: Lang) -> &[String] {
        self.meanings().get(&lang).map_or(&[], |m| m.as_slice())
    }
}
