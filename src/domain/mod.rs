pub mod card;
pub mod item;
pub mod progress;
pub mod review;

pub use card::{Card, CardPhase, Rating};
pub use item::{Item, ItemKind, JlptLevel, KanjiItem, Lang, Meanings, VocabItem};
pub use progress::Progress;
pub use review::{FlashHistoryEntry, McqHistoryEntry, Review, ReviewMode};
