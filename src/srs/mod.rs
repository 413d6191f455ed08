pub mod engine;
pub mod flashcards;
pub mod mcq;

pub use engine::{ReviewLog, SchedulerConfig, SrsEngine};
pub use flashcards::FlashScheduler;
pub use mcq::McqScheduler;
