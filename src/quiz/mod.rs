mod distractors;
mod generator;

pub use generator::{Question, QuestionGenerator, QuestionType, generate_question};
