//! Application configuration constants.
//!
//! The database path is the only process-wide configuration. It is resolved
//! once at startup and passed into the store explicitly; nothing else reads
//! ambient state.

use std::path::PathBuf;

/// Default SQLite database path
pub const DEFAULT_DB_PATH: &str = "./data/japanese.db";

/// Environment variable overriding the database path
pub const DB_PATH_ENV: &str = "JPSTUDY_DB";

/// Card stability (days) at which a review counts as mastered
pub const MASTERY_STABILITY_DAYS: f64 = 21.0;

/// Default number of reviews per session when --limit is not given
pub const DEFAULT_SESSION_LIMIT: usize = 20;

/// Per-strategy cap on distractor candidates
pub const DISTRACTOR_POOL_LIMIT: usize = 10;

/// Resolve the database path: explicit flag, then env, then default.
pub fn database_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| std::env::var(DB_PATH_ENV).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH))
}
