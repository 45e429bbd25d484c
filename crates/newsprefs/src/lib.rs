//! `newsprefs` - Persisted reader preferences for the news brief app
//!
//! This library keeps one preferences record per profile (followed topics,
//! summary length, tone, digest cadence, theme, bookmarked summaries) in a
//! durable key-value store, with default-filling reads and partial-update
//! writes.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod preferences;
pub mod storage;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use preferences::{Digest, PreferencesPatch, SummaryLength, Theme, Tone, UserPreferences};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore};
pub use store::{LoadSource, PreferencesStore, Snapshot};
