//! The preferences service.
//!
//! [`PreferencesStore`] owns the single preferences record of one profile.
//! Construct it over a [`KeyValueStore`] and pass it to whatever needs the
//! record; there is no global instance.
//!
//! Reads never fail: a missing, corrupt, or unreachable record reads as the
//! defaults, and [`PreferencesStore::load`] reports which of those happened.
//! Writes are read-merge-write cycles guarded by the stored revision, retried
//! when another writer got in between.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::PreferencesConfig;
use crate::error::{Error, Result};
use crate::preferences::{toggle_member, PreferencesPatch, Theme, UserPreferences};
use crate::storage::{KeyValueStore, StoredValue, WriteOutcome};

/// Where the preferences returned by [`PreferencesStore::load`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadSource {
    /// Decoded from the stored record.
    Stored,
    /// Nothing stored yet; defaults.
    Absent,
    /// The stored value could not be decoded; defaults.
    Corrupt,
    /// The backend could not be read; defaults.
    Unavailable,
}

impl LoadSource {
    /// Check whether the defaults were substituted for a record that exists
    /// or might exist.
    #[must_use]
    pub fn is_degraded(self) -> bool {
        matches!(self, Self::Corrupt | Self::Unavailable)
    }
}

impl fmt::Display for LoadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stored => write!(f, "stored"),
            Self::Absent => write!(f, "absent"),
            Self::Corrupt => write!(f, "corrupt"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// The preferences together with how they were obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// The fully populated record.
    pub preferences: UserPreferences,
    /// Where the record came from.
    pub source: LoadSource,
    /// Revision of the stored value, if one was read.
    pub revision: Option<u64>,
    /// When the stored value was last written, if one was read.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    fn defaults(source: LoadSource, stored: Option<&StoredValue>) -> Self {
        Self {
            preferences: UserPreferences::default(),
            source,
            revision: stored.map(|s| s.revision),
            updated_at: stored.map(|s| s.updated_at),
        }
    }

    fn decode(key: &str, stored: Option<StoredValue>) -> Self {
        let Some(stored) = stored else {
            return Self::defaults(LoadSource::Absent, None);
        };
        match UserPreferences::from_stored(&stored.value) {
            Ok(preferences) => Self {
                preferences,
                source: LoadSource::Stored,
                revision: Some(stored.revision),
                updated_at: Some(stored.updated_at),
            },
            Err(e) => {
                warn!("Stored preferences under '{}' are unusable: {}", key, e);
                Self::defaults(LoadSource::Corrupt, Some(&stored))
            }
        }
    }
}

/// Owner of one profile's preferences record.
#[derive(Debug)]
pub struct PreferencesStore<S> {
    backend: S,
    key: String,
    max_save_attempts: u32,
}

impl<S: KeyValueStore> PreferencesStore<S> {
    /// Create a store over `backend` with the default key and retry budget.
    pub fn new(backend: S) -> Self {
        Self::with_config(backend, &PreferencesConfig::default())
    }

    /// Create a store over `backend` using `config`.
    pub fn with_config(backend: S, config: &PreferencesConfig) -> Self {
        Self {
            backend,
            key: config.key.clone(),
            max_save_attempts: config.max_save_attempts.max(1),
        }
    }

    /// The storage key of the record.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The backing key-value store.
    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// Consume the service and return the backing store.
    pub fn into_inner(self) -> S {
        self.backend
    }

    /// Read the record and report where it came from.
    pub fn load(&self) -> Snapshot {
        match self.backend.read(&self.key) {
            Ok(stored) => Snapshot::decode(&self.key, stored),
            Err(e) => {
                warn!("Preferences unavailable, using defaults: {}", e);
                Snapshot::defaults(LoadSource::Unavailable, None)
            }
        }
    }

    /// Read the record. Always returns a fully populated value.
    pub fn get(&self) -> UserPreferences {
        self.load().preferences
    }

    /// Merge `patch` over the stored record and write it back.
    ///
    /// Returns the new revision.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or every attempt lost a race to
    /// another writer ([`Error::SaveConflict`]).
    pub fn try_save(&self, patch: &PreferencesPatch) -> Result<u64> {
        self.try_update(|prefs| patch.apply_to(prefs))
            .map(|(_, revision)| revision)
    }

    /// Merge `patch` over the stored record and write it back.
    ///
    /// Failures are logged, not raised. Returns `true` if the write landed.
    pub fn save(&self, patch: &PreferencesPatch) -> bool {
        match self.try_save(patch) {
            Ok(_) => true,
            Err(e) => {
                warn!("Dropping preferences update: {}", e);
                false
            }
        }
    }

    /// Apply `mutate` to the current record and write the result.
    ///
    /// `mutate` runs once per attempt, each time on a freshly read record.
    /// Returns the record as written and its revision.
    ///
    /// # Errors
    ///
    /// Same as [`PreferencesStore::try_save`].
    pub fn try_update<F>(&self, mut mutate: F) -> Result<(UserPreferences, u64)>
    where
        F: FnMut(&mut UserPreferences),
    {
        for attempt in 1..=self.max_save_attempts {
            let current = Snapshot::decode(&self.key, self.backend.read(&self.key)?);
            let mut prefs = current.preferences;
            mutate(&mut prefs);

            let encoded = prefs.to_stored()?;
            match self.backend.write(&self.key, &encoded, current.revision)? {
                WriteOutcome::Written { revision } => {
                    debug!("Saved preferences at revision {}", revision);
                    return Ok((prefs, revision));
                }
                WriteOutcome::Conflict { current: found } => {
                    debug!(
                        "Preferences changed underneath us (expected {:?}, found {:?}), attempt {}/{}",
                        current.revision, found, attempt, self.max_save_attempts
                    );
                }
            }
        }

        Err(Error::SaveConflict {
            key: self.key.clone(),
            attempts: self.max_save_attempts,
        })
    }

    /// Add `id` to the saved summaries, or remove every occurrence of it.
    ///
    /// Returns whether `id` is saved afterwards. If the write fails the stored
    /// state is unchanged and that is what gets reported.
    pub fn toggle_saved(&self, id: &str) -> bool {
        let mut now_saved = false;
        match self.try_update(|prefs| now_saved = toggle_member(&mut prefs.saved_summaries, id)) {
            Ok(_) => now_saved,
            Err(e) => {
                warn!("Could not toggle saved summary '{}': {}", id, e);
                self.is_saved(id)
            }
        }
    }

    /// Check whether `id` is among the saved summaries.
    pub fn is_saved(&self, id: &str) -> bool {
        self.get().is_saved(id)
    }

    /// Follow `topic`, or unfollow it if already followed.
    ///
    /// Returns whether `topic` is followed afterwards.
    pub fn toggle_topic(&self, topic: &str) -> bool {
        let mut followed = false;
        match self.try_update(|prefs| followed = toggle_member(&mut prefs.topics, topic)) {
            Ok(_) => followed,
            Err(e) => {
                warn!("Could not toggle topic '{}': {}", topic, e);
                self.get().topics.iter().any(|t| t == topic)
            }
        }
    }

    /// Switch between the light and dark themes.
    ///
    /// Returns the theme in effect afterwards.
    pub fn toggle_theme(&self) -> Theme {
        match self.try_update(|prefs| prefs.theme = prefs.theme.toggled()) {
            Ok((prefs, _)) => prefs.theme,
            Err(e) => {
                warn!("Could not toggle theme: {}", e);
                self.get().theme
            }
        }
    }

    /// Delete the stored record so the next read returns the defaults.
    ///
    /// Returns `true` if a record existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    pub fn try_reset(&self) -> Result<bool> {
        let existed = self.backend.remove(&self.key)?;
        if existed {
            info!("Cleared stored preferences under '{}'", self.key);
        }
        Ok(existed)
    }

    /// Delete the stored record, logging any failure.
    pub fn reset(&self) -> bool {
        self.try_reset().unwrap_or_else(|e| {
            warn!("Could not clear preferences: {}", e);
            false
        })
    }
}

impl<S: KeyValueStore + Default> Default for PreferencesStore<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}
