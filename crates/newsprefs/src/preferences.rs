//! The user preferences record and partial updates to it.
//!
//! The persisted form is a JSON object with camelCase keys and enum values as
//! lowercase strings, e.g.
//!
//! ```json
//! {"topics":["Science"],"summaryLength":"short","tone":"conversational",
//!  "digest":"daily","theme":"light","savedSummaries":[]}
//! ```
//!
//! Keys this build does not recognize are carried along in
//! [`UserPreferences::extra`] and written back on every save.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// How much of each summary to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLength {
    /// One-line gist.
    Tldr,
    /// A short paragraph.
    #[default]
    Short,
    /// The full summary.
    Full,
}

/// Phrasing style for displayed content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    /// Formal prose.
    Formal,
    /// Conversational prose.
    #[default]
    Conversational,
    /// Bullet points.
    Bullets,
}

/// Notification cadence. Stored only; nothing schedules on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Digest {
    /// As stories arrive.
    Realtime,
    /// Once a day.
    #[default]
    Daily,
    /// Once a week.
    Weekly,
}

/// UI theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light theme.
    #[default]
    Light,
    /// Dark theme.
    Dark,
}

impl Theme {
    /// The other theme.
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

/// Implements `as_str` and `Display` using the persisted lowercase names.
macro_rules! wire_names {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// The persisted name of this value.
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

    };
}

wire_names!(SummaryLength { Tldr => "tldr", Short => "short", Full => "full" });
wire_names!(Tone { Formal => "formal", Conversational => "conversational", Bullets => "bullets" });
wire_names!(Digest { Realtime => "realtime", Daily => "daily", Weekly => "weekly" });
wire_names!(Theme { Light => "light", Dark => "dark" });

/// The single per-profile preferences record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPreferences {
    /// Topics to follow. Empty means no filter.
    pub topics: Vec<String>,
    /// Desired summary verbosity.
    pub summary_length: SummaryLength,
    /// Desired phrasing style.
    pub tone: Tone,
    /// Notification cadence.
    pub digest: Digest,
    /// UI theme.
    pub theme: Theme,
    /// Bookmarked content identifiers.
    pub saved_summaries: Vec<String>,
    /// Stored keys outside the fields above, such as ones written by a newer
    /// build. Kept as-is so a save does not drop them.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Wire names of the typed fields of [`UserPreferences`].
const FIELD_NAMES: [&str; 6] = [
    "topics",
    "summaryLength",
    "tone",
    "digest",
    "theme",
    "savedSummaries",
];

/// Why a stored value could not be used at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The value is not JSON.
    Malformed(String),
    /// The value is JSON but not an object.
    NotAnObject(&'static str),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(reason) => write!(f, "malformed JSON: {reason}"),
            Self::NotAnObject(kind) => write!(f, "expected a JSON object, found {kind}"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl UserPreferences {
    /// Decode a stored value, filling every missing field from the defaults.
    ///
    /// Unknown keys end up in [`UserPreferences::extra`]. A recognized key
    /// whose value has the wrong shape keeps its default and is logged; only a
    /// value that is not a JSON object at all is rejected.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if `raw` is not a JSON object.
    pub fn from_stored(raw: &str) -> std::result::Result<Self, DecodeError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        let fields = match value {
            Value::Object(fields) => fields,
            other => return Err(DecodeError::NotAnObject(json_kind(&other))),
        };

        let mut prefs = Self::default();
        overlay(&fields, "topics", &mut prefs.topics);
        overlay(&fields, "summaryLength", &mut prefs.summary_length);
        overlay(&fields, "tone", &mut prefs.tone);
        overlay(&fields, "digest", &mut prefs.digest);
        overlay(&fields, "theme", &mut prefs.theme);
        overlay(&fields, "savedSummaries", &mut prefs.saved_summaries);
        prefs.extra = fields
            .into_iter()
            .filter(|(key, _)| !FIELD_NAMES.contains(&key.as_str()))
            .collect();
        Ok(prefs)
    }

    /// Encode this record in its persisted form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_stored(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Return this record with the fields present in `patch` replaced.
    #[must_use]
    pub fn merged(mut self, patch: &PreferencesPatch) -> Self {
        patch.apply_to(&mut self);
        self
    }

    /// Check whether `id` is bookmarked.
    #[must_use]
    pub fn is_saved(&self, id: &str) -> bool {
        self.saved_summaries.iter().any(|saved| saved == id)
    }

    /// Check whether an item tagged with `item_topics` belongs in the
    /// personalized feed. No followed topics means everything does.
    #[must_use]
    pub fn follows<S: AsRef<str>>(&self, item_topics: &[S]) -> bool {
        self.topics.is_empty()
            || item_topics
                .iter()
                .any(|topic| self.topics.iter().any(|t| t == topic.as_ref()))
    }
}

fn overlay<T: DeserializeOwned>(fields: &Map<String, Value>, key: &str, slot: &mut T) {
    let Some(value) = fields.get(key) else {
        return;
    };
    match T::deserialize(value) {
        Ok(parsed) => *slot = parsed,
        Err(e) => warn!("Ignoring stored '{}' ({}), keeping default", key, e),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Remove every occurrence of `item` from `list`, or append it if absent.
///
/// Returns `true` if `item` is now a member.
pub(crate) fn toggle_member(list: &mut Vec<String>, item: &str) -> bool {
    if list.iter().any(|existing| existing == item) {
        list.retain(|existing| existing != item);
        false
    } else {
        list.push(item.to_string());
        true
    }
}

/// A partial update: only the fields that are `Some` are written.
///
/// List fields replace the stored list outright.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreferencesPatch {
    /// Replacement topic list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<String>>,
    /// Replacement summary length.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_length: Option<SummaryLength>,
    /// Replacement tone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<Tone>,
    /// Replacement digest cadence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<Digest>,
    /// Replacement theme.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    /// Replacement bookmark list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_summaries: Option<Vec<String>>,
}

impl PreferencesPatch {
    /// An empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the topic list.
    #[must_use]
    pub fn topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = Some(topics.into_iter().map(Into::into).collect());
        self
    }

    /// Set the summary length.
    #[must_use]
    pub fn summary_length(mut self, value: SummaryLength) -> Self {
        self.summary_length = Some(value);
        self
    }

    /// Set the tone.
    #[must_use]
    pub fn tone(mut self, value: Tone) -> Self {
        self.tone = Some(value);
        self
    }

    /// Set the digest cadence.
    #[must_use]
    pub fn digest(mut self, value: Digest) -> Self {
        self.digest = Some(value);
        self
    }

    /// Set the theme.
    #[must_use]
    pub fn theme(mut self, value: Theme) -> Self {
        self.theme = Some(value);
        self
    }

    /// Set the bookmark list.
    #[must_use]
    pub fn saved_summaries<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.saved_summaries = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Check whether the patch touches no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Write the supplied fields into `prefs`.
    pub fn apply_to(&self, prefs: &mut UserPreferences) {
        if let Some(topics) = &self.topics {
            prefs.topics.clone_from(topics);
        }
        if let Some(value) = self.summary_length {
            prefs.summary_length = value;
        }
        if let Some(value) = self.tone {
            prefs.tone = value;
        }
        if let Some(value) = self.digest {
            prefs.digest = value;
        }
        if let Some(value) = self.theme {
            prefs.theme = value;
        }
        if let Some(ids) = &self.saved_summaries {
            prefs.saved_summaries.clone_from(ids);
        }
    }
}

impl From<UserPreferences> for PreferencesPatch {
    fn from(prefs: UserPreferences) -> Self {
        Self {
            topics: Some(prefs.topics),
            summary_length: Some(prefs.summary_length),
            tone: Some(prefs.tone),
            digest: Some(prefs.digest),
            theme: Some(prefs.theme),
            saved_summaries: Some(prefs.saved_summaries),
        }
    }
}
