//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::preferences::{Digest, PreferencesPatch, SummaryLength, Theme, Tone};

/// Output switch shared by the read-only commands.
#[derive(Debug, Args)]
pub struct OutputArgs {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Partial update of the preferences record.
#[derive(Debug, Args)]
pub struct SetCommand {
    /// Replace the followed topics (comma separated)
    #[arg(long, value_delimiter = ',', conflicts_with = "clear_topics")]
    pub topics: Option<Vec<String>>,

    /// Stop following every topic
    #[arg(long)]
    pub clear_topics: bool,

    /// Summary verbosity
    #[arg(long, value_enum)]
    pub summary_length: Option<SummaryLengthArg>,

    /// Phrasing style
    #[arg(long, value_enum)]
    pub tone: Option<ToneArg>,

    /// Notification cadence
    #[arg(long, value_enum)]
    pub digest: Option<DigestArg>,

    /// UI theme
    #[arg(long, value_enum)]
    pub theme: Option<ThemeArg>,
}

impl SetCommand {
    /// Build the patch described by the flags.
    #[must_use]
    pub fn to_patch(&self) -> PreferencesPatch {
        let topics = if self.clear_topics {
            Some(Vec::new())
        } else {
            self.topics.as_ref().map(|topics| {
                topics
                    .iter()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
        };

        PreferencesPatch {
            topics,
            summary_length: self.summary_length.map(Into::into),
            tone: self.tone.map(Into::into),
            digest: self.digest.map(Into::into),
            theme: self.theme.map(Into::into),
            saved_summaries: None,
        }
    }
}

/// Reset command arguments.
#[derive(Debug, Args)]
pub struct ResetCommand {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Summary length argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SummaryLengthArg {
    /// One-line gist
    Tldr,
    /// Short paragraph
    Short,
    /// Full summary
    Full,
}

impl From<SummaryLengthArg> for SummaryLength {
    fn from(arg: SummaryLengthArg) -> Self {
        match arg {
            SummaryLengthArg::Tldr => Self::Tldr,
            SummaryLengthArg::Short => Self::Short,
            SummaryLengthArg::Full => Self::Full,
        }
    }
}

/// Tone argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ToneArg {
    /// Formal prose
    Formal,
    /// Conversational prose
    Conversational,
    /// Bullet points
    Bullets,
}

impl From<ToneArg> for Tone {
    fn from(arg: ToneArg) -> Self {
        match arg {
            ToneArg::Formal => Self::Formal,
            ToneArg::Conversational => Self::Conversational,
            ToneArg::Bullets => Self::Bullets,
        }
    }
}

/// Digest cadence argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DigestArg {
    /// As stories arrive
    Realtime,
    /// Once a day
    Daily,
    /// Once a week
    Weekly,
}

impl From<DigestArg> for Digest {
    fn from(arg: DigestArg) -> Self {
        match arg {
            DigestArg::Realtime => Self::Realtime,
            DigestArg::Daily => Self::Daily,
            DigestArg::Weekly => Self::Weekly,
        }
    }
}

/// Theme argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ThemeArg {
    /// Light theme
    Light,
    /// Dark theme
    Dark,
}

impl From<ThemeArg> for Theme {
    fn from(arg: ThemeArg) -> Self {
        match arg {
            ThemeArg::Light => Self::Light,
            ThemeArg::Dark => Self::Dark,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_set() -> SetCommand {
        SetCommand {
            topics: None,
            clear_topics: false,
            summary_length: None,
            tone: None,
            digest: None,
            theme: None,
        }
    }

    #[test]
    fn test_arg_conversions() {
        assert_eq!(SummaryLength::from(SummaryLengthArg::Tldr), SummaryLength::Tldr);
        assert_eq!(Tone::from(ToneArg::Bullets), Tone::Bullets);
        assert_eq!(Digest::from(DigestArg::Realtime), Digest::Realtime);
        assert_eq!(Theme::from(ThemeArg::Dark), Theme::Dark);
    }

    #[test]
    fn test_empty_set_is_empty_patch() {
        assert!(empty_set().to_patch().is_empty());
    }

    #[test]
    fn test_set_topics_are_trimmed() {
        let cmd = SetCommand {
            topics: Some(vec![" Science".to_string(), String::new(), "Health ".to_string()]),
            ..empty_set()
        };
        assert_eq!(
            cmd.to_patch().topics,
            Some(vec!["Science".to_string(), "Health".to_string()])
        );
    }

    #[test]
    fn test_clear_topics() {
        let cmd = SetCommand {
            clear_topics: true,
            ..empty_set()
        };
        assert_eq!(cmd.to_patch().topics, Some(Vec::new()));
    }

    #[test]
    fn test_set_enums() {
        let cmd = SetCommand {
            tone: Some(ToneArg::Formal),
            theme: Some(ThemeArg::Dark),
            ..empty_set()
        };
        let patch = cmd.to_patch();
        assert_eq!(patch.tone, Some(Tone::Formal));
        assert_eq!(patch.theme, Some(Theme::Dark));
        assert!(patch.digest.is_none());
    }
}
