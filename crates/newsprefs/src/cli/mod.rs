//! Command-line interface for newsprefs.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::Verbosity;

pub use commands::{
    ConfigCommand, DigestArg, OutputArgs, ResetCommand, SetCommand, SummaryLengthArg, ThemeArg,
    ToneArg,
};

/// newsprefs - Inspect and edit news reader preferences
///
/// Reads and writes the per-profile preferences record (followed topics,
/// summary style, theme, bookmarks) kept in the local preference database.
#[derive(Debug, Parser)]
#[command(name = "newsprefs")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Profile namespace to operate on (overrides storage.namespace)
    #[arg(short, long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the current preferences
    Show(OutputArgs),

    /// Show where the preferences came from and where they are stored
    Status(OutputArgs),

    /// Update some preferences, leaving the rest as they are
    Set(SetCommand),

    /// Bookmark a summary, or remove the bookmark if present
    ToggleSaved {
        /// Content identifier
        id: String,
    },

    /// Check whether a summary is bookmarked (exit status 1 if not)
    IsSaved {
        /// Content identifier
        id: String,
    },

    /// Follow a topic, or unfollow it if already followed
    ToggleTopic {
        /// Topic name
        topic: String,
    },

    /// Switch between light and dark theme
    ToggleTheme,

    /// Forget all stored preferences
    Reset(ResetCommand),

    /// View or check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "newsprefs");
    }

    #[test]
    fn test_verbosity_flags() {
        assert_eq!(parse(&["newsprefs", "show"]).verbosity(), Verbosity::Normal);
        assert_eq!(parse(&["newsprefs", "-v", "show"]).verbosity(), Verbosity::Verbose);
        assert_eq!(parse(&["newsprefs", "-vv", "show"]).verbosity(), Verbosity::Trace);
        assert_eq!(parse(&["newsprefs", "-q", "show"]).verbosity(), Verbosity::Quiet);
    }

    #[test]
    fn test_parse_show_json() {
        let cli = parse(&["newsprefs", "show", "--json"]);
        assert!(matches!(cli.command, Command::Show(OutputArgs { json: true })));
    }

    #[test]
    fn test_parse_set() {
        let cli = parse(&[
            "newsprefs",
            "set",
            "--topics",
            "Technology,Science",
            "--theme",
            "dark",
            "--summary-length",
            "tldr",
        ]);
        let Command::Set(set) = cli.command else {
            panic!("expected set command");
        };
        assert_eq!(
            set.topics,
            Some(vec!["Technology".to_string(), "Science".to_string()])
        );
        assert_eq!(set.theme, Some(ThemeArg::Dark));
        assert_eq!(set.summary_length, Some(SummaryLengthArg::Tldr));
        assert!(set.tone.is_none());
    }

    #[test]
    fn test_topics_conflict_with_clear() {
        let result =
            Cli::try_parse_from(["newsprefs", "set", "--topics", "Local", "--clear-topics"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_toggle_saved() {
        let cli = parse(&["newsprefs", "toggle-saved", "17"]);
        assert!(matches!(cli.command, Command::ToggleSaved { ref id } if id == "17"));
    }

    #[test]
    fn test_parse_is_saved() {
        let cli = parse(&["newsprefs", "is-saved", "17"]);
        assert!(matches!(cli.command, Command::IsSaved { .. }));
    }

    #[test]
    fn test_parse_profile_and_config() {
        let cli = parse(&[
            "newsprefs",
            "-c",
            "/custom/config.toml",
            "--profile",
            "work",
            "toggle-theme",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
        assert_eq!(cli.profile.as_deref(), Some("work"));
        assert!(matches!(cli.command, Command::ToggleTheme));
    }

    #[test]
    fn test_parse_config_path() {
        let cli = parse(&["newsprefs", "config", "path"]);
        assert!(matches!(cli.command, Command::Config(ConfigCommand::Path)));
    }

    #[test]
    fn test_invalid_theme_rejected() {
        assert!(Cli::try_parse_from(["newsprefs", "set", "--theme", "sepia"]).is_err());
    }
}
