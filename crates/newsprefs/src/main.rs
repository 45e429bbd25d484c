//! `newsprefs` - CLI for the news reader preferences store

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::debug;

use newsprefs::cli::{Cli, Command, ConfigCommand, OutputArgs, ResetCommand, SetCommand};
use newsprefs::{
    init_logging, Config, KeyValueStore, PreferencesStore, SqliteStore, UserPreferences,
};

type Store = PreferencesStore<SqliteStore>;

/// Where configuration comes from. Loaded on demand so that
/// `config path` and `config validate` work even when the default file is
/// broken.
#[derive(Debug)]
struct ConfigSource {
    file: Option<PathBuf>,
    profile: Option<String>,
}

impl ConfigSource {
    fn load(&self) -> anyhow::Result<Config> {
        let mut config = Config::load_from(self.file.clone()).context("loading configuration")?;
        if let Some(profile) = &self.profile {
            config.storage.namespace.clone_from(profile);
            config.validate()?;
        }
        Ok(config)
    }

    fn open_store(&self) -> anyhow::Result<Store> {
        let config = self.load()?;
        let backend = SqliteStore::from_config(&config)
            .with_context(|| format!("opening {}", config.database_path().display()))?;
        let store = PreferencesStore::with_config(backend, &config.preferences);
        debug!("Using {}", store.backend().describe());
        Ok(store)
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let source = ConfigSource {
        file: cli.config,
        profile: cli.profile,
    };
    run(&source, cli.command)
}

fn run(source: &ConfigSource, command: Command) -> anyhow::Result<ExitCode> {
    match command {
        Command::Show(args) => handle_show(&source.open_store()?, &args)?,
        Command::Status(args) => handle_status(&source.open_store()?, &args)?,
        Command::Set(cmd) => handle_set(&source.open_store()?, &cmd)?,
        Command::ToggleSaved { id } => {
            let saved = source.open_store()?.toggle_saved(&id);
            println!("{id}: {}", if saved { "saved" } else { "not saved" });
        }
        Command::IsSaved { id } => {
            let saved = source.open_store()?.is_saved(&id);
            println!("{}", if saved { "yes" } else { "no" });
            if !saved {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::ToggleTopic { topic } => {
            let followed = source.open_store()?.toggle_topic(&topic);
            println!(
                "{topic}: {}",
                if followed { "following" } else { "not following" }
            );
        }
        Command::ToggleTheme => println!("theme: {}", source.open_store()?.toggle_theme()),
        Command::Reset(cmd) => handle_reset(&source.open_store()?, &cmd)?,
        Command::Config(cmd) => return handle_config(source, cmd),
    }

    Ok(ExitCode::SUCCESS)
}

fn handle_show(store: &Store, args: &OutputArgs) -> anyhow::Result<()> {
    let prefs = store.get();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&prefs)?);
    } else {
        print_preferences(&prefs);
    }
    Ok(())
}

fn print_preferences(prefs: &UserPreferences) {
    let topics = if prefs.topics.is_empty() {
        "(all)".to_string()
    } else {
        prefs.topics.join(", ")
    };
    println!("Topics:          {topics}");
    println!("Summary length:  {}", prefs.summary_length);
    println!("Tone:            {}", prefs.tone);
    println!("Digest:          {}", prefs.digest);
    println!("Theme:           {}", prefs.theme);
    println!("Saved summaries: {}", prefs.saved_summaries.len());
    for id in &prefs.saved_summaries {
        println!("  - {id}");
    }
}

fn handle_status(store: &Store, args: &OutputArgs) -> anyhow::Result<()> {
    let snapshot = store.load();
    let backend = store.backend();

    if args.json {
        let status = serde_json::json!({
            "database_path": backend.path(),
            "namespace": backend.namespace(),
            "key": store.key(),
            "source": snapshot.source,
            "revision": snapshot.revision,
            "updated_at": snapshot.updated_at,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("newsprefs status");
        println!("----------------");
        println!("Database:   {}", backend.path().display());
        println!("Namespace:  {}", backend.namespace());
        println!("Key:        {}", store.key());
        println!("Record:     {}", snapshot.source);
        if let Some(revision) = snapshot.revision {
            println!("Revision:   {revision}");
        }
        if let Some(updated_at) = snapshot.updated_at {
            println!("Updated:    {}", updated_at.to_rfc3339());
        }
    }
    Ok(())
}

fn handle_set(store: &Store, cmd: &SetCommand) -> anyhow::Result<()> {
    let patch = cmd.to_patch();
    if patch.is_empty() {
        println!("Nothing to change.");
        return Ok(());
    }

    let revision = store.try_save(&patch).context("saving preferences")?;
    println!("Saved (revision {revision}).");
    print_preferences(&store.get());
    Ok(())
}

fn handle_reset(store: &Store, cmd: &ResetCommand) -> anyhow::Result<()> {
    if !cmd.yes {
        println!("This will forget every stored preference for this profile.");
        println!("Use --yes to confirm.");
        return Ok(());
    }

    if store.try_reset().context("clearing preferences")? {
        println!("Preferences cleared.");
    } else {
        println!("Nothing stored; already at defaults.");
    }
    Ok(())
}

fn handle_config(source: &ConfigSource, cmd: ConfigCommand) -> anyhow::Result<ExitCode> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = source.load()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Namespace:          {}", config.storage.namespace);
                println!("  Busy timeout (ms):  {}", config.storage.busy_timeout_ms);
                println!();
                println!("[preferences]");
                println!("  Key:                {}", config.preferences.key);
                println!(
                    "  Max save attempts:  {}",
                    config.preferences.max_save_attempts
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let explicit = file.or_else(|| source.file.clone());
            let path = explicit.clone().unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            let result = match explicit {
                Some(path) => Config::check_file(&path),
                None => Config::load(),
            };
            if let Err(e) = result {
                println!("Configuration error: {e}");
                return Ok(ExitCode::FAILURE);
            }
            println!("Configuration is valid.");
        }
    }
    Ok(ExitCode::SUCCESS)
}
