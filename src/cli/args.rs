// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap
//!
//! Defines all command-line arguments and subcommands for Arcana.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Arcana - streaming tarot readings in your terminal
#[derive(Parser, Debug)]
#[command(name = "arcana")]
#[command(version, about = "Streaming tarot readings in your terminal")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file path (defaults to ~/.arcana/settings.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream an interpretation of a spread
    Read(ReadArgs),

    /// Ask follow-up questions about a saved reading
    Chat(ChatArgs),

    /// List the built-in spreads
    Spreads,

    /// Manage the endpoint, key and model
    #[command(alias = "settings")]
    Config(ConfigArgs),

    /// Manage saved readings
    History(HistoryArgs),
}

/// Arguments for the read subcommand
#[derive(clap::Args, Debug)]
pub struct ReadArgs {
    /// The question to ask (omit for a general reading)
    pub question: Option<String>,

    /// Spread id (see `arcana spreads`)
    #[arg(short, long, default_value = "three-card")]
    pub spread: String,

    /// Display name for a custom spread
    #[arg(long)]
    pub spread_name: Option<String>,

    /// Cards in draw order: CARD, CARD:reversed or POSITION=CARD[:reversed]
    #[arg(short, long = "card", num_args = 1.., required = true)]
    pub cards: Vec<String>,

    /// Model to use instead of the configured one
    #[arg(short, long)]
    pub model: Option<String>,

    /// Don't save the reading to history
    #[arg(long)]
    pub no_save: bool,

    /// Continue with follow-up questions once the reading is done
    #[arg(long)]
    pub chat: bool,
}

/// Arguments for the chat subcommand
#[derive(clap::Args, Debug, Default)]
pub struct ChatArgs {
    /// Reading id or unique prefix (defaults to the most recent reading)
    pub id: Option<String>,

    /// Model to use instead of the configured one
    #[arg(short, long)]
    pub model: Option<String>,
}

/// Arguments for configuration
#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: Option<ConfigCommands>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (api_base_url, api_key, api_model)
        key: String,

        /// Value to set
        value: String,
    },

    /// Remove a configuration value
    Unset {
        /// Configuration key
        key: String,
    },

    /// Print the settings file path
    Path,
}

/// Arguments for history management
#[derive(clap::Args, Debug)]
pub struct HistoryArgs {
    #[command(subcommand)]
    pub command: HistoryCommands,
}

/// History subcommands
#[derive(Subcommand, Debug)]
pub enum HistoryCommands {
    /// List recent readings
    List {
        /// Maximum number of readings to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show a saved reading
    Show {
        /// Reading id or unique prefix
        id: String,
    },

    /// Delete a saved reading
    Delete {
        /// Reading id or unique prefix
        id: String,
    },

    /// Clear all history
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for responses
#[derive(ValueEnum, Clone, Debug, Default, PartialEq)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Text,

    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_default_no_command() {
        let cli = Cli::parse_from(["arcana"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 0);
        assert!(matches!(cli.format, OutputFormat::Text));
    }

    #[test]
    fn test_cli_verbose_multiple() {
        let cli = Cli::parse_from(["arcana", "-vv"]);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_read_defaults() {
        let cli = Cli::parse_from(["arcana", "read", "Will it rain?", "-c", "The Fool"]);
        match cli.command {
            Some(Commands::Read(args)) => {
                assert_eq!(args.question.as_deref(), Some("Will it rain?"));
                assert_eq!(args.spread, "three-card");
                assert_eq!(args.cards, vec!["The Fool".to_string()]);
                assert!(args.model.is_none());
                assert!(!args.no_save);
                assert!(!args.chat);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_read_requires_cards() {
        assert!(Cli::try_parse_from(["arcana", "read", "Q"]).is_err());
    }

    #[test]
    fn test_read_multiple_cards() {
        let cli = Cli::parse_from([
            "arcana", "read", "-s", "single", "-c", "The Sun:reversed", "-m", "model-X",
            "--no-save",
        ]);
        match cli.command {
            Some(Commands::Read(args)) => {
                assert!(args.question.is_none());
                assert_eq!(args.spread, "single");
                assert_eq!(args.cards, vec!["The Sun:reversed".to_string()]);
                assert_eq!(args.model.as_deref(), Some("model-X"));
                assert!(args.no_save);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_config_alias() {
        let cli = Cli::parse_from(["arcana", "settings", "show"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Config(ConfigArgs {
                command: Some(ConfigCommands::Show)
            }))
        ));
    }

    #[test]
    fn test_history_list_limit() {
        let cli = Cli::parse_from(["arcana", "history", "list", "-l", "3"]);
        match cli.command {
            Some(Commands::History(HistoryArgs {
                command: HistoryCommands::List { limit },
            })) => assert_eq!(limit, 3),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_format_after_subcommand() {
        let cli = Cli::parse_from(["arcana", "history", "list", "--format", "json"]);
        assert_eq!(cli.format, OutputFormat::Json);
    }
}
