// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Arcana - streaming tarot readings in your terminal
//!
//! Entry point for the Arcana CLI application.

use clap::{CommandFactory, Parser};

use arcana::cli::{Cli, Commands};
use arcana::error::Result;

#[path = "main/cli_commands.rs"]
mod cli_commands;
#[path = "main/render.rs"]
mod render;

use cli_commands::{
    error_hint, run_chat, run_config_command, run_history_command, run_read, run_spreads,
};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    // `-v` turns on Arcana's own diagnostics; `-vv` adds frame-level tracing.
    // `RUST_LOG` still takes precedence.
    let directives: &[&str] = match cli.verbose {
        0 => &[],
        1 => &["arcana=debug"],
        _ => &["arcana=trace"],
    };
    for directive in directives {
        if let Ok(parsed) = directive.parse() {
            env_filter = env_filter.add_directive(parsed);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(error) => {
            let _ = render::print_error(&error.to_string(), error_hint(&error));
            std::process::exit(1);
        }
    }
}

/// Dispatch to the selected command; `Ok(false)` means a reading did not succeed
async fn run(cli: Cli) -> Result<bool> {
    let format = cli.format;
    let config_path = cli.config;

    match cli.command {
        None => {
            Cli::command().print_help()?;
            println!();
        }
        Some(Commands::Read(args)) => {
            return run_read(args, config_path, &format).await;
        }
        Some(Commands::Chat(args)) => {
            run_chat(args, config_path).await?;
        }
        Some(Commands::Spreads) => {
            run_spreads(&format)?;
        }
        Some(Commands::Config(args)) => {
            run_config_command(args, config_path, &format)?;
        }
        Some(Commands::History(args)) => {
            run_history_command(args, &format)?;
        }
    }

    Ok(true)
}
