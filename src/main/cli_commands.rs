// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crossterm::style::Color;
use tokio_util::sync::CancellationToken;

use arcana::chat::{FollowUpChat, IntervalScheduler, ReadingSession, RedrawScheduler};
use arcana::cli::{
    ChatArgs, ConfigArgs, ConfigCommands, HistoryArgs, HistoryCommands, OutputFormat, ReadArgs,
};
use arcana::config::{
    mask_secret, resolve, ConfigurationStore, DefaultLlmConfig, FileConfigStore, CONFIG_KEYS,
    KEY_API_KEY,
};
use arcana::error::{ArcanaError, Result};
use arcana::history::{HistoryStore, ReadingRecord};
use arcana::llm::transport::{HttpTransport, StreamTransport};
use arcana::reading::{DrawnItem, ReadingRequest, Spread};

use crate::render::{print_error, print_label, read_user_input, StreamPrinter};

/// Shared pieces every command that talks to a model needs
pub(super) struct Runtime {
    pub(super) store: Arc<FileConfigStore>,
    pub(super) transport: Arc<dyn StreamTransport>,
    pub(super) scheduler: Arc<dyn RedrawScheduler>,
    pub(super) defaults: DefaultLlmConfig,
}

impl Runtime {
    pub(super) fn open(config_path: Option<PathBuf>) -> Result<Self> {
        let store = Arc::new(open_store(config_path)?);
        let settings = store.settings();

        Ok(Self {
            transport: Arc::new(HttpTransport::with_timeout(Duration::from_secs(
                settings.request_timeout_secs,
            ))),
            scheduler: Arc::new(IntervalScheduler::new(Duration::from_millis(
                settings.frame_interval_ms,
            ))),
            defaults: DefaultLlmConfig::from_env(),
            store,
        })
    }
}

fn open_store(config_path: Option<PathBuf>) -> Result<FileConfigStore> {
    match config_path {
        Some(path) => FileConfigStore::open_at(path),
        None => FileConfigStore::open(),
    }
}

/// Await `future`, cancelling `token` if the user presses Ctrl-C first.
///
/// `future` must watch `token`; after an interrupt it is still awaited so it
/// can wind down and report the cancellation itself.
async fn until_ctrl_c<F: Future>(future: F, token: &CancellationToken) -> F::Output {
    tokio::pin!(future);
    tokio::select! {
        output = &mut future => output,
        signal = tokio::signal::ctrl_c() => {
            if signal.is_ok() {
                tracing::debug!(target: "arcana.session", "interrupted by ctrl-c");
                token.cancel();
            }
            future.await
        }
    }
}

/// Hint shown under an error, if one helps
pub(super) fn error_hint(error: &ArcanaError) -> Option<&'static str> {
    if error.is_configuration_related() {
        Some("check your endpoint and key with `arcana config show`")
    } else if matches!(error, ArcanaError::Timeout) {
        Some("the endpoint may be overloaded; try again or raise request_timeout_secs")
    } else {
        None
    }
}

/// Build the drawn cards for `args`
pub(super) fn build_request(args: &ReadArgs) -> Result<ReadingRequest> {
    let (spread_id, spread_name, items) = match Spread::find(&args.spread) {
        Some(spread) => (
            spread.id.to_string(),
            args.spread_name
                .clone()
                .unwrap_or_else(|| spread.name.to_string()),
            spread.place(&args.cards)?,
        ),
        None => {
            let items = args
                .cards
                .iter()
                .map(|card| card.parse::<DrawnItem>())
                .collect::<Result<Vec<_>>>()
                .map_err(|error| {
                    ArcanaError::InvalidInput(format!(
                        "'{}' is not a built-in spread, so every card needs a position ({})",
                        args.spread, error
                    ))
                })?;
            (
                args.spread.trim().to_string(),
                args.spread_name
                    .clone()
                    .unwrap_or_else(|| args.spread.trim().to_string()),
                items,
            )
        }
    };

    let request = ReadingRequest::new(
        args.question.clone().unwrap_or_default(),
        spread_name,
        spread_id,
        items,
    );
    Ok(match &args.model {
        Some(model) => request.with_model(model.clone()),
        None => request,
    })
}

pub(super) async fn run_read(
    args: ReadArgs,
    config_path: Option<PathBuf>,
    format: &OutputFormat,
) -> Result<bool> {
    let request = build_request(&args)?;
    let runtime = Runtime::open(config_path)?;

    let mut session = ReadingSession::new(
        Arc::clone(&runtime.transport),
        runtime.store.clone(),
        runtime.defaults.clone(),
    )
    .with_scheduler(Arc::clone(&runtime.scheduler));

    if !args.no_save {
        session = session.with_recorder(Arc::new(HistoryStore::open()?));
    }

    let printer = StreamPrinter::new();
    if *format == OutputFormat::Text {
        session.subscribe(printer.subscriber());
        print_label("arcana", Color::Cyan)?;
        println!();
    }

    let cancel = CancellationToken::new();
    let success = until_ctrl_c(session.run_with_cancel(request, cancel.clone()), &cancel).await;
    let state = session.state();

    if *format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else if success {
        println!("\n");
    } else {
        if printer.has_output() {
            println!();
        }
        print_error(
            state.error_message.as_deref().unwrap_or("reading failed"),
            Some("check your endpoint and key with `arcana config show`"),
        )?;
    }

    if success && args.chat && *format == OutputFormat::Text {
        // The follow-up inherits the session's subscribers, including `printer`.
        if let Some(mut chat) = session.start_follow_up() {
            follow_up_loop(&mut chat, &printer).await?;
        }
    }

    Ok(success)
}

pub(super) async fn run_chat(args: ChatArgs, config_path: Option<PathBuf>) -> Result<()> {
    let history = HistoryStore::open()?;
    let record = match &args.id {
        Some(id) => history.find(id)?,
        None => history
            .list()
            .into_iter()
            .next()
            .ok_or_else(|| ArcanaError::InvalidInput("no saved readings yet".to_string()))?,
    };

    let runtime = Runtime::open(config_path)?;
    let resolved = resolve(args.model.as_deref(), runtime.store.as_ref(), &runtime.defaults)?;

    print_record(&record);

    let printer = StreamPrinter::new();
    let mut chat = FollowUpChat::new(
        Arc::clone(&runtime.transport),
        resolved,
        record.conversation(),
    )
    .with_scheduler(Arc::clone(&runtime.scheduler));
    chat.subscribe(printer.subscriber());

    follow_up_loop(&mut chat, &printer).await
}

async fn follow_up_loop(chat: &mut FollowUpChat, printer: &StreamPrinter) -> Result<()> {
    println!("Ask a follow-up question (empty line or 'exit' to quit).\n");

    loop {
        let input = match read_user_input()? {
            Some(input) => input,
            None => break,
        };
        if input.is_empty() || matches!(input.as_str(), "exit" | "quit") {
            break;
        }

        printer.reset();
        print_label("arcana", Color::Cyan)?;
        let cancel = CancellationToken::new();
        match until_ctrl_c(chat.send_with_cancel(&input, cancel.clone()), &cancel).await {
            Ok(_) => println!("\n"),
            Err(error) => {
                if printer.has_output() {
                    println!();
                }
                print_error(&error.to_string(), error_hint(&error))?;
            }
        }
    }

    Ok(())
}

pub(super) fn run_spreads(format: &OutputFormat) -> Result<()> {
    if *format == OutputFormat::Json {
        let spreads: Vec<_> = Spread::builtin()
            .iter()
            .map(|s| serde_json::json!({"id": s.id, "name": s.name, "positions": s.positions}))
            .collect();
        println!("{}", serde_json::to_string_pretty(&spreads)?);
        return Ok(());
    }

    println!("\nBuilt-in spreads:\n");
    for spread in Spread::builtin() {
        println!("  {:<13} {} ({} cards)", spread.id, spread.name, spread.positions.len());
        println!("  {:<13} {}", "", spread.positions.join(", "));
    }
    println!();
    Ok(())
}

pub(super) fn run_config_command(
    args: ConfigArgs,
    config_path: Option<PathBuf>,
    format: &OutputFormat,
) -> Result<()> {
    let store = open_store(config_path)?;

    match args.command.unwrap_or(ConfigCommands::Show) {
        ConfigCommands::Show => {
            let settings = store.settings();
            let defaults = DefaultLlmConfig::from_env();
            if *format == OutputFormat::Json {
                let mut value = serde_json::to_value(&settings)?;
                if let Some(key) = settings.api_key.as_deref() {
                    value[KEY_API_KEY] = serde_json::Value::String(mask_secret(key));
                }
                println!("{}", serde_json::to_string_pretty(&value)?);
                return Ok(());
            }

            println!("\nSettings ({})\n", store.path().display());
            for key in CONFIG_KEYS {
                let value = match (*key, store.get(key)) {
                    (KEY_API_KEY, Some(secret)) => mask_secret(&secret),
                    (_, Some(value)) => value,
                    (_, None) => "(not set)".to_string(),
                };
                println!("  {:<22} {}", key, value);
            }
            println!("  {:<22} {}", "request_timeout_secs", settings.request_timeout_secs);
            println!("  {:<22} {}", "frame_interval_ms", settings.frame_interval_ms);

            let mode = if settings.has_custom_endpoint() {
                "custom endpoint"
            } else if defaults.is_usable() {
                "default relay"
            } else {
                "not configured"
            };
            println!("\n  mode: {}\n", mode);
        }
        ConfigCommands::Set { key, value } => {
            store.set(&key, &value)?;
            let shown = if key == KEY_API_KEY {
                mask_secret(&value)
            } else {
                value
            };
            println!("Set {} = {}", key, shown);
        }
        ConfigCommands::Unset { key } => {
            store.remove(&key)?;
            println!("Removed {}", key);
        }
        ConfigCommands::Path => {
            println!("{}", store.path().display());
        }
    }

    Ok(())
}

fn print_record(record: &ReadingRecord) {
    let id_short = &record.id.to_string()[..8];
    println!("\nReading {} ({})", id_short, record.timestamp.format("%Y-%m-%d %H:%M"));
    println!("Spread: {} ({})", record.spread_name, record.spread_id);
    if !record.question.trim().is_empty() {
        println!("Question: {}", record.question);
    }
    for item in &record.items {
        println!(
            "  {:<20} {} ({})",
            item.position_label,
            item.item_name,
            item.orientation_label()
        );
    }
    println!();
}

pub(super) fn run_history_command(args: HistoryArgs, format: &OutputFormat) -> Result<()> {
    let store = HistoryStore::open()?;

    match args.command {
        HistoryCommands::List { limit } => {
            let records: Vec<_> = store.list().into_iter().take(limit).collect();

            if *format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&records)?);
                return Ok(());
            }

            if records.is_empty() {
                println!("\nNo readings in history.\n");
                return Ok(());
            }

            println!("\nRecent readings:\n");
            for record in records {
                let id_short = &record.id.to_string()[..8];
                let date = record.timestamp.format("%Y-%m-%d %H:%M");
                println!(
                    "  {} | {} | {} | {}",
                    id_short,
                    date,
                    record.spread_name,
                    record.summary()
                );
            }
            println!();
        }

        HistoryCommands::Show { id } => {
            let record = store.find(&id)?;

            if *format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&record)?);
                return Ok(());
            }

            print_record(&record);
            println!("{}\n", record.analysis);
        }

        HistoryCommands::Delete { id } => {
            let record = store.find(&id)?;
            if store.delete(record.id)? {
                println!("Deleted reading {}.", &record.id.to_string()[..8]);
            }
        }

        HistoryCommands::Clear { force } => {
            if !force {
                println!("This will delete ALL saved readings.");
                println!("Run with --force to confirm.");
                return Ok(());
            }

            let removed = store.clear()?;
            println!("Cleared {} readings from history.", removed);
        }
    }

    Ok(())
}
