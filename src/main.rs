//! arenaview - Browse Are.na channels from the terminal
//!
//! Prints a channel's blocks as a grid or a diary, and with `--watch` keeps
//! printing blocks as they are connected.

use std::process::ExitCode;

use clap::Parser;

use arenaview::app::{App, AppEvent, Command};
use arenaview::channels;
use arenaview::cli::{Action, Cli, StartupConfig};
use arenaview::loader::PageOutcome;
use arenaview::logging;
use arenaview::refresh::RefreshMessage;
use arenaview::render;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match StartupConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        }
    };

    logging::init(config.verbose);

    let mut app = App::with_startup_config(&config);
    if config.clear_cache {
        app.dispatch(Command::ClearCache).await;
    }

    match config.action.clone() {
        Action::Search(query) => {
            if let AppEvent::SearchResults(results) = app.dispatch(Command::Search(query)).await {
                if results.is_empty() {
                    println!("No matching channels");
                }
                for result in results {
                    println!("{:<40} {}", result.label(), result.slug());
                }
            }
            ExitCode::SUCCESS
        }
        Action::Featured => {
            for channel in channels::load_featured(app.client()).await {
                print!("{}", render::render_header(&channel));
                println!("  {}", channel.slug);
            }
            ExitCode::SUCCESS
        }
        Action::Open => run_channel(&mut app, &config).await,
    }
}

/// Opens the configured channel, loads the requested pages and prints them
async fn run_channel(app: &mut App, config: &StartupConfig) -> ExitCode {
    let mut outcome = match app.dispatch(Command::Open(config.channel.clone())).await {
        AppEvent::Loaded { outcome, .. } => outcome,
        AppEvent::Error(message) => {
            eprintln!("error: {}", message);
            return ExitCode::FAILURE;
        }
        _ => return ExitCode::FAILURE,
    };

    for _ in 1..config.pages {
        if !matches!(outcome, PageOutcome::Loaded { has_more: true, .. }) {
            break;
        }
        outcome = match app.dispatch(Command::LoadMore).await {
            AppEvent::Loaded { outcome, .. } => outcome,
            AppEvent::Error(message) => {
                eprintln!("error: {}", message);
                break;
            }
            _ => break,
        };
    }

    print!("{}", app.render());
    if let PageOutcome::Ended { .. } = outcome {
        eprintln!("Couldn't load more blocks; showing what was loaded.");
    }

    if config.watch {
        watch(app).await;
    }
    ExitCode::SUCCESS
}

/// Prints new blocks in the chosen layout as the poller finds them, until Ctrl-C
async fn watch(app: &mut App) {
    eprintln!("Watching for new blocks, press Ctrl-C to stop.");
    loop {
        let message = tokio::select! {
            message = app.next_poll_message() => message,
            _ = tokio::signal::ctrl_c() => None,
        };
        match message {
            Some(RefreshMessage::NewContent { added, .. }) => {
                let items = app.items();
                print!("{}", app.render_blocks(&items[..added.min(items.len())]));
            }
            Some(RefreshMessage::Reloaded { total, .. }) => {
                eprintln!("Back online, reloaded {} blocks.", total);
                print!("{}", app.render());
            }
            Some(RefreshMessage::RefreshError(message)) => eprintln!("warning: {}", message),
            None => break,
        }
    }
    app.dispatch(Command::Close).await;
}
