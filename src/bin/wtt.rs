//! wtt - Work time tracking for a document on disk
//!
//! # Usage
//!
//! ```bash
//! # Track a file; type commands on stdin (`help` lists them)
//! wtt track scene.blend
//!
//! # Shorter breaks, log to a file instead of stderr
//! wtt track scene.blend --break-threshold 120 --log-file
//!
//! # Inspect stored time without tracking
//! wtt status scene.blend
//! wtt report scene.blend > report.md
//!
//! # Enable debug logging
//! RUST_LOG=wtt_tracker=debug wtt track scene.blend
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: end the session, save, and exit

use std::fs::{self, OpenOptions};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use wtt_core::{clamp_secs, format_time, report, Clock, StatusView, SystemClock};
use wtt_store::DocumentRef;
use wtt_tracker::console::HELP;
use wtt_tracker::{
    connect_tracker, schedule_ticks, spawn_tracker, watch_document, ConsoleCommand, HostEvent,
    HostHooks, TokioScheduler, TrackerConfig, TrackerHandle,
};

// ============================================================================
// CLI Arguments
// ============================================================================

/// Crash-safe work time tracking with automatic break detection
#[derive(Parser, Debug)]
#[command(name = "wtt", version, about)]
struct Args {
    /// Config file (default: $WTT_CONFIG, then <config dir>/wtt/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Track working time on a document until quit or signalled
    Track {
        document: PathBuf,

        /// Seconds of inactivity before a break is recorded
        #[arg(long)]
        break_threshold: Option<u64>,

        /// Seconds without a document save before warning
        #[arg(long)]
        unsaved_warning: Option<u64>,

        /// Log to <state dir>/wtt/wtt.log instead of stderr
        #[arg(long)]
        log_file: bool,
    },
    /// Print a Markdown report of a document's tracked time
    Report { document: PathBuf },
    /// Print a document's tracked totals
    Status { document: PathBuf },
}

// ============================================================================
// Logging Setup
// ============================================================================

fn log_file_path() -> PathBuf {
    dirs::state_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("wtt")
        .join("wtt.log")
}

fn init_logging(to_file: bool) -> Result<()> {
    let level = if to_file { "info" } else { "warn" };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("wtt={level}").parse()?)
        .add_directive(format!("wtt_core={level}").parse()?)
        .add_directive(format!("wtt_store={level}").parse()?)
        .add_directive(format!("wtt_tracker={level}").parse()?);

    if to_file {
        let path = log_file_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create log directory")?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_to_file = matches!(args.command, Command::Track { log_file: true, .. });
    init_logging(log_to_file)?;

    let mut config =
        TrackerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    match args.command {
        Command::Track {
            document,
            break_threshold,
            unsaved_warning,
            ..
        } => {
            if let Some(secs) = break_threshold {
                config.break_threshold_secs = secs;
            }
            if let Some(secs) = unsaved_warning {
                config.unsaved_warning_threshold_secs = secs;
            }
            config.validate().context("Invalid settings")?;
            track(document, config).await
        }
        Command::Report { document } => {
            let doc = DocumentRef::new(document);
            let now = SystemClock::new().now();
            let loaded = wtt_store::load(&doc, now);
            let name = doc.file_name().unwrap_or_else(|| doc.to_string());
            print!("{}", report::render(&loaded.store, &name, now));
            Ok(())
        }
        Command::Status { document } => {
            let doc = DocumentRef::new(document);
            let now = SystemClock::new().now();
            let loaded = wtt_store::load(&doc, now);
            if let Some(issue) = &loaded.issue {
                println!("{doc}: {issue}");
            }
            let unsaved = doc
                .modified_time()
                .map(|mtime| clamp_secs(now - mtime))
                .unwrap_or(0);
            let view = StatusView::project(&loaded.store, now, 0, unsaved, &config.thresholds());
            println!("{}", view.format_detail());
            Ok(())
        }
    }
}

// ============================================================================
// Tracking
// ============================================================================

async fn track(document: PathBuf, config: TrackerConfig) -> Result<()> {
    if !document.is_file() {
        bail!("{} is not a file", document.display());
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        document = %document.display(),
        break_threshold_secs = config.break_threshold_secs,
        "wtt starting"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let (handle, issue) = spawn_tracker(&document, &config, clock);
    if let Some(issue) = issue.filter(|i| !i.is_expected()) {
        eprintln!("warning: {issue}; starting a fresh history");
    }

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        shutdown_token.cancel();
    });

    let scheduler = TokioScheduler::with_parent(&cancel_token);
    let _ticks = schedule_ticks(&scheduler, &handle, config.tick_interval());

    let hooks = HostHooks::new();
    connect_tracker(&hooks, &handle);
    hooks.emit(&HostEvent::Opened(document.clone()));

    let (path_tx, path_rx) = watch::channel(document.clone());
    let _watcher = watch_document(&scheduler, config.tick_interval(), hooks, path_rx);

    println!("{}", handle.status().await?.format_line());
    println!("Type 'help' for commands.");

    let mut console = Console {
        handle: &handle,
        path_tx,
        current: document,
    };
    console.run(&cancel_token).await?;

    scheduler.shutdown();
    match handle.close().await {
        Ok(()) => {
            info!("wtt stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Final save failed");
            Err(e.into())
        }
    }
}

struct Console<'a> {
    handle: &'a TrackerHandle,
    path_tx: watch::Sender<PathBuf>,
    current: PathBuf,
}

impl Console<'_> {
    /// Reads commands until `quit`, a signal, or (after stdin closes) a signal.
    async fn run(&mut self, cancel_token: &CancellationToken) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => {
                    info!("Shutdown signal received");
                    return Ok(());
                }

                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if self.dispatch(&line).await?.is_break() {
                            return Ok(());
                        }
                    }
                    Ok(None) => {
                        info!("stdin closed, tracking until signalled");
                        cancel_token.cancelled().await;
                        return Ok(());
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read stdin, tracking until signalled");
                        cancel_token.cancelled().await;
                        return Ok(());
                    }
                },
            }
        }
    }

    async fn dispatch(&mut self, line: &str) -> Result<ControlFlow<()>> {
        self.handle.activity().await?;

        let command = match ConsoleCommand::parse(line) {
            Ok(command) => command,
            Err(e) => {
                println!("{e}");
                return Ok(ControlFlow::Continue(()));
            }
        };

        match command {
            ConsoleCommand::Activity => {}
            ConsoleCommand::Status => {
                println!("{}", self.handle.status().await?.format_line());
            }
            ConsoleCommand::NewSession => {
                let id = self.handle.new_session().await?;
                println!("Started session {id}");
            }
            ConsoleCommand::Comment(text) => {
                if !self.handle.set_comment(text).await? {
                    println!("No active session");
                }
            }
            ConsoleCommand::ResetCurrent => {
                if self.handle.reset_current_session().await? {
                    println!("Current session reset");
                } else {
                    println!("No active session");
                }
            }
            ConsoleCommand::ResetAll { confirmed: false } => {
                println!("This discards all tracked time. Type 'reset-all --yes' to confirm.");
            }
            ConsoleCommand::ResetAll { confirmed: true } => {
                let id = self.handle.reset_all_sessions().await?;
                println!("All sessions discarded; started session {id}");
            }
            ConsoleCommand::ClearBreaks => {
                let cleared = self.handle.clear_breaks().await?;
                println!("Cleared {cleared} breaks");
            }
            ConsoleCommand::Report => {
                print!("{}", self.handle.report().await?);
            }
            ConsoleCommand::SaveAs(path) => self.save_as(path).await?,
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Quit => return Ok(ControlFlow::Break(())),
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Copies the document to `path` and moves tracking there.
    async fn save_as(&mut self, path: PathBuf) -> Result<()> {
        if let Err(e) = copy_document(&self.current, &path) {
            println!("{e:#}");
            return Ok(());
        }
        self.handle.document_saved(Some(path.clone())).await?;
        // the watcher only follows the new path; the copy itself is not a save
        let _ = self.path_tx.send(path.clone());
        println!(
            "Now tracking {} ({})",
            path.display(),
            format_time(self.handle.status().await?.total_secs)
        );
        self.current = path;
        Ok(())
    }
}

fn copy_document(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to)
        .with_context(|| format!("Failed to copy {} to {}", from.display(), to.display()))?;
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
