//! Cooktime - Main entry point
//!
//! `cooktime serve` runs the HTTP/SSE service; `cooktime run` arms (or
//! resumes) the active meal and prints alerts in the foreground. The other
//! subcommands are one-shot catalog and session operations against the same
//! database.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cooktime_common::config::{self, TomlConfig, ROOT_FOLDER_ENV};
use cooktime_common::events::CooktimeEvent;
use cooktime_common::timeline::{Granularity, TimelineFilter};

use cooktime_session::api::{self, AppContext};
use cooktime_session::audio::{AudioCueSink, LogCueSink};
use cooktime_session::db;
use cooktime_session::notify::{ConsoleNotificationSink, LogNotificationSink, NotificationSink};
use cooktime_session::session::RecoveryOutcome;
use cooktime_session::store::SqliteStore;
use cooktime_session::{AppDeps, CookApp};

/// Command-line arguments for cooktime
#[derive(Parser, Debug)]
#[command(name = "cooktime")]
#[command(about = "Meal timing coordinator: plan backwards from serve time and get alerted")]
#[command(version)]
struct Args {
    /// Root folder holding the database
    #[arg(short, long, global = true, env = ROOT_FOLDER_ENV)]
    root_folder: Option<String>,

    /// Config file (defaults to <config dir>/cooktime/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API and SSE stream
    Serve {
        /// Port to listen on (defaults to the config value, 5780)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Arm or resume the active meal and print alerts until it is served
    Run,
    /// Print the timeline of the active meal
    Timeline {
        /// all | upcoming | done
        #[arg(short, long, default_value = "all")]
        filter: String,
        /// all | start | end
        #[arg(short, long, default_value = "all")]
        granularity: String,
    },
    /// List meals (the active one is marked with *)
    Meals,
    /// Make a meal active
    Select { id: String },
    /// Import a meal from a JSON file and make it active
    Import { file: PathBuf },
    /// Print a meal as JSON (the active one by default)
    Export {
        #[arg(short, long)]
        meal: Option<String>,
    },
    /// Stop the running session and forget its record
    Stop,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load_or_default(args.config.as_deref());

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(&config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let root_folder = config::resolve_root_folder(args.root_folder.as_deref(), &config);
    config::ensure_root_folder(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;
    info!("Root folder: {}", root_folder.display());

    let db_path = config.database_path(&root_folder);
    let pool = db::open_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let store = Arc::new(SqliteStore::new(pool));

    let notifier: Arc<dyn NotificationSink> = match args.command {
        Command::Run => Arc::new(ConsoleNotificationSink),
        _ => Arc::new(LogNotificationSink),
    };
    let mut deps = AppDeps::new(store.clone(), store, notifier, audio_sink(&config));
    deps.default_serve_time = config.default_serve_time();
    deps.sound_enabled = config.sound.enabled;

    match args.command {
        Command::Serve { port } => serve(deps, port.unwrap_or(config.port)).await,
        Command::Run => run_foreground(deps).await,
        Command::Timeline {
            filter,
            granularity,
        } => {
            let filter: TimelineFilter = filter.parse()?;
            let granularity: Granularity = granularity.parse()?;
            let (app, _fire_rx) = CookApp::new(deps).await;
            let view = app.timeline(filter, granularity);

            println!("{}\n{} (cooking time {})", view.meal_name, view.meta, view.cook_time);
            for entry in &view.events {
                let marker = if view.next_id.as_deref() == Some(entry.event.id.as_str()) {
                    ">"
                } else if entry.done {
                    "x"
                } else {
                    " "
                };
                println!(
                    "{} {}  {:<12} {}  ({})",
                    marker, entry.time_label, entry.countdown, entry.title, entry.meta
                );
            }
            Ok(())
        }
        Command::Meals => {
            let (app, _fire_rx) = CookApp::new(deps).await;
            let active = app.catalog().active_id().to_string();
            for meal in app.catalog().summaries() {
                let marker = if meal.id == active { "*" } else { " " };
                println!("{} {}  {}", marker, meal.id, meal.name);
            }
            Ok(())
        }
        Command::Select { id } => {
            let (mut app, _fire_rx) = CookApp::new(deps).await;
            let meal = app.catalog_mut().select(&id).await?;
            println!("Active meal: {}", meal.name);
            Ok(())
        }
        Command::Import { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let (mut app, _fire_rx) = CookApp::new(deps).await;
            let meal = app.catalog_mut().import_json(&text).await?;
            println!("Imported '{}' as {}", meal.name, meal.id);
            Ok(())
        }
        Command::Export { meal } => {
            let (app, _fire_rx) = CookApp::new(deps).await;
            let id = meal.unwrap_or_else(|| app.catalog().active_id().to_string());
            println!("{}", app.catalog().export_json(&id)?);
            Ok(())
        }
        Command::Stop => {
            let (mut app, _fire_rx) = CookApp::new(deps).await;
            if app.stop_persisted().await? {
                println!("Session stopped");
            } else {
                println!("No session to stop");
            }
            Ok(())
        }
    }
}

async fn serve(deps: AppDeps, port: u16) -> Result<()> {
    info!("Starting Cooktime on port {}", port);

    let bus = deps.bus.clone();
    let (app, _fire_loop) = CookApp::start(deps).await;

    match app.lock().await.recover_on_startup().await {
        Ok(outcome) => info!("Startup recovery: {:?}", outcome),
        Err(e) => warn!("Session recovery failed: {}", e),
    }

    api::run(port, AppContext::new(app, bus), shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn run_foreground(deps: AppDeps) -> Result<()> {
    let mut events = deps.bus.subscribe();
    let (app, _fire_loop) = CookApp::start(deps).await;

    {
        let mut app = app.lock().await;
        let scheduled = match app.recover_on_startup().await? {
            RecoveryOutcome::Resumed { scheduled } => {
                println!("Resumed session for '{}'", app.catalog().active().name);
                scheduled
            }
            RecoveryOutcome::NoSession | RecoveryOutcome::Orphaned { .. } => {
                let outcome = app.arm_active().await?;
                println!(
                    "Armed '{}': serve at {}, {} alerts ({} already past)",
                    app.catalog().active().name,
                    app.zone().label(outcome.serve_when),
                    outcome.scheduled,
                    outcome.skipped
                );
                outcome.scheduled
            }
        };

        if scheduled == 0 {
            println!("Nothing left to alert; session stopped");
            app.stop().await?;
            return Ok(());
        }
    }

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                println!("Session left armed; run again to resume or `cooktime stop` to cancel");
                return Ok(());
            }
            event = events.recv() => match event {
                Ok(CooktimeEvent::SessionCompleted { .. }) => {
                    app.lock().await.stop().await?;
                    println!("All alerts fired. Enjoy your meal!");
                    return Ok(());
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Missed {} events", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return Ok(()),
            }
        }
    }
}

fn default_filter(level: &str) -> String {
    format!(
        "cooktime_session={level},cooktime_common={level},tower_http={level}",
        level = level
    )
}

fn audio_sink(config: &TomlConfig) -> Arc<dyn AudioCueSink> {
    if !config.sound.enabled {
        info!("Sound disabled in config");
        return Arc::new(LogCueSink);
    }

    #[cfg(feature = "tone")]
    {
        match cooktime_session::audio::ToneCueSink::new(config.sound.effective_volume()) {
            Ok(sink) => return Arc::new(sink),
            Err(e) => warn!("Audio cues unavailable, logging them instead: {}", e),
        }
    }

    Arc::new(LogCueSink)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
