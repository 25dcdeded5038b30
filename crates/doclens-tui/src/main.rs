use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use doclens_core::{
    ChatBackend, CommandCamera, Config, ConfigError, Connector, GeminiClient, SessionController,
};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "doclens")]
#[command(version, about = "Analyze PDFs, Word documents, photos and pasted text with Gemini")]
struct Cli {
    /// Gemini model to use
    #[arg(short, long)]
    model: Option<String>,

    /// Directory where exported reports are written
    #[arg(short, long)]
    export_dir: Option<PathBuf>,

    /// Camera device passed to the capture program
    #[arg(long)]
    camera_device: Option<String>,

    /// Log file (defaults to the user cache directory)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Persist the given options to the config file and exit
    #[arg(long)]
    save_config: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.model = Some(model.clone());
        }
        if let Some(dir) = &self.export_dir {
            config.export_dir = Some(dir.clone());
        }
        if let Some(device) = &self.camera_device {
            config.camera_device = Some(device.clone());
        }
    }
}

fn default_log_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("doclens")
        .join("doclens.log")
}

/// The terminal belongs to the UI, so logs go to a file.
fn init_tracing(path: &PathBuf) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory '{}'", parent.display()))?;
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file '{}'", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,doclens_core=debug,doclens=debug".into()),
        )
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = cli.log_file.clone().unwrap_or_else(default_log_path);
    init_tracing(&log_path)?;

    let mut config = Config::load().context("failed to load config")?;
    cli.apply(&mut config);

    if cli.save_config {
        let path = config.save().context("failed to save config")?;
        println!("Saved config to {}", path.display());
        return Ok(());
    }

    tracing::info!(model = config.model(), "starting doclens");

    let connector_config = config.clone();
    let connector: Connector = Arc::new(move || -> Result<Arc<dyn ChatBackend>, ConfigError> {
        let client = GeminiClient::from_config(&connector_config)?;
        Ok(Arc::new(client) as Arc<dyn ChatBackend>)
    });
    let camera = Arc::new(CommandCamera::new(
        config.camera_program(),
        config.camera_device(),
    ));

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let controller = SessionController::new(config, connector, camera, events.session_sender());
    let mut app = App::new(controller);

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        let Some(event) = events.next().await else {
            break;
        };
        handler::handle_event(app, event)?;

        // Apply everything already queued before redrawing
        while let Some(event) = events.try_next() {
            handler::handle_event(app, event)?;
            if app.should_quit {
                break;
            }
        }
    }
    Ok(())
}
