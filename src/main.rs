mod app;
mod ui;

use anyhow::{bail, Context, Result};
use app::{poll_event, App};
use clap::{Parser, ValueEnum};
use crossterm::event::Event;
use probespeed::{
    ChannelHandler, Direction, EventHandler, FanOut, ProbeState, ResultsToFile, Settings, TrafficGenerator,
};
use ratatui::DefaultTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use ui::draw_ui;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Endpoint receiving upload probes
    #[arg(long)]
    upload_url: Option<String>,

    /// Resource fetched by download probes
    #[arg(long)]
    download_url: Option<String>,

    /// Exact upload payload in bytes
    #[arg(long)]
    upload_size: Option<u64>,

    /// Download byte budget; larger resources are truncated
    #[arg(long)]
    download_budget: Option<u64>,

    /// Append a CSV record per completed probe to this file
    #[arg(long)]
    results_file: Option<PathBuf>,

    /// Field delimiter for CSV records
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Connect timeout in seconds
    #[arg(long, default_value_t = 10)]
    connect_timeout: u64,

    /// Whole-transfer timeout in seconds
    #[arg(long, default_value_t = 120)]
    timeout: u64,

    /// Bytes per upload request
    #[arg(long)]
    upload_chunk: Option<usize>,

    /// Write logs to this file (the terminal belongs to the UI)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Run a single probe without the UI and print its CSV record
    #[arg(long, value_enum)]
    once: Option<OnceMode>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OnceMode {
    Upload,
    Download,
}

impl Args {
    fn settings(&self) -> Settings {
        let defaults = Settings::default();
        Settings {
            upload_size_bytes: self.upload_size.unwrap_or(defaults.upload_size_bytes),
            download_budget_bytes: self.download_budget.unwrap_or(defaults.download_budget_bytes),
            upload_url: self.upload_url.clone().unwrap_or(defaults.upload_url),
            download_url: self.download_url.clone().unwrap_or(defaults.download_url),
            connect_timeout: Duration::from_secs(self.connect_timeout),
            transfer_timeout: Duration::from_secs(self.timeout),
            upload_chunk_bytes: self.upload_chunk.unwrap_or(defaults.upload_chunk_bytes),
            csv_delimiter: self.delimiter,
            results_file: self.results_file.clone(),
            poll_interval: defaults.poll_interval,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;
    let settings = args.settings();

    if let Some(mode) = args.once {
        let direction = match mode {
            OnceMode::Upload => Direction::Upload,
            OnceMode::Download => Direction::Download,
        };
        return tokio::task::spawn_blocking(move || run_once(&settings, direction)).await?;
    }

    let mut terminal = ratatui::init();
    terminal.clear()?;

    let result = run_app(&mut terminal, settings).await;

    ratatui::restore();
    result
}

fn init_logging(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("probespeed=info"));

    if let Some(path) = &args.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
            .init();
    } else if args.once.is_some() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}

fn results_sink(settings: &Settings) -> Option<Arc<ResultsToFile>> {
    settings
        .results_file
        .as_ref()
        .map(|path| Arc::new(ResultsToFile::with_delimiter(path, settings.csv_delimiter)))
}

fn run_once(settings: &Settings, direction: Direction) -> Result<()> {
    let generator = TrafficGenerator::with_settings(settings);
    if let Some(sink) = results_sink(settings) {
        generator.set_event_handler(sink);
    }

    let (size, url) = match direction {
        Direction::Upload => (settings.upload_size_bytes, &settings.upload_url),
        Direction::Download => (settings.download_budget_bytes, &settings.download_url),
    };
    generator.try_perform(direction, size, url)?;

    while generator.is_busy() {
        std::thread::sleep(settings.poll_interval);
    }
    let result = generator.status();
    generator.cleanup()?;

    println!("{}", result.to_csv(settings.csv_delimiter));
    if result.state == ProbeState::Error {
        bail!("{direction} probe against {url} failed");
    }
    Ok(())
}

async fn run_app(terminal: &mut DefaultTerminal, settings: Settings) -> Result<()> {
    let (channel, results_rx) = ChannelHandler::channel();
    let mut handlers = FanOut::new().with(Arc::new(channel));
    if let Some(sink) = results_sink(&settings) {
        handlers = handlers.with(sink as Arc<dyn EventHandler>);
    }

    let generator = TrafficGenerator::with_settings(&settings);
    generator.set_event_handler(Arc::new(handlers));

    let poll_interval = settings.poll_interval;
    let mut app = App::new(generator, settings, results_rx);

    loop {
        app.refresh();
        terminal.draw(|frame| draw_ui(frame, &app))?;

        // Handle input
        if let Some(Event::Key(key)) = poll_event(poll_interval)? {
            if let Some(action) = app.handle_key_event(key) {
                app.apply(action);
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
