use clap::{Parser, ValueEnum};
use color_eyre::Result;
use crossterm::event::{self, Event as CEvent};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use fmcsa_viewer::{App, Config};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info};

const TICK: Duration = Duration::from_millis(100);

/// Terminal viewer for FMCSA carrier records
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// CSV file path or http(s) URL (overrides the configured source)
    #[arg(long = "source", value_name = "PATH|URL")]
    source: Option<String>,
    /// Path to a config file (overrides default config discovery)
    #[arg(long = "config", value_name = "PATH")]
    config: Option<PathBuf>,
    /// Enable file logging at the given level (overrides RUST_LOG)
    #[arg(long = "logging", value_enum)]
    logging: Option<LogLevel>,
    /// Log file location (defaults to fmcsa-viewer.log in the working directory)
    #[arg(long = "log-file", value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    fmcsa_viewer::errors::init()?;
    fmcsa_viewer::logging::init_with(args.log_file.clone(), args.logging.map(Into::into))?;

    let mut config = Config::from_path(args.config.as_deref())?;
    if let Some(source) = args.source {
        config.source = source;
    }
    let source = config.data_source()?;
    info!("Starting with source {}", source);

    let runtime = tokio::runtime::Runtime::new()?;
    let mut app = App::new(config);
    app.start_load(runtime.handle(), source);

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // App loop
    let res = run_app(&mut terminal, &mut app);
    app.shutdown();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    if let Err(e) = &res {
        error!("Error: {e}");
    }
    runtime.shutdown_timeout(Duration::from_secs(1));
    res
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        app.update(Instant::now())?;
        terminal.draw(|f| app.render(f))?;

        // Poll for events
        if event::poll(TICK)? {
            if let CEvent::Key(key_event) = event::read()? {
                app.handle_key_event(key_event, Instant::now())?;
            }
        }

        if app.should_quit() {
            info!("Quit requested");
            return Ok(());
        }
    }
}
