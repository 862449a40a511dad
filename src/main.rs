use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

mod controller;
mod domain;
mod filter;
mod model;
mod record;
mod render;
mod schema;
mod sort;
mod ui;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use controller::Controller;
use domain::{GridConfig, GridError};
use model::{Model, Status};
use ui::TableUI;

/// Terminal viewer for json record feeds.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Path to a json file holding an array of flat records.
    path: String,

    /// Append tracing output to this file. Without it logs are discarded,
    /// they would corrupt the terminal ui otherwise.
    #[arg(long)]
    log_file: Option<String>,

    /// Terminal event poll interval in milliseconds.
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(cli: Cli) -> Result<(), GridError> {
    if let Some(log_file) = &cli.log_file {
        init_logging(log_file)?;
    }

    // Load before entering the alternate screen so errors print normally.
    let path = expand_path(&cli.path)?;
    let records = record::load_records(&path)?;
    let title = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "jgrid".to_string());

    let cfg = GridConfig {
        event_poll_time: cli.poll_ms,
        ..GridConfig::default()
    };
    let ui = TableUI::new();
    let controller = Controller::new(&cfg);

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &cfg, title, records, &ui, &controller);
    ratatui::restore();
    result
}

fn event_loop(
    terminal: &mut ratatui::DefaultTerminal,
    cfg: &GridConfig,
    title: String,
    records: Vec<record::Record>,
    ui: &TableUI,
    controller: &Controller,
) -> Result<(), GridError> {
    let size = terminal.size()?;
    let mut model = Model::init(cfg, title, records, size.width as usize, size.height as usize);

    while model.status != Status::Quitting {
        // Render the current view
        terminal.draw(|frame| ui.draw(model.get_uidata(), frame))?;

        // Handle events and map to a Message
        let message = controller.handle_event()?;
        model.update(message)?;
    }

    Ok(())
}

fn expand_path(raw: &str) -> Result<PathBuf, GridError> {
    let expanded =
        shellexpand::full(raw).map_err(|e| GridError::InvalidPath(format!("{raw}: {e}")))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

fn init_logging(log_file: &str) -> Result<(), GridError> {
    let path = expand_path(log_file)?;
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
