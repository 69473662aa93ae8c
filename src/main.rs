use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};

mod app;
mod capability;
mod config;
mod error;
mod handler;
mod logging;
mod ollama;
mod oracle;
mod render;
mod tui;
mod ui;

use app::App;
use config::{Config, Overrides};
use oracle::Oracle;
use render::{markdown_to_html, HtmlPolicy};

#[derive(Parser)]
#[command(name = "oracle", version)]
#[command(about = "Ask the Digital Oracle; answers come from a local Ollama model")]
struct Cli {
    /// Ollama server URL
    #[arg(long, global = true, env = "ORACLE_ENDPOINT")]
    endpoint: Option<String>,
    /// Model to consult
    #[arg(short, long, global = true, env = "ORACLE_MODEL")]
    model: Option<String>,
    /// Config file (default: <config dir>/digital-oracle/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Pass raw HTML in answers through to rendered markup
    #[arg(long, global = true)]
    trust_html: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the oracle (default)
    Tui,
    /// Ask a single question and print the answer
    Ask {
        /// Your question
        query: String,
        /// Print the answer rendered as HTML instead of markdown
        #[arg(long)]
        html: bool,
    },
    /// Report whether the model server is reachable
    Probe,
    /// Write the effective settings to the config file
    InitConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?.apply(Overrides {
        endpoint: cli.endpoint,
        model: cli.model,
        trust_html: cli.trust_html,
    });

    // Logging is best effort; the oracle still works without a log file.
    let _log_guard = match logging::init(&config.log_level) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("warning: logging disabled: {e:#}");
            None
        }
    };
    info!(endpoint = %config.endpoint, model = %config.model, "starting");

    let config_path = cli.config.clone();
    let result = match cli.command.unwrap_or(Commands::Tui) {
        Commands::Tui => run_tui(&config).await,
        Commands::Ask { query, html } => ask(&config, query, html).await,
        Commands::Probe => probe(&config).await,
        Commands::InitConfig => init_config(&config, config_path),
    };
    // Logged here so the entry is flushed before the guard drops.
    if let Err(e) = &result {
        error!(error = %e, "fatal");
    }
    result
}

async fn run_tui(config: &Config) -> Result<ExitCode> {
    let capability = ollama::detect(config).await;
    info!(available = capability.is_available(), "capability resolved");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();
    let mut app = App::new(Oracle::new(capability), events.sender());

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event)?,
                None => break,
            }
        }
        anyhow::Ok(())
    }
    .await;

    tui::restore()?;
    result?;
    info!("goodbye");
    Ok(ExitCode::SUCCESS)
}

async fn ask(config: &Config, query: String, html: bool) -> Result<ExitCode> {
    let oracle = Oracle::new(ollama::detect(config).await);
    let html = html.then(|| config.html_policy());
    let answered = answer(oracle, query, html, &mut io::stdout(), &mut io::stderr()).await?;
    Ok(if answered {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// One round trip through the oracle. The answer goes to `out` as markdown,
/// or as markup when `html` is set; the fixed error message goes to `err`.
/// Returns false when the oracle reported an error.
async fn answer(
    mut oracle: Oracle,
    query: String,
    html: Option<HtmlPolicy>,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<bool> {
    oracle.on_input_change(query);
    oracle.submit().await;

    if let Some(e) = oracle.error() {
        writeln!(err, "{e}")?;
        return Ok(false);
    }
    if !oracle.response().is_empty() {
        match html {
            Some(policy) => write!(out, "{}", markdown_to_html(oracle.response(), policy))?,
            None => writeln!(out, "{}", oracle.response())?,
        }
    }
    Ok(true)
}

async fn probe(config: &Config) -> Result<ExitCode> {
    let capability = ollama::detect(config).await;
    match capability.factory() {
        Some(factory) => {
            println!("available ({}) at {}", factory.describe(), config.endpoint);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("not available at {}", config.endpoint);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn init_config(config: &Config, path: Option<PathBuf>) -> Result<ExitCode> {
    let path = match path {
        Some(p) => p,
        None => Config::get_config_path()?,
    };
    config.save_to(&path)?;
    println!("wrote {}", path.display());
    Ok(ExitCode::SUCCESS)
}
