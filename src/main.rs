//! Salesdesk - ask natural-language questions about sales data
//!
//! A CLI that loads a sales CSV, answers common questions with canned
//! statistics and forwards everything else to an LLM answering service.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Fatal error (bad arguments, config, malformed dataset, etc.)
//!   2 - One-shot mode where at least one question could not be answered

mod analysis;
mod assistant;
mod cli;
mod config;
mod dataset;
mod error;
mod models;
mod report;
mod router;
mod secret_input;
mod session;

use anyhow::{Context, Result};
use assistant::{ApiKey, FallbackDelegate, OpenAiAnswerService, OpenAiConfig};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::Config;
use error::InsightError;
use indicatif::{ProgressBar, ProgressStyle};
use models::{Intent, Outcome};
use session::Session;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so `[general] verbose` applies
    let (mut config, source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(&args, config.general.verbose);

    info!("Salesdesk v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    source.log();

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Session failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .salesdesk.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!("⚠️  .salesdesk.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .salesdesk.toml")?;

    println!("✅ Created .salesdesk.toml with default settings.");
    println!("   Edit it to set column names, the monthly goal and the answering service.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config_verbose: bool) {
    let level = args.log_level(config_verbose);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run one session. Returns the exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    let data_path = args.data.clone().context("--data is required")?;

    // Step 1: Load the dataset (fatal on error)
    if !args.quiet {
        println!("📥 Loading sales data: {}", data_path.display());
    }
    let loader_config = dataset::LoadConfig::from(&config.dataset);
    let sales = dataset::load_dataset(&data_path, &loader_config)
        .with_context(|| format!("Cannot load {}", data_path.display()))?;

    if !args.quiet {
        println!("   Records: {}", sales.len());
        if let Some((first, last)) = sales.date_range() {
            println!("   Period: {} to {}", first, last);
        }
    }

    // Step 2: Wire up the answering service
    let service = OpenAiAnswerService::new(OpenAiConfig::from(&config.assistant))
        .context("Failed to initialize answering service")?;
    let credential = config.assistant.api_key.clone();
    if credential.is_none() {
        info!("No API key configured; open questions will need one");
    }
    let delegate = FallbackDelegate::new(
        Box::new(service),
        credential,
        Duration::from_secs(config.assistant.timeout_seconds),
        config.assistant.allow_plotting,
    );

    let settings = analysis::AnalysisSettings::from(&config.analysis);
    let mut session = Session::new(sales, settings, delegate);

    // Step 3: Answer questions
    let exit_code = if args.is_interactive() {
        run_interactive(&mut session, &args).await?;
        0
    } else {
        run_one_shot(&mut session, &args).await
    };

    // Step 4: Export the transcript if asked
    if let Some(ref export) = config.general.export {
        export_transcript(
            &session,
            &data_path,
            &config.assistant.model,
            Path::new(export),
            args.format,
        )?;
    }

    Ok(exit_code)
}

/// Answer each --ask question in order. Returns 2 if any failed.
async fn run_one_shot(session: &mut Session, args: &Args) -> i32 {
    let mut failures = 0;

    for question in &args.ask {
        match ask_with_spinner(session, question, args.quiet).await {
            Ok(outcome) => print_outcome(&outcome, args.format),
            Err(e) => {
                failures += 1;
                eprintln!("⚠️  {}: {}", question, e);
            }
        }
    }

    if failures > 0 {
        eprintln!(
            "\n⛔ {} of {} questions could not be answered (exit code 2).",
            failures,
            args.ask.len()
        );
        2
    } else {
        0
    }
}

/// Read questions from stdin until EOF or :quit.
async fn run_interactive(session: &mut Session, args: &Args) -> Result<()> {
    println!("\n💬 Ask a question about the data (:help for commands, :quit to exit)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\n❓ ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await.context("Failed to read from stdin")? else {
            break;
        };
        let question = line.trim();

        match question {
            "" => continue,
            ":quit" | ":q" | ":exit" => break,
            ":help" => {
                print_help();
                continue;
            }
            ":history" => {
                print!("{}", report::render_history(session.history()));
                continue;
            }
            _ => {}
        }

        let mut result = ask_with_spinner(session, question, args.quiet).await;

        if matches!(result, Err(InsightError::MissingCredential)) && std::io::stdin().is_terminal()
        {
            if let Some(key) = prompt_for_key().await? {
                session.set_credential(key);
                result = ask_with_spinner(session, question, args.quiet).await;
            }
        }

        match result {
            Ok(outcome) => print_outcome(&outcome, args.format),
            Err(e) if !e.is_recoverable() => return Err(e.into()),
            Err(e) => println!("⚠️  {}", e),
        }
    }

    println!("\n👋 Answered {} question(s).", session.history().len());
    Ok(())
}

/// Ask a question, showing a spinner while the answering service works.
async fn ask_with_spinner(
    session: &mut Session,
    question: &str,
    quiet: bool,
) -> std::result::Result<Outcome, InsightError> {
    let spinner = (!quiet
        && session.has_credential()
        && router::classify(question) == Intent::Fallback)
        .then(|| {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.cyan} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.set_message("Analyzing with AI...");
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });

    let result = session.ask(question).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    result
}

/// Ask the user for an API key on the terminal, without echoing it.
async fn prompt_for_key() -> Result<Option<ApiKey>> {
    print!("🔑 No API key configured. Enter one (blank to skip): ");
    std::io::stdout().flush().ok();

    let line = tokio::task::spawn_blocking(secret_input::read_hidden_line)
        .await
        .context("API key prompt stopped unexpectedly")??;
    let key = line.and_then(ApiKey::new);
    if key.is_none() {
        warn!("No API key entered");
    }
    Ok(key)
}

fn print_outcome(outcome: &Outcome, format: OutputFormat) {
    match format {
        OutputFormat::Markdown => println!("{}", report::render_outcome_markdown(outcome)),
        OutputFormat::Json => match report::render_outcome_json(outcome) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("⚠️  Failed to encode answer: {}", e),
        },
    }
}

fn print_help() {
    println!("Questions are matched on keywords:");
    println!("   monthly / comparative / growth  → monthly trend");
    println!("   average                         → average sale value");
    println!("   top / best sellers              → best-selling products");
    println!("   goal / target                   → months against the goal");
    println!("   recommend                       → product to invest in");
    println!("   forecast / prediction           → next months' projection");
    println!("   anything else                   → AI answer");
    println!("Commands: :history, :help, :quit");
}

/// Write the session transcript.
fn export_transcript(
    session: &Session,
    data_path: &Path,
    model: &str,
    output: &Path,
    format: OutputFormat,
) -> Result<()> {
    let metadata = report::TranscriptMetadata {
        data_file: data_path.display().to_string(),
        records: session.dataset().len(),
        model: model.to_string(),
        generated_at: Utc::now(),
    };

    let content = match format {
        OutputFormat::Json => report::generate_json_transcript(&metadata, session.history())?,
        OutputFormat::Markdown => {
            report::generate_markdown_transcript(&metadata, session.history())
        }
    };

    std::fs::write(output, &content)
        .with_context(|| format!("Failed to write transcript to {}", output.display()))?;

    println!("📝 Transcript saved to: {}", output.display());
    Ok(())
}

/// Where the configuration came from. Logged once logging is up.
enum ConfigSource {
    Explicit(PathBuf),
    DefaultFile,
    Builtin,
    Fallback(String),
}

impl ConfigSource {
    fn log(&self) {
        match self {
            ConfigSource::Explicit(path) => info!("Loaded config from: {}", path.display()),
            ConfigSource::DefaultFile => info!("Loaded default config from .salesdesk.toml"),
            ConfigSource::Builtin => debug!("No config file found, using defaults"),
            ConfigSource::Fallback(reason) => {
                warn!("Failed to load config: {}; using defaults", reason)
            }
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigSource::Explicit(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigSource::DefaultFile)),
        Ok(None) => Ok((Config::default(), ConfigSource::Builtin)),
        Err(e) => Ok((Config::default(), ConfigSource::Fallback(format!("{:#}", e)))),
    }
}
