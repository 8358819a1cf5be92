// gridask CLI - plain-language questions about CSV and Excel files

mod exit_codes;
mod output;
mod session;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use gridask_config::{AIConfigStatus, AIDiagnostics, Settings};
use gridask_io::{load_path, IngestError, LoadOptions, LoadedDataset};
use gridask_query::{ErrorKind, Outcome, Resolver};

use exit_codes::{
    EXIT_AI_DISABLED, EXIT_AI_MISSING_KEY, EXIT_ERROR, EXIT_INGEST, EXIT_QUERY_FAILED,
    EXIT_USAGE,
};
use output::{render_failure, render_json, render_outcome, RenderOptions};
use session::Session;

#[derive(Parser)]
#[command(name = "gridask")]
#[command(about = "Ask plain-language questions about tabular data")]
#[command(long_version = long_version())]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Settings file to use instead of the per-user default
    #[arg(long, global = true, env = "GRIDASK_CONFIG")]
    config: Option<PathBuf>,

    /// More log output on stderr (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer one question about a file
    #[command(after_help = "\
Examples:
  gridask ask sales.csv 'how many rows'
  gridask ask sales.csv 'average revenue by region'
  gridask ask book.xlsx 'show missing values' --sheet Q3
  gridask ask sales.csv 'correlation' --json

Exit codes:
  0  answered
  3  the file could not be loaded
  4  the question could not be answered")]
    Ask {
        /// CSV, TSV or Excel file
        file: PathBuf,

        /// The question, in plain language
        query: String,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,

        /// Show the code equivalent of the answer
        #[arg(long)]
        show_code: bool,

        /// Worksheet to read from Excel files
        #[arg(long)]
        sheet: Option<String>,
    },

    /// Ask questions interactively against one loaded file
    #[command(after_help = "\
Commands inside the session:
  :history   list the questions asked so far
  :clear     forget the history
  :info      describe the loaded file
  :code      toggle showing code under answers
  :quit      leave (also :q, :exit, Ctrl-D)")]
    Repl {
        file: PathBuf,

        #[arg(long)]
        sheet: Option<String>,
    },

    /// Describe a file: column types, data quality, suggested questions
    Info {
        file: PathBuf,

        #[arg(long)]
        json: bool,

        #[arg(long)]
        sheet: Option<String>,
    },

    /// Diagnose the AI configuration used for complex questions
    #[command(after_help = "\
Exit codes:
  0   ready
  10  AI disabled (provider = none)
  11  provider configured but no API key")]
    Doctor {
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nquery:   gridask-query ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = load_settings(cli.config.as_deref());

    let result = match cli.command {
        None => {
            eprintln!("Usage: gridask <command> [options]");
            eprintln!("       gridask --help for more information");
            Ok(())
        }
        Some(Commands::Ask { file, query, json, show_code, sheet }) => {
            cmd_ask(&settings, &file, &query, json, show_code, sheet)
        }
        Some(Commands::Repl { file, sheet }) => cmd_repl(&settings, &file, sheet),
        Some(Commands::Info { file, json, sheet }) => cmd_info(&settings, &file, json, sheet),
        Some(Commands::Doctor { json }) => cmd_doctor(&settings, cli.config.as_deref(), json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("error: {}", e.message);
            }
            if let Some(hint) = e.hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(e.code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn ingest(err: &IngestError) -> Self {
        Self { code: EXIT_INGEST, message: err.to_string(), hint: None }
    }

    /// Failed outcome. The hint points at the usual fix for the failure kind.
    pub fn query(outcome: &Outcome) -> Self {
        let hint = match outcome.error_kind() {
            Some(ErrorKind::BackendUnavailable) => {
                Some("run `gridask doctor` to check the AI configuration".to_string())
            }
            Some(ErrorKind::ExecutionFailed) => {
                Some("rerun with --show-code -v to see the generated code".to_string())
            }
            _ => None,
        };
        Self { code: EXIT_QUERY_FAILED, message: render_failure(outcome), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn load_settings(path: Option<&Path>) -> Settings {
    match path {
        Some(p) => {
            log::debug!("settings from {}", p.display());
            Settings::load_from(p)
        }
        None => Settings::load(),
    }
}

fn load_options(settings: &Settings, sheet: Option<String>) -> LoadOptions {
    LoadOptions {
        max_file_size: settings.data.max_file_size,
        encodings: settings.data.encodings.clone(),
        sheet,
    }
}

fn load_file(settings: &Settings, file: &Path, sheet: Option<String>) -> Result<LoadedDataset, IngestError> {
    load_path(file, &load_options(settings, sheet))
}

// ============================================================================
// ask
// ============================================================================

fn cmd_ask(
    settings: &Settings,
    file: &Path,
    query: &str,
    json: bool,
    show_code: bool,
    sheet: Option<String>,
) -> Result<(), CliError> {
    if query.trim().is_empty() {
        return Err(CliError::args("query is empty").with_hint("gridask ask <file> 'how many rows'"));
    }

    let loaded = match load_file(settings, file, sheet) {
        Ok(l) => l,
        Err(e) => {
            if json {
                println!("{}", render_json(&Outcome::ingestion_failed(&e)));
            }
            return Err(CliError::ingest(&e));
        }
    };

    let mut session = Session::new(loaded.dataset, loaded.source, Resolver::from_settings(settings));
    let outcome = session.ask(query);

    if json {
        println!("{}", render_json(&outcome));
    } else if outcome.is_success() {
        let opts = RenderOptions { max_rows: settings.data.max_rows_display, show_code };
        println!("{}", render_outcome(&outcome, opts));
    }

    if outcome.is_success() {
        Ok(())
    } else {
        Err(CliError::query(&outcome))
    }
}

// ============================================================================
// repl
// ============================================================================

fn cmd_repl(settings: &Settings, file: &Path, sheet: Option<String>) -> Result<(), CliError> {
    let loaded = load_file(settings, file, sheet).map_err(|e| CliError::ingest(&e))?;
    let mut session = Session::new(loaded.dataset, loaded.source, Resolver::from_settings(settings));
    let mut opts = RenderOptions { max_rows: settings.data.max_rows_display, show_code: false };

    println!(
        "{}: {} rows x {} columns. Ask a question, or :quit.",
        session.source().file_name,
        session.dataset().n_rows(),
        session.dataset().n_cols()
    );
    if !session.resolver().ai_available() {
        println!("(complex questions unavailable: run `gridask doctor`)");
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush().map_err(|e| CliError::io(e.to_string()))?;

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => return Err(CliError::io(e.to_string())),
            None => {
                println!();
                break;
            }
        };
        let input = line.trim();
        match input {
            "" => continue,
            ":quit" | ":q" | ":exit" => break,
            ":history" => println!("{}", session.log().render()),
            ":clear" => {
                session.log_mut().clear();
                println!("history cleared");
            }
            ":info" => println!("{}", describe(&session)),
            ":code" => {
                opts.show_code = !opts.show_code;
                println!("show code: {}", if opts.show_code { "on" } else { "off" });
            }
            cmd if cmd.starts_with(':') => {
                println!("unknown command {} (try :history, :clear, :info, :code, :quit)", cmd);
            }
            question => {
                let outcome = session.ask(question);
                println!("{}\n", render_outcome(&outcome, opts));
            }
        }
    }

    log::debug!("session {} closed after {} queries", session.id(), session.log().len());
    Ok(())
}

fn describe(session: &Session) -> String {
    let ds = session.dataset();
    let mut out = String::new();
    out.push_str(&format!(
        "{} ({} bytes, {})\n\n",
        session.source().file_name,
        session.source().bytes,
        session.source().encoding
    ));
    out.push_str(&gridask_engine::render::render_table(&ds.column_info(), usize::MAX));
    out.push_str("\n\n");
    out.push_str(&ds.quality_report().to_string());
    let suggestions = ds.suggest_analyses();
    if !suggestions.is_empty() {
        out.push_str("\n\nTry asking:\n");
        let lines: Vec<String> = suggestions.iter().map(|s| format!("  - {}", s)).collect();
        out.push_str(&lines.join("\n"));
    }
    out
}

// ============================================================================
// info
// ============================================================================

fn cmd_info(settings: &Settings, file: &Path, json: bool, sheet: Option<String>) -> Result<(), CliError> {
    let loaded = load_file(settings, file, sheet).map_err(|e| CliError::ingest(&e))?;

    if json {
        let ds = &loaded.dataset;
        let report = serde_json::json!({
            "source": loaded.source,
            "rows": ds.n_rows(),
            "columns": ds.column_info(),
            "quality": ds.quality_report(),
            "suggestions": ds.suggest_analyses(),
        });
        let text = serde_json::to_string_pretty(&report).map_err(|e| CliError::io(e.to_string()))?;
        println!("{}", text);
        return Ok(());
    }

    let session = Session::new(loaded.dataset, loaded.source, Resolver::pattern_only(Default::default()));
    println!("{}", describe(&session));
    Ok(())
}

// ============================================================================
// doctor
// ============================================================================

fn cmd_doctor(settings: &Settings, config_path: Option<&Path>, json: bool) -> Result<(), CliError> {
    let mut diag = AIDiagnostics::from_settings(&settings.ai);
    if let Some(p) = config_path {
        diag.config_path = p.display().to_string();
    }

    if json {
        let report = serde_json::json!({
            "schema_version": 1,
            "status": diag.status.as_str(),
            "blocking_reason": diag.blocking_reason,
            "provider": diag.provider,
            "model": diag.model,
            "endpoint": diag.endpoint,
            "key": if diag.key_present { "present" } else { "missing" },
            "key_source": diag.key_source.as_str(),
            "keychain": if diag.keychain_available { "ok" } else { "unavailable" },
            "privacy_mode": diag.privacy_mode,
            "context_policy": diag.context_policy,
            "config_path": diag.config_path,
        });
        let text = serde_json::to_string_pretty(&report).map_err(|e| CliError::io(e.to_string()))?;
        println!("{}", text);
    } else {
        print!("{}", diag);
    }

    match diag.status {
        AIConfigStatus::Ready => Ok(()),
        AIConfigStatus::Disabled => Err(CliError {
            code: EXIT_AI_DISABLED,
            message: String::new(),
            hint: Some(format!("set \"provider\" under \"ai\" in {}", diag.config_path)),
        }),
        AIConfigStatus::MissingKey => Err(CliError {
            code: EXIT_AI_MISSING_KEY,
            message: diag.blocking_reason.clone().unwrap_or_else(|| "missing API key".to_string()),
            hint: None,
        }),
    }
}
