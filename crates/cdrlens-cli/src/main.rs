mod commands;
mod output;

use cdrlens_core::report::ExportMode;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const ENV_LOG: &str = "CDRLENS_LOG";

#[derive(Parser)]
#[command(
    name = "cdrlens",
    version,
    about = "Import call detail records and report on reconstructed calls"
)]
struct Cli {
    /// SQLite database file (overrides the config file)
    #[arg(long, global = true, env = "CDRLENS_DB", value_name = "PATH")]
    db: Option<PathBuf>,

    /// TOML config file
    #[arg(long, global = true, env = "CDRLENS_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Date range and location shared by the query commands.
#[derive(Args, Debug, Clone, Default)]
pub struct RangeArgs {
    /// First day to include (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date, value_name = "DATE")]
    from: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date, value_name = "DATE")]
    to: Option<NaiveDate>,

    /// Exact location name, or "all"
    #[arg(long)]
    location: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ModeArg {
    /// One row per call
    Grouped,
    /// One row per leg
    Detailed,
}

impl From<ModeArg> for ExportMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Grouped => ExportMode::Grouped,
            ModeArg::Detailed => ExportMode::Detailed,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Import a local CDR export (CSV)
    Import {
        /// Path to the CSV export
        input_file: PathBuf,
    },
    /// Request, download and import a report from the remote service
    Fetch {
        /// Bearer token for the report API
        #[arg(long, env = "CDRLENS_TOKEN", hide_env_values = true, default_value = "")]
        token: String,

        /// Lookback window in hours (rounded up to whole days)
        #[arg(long, default_value_t = 48)]
        hours: u32,

        /// Save the raw report in this directory (overrides the config file)
        #[arg(long, value_name = "DIR")]
        archive_dir: Option<PathBuf>,
    },
    /// Check that a token is accepted by the report service
    CheckToken {
        /// Bearer token for the report API
        #[arg(long, env = "CDRLENS_TOKEN", hide_env_values = true, default_value = "")]
        token: String,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Parse an export and show the legs and calls it contains (nothing is stored)
    Parse {
        /// Path to the CSV export
        input_file: PathBuf,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// List stored legs, newest first
    Legs {
        #[command(flatten)]
        range: RangeArgs,

        /// Substring of the calling number
        #[arg(long)]
        phone: Option<String>,

        #[arg(long, default_value_t = 100)]
        limit: usize,

        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// List reconstructed calls, newest first
    Calls {
        #[command(flatten)]
        range: RangeArgs,

        /// Department substring (case-insensitive)
        #[arg(long)]
        department: Option<String>,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Per-location call summaries
    Clinics {
        #[command(flatten)]
        range: RangeArgs,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Dashboard metrics: totals, answer rate, average duration
    Metrics {
        #[command(flatten)]
        range: RangeArgs,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// List known locations
    Locations {
        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Write a CSV export and print its path
    Export {
        #[arg(long, value_enum, default_value_t = ModeArg::Grouped)]
        mode: ModeArg,

        #[command(flatten)]
        range: RangeArgs,

        /// Department substring (case-insensitive)
        #[arg(long)]
        department: Option<String>,

        /// Directory to write the file into
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Totals of stored legs, calls and locations
    Stats {
        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Recent import runs
    Logs {
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD, got '{s}': {e}"))
}

fn init_logging() {
    let filter = std::env::var(ENV_LOG)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info,cdrlens_core=info".to_string());

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .compact()
        .with_env_filter(filter)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = commands::Context::load(cli.config.as_deref(), cli.db).and_then(|ctx| {
        match cli.command {
            Commands::Import { input_file } => commands::import::run_file(&ctx, input_file),
            Commands::Fetch {
                token,
                hours,
                archive_dir,
            } => commands::import::run_fetch(&ctx, token, hours, archive_dir),
            Commands::CheckToken { token, output } => {
                commands::import::run_check_token(&ctx, &token, &output)
            }
            Commands::Parse { input_file, output } => {
                commands::parse::run(&ctx, &input_file, &output)
            }
            Commands::Legs {
                range,
                phone,
                limit,
                offset,
                output,
            } => commands::query::legs(&ctx, &range, phone, limit, offset, &output),
            Commands::Calls {
                range,
                department,
                output,
            } => commands::query::calls(&ctx, &range, department, &output),
            Commands::Clinics { range, output } => commands::query::clinics(&ctx, &range, &output),
            Commands::Metrics { range, output } => commands::query::metrics(&ctx, &range, &output),
            Commands::Locations { output } => commands::query::locations(&ctx, &output),
            Commands::Export {
                mode,
                range,
                department,
                dir,
            } => commands::export::run(&ctx, mode.into(), &range, department, &dir),
            Commands::Stats { output } => commands::query::stats(&ctx, &output),
            Commands::Logs { limit, output } => commands::query::logs(&ctx, limit, &output),
        }
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
