use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use log::debug;
use std::path::PathBuf;

use super::date_parser;
use super::size_parser;

/// Compliance report generator
#[derive(Parser, Debug)]
#[command(name = "compliance-report")]
#[command(about = "Streams a group's commits, joined with the merge requests that introduced them, into a compliance CSV")]
#[command(version)]
pub struct Args {
    /// Manifest describing groups, projects and merge requests (.json or .toml)
    #[arg(short = 'm', long = "manifest", value_name = "FILE")]
    pub manifest: PathBuf,

    /// Full path of the group to report on
    #[arg(short = 'g', long = "group", value_name = "PATH")]
    pub group: String,

    /// Name of the user requesting the report (defaults to $USER)
    #[arg(short = 'u', long = "user", value_name = "NAME")]
    pub user: Option<String>,

    /// Start of the report window, inclusive (ISO 8601 or relative like "2 weeks ago")
    #[arg(short = 'S', long = "from", alias = "since", value_name = "DATE")]
    pub from: Option<String>,

    /// End of the report window, exclusive (ISO 8601 or relative)
    #[arg(short = 'U', long = "to", alias = "until", value_name = "DATE")]
    pub to: Option<String>,

    /// Only report on this commit
    #[arg(long = "commit-sha", value_name = "SHA")]
    pub commit_sha: Option<String>,

    /// Write the CSV to this file instead of stdout
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Print a per-project summary table to stderr after the run
    #[arg(long)]
    pub summary: bool,

    /// Maximum commits processed per project
    #[arg(long = "commit-cap", value_name = "N")]
    pub commit_cap: Option<usize>,

    /// Commits fetched per repository call
    #[arg(long = "batch-size", value_name = "N")]
    pub batch_size: Option<usize>,

    /// Only include projects directly in the group
    #[arg(long = "no-subgroups")]
    pub no_subgroups: bool,

    /// Stop writing rows once the CSV reaches this size (supports units: K, MB, G)
    #[arg(long = "csv-byte-limit", value_name = "SIZE")]
    pub csv_byte_limit: Option<String>,

    /// Verbose output (debug level logging)
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (error level logging only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Debug output (trace level logging)
    #[arg(long)]
    pub debug: bool,

    /// Log format: text or json
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log file path for file output
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log level for file output (independent of console level)
    #[arg(long, value_name = "LEVEL")]
    pub log_file_level: Option<String>,

    /// Configuration file path
    #[arg(long, value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Configuration section name
    #[arg(long, value_name = "SECTION")]
    pub config_name: Option<String>,
}

/// Parse command line arguments
pub fn parse_args() -> Args {
    let args = Args::parse();
    debug!("Parsed CLI arguments: {:?}", args);
    args
}

/// Validate CLI argument combinations
pub fn validate_args(args: &Args) -> Result<()> {
    let log_flags_count = [args.verbose, args.quiet, args.debug]
        .iter()
        .filter(|&&flag| flag)
        .count();

    if log_flags_count > 1 {
        return Err(anyhow::anyhow!(
            "Conflicting log level flags: only one of --verbose, --quiet, or --debug may be specified"
        ));
    }

    match args.log_format.to_lowercase().as_str() {
        "text" | "json" => {}
        _ => {
            return Err(anyhow::anyhow!(
                "Invalid log format '{}'. Valid options: text, json",
                args.log_format
            ))
        }
    }

    if args.log_file_level.is_some() && args.log_file.is_none() {
        return Err(anyhow::anyhow!("--log-file-level requires --log-file to be specified"));
    }

    if args.group.trim().is_empty() {
        return Err(anyhow::anyhow!("--group must not be empty"));
    }

    if args.commit_cap == Some(0) {
        return Err(anyhow::anyhow!("--commit-cap must be greater than 0"));
    }
    if args.batch_size == Some(0) {
        return Err(anyhow::anyhow!("--batch-size must be greater than 0"));
    }

    if let Some(limit) = &args.csv_byte_limit {
        size_parser::parse_byte_size(limit)?;
    }

    date_parser::validate_date_range(args.from.as_deref(), args.to.as_deref(), Utc::now())?;

    Ok(())
}
