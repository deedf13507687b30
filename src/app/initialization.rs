//! Application initialization and configuration

use std::str::FromStr;

use anyhow::{Context, Result};
use log::{debug, LevelFilter};

use crate::{cli, config, logging};

pub fn load_configuration(args: &cli::Args) -> Result<config::ConfigManager> {
    let mut manager = if let Some(config_file) = &args.config_file {
        debug!("Loading configuration from explicit file: {}", config_file.display());
        config::ConfigManager::load_from_file(config_file.clone())?
    } else {
        config::ConfigManager::load()?
    };

    if let Some(section_name) = &args.config_name {
        debug!("Selecting configuration section: {}", section_name);
        manager.select_section(section_name.clone());
    }

    Ok(manager)
}

pub fn configure_logging(args: &cli::Args, config: &config::ConfigManager) -> Result<logging::LogConfig> {
    let console_level = if args.debug {
        LevelFilter::Trace
    } else if args.verbose {
        LevelFilter::Debug
    } else if args.quiet {
        LevelFilter::Error
    } else {
        match config.get_log_level("base", "console-level") {
            Ok(Some(level)) => level,
            Ok(None) => LevelFilter::Info,
            Err(e) => {
                debug!("Invalid console-level in config, using default: {}", e);
                LevelFilter::Info
            }
        }
    };

    let format = if !args.log_format.is_empty() && args.log_format != "text" {
        logging::LogFormat::from_str(&args.log_format).map_err(|e| anyhow::anyhow!(e))?
    } else {
        match config.get_value("base", "log-format") {
            Some(format_str) => logging::LogFormat::from_str(format_str).unwrap_or(logging::LogFormat::Text),
            None => logging::LogFormat::Text,
        }
    };

    let log_file_path = args.log_file.clone().or_else(|| config.get_path("base", "log-file"));

    let file_log_level = match &args.log_file_level {
        Some(level_str) => Some(logging::parse_log_level(level_str)?),
        None => match config.get_log_level("base", "file-log-level") {
            Ok(level) => level,
            Err(e) => {
                debug!("Invalid file-log-level in config, ignoring: {}", e);
                None
            }
        },
    };

    let (destination, file_level) = match (log_file_path, file_log_level) {
        (Some(file_path), level) => (logging::LogDestination::Both(file_path), Some(level.unwrap_or(console_level))),
        (None, None) => (logging::LogDestination::Console, None),
        (None, Some(_)) => return Err(anyhow::anyhow!("Log file level specified without log file")),
    };

    Ok(logging::LogConfig {
        console_level,
        file_level,
        format,
        destination,
    })
}

/// Report tunables: config file values overridden by command line flags
pub fn resolve_report_config(args: &cli::Args, config: &config::ConfigManager) -> Result<config::ReportConfig> {
    let mut report = config.get_report_config()?;

    if let Some(cap) = args.commit_cap {
        report.settings.batch.commit_cap = cap;
    }
    if let Some(batch_size) = args.batch_size {
        report.settings.batch.batch_size = batch_size;
    }
    if args.no_subgroups {
        report.settings.include_subgroups = false;
    }
    if let Some(limit) = &args.csv_byte_limit {
        report.csv_byte_limit = cli::size_parser::parse_byte_size(limit)
            .with_context(|| format!("Invalid --csv-byte-limit: {}", limit))?;
    }

    debug!("Resolved report configuration: {:?}", report);
    Ok(report)
}
