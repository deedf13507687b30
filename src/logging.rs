// Logging module for compliance-report
//
// Implements the `log` facade with:
// - Text or JSON line output
// - Console (stderr), file, or both as destinations
// - Independent console and file levels
//
// Stdout is reserved for CSV output, so console logging always goes to stderr.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Local;
use log::{Level, LevelFilter, Metadata, Record};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}. Valid options: text, json", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogDestination {
    Console,
    File(PathBuf),
    Both(PathBuf),
}

impl LogDestination {
    fn file_path(&self) -> Option<&PathBuf> {
        match self {
            LogDestination::Console => None,
            LogDestination::File(path) | LogDestination::Both(path) => Some(path),
        }
    }

    fn writes_console(&self) -> bool {
        !matches!(self, LogDestination::File(_))
    }
}

#[derive(Debug, Serialize)]
struct JsonLogEntry<'a> {
    timestamp: String,
    level: &'a str,
    target: &'a str,
    message: String,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub console_level: LevelFilter,
    pub file_level: Option<LevelFilter>,
    pub format: LogFormat,
    pub destination: LogDestination,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_level: LevelFilter::Info,
            file_level: None,
            format: LogFormat::Text,
            destination: LogDestination::Console,
        }
    }
}

impl LogConfig {
    fn max_level(&self) -> LevelFilter {
        match self.file_level {
            Some(file_level) => file_level.max(self.console_level),
            None => self.console_level,
        }
    }
}

pub struct ReportLogger {
    config: LogConfig,
    file: Option<Mutex<File>>,
}

impl ReportLogger {
    /// Open the log file up front so a bad path fails at startup
    pub fn new(config: LogConfig) -> Result<Self> {
        let file = match config.destination.file_path() {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("Failed to open log file: {}", path.display()))?;
                Some(Mutex::new(file))
            }
            None => None,
        };
        Ok(Self { config, file })
    }

    fn format_timestamp() -> String {
        Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
    }

    fn format_record(&self, level: Level, target: &str, message: String) -> String {
        let level_name = level.as_str();
        match self.config.format {
            LogFormat::Text => format!("{} [{}] {}", Self::format_timestamp(), level_name, message),
            LogFormat::Json => {
                let entry = JsonLogEntry {
                    timestamp: Self::format_timestamp(),
                    level: level_name,
                    target,
                    message,
                };
                serde_json::to_string(&entry)
                    .unwrap_or_else(|e| format!("{{\"level\":\"ERROR\",\"message\":\"log encoding failed: {}\"}}", e))
            }
        }
    }

    fn console_enabled(&self, level: Level) -> bool {
        self.config.destination.writes_console() && level <= self.config.console_level
    }

    fn file_enabled(&self, level: Level) -> bool {
        self.file.is_some() && self.config.file_level.is_some_and(|file_level| level <= file_level)
    }
}

impl log::Log for ReportLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console_enabled(metadata.level()) || self.file_enabled(metadata.level())
    }

    fn log(&self, record: &Record) {
        let level = record.level();
        let to_console = self.console_enabled(level);
        let to_file = self.file_enabled(level);
        if !to_console && !to_file {
            return;
        }

        let line = self.format_record(level, record.target(), record.args().to_string());

        if to_console {
            let _ = writeln!(io::stderr(), "{}", line);
        }
        if to_file {
            if let Some(file) = &self.file {
                if let Ok(mut file) = file.lock() {
                    if let Err(e) = writeln!(file, "{}", line) {
                        eprintln!("File logging error: {}", e);
                    }
                }
            }
        }
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
    }
}

/// Install the global logger
pub fn init_logger(config: LogConfig) -> Result<()> {
    let max_level = config.max_level();
    let logger = ReportLogger::new(config)?;

    log::set_boxed_logger(Box::new(logger)).context("Failed to set global logger")?;
    log::set_max_level(max_level);
    Ok(())
}

pub fn parse_log_level(level_str: &str) -> Result<LevelFilter> {
    level_str.parse::<LevelFilter>().map_err(|_| {
        anyhow::anyhow!(
            "Invalid log level: {}. Valid levels: error, warn, info, debug, trace, off",
            level_str
        )
    })
}
