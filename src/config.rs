use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use toml::Value;

use crate::output::DEFAULT_CSV_BYTE_LIMIT;
use crate::report::{BatchSettings, ReportSettings};

/// Configuration storage - section_name -> key -> value
pub type Configuration = HashMap<String, HashMap<String, String>>;

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "COMPLIANCE_REPORT_CONFIG";

/// Report tunables resolved from the `[report]` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    pub settings: ReportSettings,
    pub csv_byte_limit: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            settings: ReportSettings::default(),
            csv_byte_limit: DEFAULT_CSV_BYTE_LIMIT,
        }
    }
}

/// Configuration manager
pub struct ConfigManager {
    config: Configuration,
    config_file_path: Option<PathBuf>,
    selected_section: Option<String>,
}

impl ConfigManager {
    pub fn from_config(config: Configuration) -> Self {
        Self {
            config,
            config_file_path: None,
            selected_section: None,
        }
    }

    /// Load the first configuration file found in the discovery order
    pub fn load() -> Result<Self> {
        for path in discover_config_files() {
            debug!("Attempting to load config from: {}", path.display());
            if path.exists() {
                return Self::load_from_file(path);
            }
        }

        info!("No configuration file found, using defaults");
        Ok(Self::from_config(Configuration::new()))
    }

    pub fn load_from_file(path: PathBuf) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = parse_toml_config(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!("Loaded configuration from: {}", path.display());
        Ok(Self {
            config,
            config_file_path: Some(path),
            selected_section: None,
        })
    }

    pub fn config_file_path(&self) -> Option<&Path> {
        self.config_file_path.as_deref()
    }

    /// Select configuration section for --config-name
    pub fn select_section(&mut self, section: String) {
        debug!("Selecting configuration section: {}", section);
        self.selected_section = Some(section);
    }

    /// Look up a key: selected section, then the named section, then `[base]`
    pub fn get_value(&self, section: &str, key: &str) -> Option<&String> {
        let lookup = |name: &str| self.config.get(name).and_then(|s| s.get(key));

        self.selected_section
            .as_deref()
            .and_then(lookup)
            .or_else(|| lookup(section))
            .or_else(|| lookup("base"))
    }

    pub fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>> {
        match self.get_value(section, key) {
            Some(value) => match value.to_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(anyhow::anyhow!("Invalid boolean value for {}.{}: {}", section, key, value)),
            },
            None => Ok(None),
        }
    }

    pub fn get_usize(&self, section: &str, key: &str) -> Result<Option<usize>> {
        self.get_value(section, key)
            .map(|value| {
                value
                    .parse::<usize>()
                    .with_context(|| format!("Invalid {}.{} value in config: {}", section, key, value))
            })
            .transpose()
    }

    pub fn get_log_level(&self, section: &str, key: &str) -> Result<Option<log::LevelFilter>> {
        self.get_value(section, key)
            .map(|value| crate::logging::parse_log_level(value))
            .transpose()
    }

    pub fn get_path(&self, section: &str, key: &str) -> Option<PathBuf> {
        self.get_value(section, key).map(PathBuf::from)
    }

    /// Resolve the `[report]` section on top of built-in defaults
    pub fn get_report_config(&self) -> Result<ReportConfig> {
        let mut config = ReportConfig::default();

        if let Some(cap) = self.get_usize("report", "commit-cap")? {
            config.settings.batch.commit_cap = cap;
        }
        if let Some(batch_size) = self.get_usize("report", "batch-size")? {
            config.settings.batch.batch_size = batch_size;
        }
        if let Some(include) = self.get_bool("report", "include-subgroups")? {
            config.settings.include_subgroups = include;
        }
        if let Some(limit) = self.get_value("report", "csv-byte-limit") {
            config.csv_byte_limit = crate::cli::size_parser::parse_byte_size(limit)
                .with_context(|| format!("Invalid csv-byte-limit value in config: {}", limit))?;
        }

        config
            .settings
            .batch
            .validate()
            .context("Report configuration validation failed")?;
        Ok(config)
    }
}

impl ReportConfig {
    pub fn batch(&self) -> BatchSettings {
        self.settings.batch
    }
}

/// Candidate configuration files in order of precedence
fn discover_config_files() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        paths.push(PathBuf::from(env_path));
    }
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("compliance-report").join("config.toml"));
    }
    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(".compliance-report.toml"));
    }
    paths.push(PathBuf::from("./.compliance-report.toml"));

    debug!("Config discovery paths: {:?}", paths);
    paths
}

/// Parse TOML content into flattened sections
fn parse_toml_config(content: &str) -> Result<Configuration> {
    let table: toml::Table = content.parse().context("Failed to parse TOML content")?;

    let mut config = Configuration::new();
    flatten_toml_table(&table, "", &mut config);
    Ok(config)
}

/// Nested tables become dotted section names; top-level scalars land in `[base]`
fn flatten_toml_table(table: &toml::Table, prefix: &str, config: &mut Configuration) {
    for (key, value) in table {
        match value {
            Value::Table(subtable) => {
                let section = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_toml_table(subtable, &section, config);
            }
            scalar => {
                let section = if prefix.is_empty() { "base" } else { prefix };
                config
                    .entry(section.to_string())
                    .or_default()
                    .insert(key.clone(), toml_value_to_string(scalar));
            }
        }
    }
}

fn toml_value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        other => other.to_string(),
    }
}
