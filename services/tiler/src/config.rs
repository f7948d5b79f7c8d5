//! Configuration loader for the tiler service.
//!
//! Loads and validates a YAML job configuration. Supports environment
//! variable substitution using `${VAR}` and `${VAR:-default}` syntax.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use storage::{
    DirectoryTileStore, FileExecutionContext, MemoryTileStore, RedisExecutionContext, TileStore,
};
use tiler_common::{ExecutionContext, MemoryExecutionContext};
use tiling::SliceConfig;

// ============================================================================
// Tiler Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TilerConfig {
    pub slicer: SliceConfig,
    #[serde(default)]
    pub granule: GranuleConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GranuleFormat {
    /// JSON description of dimensions and variables
    Manifest,
    /// NetCDF-4 / HDF5 via libnetcdf
    Netcdf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GranuleConfig {
    pub format: GranuleFormat,
}

impl Default for GranuleConfig {
    fn default() -> Self {
        Self {
            format: GranuleFormat::Netcdf,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackend {
    Memory,
    File,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    pub backend: CheckpointBackend,
    /// Checkpoint document (file backend)
    pub path: Option<PathBuf>,
    /// Connection URL (redis backend)
    pub url: Option<String>,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_key_prefix() -> String {
    "tiler".to_string()
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            backend: CheckpointBackend::Memory,
            path: None,
            url: None,
            key_prefix: default_key_prefix(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Directory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Output directory (directory backend)
    pub path: Option<PathBuf>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    64
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: None,
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Load, expand and validate a tiler configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<TilerConfig> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read tiler config from {:?}", path.as_ref()))?;

    parse_config(&content)
        .with_context(|| format!("Invalid tiler config {:?}", path.as_ref()))
}

/// Parse and validate configuration YAML.
pub fn parse_config(content: &str) -> Result<TilerConfig> {
    let expanded = expand_env_vars(content)?;

    let config: TilerConfig =
        serde_yaml::from_str(&expanded).with_context(|| "Failed to parse tiler config YAML")?;

    validate_config(&config)?;

    Ok(config)
}

impl CheckpointConfig {
    /// Build the configured checkpoint context.
    pub fn build(&self) -> Result<Box<dyn ExecutionContext>> {
        let context: Box<dyn ExecutionContext> = match self.backend {
            CheckpointBackend::Memory => Box::new(MemoryExecutionContext::new()),
            CheckpointBackend::File => {
                let path = self.path.as_ref().context("checkpoint.path is required")?;
                Box::new(
                    FileExecutionContext::open(path)
                        .with_context(|| format!("Failed to open checkpoint file {:?}", path))?,
                )
            }
            CheckpointBackend::Redis => {
                let url = self.url.as_deref().context("checkpoint.url is required")?;
                Box::new(
                    RedisExecutionContext::connect(url, self.key_prefix.clone())
                        .context("Failed to connect to Redis checkpoint store")?,
                )
            }
        };
        Ok(context)
    }
}

impl StoreConfig {
    /// Build the configured tile store.
    pub fn build(&self) -> Result<Box<dyn TileStore>> {
        let store: Box<dyn TileStore> = match self.backend {
            StoreBackend::Memory => Box::new(MemoryTileStore::new()),
            StoreBackend::Directory => {
                let path = self.path.as_ref().context("store.path is required")?;
                Box::new(
                    DirectoryTileStore::open(path)
                        .with_context(|| format!("Failed to open tile store {:?}", path))?,
                )
            }
        };
        Ok(store)
    }
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in YAML content.
/// Supports ${VAR} and ${VAR:-default} syntax. Comment lines are copied as is.
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    for line in content.split_inclusive('\n') {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
        } else {
            expand_line(line, &mut result)?;
        }
    }
    Ok(result)
}

fn expand_line(line: &str, result: &mut String) -> Result<()> {
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut var_expr = String::new();
            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(c) => var_expr.push(c),
                    None => anyhow::bail!("Unclosed variable substitution: ${{{}", var_expr),
                }
            }

            result.push_str(&resolve_var_expr(&var_expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(())
}

/// Resolve `VAR` or `VAR:-default`. An empty variable takes the default.
fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((var_name, default)) = expr.split_once(":-") {
        match std::env::var(var_name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).with_context(|| format!("Environment variable {} not set", expr))
    }
}

// ============================================================================
// Validation
// ============================================================================

fn validate_config(config: &TilerConfig) -> Result<()> {
    config
        .slicer
        .strategy()
        .context("Invalid slicer configuration")?;

    #[cfg(not(feature = "netcdf"))]
    anyhow::ensure!(
        config.granule.format != GranuleFormat::Netcdf,
        "granule.format is netcdf but the tiler was built without the `netcdf` feature"
    );

    match config.checkpoint.backend {
        CheckpointBackend::File => anyhow::ensure!(
            config.checkpoint.path.is_some(),
            "checkpoint.path is required for the file backend"
        ),
        CheckpointBackend::Redis => anyhow::ensure!(
            config.checkpoint.url.as_deref().is_some_and(|u| !u.is_empty()),
            "checkpoint.url is required for the redis backend"
        ),
        CheckpointBackend::Memory => {}
    }

    anyhow::ensure!(
        config.store.backend != StoreBackend::Directory || config.store.path.is_some(),
        "store.path is required for the directory backend"
    );
    anyhow::ensure!(
        config.store.batch_size > 0,
        "store.batch_size must be greater than 0"
    );

    parse_log_level(&config.logging.level)?;

    let valid_formats = ["json", "pretty"];
    anyhow::ensure!(
        valid_formats.contains(&config.logging.format.as_str()),
        "Invalid log format: {}. Must be one of: {:?}",
        config.logging.format,
        valid_formats
    );

    Ok(())
}

/// Map a configured log level name onto a tracing level.
pub fn parse_log_level(name: &str) -> Result<tracing::Level> {
    const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
    let level = match name.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => anyhow::bail!(
            "Invalid log level: {}. Must be one of: {:?}",
            name,
            VALID_LEVELS
        ),
    };
    Ok(level)
}
