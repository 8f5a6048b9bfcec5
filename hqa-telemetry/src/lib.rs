//! # hqa-telemetry
//!
//! Installs the process-wide `tracing` subscriber: an `EnvFilter` (from
//! `RUST_LOG`, falling back to [`TelemetryConfig::default_filter`]), a console
//! layer in text or JSON, and optionally a plain-text log file opened in
//! append mode.
//!
//! ```rust,ignore
//! hqa_telemetry::init_telemetry(&TelemetryConfig {
//!     log_file: Some("pipeline.log".into()),
//!     ..TelemetryConfig::new("hqa")
//! })?;
//! ```

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },

    #[error("Cannot open log file '{}': {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A global subscriber was already installed.
    #[error("Telemetry already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Logging options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub service_name: String,
    /// Emit console records as JSON lines.
    pub json: bool,
    /// Also append plain-text records to this file.
    pub log_file: Option<PathBuf>,
    /// Directive used when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::new("hqa")
    }
}

impl TelemetryConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into(), json: false, log_file: None, default_filter: "info".into() }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .map_err(|e| TelemetryError::InvalidFilter { filter: directives, message: e.to_string() }),
        _ => EnvFilter::try_new(&config.default_filter).map_err(|e| TelemetryError::InvalidFilter {
            filter: config.default_filter.clone(),
            message: e.to_string(),
        }),
    }
}

fn open_log_file(path: &Path) -> Result<File, TelemetryError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| TelemetryError::LogFile { path: path.to_path_buf(), source })
}

fn layers(config: &TelemetryConfig) -> Result<Vec<BoxedLayer>, TelemetryError> {
    let mut layers: Vec<BoxedLayer> = Vec::new();
    if config.json {
        layers.push(fmt::layer().json().with_target(true).with_writer(std::io::stderr).boxed());
    } else {
        layers.push(fmt::layer().with_target(true).with_writer(std::io::stderr).boxed());
    }
    if let Some(path) = &config.log_file {
        let file = open_log_file(path)?;
        layers.push(fmt::layer().with_ansi(false).with_target(true).with_writer(Mutex::new(file)).boxed());
    }
    Ok(layers)
}

/// Install the global subscriber. Fails if one is already set.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = env_filter(config)?;
    tracing_subscriber::registry()
        .with(layers(config)?)
        .with(filter)
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))?;
    tracing::debug!(service = %config.service_name, json = config.json, "telemetry initialized");
    Ok(())
}
