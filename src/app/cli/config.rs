//! TOML configuration file loading
//!
//! Layout:
//!
//! ```toml
//! log-level = "debug"        # top-level keys mirror the logging flags
//!
//! [queue]
//! min-collectors = 2
//! retry-interval-ms = 5000
//!
//! [backend]
//! batch-size = 10
//! receive-wait-ms = 1000
//! ```
//!
//! Values are applied key by key over the defaults; command-line flags are
//! applied afterwards and win.

use crate::queue::api::{ConfigError, QueueSettings, DEFAULT_BATCH_SIZE, DEFAULT_RECEIVE_WAIT};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::args::Args;

/// In-memory backend tuning read from `[backend]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub batch_size: usize,
    pub receive_wait: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            receive_wait: DEFAULT_RECEIVE_WAIT,
        }
    }
}

/// Everything the binary needs from configuration, flags already applied
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub queue: QueueSettings,
    pub backend: BackendConfig,
    /// File the values came from, if any
    pub source: Option<PathBuf>,
}

/// Default location: `<config_dir>/callqueue/callqueue.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("callqueue").join("callqueue.toml"))
}

/// Resolve, read and apply the configuration file, then the command-line overrides.
///
/// An explicitly named file must exist; the default location is optional.
pub async fn load_settings(args: &mut Args) -> Result<Settings, ConfigError> {
    let mut settings = Settings::default();

    let config_path = match args.config_file.clone() {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    message: format!(
                        "the specified configuration file does not exist: {}",
                        path.display()
                    ),
                });
            }
            Some(path)
        }
        None => default_config_path().filter(|path| path.exists()),
    };

    if let Some(path) = config_path {
        let config = read_config_file(&path).await?;
        apply_toml_values(args, &mut settings, &config).map_err(|e| match e {
            ConfigError::Invalid { key, message } => ConfigError::Invalid {
                key,
                message: format!("{} (in {})", message, path.display()),
            },
            other => other,
        })?;
        log::debug!("Loaded configuration from {}", path.display());
        settings.source = Some(path);
    }

    args.apply_to_settings(&mut settings.queue);
    settings.queue.validate()?;
    Ok(settings)
}

pub async fn read_config_file(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    toml::from_str::<toml::Table>(&contents).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Apply a parsed file. Logging keys only fill flags the command line left unset.
pub fn apply_toml_values(
    args: &mut Args,
    settings: &mut Settings,
    config: &toml::Table,
) -> Result<(), ConfigError> {
    if args.log_level.is_none() {
        if let Some(log_level) = config.get("log-level").and_then(|v| v.as_str()) {
            args.log_level = Some(log_level.to_string());
        }
    }
    if args.log_format.is_none() {
        if let Some(log_format) = config.get("log-format").and_then(|v| v.as_str()) {
            args.log_format = Some(log_format.to_string());
        }
    }
    if args.log_file.is_none() {
        if let Some(log_file) = config.get("log-file").and_then(|v| v.as_str()) {
            args.log_file = Some(PathBuf::from(log_file));
        }
    }
    if !args.color && !args.no_color {
        if let Some(color) = config.get("color").and_then(|v| v.as_bool()) {
            args.color = color;
            args.no_color = !color;
        }
    }

    if let Some(queue) = table(config, "queue")? {
        apply_queue_table(&mut settings.queue, queue)?;
    }
    if let Some(backend) = table(config, "backend")? {
        apply_backend_table(&mut settings.backend, backend)?;
    }
    Ok(())
}

pub fn apply_queue_table(settings: &mut QueueSettings, queue: &toml::Table) -> Result<(), ConfigError> {
    if let Some(n) = count(queue, "min-collectors")? {
        settings.min_collectors = n;
    }
    if let Some(n) = count(queue, "max-collectors")? {
        settings.max_collectors = n;
    }
    if let Some(n) = count(queue, "backlog-per-collector")? {
        settings.backlog_per_collector = n;
    }
    if let Some(d) = millis(queue, "retry-interval-ms")? {
        settings.retry_interval = d;
    }
    if let Some(d) = millis(queue, "retry-grace-ms")? {
        settings.retry_grace = d;
    }
    if let Some(n) = count(queue, "retry-max-pending")? {
        settings.retry_max_pending = n;
    }
    if let Some(n) = count(queue, "drain-iterations")? {
        settings.drain_iterations = n;
    }
    if let Some(d) = millis(queue, "drain-delay-ms")? {
        settings.drain_delay = d;
    }
    if let Some(d) = millis(queue, "idle-poll-interval-ms")? {
        settings.idle_poll_interval = d;
    }
    Ok(())
}

pub fn apply_backend_table(backend: &mut BackendConfig, table: &toml::Table) -> Result<(), ConfigError> {
    if let Some(n) = count(table, "batch-size")? {
        if n == 0 {
            return Err(ConfigError::invalid("batch-size", "batch-size must be at least 1"));
        }
        backend.batch_size = n;
    }
    if let Some(d) = millis(table, "receive-wait-ms")? {
        backend.receive_wait = d;
    }
    Ok(())
}

fn table<'a>(config: &'a toml::Table, key: &str) -> Result<Option<&'a toml::Table>, ConfigError> {
    match config.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_table()
            .map(Some)
            .ok_or_else(|| ConfigError::invalid(key, format!("[{}] must be a table", key))),
    }
}

fn count(table: &toml::Table, key: &str) -> Result<Option<usize>, ConfigError> {
    let Some(value) = table.get(key) else {
        return Ok(None);
    };
    value
        .as_integer()
        .and_then(|n| usize::try_from(n).ok())
        .map(Some)
        .ok_or_else(|| {
            ConfigError::invalid(key, format!("{} must be a non-negative integer, got {}", key, value))
        })
}

fn millis(table: &toml::Table, key: &str) -> Result<Option<Duration>, ConfigError> {
    Ok(count(table, key)?.map(|ms| Duration::from_millis(ms as u64)))
}
