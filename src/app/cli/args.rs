//! Command-line arguments for the demo binary
//!
//! Engine tuning flags are optional: an unset flag leaves the value from the
//! configuration file (or the built-in default) in place.

use crate::core::version::long_version;
use crate::queue::api::QueueSettings;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "callqueue")]
#[command(about = "Run remote calls through an at-least-once queue and report the results")]
#[command(version, long_version = long_version())]
pub struct Args {
    /// Number of calls to enqueue
    #[arg(short = 'n', long = "calls", value_name = "N", default_value_t = 10)]
    pub calls: usize,

    /// Function every call invokes
    #[arg(
        short = 'F',
        long = "function",
        value_name = "NAME",
        default_value = "square",
        value_parser = ["echo", "square", "fail", "slow"]
    )]
    pub function: String,

    /// Executor worker tasks
    #[arg(short = 'w', long = "workers", value_name = "N", default_value_t = 2)]
    pub workers: usize,

    /// Invocations the executor silently discards (recovered by retry)
    #[arg(short = 'd', long = "drop-invocations", value_name = "N", default_value_t = 0)]
    pub drop_invocations: usize,

    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Minimum number of collectors
    #[arg(long = "min-collectors", value_name = "N")]
    pub min_collectors: Option<usize>,

    /// Maximum number of collectors
    #[arg(long = "max-collectors", value_name = "N")]
    pub max_collectors: Option<usize>,

    /// Retry ticker period in milliseconds
    #[arg(long = "retry-interval-ms", value_name = "MS")]
    pub retry_interval_ms: Option<u64>,

    /// Age in milliseconds after which an unstarted call is re-published
    #[arg(long = "retry-grace-ms", value_name = "MS")]
    pub retry_grace_ms: Option<u64>,

    /// Force coloured output
    #[arg(long = "color", action = ArgAction::SetTrue, conflicts_with = "no_color")]
    pub color: bool,

    /// Disable coloured output
    #[arg(long = "no-color", action = ArgAction::SetTrue)]
    pub no_color: bool,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,

    /// Log file path (use 'none' to disable file logging)
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            calls: 10,
            function: "square".to_string(),
            workers: 2,
            drop_invocations: 0,
            config_file: None,
            min_collectors: None,
            max_collectors: None,
            retry_interval_ms: None,
            retry_grace_ms: None,
            color: false,
            no_color: false,
            log_level: None,
            log_format: None,
            log_file: None,
        }
    }
}

impl Args {
    /// Colour choice: explicit flags win, then NO_COLOR, then whether stdout is a terminal
    pub fn color_enabled(&self) -> bool {
        if self.color {
            return true;
        }
        if self.no_color || std::env::var_os("NO_COLOR").is_some() {
            return false;
        }
        use std::io::IsTerminal;
        std::io::stdout().is_terminal()
    }

    /// Overlay the tuning flags that were given on the command line
    pub fn apply_to_settings(&self, settings: &mut QueueSettings) {
        if let Some(min) = self.min_collectors {
            settings.min_collectors = min;
        }
        if let Some(max) = self.max_collectors {
            settings.max_collectors = max;
        }
        if let Some(ms) = self.retry_interval_ms {
            settings.retry_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.retry_grace_ms {
            settings.retry_grace = Duration::from_millis(ms);
        }
    }

    /// Log file as a string, as flexi_logger setup expects
    pub fn log_file_str(&self) -> Option<String> {
        self.log_file
            .as_ref()
            .map(|path| path.to_string_lossy().into_owned())
    }
}
