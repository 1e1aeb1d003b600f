//! Configuration file loading tests

use callqueue::app::cli::api::{load_settings, Args};
use callqueue::queue::api::ConfigError;
use clap::Parser;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn args_for(file: &NamedTempFile, extra: &[&str]) -> Args {
    let path = file.path().to_string_lossy().into_owned();
    let mut argv = vec!["callqueue", "--config-file", path.as_str()];
    argv.extend_from_slice(extra);
    Args::try_parse_from(argv).unwrap()
}

#[tokio::test]
async fn test_file_values_apply_over_defaults() {
    let file = config_file(
        r#"
log-format = "json"

[queue]
min-collectors = 1
max-collectors = 3
retry-grace-ms = 1500

[backend]
batch-size = 5
"#,
    );
    let mut args = args_for(&file, &[]);
    let settings = load_settings(&mut args).await.unwrap();

    assert_eq!(settings.queue.min_collectors, 1);
    assert_eq!(settings.queue.max_collectors, 3);
    assert_eq!(settings.queue.retry_grace, Duration::from_millis(1500));
    assert_eq!(settings.queue.retry_interval, Duration::from_secs(5));
    assert_eq!(settings.backend.batch_size, 5);
    assert_eq!(settings.source.as_deref(), Some(file.path()));
    assert_eq!(args.log_format.as_deref(), Some("json"));
}

#[tokio::test]
async fn test_command_line_wins_over_file() {
    let file = config_file("log-level = \"trace\"\n[queue]\nmax-collectors = 3\n");
    let mut args = args_for(&file, &["--max-collectors", "7", "--log-level", "warn"]);
    let settings = load_settings(&mut args).await.unwrap();

    assert_eq!(settings.queue.max_collectors, 7);
    assert_eq!(args.log_level.as_deref(), Some("warn"));
}

#[tokio::test]
async fn test_missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    let mut args = Args {
        config_file: Some(missing),
        ..Default::default()
    };
    let err = load_settings(&mut args).await.unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[tokio::test]
async fn test_malformed_toml_is_a_parse_error() {
    let file = config_file("[queue\nmin-collectors = ");
    let err = load_settings(&mut args_for(&file, &[])).await.unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[tokio::test]
async fn test_invalid_combination_is_rejected() {
    let file = config_file("[queue]\nmin-collectors = 5\nmax-collectors = 2\n");
    let err = load_settings(&mut args_for(&file, &[])).await.unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "max-collectors"));
}

#[tokio::test]
async fn test_bad_value_names_the_file() {
    let file = config_file("[queue]\ndrain-delay-ms = -5\n");
    let err = load_settings(&mut args_for(&file, &[])).await.unwrap_err();
    match err {
        ConfigError::Invalid { key, message } => {
            assert_eq!(key, "drain-delay-ms");
            assert!(message.contains(&file.path().display().to_string()));
        }
        other => panic!("unexpected error: {}", other),
    }
}
