//! Logger initialization.
//!
//! This module provides the logger setup with custom formatting and an
//! optional file sink.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::config::LogFormat;
use crate::error_handling::InitializationError;
use colored::*;
use log::LevelFilter;

/// Timestamp layout of plain-text log lines.
const PLAIN_TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M:%S%.3f";

/// Renders one JSON log line (without the trailing newline).
fn json_line(ts_ms: i64, level: log::Level, target: &str, msg: &str) -> String {
    format!(
        "{{\"ts\":{},\"level\":\"{}\",\"target\":{},\"msg\":{}}}",
        ts_ms,
        level,
        serde_json::to_string(target).unwrap_or_else(|_| "\"\"".into()),
        serde_json::to_string(msg).unwrap_or_else(|_| "\"\"".into())
    )
}

/// Initializes the logger with the specified level, format and sink.
///
/// Configures `env_logger` with custom formatting. Supports both plain text
/// (timestamped, colored when writing to a terminal) and JSON formats.
///
/// The logger reads from the `RUST_LOG` environment variable by default, but
/// the provided `level` parameter will override it for this crate.
///
/// # Arguments
///
/// * `level` - Minimum log level to display (overrides `RUST_LOG` if set)
/// * `format` - Log format (Plain or Json)
/// * `log_file` - Append records to this file instead of stderr
///
/// # Errors
///
/// Returns `InitializationError::LoggerSetupError` if the log file cannot be
/// opened and `InitializationError::LoggerError` if a logger is already set.
///
/// # Examples
///
/// ```bash
/// # Use RUST_LOG for quick debugging
/// RUST_LOG=debug camea_gateway --config gateway.yaml
///
/// # Per-module filtering via RUST_LOG
/// RUST_LOG=camea_gateway::session=trace,reqwest=info camea_gateway
/// ```
pub fn init_logger_with(
    level: LevelFilter,
    format: LogFormat,
    log_file: Option<&Path>,
) -> Result<(), InitializationError> {
    let mut builder = env_logger::Builder::from_default_env();

    builder.filter_level(level);
    builder.filter_module("reqwest", LevelFilter::Info);
    builder.filter_module("hyper", LevelFilter::Info);
    builder.filter_module("hyper_util", LevelFilter::Info);
    builder.filter_module("camea_gateway", level);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    InitializationError::LoggerSetupError(format!(
                        "cannot open log file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
            // No ANSI escapes in files
            colored::control::set_override(false);
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        None => colored::control::set_override(true),
    }

    match format {
        LogFormat::Json => {
            builder.format(|buf, record| {
                writeln!(
                    buf,
                    "{}",
                    json_line(
                        chrono::Utc::now().timestamp_millis(),
                        record.level(),
                        record.target(),
                        &record.args().to_string(),
                    )
                )
            });
        }
        LogFormat::Plain => {
            builder.format(|buf, record| {
                let level = record.level();
                let colored_level = match level {
                    log::Level::Error => level.to_string().red(),
                    log::Level::Warn => level.to_string().yellow(),
                    log::Level::Info => level.to_string().green(),
                    log::Level::Debug => level.to_string().blue(),
                    log::Level::Trace => level.to_string().purple(),
                };

                writeln!(
                    buf,
                    "{} {} [{}] {}",
                    chrono::Local::now().format(PLAIN_TIMESTAMP_FORMAT),
                    record.target().cyan(),
                    colored_level,
                    record.args()
                )
            });
        }
    }

    // try_init so repeated initialization in tests reports instead of panicking
    builder.try_init().map_err(InitializationError::from)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_logger_is_reported() {
        // whichever call came first, a logger is installed after this
        let _ = env_logger::try_init();

        let result = init_logger_with(LevelFilter::Info, LogFormat::Plain, None);
        assert!(matches!(result, Err(InitializationError::LoggerError(_))));
    }

    #[test]
    fn test_json_line_escapes_message() {
        let line = json_line(
            1_704_103_200_000,
            log::Level::Warn,
            "camea_gateway::session",
            "Malformed query: \"msg:x|a\nb\"",
        );
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["ts"], 1_704_103_200_000i64);
        assert_eq!(parsed["level"], "WARN");
        assert_eq!(parsed["target"], "camea_gateway::session");
        assert_eq!(parsed["msg"], "Malformed query: \"msg:x|a\nb\"");
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_init_logger_unwritable_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no_such_dir").join("gateway.log");

        let result = init_logger_with(LevelFilter::Info, LogFormat::Plain, Some(&missing));
        match result {
            Err(InitializationError::LoggerSetupError(msg)) => {
                assert!(msg.contains("gateway.log"));
            }
            other => panic!("expected LoggerSetupError, got {other:?}"),
        }
    }

    #[test]
    fn test_plain_timestamp_layout() {
        let t = chrono::NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_milli_opt(9, 5, 1, 42)
            .unwrap();
        assert_eq!(
            t.format(PLAIN_TIMESTAMP_FORMAT).to_string(),
            "07.03.2024 09:05:01.042"
        );
    }
}
