//! Shared helpers and error types for Shelfview.

use std::path::PathBuf;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "SHELFVIEW_LOG";

/// File name used when logging to a directory.
pub const LOG_FILE_NAME: &str = "shelfview.log";

/// Result type for shared helpers.
pub type UtilsResult<T> = Result<T, UtilsError>;

/// Shared error variants for cross-crate helpers.
#[derive(Debug, Error)]
pub enum UtilsError {
    /// An IO error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The global subscriber could not be installed.
    #[error("logging error: {0}")]
    Logging(String),
}

/// Where log lines are written.
#[derive(Debug, Clone)]
pub enum LogTarget {
    /// Standard error, for one-shot CLI commands.
    Stderr,
    /// A log file inside this directory, for the full-screen UI.
    File(PathBuf),
}

/// Install the global tracing subscriber.
///
/// The filter comes from `SHELFVIEW_LOG` and falls back to `info`.
pub fn init_logging(target: &LogTarget) -> UtilsResult<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(false)
        .with_line_number(false);

    let installed = match target {
        LogTarget::Stderr => builder.with_writer(std::io::stderr).try_init(),
        LogTarget::File(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
            builder.with_ansi(false).with_writer(appender).try_init()
        }
    };
    installed.map_err(|err| UtilsError::Logging(err.to_string()))?;
    tracing::debug!(?target, "logging initialised");
    Ok(())
}

/// Upper-case the first character of a label, leaving the rest untouched.
pub fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Format an amount as dollars with two decimals.
pub fn format_price(amount: f64) -> String {
    format!("${amount:.2}")
}

/// Shorten text to at most `max` characters, marking the cut with an ellipsis.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{kept}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capitalize_first_letter_only() {
        assert_eq!(capitalize("home-decoration"), "Home-decoration");
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("électronique"), "Électronique");
    }

    #[test]
    fn price_has_two_decimals() {
        assert_eq!(format_price(5.0), "$5.00");
        assert_eq!(format_price(999.999), "$1000.00");
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer title", 6), "a lon…");
    }

    #[test]
    fn file_logging_creates_directory() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let dir = temp.path().join("logs");
        // Another test may already own the global subscriber; only the directory matters here.
        let _ = init_logging(&LogTarget::File(dir.clone()));
        assert!(dir.exists());
    }
}
