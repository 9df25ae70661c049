//! Logging Module
//!
//! Structured logging setup built on the `tracing` crate, shared by the
//! CLI and the prediction server.

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to include target (module path)
    pub include_target: bool,
    /// Whether to include thread IDs
    pub include_thread_ids: bool,
    /// Whether to use ANSI colors
    pub ansi_colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            include_target: false,
            include_thread_ids: false,
            ansi_colors: true,
        }
    }
}

impl LogConfig {
    /// Create a verbose logging config for debugging
    pub fn verbose() -> Self {
        Self {
            level: Level::DEBUG,
            include_target: true,
            include_thread_ids: true,
            ansi_colors: true,
        }
    }

    /// Create a quiet logging config (errors only)
    pub fn quiet() -> Self {
        Self {
            level: Level::ERROR,
            include_target: false,
            include_thread_ids: false,
            ansi_colors: false,
        }
    }
}

/// Initialize logging with the given configuration
///
/// Returns an error message if a global subscriber was already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), String> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.level)
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .with_thread_ids(config.include_thread_ids)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to initialize logging: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(!config.include_target);
    }

    #[test]
    fn test_verbose_config() {
        let config = LogConfig::verbose();
        assert_eq!(config.level, Level::DEBUG);
        assert!(config.include_thread_ids);
    }
}
