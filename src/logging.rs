/*!
 * Logging and tracing initialization
 */

use std::fs::File;
use std::path::Path;

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::EngineConfig;
use crate::error::{Result, UcxError};

/// Initialize structured logging based on configuration. Call once at
/// process startup; a second call from within the same process will fail
/// at the `tracing` layer, not here (see `init_test_logging` for tests).
pub fn init_logging(config: &EngineConfig) -> Result<()> {
    let log_level = if config.verbose {
        tracing::Level::DEBUG
    } else {
        config.log_level.to_tracing_level()
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("ucxsync={}", log_level)))
        .map_err(|e| UcxError::Config(format!("failed to build log filter: {}", e)))?;

    if let Some(ref log_path) = config.log_file {
        init_file_logging(log_path, env_filter)
    } else {
        init_stdout_logging(env_filter);
        Ok(())
    }
}

fn init_stdout_logging(env_filter: EnvFilter) {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// File sink is always JSON: this is the format the out-of-scope transport
/// layer is expected to tail and forward to the monitoring UI.
fn init_file_logging(log_path: &Path, env_filter: EnvFilter) -> Result<()> {
    let file = File::create(log_path)
        .map_err(|e| UcxError::Config(format!("failed to create log file: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_writer(file)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(false)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}

/// Test-only initializer using the test writer, idempotent via `try_init`.
#[cfg(test)]
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ucxsync=debug"));

        let fmt_layer = fmt::layer().with_test_writer().with_target(false).compact();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .ok();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn base_config() -> EngineConfig {
        EngineConfig {
            base_mount: PathBuf::from("/mnt"),
            nodes: vec!["WU01".to_string()],
            shares: vec!["E$".to_string()],
            sync: Default::default(),
            log_level: LogLevel::Info,
            log_file: None,
            verbose: false,
        }
    }

    #[test]
    fn verbose_overrides_log_level() {
        let mut config = base_config();
        config.log_level = LogLevel::Error;
        config.verbose = true;
        assert!(config.verbose);
    }

    #[test]
    fn log_file_path_is_honored_in_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut config = base_config();
        config.log_file = Some(temp_file.path().to_path_buf());
        assert!(config.log_file.is_some());
    }
}
