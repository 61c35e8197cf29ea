use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_BASENAME: &str = "cli-capture.log";
const LOG_DIR_ENV: &str = "CLI_CAPTURE_LOG_DIR";
const LOG_RETENTION_DAYS: u64 = 7;

/// Directory for file logs, if enabled through the environment
pub fn log_dir() -> Option<PathBuf> {
    std::env::var_os(LOG_DIR_ENV)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
}

/// Install the global subscriber.
///
/// Diagnostics always go to stderr; stdout belongs to the scan JSON and the
/// capture status lines. With `log_dir`, a daily-rolling file is added and
/// the returned guard must be held until exit.
pub fn init_logging(quiet: bool, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let default_level = if quiet { "error" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let Some(log_dir) = log_dir else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
        return Ok(None);
    };

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {:?}", log_dir))?;

    prune_old_logs(
        log_dir,
        Duration::from_secs(60 * 60 * 24 * LOG_RETENTION_DAYS),
    );

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_BASENAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(Some(guard))
}

fn prune_old_logs(log_dir: &Path, max_age: Duration) {
    let Ok(entries) = std::fs::read_dir(log_dir) else {
        return;
    };

    let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let file_name = path.file_name().and_then(|name| name.to_str());
        let Some(file_name) = file_name else {
            continue;
        };

        if !file_name.starts_with(LOG_FILE_BASENAME) {
            continue;
        }

        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };

        if modified < cutoff {
            let _ = std::fs::remove_file(&path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn test_prune_removes_only_stale_logs() {
        let dir = std::env::temp_dir().join(format!("cli-capture-prune-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let stale = dir.join(format!("{}.2020-01-01", LOG_FILE_BASENAME));
        let fresh = dir.join(format!("{}.2099-01-01", LOG_FILE_BASENAME));
        let unrelated = dir.join("crash.log");
        for path in [&stale, &fresh, &unrelated] {
            File::create(path).unwrap();
        }
        let old = SystemTime::now() - Duration::from_secs(60 * 60 * 24 * 30);
        for path in [&stale, &unrelated] {
            File::options()
                .write(true)
                .open(path)
                .unwrap()
                .set_modified(old)
                .unwrap();
        }

        prune_old_logs(&dir, Duration::from_secs(60 * 60 * 24 * LOG_RETENTION_DAYS));

        assert!(!stale.exists());
        assert!(fresh.exists());
        assert!(unrelated.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
