//! Logging setup

use crate::config::LoggingConfig;
use tracing_appender::non_blocking::NonBlocking;
use tracing_subscriber::EnvFilter;

/// Initialize logging from config.
///
/// Honors `RUST_LOG` when set; falls back to the configured level. If
/// `LADDERARB_LOG_DIR` points at a writable directory, a daily rolling file
/// sink is added next to the console layer.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},ladderarb=debug", config.level)));

    let file_writer = file_writer();

    if config.json {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .with(file_writer.map(|w| {
                tracing_subscriber::fmt::layer()
                    .with_writer(w)
                    .with_ansi(false)
                    .with_target(true)
            }))
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(file_writer.map(|w| {
                tracing_subscriber::fmt::layer()
                    .with_writer(w)
                    .with_ansi(false)
                    .with_target(true)
            }))
            .try_init();
    }
}

/// Build the rolling-file writer when `LADDERARB_LOG_DIR` is usable.
fn file_writer() -> Option<NonBlocking> {
    let log_dir = std::env::var("LADDERARB_LOG_DIR").ok()?;

    // `tracing_appender::rolling::daily` panics if it can't create the
    // initial log file, so preflight writability first.
    if std::fs::create_dir_all(&log_dir).is_err() {
        eprintln!(
            "Warning: Could not create log directory {}, file logging disabled",
            log_dir
        );
        return None;
    }
    let test_path = std::path::Path::new(&log_dir).join(".ladderarb_write_test");
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&test_path)
    {
        Ok(_) => {
            let _ = std::fs::remove_file(&test_path);
            let file_appender = tracing_appender::rolling::daily(&log_dir, "ladderarb.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            // Keep the guard alive for the process lifetime
            Box::leak(Box::new(guard));
            Some(non_blocking)
        }
        Err(e) => {
            eprintln!(
                "Warning: Could not write to log directory {} ({}), file logging disabled",
                log_dir, e
            );
            None
        }
    }
}
