use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

const DEFAULT_FILTER: &str = "info";

/// Console plus an append-only log file. Keep the returned guard alive until
/// exit or buffered file lines are lost.
pub fn init(log_file: &Path) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let dir = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = log_file
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "environment_data_extraction.log".into());

    let mut guard = None;
    let file_layer = match std::fs::create_dir_all(dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, worker_guard) = tracing_appender::non_blocking(appender);
            guard = Some(worker_guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(env_filter.clone()),
            )
        }
        Err(err) => {
            eprintln!("Warning: failed to create log directory {}: {}", dir.display(), err);
            None
        }
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .init();

    guard
}
