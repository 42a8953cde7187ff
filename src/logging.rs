//! Tracing setup
//!
//! The live view owns the terminal, so it logs to a file through a
//! non-blocking writer. Print-mode commands log to stderr. `RUST_LOG`
//! overrides the configured level.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::Directive, fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

/// `<cache dir>/threatmap/threatmap.log`
pub fn default_log_file() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("threatmap")
        .join("threatmap.log")
}

fn directive(level: &str) -> Directive {
    Directive::from(level.trim().parse::<LevelFilter>().unwrap_or(LevelFilter::INFO))
}

/// Install the global subscriber. Keep the returned guard alive until exit
/// or buffered file output is lost.
pub fn init(level: &str, target: LogTarget) -> io::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::builder()
        .with_default_directive(directive(level))
        .from_env_lossy();

    let (layer, guard): (Box<dyn Layer<Registry> + Send + Sync>, Option<WorkerGuard>) = match target {
        LogTarget::Stderr => {
            let layer = fmt::layer().with_target(false).with_writer(io::stderr).boxed();
            (layer, None)
        }
        LogTarget::File(path) => {
            let file = open_log(&path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer().with_ansi(false).with_writer(writer).boxed();
            (layer, Some(guard))
        }
    };

    let subscriber = Registry::default().with(layer.with_filter(filter));
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("global subscriber already installed");
    }
    Ok(guard)
}

fn open_log(path: &Path) -> io::Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().append(true).create(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_level_falls_back_to_info() {
        assert_eq!(directive("loud").to_string(), "info");
        assert_eq!(directive("debug").to_string(), "debug");
    }

    #[test]
    fn log_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("threatmap.log");
        open_log(&path).unwrap();
        assert!(path.exists());
    }
}
