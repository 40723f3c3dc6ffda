//! Rolling file logs for the scheduling core.
//!
//! # Responsibility
//! - Start the file logger once per process.
//! - Keep service events metadata-only (ids, counts, statuses).
//!
//! # Invariants
//! - A second init with the same level and directory succeeds without effect.
//! - A second init with a different level or directory fails.
//! - Panics are logged with a flattened, length-capped payload before the
//!   previous hook runs.

use flexi_logger::{
    Cleanup, Criterion, FileSpec, FlexiLoggerError, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const LOG_BASENAME: &str = "medserv";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_FILES: usize = 5;
const PANIC_PAYLOAD_LIMIT: usize = 160;

static LOGGER: OnceCell<RunningLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

struct RunningLogger {
    level: &'static str,
    dir: PathBuf,
    _handle: LoggerHandle,
}

#[derive(Debug)]
pub enum LoggingError {
    UnknownLevel(String),
    BadDirectory(String),
    CreateDirectory {
        dir: PathBuf,
        source: std::io::Error,
    },
    Start(FlexiLoggerError),
    AlreadyRunning {
        level: &'static str,
        dir: PathBuf,
    },
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownLevel(level) => {
                write!(f, "unknown log level `{level}` (trace|debug|info|warn|error)")
            }
            Self::BadDirectory(reason) => write!(f, "log directory rejected: {reason}"),
            Self::CreateDirectory { dir, .. } => {
                write!(f, "cannot create log directory `{}`", dir.display())
            }
            Self::Start(_) => write!(f, "file logger failed to start"),
            Self::AlreadyRunning { level, dir } => write!(
                f,
                "logging already runs at level `{level}` in `{}`",
                dir.display()
            ),
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDirectory { source, .. } => Some(source),
            Self::Start(err) => Some(err),
            _ => None,
        }
    }
}

/// Starts file logging under `log_dir`.
///
/// Relative directories are resolved against the working directory.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), LoggingError> {
    let level = parse_level(level)?;
    let dir = resolve_dir(log_dir)?;

    let running = LOGGER.get_or_try_init(|| start(level, &dir))?;
    if running.level != level || running.dir != dir {
        return Err(LoggingError::AlreadyRunning {
            level: running.level,
            dir: running.dir.clone(),
        });
    }
    Ok(())
}

/// `(level, directory)` of the running logger.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    LOGGER.get().map(|running| (running.level, running.dir.clone()))
}

pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start(level: &'static str, dir: &Path) -> Result<RunningLogger, LoggingError> {
    std::fs::create_dir_all(dir).map_err(|source| LoggingError::CreateDirectory {
        dir: dir.to_path_buf(),
        source,
    })?;

    let handle = Logger::try_with_str(level)
        .map_err(LoggingError::Start)?
        .log_to_file(FileSpec::default().directory(dir).basename(LOG_BASENAME))
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(LoggingError::Start)?;

    hook_panics();
    info!(
        "event=logging_start module=logging status=ok version={} level={} dir={}",
        env!("CARGO_PKG_VERSION"),
        level,
        dir.display()
    );

    Ok(RunningLogger {
        level,
        dir: dir.to_path_buf(),
        _handle: handle,
    })
}

fn parse_level(level: &str) -> Result<&'static str, LoggingError> {
    let level = level.trim().to_ascii_lowercase();
    ["trace", "debug", "info", "warn", "error"]
        .into_iter()
        .find(|known| *known == level)
        .or_else(|| (level == "warning").then_some("warn"))
        .ok_or(LoggingError::UnknownLevel(level))
}

fn resolve_dir(log_dir: &str) -> Result<PathBuf, LoggingError> {
    let trimmed = log_dir.trim();
    if trimmed.is_empty() {
        return Err(LoggingError::BadDirectory("path is empty".to_string()));
    }
    std::path::absolute(trimmed).map_err(|err| LoggingError::BadDirectory(err.to_string()))
}

fn hook_panics() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        error!(
            "event=panic module=logging status=error location={} payload={}",
            location,
            flatten(&payload, PANIC_PAYLOAD_LIMIT)
        );
        previous(info);
    }));
}

/// Single-line, at most `limit` chars (plus `...` when cut).
pub(crate) fn flatten(value: &str, limit: usize) -> String {
    let single_line = value.replace(['\n', '\r'], " ");
    let mut out: String = single_line.chars().take(limit).collect();
    if single_line.chars().count() > limit {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{flatten, init_logging, logging_status, parse_level, resolve_dir, LoggingError};

    #[test]
    fn levels_are_case_insensitive_and_accept_warning() {
        assert_eq!(parse_level("INFO").unwrap(), "info");
        assert_eq!(parse_level(" warning ").unwrap(), "warn");
        assert!(matches!(
            parse_level("verbose"),
            Err(LoggingError::UnknownLevel(level)) if level == "verbose"
        ));
    }

    #[test]
    fn relative_dirs_resolve_and_blank_dirs_fail() {
        let resolved = resolve_dir("logs/dev").unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("logs/dev"));
        assert!(matches!(
            resolve_dir("   "),
            Err(LoggingError::BadDirectory(_))
        ));
    }

    #[test]
    fn flatten_removes_line_breaks_and_caps_length() {
        let flat = flatten("line1\nline2\rline3", 8);
        assert!(!flat.contains(['\n', '\r']));
        assert_eq!(flat, "line1 li...");
        assert_eq!(flatten("short", 8), "short");
    }

    #[test]
    fn second_init_must_match_the_first() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let logs_str = logs.to_str().unwrap().to_string();
        let other = dir.path().join("other");

        init_logging("info", &logs_str).unwrap();
        init_logging("INFO", &logs_str).unwrap();

        assert!(matches!(
            init_logging("debug", &logs_str),
            Err(LoggingError::AlreadyRunning { level: "info", .. })
        ));
        assert!(matches!(
            init_logging("info", other.to_str().unwrap()),
            Err(LoggingError::AlreadyRunning { .. })
        ));

        let (level, active) = logging_status().unwrap();
        assert_eq!(level, "info");
        assert_eq!(active, logs);
    }
}
