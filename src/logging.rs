use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "PVE_DCUI_LOG";

/// Sends tracing output to `path`; the console itself is owned by the TUI. Returns
/// `false` when the file cannot be opened, in which case the console runs unlogged.
pub fn init(path: &Path) -> bool {
    let Some(file_name) = path.file_name() else {
        return false;
    };
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let appender = match RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(dir)
    {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("logging disabled: {e}");
            return false;
        }
    };

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(appender)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .is_ok()
}
