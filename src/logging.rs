use std::fs::{File, OpenOptions};
use std::io::{self, Write};

use anyhow::{Context, Result};
use chrono::Local;
use env_logger::{Builder, Target};
use log::{Level, LevelFilter};

/// Parses the `--log` flag value. Unknown values fall back to `Info`.
pub fn level_from_flag(value: &str) -> LevelFilter {
    match value.trim().to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "warning" | "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" | "quiet" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARNING",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

/// Formats one log line: `2025-01-31 12:00:00 - INFO - message`.
pub fn format_line(level: Level, message: &str) -> String {
    format!(
        "{} - {} - {}",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        level_name(level),
        message
    )
}

/// Console output, mirrored into a log file when one is open.
struct Tee {
    file: Option<File>,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        if let Some(file) = self.file.as_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

/// Installs the process-wide logger for one binary and returns the active level.
///
/// `binary` is the calling crate's `module_path!()`. Its records and the library's
/// follow `flag`; every other crate is held to warnings. Lines are appended to
/// `log_file` as well when one is given.
pub fn init(binary: &str, flag: &str, log_file: Option<&str>) -> Result<LevelFilter> {
    let level = level_from_flag(flag);
    let file = match log_file.filter(|p| !p.trim().is_empty()) {
        Some(path) => Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path))?,
        ),
        None => None,
    };

    Builder::new()
        .format(|buf, record| writeln!(buf, "{}", format_line(record.level(), &record.args().to_string())))
        .filter(None, LevelFilter::Warn.min(level))
        .filter(Some(env!("CARGO_CRATE_NAME")), level)
        .filter(Some(binary), level)
        .target(Target::Pipe(Box::new(Tee { file })))
        .try_init()
        .context("Logger was already initialized")?;
    Ok(level)
}
