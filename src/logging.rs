use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use env_logger::{Builder, Target};
use log::LevelFilter;

pub const LOG_FILE_ENV: &str = "REELFEED_LOG";
pub const DEBUG_ENV: &str = "REELFEED_DEBUG";

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|val| {
            let trimmed = val.trim();
            !(trimmed.is_empty()
                || trimmed.eq_ignore_ascii_case("0")
                || trimmed.eq_ignore_ascii_case("false")
                || trimmed.eq_ignore_ascii_case("no")
                || trimmed.eq_ignore_ascii_case("off"))
        })
        .unwrap_or(false)
}

fn level_from_env() -> LevelFilter {
    if env_flag(DEBUG_ENV) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Installs the file logger when `REELFEED_LOG` names a file; otherwise
/// logging stays disabled.
pub fn init_from_env() -> Result<()> {
    match std::env::var(LOG_FILE_ENV) {
        Ok(path) if !path.trim().is_empty() => init(Path::new(path.trim()), level_from_env()),
        _ => Ok(()),
    }
}

pub fn init(path: &Path, level: LevelFilter) -> Result<()> {
    file_logger(path, level)?
        .try_init()
        .context("install logger")
}

/// The terminal belongs to the feed UI, so records only ever go to `path`.
fn file_logger(path: &Path, level: LevelFilter) -> Result<Builder> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))?;
    let mut builder = Builder::new();
    builder
        .filter_level(level)
        .target(Target::Pipe(Box::new(file)))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} {} - {}",
                Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                record.level(),
                record.target(),
                record.args()
            )
        });
    Ok(builder)
}
