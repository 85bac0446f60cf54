use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::output::CONSOLE_TARGET;

/// The dated log file that records one run.
pub struct LogFile {
    path: PathBuf,
    file: File,
}

impl LogFile {
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

        let path = dir.join(file_name(Local::now()));
        let file = File::create(&path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn file_name(now: chrono::DateTime<Local>) -> String {
    format!("deploy_{}.log", now.format("%Y%m%d_%H%M%S"))
}

fn console_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Console events go to stderr filtered by `-v`/`RUST_LOG`; the log file
/// gets everything at debug, including the mirrored console lines.
pub fn init(verbose: u8, log_file: LogFile) -> Result<()> {
    let console_off: Directive = format!("{}=off", CONSOLE_TARGET)
        .parse()
        .context("Invalid console filter directive")?;
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level(verbose)))
        .add_directive(console_off);

    let file_filter = EnvFilter::new(format!(
        "warn,{}=debug,{}=info",
        env!("CARGO_CRATE_NAME"),
        CONSOLE_TARGET
    ));

    let LogFile { file, .. } = log_file;

    let console_layer = fmt::layer()
        .without_time()
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file))
        .with_filter(file_filter);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}
