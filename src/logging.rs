use crate::error::{ExtractError, Result};
use crate::ui::progress::{global_multi_progress, IndicatifWriter};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Maps `-v` occurrences to this crate's log level.
pub fn level_for(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::OFF;
    }

    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(verbose: u8, quiet: bool) -> String {
    format!(
        "snapshot_extract={}",
        level_for(verbose, quiet).to_string().to_lowercase()
    )
}

/// Installs the global subscriber. Log lines go to stderr through the
/// shared bar container so they never tear an active progress display.
pub fn init(verbose: u8, quiet: bool, use_colors: bool) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter(verbose, quiet)).map_err(|e| {
            ExtractError::Config {
                message: format!("Invalid log filter: {}", e),
            }
        })?,
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(use_colors)
        .with_target(false)
        .with_writer(IndicatifWriter::new(global_multi_progress()))
        .without_time();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| ExtractError::Config {
            message: format!("Failed to initialise logging: {}", e),
        })
}
