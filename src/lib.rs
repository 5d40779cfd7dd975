pub mod cli;
pub mod config;
pub mod error;
pub mod extractor;
pub mod logging;
pub mod runner;
pub mod scanner;
pub mod ui;

// Public API re-exports
pub use cli::{Cli, OutputFormat};
pub use config::{CliOverrides, Compression, Config, ExtractConfig, OutputConfig};
pub use error::{ExtractError, Result, UserFriendlyError};

// Core functionality re-exports
pub use extractor::{
    locate_tool, NativeTar, ProgressEvent, ShardExtractor, ShardFailure, ShardUnpacker,
};
pub use runner::{RunReport, Runner};
pub use scanner::{ChunkFile, ShardArchive, ShardScanner};
pub use ui::{
    GracefulShutdown, InteractiveView, LineStyle, OutputFormatter, OutputMode, PlainView,
    ProgressAggregator, ProgressSink,
};

use std::path::Path;
use std::sync::Arc;

/// One shard's entry in a dry-run plan.
pub type PlannedShard = (u32, Result<ShardArchive>);

/// Main library interface: extracts a snapshot using the loaded configuration.
pub struct SnapshotExtract {
    config: Config,
    output_formatter: OutputFormatter,
    shutdown: GracefulShutdown,
}

impl SnapshotExtract {
    /// Creates an instance and installs the Ctrl+C handler.
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Result<Self> {
        Ok(Self {
            config,
            output_formatter: OutputFormatter::new(output_mode, verbose, quiet),
            shutdown: GracefulShutdown::new()?,
        })
    }

    /// Same as [`SnapshotExtract::new`] without touching the process signal handler.
    pub fn with_shutdown(
        config: Config,
        output_mode: OutputMode,
        verbose: u8,
        quiet: bool,
        shutdown: GracefulShutdown,
    ) -> Self {
        Self {
            config,
            output_formatter: OutputFormatter::new(output_mode, verbose, quiet),
            shutdown,
        }
    }

    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        Self::new(
            config,
            cli_args.output_format.into(),
            cli_args.verbose,
            cli_args.quiet,
        )
    }

    /// Extracts every configured shard from `source_dir` into `dest_dir`.
    ///
    /// Shard failures are reported in the returned [`RunReport`]; only
    /// problems that stop the whole run are returned as errors.
    pub async fn extract(
        &self,
        source_dir: &Path,
        dest_dir: &Path,
        interactive: bool,
    ) -> Result<RunReport> {
        self.shutdown.check_shutdown()?;
        validate_source_dir(source_dir)?;

        self.output_formatter.print_banner(source_dir, dest_dir);

        let unpacker = Arc::new(NativeTar::new(&self.config.extract, self.shutdown.clone())?);
        let shards = self.config.shard_list();

        self.runner(unpacker)
            .run(source_dir, dest_dir, &shards, interactive)
            .await
    }

    /// Builds a runner configured from this instance's settings.
    pub fn runner(&self, unpacker: Arc<dyn ShardUnpacker>) -> Runner {
        let line_style = match self.output_formatter.mode() {
            OutputMode::Json => LineStyle::Json,
            OutputMode::Human | OutputMode::Plain => LineStyle::Text,
        };

        Runner::new(unpacker, self.shutdown.clone())
            .with_channel_capacity(self.config.extract.channel_capacity)
            .with_progress_steps(self.config.extract.progress_steps)
            .with_tick(self.config.tick_duration())
            .with_line_style(line_style)
    }

    /// Locates tar and scans every shard without extracting anything.
    pub fn dry_run(&self, source_dir: &Path) -> Result<Vec<PlannedShard>> {
        validate_source_dir(source_dir)?;
        locate_tool(&self.config.extract.tar_program)?;

        let scanner = ShardScanner::new(&self.config.extract)?;
        Ok(self
            .config
            .shard_list()
            .into_iter()
            .map(|shard| (shard, scanner.scan_shard(source_dir, shard)))
            .collect())
    }

    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        let sample_config = Config::create_sample_config();
        std::fs::write(output_path.as_ref(), sample_config)?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    pub fn handle_error(&self, error: &ExtractError) {
        self.output_formatter.print_user_friendly_error(error);
    }
}

fn validate_source_dir(source_dir: &Path) -> Result<()> {
    if source_dir.is_dir() {
        Ok(())
    } else {
        Err(ExtractError::InvalidPath {
            path: source_dir.display().to_string(),
        })
    }
}
