use crate::config::{CliOverrides, Compression, Config};
use crate::error::Result;
use crate::ui::OutputMode;
use clap::{Parser, ValueEnum};
use console::Term;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "snapshot-extract")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract a downloaded sharded snapshot into a database directory")]
#[command(
    long_about = "Unpacks every shard of a downloaded snapshot into OUTPUT_DIR, showing \
                  per-shard and overall progress.\n\n\
                  WARNING: files already present in OUTPUT_DIR are overwritten."
)]
#[command(after_help = "EXAMPLES:\n  \
    snapshot-extract ./snapshot ./rocksdb\n  \
    snapshot-extract ./snapshot ./rocksdb --shards 0,1,2,3 --compression zstd\n  \
    snapshot-extract ./snapshot ./rocksdb --no-tty --output-format json\n  \
    snapshot-extract ./snapshot ./rocksdb --dry-run\n  \
    snapshot-extract --generate-config --config snapshot-extract.toml")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Directory holding the downloaded shards
    #[arg(required_unless_present = "generate_config")]
    pub input_dir: Option<PathBuf>,

    /// Directory to extract into (created if missing)
    #[arg(required_unless_present = "generate_config")]
    pub output_dir: Option<PathBuf>,

    /// Shard indices to extract, in order (comma-separated)
    #[arg(long, value_delimiter = ',', help = "Shards to extract (e.g., 0,1,2)")]
    pub shards: Option<Vec<u32>>,

    /// Print one progress line per event instead of redrawing bars
    #[arg(long)]
    pub no_tty: bool,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// tar executable to use
    #[arg(long, help = "tar program to run (default: tar from PATH)")]
    pub tar_program: Option<PathBuf>,

    /// Compression of the shard archives
    #[arg(long, value_enum)]
    pub compression: Option<Compression>,

    /// Progress channel capacity
    #[arg(long, help = "Number of progress events buffered between extractor and display")]
    pub capacity: Option<usize>,

    /// Verbose output level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Dry run (show what would be done without executing)
    #[arg(long, help = "List the chunks each shard would read without extracting")]
    pub dry_run: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Generate a sample configuration file")]
    pub generate_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON lines
    Json,
    /// Plain text output
    Plain,
}

impl From<OutputFormat> for OutputMode {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Human => OutputMode::Human,
            OutputFormat::Json => OutputMode::Json,
            OutputFormat::Plain => OutputMode::Plain,
        }
    }
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        CliOverrides::new()
            .with_shards(self.shards.clone())
            .with_tar_program(self.tar_program.clone())
            .with_compression(self.compression)
            .with_channel_capacity(self.capacity)
            .with_no_tty(self.no_tty)
    }

    /// Bars are drawn only for human output on a terminal.
    pub fn interactive(&self, config: &Config) -> bool {
        !config.output.no_tty
            && self.output_format == OutputFormat::Human
            && Term::stderr().is_term()
    }

    pub fn should_use_colors(&self) -> bool {
        !self.quiet && Term::stderr().features().colors_supported()
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}
