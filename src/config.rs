use crate::error::{ExtractError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SHARD_PLACEHOLDER: &str = "{shard}";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub extract: ExtractConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub shards: Vec<u32>,
    pub shard_dir_template: String,
    pub chunk_pattern: String,
    pub compression: Compression,
    pub tar_program: String,
    pub channel_capacity: usize,
    pub progress_steps: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub no_tty: bool,
    pub tick_millis: u64,
}

/// Compression applied to the concatenated shard chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Gzip,
    Zstd,
    None,
}

impl Compression {
    /// The tar flag selecting the decompressor, if any.
    pub fn tar_flag(&self) -> Option<&'static str> {
        match self {
            Compression::Gzip => Some("-z"),
            Compression::Zstd => Some("--zstd"),
            Compression::None => None,
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            shards: vec![0, 1, 2],
            shard_dir_template: "shard-{shard}".to_string(),
            chunk_pattern: r"^chunk_(\d+)\.bin$".to_string(),
            compression: Compression::Gzip,
            tar_program: "tar".to_string(),
            channel_capacity: 1000,
            progress_steps: 100,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            no_tty: false,
            tick_millis: 100,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ExtractError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ExtractError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ExtractError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["snapshot-extract.toml", ".snapshot-extract.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(ref shards) = cli_args.shards {
            self.extract.shards = shards.clone();
        }

        if let Some(ref tar_program) = cli_args.tar_program {
            self.extract.tar_program = tar_program.clone();
        }

        if let Some(compression) = cli_args.compression {
            self.extract.compression = compression;
        }

        if let Some(capacity) = cli_args.channel_capacity {
            self.extract.channel_capacity = capacity;
        }

        if cli_args.no_tty {
            self.output.no_tty = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.extract.channel_capacity == 0 {
            return Err(ExtractError::Config {
                message: "Channel capacity must be greater than 0".to_string(),
            });
        }

        if self.extract.progress_steps == 0 {
            return Err(ExtractError::Config {
                message: "Progress steps must be greater than 0".to_string(),
            });
        }

        if self.output.tick_millis == 0 {
            return Err(ExtractError::Config {
                message: "Redraw tick must be greater than 0".to_string(),
            });
        }

        if !self.extract.shard_dir_template.contains(SHARD_PLACEHOLDER) {
            return Err(ExtractError::Config {
                message: format!(
                    "Shard directory template must contain {}: {}",
                    SHARD_PLACEHOLDER, self.extract.shard_dir_template
                ),
            });
        }

        if self.extract.tar_program.trim().is_empty() {
            return Err(ExtractError::Config {
                message: "tar program must not be empty".to_string(),
            });
        }

        regex::Regex::new(&self.extract.chunk_pattern)?;

        Ok(())
    }

    /// Shard list in caller order with repeated indices dropped.
    pub fn shard_list(&self) -> Vec<u32> {
        let mut seen = std::collections::HashSet::new();
        let mut shards = Vec::with_capacity(self.extract.shards.len());

        for &shard in &self.extract.shards {
            if seen.insert(shard) {
                shards.push(shard);
            } else {
                tracing::warn!(shard, "ignoring repeated shard index");
            }
        }

        shards
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.output.tick_millis)
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub shards: Option<Vec<u32>>,
    pub tar_program: Option<String>,
    pub compression: Option<Compression>,
    pub channel_capacity: Option<usize>,
    pub no_tty: bool,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shards(mut self, shards: Option<Vec<u32>>) -> Self {
        self.shards = shards;
        self
    }

    pub fn with_tar_program(mut self, program: Option<PathBuf>) -> Self {
        self.tar_program = program.map(|p| p.to_string_lossy().into_owned());
        self
    }

    pub fn with_compression(mut self, compression: Option<Compression>) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: Option<usize>) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_no_tty(mut self, no_tty: bool) -> Self {
        self.no_tty = no_tty;
        self
    }
}
