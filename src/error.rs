use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("'{program}' not found in PATH")]
    ToolNotFound { program: String },

    #[error("archive missing: {}", path.display())]
    ArchiveMissing { shard: u32, path: PathBuf },

    #[error("tar exited with {}: {stderr}", describe_exit(*code))]
    ToolFailed {
        shard: u32,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Path validation failed: {path}")]
    InvalidPath { path: String },

    #[error("Operation was cancelled by user")]
    Cancelled,

    #[error("Progress stream closed before extraction finished")]
    StreamClosed,

    #[error("Background task failed: {message}")]
    Worker { message: String },
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for ExtractError {
    fn user_message(&self) -> String {
        match self {
            ExtractError::Config { message } => {
                format!("Configuration error: {}", message)
            }
            ExtractError::ToolNotFound { program } => {
                format!("'{}' not found in PATH", program)
            }
            ExtractError::ArchiveMissing { shard, path } => {
                format!("Shard {} has no archive at {}", shard, path.display())
            }
            ExtractError::ToolFailed { shard, .. } => {
                format!("Unpacking shard {} failed: {}", shard, self)
            }
            ExtractError::InvalidPath { path } => {
                format!("Invalid path: {}", path)
            }
            ExtractError::Cancelled => "Operation was cancelled by user".to_string(),
            ExtractError::StreamClosed => {
                "Extraction stopped unexpectedly before all shards were attempted".to_string()
            }
            ExtractError::Worker { message } => format!("Internal error: {}", message),
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            ExtractError::Config { .. } => Some(
                "Check your configuration file syntax and the values passed on the command line.".to_string()
            ),
            ExtractError::ToolNotFound { .. } => Some(
                "Install GNU tar (or bsdtar) and make sure it is on your PATH, or point --tar-program at it.".to_string()
            ),
            ExtractError::ArchiveMissing { .. } => Some(
                "Verify the snapshot download completed and that --shards matches the shards you downloaded.".to_string()
            ),
            ExtractError::ToolFailed { .. } => Some(
                "The snapshot may be corrupt or incomplete. Re-download the failing shard and try again.".to_string()
            ),
            ExtractError::InvalidPath { .. } => Some(
                "Make sure the input directory exists and the output directory is writable.".to_string()
            ),
            ExtractError::Worker { .. } | ExtractError::StreamClosed => Some(
                "Re-run with -vv to see where extraction stopped.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for ExtractError {
    fn from(error: toml::de::Error) -> Self {
        ExtractError::Config {
            message: error.to_string(),
        }
    }
}

impl From<regex::Error> for ExtractError {
    fn from(error: regex::Error) -> Self {
        ExtractError::Config {
            message: format!("invalid chunk pattern: {}", error),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
