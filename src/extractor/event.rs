use serde::{Deserialize, Serialize};
use std::fmt;

/// A message sent from the shard extractor to whichever view is consuming
/// the progress channel.
///
/// `Quit` is sent exactly once per run and is always the final event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Completion of the current shard, in `[0.0, 1.0]`.
    Progress { shard: u32, fraction: f64 },
    /// Extracting `shard` failed; later shards are still attempted.
    ShardError { shard: u32, error: String },
    Quit,
}

impl ProgressEvent {
    /// Builds a progress event, clamping `fraction` into `[0.0, 1.0]`.
    pub fn progress(shard: u32, fraction: f64) -> Self {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        ProgressEvent::Progress { shard, fraction }
    }

    pub fn shard_error<S: Into<String>>(shard: u32, error: S) -> Self {
        ProgressEvent::ShardError {
            shard,
            error: error.into(),
        }
    }

    pub fn shard(&self) -> Option<u32> {
        match self {
            ProgressEvent::Progress { shard, .. } | ProgressEvent::ShardError { shard, .. } => {
                Some(*shard)
            }
            ProgressEvent::Quit => None,
        }
    }

    pub fn is_quit(&self) -> bool {
        matches!(self, ProgressEvent::Quit)
    }
}

/// A shard that could not be extracted, in the order the failure arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardFailure {
    pub shard: u32,
    pub error: String,
}

impl ShardFailure {
    pub fn new<S: Into<String>>(shard: u32, error: S) -> Self {
        Self {
            shard,
            error: error.into(),
        }
    }
}

impl fmt::Display for ShardFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shard {}: {}", self.shard, self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_fraction_is_clamped() {
        assert_eq!(
            ProgressEvent::progress(0, 1.7),
            ProgressEvent::Progress {
                shard: 0,
                fraction: 1.0
            }
        );
        assert_eq!(
            ProgressEvent::progress(0, -0.2),
            ProgressEvent::Progress {
                shard: 0,
                fraction: 0.0
            }
        );
        assert_eq!(
            ProgressEvent::progress(3, f64::NAN),
            ProgressEvent::Progress {
                shard: 3,
                fraction: 0.0
            }
        );
    }

    #[test]
    fn test_shard_accessor() {
        assert_eq!(ProgressEvent::progress(2, 0.5).shard(), Some(2));
        assert_eq!(ProgressEvent::shard_error(1, "boom").shard(), Some(1));
        assert_eq!(ProgressEvent::Quit.shard(), None);
        assert!(ProgressEvent::Quit.is_quit());
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(ProgressEvent::shard_error(1, "archive missing")).unwrap();
        assert_eq!(json["event"], "shard_error");
        assert_eq!(json["shard"], 1);
        assert_eq!(json["error"], "archive missing");

        let quit = serde_json::to_value(ProgressEvent::Quit).unwrap();
        assert_eq!(quit["event"], "quit");
    }

    #[test]
    fn test_failure_display() {
        let failure = ShardFailure::new(1, "archive missing");
        assert_eq!(failure.to_string(), "shard 1: archive missing");
    }
}
