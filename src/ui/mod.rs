pub mod aggregator;
pub mod interactive;
pub mod output;
pub mod plain;
pub mod progress;
pub mod signals;
pub mod sink;

pub use aggregator::{ProgressAggregator, ProgressSnapshot};
pub use interactive::InteractiveView;
pub use output::{OutputFormatter, OutputMode};
pub use plain::{LineStyle, PlainView};
pub use progress::global_multi_progress;
pub use signals::GracefulShutdown;
pub use sink::{drive, ProgressSink, SinkOutcome};
