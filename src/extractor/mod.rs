pub mod event;
pub mod shard_extractor;
pub mod unpacker;

pub use event::{ProgressEvent, ShardFailure};
pub use shard_extractor::ShardExtractor;
pub use unpacker::{locate_tool, NativeTar, ShardUnpacker};
