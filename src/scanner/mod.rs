pub mod shard_scanner;

pub use shard_scanner::{format_bytes, ChunkFile, ShardArchive, ShardScanner};
