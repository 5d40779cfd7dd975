use crate::extractor::{ProgressEvent, ShardFailure};
use std::collections::BTreeMap;

/// Reduces the progress event stream into renderable state.
///
/// Owned and mutated by the single consumer of the progress channel.
#[derive(Debug, Clone, Default)]
pub struct ProgressAggregator {
    shards: Vec<u32>,
    fractions: BTreeMap<u32, f64>,
    errors: Vec<ShardFailure>,
    finished: bool,
}

impl ProgressAggregator {
    /// `shards` is the full list being extracted; it is the denominator of
    /// overall progress.
    pub fn new(shards: &[u32]) -> Self {
        Self {
            shards: shards.to_vec(),
            ..Self::default()
        }
    }

    pub fn apply(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Progress { shard, fraction } => {
                self.fractions.insert(*shard, *fraction);
            }
            ProgressEvent::ShardError { shard, error } => {
                self.errors.push(ShardFailure::new(*shard, error.clone()));
            }
            ProgressEvent::Quit => self.finished = true,
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot<'_> {
        ProgressSnapshot {
            shards: &self.shards,
            fractions: &self.fractions,
            errors: &self.errors,
            finished: self.finished,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn into_failures(self) -> Vec<ShardFailure> {
        self.errors
    }
}

/// Borrowed view of the aggregator at one point of the stream.
#[derive(Debug, Clone, Copy)]
pub struct ProgressSnapshot<'a> {
    pub shards: &'a [u32],
    pub fractions: &'a BTreeMap<u32, f64>,
    pub errors: &'a [ShardFailure],
    pub finished: bool,
}

impl ProgressSnapshot<'_> {
    /// Last reported fraction for `shard`, 0.0 if nothing has arrived yet.
    pub fn fraction(&self, shard: u32) -> f64 {
        self.fractions.get(&shard).copied().unwrap_or(0.0)
    }

    /// Arithmetic mean over every known shard; unseen shards count as 0.0.
    pub fn overall(&self) -> f64 {
        if self.shards.is_empty() {
            return if self.finished { 1.0 } else { 0.0 };
        }

        let sum: f64 = self.shards.iter().map(|&shard| self.fraction(shard)).sum();
        sum / self.shards.len() as f64
    }

    pub fn has_failed(&self, shard: u32) -> bool {
        self.errors.iter().any(|failure| failure.shard == shard)
    }

    /// Shards that reached 1.0 without reporting an error.
    pub fn completed(&self) -> usize {
        self.shards
            .iter()
            .filter(|&&shard| self.fraction(shard) >= 1.0 && !self.has_failed(shard))
            .count()
    }
}
