use crate::extractor::event::ProgressEvent;
use crate::extractor::unpacker::ShardUnpacker;
use crate::ui::GracefulShutdown;
use crossbeam_channel::{SendError, Sender};
use std::path::PathBuf;
use std::sync::Arc;

/// Turns raw unpacker fractions into a bounded number of progress events.
///
/// Only strictly increasing quantised values are emitted, so a shard never
/// produces more than `steps + 1` progress events.
#[derive(Debug)]
struct ProgressThrottle {
    shard: u32,
    steps: u32,
    last_step: u32,
}

impl ProgressThrottle {
    fn new(shard: u32, steps: u32) -> Self {
        Self {
            shard,
            steps: steps.max(1),
            last_step: 0,
        }
    }

    fn start(&self) -> ProgressEvent {
        ProgressEvent::progress(self.shard, 0.0)
    }

    fn observe(&mut self, fraction: f64) -> Option<ProgressEvent> {
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        let step = (fraction * self.steps as f64).floor() as u32;

        if step > self.last_step {
            self.last_step = step;
            Some(ProgressEvent::progress(
                self.shard,
                step as f64 / self.steps as f64,
            ))
        } else {
            None
        }
    }

    fn finish(&mut self) -> Option<ProgressEvent> {
        if self.last_step < self.steps {
            self.last_step = self.steps;
            Some(ProgressEvent::progress(self.shard, 1.0))
        } else {
            None
        }
    }
}

/// Producer side of an extraction run.
///
/// Shards are extracted one after another in list order. A failing shard
/// becomes a `ShardError` event and the next shard is attempted; a single
/// `Quit` closes the stream once the list is exhausted.
pub struct ShardExtractor {
    unpacker: Arc<dyn ShardUnpacker>,
    source_dir: PathBuf,
    dest_dir: PathBuf,
    shards: Vec<u32>,
    progress_steps: u32,
    shutdown: GracefulShutdown,
}

impl ShardExtractor {
    pub fn new(
        unpacker: Arc<dyn ShardUnpacker>,
        source_dir: PathBuf,
        dest_dir: PathBuf,
        shards: Vec<u32>,
    ) -> Self {
        Self {
            unpacker,
            source_dir,
            dest_dir,
            shards,
            progress_steps: 100,
            shutdown: GracefulShutdown::unregistered(),
        }
    }

    pub fn with_progress_steps(mut self, steps: u32) -> Self {
        self.progress_steps = steps.max(1);
        self
    }

    pub fn with_shutdown(mut self, shutdown: GracefulShutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Runs every shard and sends `Quit`. Returns how many shards were
    /// attempted.
    pub fn run(self, tx: &Sender<ProgressEvent>) -> usize {
        let mut attempted = 0;

        for &shard in &self.shards {
            if !self.shutdown.is_running() {
                tracing::info!(
                    remaining = self.shards.len() - attempted,
                    "cancellation requested, not starting further shards"
                );
                break;
            }

            attempted += 1;
            if self.extract_shard(shard, tx).is_err() {
                tracing::debug!(shard, "progress receiver went away, stopping extraction");
                return attempted;
            }
        }

        if tx.send(ProgressEvent::Quit).is_err() {
            tracing::debug!("progress receiver went away before quit");
        }

        attempted
    }

    fn extract_shard(
        &self,
        shard: u32,
        tx: &Sender<ProgressEvent>,
    ) -> Result<(), SendError<ProgressEvent>> {
        tracing::debug!(shard, "extracting shard");

        let mut throttle = ProgressThrottle::new(shard, self.progress_steps);
        tx.send(throttle.start())?;

        let mut send_result = Ok(());
        let outcome = self.unpacker.unpack(
            shard,
            &self.source_dir,
            &self.dest_dir,
            &mut |fraction| {
                if send_result.is_err() {
                    return;
                }
                if let Some(event) = throttle.observe(fraction) {
                    send_result = tx.send(event);
                }
            },
        );
        send_result?;

        match outcome {
            Ok(()) => {
                if let Some(event) = throttle.finish() {
                    tx.send(event)?;
                }
                tracing::debug!(shard, "shard extracted");
            }
            Err(e) => {
                tracing::debug!(shard, error = %e, "shard extraction failed");
                tx.send(ProgressEvent::shard_error(shard, e.to_string()))?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::error::{ExtractError, Result};
    use crate::extractor::unpacker::ShardUnpacker;
    use std::collections::HashSet;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    /// Scripted unpacker: every shard reports `fractions` and succeeds
    /// unless listed in `missing`, which fail as missing archives.
    #[derive(Default)]
    pub struct FakeUnpacker {
        pub fractions: Vec<f64>,
        pub missing: HashSet<u32>,
        pub unavailable: bool,
        pub calls: Mutex<Vec<u32>>,
    }

    impl FakeUnpacker {
        pub fn succeeding() -> Self {
            Self {
                fractions: vec![0.25, 0.5, 0.75, 1.0],
                ..Self::default()
            }
        }

        pub fn failing(mut self, shard: u32) -> Self {
            self.missing.insert(shard);
            self
        }

        pub fn unavailable(mut self) -> Self {
            self.unavailable = true;
            self
        }

        pub fn calls(&self) -> Vec<u32> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ShardUnpacker for FakeUnpacker {
        fn check_available(&self) -> Result<()> {
            if self.unavailable {
                return Err(ExtractError::ToolNotFound {
                    program: "tar".to_string(),
                });
            }
            Ok(())
        }

        fn unpack(
            &self,
            shard: u32,
            _source_dir: &Path,
            _dest_dir: &Path,
            progress: &mut dyn FnMut(f64),
        ) -> Result<()> {
            self.calls.lock().unwrap().push(shard);

            if self.missing.contains(&shard) {
                return Err(ExtractError::ArchiveMissing {
                    shard,
                    path: PathBuf::from(format!("/snapshot/shard-{}", shard)),
                });
            }

            for &fraction in &self.fractions {
                progress(fraction);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeUnpacker;
    use super::*;
    use crossbeam_channel::bounded;

    fn run_extractor(unpacker: FakeUnpacker, shards: Vec<u32>) -> Vec<ProgressEvent> {
        let (tx, rx) = bounded(1000);
        let extractor = ShardExtractor::new(
            Arc::new(unpacker),
            PathBuf::from("/snapshot"),
            PathBuf::from("/rocks"),
            shards,
        );
        extractor.run(&tx);
        drop(tx);
        rx.iter().collect()
    }

    #[test]
    fn test_quit_is_sent_once_and_last() {
        let events = run_extractor(FakeUnpacker::succeeding().failing(1), vec![0, 1, 2]);

        let quits = events.iter().filter(|e| e.is_quit()).count();
        assert_eq!(quits, 1);
        assert_eq!(events.last(), Some(&ProgressEvent::Quit));
    }

    #[test]
    fn test_empty_shard_list_only_quits() {
        let events = run_extractor(FakeUnpacker::succeeding(), vec![]);
        assert_eq!(events, vec![ProgressEvent::Quit]);
    }

    #[test]
    fn test_failure_does_not_stop_later_shards() {
        let events = run_extractor(
            FakeUnpacker::succeeding().failing(1),
            vec![0, 1, 2],
        );

        let error_index = events
            .iter()
            .position(|e| matches!(e, ProgressEvent::ShardError { shard: 1, .. }))
            .unwrap();
        let later_shard_two = events[error_index..]
            .iter()
            .any(|e| *e == ProgressEvent::progress(2, 1.0));
        assert!(later_shard_two);

        let errors: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::ShardError { .. }))
            .collect();
        assert_eq!(
            errors,
            vec![&ProgressEvent::shard_error(1, "archive missing: /snapshot/shard-1")]
        );
    }

    #[test]
    fn test_shards_processed_in_list_order() {
        let unpacker = Arc::new(FakeUnpacker::succeeding());
        let (tx, rx) = bounded(1000);
        ShardExtractor::new(
            unpacker.clone(),
            PathBuf::from("/s"),
            PathBuf::from("/d"),
            vec![2, 0, 1],
        )
        .run(&tx);
        drop(tx);

        assert_eq!(unpacker.calls(), vec![2, 0, 1]);

        let order: Vec<u32> = rx.iter().filter_map(|e| e.shard()).collect();
        let mut deduped = order.clone();
        deduped.dedup();
        assert_eq!(deduped, vec![2, 0, 1]);
    }

    #[test]
    fn test_progress_is_monotonic_per_shard() {
        let unpacker = FakeUnpacker {
            fractions: vec![0.1, 0.05, 0.5, 0.5, 0.999, 1.0],
            ..FakeUnpacker::default()
        };
        let events = run_extractor(unpacker, vec![0]);

        let fractions: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Progress { fraction, .. } => Some(*fraction),
                _ => None,
            })
            .collect();

        assert_eq!(fractions.first(), Some(&0.0));
        assert_eq!(fractions.last(), Some(&1.0));
        assert!(fractions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_completion_reported_when_unpacker_is_silent() {
        let events = run_extractor(FakeUnpacker::default(), vec![3]);
        assert_eq!(
            events,
            vec![
                ProgressEvent::progress(3, 0.0),
                ProgressEvent::progress(3, 1.0),
                ProgressEvent::Quit,
            ]
        );
    }

    #[test]
    fn test_cancellation_skips_remaining_shards_but_quits() {
        let shutdown = GracefulShutdown::unregistered();
        shutdown.request_shutdown();

        let unpacker = Arc::new(FakeUnpacker::succeeding());
        let (tx, rx) = bounded(10);
        let attempted = ShardExtractor::new(
            unpacker.clone(),
            PathBuf::from("/s"),
            PathBuf::from("/d"),
            vec![0, 1],
        )
        .with_shutdown(shutdown)
        .run(&tx);
        drop(tx);

        assert_eq!(attempted, 0);
        assert!(unpacker.calls().is_empty());
        assert_eq!(rx.iter().collect::<Vec<_>>(), vec![ProgressEvent::Quit]);
    }

    #[test]
    fn test_dropped_receiver_stops_producer() {
        let unpacker = Arc::new(FakeUnpacker::succeeding());
        let (tx, rx) = bounded(1000);
        drop(rx);

        let attempted = ShardExtractor::new(
            unpacker.clone(),
            PathBuf::from("/s"),
            PathBuf::from("/d"),
            vec![0, 1, 2],
        )
        .run(&tx);

        assert_eq!(attempted, 1);
        assert!(unpacker.calls().is_empty());
    }

    #[test]
    fn test_throttle_limits_event_count() {
        let mut throttle = ProgressThrottle::new(0, 4);
        let emitted: Vec<_> = (0..=100)
            .filter_map(|i| throttle.observe(i as f64 / 100.0))
            .collect();

        assert_eq!(emitted.len(), 4);
        assert_eq!(emitted.last(), Some(&ProgressEvent::progress(0, 1.0)));
        assert!(throttle.finish().is_none());
    }
}
