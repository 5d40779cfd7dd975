use crate::error::{ExtractError, Result};
use crate::extractor::{ShardExtractor, ShardFailure, ShardUnpacker};
use crate::ui::{
    drive, GracefulShutdown, InteractiveView, LineStyle, PlainView, ProgressSink, SinkOutcome,
};
use chrono::{DateTime, Utc};
use indicatif::MultiProgress;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task;

/// Result of one extraction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
    pub shards: Vec<u32>,
    pub failures: Vec<ShardFailure>,
    pub cancelled: bool,
    pub presentation_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

/// Owns the progress channel for a run: starts the extractor, drives the
/// chosen view until `Quit`, and hands back the collected failures.
pub struct Runner {
    unpacker: Arc<dyn ShardUnpacker>,
    channel_capacity: usize,
    progress_steps: u32,
    tick: Duration,
    shutdown: GracefulShutdown,
    multi_progress: MultiProgress,
    line_style: LineStyle,
}

impl Runner {
    pub fn new(unpacker: Arc<dyn ShardUnpacker>, shutdown: GracefulShutdown) -> Self {
        Self {
            unpacker,
            channel_capacity: 1000,
            progress_steps: 100,
            tick: Duration::from_millis(100),
            shutdown,
            multi_progress: crate::ui::global_multi_progress(),
            line_style: LineStyle::Text,
        }
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn with_progress_steps(mut self, steps: u32) -> Self {
        self.progress_steps = steps.max(1);
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_multi_progress(mut self, multi_progress: MultiProgress) -> Self {
        self.multi_progress = multi_progress;
        self
    }

    pub fn with_line_style(mut self, style: LineStyle) -> Self {
        self.line_style = style;
        self
    }

    /// Builds the front-end once; the event loop itself never branches on it.
    pub fn sink_for(&self, shards: &[u32], interactive: bool) -> Box<dyn ProgressSink + Send> {
        if interactive {
            Box::new(InteractiveView::new(shards, self.multi_progress.clone()))
        } else {
            Box::new(PlainView::new(shards, std::io::stdout(), self.line_style))
        }
    }

    pub async fn run(
        &self,
        source_dir: &Path,
        dest_dir: &Path,
        shards: &[u32],
        interactive: bool,
    ) -> Result<RunReport> {
        self.unpacker.check_available()?;
        let sink = self.sink_for(shards, interactive);
        self.drive_run(source_dir, dest_dir, shards, sink).await
    }

    /// Like [`Runner::run`] with a caller-provided front-end.
    pub async fn run_with_sink(
        &self,
        source_dir: &Path,
        dest_dir: &Path,
        shards: &[u32],
        sink: Box<dyn ProgressSink + Send>,
    ) -> Result<RunReport> {
        self.unpacker.check_available()?;
        self.drive_run(source_dir, dest_dir, shards, sink).await
    }

    async fn drive_run(
        &self,
        source_dir: &Path,
        dest_dir: &Path,
        shards: &[u32],
        mut sink: Box<dyn ProgressSink + Send>,
    ) -> Result<RunReport> {
        let started_at = Utc::now();
        let start_time = Instant::now();

        tracing::info!(
            source = %source_dir.display(),
            dest = %dest_dir.display(),
            shards = ?shards,
            "starting extraction"
        );

        let (tx, rx) = crossbeam_channel::bounded(self.channel_capacity);

        let extractor = ShardExtractor::new(
            self.unpacker.clone(),
            source_dir.to_path_buf(),
            dest_dir.to_path_buf(),
            shards.to_vec(),
        )
        .with_progress_steps(self.progress_steps)
        .with_shutdown(self.shutdown.clone());
        let producer = task::spawn_blocking(move || extractor.run(&tx));

        let shutdown = self.shutdown.clone();
        let tick = self.tick;
        let (driven, outcome): (Result<()>, SinkOutcome) = task::spawn_blocking(move || {
            let driven = drive(&rx, sink.as_mut(), &shutdown, tick);
            (driven, sink.final_result())
        })
        .await
        .map_err(|e| ExtractError::Worker {
            message: format!("progress view failed: {}", e),
        })?;

        let cancelled = match driven {
            Ok(()) => {
                let attempted = producer.await.map_err(|e| ExtractError::Worker {
                    message: format!("extractor failed: {}", e),
                })?;
                tracing::debug!(attempted, "extractor finished");
                false
            }
            // the extractor notices the same flag and stops on its own
            Err(ExtractError::Cancelled) => true,
            Err(ExtractError::StreamClosed) => {
                return match producer.await {
                    Err(e) if e.is_panic() => Err(ExtractError::Worker {
                        message: "extractor panicked".to_string(),
                    }),
                    _ => Err(ExtractError::StreamClosed),
                };
            }
            Err(e) => return Err(e),
        };

        let report = RunReport {
            source_dir: source_dir.to_path_buf(),
            dest_dir: dest_dir.to_path_buf(),
            shards: shards.to_vec(),
            failures: outcome.failures,
            cancelled,
            presentation_error: outcome.presentation_error,
            started_at,
            duration: start_time.elapsed(),
        };

        tracing::info!(
            failed = report.failures.len(),
            cancelled = report.cancelled,
            "extraction finished"
        );

        Ok(report)
    }
}
