use crate::extractor::ProgressEvent;
use crate::ui::aggregator::{ProgressAggregator, ProgressSnapshot};
use crate::ui::progress::{fraction_to_ticks, overall_bar_style, shard_bar_style, BAR_TICKS};
use crate::ui::sink::{ProgressSink, SinkOutcome};
use console::style;
use indicatif::{MultiProgress, ProgressBar};
use std::ops::ControlFlow;
use std::time::Duration;

/// Redraws one bar per shard plus an overall bar on every event.
pub struct InteractiveView {
    aggregator: ProgressAggregator,
    multi_progress: MultiProgress,
    shard_bars: Vec<(u32, ProgressBar)>,
    overall: ProgressBar,
    presentation_error: Option<String>,
}

impl InteractiveView {
    pub fn new(shards: &[u32], multi_progress: MultiProgress) -> Self {
        let shard_bars = shards
            .iter()
            .map(|&shard| {
                let bar = multi_progress.add(ProgressBar::new(BAR_TICKS));
                bar.set_style(shard_bar_style());
                bar.set_prefix(format!("shard {}", shard));
                bar.set_message("waiting");
                (shard, bar)
            })
            .collect();

        let overall = multi_progress.add(ProgressBar::new(BAR_TICKS));
        overall.set_style(overall_bar_style());
        overall.set_message(format!("0/{} shards", shards.len()));
        overall.enable_steady_tick(Duration::from_millis(100));

        Self {
            aggregator: ProgressAggregator::new(shards),
            multi_progress,
            shard_bars,
            overall,
            presentation_error: None,
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot<'_> {
        self.aggregator.snapshot()
    }

    pub fn shard_position(&self, shard: u32) -> Option<u64> {
        self.shard_bars
            .iter()
            .find(|(s, _)| *s == shard)
            .map(|(_, bar)| bar.position())
    }

    pub fn overall_position(&self) -> u64 {
        self.overall.position()
    }

    fn render(&self) {
        let snapshot = self.aggregator.snapshot();

        for (shard, bar) in &self.shard_bars {
            if bar.is_finished() {
                continue;
            }
            let fraction = snapshot.fraction(*shard);
            if snapshot.fractions.contains_key(shard) {
                bar.set_position(fraction_to_ticks(fraction));
                bar.set_message(if fraction >= 1.0 { "extracted" } else { "extracting" });
            }
        }

        self.overall.set_position(fraction_to_ticks(snapshot.overall()));
        self.overall.set_message(format!(
            "{}/{} shards",
            snapshot.completed(),
            snapshot.shards.len()
        ));
    }

    fn report_failure(&mut self, shard: u32, error: &str) {
        if let Some((_, bar)) = self.shard_bars.iter().find(|(s, _)| *s == shard) {
            bar.abandon_with_message(style("failed").red().to_string());
        }

        let line = format!("{} shard {}: {}", style("✗").red(), shard, error);
        if let Err(e) = self.multi_progress.println(line) {
            self.presentation_error
                .get_or_insert_with(|| format!("Failed to draw progress: {}", e));
        }
    }

    fn finish_bars(&self) {
        let snapshot = self.aggregator.snapshot();
        for (shard, bar) in &self.shard_bars {
            if !bar.is_finished() && !snapshot.has_failed(*shard) {
                bar.finish_with_message("extracted");
            }
        }

        let summary = if snapshot.errors.is_empty() {
            style("all shards extracted").green().to_string()
        } else {
            style(format!("{} shard(s) failed", snapshot.errors.len()))
                .red()
                .to_string()
        };
        self.overall.finish_with_message(summary);
    }

    fn abandon_bars(&self) {
        for (_, bar) in &self.shard_bars {
            if !bar.is_finished() {
                bar.abandon_with_message("interrupted");
            }
        }
        self.overall
            .abandon_with_message(style("interrupted").yellow().to_string());
    }
}

impl ProgressSink for InteractiveView {
    fn apply(&mut self, event: &ProgressEvent) -> ControlFlow<()> {
        self.aggregator.apply(event);

        if let ProgressEvent::ShardError { shard, error } = event {
            self.report_failure(*shard, error);
        }
        self.render();

        if self.aggregator.is_finished() {
            self.finish_bars();
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn final_result(self: Box<Self>) -> SinkOutcome {
        let finished = self.aggregator.is_finished();
        if !finished {
            self.abandon_bars();
        }

        SinkOutcome {
            failures: self.aggregator.into_failures(),
            finished,
            presentation_error: self.presentation_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::ShardFailure;
    use indicatif::ProgressDrawTarget;

    fn hidden_view(shards: &[u32]) -> InteractiveView {
        InteractiveView::new(
            shards,
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
        )
    }

    #[test]
    fn test_bars_track_progress() {
        let mut view = hidden_view(&[0, 1]);

        assert!(view.apply(&ProgressEvent::progress(0, 0.5)).is_continue());
        assert_eq!(view.shard_position(0), Some(500));
        assert_eq!(view.shard_position(1), Some(0));
        assert_eq!(view.overall_position(), 250);

        let _ = view.apply(&ProgressEvent::progress(0, 1.0));
        let _ = view.apply(&ProgressEvent::progress(1, 1.0));
        assert_eq!(view.overall_position(), BAR_TICKS);
    }

    #[test]
    fn test_quit_breaks_and_reports_failures() {
        let mut view = hidden_view(&[0, 1, 2]);
        for event in [
            ProgressEvent::progress(0, 1.0),
            ProgressEvent::shard_error(1, "archive missing"),
            ProgressEvent::progress(2, 1.0),
        ] {
            assert!(view.apply(&event).is_continue());
        }
        assert!(view.apply(&ProgressEvent::Quit).is_break());
        assert_eq!(view.snapshot().completed(), 2);

        let outcome = Box::new(view).final_result();
        assert!(outcome.finished);
        assert_eq!(outcome.failures, vec![ShardFailure::new(1, "archive missing")]);
        assert!(outcome.presentation_error.is_none());
    }

    #[test]
    fn test_unfinished_view_reports_partial_failures() {
        let mut view = hidden_view(&[0, 1]);
        let _ = view.apply(&ProgressEvent::shard_error(0, "boom"));

        let outcome = Box::new(view).final_result();
        assert!(!outcome.finished);
        assert_eq!(outcome.failures.len(), 1);
    }
}
