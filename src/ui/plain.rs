use crate::extractor::ProgressEvent;
use crate::ui::aggregator::{ProgressAggregator, ProgressSnapshot};
use crate::ui::sink::{ProgressSink, SinkOutcome};
use std::io::{self, Write};
use std::ops::ControlFlow;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineStyle {
    Text,
    /// One JSON object per event, with the overall fraction attached.
    Json,
}

/// Appends one line per event; never moves the cursor.
pub struct PlainView<W: Write> {
    aggregator: ProgressAggregator,
    writer: W,
    style: LineStyle,
    presentation_error: Option<String>,
}

impl<W: Write> PlainView<W> {
    pub fn new(shards: &[u32], writer: W, style: LineStyle) -> Self {
        Self {
            aggregator: ProgressAggregator::new(shards),
            writer,
            style,
            presentation_error: None,
        }
    }

    fn write_event(&mut self, event: &ProgressEvent) -> io::Result<()> {
        let snapshot = self.aggregator.snapshot();
        let line = match self.style {
            LineStyle::Text => text_line(event, &snapshot),
            LineStyle::Json => json_line(event, &snapshot)?,
        };

        writeln!(self.writer, "{}", line)?;
        self.writer.flush()
    }
}

fn text_line(event: &ProgressEvent, snapshot: &ProgressSnapshot<'_>) -> String {
    match event {
        ProgressEvent::Progress { shard, fraction } => format!(
            "shard {}: {:>5.1}% (overall {:>5.1}%)",
            shard,
            fraction * 100.0,
            snapshot.overall() * 100.0
        ),
        ProgressEvent::ShardError { shard, error } => {
            format!("shard {}: FAILED: {}", shard, error)
        }
        ProgressEvent::Quit => format!(
            "done: {}/{} shard(s) extracted, {} failed",
            snapshot.completed(),
            snapshot.shards.len(),
            snapshot.errors.len()
        ),
    }
}

fn json_line(event: &ProgressEvent, snapshot: &ProgressSnapshot<'_>) -> io::Result<String> {
    let mut value = serde_json::to_value(event)?;
    if let Some(object) = value.as_object_mut() {
        object.insert("overall".to_string(), serde_json::json!(snapshot.overall()));
        if event.is_quit() {
            object.insert("failed".to_string(), serde_json::json!(snapshot.errors.len()));
        }
    }
    Ok(value.to_string())
}

impl<W: Write> ProgressSink for PlainView<W> {
    fn apply(&mut self, event: &ProgressEvent) -> ControlFlow<()> {
        self.aggregator.apply(event);

        if self.presentation_error.is_none() {
            if let Err(e) = self.write_event(event) {
                tracing::warn!(error = %e, "progress output failed, continuing without it");
                self.presentation_error = Some(format!("Failed to write progress: {}", e));
            }
        }

        if self.aggregator.is_finished() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn final_result(self: Box<Self>) -> SinkOutcome {
        let finished = self.aggregator.is_finished();
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

    fn scenario() -> Vec<ProgressEvent> {
        vec![
            ProgressEvent::progress(0, 0.0),
            ProgressEvent::progress(0, 1.0),
            ProgressEvent::progress(1, 0.0),
            ProgressEvent::shard_error(1, "archive missing"),
            ProgressEvent::progress(2, 0.0),
            ProgressEvent::progress(2, 1.0),
            ProgressEvent::Quit,
        ]
    }

    fn render(style: LineStyle) -> (String, SinkOutcome) {
        let mut buffer = Vec::new();
        let mut view = PlainView::new(&[0, 1, 2], &mut buffer, style);
        for event in scenario() {
            let _ = view.apply(&event);
        }
        let outcome = Box::new(view).final_result();
        (String::from_utf8(buffer).unwrap(), outcome)
    }

    #[test]
    fn test_text_lines() {
        let (output, outcome) = render(LineStyle::Text);
        let lines: Vec<_> = output.lines().collect();

        assert_eq!(lines.len(), 7);
        assert_eq!(lines[1], "shard 0: 100.0% (overall  33.3%)");
        assert_eq!(lines[3], "shard 1: FAILED: archive missing");
        assert_eq!(lines[6], "done: 2/3 shard(s) extracted, 1 failed");
        assert!(outcome.finished);
        assert_eq!(outcome.failures, vec![ShardFailure::new(1, "archive missing")]);
    }

    #[test]
    fn test_json_lines() {
        let (output, _) = render(LineStyle::Json);
        let values: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(values[3]["event"], "shard_error");
        assert_eq!(values[3]["shard"], 1);
        assert_eq!(values[6]["event"], "quit");
        assert_eq!(values[6]["failed"], 1);
        assert_eq!(values[6]["overall"], serde_json::json!(2.0 / 3.0));
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_does_not_change_outcome() {
        let mut view = PlainView::new(&[0, 1, 2], BrokenWriter, LineStyle::Text);
        let mut last = ControlFlow::Continue(());
        for event in scenario() {
            last = view.apply(&event);
        }

        assert!(last.is_break());
        let outcome = Box::new(view).final_result();
        assert!(outcome.presentation_error.is_some());
        assert_eq!(outcome.failures, vec![ShardFailure::new(1, "archive missing")]);
    }
}
