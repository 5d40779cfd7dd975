use crate::error::{ExtractError, Result};
use crate::extractor::{ProgressEvent, ShardFailure};
use crate::ui::GracefulShutdown;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::ops::ControlFlow;
use std::time::Duration;

/// A front-end that consumes the progress stream.
///
/// Implementations own a [`ProgressAggregator`](crate::ui::ProgressAggregator)
/// and differ only in presentation; the failures they report for a given
/// stream must be identical.
pub trait ProgressSink {
    /// Applies one event and renders it. Breaks once `Quit` has been applied.
    fn apply(&mut self, event: &ProgressEvent) -> ControlFlow<()>;

    /// Called when a redraw tick elapses without an event.
    fn idle(&mut self) {}

    fn final_result(self: Box<Self>) -> SinkOutcome;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SinkOutcome {
    pub failures: Vec<ShardFailure>,
    pub finished: bool,
    /// First rendering failure, if any. Never affects the run verdict.
    pub presentation_error: Option<String>,
}

/// Pumps events from `rx` into `sink` until `Quit` has been applied.
///
/// Waits at most `tick` between shutdown checks. Returns `Cancelled` when
/// shutdown is requested and `StreamClosed` when the producer disappears
/// without sending `Quit`.
pub fn drive(
    rx: &Receiver<ProgressEvent>,
    sink: &mut dyn ProgressSink,
    shutdown: &GracefulShutdown,
    tick: Duration,
) -> Result<()> {
    loop {
        shutdown.check_shutdown()?;

        match rx.recv_timeout(tick) {
            Ok(event) => {
                if sink.apply(&event).is_break() {
                    return Ok(());
                }
            }
            Err(RecvTimeoutError::Timeout) => sink.idle(),
            Err(RecvTimeoutError::Disconnected) => return Err(ExtractError::StreamClosed),
        }
    }
}
