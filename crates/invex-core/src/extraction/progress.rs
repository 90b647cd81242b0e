//! Progress reporting and cancellation shared with the host.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

use tracing::trace;

/// Receives human-readable progress messages.
///
/// Implementations must not block; the pipeline calls `report` between
/// generation calls.
pub trait ProgressSink {
    fn report(&self, message: &str);
}

/// Discards all messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _message: &str) {}
}

impl<F: Fn(&str)> ProgressSink for F {
    fn report(&self, message: &str) {
        self(message)
    }
}

/// Bounded channel sink. Messages are dropped while the channel is full
/// or after the receiver is gone.
impl ProgressSink for SyncSender<String> {
    fn report(&self, message: &str) {
        match self.try_send(message.to_string()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => trace!("Progress channel full, dropped: {}", message),
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Create a bounded progress channel.
pub fn progress_channel(capacity: usize) -> (SyncSender<String>, Receiver<String>) {
    mpsc::sync_channel(capacity)
}

/// Shared flag for cooperative cancellation.
///
/// The pipeline checks it before every stage; a stage already in flight
/// runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    #[test]
    fn test_closure_sink() {
        let seen = RefCell::new(Vec::new());
        let sink = |m: &str| seen.borrow_mut().push(m.to_string());
        sink.report("one");
        sink.report("two");
        assert_eq!(seen.into_inner(), vec!["one", "two"]);
    }

    #[test]
    fn test_channel_drops_when_full() {
        let (tx, rx) = progress_channel(1);
        tx.report("first");
        tx.report("second");
        drop(tx);
        assert_eq!(rx.iter().collect::<Vec<_>>(), vec!["first"]);
    }

    #[test]
    fn test_disconnected_channel_is_ignored() {
        let (tx, rx) = progress_channel(4);
        drop(rx);
        tx.report("nobody listening");
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let handle = flag.clone();
        assert!(!flag.is_cancelled());
        handle.cancel();
        assert!(flag.is_cancelled());
    }
}
