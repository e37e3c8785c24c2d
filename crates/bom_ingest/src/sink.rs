use std::sync::mpsc;

use crate::RunUpdate;

/// Subscriber for run updates. Called from the run task, one update at a time.
pub trait SnapshotSink: Send + Sync {
    fn publish(&self, update: RunUpdate);
}

impl<F> SnapshotSink for F
where
    F: Fn(RunUpdate) + Send + Sync,
{
    fn publish(&self, update: RunUpdate) {
        self(update)
    }
}

/// Forwards updates into a channel; a dropped receiver is ignored.
pub struct ChannelSink {
    tx: mpsc::Sender<RunUpdate>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<RunUpdate>) -> Self {
        Self { tx }
    }
}

impl SnapshotSink for ChannelSink {
    fn publish(&self, update: RunUpdate) {
        let _ = self.tx.send(update);
    }
}
