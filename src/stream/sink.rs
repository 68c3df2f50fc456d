use crate::diff::Diff;
use crate::error::StoreError;
use crate::store::RecordStore;
use crate::stream::Sink;
use tracing::debug;

/// Streaming commit terminal. Every incoming diff is enqueued for
/// asynchronous apply (accepted-for-apply only, no per-item guarantee), and
/// after every `watermark`-th accepted diff the sink blocks on the store
/// barrier until the queue has drained, bounding in-flight asynchronous
/// mutations to the watermark.
///
/// Finalize performs one last barrier wait and returns the accepted count.
pub struct CommitSink<'a> {
    store: &'a dyn RecordStore,
    watermark: usize,
    accepted: u64,
    since_barrier: usize,
}

impl<'a> CommitSink<'a> {
    pub fn new(store: &'a dyn RecordStore, watermark: usize) -> Self {
        Self {
            store,
            watermark: watermark.max(1),
            accepted: 0,
            since_barrier: 0,
        }
    }
}

impl Sink<Diff> for CommitSink<'_> {
    type Out = u64;

    fn on_data(&mut self, diff: Diff) -> Result<(), StoreError> {
        self.store.commit_async(diff)?;
        self.accepted += 1;
        self.since_barrier += 1;
        if self.since_barrier >= self.watermark {
            debug!(accepted = self.accepted, "watermark reached, waiting on barrier");
            self.store.barrier()?;
            self.since_barrier = 0;
        }
        Ok(())
    }

    fn on_run(&mut self) -> Result<u64, StoreError> {
        self.store.barrier()?;
        debug!(accepted = self.accepted, "streaming commit finished");
        Ok(self.accepted)
    }
}
