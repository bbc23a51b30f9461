use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::stream::{self, Stream};
use log::warn;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// In-process FIFO of submission ids waiting for analysis.
///
/// Enqueue never blocks and tolerates duplicates. Readers wait without
/// polling while the queue is empty and stop as soon as their token is
/// cancelled. Nothing survives a restart; the backfill scan covers that.
pub struct AnalysisQueue {
    items: Mutex<VecDeque<String>>,
    notify: Notify,
    warning_threshold: usize,
}

impl AnalysisQueue {
    pub fn new(warning_threshold: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            warning_threshold: warning_threshold.max(1),
        }
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<String>> {
        // A panic while holding the lock cannot leave the deque half-written.
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn enqueue(&self, submission_id: impl Into<String>) {
        let depth = {
            let mut items = self.items();
            items.push_back(submission_id.into());
            items.len()
        };
        self.notify.notify_one();

        if depth == self.warning_threshold + 1 {
            warn!(
                "Analysis queue depth {} exceeds warning threshold {}",
                depth, self.warning_threshold
            );
        }
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    fn try_pop(&self) -> Option<String> {
        self.items().pop_front()
    }

    /// Waits for the next id. Returns `None` once `cancel` fires.
    pub async fn next(&self, cancel: &CancellationToken) -> Option<String> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            if let Some(id) = self.try_pop() {
                // Pass the wake-up on in case more items are waiting.
                if !self.is_empty() {
                    self.notify.notify_one();
                }
                return Some(id);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                _ = self.notify.notified() => {}
            }
        }
    }

    /// Endless stream of ids that ends when `cancel` fires.
    pub fn dequeue(
        self: &Arc<Self>,
        cancel: CancellationToken,
    ) -> impl Stream<Item = String> + Send + 'static {
        stream::unfold((Arc::clone(self), cancel), |(queue, cancel)| async move {
            let id = queue.next(&cancel).await?;
            Some((id, (queue, cancel)))
        })
    }
}
