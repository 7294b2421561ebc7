//! Condition-variable guarded work queue shared by the pipeline stages.
//!
//! Each queue has exactly one producer side and one consumer thread. The consumer takes the head
//! with [`WorkQueue::begin_next`] and acknowledges it with [`WorkQueue::complete`]; until then the
//! item still counts towards [`WorkQueue::depth`]. Waiters in
//! [`WorkQueue::wait_until_depth_at_most`] are therefore only released once the work is actually
//! finished, not merely dequeued.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

struct QueueState<T> {
    items: VecDeque<T>,
    // Taken by the consumer but not yet completed.
    active: usize,
    shutdown: bool,
    consumer_gone: bool,
}

pub(crate) struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    // Consumer side: new work or shutdown.
    wake: Condvar,
    // Producer side: an item completed or the consumer went away.
    progress: Condvar,
}

impl<T> WorkQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                active: 0,
                shutdown: false,
                consumer_gone: false,
            }),
            wake: Condvar::new(),
            progress: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `item` and wake the consumer.
    ///
    /// Hands the item back when the consumer thread is gone, so the caller decides how to
    /// dispose of it.
    pub(crate) fn push(&self, item: T) -> Result<(), T> {
        let mut st = self.lock();
        if st.consumer_gone {
            return Err(item);
        }
        st.items.push_back(item);
        drop(st);
        self.wake.notify_one();
        Ok(())
    }

    /// Block until an item is available and take it, leaving it counted as in progress.
    ///
    /// Returns `None` once shutdown was requested and nothing is left to take.
    pub(crate) fn begin_next(&self) -> Option<T> {
        let mut st = self.lock();
        loop {
            if let Some(item) = st.items.pop_front() {
                st.active += 1;
                return Some(item);
            }
            if st.shutdown {
                return None;
            }
            st = self.wake.wait(st).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Acknowledge the item taken by the last [`WorkQueue::begin_next`].
    pub(crate) fn complete(&self) {
        let mut st = self.lock();
        st.active = st.active.saturating_sub(1);
        drop(st);
        self.progress.notify_all();
    }

    /// Queued plus in-progress items.
    pub(crate) fn depth(&self) -> usize {
        let st = self.lock();
        st.items.len() + st.active
    }

    /// Block until `depth() <= max`, or until the consumer is gone.
    ///
    /// Returns `true` when the call had to wait.
    pub(crate) fn wait_until_depth_at_most(&self, max: usize) -> bool {
        let mut st = self.lock();
        let mut waited = false;
        while st.items.len() + st.active > max && !st.consumer_gone {
            waited = true;
            st = self.progress.wait(st).unwrap_or_else(PoisonError::into_inner);
        }
        waited
    }

    /// Ask the consumer to exit once the queue is empty.
    pub(crate) fn shutdown(&self) {
        self.lock().shutdown = true;
        self.wake.notify_all();
    }

    /// Mark the calling thread as this queue's consumer for the guard's lifetime.
    ///
    /// When the guard drops (normal exit or panic) queued items are discarded, later pushes are
    /// refused and every depth waiter is released.
    pub(crate) fn consumer_guard(&self) -> ConsumerGuard<'_, T> {
        ConsumerGuard { queue: self }
    }
}

pub(crate) struct ConsumerGuard<'a, T> {
    queue: &'a WorkQueue<T>,
}

impl<T> Drop for ConsumerGuard<'_, T> {
    fn drop(&mut self) {
        let leftover = {
            let mut st = self.queue.lock();
            st.consumer_gone = true;
            st.active = 0;
            std::mem::take(&mut st.items)
        };
        self.queue.progress.notify_all();
        if !leftover.is_empty() {
            tracing::warn!(
                discarded = leftover.len(),
                "stage exited with work still queued"
            );
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/sync.rs"]
mod tests;
