use crate::foundation::core::SeqNo;
use crate::foundation::error::{FramepipeError, FramepipeResult};
use crate::readback::{ReadbackError, ReadbackRequest};
use std::collections::VecDeque;

/// One outstanding readback, tagged with its submission number.
#[derive(Debug)]
pub struct PendingReadback<R> {
    seq: SeqNo,
    request: R,
}

impl<R> PendingReadback<R> {
    /// Submission number.
    pub fn seq(&self) -> SeqNo {
        self.seq
    }
}

/// Outcome of one drain pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Requests resolved with bytes.
    pub delivered: u64,
    /// Requests resolved with their error flag set.
    pub errored: u64,
    /// Times the head had to be waited on because a later request finished first.
    pub forced_waits: u64,
}

impl DrainReport {
    /// Requests resolved in this pass.
    pub fn resolved(&self) -> u64 {
        self.delivered + self.errored
    }
}

/// Outstanding readbacks in submission order.
///
/// Requests may complete in any order; they are always resolved in the order they were
/// registered. When the head is still running but something behind it already finished, the
/// head is waited on synchronously instead of letting the later frame overtake it.
#[derive(Debug)]
pub struct ReadbackSequencer<R> {
    pending: VecDeque<PendingReadback<R>>,
    max_in_flight: usize,
    next_seq: u64,
}

impl<R: ReadbackRequest> ReadbackSequencer<R> {
    /// Sequencer admitting at most `max_in_flight` outstanding requests.
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            pending: VecDeque::with_capacity(max_in_flight),
            max_in_flight,
            next_seq: 0,
        }
    }

    /// Number of outstanding requests.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// `true` when nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// `true` when a new request would be refused.
    pub fn is_full(&self) -> bool {
        self.pending.len() >= self.max_in_flight
    }

    /// Sequence numbers still outstanding, oldest first.
    pub fn pending_seqs(&self) -> impl Iterator<Item = SeqNo> + '_ {
        self.pending.iter().map(PendingReadback::seq)
    }

    /// Append `request` at the tail.
    ///
    /// Refused with [`FramepipeError::QueueOverflow`] when `max_in_flight` requests are already
    /// outstanding; the request is dropped.
    pub fn register(&mut self, request: R) -> FramepipeResult<SeqNo> {
        if self.is_full() {
            return Err(FramepipeError::QueueOverflow {
                max_in_flight: self.max_in_flight,
            });
        }
        let seq = SeqNo(self.next_seq);
        self.next_seq += 1;
        self.pending.push_back(PendingReadback { seq, request });
        Ok(seq)
    }

    /// Resolve every request that can be resolved in order without waiting, plus any earlier
    /// request standing in front of an already completed one.
    ///
    /// `deliver` receives each resolved request in submission order.
    pub fn drain_completed<F>(&mut self, mut deliver: F) -> DrainReport
    where
        F: FnMut(SeqNo, Result<R::Frame, ReadbackError>),
    {
        let mut report = DrainReport::default();
        loop {
            let Some((head, mut rest)) = split_head(&mut self.pending) else {
                break;
            };
            if !head.request.is_complete() {
                if !rest.any(|p| p.request.is_complete()) {
                    break;
                }
                tracing::debug!(seq = head.seq.0, "later readback finished first, waiting on head");
                head.request.wait();
                report.forced_waits += 1;
            }
            self.resolve_head(&mut report, &mut deliver);
        }
        report
    }

    /// Wait for and resolve every outstanding request, in order.
    pub fn drain_all<F>(&mut self, mut deliver: F) -> DrainReport
    where
        F: FnMut(SeqNo, Result<R::Frame, ReadbackError>),
    {
        let mut report = DrainReport::default();
        while let Some(head) = self.pending.front_mut() {
            if !head.request.is_complete() {
                head.request.wait();
            }
            self.resolve_head(&mut report, &mut deliver);
        }
        report
    }

    fn resolve_head<F>(&mut self, report: &mut DrainReport, deliver: &mut F)
    where
        F: FnMut(SeqNo, Result<R::Frame, ReadbackError>),
    {
        let Some(PendingReadback { seq, request }) = self.pending.pop_front() else {
            return;
        };
        let result = request.finish();
        match &result {
            Ok(_) => report.delivered += 1,
            Err(e) => {
                report.errored += 1;
                tracing::warn!(seq = seq.0, error = %FramepipeError::from(e.clone()), "dropping frame");
            }
        }
        deliver(seq, result);
    }
}

fn split_head<T>(
    pending: &mut VecDeque<T>,
) -> Option<(&mut T, std::collections::vec_deque::IterMut<'_, T>)> {
    let mut iter = pending.iter_mut();
    let head = iter.next()?;
    Some((head, iter))
}

#[cfg(test)]
#[path = "../../tests/unit/session/sequencer.rs"]
mod tests;
