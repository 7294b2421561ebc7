//! Background stages between the readback sequencer and the encoder input.
//!
//! Mapped frames go through [`copy::CopyStage`] into pool buffers, which
//! [`pipe_writer::PipeWriterStage`] writes to the encoder and hands back to the pool. Each stage
//! owns one [`crate::foundation::sync::WorkQueue`] and one dedicated thread.

use std::sync::atomic::{AtomicU64, Ordering};

pub(crate) mod copy;
pub(crate) mod pipe_writer;

/// Counters updated by the stage threads.
#[derive(Debug, Default)]
pub(crate) struct StageCounters {
    pub(crate) copied: AtomicU64,
    pub(crate) discarded: AtomicU64,
    pub(crate) written: AtomicU64,
    pub(crate) write_failures: AtomicU64,
}

impl StageCounters {
    pub(crate) fn bump(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
