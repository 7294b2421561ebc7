use crate::foundation::error::{FramepipeError, FramepipeResult};
use crate::foundation::sync::WorkQueue;
use crate::pool::buffer_pool::{BufferPool, FrameBuffer};
use crate::readback::MappedFrame;
use crate::stage::StageCounters;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Copies mapped frames into pool-owned buffers on a dedicated thread.
///
/// The mapped frame stays at the head of the copy queue (and counts towards its depth) until its
/// copy has been handed to the pipe queue; only then is the mapping dropped.
pub(crate) struct CopyStage {
    queue: Arc<WorkQueue<Box<dyn MappedFrame>>>,
    handle: Option<JoinHandle<()>>,
}

impl CopyStage {
    pub(crate) fn spawn(
        pool: Arc<BufferPool>,
        pipe: Arc<WorkQueue<FrameBuffer>>,
        counters: Arc<StageCounters>,
    ) -> FramepipeResult<Self> {
        let queue: Arc<WorkQueue<Box<dyn MappedFrame>>> = Arc::new(WorkQueue::new());
        let worker_queue = Arc::clone(&queue);
        let handle = std::thread::Builder::new()
            .name("framepipe-copy".to_owned())
            .spawn(move || copy_loop(&worker_queue, &pool, &pipe, &counters))
            .map_err(|e| FramepipeError::encoder(format!("failed to start copy stage: {e}")))?;

        Ok(Self {
            queue,
            handle: Some(handle),
        })
    }

    /// Queue a mapped frame. Returns `false` when the stage thread is gone and the frame was
    /// dropped.
    pub(crate) fn enqueue(&self, frame: Box<dyn MappedFrame>) -> bool {
        self.queue.push(frame).is_ok()
    }

    pub(crate) fn depth(&self) -> usize {
        self.queue.depth()
    }

    /// Block until every queued frame has been copied and handed on.
    pub(crate) fn wait_idle(&self) -> bool {
        self.queue.wait_until_depth_at_most(0)
    }

    /// Finish what is queued, then join the thread. Safe to call more than once.
    pub(crate) fn stop(&mut self) {
        self.queue.shutdown();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("copy stage thread panicked");
        }
    }
}

impl Drop for CopyStage {
    fn drop(&mut self) {
        self.stop();
    }
}

fn copy_loop(
    queue: &WorkQueue<Box<dyn MappedFrame>>,
    pool: &BufferPool,
    pipe: &WorkQueue<FrameBuffer>,
    counters: &StageCounters,
) {
    let _consumer = queue.consumer_guard();
    while let Some(frame) = queue.begin_next() {
        let buf = pool.acquire_copy(&*frame);
        StageCounters::bump(&counters.copied);
        if let Err(buf) = pipe.push(buf) {
            let n = StageCounters::bump(&counters.discarded);
            tracing::debug!(discarded = n, "pipe writer gone, dropping copied frame");
            pool.release(buf);
        }
        drop(frame);
        queue.complete();
    }
    tracing::debug!("copy stage exiting");
}

#[cfg(test)]
#[path = "../../tests/unit/stage/copy.rs"]
mod tests;
