use crate::foundation::error::{FramepipeError, FramepipeResult};
use crate::foundation::sync::WorkQueue;
use crate::pool::buffer_pool::{BufferPool, FrameBuffer};
use crate::stage::StageCounters;
use std::io::Write;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Writes pool buffers, in queue order, to the encoder input on a dedicated thread.
///
/// Write errors are counted and logged but never stop the loop; a dead encoder shows up in the
/// diagnostics returned at close. The input is dropped (closing the stream) when the thread
/// exits.
pub(crate) struct PipeWriterStage {
    queue: Arc<WorkQueue<FrameBuffer>>,
    handle: Option<JoinHandle<()>>,
}

impl PipeWriterStage {
    pub(crate) fn spawn<W>(
        input: W,
        pool: Arc<BufferPool>,
        counters: Arc<StageCounters>,
    ) -> FramepipeResult<Self>
    where
        W: Write + Send + 'static,
    {
        let queue: Arc<WorkQueue<FrameBuffer>> = Arc::new(WorkQueue::new());
        let worker_queue = Arc::clone(&queue);
        let handle = std::thread::Builder::new()
            .name("framepipe-pipe-writer".to_owned())
            .spawn(move || write_loop(input, &worker_queue, &pool, &counters))
            .map_err(|e| FramepipeError::encoder(format!("failed to start pipe writer: {e}")))?;

        Ok(Self {
            queue,
            handle: Some(handle),
        })
    }

    /// Queue handle for the copy stage.
    pub(crate) fn queue(&self) -> Arc<WorkQueue<FrameBuffer>> {
        Arc::clone(&self.queue)
    }

    pub(crate) fn depth(&self) -> usize {
        self.queue.depth()
    }

    /// Block until at most `max` buffers are queued or being written.
    pub(crate) fn wait_until_depth_at_most(&self, max: usize) -> bool {
        self.queue.wait_until_depth_at_most(max)
    }

    /// Write what is queued, close the input, then join the thread. Safe to call more than once.
    pub(crate) fn stop(&mut self) {
        self.queue.shutdown();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("pipe writer thread panicked");
        }
    }
}

impl Drop for PipeWriterStage {
    fn drop(&mut self) {
        self.stop();
    }
}

fn write_loop<W: Write>(
    mut input: W,
    queue: &WorkQueue<FrameBuffer>,
    pool: &BufferPool,
    counters: &StageCounters,
) {
    let _consumer = queue.consumer_guard();
    while let Some(buf) = queue.begin_next() {
        match input.write_all(&buf).and_then(|()| input.flush()) {
            Ok(()) => {
                StageCounters::bump(&counters.written);
            }
            Err(e) => {
                let failures = StageCounters::bump(&counters.write_failures);
                let err = FramepipeError::pipe_write(e.to_string());
                if failures == 1 {
                    tracing::warn!(error = %err, len = buf.len(), "encoder input write failed");
                } else {
                    tracing::debug!(error = %err, failures, "encoder input write failed");
                }
            }
        }
        pool.release(buf);
        queue.complete();
    }
    drop(input);
    tracing::debug!("pipe writer exiting");
}

#[cfg(test)]
#[path = "../../tests/unit/stage/pipe_writer.rs"]
mod tests;
