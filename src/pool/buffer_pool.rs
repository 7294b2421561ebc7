use crate::readback::MappedFrame;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Retention limits for idle frame buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BufferPoolOpts {
    /// Maximum bytes retained across all sizes.
    pub max_pool_bytes: usize,
    /// Maximum number of idle buffers retained per byte length.
    pub max_buffers_per_size: usize,
}

impl Default for BufferPoolOpts {
    fn default() -> Self {
        Self {
            max_pool_bytes: 512 * 1024 * 1024,
            max_buffers_per_size: 8,
        }
    }
}

/// Snapshot of pool counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BufferPoolStats {
    /// Idle buffers currently held by the pool.
    pub retained_buffers: usize,
    /// Bytes held by idle buffers.
    pub retained_bytes: usize,
    /// Buffers allocated because no same-size idle buffer existed.
    pub alloc_buffers: u64,
    /// Bytes allocated for those buffers.
    pub alloc_bytes: u64,
    /// Acquisitions served from an idle buffer.
    pub reuses: u64,
    /// Releases that freed the buffer instead of retaining it.
    pub dropped_on_release: u64,
    /// [`FrameBuffer`]s from this pool that are alive anywhere (idle, queued or in use).
    pub live_buffers: usize,
}

/// One frame's pixel bytes, exclusively owned by whichever stage holds it.
pub struct FrameBuffer {
    data: Vec<u8>,
    live: Arc<AtomicUsize>,
}

impl FrameBuffer {
    fn new(data: Vec<u8>, live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::Relaxed);
        Self {
            data,
            live: Arc::clone(live),
        }
    }
}

impl std::ops::Deref for FrameBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl std::ops::DerefMut for FrameBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("len", &self.data.len())
            .finish()
    }
}

impl Drop for FrameBuffer {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::Relaxed);
    }
}

#[derive(Default)]
struct PoolInner {
    // Keyed by byte length; fixed-resolution sessions only ever use one bucket.
    buckets: HashMap<usize, Vec<FrameBuffer>>,
    retained_buffers: usize,
    retained_bytes: usize,
    alloc_buffers: u64,
    alloc_bytes: u64,
    reuses: u64,
    dropped_on_release: u64,
}

/// Free-list of reusable frame buffers, shared by the copy and writer stages.
pub struct BufferPool {
    opts: BufferPoolOpts,
    inner: Mutex<PoolInner>,
    live: Arc<AtomicUsize>,
}

impl BufferPool {
    /// Create an empty pool.
    pub fn new(opts: BufferPoolOpts) -> Self {
        Self {
            opts,
            inner: Mutex::new(PoolInner::default()),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return a buffer holding the tightly packed pixels of `src`.
    ///
    /// An idle buffer of the packed length is reused when available, otherwise a new one is
    /// allocated. Row padding is stripped while copying, which runs outside the pool lock.
    pub fn acquire_copy<F: MappedFrame + ?Sized>(&self, src: &F) -> FrameBuffer {
        let len = src.len();
        let reused = {
            let mut inner = self.lock();
            let buf = inner.buckets.get_mut(&len).and_then(Vec::pop);
            if buf.is_some() {
                inner.retained_buffers = inner.retained_buffers.saturating_sub(1);
                inner.retained_bytes = inner.retained_bytes.saturating_sub(len);
                inner.reuses = inner.reuses.saturating_add(1);
            } else {
                inner.alloc_buffers = inner.alloc_buffers.saturating_add(1);
                inner.alloc_bytes = inner.alloc_bytes.saturating_add(len as u64);
            }
            buf
        };

        let mut buf = reused.unwrap_or_else(|| FrameBuffer::new(vec![0; len], &self.live));
        src.copy_into(&mut buf);
        buf
    }

    /// Hand a buffer back for reuse. The caller must hold no other reference to it.
    pub fn release(&self, buf: FrameBuffer) {
        let len = buf.len();
        let mut inner = self.lock();

        let over_caps = self.opts.max_pool_bytes == 0
            || self.opts.max_buffers_per_size == 0
            || inner.retained_bytes.saturating_add(len) > self.opts.max_pool_bytes
            || inner
                .buckets
                .get(&len)
                .is_some_and(|b| b.len() >= self.opts.max_buffers_per_size);
        if over_caps {
            inner.dropped_on_release = inner.dropped_on_release.saturating_add(1);
            drop(inner);
            drop(buf);
            return;
        }

        inner.buckets.entry(len).or_default().push(buf);
        inner.retained_buffers = inner.retained_buffers.saturating_add(1);
        inner.retained_bytes = inner.retained_bytes.saturating_add(len);
    }

    /// Snapshot the pool counters.
    pub fn stats(&self) -> BufferPoolStats {
        let inner = self.lock();
        BufferPoolStats {
            retained_buffers: inner.retained_buffers,
            retained_bytes: inner.retained_bytes,
            alloc_buffers: inner.alloc_buffers,
            alloc_bytes: inner.alloc_bytes,
            reuses: inner.reuses,
            dropped_on_release: inner.dropped_on_release,
            live_buffers: self.live.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pool/buffer_pool.rs"]
mod tests;
