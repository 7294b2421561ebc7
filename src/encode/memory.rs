use crate::encode::Encoder;
use crate::foundation::error::{FramepipeError, FramepipeResult};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct CaptureState {
    frames: Vec<Vec<u8>>,
    partial: Vec<u8>,
    paused: bool,
    permits: usize,
    failing: bool,
    input_closed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<CaptureState>,
    resumed: Condvar,
    writes_started: AtomicUsize,
    writes_finished: AtomicUsize,
    finish_calls: AtomicUsize,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, CaptureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Encoder that keeps the byte stream in memory.
///
/// Each `flush` on the input closes one frame, so [`MemoryCapture::frames`] shows the stream
/// split the way the pipe writer delivered it. The capture handle can also stall or fail the
/// input to imitate a slow or crashed encoder.
#[derive(Debug)]
pub struct MemoryEncoder {
    shared: Arc<Shared>,
    input_taken: bool,
    diagnostics: String,
}

/// Observer/controller handle for a [`MemoryEncoder`].
#[derive(Debug, Clone)]
pub struct MemoryCapture {
    shared: Arc<Shared>,
}

/// Input end of a [`MemoryEncoder`].
#[derive(Debug)]
pub struct MemoryInput {
    shared: Arc<Shared>,
}

impl MemoryEncoder {
    /// Create an encoder and the handle used to inspect it.
    pub fn new() -> (Self, MemoryCapture) {
        let shared = Arc::new(Shared::default());
        (
            Self {
                shared: Arc::clone(&shared),
                input_taken: false,
                diagnostics: String::new(),
            },
            MemoryCapture { shared },
        )
    }

    /// Text returned by `finish`.
    pub fn with_diagnostics(mut self, diagnostics: impl Into<String>) -> Self {
        self.diagnostics = diagnostics.into();
        self
    }
}

impl Encoder for MemoryEncoder {
    type Input = MemoryInput;

    fn take_input(&mut self) -> FramepipeResult<MemoryInput> {
        if self.input_taken {
            return Err(FramepipeError::encoder("encoder input was already taken"));
        }
        self.input_taken = true;
        Ok(MemoryInput {
            shared: Arc::clone(&self.shared),
        })
    }

    fn finish(self) -> FramepipeResult<String> {
        self.shared.finish_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.diagnostics)
    }
}

impl io::Write for MemoryInput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.shared.writes_started.fetch_add(1, Ordering::SeqCst);
        let mut st = self.shared.lock();
        while st.paused && st.permits == 0 && !st.failing {
            st = self
                .shared
                .resumed
                .wait(st)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if st.failing {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "encoder input closed"));
        }
        if st.paused {
            st.permits -= 1;
        }
        st.partial.extend_from_slice(buf);
        self.shared.writes_finished.fetch_add(1, Ordering::SeqCst);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut st = self.shared.lock();
        if st.failing {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "encoder input closed"));
        }
        if !st.partial.is_empty() {
            let frame = std::mem::take(&mut st.partial);
            st.frames.push(frame);
        }
        Ok(())
    }
}

impl Drop for MemoryInput {
    fn drop(&mut self) {
        let mut st = self.shared.lock();
        if !st.partial.is_empty() {
            let frame = std::mem::take(&mut st.partial);
            st.frames.push(frame);
        }
        st.input_closed = true;
    }
}

impl MemoryCapture {
    /// Frames received so far, in arrival order.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.shared.lock().frames.clone()
    }

    /// Number of frames received so far.
    pub fn frame_count(&self) -> usize {
        self.shared.lock().frames.len()
    }

    /// Make writes block until [`MemoryCapture::resume`].
    pub fn pause(&self) {
        self.shared.lock().paused = true;
    }

    /// Release blocked writes.
    pub fn resume(&self) {
        self.shared.lock().paused = false;
        self.shared.resumed.notify_all();
    }

    /// Let `n` more writes through while paused. Every write takes its whole buffer, so one
    /// permit passes one frame.
    pub fn step(&self, n: usize) {
        let mut st = self.shared.lock();
        st.permits = st.permits.saturating_add(n);
        drop(st);
        self.shared.resumed.notify_all();
    }

    /// Number of writes that completed (stepped or unpaused).
    pub fn writes_finished(&self) -> usize {
        self.shared.writes_finished.load(Ordering::SeqCst)
    }

    /// Make every write and flush fail with `BrokenPipe`, as if the encoder had exited.
    pub fn fail_writes(&self) {
        self.shared.lock().failing = true;
        self.shared.resumed.notify_all();
    }

    /// Number of `write` calls that have started, including blocked ones.
    pub fn writes_started(&self) -> usize {
        self.shared.writes_started.load(Ordering::SeqCst)
    }

    /// Whether the input end has been dropped.
    pub fn input_closed(&self) -> bool {
        self.shared.lock().input_closed
    }

    /// Number of times `finish` ran.
    pub fn finish_calls(&self) -> usize {
        self.shared.finish_calls.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/memory.rs"]
mod tests;
