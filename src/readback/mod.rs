//! Asynchronous GPU→CPU readback interface.
//!
//! The session only needs three capabilities from a graphics backend: issue a readback for a
//! rendered surface, poll whether it finished, and block until it finishes. Everything else
//! (staging buffers, fences, map callbacks) stays inside the backend.

/// CPU-side backend over host byte buffers.
pub mod cpu;
/// wgpu texture readback (`gpu` feature).
#[cfg(feature = "gpu")]
pub mod gpu;

#[cfg(test)]
#[path = "../../tests/unit/readback/frame.rs"]
mod tests;

/// Error reported by a backend for one failed readback.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct ReadbackError {
    reason: String,
}

impl ReadbackError {
    /// Create an error with a human-readable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// The reason given by the backend.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Pixel data of one completed readback.
///
/// The value is transient: the backend may reclaim the underlying storage (unmap a staging
/// buffer, recycle host memory) as soon as it is dropped. The copy stage copies it into a
/// pool-owned buffer first, stripping any row padding on the way.
pub trait MappedFrame: Send {
    /// Length of the tightly packed RGBA8 data, without row padding.
    fn len(&self) -> usize;

    /// `true` when the frame holds no pixels.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the tightly packed rows into `dst`, which is exactly [`MappedFrame::len`] bytes.
    fn copy_into(&self, dst: &mut [u8]);
}

impl MappedFrame for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn copy_into(&self, dst: &mut [u8]) {
        dst.copy_from_slice(self);
    }
}

impl MappedFrame for Vec<u8> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn copy_into(&self, dst: &mut [u8]) {
        dst.copy_from_slice(self);
    }
}

impl MappedFrame for Box<[u8]> {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn copy_into(&self, dst: &mut [u8]) {
        dst.copy_from_slice(self);
    }
}

impl<const N: usize> MappedFrame for [u8; N] {
    fn len(&self) -> usize {
        N
    }

    fn copy_into(&self, dst: &mut [u8]) {
        dst.copy_from_slice(self);
    }
}

/// Host-memory frame whose rows are `pitch` bytes apart, of which the first `row_bytes` are
/// pixels (the layout of a GPU staging buffer).
#[derive(Debug, Clone)]
pub struct PitchedFrame {
    data: Vec<u8>,
    row_bytes: usize,
    pitch: usize,
}

impl PitchedFrame {
    /// Wrap `data` laid out as rows of `pitch` bytes, each starting with `row_bytes` pixel bytes.
    pub fn new(data: Vec<u8>, row_bytes: usize, pitch: usize) -> Result<Self, ReadbackError> {
        if row_bytes > pitch || (pitch > 0 && !data.len().is_multiple_of(pitch)) {
            return Err(ReadbackError::new(format!(
                "row layout {row_bytes}/{pitch} does not fit {} bytes",
                data.len()
            )));
        }
        Ok(Self {
            data,
            row_bytes,
            pitch,
        })
    }
}

impl MappedFrame for PitchedFrame {
    fn len(&self) -> usize {
        packed_len(self.data.len(), self.row_bytes, self.pitch)
    }

    fn copy_into(&self, dst: &mut [u8]) {
        copy_unpadded_rows(&self.data, self.row_bytes, self.pitch, dst);
    }
}

pub(crate) fn packed_len(padded_len: usize, row_bytes: usize, pitch: usize) -> usize {
    if pitch == 0 {
        return 0;
    }
    padded_len / pitch * row_bytes
}

/// Copy `row_bytes` out of every `pitch`-sized row of `src` into consecutive rows of `dst`.
pub(crate) fn copy_unpadded_rows(src: &[u8], row_bytes: usize, pitch: usize, dst: &mut [u8]) {
    if dst.is_empty() {
        return;
    }
    if row_bytes == pitch {
        dst.copy_from_slice(&src[..dst.len()]);
        return;
    }
    for (out, row) in dst.chunks_exact_mut(row_bytes).zip(src.chunks(pitch)) {
        out.copy_from_slice(&row[..row_bytes]);
    }
}

/// One outstanding readback.
pub trait ReadbackRequest: Send {
    /// Bytes handed over once the request completed.
    type Frame: MappedFrame + 'static;

    /// Non-blocking completion check.
    fn is_complete(&mut self) -> bool;

    /// Block until the request is complete.
    ///
    /// After this returns, [`ReadbackRequest::is_complete`] must report `true`.
    fn wait(&mut self);

    /// Consume a completed request, yielding its bytes or the backend's error flag.
    fn finish(self) -> Result<Self::Frame, ReadbackError>;
}

/// A graphics backend able to copy rendered surfaces back to the CPU asynchronously.
pub trait ReadbackBackend {
    /// What the renderer hands over per frame (a texture, a host buffer, ...).
    type Surface: ?Sized;
    /// Request handle type.
    type Request: ReadbackRequest;

    /// Whether asynchronous readback works on the current device.
    fn supports_async_readback(&self) -> bool;

    /// Issue a readback of `surface`.
    ///
    /// An immediate failure is treated like a request that completed with its error flag set.
    fn request_readback(&mut self, surface: &Self::Surface)
    -> Result<Self::Request, ReadbackError>;
}
