use crate::readback::{PitchedFrame, ReadbackBackend, ReadbackError, ReadbackRequest};

/// Readback backend whose surfaces are host byte slices.
///
/// Used by the CLI for software-rendered frames and by tests. A non-zero completion delay makes
/// each request report "not complete" for that many polls, which mimics a GPU that finishes work
/// a few ticks after submission. A row layout makes the staging copy keep padded rows, the way a
/// GPU copy aligns them.
#[derive(Debug, Clone, Default)]
pub struct CpuReadback {
    completion_delay: u32,
    row_layout: Option<(usize, usize)>,
}

impl CpuReadback {
    /// Backend whose requests complete immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose requests complete after `polls` unsuccessful completion checks.
    pub fn with_completion_delay(polls: u32) -> Self {
        Self {
            completion_delay: polls,
            row_layout: None,
        }
    }

    /// Stage surfaces as rows of `row_bytes` pixel bytes spaced `pitch` bytes apart.
    pub fn with_row_layout(mut self, row_bytes: usize, pitch: usize) -> Self {
        self.row_layout = Some((row_bytes, pitch));
        self
    }
}

impl ReadbackBackend for CpuReadback {
    type Surface = [u8];
    type Request = CpuReadbackRequest;

    fn supports_async_readback(&self) -> bool {
        true
    }

    fn request_readback(&mut self, surface: &[u8]) -> Result<CpuReadbackRequest, ReadbackError> {
        if surface.is_empty() {
            return Err(ReadbackError::new("cannot read back an empty surface"));
        }
        let frame = match self.row_layout {
            None => PitchedFrame::new(surface.to_vec(), surface.len(), surface.len())?,
            Some((row_bytes, pitch)) => {
                if row_bytes == 0
                    || pitch < row_bytes
                    || !surface.len().is_multiple_of(row_bytes)
                {
                    return Err(ReadbackError::new(format!(
                        "surface of {} bytes does not fit rows of {row_bytes}/{pitch} bytes",
                        surface.len()
                    )));
                }
                let mut staged = vec![0; surface.len() / row_bytes * pitch];
                for (dst, row) in staged
                    .chunks_exact_mut(pitch)
                    .zip(surface.chunks_exact(row_bytes))
                {
                    dst[..row_bytes].copy_from_slice(row);
                }
                PitchedFrame::new(staged, row_bytes, pitch)?
            }
        };
        Ok(CpuReadbackRequest {
            frame,
            remaining_polls: self.completion_delay,
        })
    }
}

/// Pending readback issued by [`CpuReadback`].
#[derive(Debug)]
pub struct CpuReadbackRequest {
    frame: PitchedFrame,
    remaining_polls: u32,
}

impl ReadbackRequest for CpuReadbackRequest {
    type Frame = PitchedFrame;

    fn is_complete(&mut self) -> bool {
        if self.remaining_polls == 0 {
            return true;
        }
        self.remaining_polls -= 1;
        false
    }

    fn wait(&mut self) {
        self.remaining_polls = 0;
    }

    fn finish(self) -> Result<PitchedFrame, ReadbackError> {
        Ok(self.frame)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/readback/cpu.rs"]
mod tests;
