//! External encoder side of the pipeline.
//!
//! An [`Encoder`] hands out a byte sink for raw RGBA frames and, once that sink is closed,
//! reports its diagnostic output.

use crate::foundation::error::FramepipeResult;
use std::io::Write;

/// Encoder argument construction, presets and metadata.
pub mod args;
/// `ffmpeg` subprocess encoder.
pub mod ffmpeg;
/// In-memory encoder for tests and debugging.
pub mod memory;

/// Something that consumes a raw frame stream.
///
/// Contract: [`Encoder::take_input`] is called once, the returned writer is moved to the pipe
/// writer thread and dropped when the stream ends, then [`Encoder::finish`] is called exactly
/// once.
pub trait Encoder: Send + 'static {
    /// Byte sink for frame data (the subprocess stdin for [`ffmpeg::FfmpegProcess`]).
    type Input: Write + Send + 'static;

    /// Take the input end of the stream.
    fn take_input(&mut self) -> FramepipeResult<Self::Input>;

    /// Wait for the encoder to finish and return its diagnostic text (possibly empty).
    fn finish(self) -> FramepipeResult<String>;
}
