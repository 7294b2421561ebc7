//! Framepipe streams rendered frames into an external video encoder.
//!
//! Frames are read back from the GPU asynchronously, may complete out of order, and are written
//! to the encoder's stdin strictly in submission order as raw RGBA bytes:
//!
//! - Build a [`SessionConfig`]
//! - Start an [`EncoderSession`] over a [`ReadbackBackend`] (and optionally a custom [`Encoder`])
//! - Per rendered frame: [`EncoderSession::submit_frame`], then [`EncoderSession::flush`]
//! - Finish with [`EncoderSession::close`], which returns the encoder's diagnostic text
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Session configuration.
pub mod config;
/// Encoder invocation and encoder implementations.
pub mod encode;
/// Frame buffer pool.
pub mod pool;
/// Readback backend interface and implementations.
pub mod readback;
/// Encoder sessions and readback sequencing.
pub mod session;
pub(crate) mod stage;

pub use crate::foundation::core::{Fps, FrameSize, RGBA8_BYTES_PER_PIXEL, SeqNo};
pub use crate::foundation::error::{FramepipeError, FramepipeResult};

pub use crate::config::SessionConfig;
pub use crate::encode::Encoder;
pub use crate::encode::args::{
    EncoderArgs, EncoderPreset, MetadataTag, RejectReason, RejectedTag, build_encoder_args,
};
pub use crate::encode::ffmpeg::{FfmpegProcess, is_ffmpeg_on_path, locate_encoder};
pub use crate::encode::memory::{MemoryCapture, MemoryEncoder, MemoryInput};
pub use crate::pool::buffer_pool::{BufferPool, BufferPoolOpts, BufferPoolStats, FrameBuffer};
pub use crate::readback::cpu::{CpuReadback, CpuReadbackRequest};
#[cfg(feature = "gpu")]
pub use crate::readback::gpu::{WgpuFrame, WgpuReadback, WgpuReadbackRequest};
pub use crate::readback::{
    MappedFrame, PitchedFrame, ReadbackBackend, ReadbackError, ReadbackRequest,
};
pub use crate::session::encoder_session::{
    EncoderSession, SessionState, SessionStats, Submission,
};
pub use crate::session::sequencer::{DrainReport, PendingReadback, ReadbackSequencer};
