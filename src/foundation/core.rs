use crate::foundation::error::{FramepipeError, FramepipeResult};

/// Bytes per pixel of the wire format (interleaved 8-bit RGBA).
pub const RGBA8_BYTES_PER_PIXEL: usize = 4;

/// Monotonic submission sequence number of a frame.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct SeqNo(pub u64);

impl std::fmt::Display for SeqNo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32, // must be > 0
}

impl Fps {
    /// Create a validated frame rate.
    pub fn new(num: u32, den: u32) -> FramepipeResult<Self> {
        if den == 0 {
            return Err(FramepipeError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(FramepipeError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Whole-number frame rate (`num/1`).
    pub fn whole(num: u32) -> Self {
        Self { num, den: 1 }
    }

    /// Frame rate as a floating point value.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Render as an ffmpeg rate argument (`30` or `30000/1001`).
    pub fn to_arg(self) -> String {
        if self.den == 1 {
            self.num.to_string()
        } else {
            format!("{}/{}", self.num, self.den)
        }
    }
}

impl Default for Fps {
    fn default() -> Self {
        Self::whole(30)
    }
}

/// Pixel dimensions of every frame in a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct FrameSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl FrameSize {
    /// Create a frame size.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Bytes in one RGBA8 frame (`width * height * 4`).
    pub fn byte_len(self) -> usize {
        (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(RGBA8_BYTES_PER_PIXEL)
    }

    /// `WxH`, as used by `-video_size`.
    pub fn to_arg(self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
