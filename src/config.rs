use crate::encode::args::{EncoderPreset, MetadataTag};
use crate::foundation::core::{Fps, FrameSize};
use crate::foundation::error::{FramepipeError, FramepipeResult};
use crate::pool::buffer_pool::BufferPoolOpts;
use std::path::{Path, PathBuf};

/// Everything an [`crate::EncoderSession`] needs to start.
///
/// Deserializable from JSON; every field except the output path has a default.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionConfig {
    /// Frame width in pixels.
    #[serde(default = "default_width")]
    pub width: u32,
    /// Frame height in pixels.
    #[serde(default = "default_height")]
    pub height: u32,
    /// Output frame rate.
    #[serde(default)]
    pub fps: Fps,
    /// Destination file, passed as the encoder's final argument.
    pub out_path: PathBuf,
    /// Explicit encoder executable. `None` searches `PATH` for `ffmpeg`.
    #[serde(default)]
    pub encoder_path: Option<PathBuf>,
    /// Output codec/container preset.
    #[serde(default)]
    pub preset: EncoderPreset,
    /// Container metadata tags, in order.
    #[serde(default)]
    pub metadata: Vec<MetadataTag>,
    /// Overwrite an existing output file.
    #[serde(default = "default_overwrite")]
    pub overwrite: bool,
    /// Encoder `-loglevel`; diagnostics at this level end up in the close result.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Outstanding readbacks allowed before new submissions are dropped.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Pipe queue depth at which `flush` starts blocking the caller.
    #[serde(default = "default_pipe_queue_threshold")]
    pub pipe_queue_threshold: usize,
    /// Buffer pool retention limits.
    #[serde(default)]
    pub pool: BufferPoolOpts,
}

fn default_width() -> u32 {
    1920
}
fn default_height() -> u32 {
    1080
}
fn default_overwrite() -> bool {
    true
}
fn default_log_level() -> String {
    "warning".to_owned()
}
fn default_max_in_flight() -> usize {
    6
}
fn default_pipe_queue_threshold() -> usize {
    4
}

impl SessionConfig {
    /// Defaults for a `width x height` stream written to `out_path`.
    pub fn new(out_path: impl Into<PathBuf>, width: u32, height: u32, fps: Fps) -> Self {
        Self {
            width,
            height,
            fps,
            out_path: out_path.into(),
            encoder_path: None,
            preset: EncoderPreset::default(),
            metadata: Vec::new(),
            overwrite: default_overwrite(),
            log_level: default_log_level(),
            max_in_flight: default_max_in_flight(),
            pipe_queue_threshold: default_pipe_queue_threshold(),
            pool: BufferPoolOpts::default(),
        }
    }

    /// Load a config from a JSON file.
    pub fn from_json_file(path: &Path) -> FramepipeResult<Self> {
        use anyhow::Context as _;
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read session config '{}'", path.display()))?;
        serde_json::from_str(&data).map_err(|e| {
            FramepipeError::validation(format!(
                "invalid session config '{}': {e}",
                path.display()
            ))
        })
    }

    /// Frame dimensions.
    pub fn frame_size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    /// `out_path` with its extension replaced by the preset's container extension.
    pub fn out_path_with_extension(&self) -> PathBuf {
        self.out_path.with_extension(self.preset.extension())
    }

    /// Check the values the pipeline relies on.
    pub fn validate(&self) -> FramepipeResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(FramepipeError::validation(
                "session width/height must be non-zero",
            ));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            // Most presets subsample chroma.
            return Err(FramepipeError::validation(
                "session width/height must be even",
            ));
        }
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(FramepipeError::validation("session fps must be non-zero"));
        }
        if self.max_in_flight == 0 {
            return Err(FramepipeError::validation("max_in_flight must be >= 1"));
        }
        if self.out_path.as_os_str().is_empty() {
            return Err(FramepipeError::validation("out_path must not be empty"));
        }
        if self.log_level.trim().is_empty() || self.log_level.contains(char::is_whitespace) {
            return Err(FramepipeError::validation(
                "log_level must be a single ffmpeg log level name",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
