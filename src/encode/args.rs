use crate::config::SessionConfig;
use std::collections::HashSet;
use std::path::Path;

/// Output codec/container presets.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum EncoderPreset {
    /// H.264 (libx264), yuv420p, MP4.
    #[default]
    H264Default,
    /// H.264 on NVENC, yuv420p, MP4.
    H264Nvidia,
    /// Lossless H.264, yuv420p, MP4.
    H264Lossless420,
    /// Lossless H.264, yuv444p, MP4.
    H264Lossless444,
    /// HEVC (libx265), yuv420p, MP4.
    HevcDefault,
    /// HEVC on NVENC, yuv420p, MP4.
    HevcNvidia,
    /// Apple ProRes 422, QuickTime.
    #[serde(rename = "prores422")]
    #[value(name = "prores422")]
    ProRes422,
    /// Apple ProRes 4444 with alpha, QuickTime.
    #[serde(rename = "prores4444")]
    #[value(name = "prores4444")]
    ProRes4444,
    /// VP8, WebM.
    Vp8,
    /// VP9, WebM.
    Vp9,
    /// HAP, QuickTime.
    Hap,
    /// HAP with alpha, QuickTime.
    HapAlpha,
    /// HAP Q, QuickTime.
    HapQ,
}

impl EncoderPreset {
    /// Flags placed between the input (`-i -`) and the output path.
    pub fn output_flags(self) -> &'static [&'static str] {
        match self {
            Self::H264Default => &["-c:v", "libx264", "-pix_fmt", "yuv420p"],
            Self::H264Nvidia => &["-c:v", "h264_nvenc", "-pix_fmt", "yuv420p"],
            Self::H264Lossless420 => &[
                "-c:v", "libx264", "-pix_fmt", "yuv420p", "-preset", "ultrafast", "-crf", "0",
            ],
            Self::H264Lossless444 => &[
                "-c:v", "libx264", "-pix_fmt", "yuv444p", "-preset", "ultrafast", "-crf", "0",
            ],
            Self::HevcDefault => &["-c:v", "libx265", "-pix_fmt", "yuv420p"],
            Self::HevcNvidia => &["-c:v", "hevc_nvenc", "-pix_fmt", "yuv420p"],
            Self::ProRes422 => &["-c:v", "prores_ks", "-pix_fmt", "yuv422p10le"],
            Self::ProRes4444 => &["-c:v", "prores_ks", "-pix_fmt", "yuva444p10le"],
            Self::Vp8 => &["-c:v", "libvpx", "-pix_fmt", "yuv420p"],
            Self::Vp9 => &["-c:v", "libvpx-vp9"],
            Self::Hap => &["-c:v", "hap"],
            Self::HapAlpha => &["-c:v", "hap", "-format", "hap_alpha"],
            Self::HapQ => &["-c:v", "hap", "-format", "hap_q"],
        }
    }

    /// Container file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::H264Default
            | Self::H264Nvidia
            | Self::H264Lossless420
            | Self::H264Lossless444
            | Self::HevcDefault
            | Self::HevcNvidia => "mp4",
            Self::ProRes422 | Self::ProRes4444 | Self::Hap | Self::HapAlpha | Self::HapQ => "mov",
            Self::Vp8 | Self::Vp9 => "webm",
        }
    }
}

/// One container metadata entry (`-metadata key=value`).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MetadataTag {
    /// Tag name, e.g. `title`.
    pub key: String,
    /// Tag value.
    pub value: String,
}

impl MetadataTag {
    /// Create a tag.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl std::str::FromStr for MetadataTag {
    type Err = String;

    /// Parse `key=value`; the value may itself contain `=`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
        Ok(Self::new(key, value))
    }
}

/// Why a metadata tag was left out of the argument list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Key or value contains `"`, which the quoted command line form cannot carry.
    ContainsQuote,
    /// Key is empty or contains `=`.
    InvalidKey,
    /// An earlier tag with the same key was already accepted.
    DuplicateKey,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::ContainsQuote => "contains a double quote",
            Self::InvalidKey => "key is empty or contains '='",
            Self::DuplicateKey => "duplicate key",
        })
    }
}

/// A metadata tag that was skipped, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedTag {
    /// The tag as supplied.
    pub tag: MetadataTag,
    /// Reason it was skipped.
    pub reason: RejectReason,
}

/// Encoder argument list plus the metadata tags that did not make it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderArgs {
    /// Arguments, one element per argv entry.
    pub args: Vec<String>,
    /// Skipped metadata tags, in input order.
    pub rejected: Vec<RejectedTag>,
}

impl EncoderArgs {
    /// Shell-style rendering for logs: `-metadata "key"="value"`, other arguments quoted when
    /// they contain whitespace.
    pub fn command_line(&self, program: &Path) -> String {
        let mut out = quote_if_needed(&program.display().to_string());
        let mut after_metadata = false;
        for arg in &self.args {
            out.push(' ');
            if after_metadata && let Some((k, v)) = arg.split_once('=') {
                out.push_str(&format!("\"{k}\"=\"{v}\""));
            } else {
                out.push_str(&quote_if_needed(arg));
            }
            after_metadata = arg == "-metadata";
        }
        out
    }
}

fn quote_if_needed(arg: &str) -> String {
    if arg.is_empty() || arg.contains(char::is_whitespace) {
        format!("\"{arg}\"")
    } else {
        arg.to_owned()
    }
}

/// Build the encoder invocation for `cfg`.
///
/// Order: error resilience, overwrite, raw RGBA input description, log level, `-i -`, preset
/// output flags, metadata, destination path. Metadata tags with a `"` in key or value, an
/// invalid key, or a key seen before are skipped with a warning.
pub fn build_encoder_args(cfg: &SessionConfig) -> EncoderArgs {
    let mut args: Vec<String> = Vec::new();
    let mut push = |items: &[&str]| args.extend(items.iter().map(|s| (*s).to_owned()));

    push(&["-err_detect", "ignore_err"]);
    push(&[if cfg.overwrite { "-y" } else { "-n" }]);
    push(&["-f", "rawvideo", "-pixel_format", "rgba"]);
    push(&["-video_size", &cfg.frame_size().to_arg()]);
    push(&["-framerate", &cfg.fps.to_arg()]);
    push(&["-loglevel", &cfg.log_level]);
    push(&["-i", "-"]);
    push(cfg.preset.output_flags());

    let mut rejected = Vec::new();
    let mut seen = HashSet::new();
    for tag in &cfg.metadata {
        let reason = if tag.key.contains('"') || tag.value.contains('"') {
            Some(RejectReason::ContainsQuote)
        } else if tag.key.is_empty() || tag.key.contains('=') {
            Some(RejectReason::InvalidKey)
        } else if seen.contains(tag.key.as_str()) {
            Some(RejectReason::DuplicateKey)
        } else {
            None
        };

        match reason {
            Some(reason) => {
                tracing::warn!(key = %tag.key, %reason, "skipping metadata tag");
                rejected.push(RejectedTag {
                    tag: tag.clone(),
                    reason,
                });
            }
            None => {
                seen.insert(tag.key.as_str());
                push(&["-metadata", &format!("{}={}", tag.key, tag.value)]);
            }
        }
    }

    args.push(cfg.out_path.to_string_lossy().into_owned());
    EncoderArgs { args, rejected }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/args.rs"]
mod tests;
