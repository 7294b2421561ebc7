use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use framepipe::{
    CpuReadback, EncoderPreset, EncoderSession, FfmpegProcess, Fps, MetadataTag, SessionConfig,
};

#[derive(Parser, Debug)]
#[command(name = "framepipe", version)]
struct Cli {
    /// Log pipeline events (debug level) to stderr.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream a generated test pattern into the encoder.
    Synth(SynthArgs),
    /// Stream a directory of images, in file-name order, into the encoder.
    Images(ImagesArgs),
}

#[derive(Parser, Debug)]
struct SessionArgs {
    /// Session config JSON. Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output video path.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Replace the output extension with the preset's container extension.
    #[arg(long, default_value_t = false)]
    fix_extension: bool,

    /// Encoder preset.
    #[arg(long, value_enum)]
    preset: Option<EncoderPreset>,

    /// Container metadata, `key=value` (repeatable).
    #[arg(long = "metadata")]
    metadata: Vec<MetadataTag>,

    /// Encoder executable (default: `ffmpeg` on PATH).
    #[arg(long)]
    encoder: Option<PathBuf>,

    /// Frames per second.
    #[arg(long)]
    fps: Option<u32>,

    /// Outstanding readbacks before frames are dropped.
    #[arg(long)]
    max_in_flight: Option<usize>,

    /// Simulated readback latency, in completion polls.
    #[arg(long, default_value_t = 0)]
    readback_delay: u32,
}

#[derive(Parser, Debug)]
struct SynthArgs {
    #[command(flatten)]
    session: SessionArgs,

    /// Frame width (default: the config's, or 640).
    #[arg(long)]
    width: Option<u32>,

    /// Frame height (default: the config's, or 360).
    #[arg(long)]
    height: Option<u32>,

    /// Number of frames to stream.
    #[arg(long, default_value_t = 120)]
    frames: u64,
}

#[derive(Parser, Debug)]
struct ImagesArgs {
    #[command(flatten)]
    session: SessionArgs,

    /// Directory of input images.
    #[arg(long)]
    dir: PathBuf,

    /// Output width (default: the config's, or the first image's).
    #[arg(long)]
    width: Option<u32>,

    /// Output height (default: the config's, or the first image's).
    #[arg(long)]
    height: Option<u32>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .init();

    match cli.cmd {
        Command::Synth(args) => cmd_synth(args),
        Command::Images(args) => cmd_images(args),
    }
}

const SYNTH_WIDTH: u32 = 640;
const SYNTH_HEIGHT: u32 = 360;

/// Build the session config; `width`/`height` override the config file's size only when given.
fn session_config(
    args: &SessionArgs,
    width: Option<u32>,
    height: Option<u32>,
) -> anyhow::Result<SessionConfig> {
    let mut cfg = match &args.config {
        Some(path) => SessionConfig::from_json_file(path)?,
        None => {
            let out = args
                .out
                .clone()
                .context("either --out or --config is required")?;
            SessionConfig::new(
                out,
                width.unwrap_or(SYNTH_WIDTH),
                height.unwrap_or(SYNTH_HEIGHT),
                Fps::default(),
            )
        }
    };

    if let Some(width) = width {
        cfg.width = width;
    }
    if let Some(height) = height {
        cfg.height = height;
    }

    if let Some(out) = &args.out {
        cfg.out_path = out.clone();
    }
    if let Some(preset) = args.preset {
        cfg.preset = preset;
    }
    if args.fix_extension {
        cfg.out_path = cfg.out_path_with_extension();
    }
    if let Some(fps) = args.fps {
        cfg.fps = Fps::new(fps, 1)?;
    }
    if let Some(n) = args.max_in_flight {
        cfg.max_in_flight = n;
    }
    if args.encoder.is_some() {
        cfg.encoder_path = args.encoder.clone();
    }
    cfg.metadata.extend(args.metadata.iter().cloned());
    Ok(cfg)
}

fn open_session(
    args: &SessionArgs,
    cfg: SessionConfig,
) -> anyhow::Result<EncoderSession<CpuReadback, FfmpegProcess>> {
    let backend = CpuReadback::with_completion_delay(args.readback_delay);
    let session = EncoderSession::spawn(cfg, backend)?;
    for rejected in session.rejected_metadata() {
        eprintln!(
            "skipped metadata '{}': {}",
            rejected.tag.key, rejected.reason
        );
    }
    Ok(session)
}

fn finish(mut session: EncoderSession<CpuReadback, FfmpegProcess>) -> anyhow::Result<()> {
    let out = session.config().out_path.clone();
    let diagnostics = session.close()?;
    let stats = session.stats();
    if !diagnostics.trim().is_empty() {
        eprintln!("{}", diagnostics.trim_end());
    }
    eprintln!(
        "wrote {} ({} frames, {} dropped, {} write failures)",
        out.display(),
        stats.written,
        stats.dropped_overflow + stats.dropped_readback_error + stats.dropped_size_mismatch,
        stats.write_failures
    );
    Ok(())
}

fn cmd_synth(args: SynthArgs) -> anyhow::Result<()> {
    let cfg = session_config(&args.session, args.width, args.height)?;
    let (width, height) = (cfg.width, cfg.height);
    let mut session = open_session(&args.session, cfg)?;

    let mut frame = vec![0u8; session.config().frame_size().byte_len()];
    for i in 0..args.frames {
        fill_test_pattern(&mut frame, width, height, i);
        session.submit_frame(&frame)?;
        session.flush()?;
    }
    finish(session)
}

fn cmd_images(args: ImagesArgs) -> anyhow::Result<()> {
    let paths = image_paths(&args.dir)?;
    let Some(first) = paths.first() else {
        anyhow::bail!("no images found in '{}'", args.dir.display());
    };

    let (width, height) = match (args.width, args.height, &args.session.config) {
        (Some(w), Some(h), _) => (Some(w), Some(h)),
        (w, h, Some(_)) => (w, h),
        (w, h, None) => {
            let (iw, ih) = image::image_dimensions(first)
                .with_context(|| format!("read image header '{}'", first.display()))?;
            (Some(w.unwrap_or(iw)), Some(h.unwrap_or(ih)))
        }
    };
    let cfg = session_config(&args.session, width, height)?;
    let (width, height) = (cfg.width, cfg.height);
    let mut session = open_session(&args.session, cfg)?;

    for path in &paths {
        let img = image::open(path)
            .with_context(|| format!("decode image '{}'", path.display()))?
            .to_rgba8();
        let img = if img.dimensions() == (width, height) {
            img
        } else {
            image::imageops::resize(
                &img,
                width,
                height,
                image::imageops::FilterType::Triangle,
            )
        };
        session.submit_frame(img.as_raw())?;
        session.flush()?;
    }
    finish(session)
}

fn image_paths(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("read directory '{}'", dir.display()))?
    {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| image::ImageFormat::from_extension(e).is_some());
        if path.is_file() && is_image {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn fill_test_pattern(buf: &mut [u8], width: u32, height: u32, frame: u64) {
    let shift = (frame % 256) as u32;
    for (i, px) in buf.chunks_exact_mut(4).enumerate() {
        let x = i as u32 % width;
        let y = i as u32 / width;
        px[0] = ((x * 255 / width.max(1) + shift) % 256) as u8;
        px[1] = ((y * 255 / height.max(1)) % 256) as u8;
        px[2] = (shift * 3 % 256) as u8;
        px[3] = 255;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/bin/framepipe.rs"]
mod tests;
