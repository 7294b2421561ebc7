use crate::encode::Encoder;
use anyhow::Context as _;
use crate::foundation::error::{FramepipeError, FramepipeResult};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

/// The system `ffmpeg` (or any compatible executable) reading raw frames from stdin.
///
/// Stdout is discarded. Stderr is drained on a dedicated thread from the moment of spawning so a
/// chatty encoder can never block on a full pipe; the collected text is returned by
/// [`Encoder::finish`].
pub struct FfmpegProcess {
    program: PathBuf,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
}

impl FfmpegProcess {
    /// Spawn `program` with `args`.
    pub fn spawn(program: &Path, args: &[String]) -> FramepipeResult<Self> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            FramepipeError::encoder(format!(
                "failed to spawn encoder '{}': {e}",
                program.display()
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| FramepipeError::encoder("failed to open encoder stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| FramepipeError::encoder("failed to open encoder stderr (unexpected)"))?;
        let stderr_drain = std::thread::Builder::new()
            .name("framepipe-encoder-stderr".to_owned())
            .spawn(move || {
                let mut stderr_bytes = Vec::new();
                stderr.read_to_end(&mut stderr_bytes)?;
                Ok(stderr_bytes)
            })
            .map_err(|e| FramepipeError::encoder(format!("failed to start stderr drain: {e}")))?;

        tracing::info!(program = %program.display(), pid = child.id(), "encoder spawned");
        Ok(Self {
            program: program.to_path_buf(),
            child: Some(child),
            stdin: Some(stdin),
            stderr_drain: Some(stderr_drain),
        })
    }

    /// Executable that was spawned.
    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Encoder for FfmpegProcess {
    type Input = ChildStdin;

    fn take_input(&mut self) -> FramepipeResult<ChildStdin> {
        self.stdin
            .take()
            .ok_or_else(|| FramepipeError::encoder("encoder stdin was already taken"))
    }

    fn finish(mut self) -> FramepipeResult<String> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| FramepipeError::encoder("encoder already finished"))?;

        let status = child.wait().map_err(|e| {
            FramepipeError::encoder(format!("failed to wait for encoder to exit: {e}"))
        })?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| FramepipeError::encoder("encoder stderr drain thread panicked"))?
                .map_err(|e| FramepipeError::encoder(format!("encoder stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        let mut diagnostics = String::from_utf8_lossy(&stderr_bytes).into_owned();
        if !status.success() {
            tracing::warn!(%status, "encoder exited unsuccessfully");
            if !diagnostics.is_empty() && !diagnostics.ends_with('\n') {
                diagnostics.push('\n');
            }
            diagnostics.push_str(&format!("encoder exited with {status}"));
        }
        Ok(diagnostics)
    }
}

impl Drop for FfmpegProcess {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            // Not finished through `Encoder::finish`; don't leave the process behind.
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Locate the encoder executable.
///
/// An explicit path is used when it names an existing file, made absolute against the current
/// directory so the child process does not resolve it through `PATH`; a bare name that is not a
/// file here is looked up on `PATH`. Without an explicit path, `ffmpeg` (`ffmpeg.exe` on Windows)
/// is looked up on `PATH`.
pub fn locate_encoder(explicit: Option<&Path>) -> FramepipeResult<PathBuf> {
    let mut searched = Vec::new();

    let name = match explicit {
        Some(p) if p.is_file() => {
            return std::path::absolute(p)
                .with_context(|| format!("resolve encoder path '{}'", p.display()))
                .map_err(FramepipeError::from);
        }
        Some(p) if p.components().count() == 1 => p.as_os_str().to_owned(),
        Some(p) => {
            searched.push(p.to_path_buf());
            return Err(FramepipeError::ExecutableNotFound { searched });
        }
        None => default_executable_name().into(),
    };

    if let Some(paths) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&paths) {
            let candidate = dir.join(&name);
            if candidate.is_file() {
                return Ok(candidate);
            }
            searched.push(candidate);
        }
    }
    Err(FramepipeError::ExecutableNotFound { searched })
}

fn default_executable_name() -> &'static str {
    if cfg!(windows) { "ffmpeg.exe" } else { "ffmpeg" }
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> FramepipeResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
