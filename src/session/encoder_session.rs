use crate::config::SessionConfig;
use crate::encode::Encoder;
use crate::encode::args::{EncoderArgs, RejectedTag, build_encoder_args};
use crate::encode::ffmpeg::{FfmpegProcess, ensure_parent_dir, locate_encoder};
use crate::foundation::core::SeqNo;
use crate::foundation::error::{FramepipeError, FramepipeResult};
use crate::pool::buffer_pool::{BufferPool, BufferPoolStats};
use crate::readback::{MappedFrame, ReadbackBackend, ReadbackError};
use crate::session::sequencer::{DrainReport, ReadbackSequencer};
use crate::stage::StageCounters;
use crate::stage::copy::CopyStage;
use crate::stage::pipe_writer::PipeWriterStage;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Lifecycle of an [`EncoderSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepting frames.
    Open,
    /// `close` is tearing the pipeline down.
    Closing,
    /// Both stage threads joined and the encoder exited.
    Closed,
}

/// What happened to a submitted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// A readback was issued; the frame will be written unless its readback fails.
    Accepted(SeqNo),
    /// The frame was dropped (too many readbacks in flight, or the readback could not be issued).
    Dropped,
}

/// Counters describing a session so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// `submit_frame` calls on an open session.
    pub submitted: u64,
    /// Submissions that got a readback slot.
    pub accepted: u64,
    /// Submissions dropped because `max_in_flight` readbacks were outstanding.
    pub dropped_overflow: u64,
    /// Frames dropped because their readback failed.
    pub dropped_readback_error: u64,
    /// Frames dropped because their byte length did not match the configured frame size.
    pub dropped_size_mismatch: u64,
    /// Frames handed to the copy stage.
    pub delivered: u64,
    /// Synchronous waits on a head readback overtaken by a later one.
    pub forced_waits: u64,
    /// Frames copied into pool buffers.
    pub copied: u64,
    /// Copied frames dropped because the writer had exited.
    pub discarded: u64,
    /// Frames fully written to the encoder input.
    pub written: u64,
    /// Frames whose write to the encoder input failed.
    pub write_failures: u64,
    /// Readbacks still outstanding.
    pub in_flight: usize,
    /// Frames queued for or being copied.
    pub copy_depth: usize,
    /// Buffers queued for or being written.
    pub pipe_depth: usize,
    /// Buffer pool counters.
    pub pool: BufferPoolStats,
}

#[derive(Debug, Default)]
struct SubmitTally {
    submitted: u64,
    accepted: u64,
    dropped_overflow: u64,
    dropped_readback_error: u64,
    dropped_size_mismatch: u64,
    delivered: u64,
    forced_waits: u64,
}

/// Streams frames from a readback backend into an encoder, in submission order.
///
/// Call [`EncoderSession::submit_frame`] for every rendered frame (or
/// [`EncoderSession::drain_completed`] on ticks without one), then [`EncoderSession::flush`] to
/// apply backpressure, and finally [`EncoderSession::close`] to finish the stream and collect
/// the encoder's diagnostics. Dropping an open session closes it.
pub struct EncoderSession<B: ReadbackBackend, E: Encoder = FfmpegProcess> {
    cfg: SessionConfig,
    backend: B,
    state: SessionState,
    sequencer: ReadbackSequencer<B::Request>,
    pool: Arc<BufferPool>,
    counters: Arc<StageCounters>,
    copy: Option<CopyStage>,
    writer: Option<PipeWriterStage>,
    encoder: Option<E>,
    args: EncoderArgs,
    program: Option<PathBuf>,
    diagnostics: Option<String>,
    tally: SubmitTally,
}

impl<B: ReadbackBackend> EncoderSession<B, FfmpegProcess> {
    /// Start a session that feeds the system encoder (`ffmpeg`).
    ///
    /// Fails before anything is spawned when the config is invalid, the backend cannot read back
    /// asynchronously, or the encoder executable cannot be found.
    #[tracing::instrument(skip(cfg, backend), fields(out = %cfg.out_path.display()))]
    pub fn spawn(cfg: SessionConfig, backend: B) -> FramepipeResult<Self> {
        cfg.validate()?;
        check_backend(&backend)?;
        let program = locate_encoder(cfg.encoder_path.as_deref())?;
        let args = build_encoder_args(&cfg);
        ensure_parent_dir(&cfg.out_path)?;

        tracing::info!(command = %args.command_line(&program), "starting encoder");
        let encoder = FfmpegProcess::spawn(&program, &args.args)?;
        Self::start(cfg, backend, encoder, args, Some(program))
    }
}

impl<B: ReadbackBackend, E: Encoder> EncoderSession<B, E> {
    /// Start a session around an already constructed encoder.
    pub fn with_encoder(cfg: SessionConfig, backend: B, encoder: E) -> FramepipeResult<Self> {
        cfg.validate()?;
        check_backend(&backend)?;
        let args = build_encoder_args(&cfg);
        Self::start(cfg, backend, encoder, args, None)
    }

    fn start(
        cfg: SessionConfig,
        backend: B,
        mut encoder: E,
        args: EncoderArgs,
        program: Option<PathBuf>,
    ) -> FramepipeResult<Self> {
        let input = encoder.take_input()?;
        let pool = Arc::new(BufferPool::new(cfg.pool));
        let counters = Arc::new(StageCounters::default());
        let writer = PipeWriterStage::spawn(input, Arc::clone(&pool), Arc::clone(&counters))?;
        let copy = CopyStage::spawn(Arc::clone(&pool), writer.queue(), Arc::clone(&counters))?;

        tracing::info!(
            size = %cfg.frame_size().to_arg(),
            fps = %cfg.fps.to_arg(),
            max_in_flight = cfg.max_in_flight,
            "encoder session open"
        );
        Ok(Self {
            sequencer: ReadbackSequencer::new(cfg.max_in_flight),
            cfg,
            backend,
            state: SessionState::Open,
            pool,
            counters,
            copy: Some(copy),
            writer: Some(writer),
            encoder: Some(encoder),
            args,
            program,
            diagnostics: None,
            tally: SubmitTally::default(),
        })
    }

    /// Issue a readback of `surface` and resolve whatever has completed in order.
    ///
    /// Overflow and readback failures drop the frame and are reported as
    /// [`Submission::Dropped`], not as errors. Errors only when the session is no longer open.
    pub fn submit_frame(&mut self, surface: &B::Surface) -> FramepipeResult<Submission> {
        self.ensure_open()?;
        self.tally.submitted += 1;

        let submission = if self.sequencer.is_full() {
            self.tally.dropped_overflow += 1;
            let err = FramepipeError::QueueOverflow {
                max_in_flight: self.cfg.max_in_flight,
            };
            tracing::warn!(error = %err, "dropping newest frame");
            Submission::Dropped
        } else {
            match self.backend.request_readback(surface) {
                Ok(request) => match self.sequencer.register(request) {
                    Ok(seq) => {
                        self.tally.accepted += 1;
                        Submission::Accepted(seq)
                    }
                    Err(err) => {
                        self.tally.dropped_overflow += 1;
                        tracing::warn!(error = %err, "dropping newest frame");
                        Submission::Dropped
                    }
                },
                Err(e) => {
                    self.tally.dropped_readback_error += 1;
                    tracing::warn!(error = %FramepipeError::from(e), "readback request failed, dropping frame");
                    Submission::Dropped
                }
            }
        };

        self.drain_completed();
        Ok(submission)
    }

    /// Resolve completed readbacks in submission order and hand their bytes to the copy stage.
    ///
    /// Call once per tick on ticks without a new frame. Does nothing once the session is closing.
    pub fn drain_completed(&mut self) -> DrainReport {
        if self.state != SessionState::Open {
            return DrainReport::default();
        }
        let expected = self.cfg.frame_size().byte_len();
        let copy = self.copy.as_ref();
        let tally = &mut self.tally;
        let report = self
            .sequencer
            .drain_completed(|seq, result| deliver(copy, expected, tally, seq, result));
        self.tally.forced_waits += report.forced_waits;
        report
    }

    /// Block until the copy queue is empty and the pipe queue depth is at most
    /// `pipe_queue_threshold`.
    ///
    /// Returns immediately when both already hold.
    pub fn flush(&mut self) -> FramepipeResult<()> {
        self.ensure_open()?;
        let mut waited = false;
        if let Some(copy) = &self.copy {
            waited |= copy.wait_idle();
        }
        if let Some(writer) = &self.writer {
            waited |= writer.wait_until_depth_at_most(self.cfg.pipe_queue_threshold);
        }
        if waited {
            tracing::debug!(
                threshold = self.cfg.pipe_queue_threshold,
                depth = self.writer.as_ref().map_or(0, PipeWriterStage::depth),
                "flush waited on encoder"
            );
        }
        Ok(())
    }

    /// Finish the stream and return the encoder's diagnostic output.
    ///
    /// Outstanding readbacks are waited on and written, both stages drain and exit, the encoder
    /// input is closed and the encoder is waited on. Calling `close` again returns the same text
    /// without doing anything else.
    pub fn close(&mut self) -> FramepipeResult<String> {
        if self.state == SessionState::Closed {
            return Ok(self.diagnostics.clone().unwrap_or_default());
        }
        self.state = SessionState::Closing;
        tracing::info!(in_flight = self.sequencer.len(), "closing encoder session");

        let expected = self.cfg.frame_size().byte_len();
        let copy = self.copy.as_ref();
        let tally = &mut self.tally;
        self.sequencer
            .drain_all(|seq, result| deliver(copy, expected, tally, seq, result));

        if let Some(mut copy) = self.copy.take() {
            copy.stop();
        }
        if let Some(mut writer) = self.writer.take() {
            writer.stop();
        }

        let finished = match self.encoder.take() {
            Some(encoder) => encoder.finish(),
            None => Ok(String::new()),
        };
        self.state = SessionState::Closed;

        let diagnostics = match finished {
            Ok(text) => text,
            Err(err) => {
                self.diagnostics = Some(err.to_string());
                return Err(err);
            }
        };
        if !diagnostics.trim().is_empty() {
            tracing::warn!(diagnostics = %diagnostics.trim_end(), "encoder reported diagnostics");
        }
        let stats = self.stats();
        tracing::info!(
            written = stats.written,
            dropped = stats.dropped_overflow
                + stats.dropped_readback_error
                + stats.dropped_size_mismatch,
            write_failures = stats.write_failures,
            "encoder session closed"
        );
        self.diagnostics = Some(diagnostics.clone());
        Ok(diagnostics)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Snapshot of the session counters.
    pub fn stats(&self) -> SessionStats {
        let t = &self.tally;
        let c = &self.counters;
        SessionStats {
            submitted: t.submitted,
            accepted: t.accepted,
            dropped_overflow: t.dropped_overflow,
            dropped_readback_error: t.dropped_readback_error,
            dropped_size_mismatch: t.dropped_size_mismatch,
            delivered: t.delivered,
            forced_waits: t.forced_waits,
            copied: StageCounters::get(&c.copied),
            discarded: StageCounters::get(&c.discarded),
            written: StageCounters::get(&c.written),
            write_failures: StageCounters::get(&c.write_failures),
            in_flight: self.sequencer.len(),
            copy_depth: self.copy.as_ref().map_or(0, CopyStage::depth),
            pipe_depth: self.writer.as_ref().map_or(0, PipeWriterStage::depth),
            pool: self.pool.stats(),
        }
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.cfg
    }

    /// Encoder arguments built from the configuration.
    pub fn args(&self) -> &EncoderArgs {
        &self.args
    }

    /// Metadata tags left out of the encoder arguments.
    pub fn rejected_metadata(&self) -> &[RejectedTag] {
        &self.args.rejected
    }

    /// Encoder executable, when the session spawned one.
    pub fn program(&self) -> Option<&Path> {
        self.program.as_deref()
    }

    /// The readback backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The readback backend, mutably (e.g. to render the next surface).
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn ensure_open(&self) -> FramepipeResult<()> {
        match self.state {
            SessionState::Open => Ok(()),
            SessionState::Closing | SessionState::Closed => Err(FramepipeError::SessionClosed),
        }
    }
}

impl<B: ReadbackBackend, E: Encoder> Drop for EncoderSession<B, E> {
    fn drop(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        tracing::warn!("encoder session dropped without close()");
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "closing dropped encoder session failed");
        }
    }
}

fn check_backend<B: ReadbackBackend>(backend: &B) -> FramepipeResult<()> {
    if backend.supports_async_readback() {
        Ok(())
    } else {
        Err(FramepipeError::unsupported(
            "asynchronous GPU readback is not supported on this device",
        ))
    }
}

fn deliver<F: MappedFrame + 'static>(
    copy: Option<&CopyStage>,
    expected_len: usize,
    tally: &mut SubmitTally,
    seq: SeqNo,
    result: Result<F, ReadbackError>,
) {
    let frame = match result {
        Ok(frame) => frame,
        Err(_) => {
            tally.dropped_readback_error += 1;
            return;
        }
    };
    let len = frame.len();
    if len != expected_len {
        tally.dropped_size_mismatch += 1;
        tracing::warn!(seq = seq.0, len, expected = expected_len, "frame size mismatch, dropping frame");
        return;
    }
    if copy.is_some_and(|copy| copy.enqueue(Box::new(frame))) {
        tally.delivered += 1;
    } else {
        tracing::warn!(seq = seq.0, "copy stage gone, dropping frame");
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/encoder_session.rs"]
mod tests;
