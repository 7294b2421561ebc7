use super::*;
use crate::encode::memory::MemoryEncoder;
use crate::foundation::core::Fps;
use crate::readback::cpu::{CpuReadback, CpuReadbackRequest};

const W: u32 = 4;
const H: u32 = 2;

fn cfg() -> SessionConfig {
    SessionConfig::new("unused.mp4", W, H, Fps::whole(30))
}

fn frame(tag: u8) -> Vec<u8> {
    vec![tag; (W * H * 4) as usize]
}

struct NoAsyncReadback;

impl ReadbackBackend for NoAsyncReadback {
    type Surface = [u8];
    type Request = CpuReadbackRequest;

    fn supports_async_readback(&self) -> bool {
        false
    }

    fn request_readback(&mut self, _surface: &[u8]) -> Result<CpuReadbackRequest, ReadbackError> {
        Err(ReadbackError::new("unreachable"))
    }
}

#[test]
fn unsupported_backend_fails_before_start() {
    let (enc, capture) = MemoryEncoder::new();
    let err = EncoderSession::with_encoder(cfg(), NoAsyncReadback, enc)
        .err()
        .unwrap();
    assert!(matches!(err, FramepipeError::UnsupportedPlatformFeature(_)));
    assert_eq!(capture.finish_calls(), 0);
}

#[test]
fn invalid_config_fails_before_start() {
    let (enc, _capture) = MemoryEncoder::new();
    let bad = SessionConfig {
        width: 3,
        ..cfg()
    };
    let err = EncoderSession::with_encoder(bad, CpuReadback::new(), enc)
        .err()
        .unwrap();
    assert!(matches!(err, FramepipeError::Validation(_)));
}

#[test]
fn missing_encoder_executable_fails_before_start() {
    let mut c = cfg();
    c.encoder_path = Some(
        std::env::temp_dir()
            .join("framepipe_no_such_dir")
            .join("ffmpeg"),
    );
    let err = EncoderSession::spawn(c, CpuReadback::new()).err().unwrap();
    assert!(matches!(err, FramepipeError::ExecutableNotFound { .. }));
}

#[test]
fn lifecycle_and_idempotent_close() {
    let (enc, capture) = MemoryEncoder::new();
    let mut session =
        EncoderSession::with_encoder(cfg(), CpuReadback::new(), enc.with_diagnostics("ok\n"))
            .unwrap();
    assert_eq!(session.state(), SessionState::Open);
    assert!(session.program().is_none());

    assert_eq!(
        session.submit_frame(&frame(1)).unwrap(),
        Submission::Accepted(SeqNo(0))
    );
    session.flush().unwrap();

    assert_eq!(session.close().unwrap(), "ok\n");
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(session.close().unwrap(), "ok\n");
    assert_eq!(capture.finish_calls(), 1);
    assert_eq!(capture.frames(), vec![frame(1)]);

    assert!(matches!(
        session.submit_frame(&frame(2)),
        Err(FramepipeError::SessionClosed)
    ));
    assert!(matches!(session.flush(), Err(FramepipeError::SessionClosed)));
    assert_eq!(session.drain_completed(), DrainReport::default());
}

#[test]
fn overflow_drops_newest_frame() {
    let (enc, capture) = MemoryEncoder::new();
    let mut c = cfg();
    c.max_in_flight = 2;
    let mut session =
        EncoderSession::with_encoder(c, CpuReadback::with_completion_delay(1_000), enc).unwrap();

    assert!(matches!(
        session.submit_frame(&frame(0)).unwrap(),
        Submission::Accepted(_)
    ));
    assert!(matches!(
        session.submit_frame(&frame(1)).unwrap(),
        Submission::Accepted(_)
    ));
    assert_eq!(session.submit_frame(&frame(2)).unwrap(), Submission::Dropped);

    let stats = session.stats();
    assert_eq!(stats.submitted, 3);
    assert_eq!(stats.accepted, 2);
    assert_eq!(stats.dropped_overflow, 1);
    assert_eq!(stats.in_flight, 2);

    session.close().unwrap();
    assert_eq!(capture.frames(), vec![frame(0), frame(1)]);
}

#[test]
fn wrong_sized_and_failed_readbacks_are_dropped() {
    let (enc, capture) = MemoryEncoder::new();
    let mut session = EncoderSession::with_encoder(cfg(), CpuReadback::new(), enc).unwrap();

    session.submit_frame(&frame(1)).unwrap();
    session.submit_frame(&[9u8; 5]).unwrap();
    assert_eq!(session.submit_frame(&[]).unwrap(), Submission::Dropped);
    session.submit_frame(&frame(2)).unwrap();
    session.close().unwrap();

    let stats = session.stats();
    assert_eq!(stats.dropped_size_mismatch, 1);
    assert_eq!(stats.dropped_readback_error, 1);
    assert_eq!(stats.delivered, 2);
    assert_eq!(stats.written, 2);
    assert_eq!(capture.frames(), vec![frame(1), frame(2)]);
}

#[test]
fn drop_without_close_still_finishes_encoder() {
    let (enc, capture) = MemoryEncoder::new();
    {
        let mut session = EncoderSession::with_encoder(cfg(), CpuReadback::new(), enc).unwrap();
        session.submit_frame(&frame(3)).unwrap();
    }
    assert_eq!(capture.finish_calls(), 1);
    assert!(capture.input_closed());
    assert_eq!(capture.frames(), vec![frame(3)]);
}

#[test]
fn rejected_metadata_is_exposed() {
    let (enc, _capture) = MemoryEncoder::new();
    let mut c = cfg();
    c.metadata = vec![
        crate::encode::args::MetadataTag::new("title", "A \"quoted\" title"),
        crate::encode::args::MetadataTag::new("artist", "someone"),
    ];
    let mut session = EncoderSession::with_encoder(c, CpuReadback::new(), enc).unwrap();
    assert_eq!(session.rejected_metadata().len(), 1);
    assert!(session.args().args.iter().any(|a| a == "artist=someone"));
    session.close().unwrap();
}

#[test]
fn padded_readback_rows_reach_the_encoder_packed() {
    let (enc, capture) = MemoryEncoder::new();
    let row_bytes = (W * 4) as usize;
    let backend = CpuReadback::new().with_row_layout(row_bytes, row_bytes + 12);
    let mut session = EncoderSession::with_encoder(cfg(), backend, enc).unwrap();

    let mut first = frame(0);
    first[row_bytes..].fill(9);
    session.submit_frame(&first).unwrap();
    session.submit_frame(&frame(2)).unwrap();
    session.close().unwrap();

    assert_eq!(capture.frames(), vec![first, frame(2)]);
    assert_eq!(session.stats().dropped_size_mismatch, 0);
}
