//! Caller-facing side of the pipeline: the ordered readback list and the session that owns the
//! stages and the encoder.

/// Session orchestration.
pub mod encoder_session;
/// In-order resolution of asynchronous readbacks.
pub mod sequencer;
