//! Reusable frame buffer allocation.

/// Size-keyed free-list of frame buffers.
pub mod buffer_pool;
