use super::*;
use crate::readback::MappedFrame;

fn packed(frame: &PitchedFrame) -> Vec<u8> {
    let mut out = vec![0; frame.len()];
    frame.copy_into(&mut out);
    out
}

#[test]
fn immediate_backend_completes_on_first_poll() {
    let mut backend = CpuReadback::new();
    assert!(backend.supports_async_readback());

    let mut req = backend.request_readback(&[1, 2, 3, 4]).unwrap();
    assert!(req.is_complete());
    assert_eq!(packed(&req.finish().unwrap()), vec![1, 2, 3, 4]);
}

#[test]
fn delayed_backend_needs_polls_or_a_wait() {
    let mut backend = CpuReadback::with_completion_delay(2);

    let mut polled = backend.request_readback(&[9; 4]).unwrap();
    assert!(!polled.is_complete());
    assert!(!polled.is_complete());
    assert!(polled.is_complete());

    let mut waited = backend.request_readback(&[7; 4]).unwrap();
    assert!(!waited.is_complete());
    waited.wait();
    assert!(waited.is_complete());
    assert_eq!(packed(&waited.finish().unwrap()), vec![7; 4]);
}

#[test]
fn empty_surface_is_rejected() {
    let mut backend = CpuReadback::new();
    let err = backend.request_readback(&[]).unwrap_err();
    assert!(err.reason().contains("empty"));
}

#[test]
fn row_layout_stages_padded_rows_and_hands_back_packed_ones() {
    let mut backend = CpuReadback::new().with_row_layout(3, 8);
    let surface = [1, 2, 3, 4, 5, 6];

    let frame = backend.request_readback(&surface).unwrap().finish().unwrap();
    assert_eq!(frame.len(), 6);
    assert_eq!(packed(&frame), surface.to_vec());
}

#[test]
fn row_layout_rejects_surfaces_that_do_not_fit() {
    let mut ragged = CpuReadback::new().with_row_layout(4, 8);
    assert!(ragged.request_readback(&[0; 6]).is_err());

    let mut narrow = CpuReadback::new().with_row_layout(8, 4);
    assert!(narrow.request_readback(&[0; 8]).is_err());
}
