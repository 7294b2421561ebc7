use super::*;

#[test]
fn pitched_frame_drops_row_padding() {
    // Two rows of 3 pixel bytes, each padded to 4.
    let frame = PitchedFrame::new(vec![1, 2, 3, 0xee, 4, 5, 6, 0xee], 3, 4).unwrap();
    assert_eq!(frame.len(), 6);

    let mut out = [0u8; 6];
    frame.copy_into(&mut out);
    assert_eq!(out, [1, 2, 3, 4, 5, 6]);
}

#[test]
fn pitched_frame_rejects_inconsistent_layouts() {
    assert!(PitchedFrame::new(vec![0; 8], 5, 4).is_err());
    assert!(PitchedFrame::new(vec![0; 9], 3, 4).is_err());
}

#[test]
fn host_buffers_are_already_packed() {
    let v = vec![9u8; 5];
    assert_eq!(MappedFrame::len(&v), 5);
    assert!(!MappedFrame::is_empty(&v));

    let mut out = [0u8; 5];
    v.copy_into(&mut out);
    assert_eq!(out, [9; 5]);

    let empty: Box<[u8]> = Box::new([]);
    assert!(MappedFrame::is_empty(&empty));
}
