use super::*;
use std::io::Write as _;
use std::time::Duration;

#[test]
fn flush_splits_frames() {
    let (mut enc, capture) = MemoryEncoder::new();
    let mut input = enc.take_input().unwrap();
    input.write_all(&[1, 1]).unwrap();
    input.flush().unwrap();
    input.write_all(&[2, 2]).unwrap();
    input.flush().unwrap();
    input.flush().unwrap();

    assert_eq!(capture.frames(), vec![vec![1, 1], vec![2, 2]]);
    assert!(!capture.input_closed());
    drop(input);
    assert!(capture.input_closed());

    assert!(enc.take_input().is_err());
    assert_eq!(enc.with_diagnostics("done").finish().unwrap(), "done");
    assert_eq!(capture.finish_calls(), 1);
}

#[test]
fn failing_input_reports_broken_pipe() {
    let (mut enc, capture) = MemoryEncoder::new();
    let mut input = enc.take_input().unwrap();
    capture.fail_writes();
    let err = input.write_all(&[0; 4]).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    assert_eq!(capture.frame_count(), 0);
}

#[test]
fn paused_input_blocks_until_resumed() {
    let (mut enc, capture) = MemoryEncoder::new();
    let mut input = enc.take_input().unwrap();
    capture.pause();

    let writer = std::thread::spawn(move || {
        input.write_all(&[7; 3]).unwrap();
        input.flush().unwrap();
    });

    while capture.writes_started() == 0 {
        std::thread::sleep(Duration::from_millis(1));
    }
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(capture.frame_count(), 0);

    capture.resume();
    writer.join().unwrap();
    assert_eq!(capture.frames(), vec![vec![7; 3]]);
}

#[test]
fn step_lets_single_writes_through_while_paused() {
    let (mut enc, capture) = MemoryEncoder::new();
    let mut input = enc.take_input().unwrap();
    capture.pause();

    let writer = std::thread::spawn(move || {
        for tag in 0..3u8 {
            input.write_all(&[tag; 2]).unwrap();
            input.flush().unwrap();
        }
    });

    capture.step(1);
    while capture.writes_started() < 2 {
        std::thread::sleep(Duration::from_millis(1));
    }
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(capture.writes_finished(), 1);
    assert_eq!(capture.frames(), vec![vec![0, 0]]);

    capture.step(2);
    writer.join().unwrap();
    assert_eq!(capture.writes_finished(), 3);
    assert_eq!(capture.frame_count(), 3);
}
