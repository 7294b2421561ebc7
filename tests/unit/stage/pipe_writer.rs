use super::*;
use crate::encode::Encoder as _;
use crate::encode::memory::MemoryEncoder;
use crate::pool::buffer_pool::BufferPoolOpts;
use std::io;

struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn writes_in_queue_order_and_recycles_buffers() {
    let pool = Arc::new(BufferPool::new(BufferPoolOpts::default()));
    let counters = Arc::new(StageCounters::default());
    let (mut enc, capture) = MemoryEncoder::new();
    let mut stage =
        PipeWriterStage::spawn(enc.take_input().unwrap(), Arc::clone(&pool), Arc::clone(&counters))
            .unwrap();

    let queue = stage.queue();
    for i in 0..4u8 {
        queue.push(pool.acquire_copy(&[i; 8])).unwrap();
    }
    stage.stop();

    assert_eq!(
        capture.frames(),
        (0..4u8).map(|i| vec![i; 8]).collect::<Vec<_>>()
    );
    assert!(capture.input_closed());
    assert_eq!(StageCounters::get(&counters.written), 4);
    assert_eq!(stage.depth(), 0);
    assert_eq!(pool.stats().live_buffers, pool.stats().retained_buffers);
}

#[test]
fn write_failures_are_counted_not_fatal() {
    let pool = Arc::new(BufferPool::new(BufferPoolOpts::default()));
    let counters = Arc::new(StageCounters::default());
    let mut stage =
        PipeWriterStage::spawn(BrokenPipe, Arc::clone(&pool), Arc::clone(&counters)).unwrap();

    let queue = stage.queue();
    for _ in 0..3 {
        queue.push(pool.acquire_copy(&[0; 8])).unwrap();
    }
    stage.wait_until_depth_at_most(0);
    assert_eq!(StageCounters::get(&counters.write_failures), 3);
    assert_eq!(StageCounters::get(&counters.written), 0);

    stage.stop();
    stage.stop();
}

#[test]
fn depth_wait_releases_once_writer_catches_up() {
    let pool = Arc::new(BufferPool::new(BufferPoolOpts::default()));
    let counters = Arc::new(StageCounters::default());
    let (mut enc, capture) = MemoryEncoder::new();
    capture.pause();
    let mut stage =
        PipeWriterStage::spawn(enc.take_input().unwrap(), Arc::clone(&pool), counters).unwrap();

    let queue = stage.queue();
    for i in 0..6u8 {
        queue.push(pool.acquire_copy(&[i; 4])).unwrap();
    }
    assert_eq!(stage.depth(), 6);

    let resumer = {
        let capture = capture.clone();
        std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            capture.resume();
        })
    };
    stage.wait_until_depth_at_most(2);
    assert!(stage.depth() <= 2);

    resumer.join().unwrap();
    stage.stop();
    assert_eq!(capture.frame_count(), 6);
}
