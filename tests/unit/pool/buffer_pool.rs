use super::*;

#[test]
fn same_size_buffers_are_reused() {
    let pool = BufferPool::new(BufferPoolOpts::default());

    let a = pool.acquire_copy(&[1u8; 16]);
    assert_eq!(&a[..], &[1u8; 16]);
    pool.release(a);

    let b = pool.acquire_copy(&[2u8; 16]);
    assert_eq!(&b[..], &[2u8; 16], "reused buffer must hold the new bytes");

    let st = pool.stats();
    assert_eq!(st.alloc_buffers, 1);
    assert_eq!(st.reuses, 1);
    assert_eq!(st.retained_buffers, 0);
}

#[test]
fn size_mismatch_allocates_a_new_buffer() {
    let pool = BufferPool::new(BufferPoolOpts::default());
    pool.release(pool.acquire_copy(&[0u8; 16]));

    let other = pool.acquire_copy(&[5u8; 32]);
    assert_eq!(other.len(), 32);

    let st = pool.stats();
    assert_eq!(st.alloc_buffers, 2);
    assert_eq!(st.reuses, 0);
    assert_eq!(st.retained_buffers, 1);
}

#[test]
fn pool_honors_per_size_cap() {
    let pool = BufferPool::new(BufferPoolOpts {
        max_pool_bytes: 1 << 30,
        max_buffers_per_size: 1,
    });

    let a = pool.acquire_copy(&[0u8; 64]);
    let b = pool.acquire_copy(&[0u8; 64]);
    pool.release(a);
    pool.release(b);

    let st = pool.stats();
    assert_eq!(st.retained_buffers, 1);
    assert_eq!(st.dropped_on_release, 1);
}

#[test]
fn pool_honors_global_byte_cap() {
    let pool = BufferPool::new(BufferPoolOpts {
        max_pool_bytes: 64,
        max_buffers_per_size: 8,
    });

    let a = pool.acquire_copy(&[0u8; 64]);
    let b = pool.acquire_copy(&[0u8; 64]);
    pool.release(a);
    pool.release(b);

    let st = pool.stats();
    assert_eq!(st.retained_bytes, 64);
    assert_eq!(st.retained_buffers, 1);
    assert!(st.dropped_on_release >= 1);
}

#[test]
fn live_counter_tracks_every_buffer_until_dropped() {
    let pool = BufferPool::new(BufferPoolOpts::default());

    let a = pool.acquire_copy(&[0u8; 8]);
    let b = pool.acquire_copy(&[0u8; 8]);
    assert_eq!(pool.stats().live_buffers, 2);

    pool.release(a);
    assert_eq!(pool.stats().live_buffers, 2, "idle buffers are still alive");

    drop(b);
    assert_eq!(pool.stats().live_buffers, 1);
}

#[test]
fn disabled_pool_retains_nothing() {
    let pool = BufferPool::new(BufferPoolOpts {
        max_pool_bytes: 0,
        max_buffers_per_size: 8,
    });
    pool.release(pool.acquire_copy(&[0u8; 8]));

    let st = pool.stats();
    assert_eq!(st.retained_buffers, 0);
    assert_eq!(st.live_buffers, 0);
}

#[test]
fn padded_rows_arrive_packed_in_pooled_buffers() {
    use crate::readback::PitchedFrame;

    let pool = BufferPool::new(BufferPoolOpts::default());
    // Three rows of 4 pixel bytes, each padded to 8 bytes.
    let staged = |tag: u8| {
        let mut data = vec![0xee; 24];
        for row in 0..3 {
            data[row * 8..row * 8 + 4].fill(tag + row as u8);
        }
        PitchedFrame::new(data, 4, 8).unwrap()
    };
    let expected = |tag: u8| {
        let mut out = Vec::new();
        for row in 0..3 {
            out.extend_from_slice(&[tag + row as u8; 4]);
        }
        out
    };

    let a = pool.acquire_copy(&staged(1));
    assert_eq!(&a[..], &expected(1)[..]);
    pool.release(a);

    // The reused buffer has the packed length, not the staged one.
    let b = pool.acquire_copy(&staged(10));
    assert_eq!(&b[..], &expected(10)[..]);

    let st = pool.stats();
    assert_eq!(st.alloc_buffers, 1);
    assert_eq!(st.alloc_bytes, 12);
    assert_eq!(st.reuses, 1);
}
