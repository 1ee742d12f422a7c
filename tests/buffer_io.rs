//! `std::io` adapters and host-side buffer selection.

mod common;

use std::io::{self, Read, Seek, SeekFrom, Write};

use common::{options_4k, pattern};
use sparsemem::{
    BufferConfig, FixedMemoryStream, GranularityPolicy, MemoryBuffer, SparseMemoryStream,
    StreamMode,
};

fn config(capacity: u64) -> BufferConfig {
    BufferConfig::new(capacity)
        .with_granularity(GranularityPolicy::with_granularity(4096).unwrap())
        .with_block_size(4096)
}

#[test]
fn test_io_copy_round_trip() {
    let mut s = SparseMemoryStream::with_options(64 * 1024, options_4k()).unwrap();
    let data = pattern(50_000, 9);

    let copied = io::copy(&mut &data[..], &mut s).unwrap();
    assert_eq!(copied, 50_000);
    assert_eq!(s.stream_position().unwrap(), 50_000);

    s.rewind().unwrap();
    let mut out = vec![0u8; 50_000];
    s.read_exact(&mut out).unwrap();
    assert_eq!(out, data);
}

#[test]
fn test_read_to_end_stops_at_capacity() {
    let mut s = FixedMemoryStream::with_options(10_000, options_4k()).unwrap();
    s.write_all(b"head").unwrap();
    Seek::seek(&mut s, SeekFrom::Start(9_996)).unwrap();
    s.write_all(b"tail").unwrap();

    // Writing at the end moves nothing.
    assert_eq!(Write::write(&mut s, b"x").unwrap(), 0);
    assert_eq!(
        s.write_all(b"x").unwrap_err().kind(),
        io::ErrorKind::WriteZero
    );

    s.rewind().unwrap();
    let mut all = Vec::new();
    assert_eq!(s.read_to_end(&mut all).unwrap(), 10_000);
    assert_eq!(&all[..4], b"head");
    assert_eq!(&all[9_996..], b"tail");
    assert!(all[4..9_996].iter().all(|&b| b == 0));
}

#[test]
fn test_seek_from_end_counts_forward() {
    let mut s = SparseMemoryStream::with_options(8192, options_4k()).unwrap();
    assert_eq!(Seek::seek(&mut s, SeekFrom::End(-10)).unwrap(), 8182);
    assert_eq!(Seek::seek(&mut s, SeekFrom::Current(20)).unwrap(), 10);
    assert_eq!(Seek::seek(&mut s, SeekFrom::Start(8192 + 7)).unwrap(), 7);
}

#[test]
fn test_errors_map_to_io_kinds() {
    let mut wo =
        SparseMemoryStream::with_options(8192, options_4k().with_mode(StreamMode::WriteOnly))
            .unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(
        Read::read(&mut wo, &mut buf).unwrap_err().kind(),
        io::ErrorKind::PermissionDenied
    );

    wo.dispose().unwrap();
    assert_eq!(
        Write::write(&mut wo, &buf).unwrap_err().kind(),
        io::ErrorKind::NotConnected
    );
    assert_eq!(
        Seek::seek(&mut wo, SeekFrom::Start(0)).unwrap_err().kind(),
        io::ErrorKind::NotConnected
    );
}

#[test]
fn test_open_chooses_backing() {
    let small = MemoryBuffer::open(&config(1 << 20)).unwrap();
    assert!(!small.is_sparse());

    let large = MemoryBuffer::open(&config(1 << 30).with_eager_commit_limit(1 << 20)).unwrap();
    assert!(large.is_sparse());
    assert_eq!(large.capacity(), 1 << 30);
    assert_eq!(large.stats().allocated_bytes, 0);
}

#[test]
fn test_buffer_streams_through_io() {
    for limit in [0u64, u64::MAX] {
        let mut buffer = MemoryBuffer::open(&config(32 * 1024).with_eager_commit_limit(limit))
            .unwrap();
        let data = pattern(20_000, 1);
        Seek::seek(&mut buffer, SeekFrom::Start(5000)).unwrap();
        buffer.write_all(&data).unwrap();

        Seek::seek(&mut buffer, SeekFrom::Start(5000)).unwrap();
        let mut out = vec![0u8; data.len()];
        buffer.read_exact(&mut out).unwrap();
        assert_eq!(out, data, "eager limit {limit}");
        buffer.flush().unwrap();
    }
}
