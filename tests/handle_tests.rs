//! Tests for StorageHandle
//!
//! These tests verify:
//! - The Empty → Written → Disposed state machine
//! - Text and byte round trips
//! - Sequential, chunked and positioned reads
//! - Independence of materialized read results
//! - Non-blocking forms keep the same error contract
//! - Checksum verification

use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;
use std::thread;

use tempfile::TempDir;
use tempstore::{
    CancellationToken, ErrorKind, HandleState, StorageHandle, StoreConfig, StoreError,
    TemporaryStorage, Utf16Le, Utf8,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_storage() -> TemporaryStorage {
    TemporaryStorage::open(StoreConfig::default()).unwrap()
}

fn new_handle(storage: &TemporaryStorage) -> StorageHandle {
    storage.create_storage(&CancellationToken::none()).unwrap()
}

/// byte[i] = i mod 256
fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 256) as u8).collect()
}

fn assert_invalid_state<T: std::fmt::Debug>(result: tempstore::Result<T>) {
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState, "unexpected error: {}", err);
}

// =============================================================================
// State Machine Tests
// =============================================================================

#[test]
fn test_new_handle_is_empty() {
    let storage = setup_storage();
    let handle = new_handle(&storage);

    assert_eq!(handle.state(), HandleState::Empty);
    assert_eq!(handle.len(), 0);
    assert!(handle.is_empty());
    assert_eq!(storage.stats().live_regions, 0);
}

#[test]
fn test_read_before_write_fails() {
    let storage = setup_storage();
    let handle = new_handle(&storage);

    assert_invalid_state(handle.read_bytes());
    assert_invalid_state(handle.read_text(&Utf8));
    assert_invalid_state(handle.read_at(0, &mut [0u8; 4]));
    assert_invalid_state(handle.read_byte_at(0));
    assert_eq!(handle.state(), HandleState::Empty);
}

#[test]
fn test_second_write_fails_and_keeps_content() {
    let storage = setup_storage();
    let handle = new_handle(&storage);

    handle.write_bytes(b"first").unwrap();

    assert_invalid_state(handle.write_bytes(b"second"));
    assert_invalid_state(handle.write_text("second", &Utf8));
    assert_invalid_state(handle.write_stream(&b"second"[..]));

    assert_eq!(handle.read_bytes().unwrap().into_vec(), b"first");
    assert_eq!(storage.stats().live_regions, 1);
}

#[test]
fn test_second_text_write_keeps_text() {
    let storage = setup_storage();
    let handle = new_handle(&storage);

    handle.write_text("class A {}", &Utf8).unwrap();

    assert_invalid_state(handle.write_text("class B {}", &Utf8));
    assert_eq!(handle.read_text(&Utf8).unwrap(), "class A {}");
}

#[test]
fn test_dispose_releases_region() {
    let storage = setup_storage();
    let handle = new_handle(&storage);
    handle.write_bytes(&pattern(10_000)).unwrap();
    assert_eq!(storage.stats().live_regions, 1);

    handle.dispose();

    assert_eq!(handle.state(), HandleState::Disposed);
    assert_eq!(handle.len(), 0);
    let stats = storage.stats();
    assert_eq!(stats.live_regions, 0);
    assert_eq!(stats.live_segments, 0);
    assert_eq!(stats.regions_reclaimed, 0);
}

#[test]
fn test_operations_after_dispose_fail() {
    let storage = setup_storage();
    let handle = new_handle(&storage);
    handle.write_bytes(b"payload").unwrap();
    handle.dispose();

    assert_invalid_state(handle.read_bytes());
    assert_invalid_state(handle.read_text(&Utf8));
    assert_invalid_state(handle.read_byte_at(0));
    assert_invalid_state(handle.write_bytes(b"again"));
}

#[test]
fn test_empty_write_on_spent_handle_reports_state() {
    let storage = setup_storage();
    let written = new_handle(&storage);
    written.write_bytes(b"payload").unwrap();
    let disposed = new_handle(&storage);
    disposed.dispose();

    assert_invalid_state(written.write_bytes(&[]));
    assert_invalid_state(written.write_stream(std::io::empty()));
    assert_invalid_state(disposed.write_bytes(&[]));
    assert_invalid_state(written.write_bytes_async(Vec::new()).wait());
    assert_eq!(written.read_bytes().unwrap().into_vec(), b"payload");
}

#[test]
fn test_dispose_is_idempotent() {
    let storage = setup_storage();
    let handle = new_handle(&storage);
    handle.write_bytes(b"payload").unwrap();

    handle.dispose();
    handle.dispose();
    handle.dispose();

    assert_eq!(handle.state(), HandleState::Disposed);
    assert_eq!(storage.stats().live_regions, 0);
    assert_eq!(storage.stats().segments_destroyed, 1);
}

#[test]
fn test_dispose_from_empty() {
    let storage = setup_storage();
    let handle = new_handle(&storage);

    handle.dispose();

    assert_eq!(handle.state(), HandleState::Disposed);
    assert_invalid_state(handle.write_bytes(b"late"));
    assert_eq!(storage.stats().segments_created, 0);
}

#[test]
fn test_concurrent_dispose() {
    let storage = setup_storage();
    let handle = Arc::new(new_handle(&storage));
    handle.write_bytes(&pattern(64 * 1024)).unwrap();

    let mut threads = vec![];
    for _ in 0..8 {
        let handle = Arc::clone(&handle);
        threads.push(thread::spawn(move || handle.dispose()));
    }
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(storage.stats().live_regions, 0);
    assert_eq!(storage.stats().segments_destroyed, 1);
}

// =============================================================================
// Argument Validation Tests
// =============================================================================

#[test]
fn test_zero_length_write_fails_without_allocating() {
    let storage = setup_storage();
    let handle = new_handle(&storage);

    let err = handle.write_bytes(&[]).unwrap_err();

    assert!(matches!(err, StoreError::InvalidArgument(_)));
    assert_eq!(handle.state(), HandleState::Empty);
    assert_eq!(storage.stats().segments_created, 0);
    assert_eq!(storage.stats().live_regions, 0);
}

#[test]
fn test_empty_stream_write_fails() {
    let storage = setup_storage();
    let handle = new_handle(&storage);

    let err = handle.write_stream(std::io::empty()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(storage.stats().segments_created, 0);
}

#[test]
fn test_handle_still_writable_after_rejected_write() {
    let storage = setup_storage();
    let handle = new_handle(&storage);

    assert!(handle.write_bytes(&[]).is_err());
    handle.write_bytes(b"ok").unwrap();

    assert_eq!(handle.read_bytes().unwrap().into_vec(), b"ok");
}

#[test]
fn test_write_stream_round_trip() {
    let storage = setup_storage();
    let handle = new_handle(&storage);
    let data = pattern(70_000);

    handle.write_stream(std::io::Cursor::new(data.clone())).unwrap();

    assert_eq!(handle.len(), 70_000);
    assert_eq!(handle.read_bytes().unwrap().into_vec(), data);
}

// =============================================================================
// Text Round Trip Tests
// =============================================================================

#[test]
fn test_text_round_trip_empty() {
    let storage = setup_storage();
    let handle = new_handle(&storage);

    handle.write_text("", &Utf8).unwrap();

    assert_eq!(handle.read_text(&Utf8).unwrap(), "");
}

#[test]
fn test_text_round_trip_4k() {
    let storage = setup_storage();
    let handle = new_handle(&storage);
    let text = format!("{}public class A {{}}", " ".repeat(4096));

    handle.write_text(&text, &Utf8).unwrap();

    assert_eq!(handle.read_text(&Utf8).unwrap(), text);
}

#[test]
fn test_text_round_trip_1mb() {
    let storage = setup_storage();
    let handle = new_handle(&storage);
    let text = format!("{}public class A {{}}", " ".repeat(1024 * 1024));

    handle.write_text(&text, &Utf8).unwrap();

    assert_eq!(handle.read_text(&Utf8).unwrap(), text);
}

#[test]
fn test_text_round_trip_utf16() {
    let storage = setup_storage();
    let handle = new_handle(&storage);
    let text = format!("{}// naïve 🦀\npublic class A {{}}", " ".repeat(4096));

    handle.write_text(&text, &Utf16Le).unwrap();

    assert_eq!(handle.read_text(&Utf16Le).unwrap(), text);
}

#[test]
fn test_text_handle_exposes_encoded_text_as_bytes() {
    let storage = setup_storage();
    let handle = new_handle(&storage);

    handle.write_text("abc", &Utf8).unwrap();

    assert_eq!(handle.len(), 3);
    assert_eq!(handle.read_bytes().unwrap().into_vec(), b"abc");
    assert_eq!(handle.read_bytes_async().wait().unwrap().into_vec(), b"abc");
    assert_eq!(handle.read_byte_at(0).unwrap(), b'a');
    assert_eq!(handle.read_byte_at(2).unwrap(), b'c');
    assert_eq!(handle.read_byte_at(3).unwrap_err().kind(), ErrorKind::InvalidArgument);

    let mut buf = [0u8; 8];
    assert_eq!(handle.read_at(1, &mut buf).unwrap(), 2);
    assert_eq!(&buf[..2], b"bc");
}

#[test]
fn test_empty_text_has_no_content_bytes() {
    let storage = setup_storage();
    let handle = new_handle(&storage);

    handle.write_text("", &Utf8).unwrap();

    assert_eq!(handle.state(), HandleState::Written);
    assert_eq!(handle.len(), 0);
    assert!(handle.read_bytes().unwrap().is_empty());
    assert_eq!(handle.read_at(0, &mut [0u8; 4]).unwrap(), 0);
}

#[test]
fn test_utf16_text_bytes_are_the_encoding() {
    let storage = setup_storage();
    let handle = new_handle(&storage);

    handle.write_text("hi", &Utf16Le).unwrap();

    assert_eq!(handle.read_bytes().unwrap().into_vec(), vec![b'h', 0, b'i', 0]);
}

#[test]
fn test_reading_bytes_as_text_is_invalid_argument() {
    let storage = setup_storage();
    let handle = new_handle(&storage);
    handle.write_bytes(b"hello").unwrap();

    let err = handle.read_text(&Utf8).unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)), "unexpected error: {}", err);

    let err = handle.read_text_async(Utf8).wait().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    // The handle itself is unaffected.
    assert_eq!(handle.state(), HandleState::Written);
    assert_eq!(handle.read_bytes().unwrap().into_vec(), b"hello");
}

// =============================================================================
// Byte Round Trip Tests
// =============================================================================

#[test]
fn test_bytes_full_sequential_read() {
    let storage = setup_storage();
    let handle = new_handle(&storage);
    let data = pattern(1024 * 1024 + 17);

    handle.write_bytes(&data).unwrap();

    let mut stream = handle.read_bytes().unwrap();
    assert_eq!(stream.len(), data.len());
    let mut out = Vec::new();
    stream.read_to_end(&mut out).unwrap();
    assert_eq!(out, data);
}

#[test]
fn test_bytes_chunked_reads() {
    let storage = setup_storage();
    let handle = new_handle(&storage);
    let data = pattern(300_001);
    handle.write_bytes(&data).unwrap();

    for chunk_size in [1usize, 7, 4096, 65_537, 1_000_000] {
        let mut stream = handle.read_bytes().unwrap();
        let mut rebuilt = Vec::with_capacity(data.len());
        let mut buf = vec![0u8; chunk_size];
        loop {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            rebuilt.extend_from_slice(&buf[..n]);
        }
        assert_eq!(rebuilt.len(), data.len(), "chunk size {}", chunk_size);
        assert_eq!(rebuilt, data, "chunk size {}", chunk_size);
    }
}

#[test]
fn test_bytes_seek_then_single_byte_read() {
    let storage = setup_storage();
    let handle = new_handle(&storage);
    let len = 100_000;
    handle.write_bytes(&pattern(len)).unwrap();

    for i in [0usize, 1, 255, 256, 4095, 4096, 65_535, len - 1] {
        let mut stream = handle.read_bytes().unwrap();
        stream.seek(SeekFrom::Start(i as u64)).unwrap();
        let mut byte = [0u8; 1];
        stream.read_exact(&mut byte).unwrap();
        assert_eq!(byte[0], (i % 256) as u8);
    }
}

#[test]
fn test_positioned_reads_from_mapping() {
    let storage = setup_storage();
    let handle = new_handle(&storage);
    let len = 3 * 1024 * 1024;
    handle.write_bytes(&pattern(len)).unwrap();

    for i in [0usize, 12_345, 2 * 1024 * 1024, len - 1] {
        assert_eq!(handle.read_byte_at(i).unwrap(), (i % 256) as u8);
    }

    let mut buf = [0u8; 16];
    assert_eq!(handle.read_at(len - 4, &mut buf).unwrap(), 4);
    assert_eq!(&buf[..4], &pattern(len)[len - 4..]);
    assert_eq!(handle.read_at(len, &mut buf).unwrap(), 0);

    let err = handle.read_byte_at(len).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_single_byte_payload() {
    let storage = setup_storage();
    let handle = new_handle(&storage);

    handle.write_bytes(&[0xAB]).unwrap();

    assert_eq!(handle.len(), 1);
    assert_eq!(handle.read_bytes().unwrap().into_vec(), vec![0xAB]);
}

// =============================================================================
// Read Independence Tests
// =============================================================================

#[test]
fn test_reads_are_independent_copies() {
    let storage = setup_storage();
    let handle = new_handle(&storage);
    let data = pattern(8192);
    handle.write_bytes(&data).unwrap();

    let mut first = handle.read_bytes().unwrap();
    let second = handle.read_bytes().unwrap();
    first.as_mut_slice().fill(0xFF);

    assert_eq!(second.as_slice(), &data[..]);
    assert_eq!(handle.read_bytes().unwrap().into_vec(), data);
}

#[test]
fn test_concurrent_readers() {
    let storage = setup_storage();
    let handle = Arc::new(new_handle(&storage));
    let data = Arc::new(pattern(200_000));
    handle.write_bytes(&data).unwrap();

    let mut threads = vec![];
    for _ in 0..8 {
        let handle = Arc::clone(&handle);
        let data = Arc::clone(&data);
        threads.push(thread::spawn(move || {
            for _ in 0..25 {
                let mut stream = handle.read_bytes().unwrap();
                assert_eq!(stream.as_slice(), &data[..]);
                stream.as_mut_slice()[0] ^= 0xFF;
            }
        }));
    }
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(handle.read_bytes().unwrap().as_slice(), &data[..]);
}

#[test]
fn test_colocated_handles_keep_their_own_bytes() {
    let storage = setup_storage();

    let handles: Vec<StorageHandle> = (0..100u8)
        .map(|i| {
            let handle = new_handle(&storage);
            handle.write_bytes(&vec![i; 1000 + i as usize]).unwrap();
            handle
        })
        .collect();

    // All of them fit in one 4 KB-class segment.
    assert_eq!(storage.stats().live_segments, 1);

    for (i, handle) in handles.iter().enumerate() {
        let content = handle.read_bytes().unwrap().into_vec();
        assert_eq!(content.len(), 1000 + i);
        assert!(content.iter().all(|&b| b == i as u8));
    }

    for handle in &handles {
        handle.dispose();
    }
    assert_eq!(storage.stats().live_segments, 0);
}

// =============================================================================
// Non-blocking Form Tests
// =============================================================================

#[test]
fn test_async_bytes_round_trip() {
    let storage = setup_storage();
    let handle = new_handle(&storage);
    let data = pattern(500_000);

    handle.write_bytes_async(data.clone()).wait().unwrap();

    assert_eq!(handle.state(), HandleState::Written);
    let stream = handle.read_bytes_async().wait().unwrap();
    assert_eq!(stream.into_vec(), data);
}

#[test]
fn test_async_text_round_trip() {
    let storage = setup_storage();
    let handle = new_handle(&storage);
    let text = format!("{}public class A {{}}", " ".repeat(4096));

    handle.write_text_async(text.clone(), Utf8).wait().unwrap();

    assert_eq!(handle.read_text_async(Utf8).wait().unwrap(), text);
    assert_eq!(handle.read_text(&Utf8).unwrap(), text);
}

#[test]
fn test_async_read_before_write_fails() {
    let storage = setup_storage();
    let handle = new_handle(&storage);

    assert_invalid_state(handle.read_bytes_async().wait());
    assert_invalid_state(handle.read_text_async(Utf8).wait());
}

#[test]
fn test_async_second_write_fails() {
    let storage = setup_storage();
    let handle = new_handle(&storage);

    handle.write_bytes_async(&b"first"[..]).wait().unwrap();
    let second = handle.write_bytes_async(&b"second"[..]);

    assert_invalid_state(second.wait());
    assert_eq!(handle.read_bytes().unwrap().into_vec(), b"first");
}

#[test]
fn test_async_zero_length_write_fails() {
    let storage = setup_storage();
    let handle = new_handle(&storage);

    let err = handle.write_bytes_async(Vec::new()).wait().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(storage.stats().segments_created, 0);
}

#[test]
fn test_async_completion_polling() {
    let storage = setup_storage();
    let handle = new_handle(&storage);

    let completion = handle.write_bytes_async(pattern(64 * 1024));
    let result = loop {
        if let Some(result) = completion.wait_timeout(std::time::Duration::from_millis(50)) {
            break result;
        }
    };
    result.unwrap();

    assert_eq!(handle.state(), HandleState::Written);
}

#[test]
fn test_handle_dropped_during_async_write_is_reclaimed() {
    let storage = setup_storage();
    let handle = new_handle(&storage);

    let completion = handle.write_bytes_async(pattern(32 * 1024));
    drop(handle);
    completion.wait().unwrap();

    wait_for_no_live_regions(&storage);
}

// =============================================================================
// Checksum Tests
// =============================================================================

#[test]
fn test_checksum_round_trip() {
    let config = StoreConfig::builder().verify_checksums(true).build();
    let storage = TemporaryStorage::open(config).unwrap();
    let handle = new_handle(&storage);
    let data = pattern(123_456);

    handle.write_bytes(&data).unwrap();

    assert_eq!(handle.read_bytes().unwrap().into_vec(), data);
}

#[cfg(unix)]
#[test]
fn test_checksum_detects_tampered_backing_file() {
    use std::fs::OpenOptions;
    use std::io::Write;

    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::builder()
        .backing_dir(temp_dir.path())
        .verify_checksums(true)
        .build();
    let storage = TemporaryStorage::open(config).unwrap();
    let handle = new_handle(&storage);
    handle.write_bytes(&pattern(4096)).unwrap();

    // First region of the first segment starts at offset 0.
    let mut file = OpenOptions::new()
        .write(true)
        .open(temp_dir.path().join("segment_000001.seg"))
        .unwrap();
    file.write_all(&[0xEE; 16]).unwrap();
    file.sync_all().unwrap();

    let err = handle.read_bytes().unwrap_err();

    assert!(matches!(err, StoreError::Corrupted(_)));
    assert_eq!(err.kind(), ErrorKind::IoFailure);
}

// =============================================================================
// Shared Helpers
// =============================================================================

fn wait_for_no_live_regions(storage: &TemporaryStorage) {
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
    while storage.stats().live_regions > 0 {
        storage.sweep();
        assert!(
            std::time::Instant::now() < deadline,
            "regions were never reclaimed: {:?}",
            storage.stats()
        );
        thread::sleep(std::time::Duration::from_millis(5));
    }
}
