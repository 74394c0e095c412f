//! Playback sink tests

use pushtalk::Error;
use pushtalk::voice::{AudioChunk, AudioFormat, PlaybackSink};

mod common;

use common::FakeOutput;

#[test]
fn test_chunks_rendered_in_write_order() {
    let output = FakeOutput::new();
    let mut sink = PlaybackSink::open(&output, AudioFormat::default()).unwrap();

    sink.write(&AudioChunk::new(vec![1, 2, 3])).unwrap();
    sink.write(&AudioChunk::new(vec![])).unwrap();
    sink.write(&AudioChunk::new(vec![4])).unwrap();
    sink.write(&AudioChunk::new(vec![5, 6])).unwrap();

    assert_eq!(output.rendered(), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(sink.samples_written(), 6);
    // Empty chunks never reach the device
    assert_eq!(output.log.lock().unwrap().writes.len(), 3);
}

#[test]
fn test_write_after_close_fails() {
    let output = FakeOutput::new();
    let mut sink = PlaybackSink::open(&output, AudioFormat::default()).unwrap();
    sink.close();

    let err = sink.write(&AudioChunk::new(vec![1])).unwrap_err();

    assert!(matches!(err, Error::Audio(_)));
    assert!(output.rendered().is_empty());
}

#[test]
fn test_close_is_idempotent() {
    let output = FakeOutput::new();
    let mut sink = PlaybackSink::open(&output, AudioFormat::default()).unwrap();
    assert!(sink.is_open());

    sink.close();
    sink.close();
    assert!(!sink.is_open());
    drop(sink);

    assert_eq!(output.opened(), 1);
    assert_eq!(output.closed(), 1);
}

#[test]
fn test_drop_closes_device() {
    let output = FakeOutput::new();
    {
        let mut sink = PlaybackSink::open(&output, AudioFormat::default()).unwrap();
        sink.write(&AudioChunk::new(vec![9])).unwrap();
    }
    assert_eq!(output.closed(), 1);
}

#[test]
fn test_open_failure_is_fatal() {
    let output = FakeOutput::failing();

    let err = PlaybackSink::open(&output, AudioFormat::default())
        .err()
        .expect("open must fail");

    assert!(matches!(err, Error::DeviceOpen(_)));
    assert!(err.is_fatal());
    assert_eq!(output.opened(), 0);
}
