//! Whole-document loading tests.
//!
//! Tests verify:
//! - Every capture is visited with its own buffer size
//! - Position selection and timepoint limits
//! - Failure aggregation and JSON reports

use std::ops::ControlFlow;

use sb_loader::{
    CaptureLoader, ErrorPolicy, LoadEvent, LoadOptions, ManifestReader, PositionEntry,
    PositionSelection,
};

use super::test_utils::{capture_entry, plane_value, ManifestFixture, RecordingReader};

#[test]
fn test_every_capture_loaded() {
    let mut wide = capture_entry(1, 1, 2);
    wide.columns = 8;
    let fixture = ManifestFixture::write(vec![capture_entry(2, 2, 1), wide]);
    let reader = RecordingReader::new(
        ManifestReader::open(&fixture.path, ErrorPolicy::RAISE_ALL).unwrap(),
    );

    let mut stacks = Vec::new();
    let summary = CaptureLoader::new(&reader, LoadOptions::default())
        .run_with(|event| {
            if let LoadEvent::Stack {
                metadata,
                timepoint,
                channel,
                samples,
                ..
            } = event
            {
                assert_eq!(samples.len(), metadata.samples_per_stack().unwrap());
                assert_eq!(samples[0], plane_value(0, timepoint, channel, 0));
                stacks.push((metadata.capture_index, timepoint, channel));
            }
            ControlFlow::Continue(())
        })
        .unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.captures.len(), 2);
    assert_eq!(summary.planes_requested(), 6);
    assert_eq!(stacks, vec![(0, 0, 0), (0, 0, 1), (0, 1, 0), (0, 1, 1), (1, 0, 0)]);

    let strides: Vec<usize> = reader
        .requests
        .borrow()
        .iter()
        .map(|r| r.stride_bytes)
        .collect();
    assert_eq!(strides, vec![8, 8, 8, 8, 16, 16]);
}

#[test]
fn test_all_positions() {
    let mut entry = capture_entry(1, 1, 1);
    entry.positions = vec![PositionEntry::default(); 3];
    let fixture = ManifestFixture::write(vec![entry]);
    let reader = RecordingReader::new(
        ManifestReader::open(&fixture.path, ErrorPolicy::RAISE_ALL).unwrap(),
    );

    let options = LoadOptions {
        positions: PositionSelection::All,
        ..Default::default()
    };
    let summary = CaptureLoader::new(&reader, options).run().unwrap();

    assert!(summary.is_success());
    let positions: Vec<u32> = reader.requests.borrow().iter().map(|r| r.position).collect();
    assert_eq!(positions, vec![0, 1, 2]);
}

#[test]
fn test_failures_collected_across_captures() {
    let fixture = ManifestFixture::write(vec![capture_entry(3, 1, 2), capture_entry(3, 1, 2)]);
    let reader = RecordingReader::new(
        ManifestReader::open(&fixture.path, ErrorPolicy::RAISE_ALL).unwrap(),
    )
    .failing(&[(2, 0, 1)]);

    let summary = CaptureLoader::new(&reader, LoadOptions::default())
        .run()
        .unwrap();

    assert!(!summary.is_success());
    assert_eq!(summary.failed_planes(), 2);
    assert_eq!(summary.planes_requested(), 12);
}

#[test]
fn test_max_timepoints_option() {
    let fixture = ManifestFixture::write(vec![capture_entry(4, 2, 1)]);
    let reader = ManifestReader::open(&fixture.path, ErrorPolicy::RAISE_ALL).unwrap();
    let options = LoadOptions {
        max_timepoints: Some(1),
        ..Default::default()
    };
    let summary = CaptureLoader::new(&reader, options).run().unwrap();
    assert_eq!(summary.planes_requested(), 2);
    assert!(summary.is_success());
}

#[test]
fn test_cancel_from_capture_event() {
    let fixture = ManifestFixture::write(vec![capture_entry(1, 1, 1), capture_entry(1, 1, 1)]);
    let reader = RecordingReader::new(
        ManifestReader::open(&fixture.path, ErrorPolicy::RAISE_ALL).unwrap(),
    );

    let summary = CaptureLoader::new(&reader, LoadOptions::default())
        .run_with(|event| match event {
            LoadEvent::Capture(meta) if meta.capture_index == 1 => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        })
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.captures.len(), 1);
    assert_eq!(reader.requests.borrow().len(), 1);
}

#[test]
fn test_summary_serializes_to_json() {
    let fixture = ManifestFixture::write(vec![capture_entry(2, 1, 1)]);
    let reader = RecordingReader::new(
        ManifestReader::open(&fixture.path, ErrorPolicy::RAISE_ALL).unwrap(),
    )
    .failing(&[(1, 0, 0)]);
    let summary = CaptureLoader::new(&reader, LoadOptions::default())
        .run()
        .unwrap();

    let json = serde_json::to_value(&summary).unwrap();
    let capture = &json["captures"][0];
    assert_eq!(capture["metadata"]["image_name"], "HeLa live");
    assert_eq!(capture["streams"][0]["requested"], 2);
    assert_eq!(capture["streams"][0]["failures"][0]["coord"]["timepoint"], 1);
    assert!(capture["streams"][0]["failures"][0]["error"]
        .as_str()
        .unwrap()
        .contains("injected failure"));
    assert_eq!(json["cancelled"], false);
}

#[test]
fn test_cancel_on_last_stack_of_capture() {
    let fixture = ManifestFixture::write(vec![capture_entry(1, 2, 2), capture_entry(1, 1, 1)]);
    let reader = RecordingReader::new(
        ManifestReader::open(&fixture.path, ErrorPolicy::RAISE_ALL).unwrap(),
    );

    let summary = CaptureLoader::new(&reader, LoadOptions::default())
        .run_with(|event| match event {
            LoadEvent::Stack { channel: 1, .. } => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        })
        .unwrap();

    assert!(summary.cancelled);
    assert!(!summary.is_success());
    assert_eq!(summary.captures.len(), 1);
    assert!(summary.captures[0].streams[0].completed);
    assert!(reader.requests.borrow().iter().all(|r| r.capture == 0));
    assert_eq!(reader.requests.borrow().len(), 4);
}
