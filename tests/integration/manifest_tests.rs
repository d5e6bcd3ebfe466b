//! Manifest reader tests.
//!
//! Tests verify:
//! - Open errors and their codes
//! - Pixel files resolved relative to the manifest
//! - Sticky read state under a masking policy

use sb_loader::{
    read_string_field, CaptureReader, ErrorCode, ErrorKind, ErrorPolicy, ManifestReader,
    StringField,
};

use super::test_utils::{capture_entry, plane_value, ManifestFixture};

// =============================================================================
// Opening
// =============================================================================

#[test]
fn test_missing_manifest_unable_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let err = ManifestReader::open(dir.path().join("absent.json"), ErrorPolicy::MASK_ALL)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::UnableToOpen);
    assert_eq!(err.kind, ErrorKind::Fail);
}

#[test]
fn test_malformed_manifest_invalid_document() {
    let fixture = ManifestFixture::write_text("{ \"captures\": [ {");
    let err = ManifestReader::open(&fixture.path, ErrorPolicy::MASK_ALL).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidSlideDocument);
    assert_eq!(err.kind, ErrorKind::Bad);
}

#[test]
fn test_missing_pixel_file_unable_to_open() {
    let fixture = ManifestFixture::write_text(
        r#"{ "captures": [{ "columns": 2, "rows": 2, "planes": 1, "timepoints": 1,
             "channels": [{ "name": "DAPI" }], "pixels": "gone.raw" }] }"#,
    );
    let err = ManifestReader::open(&fixture.path, ErrorPolicy::MASK_ALL).unwrap_err();
    assert_eq!(err.code, ErrorCode::UnableToOpen);
    assert!(err.message.contains("gone.raw"));
}

#[test]
fn test_minimal_manifest_defaults() {
    let fixture = ManifestFixture::write_text(
        r#"{ "captures": [{ "columns": 2, "rows": 2, "planes": 1, "timepoints": 2,
             "channels": [{ "name": "DAPI" }] }] }"#,
    );
    let reader = ManifestReader::open(&fixture.path, ErrorPolicy::RAISE_ALL).unwrap();

    assert_eq!(reader.identifier(), fixture.path.display().to_string());
    assert_eq!(reader.position_count(0).unwrap(), 1);
    assert_eq!(reader.elapsed_time(0, 1).unwrap(), 0);
    assert_eq!(reader.voxel_size(0).unwrap(), None);
    assert_eq!(read_string_field(&reader, 0, StringField::ImageName).unwrap(), "");
    assert_eq!(
        read_string_field(&reader, 0, StringField::ChannelName(0)).unwrap(),
        "DAPI"
    );
}

// =============================================================================
// Pixels and State
// =============================================================================

#[test]
fn test_pixel_file_relative_to_manifest() {
    let fixture = ManifestFixture::write(vec![capture_entry(1, 2, 1)]);
    assert!(fixture.dir().join("capture_0.raw").exists());

    let reader = ManifestReader::open(&fixture.path, ErrorPolicy::RAISE_ALL).unwrap();
    let mut plane = vec![0u16; 12];
    assert!(reader.read_plane(&mut plane, 8, 0, 0, 0, 0, 1).unwrap());
    assert!(plane.iter().all(|&v| v == plane_value(0, 0, 1, 0)));
}

#[test]
fn test_masked_failures_accumulate_until_cleared() {
    let fixture = ManifestFixture::write(vec![capture_entry(1, 1, 1)]);
    let reader = ManifestReader::open(&fixture.path, ErrorPolicy::MASK_ALL).unwrap();
    assert!(reader.state().is_good());

    assert_eq!(reader.channel_count(3).unwrap(), 0);
    let mut plane = vec![0u16; 12];
    assert!(!reader.read_plane(&mut plane, 8, 0, 0, 4, 0, 0).unwrap());

    let state = reader.state();
    assert!(state.contains(ErrorKind::Fail));
    // a successful read does not reset the state
    assert!(reader.read_plane(&mut plane, 8, 0, 0, 0, 0, 0).unwrap());
    assert!(!reader.state().is_good());

    reader.clear();
    assert!(reader.state().is_good());
}

#[test]
fn test_policy_selects_raised_kinds() {
    let fixture = ManifestFixture::write(vec![capture_entry(1, 1, 1)]);
    let policy = ErrorPolicy::MASK_ALL.with_raised(ErrorKind::Fail);
    let reader = ManifestReader::open(&fixture.path, policy).unwrap();

    let err = reader.timepoint_count(9).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidCaptureIndex);
    assert!(reader.state().contains(ErrorKind::Fail));
}

#[test]
fn test_zero_width_capture_loads_without_pixels() {
    let fixture = ManifestFixture::write_text(
        r#"{ "captures": [{ "rows": 4, "planes": 2, "timepoints": 1,
             "channels": [{ "name": "BF" }] }] }"#,
    );
    let reader = ManifestReader::open(&fixture.path, ErrorPolicy::RAISE_ALL).unwrap();

    let summary = sb_loader::CaptureLoader::new(&reader, Default::default())
        .run()
        .unwrap();
    assert!(summary.is_success());
    assert_eq!(summary.planes_requested(), 2);
}
