//! End-to-end session tests against simulated hardware.
//!
//! Every test runs the full capture -> analyze -> render -> report pipeline
//! in a temporary output root and checks the artifacts and hardware
//! bookkeeping left behind.

use colometry::config::ColometryConfig;
use colometry::errors::ColometryError;
use colometry::testing::SimulatedHardware;
use colometry::{
    CancelFlag, CaptureSession, IlluminationColor, RegionOfInterest, SessionOutcome, SessionState,
};
use chrono::{Local, TimeZone};
use lopdf::{Document, ObjectId};
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

fn test_config(root: &Path, count: u32) -> ColometryConfig {
    let mut config = ColometryConfig::default();
    config.session.capture_count = count;
    config.session.inter_capture_delay_ms = 0;
    config.storage.output_root = root.to_string_lossy().into_owned();
    config
}

fn pdf_page_count(path: &Path) -> usize {
    Document::load(path).unwrap().get_pages().len()
}

/// Pixel size of the capture image (`Im1`) drawn on a page.
fn capture_image_size(doc: &Document, page_id: ObjectId) -> (i64, i64) {
    let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
    let resources_id = page.get(b"Resources").unwrap().as_reference().unwrap();
    let resources = doc.get_object(resources_id).unwrap().as_dict().unwrap();
    let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
    let image_id = xobjects.get(b"Im1").unwrap().as_reference().unwrap();
    let image = doc.get_object(image_id).unwrap().as_stream().unwrap();
    (
        image.dict.get(b"Width").unwrap().as_i64().unwrap(),
        image.dict.get(b"Height").unwrap().as_i64().unwrap(),
    )
}

fn files_in(dir: &Path) -> usize {
    fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[test]
fn test_full_session_produces_one_page_per_capture() {
    let root = tempdir().unwrap();
    let provider = SimulatedHardware::new(640, 480);
    let counters = provider.counters();

    let manifest = CaptureSession::new(provider, &test_config(root.path(), 4))
        .run()
        .unwrap();

    assert_eq!(manifest.outcome, SessionOutcome::Completed);
    assert_eq!(manifest.completed_captures, 4);
    assert_eq!(manifest.page_count, 4);
    assert_eq!(manifest.image_paths.len(), 4);
    assert_eq!(manifest.histogram_paths.len(), 4);
    for (image, histogram) in manifest.image_paths.iter().zip(&manifest.histogram_paths) {
        assert!(image.exists(), "missing {:?}", image);
        assert!(histogram.exists(), "missing {:?}", histogram);
    }

    let pdf = manifest.document_path.unwrap();
    assert_eq!(pdf_page_count(&pdf), 4);
    assert_eq!(counters.acquisitions(), 1);
    assert_eq!(counters.releases(), 1);
}

#[test]
fn test_capture_indices_are_sequential() {
    let root = tempdir().unwrap();
    let manifest = CaptureSession::new(SimulatedHardware::new(320, 240), &test_config(root.path(), 3))
        .run()
        .unwrap();

    let indices: Vec<u32> = manifest
        .capture_records
        .iter()
        .map(|r| r.capture_index)
        .collect();
    assert_eq!(indices, vec![1, 2, 3]);
}

#[test]
fn test_histograms_sum_to_roi_area() {
    let root = tempdir().unwrap();
    let manifest = CaptureSession::new(SimulatedHardware::new(800, 600), &test_config(root.path(), 2))
        .run()
        .unwrap();

    for record in &manifest.capture_records {
        let area = record.region_of_interest.area();
        for channel in &record.per_channel_histogram {
            assert_eq!(channel.len(), 256);
            assert_eq!(channel.iter().map(|&c| c as u64).sum::<u64>(), area);
        }
    }
}

#[test]
fn test_capture_failure_keeps_earlier_pages() {
    let root = tempdir().unwrap();
    let provider = SimulatedHardware::new(640, 480).fail_capture_at(3);
    let counters = provider.counters();

    let manifest = CaptureSession::new(provider, &test_config(root.path(), 5))
        .run()
        .unwrap();

    assert_eq!(manifest.completed_captures, 2);
    assert_eq!(manifest.page_count, 2);
    assert!(matches!(
        manifest.outcome,
        SessionOutcome::EndedEarly { failed_capture: 3, .. }
    ));
    assert_eq!(pdf_page_count(manifest.document_path.as_ref().unwrap()), 2);
    assert_eq!(counters.captures(), 3);
    assert_eq!(counters.releases(), 1);
}

#[test]
fn test_full_hd_second_capture_failure() {
    let root = tempdir().unwrap();
    let provider = SimulatedHardware::new(1920, 1080).fail_capture_at(2);
    let counters = provider.counters();

    let manifest = CaptureSession::new(provider, &test_config(root.path(), 3))
        .run()
        .unwrap();

    assert_eq!(manifest.completed_captures, 1);
    assert_eq!(manifest.page_count, 1);
    assert_eq!(
        manifest.capture_records[0].region_of_interest,
        RegionOfInterest {
            x: 880,
            y: 360,
            width: 160,
            height: 360
        }
    );
    assert_eq!(counters.releases(), 1);
}

#[test]
fn test_first_capture_failure_still_writes_empty_report() {
    let root = tempdir().unwrap();
    let manifest = CaptureSession::new(
        SimulatedHardware::new(320, 240).fail_capture_at(1),
        &test_config(root.path(), 3),
    )
    .run()
    .unwrap();

    assert_eq!(manifest.completed_captures, 0);
    assert_eq!(manifest.page_count, 0);
    let pdf = manifest.document_path.unwrap();
    assert!(pdf.exists());
    assert_eq!(pdf_page_count(&pdf), 0);
}

#[test]
fn test_acquire_failure_surfaces_before_any_report() {
    let root = tempdir().unwrap();
    let provider = SimulatedHardware::new(320, 240).fail_acquire();
    let counters = provider.counters();

    let failure = CaptureSession::new(provider, &test_config(root.path(), 3))
        .run()
        .unwrap_err();

    assert!(matches!(failure.error, ColometryError::ResourceUnavailable(_)));
    assert_eq!(failure.manifest.completed_captures, 0);
    assert_eq!(failure.manifest.document_path, None);
    assert_eq!(files_in(&root.path().join("pdf")), 0);
    assert_eq!(counters.releases(), 0);
}

#[test]
fn test_fatal_analysis_error_saves_partial_report_and_releases() {
    let root = tempdir().unwrap();
    let provider = SimulatedHardware::new(640, 480).degenerate_frame_at(3);
    let counters = provider.counters();

    let mut session = CaptureSession::new(provider, &test_config(root.path(), 5));
    let failure = session.run().unwrap_err();

    assert!(matches!(failure.error, ColometryError::AnalysisFailure(_)));
    assert_eq!(failure.manifest.completed_captures, 2);
    let pdf = failure.manifest.document_path.clone().unwrap();
    assert_eq!(pdf_page_count(&pdf), 2);
    assert_eq!(counters.releases(), 1);
    assert_eq!(session.state(), SessionState::Aborted);
}

#[test]
fn test_finalize_fault_still_releases_once() {
    let root = tempdir().unwrap();
    let pdf_dir = root.path().join("pdf");
    let provider = SimulatedHardware::new(320, 240).on_capture(move |n| {
        if n == 1 {
            // A regular file where the report directory should be
            let _ = fs::remove_dir_all(&pdf_dir);
            let _ = fs::write(&pdf_dir, b"not a directory");
        }
    });
    let counters = provider.counters();

    let failure = CaptureSession::new(provider, &test_config(root.path(), 2))
        .run()
        .unwrap_err();

    assert!(matches!(failure.error, ColometryError::Pdf(_)));
    assert_eq!(failure.manifest.document_path, None);
    assert_eq!(failure.manifest.completed_captures, 2);
    assert_eq!(counters.releases(), 1);
}

#[test]
fn test_release_failure_is_not_fatal() {
    let root = tempdir().unwrap();
    let provider = SimulatedHardware::new(320, 240).fail_release();
    let counters = provider.counters();

    let manifest = CaptureSession::new(provider, &test_config(root.path(), 2))
        .run()
        .unwrap();

    assert_eq!(manifest.completed_captures, 2);
    assert_eq!(counters.releases(), 1);
}

#[test]
fn test_artifacts_stay_on_disk_after_finalize() {
    let root = tempdir().unwrap();
    CaptureSession::new(SimulatedHardware::new(320, 240), &test_config(root.path(), 3))
        .run()
        .unwrap();

    assert_eq!(files_in(&root.path().join("captures_image")), 3);
    assert_eq!(files_in(&root.path().join("histogram")), 3);
    assert_eq!(files_in(&root.path().join("pdf")), 1);
}

#[test]
fn test_pages_embed_the_stored_frame() {
    let root = tempdir().unwrap();
    let manifest = CaptureSession::new(SimulatedHardware::new(320, 240), &test_config(root.path(), 2))
        .run()
        .unwrap();

    let doc = Document::load(manifest.document_path.as_ref().unwrap()).unwrap();
    for page_id in doc.get_pages().values() {
        assert_eq!(capture_image_size(&doc, *page_id), (320, 240));
    }
    for record in &manifest.capture_records {
        assert!(manifest.image_paths.contains(&record.image_reference));
    }
}

#[test]
fn test_back_to_back_sessions_keep_their_artifacts() {
    let root = tempdir().unwrap();
    let started = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
    let config = test_config(root.path(), 1);

    let manifests: Vec<_> = (0..3)
        .map(|_| {
            CaptureSession::starting_at(SimulatedHardware::new(64, 64), &config, started)
                .run()
                .unwrap()
        })
        .collect();

    let ids: Vec<&str> = manifests.iter().map(|m| m.session_id.as_str()).collect();
    assert_eq!(ids, vec!["20240309_070501", "20240309_070501_2", "20240309_070501_3"]);

    assert_eq!(files_in(&root.path().join("captures_image")), 3);
    assert_eq!(files_in(&root.path().join("histogram")), 3);
    assert_eq!(files_in(&root.path().join("pdf")), 3);
    for manifest in &manifests {
        let record = &manifest.capture_records[0];
        assert!(record.image_reference.exists());
        assert!(manifest.histogram_paths[0].exists());
        assert!(record
            .image_reference
            .to_string_lossy()
            .contains(&manifest.session_id));
    }
}

#[test]
fn test_failing_light_does_not_fail_session() {
    let root = tempdir().unwrap();
    let provider = SimulatedHardware::new(320, 240).fail_illumination();
    let counters = provider.counters();

    let mut config = test_config(root.path(), 2);
    config.illumination.enabled = true;
    config.illumination.color = [10, 20, 30];

    let manifest = CaptureSession::new(provider, &config).run().unwrap();

    assert_eq!(manifest.outcome, SessionOutcome::Completed);
    assert_eq!(manifest.completed_captures, 2);
    assert_eq!(
        counters.illumination_history(),
        vec![IlluminationColor::new(10, 20, 30), IlluminationColor::OFF]
    );
    assert_eq!(counters.releases(), 1);
}

#[test]
fn test_cancel_between_captures() {
    let root = tempdir().unwrap();
    let cancel = CancelFlag::new();
    let mut config = test_config(root.path(), 5);
    config.session.inter_capture_delay_ms = 10_000;

    let provider = SimulatedHardware::new(320, 240);
    let counters = provider.counters();

    let trigger = cancel.clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        trigger.cancel();
    });

    let manifest = CaptureSession::new(provider, &config)
        .with_cancel_flag(cancel)
        .run()
        .unwrap();
    canceller.join().unwrap();

    assert_eq!(manifest.outcome, SessionOutcome::Cancelled { after_capture: 1 });
    assert_eq!(manifest.completed_captures, 1);
    assert_eq!(pdf_page_count(manifest.document_path.as_ref().unwrap()), 1);
    assert_eq!(counters.releases(), 1);
}

#[test]
fn test_cancelled_before_start_captures_nothing() {
    let root = tempdir().unwrap();
    let cancel = CancelFlag::new();
    cancel.cancel();
    let provider = SimulatedHardware::new(320, 240);
    let counters = provider.counters();

    let manifest = CaptureSession::new(provider, &test_config(root.path(), 3))
        .with_cancel_flag(cancel)
        .run()
        .unwrap();

    assert_eq!(manifest.outcome, SessionOutcome::Cancelled { after_capture: 0 });
    assert_eq!(counters.captures(), 0);
    assert_eq!(counters.releases(), 1);
}

#[test]
fn test_manifest_serializes_to_json() {
    let root = tempdir().unwrap();
    let manifest = CaptureSession::new(SimulatedHardware::new(320, 240), &test_config(root.path(), 1))
        .run()
        .unwrap();

    let json = serde_json::to_string(&manifest).unwrap();
    assert!(json.contains("\"completed_captures\":1"));
    assert!(json.contains("\"kind\":\"completed\""));
}
