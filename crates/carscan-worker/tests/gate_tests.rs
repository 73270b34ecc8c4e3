//! Admission control, batch fan-out and orphan reconciliation.

mod support;

use std::time::Duration;

use carscan_models::{Video, VideoStatus};
use carscan_worker::ProcessError;

use support::{
    build_harness, temp_video, test_config, ScriptedDetector, ScriptedFrameSource, StubRenderer,
};

#[tokio::test]
async fn test_duplicate_submission_conflicts_until_first_finishes() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_video(dir.path(), "front.mp4");

    let source = ScriptedFrameSource::new(3).with_frame_delay(Duration::from_millis(50));
    let harness = build_harness(
        test_config(2),
        source,
        ScriptedDetector::new(),
        StubRenderer::new(),
    );

    let gate = harness.gate.clone();
    let spawned_path = path.clone();
    let first = tokio::spawn(async move { gate.submit(&spawned_path).await });

    // let the first run admit the path and enter its frame loop
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(harness.gate.is_processing(&path));

    let err = harness.gate.submit(&path).await.unwrap_err();
    assert!(matches!(err, ProcessError::AlreadyProcessing(_)));

    first.await.unwrap().unwrap();

    // after the first run finishes (any outcome) the path is admittable again
    assert!(!harness.gate.is_processing(&path));
    harness.gate.submit(&path).await.unwrap();
}

#[tokio::test]
async fn test_path_readmittable_after_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_video(dir.path(), "front.mp4");

    let harness = build_harness(
        test_config(2),
        ScriptedFrameSource::new(1),
        ScriptedDetector::new().failing_at(0),
        StubRenderer::new(),
    );

    let err = harness.gate.submit(&path).await.unwrap_err();
    assert!(matches!(err, ProcessError::Detection { .. }));

    // second run must not be rejected as a duplicate
    harness.gate.submit(&path).await.unwrap();
}

#[tokio::test]
async fn test_capacity_bounds_cross_video_parallelism() {
    let dir = tempfile::tempdir().unwrap();
    let paths = vec![
        temp_video(dir.path(), "a.mp4"),
        temp_video(dir.path(), "b.mp4"),
        temp_video(dir.path(), "c.mp4"),
    ];

    let detector = ScriptedDetector::new().with_infer_delay(Duration::from_millis(20));
    let harness = build_harness(
        test_config(1),
        ScriptedFrameSource::new(2),
        detector,
        StubRenderer::new(),
    );

    let outcomes = harness.gate.submit_batch(&paths).await.unwrap();
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|o| o.is_ok()));

    // excess submissions waited for a slot instead of running concurrently
    assert_eq!(harness.detector.max_concurrent_infers(), 1);
}

#[tokio::test]
async fn test_batch_rejected_atomically_on_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let paths = vec![
        temp_video(dir.path(), "a.mp4"),
        dir.path().join("missing.mp4"),
    ];

    let harness = build_harness(
        test_config(2),
        ScriptedFrameSource::new(1),
        ScriptedDetector::new(),
        StubRenderer::new(),
    );

    let err = harness.gate.submit_batch(&paths).await.unwrap_err();
    assert!(matches!(err, ProcessError::BatchRejected(_)));

    // nothing was admitted and no record was created for any path
    assert_eq!(harness.videos.len(), 0);
    assert!(!harness.gate.is_processing(&paths[0]));
}

#[tokio::test]
async fn test_batch_rejected_on_unsupported_format() {
    let dir = tempfile::tempdir().unwrap();
    let paths = vec![
        temp_video(dir.path(), "a.mp4"),
        temp_video(dir.path(), "notes.txt"),
    ];

    let harness = build_harness(
        test_config(2),
        ScriptedFrameSource::new(1),
        ScriptedDetector::new(),
        StubRenderer::new(),
    );

    let err = harness.gate.submit_batch(&paths).await.unwrap_err();
    assert!(matches!(err, ProcessError::BatchRejected(_)));
    assert_eq!(harness.videos.len(), 0);
}

#[tokio::test]
async fn test_batch_isolates_per_item_failures_in_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let paths = vec![
        temp_video(dir.path(), "a.mp4"),
        temp_video(dir.path(), "bad.mp4"),
        temp_video(dir.path(), "c.mp4"),
    ];

    let source = ScriptedFrameSource::new(2).with_probe_failure_for("bad");
    let harness = build_harness(
        test_config(2),
        source,
        ScriptedDetector::new(),
        StubRenderer::new(),
    );

    let outcomes = harness.gate.submit_batch(&paths).await.unwrap();
    assert_eq!(outcomes.len(), 3);

    assert!(outcomes[0].is_ok());
    assert!(matches!(
        outcomes[1].as_ref().unwrap_err(),
        ProcessError::InvalidVideo(_)
    ));
    assert!(outcomes[2].is_ok());

    // the failing sibling never blocked the others
    let completed = harness
        .videos
        .all()
        .into_iter()
        .filter(|v| v.status == VideoStatus::Completed)
        .count();
    assert_eq!(completed, 2);
}

#[tokio::test]
async fn test_reconcile_orphans_repairs_stuck_records() {
    let harness = build_harness(
        test_config(2),
        ScriptedFrameSource::new(1),
        ScriptedDetector::new(),
        StubRenderer::new(),
    );

    // a record left Processing by a crashed run, and a healthy one
    let orphan = Video::new("/videos/ghost.mp4", None);
    let orphan_id = orphan.id.clone();
    let mut done = Video::new("/videos/done.mp4", None);
    done.mark_completed(Vec::new(), 0.5).unwrap();
    let done_id = done.id.clone();
    harness.videos.seed(orphan);
    harness.videos.seed(done);

    let repaired = harness.gate.reconcile_orphans().await.unwrap();
    assert_eq!(repaired, 1);

    assert_eq!(
        harness.gate.status(&orphan_id).await.unwrap(),
        Some(VideoStatus::Failed)
    );
    assert_eq!(
        harness.gate.status(&done_id).await.unwrap(),
        Some(VideoStatus::Completed)
    );
}

#[tokio::test]
async fn test_reconcile_skips_live_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_video(dir.path(), "front.mp4");

    let source = ScriptedFrameSource::new(4).with_frame_delay(Duration::from_millis(40));
    let harness = build_harness(
        test_config(2),
        source,
        ScriptedDetector::new(),
        StubRenderer::new(),
    );

    let gate = harness.gate.clone();
    let spawned_path = path.clone();
    let run = tokio::spawn(async move { gate.submit(&spawned_path).await });

    // while the run is in flight its Processing record is not an orphan
    tokio::time::sleep(Duration::from_millis(50)).await;
    let repaired = harness.gate.reconcile_orphans().await.unwrap();
    assert_eq!(repaired, 0);

    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_cancel_is_advisory() {
    let harness = build_harness(
        test_config(2),
        ScriptedFrameSource::new(1),
        ScriptedDetector::new(),
        StubRenderer::new(),
    );

    let video = Video::new("/videos/slow.mp4", None);
    let id = video.id.clone();
    harness.videos.seed(video);

    assert!(harness.gate.cancel(&id).await.unwrap());
    assert_eq!(
        harness.gate.status(&id).await.unwrap(),
        Some(VideoStatus::Cancelled)
    );

    // already terminal: nothing to cancel
    assert!(!harness.gate.cancel(&id).await.unwrap());

    // unknown id: nothing to cancel
    let unknown = carscan_models::VideoId::new();
    assert!(!harness.gate.cancel(&unknown).await.unwrap());
}

#[tokio::test]
async fn test_snapshot_tracks_admissions() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_video(dir.path(), "front.mp4");

    let source = ScriptedFrameSource::new(3).with_frame_delay(Duration::from_millis(40));
    let harness = build_harness(
        test_config(2),
        source,
        ScriptedDetector::new(),
        StubRenderer::new(),
    );

    let before = harness.gate.snapshot();
    assert_eq!(before.capacity, 2);
    assert!(before.admitted.is_empty());
    assert_eq!(before.available_slots, 2);

    let gate = harness.gate.clone();
    let spawned_path = path.clone();
    let run = tokio::spawn(async move { gate.submit(&spawned_path).await });

    tokio::time::sleep(Duration::from_millis(30)).await;
    let during = harness.gate.snapshot();
    assert_eq!(during.admitted.len(), 1);
    assert_eq!(during.available_slots, 1);

    run.await.unwrap().unwrap();
    let after = harness.gate.snapshot();
    assert!(after.admitted.is_empty());
    assert_eq!(after.available_slots, 2);
}
