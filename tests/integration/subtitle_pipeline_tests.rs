/*!
 * End-to-end tests for the subtitle overlay pipeline: hash, group,
 * schedule layout, verify integrity, resolve links
 */

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use vidprep::file_utils::FileManager;
use vidprep::subtitle::dedup::{
    SubtitleFrame, deduplicate, hash_frames, materialize_links, verify_representatives,
};
use vidprep::subtitle::layout::CanvasSpec;
use vidprep::subtitle::scheduler::{FrameJob, run_layout_pool};

use crate::common;
use crate::common::mock_oracles::MockImageOracle;

fn canvas_1080p() -> CanvasSpec {
    CanvasSpec {
        width: 1920,
        height: 1080,
        resize_factor: None,
        grayscale: false,
    }
}

fn jobs_for(frames: &[SubtitleFrame], layout_ids: &[u64], fixed_dir: &PathBuf) -> Vec<FrameJob> {
    layout_ids
        .iter()
        .filter_map(|id| frames.iter().find(|frame| frame.id == *id))
        .map(|frame| FrameJob {
            id: frame.id,
            source: frame.path.clone(),
            dest: fixed_dir.join(frame.file_name()),
        })
        .collect()
}

/// Run the whole pipeline over a frame set with duplicates and blanks,
/// and check every original frame resolves to a finished overlay
#[tokio::test]
async fn test_pipeline_withDuplicatesAndBlanks_shouldResolveEveryFrame() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let raw_dir = temp_dir.path().join("raw");
    let fixed_dir = temp_dir.path().join("fixed");
    FileManager::ensure_dir(&raw_dir)?;
    FileManager::ensure_dir(&fixed_dir)?;

    // Frames 1 and 4 are blank; 2 and 5 repeat one slide; 3 is unique
    let payloads: Vec<&[u8]> = vec![b"blank", b"slide-a", b"slide-b", b"blank", b"slide-a"];
    let frame_files = common::create_frame_run(&raw_dir.to_path_buf(), &payloads)?;

    let oracle = Arc::new(
        MockImageOracle::working()
            .with_empty_frames(&["subtitle-0000000001.tiff", "subtitle-0000000004.tiff"]),
    );

    let frames = hash_frames(&frame_files)?;
    let outcome = deduplicate(oracle.as_ref(), &frames, &fixed_dir, 1920, 1080).await?;

    assert_eq!(outcome.empty_representative, Some(1));
    assert_eq!(outcome.layout_ids, vec![2, 3]);

    let jobs = jobs_for(&frames, &outcome.layout_ids, &fixed_dir);
    let report = run_layout_pool(oracle, jobs, canvas_1080p(), 2).await?;
    assert_eq!(report.stats.completed, 2);

    verify_representatives(&outcome, &frames, &fixed_dir, &report.skipped_ids)?;
    materialize_links(&outcome, &frames, &fixed_dir, &report.skipped_ids)?;

    // Every original frame id now resolves to exactly one artifact
    for id in 1..=5u64 {
        let artifact = fixed_dir.join(FileManager::frame_file_name(id, "tiff"));
        assert!(artifact.exists(), "frame {} has no overlay", id);
    }

    // Duplicates share their representative's bytes
    let rep = std::fs::read(fixed_dir.join(FileManager::frame_file_name(2, "tiff")))?;
    let dup = std::fs::read(fixed_dir.join(FileManager::frame_file_name(5, "tiff")))?;
    assert_eq!(rep, dup);

    // Blank frames resolve to the transparent canvas
    let blank = std::fs::read(fixed_dir.join(FileManager::frame_file_name(4, "tiff")))?;
    assert_eq!(blank, b"BLANK(1920x1080)");

    Ok(())
}

/// Test that the whole pipeline is deterministic end to end
#[tokio::test]
async fn test_pipeline_runTwice_shouldProduceIdenticalDirectories() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let raw_dir = temp_dir.path().join("raw");
    FileManager::ensure_dir(&raw_dir)?;

    let payloads: Vec<&[u8]> = vec![
        b"blank", b"one", b"two", b"one", b"three", b"two", b"four", b"five",
    ];
    let frame_files = common::create_frame_run(&raw_dir.to_path_buf(), &payloads)?;

    let mut directory_snapshots: Vec<Vec<(String, Vec<u8>)>> = Vec::new();

    for run in 0..2 {
        let fixed_dir = temp_dir.path().join(format!("fixed-{}", run));
        FileManager::ensure_dir(&fixed_dir)?;

        let oracle = Arc::new(
            MockImageOracle::working().with_empty_frames(&["subtitle-0000000001.tiff"]),
        );

        let frames = hash_frames(&frame_files)?;
        let outcome = deduplicate(oracle.as_ref(), &frames, &fixed_dir, 1920, 1080).await?;

        let jobs = jobs_for(&frames, &outcome.layout_ids, &fixed_dir);
        let report = run_layout_pool(oracle, jobs, canvas_1080p(), 3).await?;

        verify_representatives(&outcome, &frames, &fixed_dir, &report.skipped_ids)?;
        materialize_links(&outcome, &frames, &fixed_dir, &report.skipped_ids)?;

        let mut snapshot = Vec::new();
        for id in 1..=payloads.len() as u64 {
            let name = FileManager::frame_file_name(id, "tiff");
            let bytes = std::fs::read(fixed_dir.join(&name))?;
            snapshot.push((name, bytes));
        }
        directory_snapshots.push(snapshot);
    }

    assert_eq!(directory_snapshots[0], directory_snapshots[1]);
    Ok(())
}

/// Test that a failing representative degrades to a skip, while the
/// rest of the batch completes and passes the integrity check
#[tokio::test]
async fn test_pipeline_withBrokenRepresentative_shouldContinue() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let raw_dir = temp_dir.path().join("raw");
    let fixed_dir = temp_dir.path().join("fixed");
    FileManager::ensure_dir(&raw_dir)?;
    FileManager::ensure_dir(&fixed_dir)?;

    let payloads: Vec<&[u8]> = vec![b"good-one", b"bad", b"good-two", b"bad"];
    let frame_files = common::create_frame_run(&raw_dir.to_path_buf(), &payloads)?;

    // Frame 2 fails only in the layout stage, not during the dedup probe
    let probe_oracle = MockImageOracle::working();
    let frames = hash_frames(&frame_files)?;
    let outcome = deduplicate(&probe_oracle, &frames, &fixed_dir, 1920, 1080).await?;
    assert_eq!(outcome.layout_ids, vec![1, 2, 3]);

    let layout_oracle = Arc::new(
        MockImageOracle::working().with_broken_frames(&["subtitle-0000000002.tiff"]),
    );
    let jobs = jobs_for(&frames, &outcome.layout_ids, &fixed_dir);
    let report = run_layout_pool(layout_oracle, jobs, canvas_1080p(), 2).await?;

    assert_eq!(report.stats.completed, 2);
    assert_eq!(report.skipped_ids, vec![2]);

    verify_representatives(&outcome, &frames, &fixed_dir, &report.skipped_ids)?;
    materialize_links(&outcome, &frames, &fixed_dir, &report.skipped_ids)?;

    // The healthy frames finished
    assert!(fixed_dir.join(FileManager::frame_file_name(1, "tiff")).exists());
    assert!(fixed_dir.join(FileManager::frame_file_name(3, "tiff")).exists());

    // The skipped representative and its duplicate have no overlay
    assert!(!fixed_dir.join(FileManager::frame_file_name(2, "tiff")).exists());
    assert!(!fixed_dir.join(FileManager::frame_file_name(4, "tiff")).exists());
    Ok(())
}
