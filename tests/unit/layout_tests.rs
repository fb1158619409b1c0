/*!
 * Tests for subtitle layout and placement
 */

use anyhow::Result;
use vidprep::media_tools::TrimReport;
use vidprep::subtitle::layout::{
    CanvasSpec, LayoutOutcome, layout_frame, place, subtitle_margin,
};

use crate::common;
use crate::common::mock_oracles::{MockImageOracle, default_trim_report};

fn canvas_1080p() -> CanvasSpec {
    CanvasSpec {
        width: 1920,
        height: 1080,
        resize_factor: None,
        grayscale: false,
    }
}

/// Test the documented margin rule: clamp(height/100, 5, 20)
#[test]
fn test_subtitleMargin_shouldClampToDocumentedBounds() {
    assert_eq!(subtitle_margin(1080), 10);
    assert_eq!(subtitle_margin(100), 5);
    assert_eq!(subtitle_margin(480), 5);
    assert_eq!(subtitle_margin(2160), 20);
}

/// Test the documented example: a box originating at y=900 on a
/// 1920x1080 canvas anchors to the bottom with margin 10
#[test]
fn test_place_withBoxBelowMidline_shouldAnchorToBottom() {
    let trim = TrimReport {
        original_width: 1920,
        original_height: 1080,
        trimmed_width: 600,
        trimmed_height: 88,
        trimmed_x: 660,
        trimmed_y: 900,
    };

    let placement = place(1920, 1080, &trim, 600, 88);

    assert_eq!(placement.horizontal_offset, 660);
    assert_eq!(placement.vertical_offset, 1080 - 88 - 10);
}

/// Test that a box above the midline anchors to the top margin
#[test]
fn test_place_withBoxAboveMidline_shouldAnchorToTop() {
    let trim = TrimReport {
        trimmed_y: 120,
        ..default_trim_report()
    };

    let placement = place(1920, 1080, &trim, 600, 88);
    assert_eq!(placement.vertical_offset, 10);
}

/// Test that the resized box drives placement when resizing is active
#[test]
fn test_place_withResizedBox_shouldUseEffectiveDimensions() {
    let trim = default_trim_report();

    let placement = place(1920, 1080, &trim, 480, 70);

    assert_eq!(placement.horizontal_offset, 960 - 240);
    assert_eq!(placement.vertical_offset, 1080 - 70 - 10);
}

/// Test that a frame wider than the canvas centers with a negative offset
#[test]
fn test_place_withBoxWiderThanCanvas_shouldGoNegative() {
    let trim = default_trim_report();

    let placement = place(1440, 1080, &trim, 1600, 88);
    assert_eq!(placement.horizontal_offset, 720 - 800);
}

/// Test the full per-frame sequence against the deterministic mock
#[tokio::test]
async fn test_layoutFrame_withWorkingOracle_shouldComposite() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let source = common::create_frame_file(&dir, 1, b"payload")?;
    let dest = dir.join("out.tiff");

    let oracle = MockImageOracle::working();
    let outcome = layout_frame(&oracle, 1, &source, &dest, &canvas_1080p()).await;

    assert_eq!(outcome, LayoutOutcome::Completed);

    // trimmed 600x88 at y=900: centered, bottom anchored
    let produced = std::fs::read(&dest)?;
    assert_eq!(produced, b"CANVAS(1920x1080)@+660+982:TRIM(gray=false):payload");
    Ok(())
}

/// Test that the resize step is applied between trim and composite
#[tokio::test]
async fn test_layoutFrame_withResizeFactor_shouldScaleBeforePlacement() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let source = common::create_frame_file(&dir, 1, b"payload")?;
    let dest = dir.join("out.tiff");

    let canvas = CanvasSpec {
        resize_factor: Some(0.5),
        ..canvas_1080p()
    };

    let oracle = MockImageOracle::working();
    let outcome = layout_frame(&oracle, 1, &source, &dest, &canvas).await;

    assert_eq!(outcome, LayoutOutcome::Completed);

    // resized to 300x44: horizontal center moves, bottom margin tracks height
    let produced = std::fs::read(&dest)?;
    assert_eq!(
        produced,
        b"CANVAS(1920x1080)@+810+1026:TRIM(gray=false):payload:RESIZE(0.5)"
    );
    Ok(())
}

/// Test that grayscale is requested during the trim step
#[tokio::test]
async fn test_layoutFrame_withGrayscale_shouldDesaturateInTrim() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let source = common::create_frame_file(&dir, 1, b"payload")?;
    let dest = dir.join("out.tiff");

    let canvas = CanvasSpec {
        grayscale: true,
        ..canvas_1080p()
    };

    let oracle = MockImageOracle::working();
    layout_frame(&oracle, 1, &source, &dest, &canvas).await;

    let produced = std::fs::read(&dest)?;
    assert!(produced.starts_with(b"CANVAS(1920x1080)@"));
    assert!(
        String::from_utf8_lossy(&produced).contains("TRIM(gray=true)"),
        "grayscale flag did not reach the trim step"
    );
    Ok(())
}

/// Test that an oracle failure skips the frame instead of failing
#[tokio::test]
async fn test_layoutFrame_withFailingTrim_shouldSkipFrame() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let source = common::create_frame_file(&dir, 1, b"payload")?;
    let dest = dir.join("out.tiff");

    let oracle = MockImageOracle::working()
        .with_broken_frames(&["subtitle-0000000001.tiff"]);
    let outcome = layout_frame(&oracle, 1, &source, &dest, &canvas_1080p()).await;

    assert_eq!(outcome, LayoutOutcome::Skipped);
    assert!(!dest.exists());
    Ok(())
}
