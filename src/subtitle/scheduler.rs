/*!
 * Bounded-parallel execution of the subtitle layout stage.
 *
 * Representative frames are split into contiguous chunks, one fixed
 * task per chunk, and every task runs the layout engine sequentially
 * over its own frames. The partition is a pure function of the frame
 * count and worker count, and each frame's output depends only on its
 * own content plus the shared read-only canvas parameters, so results
 * are bit-identical regardless of task completion order.
 */

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use log::debug;
use parking_lot::Mutex;

use super::layout::{CanvasSpec, LayoutOutcome, layout_frame};
use crate::media_tools::ImageOracle;

/// One frame's input and output locations for the layout stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameJob {
    /// Frame sequence number
    pub id: u64,

    /// Extracted source image
    pub source: PathBuf,

    /// Finalized overlay destination
    pub dest: PathBuf,
}

/// Aggregate counters for one layout run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrimStats {
    /// Frames whose overlay was produced
    pub completed: usize,

    /// Frames skipped after an oracle failure
    pub skipped: usize,
}

/// Full outcome of one layout run
#[derive(Debug, Clone, Default)]
pub struct LayoutRunReport {
    /// Aggregate counters
    pub stats: TrimStats,

    /// Ids of the frames that were skipped, ascending
    pub skipped_ids: Vec<u64>,
}

/// Number of workers to launch: the detected physical core count,
/// unless the user pinned it explicitly
pub fn worker_count(user_override: Option<usize>) -> usize {
    match user_override {
        Some(workers) if workers >= 1 => workers,
        _ => num_cpus::get_physical().max(1),
    }
}

/// Frames handled per worker. Every worker gets at least two frames
/// where the total permits, so tiny batches do not fan out into a
/// task per frame.
pub fn chunk_size(total_frames: usize, workers: usize) -> usize {
    (total_frames / workers.max(1)).max(2)
}

/// Split `total` items into contiguous `[start, end)` ranges of
/// `chunk` items each, the last possibly shorter
pub fn partition(total: usize, chunk: usize) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = 0;

    while start < total {
        let end = (start + chunk).min(total);
        ranges.push((start, end));
        start = end;
    }

    ranges
}

/// Drive the layout engine over all jobs with a fixed pool of one task
/// per partition chunk, and wait for every task to finish
pub async fn run_layout_pool<O>(
    oracle: Arc<O>,
    jobs: Vec<FrameJob>,
    canvas: CanvasSpec,
    workers: usize,
) -> Result<LayoutRunReport>
where
    O: ImageOracle + 'static,
{
    if jobs.is_empty() {
        return Ok(LayoutRunReport::default());
    }

    let chunk = chunk_size(jobs.len(), workers);
    let ranges = partition(jobs.len(), chunk);
    let report = Arc::new(Mutex::new(LayoutRunReport::default()));

    let mut handles = Vec::with_capacity(ranges.len());

    for (task_index, (start, end)) in ranges.into_iter().enumerate() {
        let chunk_jobs: Vec<FrameJob> = jobs[start..end].to_vec();
        let oracle = oracle.clone();
        let report = report.clone();

        debug!(
            "Layout task {} started, it processes frames {} - {}",
            task_index + 1,
            start + 1,
            end
        );

        handles.push(tokio::spawn(async move {
            for job in &chunk_jobs {
                let outcome =
                    layout_frame(oracle.as_ref(), job.id, &job.source, &job.dest, &canvas).await;

                let mut report = report.lock();
                match outcome {
                    LayoutOutcome::Completed => report.stats.completed += 1,
                    LayoutOutcome::Skipped => {
                        report.stats.skipped += 1;
                        report.skipped_ids.push(job.id);
                    }
                }
            }

            task_index
        }));
    }

    // The join barrier: every launched task reports back exactly once,
    // in whatever order the tasks happen to finish.
    for joined in join_all(handles).await {
        let task_index = joined.context("Layout task panicked")?;
        debug!("Layout task {} ended", task_index + 1);
    }

    let mut report = Arc::try_unwrap(report)
        .map(|mutex| mutex.into_inner())
        .unwrap_or_else(|shared| shared.lock().clone());
    report.skipped_ids.sort_unstable();

    Ok(report)
}
