/*!
 * Content-hash deduplication of subtitle frames.
 *
 * DVD and Blu-ray subtitle streams repeat the same rendered image for
 * many consecutive frames, and most frames carry no subtitle at all.
 * Hashing every frame groups the pixel-identical ones; only one
 * representative per group is ever trimmed and repositioned, and every
 * other member becomes a reference link to the representative's output.
 */

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, warn};
use sha2::{Digest, Sha256};

use crate::errors::{OracleError, SubtitleError};
use crate::file_utils::FileManager;
use crate::media_tools::ImageOracle;

/// One extracted subtitle frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleFrame {
    /// Monotonic sequence number from extraction
    pub id: u64,

    /// The extracted image file
    pub path: PathBuf,

    /// SHA-256 over the full file bytes
    pub content_hash: String,
}

impl SubtitleFrame {
    /// File name of the frame image
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// All frames sharing one content hash. The lowest id is the
/// representative and owns the materialized output artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameGroup {
    /// Shared content hash
    pub content_hash: String,

    /// Member ids in ascending order
    pub members: Vec<u64>,
}

impl FrameGroup {
    /// The member that owns the materialized artifact
    pub fn representative(&self) -> u64 {
        self.members[0]
    }
}

/// Result of deduplicating a frame inventory
#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    /// Groups ordered by representative id
    pub groups: Vec<FrameGroup>,

    /// Representative ids destined for the layout stage, ascending.
    /// The empty group's representative is excluded: its artifact is
    /// the blank canvas written during deduplication.
    pub layout_ids: Vec<u64>,

    /// Reference links as (member, representative) pairs
    pub links: Vec<(u64, u64)>,

    /// Representative of the group with no visible subtitle content
    pub empty_representative: Option<u64>,
}

/// Hash every frame file. Read failures are fatal: silently dropping a
/// frame would corrupt the temporal continuity of the overlay sequence.
pub fn hash_frames(frame_files: &[(u64, PathBuf)]) -> Result<Vec<SubtitleFrame>, SubtitleError> {
    let mut frames = Vec::with_capacity(frame_files.len());

    for (id, path) in frame_files {
        let content = std::fs::read(path).map_err(|e| SubtitleError::FrameRead {
            frame: path.display().to_string(),
            message: e.to_string(),
        })?;

        let mut hasher = Sha256::new();
        hasher.update(&content);
        let content_hash = format!("{:x}", hasher.finalize());

        frames.push(SubtitleFrame {
            id: *id,
            path: path.clone(),
            content_hash,
        });
    }

    Ok(frames)
}

/// Group frames by content hash, identify the empty group, and write
/// the empty group's blank-canvas artifact. Frames must be in
/// ascending id order.
pub async fn deduplicate(
    oracle: &impl ImageOracle,
    frames: &[SubtitleFrame],
    fixed_dir: &Path,
    canvas_width: u32,
    canvas_height: u32,
) -> Result<DedupOutcome> {
    let mut members_by_hash: HashMap<&str, Vec<u64>> = HashMap::new();

    for frame in frames {
        members_by_hash
            .entry(frame.content_hash.as_str())
            .or_default()
            .push(frame.id);
    }

    let empty_hash = find_empty_hash(oracle, frames).await?;

    let mut groups: Vec<FrameGroup> = members_by_hash
        .into_iter()
        .map(|(content_hash, members)| FrameGroup {
            content_hash: content_hash.to_string(),
            members,
        })
        .collect();
    groups.sort_by_key(|group| group.representative());

    let mut layout_ids = Vec::new();
    let mut links = Vec::new();
    let mut empty_representative = None;

    for group in &groups {
        let representative = group.representative();

        for member in &group.members[1..] {
            links.push((*member, representative));
        }

        if Some(group.content_hash.as_str()) == empty_hash.as_deref() {
            empty_representative = Some(representative);
        } else {
            layout_ids.push(representative);
        }
    }

    // The empty representative is materialized right away as a fully
    // transparent canvas, so it shares bit depth and image properties
    // with the frames the layout stage will produce.
    if let Some(representative) = empty_representative {
        let file_name = frame_file_name(frames, representative)?;
        oracle
            .blank_canvas(canvas_width, canvas_height, &fixed_dir.join(&file_name))
            .await
            .map_err(|e| anyhow::anyhow!("Creating an empty subtitle image failed: {}", e))?;
    }

    debug!(
        "Deduplicated {} frames into {} groups ({} links, empty group: {})",
        frames.len(),
        groups.len(),
        links.len(),
        empty_representative.is_some()
    );

    Ok(DedupOutcome {
        groups,
        layout_ids,
        links,
        empty_representative,
    })
}

/// Create the reference links once the representative artifacts have
/// been produced. Groups whose representative was skipped by the
/// layout stage get no links; their members are reported instead.
pub fn materialize_links(
    outcome: &DedupOutcome,
    frames: &[SubtitleFrame],
    fixed_dir: &Path,
    skipped_ids: &[u64],
) -> Result<()> {
    for (member, representative) in &outcome.links {
        if skipped_ids.contains(representative) {
            warn!(
                "Frame {} inherits no overlay: its representative {} was skipped",
                member, representative
            );
            continue;
        }

        let target = fixed_dir.join(frame_file_name(frames, *representative)?);
        let link = fixed_dir.join(frame_file_name(frames, *member)?);

        FileManager::create_reference_link(&target, &link)?;
    }

    Ok(())
}

/// Check that every representative that was materialized still exists
/// on disk. A missing representative would leave its whole group
/// resolving to nothing, so it is a fatal integrity violation.
/// Representatives skipped by the layout stage are exempt.
pub fn verify_representatives(
    outcome: &DedupOutcome,
    frames: &[SubtitleFrame],
    fixed_dir: &Path,
    skipped_ids: &[u64],
) -> Result<(), SubtitleError> {
    for group in &outcome.groups {
        let representative = group.representative();

        if skipped_ids.contains(&representative) {
            continue;
        }

        let file_name = match frame_file_name(frames, representative) {
            Ok(name) => name,
            Err(_) => continue,
        };
        let artifact = fixed_dir.join(file_name);

        if !FileManager::file_exists(&artifact) {
            return Err(SubtitleError::MissingRepresentative(
                artifact.display().to_string(),
            ));
        }
    }

    Ok(())
}

// Probe frames in ascending id order until the trim oracle reports one
// with nothing to trim; that frame's hash keys the empty group. Hard
// tool failures do not count as emptiness; they are logged and the next
// candidate is probed.
async fn find_empty_hash(
    oracle: &impl ImageOracle,
    frames: &[SubtitleFrame],
) -> Result<Option<String>> {
    if frames.is_empty() {
        return Ok(None);
    }

    let scratch = tempfile::tempdir().context("Failed to create scratch directory")?;

    for frame in frames {
        let probe_dest = scratch.path().join(frame.file_name());

        match oracle.trim(&frame.path, &probe_dest, false).await {
            Ok(_) => continue,
            Err(OracleError::NoVisibleContent) => {
                debug!("Frame {} carries no subtitle content", frame.id);
                return Ok(Some(frame.content_hash.clone()));
            }
            Err(OracleError::Tool(message)) => {
                warn!("Trim probe failed on frame {}: {}", frame.id, message);
                continue;
            }
        }
    }

    Ok(None)
}

fn frame_file_name(frames: &[SubtitleFrame], id: u64) -> Result<String> {
    frames
        .iter()
        .find(|frame| frame.id == id)
        .map(|frame| frame.file_name())
        .with_context(|| format!("Frame {} is not part of the inventory", id))
}
