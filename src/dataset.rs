// src/dataset.rs
//
// Trajectory store. An input directory holds, per recording number n:
//   n_recordingMeta.csv  one row, frame rate + passthrough fields
//   n_tracksMeta.csv     one row per agent
//   n_tracks.csv         one row per (agent, frame)
// Anything else in the directory (lane images, notes) is ignored.

use crate::types::{AgentId, AgentSummary, FrameSample, Recording};
use anyhow::{Context, Result};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub type FrameSequences = HashMap<AgentId, Vec<FrameSample>>;

const RECORDING_META_SUFFIX: &str = "recordingMeta.csv";
const TRACKS_META_SUFFIX: &str = "tracksMeta.csv";
const TRACKS_SUFFIX: &str = "tracks.csv";

/// Paths of the three tables belonging to one recording.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingFiles {
    pub number: u32,
    pub recording_meta: PathBuf,
    pub tracks_meta: PathBuf,
    pub tracks: PathBuf,
}

/// Everything the extractor needs for one recording, fully parsed.
#[derive(Debug, Clone)]
pub struct RecordingData {
    pub recording: Recording,
    pub summaries: Vec<AgentSummary>,
    pub frames: FrameSequences,
}

pub struct TrajectoryStore {
    input_dir: PathBuf,
}

impl TrajectoryStore {
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
        }
    }

    /// Every recording number mentioned by any of the three table names,
    /// ascending.
    pub fn find_recordings(&self) -> Result<Vec<RecordingFiles>> {
        let mut numbers = BTreeSet::new();

        for entry in WalkDir::new(&self.input_dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if let Some(number) = parse_recording_number(&name) {
                numbers.insert(number);
            }
        }

        info!(
            "Found {} recording(s) in {}",
            numbers.len(),
            self.input_dir.display()
        );

        Ok(numbers.into_iter().map(|n| self.files_for(n)).collect())
    }

    pub fn files_for(&self, number: u32) -> RecordingFiles {
        RecordingFiles {
            number,
            recording_meta: self
                .input_dir
                .join(format!("{}_{}", number, RECORDING_META_SUFFIX)),
            tracks_meta: self
                .input_dir
                .join(format!("{}_{}", number, TRACKS_META_SUFFIX)),
            tracks: self.input_dir.join(format!("{}_{}", number, TRACKS_SUFFIX)),
        }
    }
}

/// `12_tracksMeta.csv` → 12. Names that are not one of the three tables
/// yield `None`.
fn parse_recording_number(file_name: &str) -> Option<u32> {
    let (prefix, suffix) = file_name.split_once('_')?;
    if suffix != RECORDING_META_SUFFIX && suffix != TRACKS_META_SUFFIX && suffix != TRACKS_SUFFIX
    {
        return None;
    }
    prefix.parse().ok()
}

impl RecordingFiles {
    /// Parses all three tables. `Ok(None)` means the recording cannot be
    /// processed (missing table or empty recording metadata) and should be
    /// skipped; parse failures inside a present table are errors.
    pub fn load(&self) -> Result<Option<RecordingData>> {
        if !self.recording_meta.is_file() {
            warn!("Missing recording metadata for recording {}", self.number);
            return Ok(None);
        }
        let recording = match read_recording(&self.recording_meta)? {
            Some(recording) => recording,
            None => {
                warn!("Missing recording metadata for recording {}", self.number);
                return Ok(None);
            }
        };

        for table in [&self.tracks_meta, &self.tracks] {
            if !table.is_file() {
                warn!(
                    "Recording {} has no {}, skipping",
                    self.number,
                    table.display()
                );
                return Ok(None);
            }
        }

        let summaries = read_agent_summaries(&self.tracks_meta)?;
        let frames = read_frame_sequences(&self.tracks)?;

        debug!(
            "Recording {}: {:.2} fps, {} agent summaries, {} frame sequences",
            self.number,
            recording.frame_rate,
            summaries.len(),
            frames.len()
        );

        Ok(Some(RecordingData {
            recording,
            summaries,
            frames,
        }))
    }
}

/// First data row only; `None` for a header-only file.
pub fn read_recording(path: &Path) -> Result<Option<Recording>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    match reader.deserialize::<Recording>().next() {
        Some(row) => {
            let recording =
                row.with_context(|| format!("Malformed recording metadata in {}", path.display()))?;
            Ok(Some(recording))
        }
        None => Ok(None),
    }
}

/// Agent summaries in file order.
pub fn read_agent_summaries(path: &Path) -> Result<Vec<AgentSummary>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut summaries = Vec::new();
    for row in reader.deserialize::<AgentSummary>() {
        summaries.push(row.with_context(|| format!("Malformed agent row in {}", path.display()))?);
    }
    Ok(summaries)
}

/// Frame samples grouped by agent, each sequence sorted by frame index.
pub fn read_frame_sequences(path: &Path) -> Result<FrameSequences> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut frames: FrameSequences = HashMap::new();
    for row in reader.deserialize::<FrameSample>() {
        let sample = row.with_context(|| format!("Malformed frame row in {}", path.display()))?;
        frames.entry(sample.id).or_default().push(sample);
    }
    for sequence in frames.values_mut() {
        sequence.sort_by_key(|s| s.frame);
    }
    Ok(frames)
}
