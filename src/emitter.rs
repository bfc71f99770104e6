// src/emitter.rs
//
// Scene emitter. Trims every participant to the negotiated window and writes
//   <base>.csv   aligned kinematic time series (c0 = head, c1 = tail, iN)
//   <base>.json  scene descriptor
// and, when a trimmed-scene directory is configured, copies of the raw
// recording tables restricted to agents present in the window.

use crate::dataset::{FrameSequences, RecordingFiles};
use crate::types::{AgentId, FrameRange, FrameSample, KinematicMode, Scene};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub output_dir: PathBuf,
    pub csv: bool,
    pub json_meta: bool,
    pub trimmed_scene_dir: Option<PathBuf>,
    pub mode: KinematicMode,
}

pub struct SceneEmitter {
    options: OutputOptions,
}

impl SceneEmitter {
    pub fn new(options: OutputOptions) -> Self {
        Self { options }
    }

    /// Writes every configured artefact for one scene and returns the paths.
    pub fn emit(
        &self,
        scene: &Scene,
        frames: &FrameSequences,
        files: &RecordingFiles,
    ) -> Result<Vec<PathBuf>> {
        let base = scene.base_name();
        let mut written = Vec::new();

        if self.options.csv {
            let participants = trimmed_participants(scene, frames);
            let table = TimeSeriesTable::build(&participants, self.options.mode);
            let path = self.options.output_dir.join(format!("{}.csv", base));
            info!("Generating output for {}", path.display());
            table.write(&path)?;
            written.push(path);
        }

        if self.options.json_meta {
            let path = self.options.output_dir.join(format!("{}.json", base));
            info!("Generating output for {}", path.display());
            write_descriptor(scene, &path)?;
            written.push(path);
        }

        if let Some(dir) = &self.options.trimmed_scene_dir {
            written.extend(write_trimmed_tables(files, scene.window, dir, &base)?);
        }

        Ok(written)
    }
}

/// Samples whose frame index lies in `window`, inclusive.
pub fn trim_frames(frames: &[FrameSample], window: FrameRange) -> Vec<FrameSample> {
    frames
        .iter()
        .filter(|s| window.contains(s.frame))
        .cloned()
        .collect()
}

/// (column prefix, trimmed samples) for head, tail and each independent.
pub fn trimmed_participants(scene: &Scene, frames: &FrameSequences) -> Vec<(String, Vec<FrameSample>)> {
    let trim = |id: AgentId| {
        frames
            .get(&id)
            .map(|seq| trim_frames(seq, scene.window))
            .unwrap_or_default()
    };

    let mut participants = vec![
        ("c0".to_string(), trim(scene.convoy_head_id)),
        ("c1".to_string(), trim(scene.convoy_tail_id)),
    ];
    for (j, &id) in scene.independent_ids.iter().enumerate() {
        participants.push((format!("i{}", j), trim(id)));
    }
    participants
}

/// Running sum of planar displacement, 0 at the first sample.
pub fn cumulative_distance(frames: &[FrameSample]) -> Vec<f64> {
    let mut travelled = 0.0;
    let mut previous: Option<(f64, f64)> = None;
    frames
        .iter()
        .map(|s| {
            if let Some((px, py)) = previous {
                travelled += (s.x - px).hypot(s.y - py);
            }
            previous = Some((s.x, s.y));
            travelled
        })
        .collect()
}

// ============================================================================
// TIME SERIES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesTable {
    /// Value columns, without the leading `time_index`
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl TimeSeriesTable {
    pub fn build(participants: &[(String, Vec<FrameSample>)], mode: KinematicMode) -> Self {
        let row_count = participants
            .iter()
            .map(|(_, seq)| seq.len())
            .min()
            .unwrap_or(0);
        if participants.iter().any(|(_, seq)| seq.len() != row_count) {
            let lengths: Vec<String> = participants
                .iter()
                .map(|(label, seq)| format!("{}={}", label, seq.len()))
                .collect();
            warn!(
                "Participant sequences differ in length ({}), truncating to {} rows",
                lengths.join(", "),
                row_count
            );
        }

        let mut columns = Vec::new();
        let mut series: Vec<Vec<f64>> = Vec::new();

        for (label, seq) in participants {
            let seq = &seq[..row_count];
            if matches!(mode, KinematicMode::Acceleration | KinematicMode::Full) {
                columns.push(format!("{}.a", label));
                series.push(seq.iter().map(|s| s.x_acceleration).collect());
            }
            if matches!(mode, KinematicMode::Velocity | KinematicMode::Full) {
                columns.push(format!("{}.v", label));
                series.push(seq.iter().map(|s| s.x_velocity).collect());
            }
            if mode == KinematicMode::Full {
                columns.push(format!("{}.p", label));
                series.push(cumulative_distance(seq));
            }
        }

        let rows = (0..row_count)
            .map(|i| series.iter().map(|column| column[i]).collect())
            .collect();

        Self { columns, rows }
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| row[idx]).collect())
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;

        let mut header = vec!["time_index".to_string()];
        header.extend(self.columns.iter().cloned());
        writer.write_record(&header)?;

        for (i, row) in self.rows.iter().enumerate() {
            let mut record = vec![i.to_string()];
            record.extend(row.iter().map(|v| v.to_string()));
            writer.write_record(&record)?;
        }

        writer
            .flush()
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

// ============================================================================
// DESCRIPTOR & TRIMMED COPIES
// ============================================================================

pub fn write_descriptor(scene: &Scene, path: &Path) -> Result<()> {
    let json = serde_json::to_string(&scene.descriptor())?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Copies recordingMeta verbatim and filters tracksMeta/tracks to agents
/// whose presence interval overlaps the window (strict on both ends).
pub fn write_trimmed_tables(
    files: &RecordingFiles,
    window: FrameRange,
    dir: &Path,
    base: &str,
) -> Result<Vec<PathBuf>> {
    let meta_out = dir.join(format!("{}-recordingMeta.csv", base));
    let tracks_meta_out = dir.join(format!("{}-tracksMeta.csv", base));
    let tracks_out = dir.join(format!("{}-tracks.csv", base));

    info!("Generating trimmed scene tables for {}", base);

    fs::copy(&files.recording_meta, &meta_out).with_context(|| {
        format!(
            "Failed to copy {} to {}",
            files.recording_meta.display(),
            meta_out.display()
        )
    })?;

    let present = filter_tracks_meta(&files.tracks_meta, &tracks_meta_out, window)?;
    filter_tracks(&files.tracks, &tracks_out, &present)?;

    Ok(vec![meta_out, tracks_meta_out, tracks_out])
}

/// Returns the ids (verbatim text) of the rows that were kept.
fn filter_tracks_meta(input: &Path, output: &Path, window: FrameRange) -> Result<HashSet<String>> {
    let mut reader = csv::Reader::from_path(input)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("{} has no {} column", input.display(), name))
    };
    let id_col = column("id")?;
    let initial_col = column("initialFrame")?;
    let final_col = column("finalFrame")?;

    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    writer.write_record(&headers)?;

    let mut present = HashSet::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("Malformed row in {}", input.display()))?;
        let initial: f64 = parse_field(&record, initial_col, input)?;
        let last: f64 = parse_field(&record, final_col, input)?;
        if initial < window.end as f64 && last > window.start as f64 {
            present.insert(record.get(id_col).unwrap_or_default().to_string());
            writer.write_record(&record)?;
        }
    }
    writer.flush()?;
    Ok(present)
}

fn filter_tracks(input: &Path, output: &Path, present: &HashSet<String>) -> Result<()> {
    let mut reader = csv::Reader::from_path(input)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    let headers = reader.headers()?.clone();
    let id_col = headers
        .iter()
        .position(|h| h == "id")
        .with_context(|| format!("{} has no id column", input.display()))?;

    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    writer.write_record(&headers)?;

    for record in reader.records() {
        let record = record.with_context(|| format!("Malformed row in {}", input.display()))?;
        if record.get(id_col).is_some_and(|id| present.contains(id)) {
            writer.write_record(&record)?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn parse_field(record: &csv::StringRecord, col: usize, path: &Path) -> Result<f64> {
    let raw = record.get(col).unwrap_or_default();
    raw.trim()
        .parse()
        .with_context(|| format!("Invalid number {:?} in {}", raw, path.display()))
}
