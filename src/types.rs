// src/types.rs

use serde::{Deserialize, Serialize};

/// Agent (track) identifier as it appears in the `id` / `followingId` columns.
/// Non-positive values in `followingId` mean "no follower reported".
pub type AgentId = i64;

/// Integer frame index within a recording.
pub type FrameIndex = i64;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub thresholds: SceneThresholds,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneThresholds {
    /// Minimum shared observation window (seconds) for every participant
    pub minimum_time_window_secs: f64,
    /// The follower's minDHW must be below this to count as a convoy tail
    pub maximum_convoy_distance_headway: f64,
    /// A head whose minDHW is in [0, this) has an obstruction ahead of it
    pub minimum_clearance_distance_headway: f64,
    /// |max - min| / |max| longitudinal velocity swing for a volatile candidate
    pub velocity_proportional_diff: f64,
}

impl Default for SceneThresholds {
    fn default() -> Self {
        Self {
            minimum_time_window_secs: 10.0,
            maximum_convoy_distance_headway: 10.0,
            minimum_clearance_distance_headway: 20.0,
            velocity_proportional_diff: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ============================================================================
// INPUT RECORDS
// ============================================================================

/// Recording-level metadata. Only the frame rate is interpreted; the rest of
/// the row travels verbatim through the trimmed-scene copy.
#[derive(Debug, Clone, Deserialize)]
pub struct Recording {
    #[serde(rename = "frameRate")]
    pub frame_rate: f64,
}

/// One row of `<n>_tracksMeta.csv`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
    pub id: AgentId,
    pub initial_frame: FrameIndex,
    pub final_frame: FrameIndex,
    pub num_lane_changes: u32,
    pub num_frames: f64,
    pub min_x_velocity: f64,
    pub max_x_velocity: f64,
    #[serde(rename = "minDHW")]
    pub min_dhw: f64,
}

impl AgentSummary {
    pub fn frame_range(&self) -> FrameRange {
        FrameRange::new(self.initial_frame, self.final_frame)
    }
}

/// One row of `<n>_tracks.csv`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameSample {
    pub id: AgentId,
    pub frame: FrameIndex,
    pub lane_id: i64,
    pub x: f64,
    pub y: f64,
    pub x_velocity: f64,
    pub x_acceleration: f64,
    pub following_id: AgentId,
    #[serde(default)]
    pub dhw: f64,
}

// ============================================================================
// SCENES
// ============================================================================

/// Inclusive frame-index interval `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRange {
    pub start: FrameIndex,
    pub end: FrameIndex,
}

impl FrameRange {
    pub fn new(start: FrameIndex, end: FrameIndex) -> Self {
        Self { start, end }
    }

    pub fn intersect(&self, other: &FrameRange) -> FrameRange {
        FrameRange {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        }
    }

    /// Span in seconds. Negative when the interval is empty.
    pub fn duration_secs(&self, frame_rate: f64) -> f64 {
        (self.end - self.start) as f64 / frame_rate
    }

    pub fn contains(&self, frame: FrameIndex) -> bool {
        self.start <= frame && frame <= self.end
    }
}

/// A lead/follow pair that passed every pairing check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvoyPair {
    pub head: AgentId,
    pub tail: AgentId,
    pub head_lane: i64,
    pub window: FrameRange,
}

/// A fully negotiated scene, ready for emission.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub scene_id: u32,
    pub convoy_head_id: AgentId,
    pub convoy_tail_id: AgentId,
    pub independent_ids: Vec<AgentId>,
    pub window: FrameRange,
}

impl Scene {
    /// File stem shared by every artefact of this scene.
    pub fn base_name(&self) -> String {
        format!(
            "scene-{}-{}_follows_{}-{}_independent",
            self.scene_id,
            self.convoy_tail_id,
            self.convoy_head_id,
            self.independent_ids.len()
        )
    }

    pub fn descriptor(&self) -> SceneDescriptor {
        SceneDescriptor {
            scene_id: self.scene_id,
            convoy_head_id: self.convoy_head_id,
            convoy_tail_id: self.convoy_tail_id,
            independent_ids: self.independent_ids.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescriptor {
    pub scene_id: u32,
    pub convoy_head_id: AgentId,
    pub convoy_tail_id: AgentId,
    pub independent_ids: Vec<AgentId>,
}

/// Which kinematic variables go into the time-series table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KinematicMode {
    Acceleration,
    Velocity,
    Full,
}

impl KinematicMode {
    /// Full wins over velocity; acceleration is the fallback.
    pub fn from_flags(velocity: bool, all_kinematic: bool) -> Self {
        if all_kinematic {
            Self::Full
        } else if velocity {
            Self::Velocity
        } else {
            Self::Acceleration
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acceleration => "acceleration",
            Self::Velocity => "velocity",
            Self::Full => "full",
        }
    }
}
