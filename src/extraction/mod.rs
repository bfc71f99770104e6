// src/extraction/mod.rs
//
// Convoy scene extraction for one recording.
//
// Flow:
//   tracksMeta → candidates (filter) → volatile heads
//   each head  → pairing (tail + checks) → negotiation (independents) → Scene
//
// RecordingState carries the consumed-agent set and rejection counters for a
// single recording; a fresh one is created per recording.

pub mod candidates;
pub mod metrics;
pub mod negotiation;
pub mod pairing;

pub use candidates::CandidateFilter;
pub use metrics::{Rejection, RejectionCounters};
pub use negotiation::WindowNegotiator;
pub use pairing::PairingEngine;

use crate::dataset::RecordingData;
use crate::types::{AgentId, Scene, SceneThresholds};
use std::collections::HashSet;
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct RecordingState {
    pub consumed: HashSet<AgentId>,
    pub counters: RejectionCounters,
}

impl RecordingState {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone)]
pub struct RecordingReport {
    pub recording: u32,
    pub candidates: usize,
    pub volatile: usize,
    pub counters: RejectionCounters,
    pub scenes: Vec<Scene>,
}

pub struct SceneExtractor {
    thresholds: SceneThresholds,
}

impl SceneExtractor {
    pub fn new(thresholds: SceneThresholds) -> Self {
        Self { thresholds }
    }

    pub fn extract(&self, recording: u32, data: &RecordingData) -> RecordingReport {
        let frame_rate = data.recording.frame_rate;
        let candidates = CandidateFilter::new(&self.thresholds).filter(&data.summaries, frame_rate);

        info!(
            "Found {} valid agents and {} valid convoy agents",
            candidates.len(),
            candidates.volatile_len()
        );

        let mut state = RecordingState::new();
        let mut scenes = Vec::new();

        if candidates.volatile_len() > 0 {
            let pairing = PairingEngine::new(&self.thresholds, frame_rate, &candidates, &data.frames);
            let negotiator =
                WindowNegotiator::new(&self.thresholds, frame_rate, &candidates, &data.frames);

            for &head in candidates.volatile_ids() {
                let pair = match pairing.pair(head) {
                    Ok(pair) => pair,
                    Err(rejection) => {
                        debug!("Agent {} rejected: {}", head, rejection.as_str());
                        state.counters.inc(rejection);
                        continue;
                    }
                };

                let negotiated = match negotiator.negotiate(&pair, &mut state.consumed) {
                    Some(negotiated) => negotiated,
                    None => {
                        debug!(
                            "Convoy {}→{} rejected: {}",
                            pair.head,
                            pair.tail,
                            Rejection::NoSuitableIndependent.as_str()
                        );
                        state.counters.inc(Rejection::NoSuitableIndependent);
                        continue;
                    }
                };

                state.counters.inc_success();
                scenes.push(Scene {
                    scene_id: recording,
                    convoy_head_id: pair.head,
                    convoy_tail_id: pair.tail,
                    independent_ids: negotiated.independent_ids,
                    window: negotiated.window,
                });
            }
        }

        RecordingReport {
            recording,
            candidates: candidates.len(),
            volatile: candidates.volatile_len(),
            counters: state.counters,
            scenes,
        }
    }
}
