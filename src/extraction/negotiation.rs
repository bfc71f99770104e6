// src/extraction/negotiation.rs
//
// Window negotiator. Starting from the head/tail overlap, walk every
// candidate (volatile or not) in enumeration order and greedily admit
// independent agents that
//   - have not been consumed by an earlier scene of this recording,
//   - keep the shared window at or above the minimum duration,
//   - sit in a lane no other participant occupies.
// Admission narrows the window, claims the lane, and consumes head, tail and
// the admitted agent for the rest of the recording.

use super::candidates::CandidateSet;
use crate::dataset::FrameSequences;
use crate::types::{AgentId, ConvoyPair, FrameRange, FrameSample, SceneThresholds};
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct Negotiated {
    pub window: FrameRange,
    pub independent_ids: Vec<AgentId>,
    pub used_lanes: Vec<i64>,
}

pub struct WindowNegotiator<'a> {
    thresholds: &'a SceneThresholds,
    frame_rate: f64,
    candidates: &'a CandidateSet,
    frames: &'a FrameSequences,
}

impl<'a> WindowNegotiator<'a> {
    pub fn new(
        thresholds: &'a SceneThresholds,
        frame_rate: f64,
        candidates: &'a CandidateSet,
        frames: &'a FrameSequences,
    ) -> Self {
        Self {
            thresholds,
            frame_rate,
            candidates,
            frames,
        }
    }

    /// `None` when no independent agent fits; `consumed` is then untouched.
    pub fn negotiate(
        &self,
        pair: &ConvoyPair,
        consumed: &mut HashSet<AgentId>,
    ) -> Option<Negotiated> {
        let mut window = pair.window;
        let mut used_lanes = vec![pair.head_lane];
        let mut independent_ids = Vec::new();

        for other in self.candidates.iter() {
            if other.id == pair.head || other.id == pair.tail || consumed.contains(&other.id) {
                continue;
            }

            let prospective = window.intersect(&other.frame_range());
            if prospective.duration_secs(self.frame_rate) < self.thresholds.minimum_time_window_secs
            {
                continue;
            }

            let lane = match first_lane(self.frames.get(&other.id).map(Vec::as_slice).unwrap_or(&[]))
            {
                Some(lane) if !used_lanes.contains(&lane) => lane,
                _ => continue,
            };

            debug!(
                "Admitting agent {} (lane {}) to convoy {}→{}, window {}..{}",
                other.id, lane, pair.head, pair.tail, prospective.start, prospective.end
            );

            window = prospective;
            used_lanes.push(lane);
            independent_ids.push(other.id);

            consumed.insert(other.id);
            consumed.insert(pair.head);
            consumed.insert(pair.tail);
        }

        if independent_ids.is_empty() {
            return None;
        }

        Some(Negotiated {
            window,
            independent_ids,
            used_lanes,
        })
    }
}

/// Lane of the first available sample; not checked against the window.
pub fn first_lane(frames: &[FrameSample]) -> Option<i64> {
    frames.first().map(|s| s.lane_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::candidates::CandidateFilter;
    use crate::extraction::fixtures::{frames, summary};
    use crate::types::AgentSummary;
    use std::collections::HashMap;

    struct Fixture {
        thresholds: SceneThresholds,
        candidates: CandidateSet,
        frames: FrameSequences,
    }

    impl Fixture {
        /// Each entry: (id, initial, final, lane).
        fn new(agents: &[(AgentId, i64, i64, i64)]) -> Self {
            let thresholds = SceneThresholds::default();
            let summaries: Vec<AgentSummary> = agents
                .iter()
                .map(|&(id, start, end, _)| summary(id, start, end))
                .collect();
            let candidates = CandidateFilter::new(&thresholds).filter(&summaries, 25.0);
            let mut seqs = HashMap::new();
            for &(id, start, end, lane) in agents {
                seqs.insert(id, frames(id, start, end, lane, 0));
            }
            Self {
                thresholds,
                candidates,
                frames: seqs,
            }
        }

        fn negotiator(&self) -> WindowNegotiator<'_> {
            WindowNegotiator::new(&self.thresholds, 25.0, &self.candidates, &self.frames)
        }
    }

    fn pair(window: FrameRange) -> ConvoyPair {
        ConvoyPair {
            head: 1,
            tail: 2,
            head_lane: 3,
            window,
        }
    }

    #[test]
    fn test_admits_one_agent_per_lane() {
        let fx = Fixture::new(&[
            (1, 0, 999, 3),
            (2, 0, 999, 3),
            (3, 0, 999, 4),
            (4, 0, 999, 4), // same lane as 3
            (5, 0, 999, 5),
            (6, 0, 999, 3), // head lane
        ]);
        let mut consumed = HashSet::new();
        let result = fx
            .negotiator()
            .negotiate(&pair(FrameRange::new(0, 999)), &mut consumed)
            .unwrap();

        assert_eq!(result.independent_ids, vec![3, 5]);
        assert_eq!(result.used_lanes, vec![3, 4, 5]);
        let expected: HashSet<AgentId> = [1, 2, 3, 5].into_iter().collect();
        assert_eq!(consumed, expected);
    }

    #[test]
    fn test_window_narrows_but_never_below_minimum() {
        let fx = Fixture::new(&[
            (1, 0, 999, 3),
            (2, 0, 999, 3),
            (3, 300, 999, 4),  // narrows start to 300
            (4, 0, 500, 5),    // would leave 200 frames = 8s: skipped
            (5, 0, 600, 6),    // 300 frames = 12s: admitted
        ]);
        let mut consumed = HashSet::new();
        let result = fx
            .negotiator()
            .negotiate(&pair(FrameRange::new(0, 999)), &mut consumed)
            .unwrap();

        assert_eq!(result.independent_ids, vec![3, 5]);
        assert_eq!(result.window, FrameRange::new(300, 600));
        assert!(result.window.duration_secs(25.0) >= 10.0);
        assert!(!consumed.contains(&4));
    }

    #[test]
    fn test_consumed_agents_are_not_reused() {
        let fx = Fixture::new(&[(1, 0, 999, 3), (2, 0, 999, 3), (3, 0, 999, 4), (4, 0, 999, 5)]);
        let mut consumed: HashSet<AgentId> = [3].into_iter().collect();
        let result = fx
            .negotiator()
            .negotiate(&pair(FrameRange::new(0, 999)), &mut consumed)
            .unwrap();
        assert_eq!(result.independent_ids, vec![4]);
    }

    #[test]
    fn test_no_independent_leaves_consumed_untouched() {
        let fx = Fixture::new(&[(1, 0, 999, 3), (2, 0, 999, 3), (3, 0, 999, 3)]);
        let mut consumed = HashSet::new();
        let result = fx
            .negotiator()
            .negotiate(&pair(FrameRange::new(0, 999)), &mut consumed);
        assert!(result.is_none());
        assert!(consumed.is_empty());
    }

    #[test]
    fn test_agent_without_frames_is_skipped() {
        let mut fx = Fixture::new(&[(1, 0, 999, 3), (2, 0, 999, 3), (3, 0, 999, 4)]);
        fx.frames.remove(&3);
        let mut consumed = HashSet::new();
        assert!(fx
            .negotiator()
            .negotiate(&pair(FrameRange::new(0, 999)), &mut consumed)
            .is_none());
    }

    #[test]
    fn test_head_and_tail_never_admitted_as_independents() {
        // Tail reports a different first lane than the head.
        let fx = Fixture::new(&[(1, 0, 999, 3), (2, 0, 999, 7)]);
        let mut consumed = HashSet::new();
        assert!(fx
            .negotiator()
            .negotiate(&pair(FrameRange::new(0, 999)), &mut consumed)
            .is_none());
    }
}
