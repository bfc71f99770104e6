// src/extraction/pairing.rs
//
// Pairing engine. Turns a volatile candidate into a (head, tail) convoy pair
// or a rejection reason. Checks run in a fixed order and the first failing
// one decides the rejection category:
//
//   1. head clearance      0 <= head.minDHW < clearance      → PrecedingObstruction
//   2. follower identity   single positive followingId      → NoConsistentFollower
//   3. follower volatility follower in volatile set          → FollowerNotVolatile
//   4. follower headway    0 <= tail.minDHW < convoy limit   → FollowerTooFar
//   5. shared window       overlap >= minimum window         → WindowTooShort

use super::candidates::CandidateSet;
use super::metrics::Rejection;
use crate::dataset::FrameSequences;
use crate::types::{AgentId, ConvoyPair, FrameSample, SceneThresholds};

pub struct PairingEngine<'a> {
    thresholds: &'a SceneThresholds,
    frame_rate: f64,
    candidates: &'a CandidateSet,
    frames: &'a FrameSequences,
}

impl<'a> PairingEngine<'a> {
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

    pub fn pair(&self, head_id: AgentId) -> Result<ConvoyPair, Rejection> {
        let head = self
            .candidates
            .get(head_id)
            .ok_or(Rejection::NoConsistentFollower)?;

        if 0.0 <= head.min_dhw && head.min_dhw < self.thresholds.minimum_clearance_distance_headway
        {
            return Err(Rejection::PrecedingObstruction);
        }

        let head_frames = self.frames.get(&head_id).map(Vec::as_slice).unwrap_or(&[]);
        let (tail_id, head_lane) =
            consistent_follower(head_frames).ok_or(Rejection::NoConsistentFollower)?;

        if !self.candidates.is_volatile(tail_id) {
            return Err(Rejection::FollowerNotVolatile);
        }
        let tail = self
            .candidates
            .get(tail_id)
            .ok_or(Rejection::FollowerNotVolatile)?;

        if tail.min_dhw < 0.0 || tail.min_dhw >= self.thresholds.maximum_convoy_distance_headway {
            return Err(Rejection::FollowerTooFar);
        }

        let window = head.frame_range().intersect(&tail.frame_range());
        if window.duration_secs(self.frame_rate) < self.thresholds.minimum_time_window_secs {
            return Err(Rejection::WindowTooShort);
        }

        Ok(ConvoyPair {
            head: head_id,
            tail: tail_id,
            head_lane,
            window,
        })
    }
}

/// The single positive `followingId` reported across a sequence, with the
/// lane of the first sample. Frames without a follower (id <= 0) are neutral;
/// two different positive ids, or none at all, give `None`.
pub fn consistent_follower(frames: &[FrameSample]) -> Option<(AgentId, i64)> {
    let lane = frames.first()?.lane_id;
    let mut follower: Option<AgentId> = None;

    for sample in frames {
        if sample.following_id <= 0 {
            continue;
        }
        match follower {
            None => follower = Some(sample.following_id),
            Some(id) if id != sample.following_id => return None,
            Some(_) => {}
        }
    }

    follower.map(|id| (id, lane))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::candidates::CandidateFilter;
    use crate::extraction::fixtures::{frames, summary, volatile_summary};
    use crate::types::{AgentSummary, FrameRange};
    use std::collections::HashMap;

    fn setup(summaries: &[AgentSummary], sequences: FrameSequences) -> (CandidateSet, FrameSequences) {
        let thresholds = SceneThresholds::default();
        let set = CandidateFilter::new(&thresholds).filter(summaries, 25.0);
        (set, sequences)
    }

    fn head_and_tail() -> (AgentSummary, AgentSummary) {
        let head = volatile_summary(1, 0, 499, -1.0);
        let tail = volatile_summary(2, 50, 599, 6.0);
        (head, tail)
    }

    #[test]
    fn test_consistent_follower_ignores_gaps() {
        let mut seq = frames(1, 0, 5, 3, 2);
        seq[0].following_id = 0;
        seq[3].following_id = -1;
        assert_eq!(consistent_follower(&seq), Some((2, 3)));
    }

    #[test]
    fn test_conflicting_followers_rejected() {
        let mut seq = frames(1, 0, 5, 3, 2);
        seq[4].following_id = 7;
        assert_eq!(consistent_follower(&seq), None);
    }

    #[test]
    fn test_no_follower_or_no_frames() {
        assert_eq!(consistent_follower(&frames(1, 0, 5, 3, 0)), None);
        assert_eq!(consistent_follower(&[]), None);
    }

    #[test]
    fn test_lane_comes_from_first_sample() {
        let mut seq = frames(1, 0, 4, 3, 0);
        seq[2].following_id = 9;
        seq[2].lane_id = 5;
        assert_eq!(consistent_follower(&seq), Some((9, 3)));
    }

    #[test]
    fn test_valid_pair() {
        let (head, tail) = head_and_tail();
        let mut seqs = HashMap::new();
        seqs.insert(1, frames(1, 0, 499, 3, 2));
        seqs.insert(2, frames(2, 50, 599, 3, 0));
        let (set, seqs) = setup(&[head, tail], seqs);
        let thresholds = SceneThresholds::default();
        let engine = PairingEngine::new(&thresholds, 25.0, &set, &seqs);

        let pair = engine.pair(1).unwrap();
        assert_eq!(pair.head, 1);
        assert_eq!(pair.tail, 2);
        assert_eq!(pair.head_lane, 3);
        assert_eq!(pair.window, FrameRange::new(50, 499));
    }

    #[test]
    fn test_preceding_obstruction() {
        let (mut head, tail) = head_and_tail();
        head.min_dhw = 15.0;
        let mut seqs = HashMap::new();
        seqs.insert(1, frames(1, 0, 499, 3, 2));
        let (set, seqs) = setup(&[head, tail], seqs);
        let thresholds = SceneThresholds::default();
        let engine = PairingEngine::new(&thresholds, 25.0, &set, &seqs);
        assert_eq!(engine.pair(1), Err(Rejection::PrecedingObstruction));
    }

    #[test]
    fn test_clearance_boundary_is_accepted() {
        let (mut head, tail) = head_and_tail();
        head.min_dhw = 20.0;
        let mut seqs = HashMap::new();
        seqs.insert(1, frames(1, 0, 499, 3, 2));
        let (set, seqs) = setup(&[head, tail], seqs);
        let thresholds = SceneThresholds::default();
        let engine = PairingEngine::new(&thresholds, 25.0, &set, &seqs);
        assert!(engine.pair(1).is_ok());
    }

    #[test]
    fn test_follower_not_volatile() {
        let (head, _) = head_and_tail();
        let mut calm_tail = summary(2, 50, 599);
        calm_tail.min_x_velocity = 29.0;
        calm_tail.min_dhw = 6.0;
        let mut seqs = HashMap::new();
        seqs.insert(1, frames(1, 0, 499, 3, 2));
        let (set, seqs) = setup(&[head, calm_tail], seqs);
        let thresholds = SceneThresholds::default();
        let engine = PairingEngine::new(&thresholds, 25.0, &set, &seqs);
        assert_eq!(engine.pair(1), Err(Rejection::FollowerNotVolatile));
    }

    #[test]
    fn test_follower_headway_limits() {
        for (dhw, expected_ok) in [(-1.0, false), (0.0, true), (9.99, true), (10.0, false)] {
            let (head, mut tail) = head_and_tail();
            tail.min_dhw = dhw;
            let mut seqs = HashMap::new();
            seqs.insert(1, frames(1, 0, 499, 3, 2));
            let (set, seqs) = setup(&[head, tail], seqs);
            let thresholds = SceneThresholds::default();
            let engine = PairingEngine::new(&thresholds, 25.0, &set, &seqs);
            let result = engine.pair(1);
            if expected_ok {
                assert!(result.is_ok(), "dhw {} should pass", dhw);
            } else {
                assert_eq!(result, Err(Rejection::FollowerTooFar), "dhw {}", dhw);
            }
        }
    }

    #[test]
    fn test_window_too_short() {
        let head = volatile_summary(1, 0, 299, -1.0);
        let tail = volatile_summary(2, 100, 399, 6.0); // overlap 199 frames < 250
        let mut seqs = HashMap::new();
        seqs.insert(1, frames(1, 0, 299, 3, 2));
        let (set, seqs) = setup(&[head, tail], seqs);
        let thresholds = SceneThresholds::default();
        let engine = PairingEngine::new(&thresholds, 25.0, &set, &seqs);
        assert_eq!(engine.pair(1), Err(Rejection::WindowTooShort));
    }
}
