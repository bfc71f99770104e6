// src/extraction/candidates.rs
//
// Candidate filter. An agent is a candidate when it never changes lane and
// is observed for at least the minimum window. A candidate is volatile when
// its longitudinal velocity swings by a large enough fraction of its maximum.

use crate::types::{AgentId, AgentSummary, SceneThresholds};
use std::collections::{HashMap, HashSet};

/// Candidates in tracksMeta order, plus the volatile subset (same order).
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    agents: Vec<AgentSummary>,
    index: HashMap<AgentId, usize>,
    volatile: Vec<AgentId>,
    volatile_ids: HashSet<AgentId>,
}

impl CandidateSet {
    pub fn get(&self, id: AgentId) -> Option<&AgentSummary> {
        self.index.get(&id).map(|&i| &self.agents[i])
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn is_volatile(&self, id: AgentId) -> bool {
        self.volatile_ids.contains(&id)
    }

    /// Candidates in their natural enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = &AgentSummary> {
        self.agents.iter()
    }

    pub fn volatile_ids(&self) -> &[AgentId] {
        &self.volatile
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn volatile_len(&self) -> usize {
        self.volatile.len()
    }
}

pub struct CandidateFilter<'a> {
    thresholds: &'a SceneThresholds,
}

impl<'a> CandidateFilter<'a> {
    pub fn new(thresholds: &'a SceneThresholds) -> Self {
        Self { thresholds }
    }

    pub fn is_candidate(&self, agent: &AgentSummary, frame_rate: f64) -> bool {
        agent.num_lane_changes == 0
            && agent.num_frames / frame_rate >= self.thresholds.minimum_time_window_secs
    }

    /// A zero maximum velocity gives an infinite or NaN ratio; infinity
    /// counts as volatile, NaN does not.
    pub fn is_volatile(&self, agent: &AgentSummary) -> bool {
        let swing = (agent.max_x_velocity - agent.min_x_velocity).abs() / agent.max_x_velocity.abs();
        swing >= self.thresholds.velocity_proportional_diff
    }

    pub fn filter(&self, summaries: &[AgentSummary], frame_rate: f64) -> CandidateSet {
        let mut set = CandidateSet::default();

        for agent in summaries {
            if !self.is_candidate(agent, frame_rate) {
                continue;
            }
            // Later duplicates of an id replace the earlier row in place.
            match set.index.get(&agent.id) {
                Some(&i) => set.agents[i] = agent.clone(),
                None => {
                    set.index.insert(agent.id, set.agents.len());
                    set.agents.push(agent.clone());
                }
            }
            if self.is_volatile(agent) && set.volatile_ids.insert(agent.id) {
                set.volatile.push(agent.id);
            }
        }

        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::fixtures::summary;

    #[test]
    fn test_candidate_requires_no_lane_change_and_duration() {
        let thresholds = SceneThresholds::default();
        let filter = CandidateFilter::new(&thresholds);

        let steady = summary(1, 0, 299);
        let mut lane_changer = summary(2, 0, 299);
        lane_changer.num_lane_changes = 1;
        let short = summary(3, 0, 200); // 201 frames = 8.04s at 25fps
        let exact = summary(4, 0, 249); // 250 frames = 10.0s

        let set = filter.filter(&[steady, lane_changer, short, exact], 25.0);
        let ids: Vec<AgentId> = set.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 4]);
        assert!(!set.contains(2));
        assert!(!set.contains(3));
    }

    #[test]
    fn test_volatile_subset_uses_velocity_swing() {
        let thresholds = SceneThresholds::default();
        let filter = CandidateFilter::new(&thresholds);

        let mut calm = summary(1, 0, 299);
        calm.min_x_velocity = 28.0;
        calm.max_x_velocity = 30.0;
        let mut swingy = summary(2, 0, 299);
        swingy.min_x_velocity = 20.0;
        swingy.max_x_velocity = 30.0;
        // Opposite driving direction: negative velocities
        let mut reverse = summary(3, 0, 299);
        reverse.min_x_velocity = -30.0;
        reverse.max_x_velocity = -20.0;

        let set = filter.filter(&[calm, swingy, reverse], 25.0);
        assert_eq!(set.len(), 3);
        assert_eq!(set.volatile_ids(), &[2, 3]);
        assert!(set.is_volatile(2));
        assert!(!set.is_volatile(1));
    }

    #[test]
    fn test_volatile_never_outside_candidates() {
        let thresholds = SceneThresholds::default();
        let filter = CandidateFilter::new(&thresholds);
        let mut lane_changer = summary(1, 0, 299);
        lane_changer.num_lane_changes = 2;
        lane_changer.min_x_velocity = 5.0;

        let set = filter.filter(&[lane_changer], 25.0);
        assert!(set.is_empty());
        assert_eq!(set.volatile_len(), 0);
    }

    #[test]
    fn test_zero_max_velocity() {
        let thresholds = SceneThresholds::default();
        let filter = CandidateFilter::new(&thresholds);
        let mut stopped = summary(1, 0, 299);
        stopped.min_x_velocity = 0.0;
        stopped.max_x_velocity = 0.0;
        let mut creeping = summary(2, 0, 299);
        creeping.min_x_velocity = 1.0;
        creeping.max_x_velocity = 0.0;

        assert!(!filter.is_volatile(&stopped));
        assert!(filter.is_volatile(&creeping));
    }
}
