// src/extraction/metrics.rs
//
// Per-recording diagnostics. Every pairing attempt ends either in a scene or
// in exactly one rejection category; nothing here is fatal.

use serde::Serialize;
use std::ops::AddAssign;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// Head has something in front of it closer than the clearance headway
    PrecedingObstruction,
    /// Head reports no follower, or two different ones
    NoConsistentFollower,
    /// Follower did not pass the candidate/volatility filter
    FollowerNotVolatile,
    /// Follower headway is missing or above the convoy limit
    FollowerTooFar,
    /// Head/follower overlap is shorter than the minimum window
    WindowTooShort,
    /// No independent agent could be admitted
    NoSuitableIndependent,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrecedingObstruction => "preceding agent too close",
            Self::NoConsistentFollower => "no consistent following agent",
            Self::FollowerNotVolatile => "following agent is not a valid convoy agent",
            Self::FollowerTooFar => "following agent too far away",
            Self::WindowTooShort => "time window too short before adding independents",
            Self::NoSuitableIndependent => "no suitable independent agent",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RejectionCounters {
    pub successes: u64,
    pub preceding_obstruction: u64,
    pub no_consistent_follower: u64,
    pub follower_not_volatile: u64,
    pub follower_too_far: u64,
    pub window_too_short: u64,
    pub no_suitable_independent: u64,
}

impl RejectionCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&mut self, rejection: Rejection) {
        let counter = match rejection {
            Rejection::PrecedingObstruction => &mut self.preceding_obstruction,
            Rejection::NoConsistentFollower => &mut self.no_consistent_follower,
            Rejection::FollowerNotVolatile => &mut self.follower_not_volatile,
            Rejection::FollowerTooFar => &mut self.follower_too_far,
            Rejection::WindowTooShort => &mut self.window_too_short,
            Rejection::NoSuitableIndependent => &mut self.no_suitable_independent,
        };
        *counter += 1;
    }

    pub fn inc_success(&mut self) {
        self.successes += 1;
    }

    pub fn count(&self, rejection: Rejection) -> u64 {
        match rejection {
            Rejection::PrecedingObstruction => self.preceding_obstruction,
            Rejection::NoConsistentFollower => self.no_consistent_follower,
            Rejection::FollowerNotVolatile => self.follower_not_volatile,
            Rejection::FollowerTooFar => self.follower_too_far,
            Rejection::WindowTooShort => self.window_too_short,
            Rejection::NoSuitableIndependent => self.no_suitable_independent,
        }
    }

    pub fn rejections(&self) -> u64 {
        self.preceding_obstruction
            + self.no_consistent_follower
            + self.follower_not_volatile
            + self.follower_too_far
            + self.window_too_short
            + self.no_suitable_independent
    }

    pub fn attempts(&self) -> u64 {
        self.successes + self.rejections()
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{} successes, {} failures due to preceding agent, {} due to no following agent, \
             {} due to following agent not being a valid convoy agent, {} due to following agent \
             being too far away, {} due to too small of a time frame (prior to adding other agent), \
             {} due to not being able to find suitable other agent",
            self.successes,
            self.preceding_obstruction,
            self.no_consistent_follower,
            self.follower_not_volatile,
            self.follower_too_far,
            self.window_too_short,
            self.no_suitable_independent
        )
    }
}

impl AddAssign<&RejectionCounters> for RejectionCounters {
    fn add_assign(&mut self, other: &RejectionCounters) {
        self.successes += other.successes;
        self.preceding_obstruction += other.preceding_obstruction;
        self.no_consistent_follower += other.no_consistent_follower;
        self.follower_not_volatile += other.follower_not_volatile;
        self.follower_too_far += other.follower_too_far;
        self.window_too_short += other.window_too_short;
        self.no_suitable_independent += other.no_suitable_independent;
    }
}
