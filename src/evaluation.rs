// src/evaluation.rs
//
// Scores causal-discovery results against the known convoy structure.
//
// Per scene, each reported link cause→effect is an unordered pair:
//   {head, tail}          → true positive
//   anything else         → false positive
// Duplicates and reversed duplicates count once. A scene with no true
// positive adds exactly one false negative. True negatives are whatever
// remains of C(2 + independents, 2).

use crate::types::AgentId;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// ============================================================================
// INPUT
// ============================================================================

/// Effect ids arrive as JSON numbers or numeric strings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LinkEndpoint {
    Id(AgentId),
    Text(String),
}

impl LinkEndpoint {
    pub fn agent_id(&self) -> Result<AgentId> {
        match self {
            Self::Id(id) => Ok(*id),
            Self::Text(text) => text
                .trim()
                .parse()
                .with_context(|| format!("Effect id {:?} is not an integer", text)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CausalDiscoveryResult {
    pub convoy_head_id: AgentId,
    pub convoy_tail_id: AgentId,
    pub independent_ids: Vec<AgentId>,
    pub causal_links: BTreeMap<String, Vec<LinkEndpoint>>,
    pub time_elapsed_in_microseconds: f64,
}

impl CausalDiscoveryResult {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let result = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse causal discovery result {}", path.display()))?;
        Ok(result)
    }

    /// Unordered pairs among head, tail and every independent.
    pub fn total_possible_links(&self) -> i64 {
        let n = 2 + self.independent_ids.len() as i64;
        n * (n - 1) / 2
    }

    fn is_convoy_pair(&self, a: AgentId, b: AgentId) -> bool {
        (a == self.convoy_head_id && b == self.convoy_tail_id)
            || (a == self.convoy_tail_id && b == self.convoy_head_id)
    }

    pub fn score(&self) -> Result<ConfusionCounts> {
        let mut true_links: HashSet<(AgentId, AgentId)> = HashSet::new();
        let mut false_links: HashSet<(AgentId, AgentId)> = HashSet::new();

        for (cause, effects) in &self.causal_links {
            let cause_id: AgentId = cause
                .trim()
                .parse()
                .with_context(|| format!("Cause id {:?} is not an integer", cause))?;
            for effect in effects {
                let effect_id = effect.agent_id()?;
                let key = (cause_id.min(effect_id), cause_id.max(effect_id));
                if self.is_convoy_pair(cause_id, effect_id) {
                    true_links.insert(key);
                } else {
                    false_links.insert(key);
                }
            }
        }

        let true_positives = true_links.len() as i64;
        let false_positives = false_links.len() as i64;
        let false_negatives = if true_positives == 0 { 1 } else { 0 };
        let true_negatives =
            self.total_possible_links() - (true_positives + false_positives + false_negatives);

        Ok(ConfusionCounts {
            true_positives,
            false_positives,
            false_negatives,
            true_negatives,
        })
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.time_elapsed_in_microseconds / 1.0e6
    }
}

// ============================================================================
// AGGREGATION
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionCounts {
    pub true_positives: i64,
    pub false_positives: i64,
    pub false_negatives: i64,
    pub true_negatives: i64,
}

impl AddAssign for ConfusionCounts {
    fn add_assign(&mut self, other: Self) {
        self.true_positives += other.true_positives;
        self.false_positives += other.false_positives;
        self.false_negatives += other.false_negatives;
        self.true_negatives += other.true_negatives;
    }
}

impl ConfusionCounts {
    /// Guarded: 0 when nothing was reported.
    pub fn precision(&self) -> f64 {
        let denominator = self.true_positives + self.false_positives;
        if denominator == 0 {
            0.0
        } else {
            self.true_positives as f64 / denominator as f64
        }
    }

    pub fn recall(&self) -> Option<f64> {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn fallout(&self) -> Option<f64> {
        ratio(self.false_positives, self.false_positives + self.true_negatives)
    }

    pub fn f1_score(&self) -> Option<f64> {
        ratio(
            2 * self.true_positives,
            2 * self.true_positives + self.false_positives + self.false_negatives,
        )
    }
}

fn ratio(numerator: i64, denominator: i64) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionTime {
    pub mean: f64,
    pub stdev: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub precision: f64,
    pub fallout: Option<f64>,
    pub recall: Option<f64>,
    pub f1_score: Option<f64>,
    pub execution_time: ExecutionTime,
    pub scene_count: usize,
    #[serde(flatten)]
    pub totals: ConfusionCounts,
}

#[derive(Debug, Default)]
pub struct PerformanceScorer {
    totals: ConfusionCounts,
    execution_times: Vec<f64>,
}

impl PerformanceScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, result: &CausalDiscoveryResult) -> Result<ConfusionCounts> {
        let counts = result.score()?;
        self.totals += counts;
        self.execution_times.push(result.elapsed_secs());
        Ok(counts)
    }

    pub fn scene_count(&self) -> usize {
        self.execution_times.len()
    }

    pub fn report(&self) -> Result<PerformanceReport> {
        if self.execution_times.is_empty() {
            bail!("No causal discovery results were scored");
        }
        Ok(PerformanceReport {
            precision: self.totals.precision(),
            fallout: self.totals.fallout(),
            recall: self.totals.recall(),
            f1_score: self.totals.f1_score(),
            execution_time: ExecutionTime {
                mean: mean(&self.execution_times),
                stdev: sample_stdev(&self.execution_times),
            },
            scene_count: self.scene_count(),
            totals: self.totals,
        })
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// n-1 denominator; undefined below two samples.
fn sample_stdev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

// ============================================================================
// DRIVER
// ============================================================================

/// Sorted paths matching a glob expression; an invalid pattern or an empty
/// match is an error.
pub fn expand_inputs(pattern: &str) -> Result<Vec<PathBuf>> {
    let entries =
        glob::glob(pattern).with_context(|| format!("Invalid input path expression {:?}", pattern))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.context("Failed to read a matched input path")?;
        if path.is_file() {
            paths.push(path);
        }
    }
    if paths.is_empty() {
        bail!("Input path expression {:?} matched no files", pattern);
    }
    paths.sort();
    Ok(paths)
}

pub fn evaluate(pattern: &str, output: &Path) -> Result<PerformanceReport> {
    let inputs = expand_inputs(pattern)?;
    info!("Scoring {} causal discovery result(s)", inputs.len());

    let mut scorer = PerformanceScorer::new();
    for path in &inputs {
        let result = CausalDiscoveryResult::load(path)?;
        let counts = scorer.add(&result)?;
        debug!(
            "{}: tp={} fp={} fn={} tn={}",
            path.display(),
            counts.true_positives,
            counts.false_positives,
            counts.false_negatives,
            counts.true_negatives
        );
    }

    let report = scorer.report()?;
    let json = serde_json::to_string_pretty(&report)?;
    fs::write(output, json).with_context(|| format!("Failed to write {}", output.display()))?;
    info!("Performance report written to {}", output.display());

    Ok(report)
}
