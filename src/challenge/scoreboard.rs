use crate::challenge::types::{ChallengeType, SolveMethod, StrategyResult};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Weights blending the derived statistics into a method score.
///
/// `score = success_rate·w_s + avg_confidence·w_c + success_rate·latency·w_l + exploration`
/// where `latency = 1 / (1 + avg_time_secs)` and
/// `exploration = w_e / (1 + total_attempts)`. Latency only earns credit in
/// proportion to successes, so a method that fails quickly does not outrank an
/// untried one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub success_weight: f64,
    pub confidence_weight: f64,
    pub latency_weight: f64,
    pub exploration_weight: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            success_weight: 0.5,
            confidence_weight: 0.3,
            latency_weight: 0.2,
            exploration_weight: 0.3,
        }
    }
}

/// Running sums for one (challenge type, method) bucket
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodStats {
    pub total_attempts: u64,
    pub success_count: u64,
    pub confidence_sum: f64,
    pub time_sum_secs: f64,
}

impl MethodStats {
    fn record(&mut self, result: &StrategyResult) {
        self.total_attempts += 1;
        if result.success {
            self.success_count += 1;
        }
        self.confidence_sum += result.confidence;
        self.time_sum_secs += result.execution_time.as_secs_f64();
    }

    pub fn success_rate(&self) -> f64 {
        self.ratio(self.success_count as f64)
    }

    pub fn avg_confidence(&self) -> f64 {
        self.ratio(self.confidence_sum)
    }

    pub fn avg_time_secs(&self) -> f64 {
        self.ratio(self.time_sum_secs)
    }

    fn ratio(&self, sum: f64) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            sum / self.total_attempts as f64
        }
    }

    pub fn snapshot(&self) -> MethodSnapshot {
        MethodSnapshot {
            total_attempts: self.total_attempts,
            success_count: self.success_count,
            failure_count: self.total_attempts - self.success_count,
            success_rate: self.success_rate(),
            avg_confidence: self.avg_confidence(),
            avg_time_secs: self.avg_time_secs(),
        }
    }
}

/// Derived view of a bucket for introspection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSnapshot {
    pub total_attempts: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub success_rate: f64,
    pub avg_confidence: f64,
    pub avg_time_secs: f64,
}

/// Per (challenge type, method) performance history shared by concurrent resolutions.
///
/// Each `record` mutates its bucket while holding the bucket's shard lock, so two
/// tasks recording the same method never lose an update.
#[derive(Debug, Default)]
pub struct Scoreboard {
    buckets: DashMap<(ChallengeType, SolveMethod), MethodStats>,
    weights: ScoreWeights,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    pub fn record(&self, challenge_type: ChallengeType, method: SolveMethod, result: &StrategyResult) {
        let mut stats = self.buckets.entry((challenge_type, method)).or_default();
        stats.record(result);
        debug!(
            "Recorded {} attempt for {}: success={} ({}/{})",
            method, challenge_type, result.success, stats.success_count, stats.total_attempts
        );
    }

    pub fn stats(&self, challenge_type: ChallengeType, method: SolveMethod) -> MethodStats {
        self.buckets
            .get(&(challenge_type, method))
            .map(|stats| stats.clone())
            .unwrap_or_default()
    }

    pub fn score(&self, challenge_type: ChallengeType, method: SolveMethod) -> f64 {
        score_stats(&self.stats(challenge_type, method), &self.weights)
    }

    pub fn statistics(&self, challenge_type: ChallengeType) -> BTreeMap<SolveMethod, MethodSnapshot> {
        self.buckets
            .iter()
            .filter(|entry| entry.key().0 == challenge_type)
            .map(|entry| (entry.key().1, entry.value().snapshot()))
            .collect()
    }

    /// Highest scoring method with recorded history for `challenge_type`
    pub fn best_method(&self, challenge_type: ChallengeType) -> Option<(SolveMethod, f64)> {
        let mut scored: Vec<(SolveMethod, f64)> = self
            .buckets
            .iter()
            .filter(|entry| entry.key().0 == challenge_type)
            .map(|entry| (entry.key().1, score_stats(entry.value(), &self.weights)))
            .collect();

        // Method order keeps the result stable when scores tie
        scored.sort_by(|a, b| a.0.cmp(&b.0));
        scored
            .into_iter()
            .fold(None, |best: Option<(SolveMethod, f64)>, candidate| match best {
                Some(current) if current.1 >= candidate.1 => Some(current),
                _ => Some(candidate),
            })
    }

    pub fn reset(&self, challenge_type: Option<ChallengeType>) {
        match challenge_type {
            Some(challenge_type) => self.buckets.retain(|key, _| key.0 != challenge_type),
            None => self.buckets.clear(),
        }
        info!(
            "Reset method statistics for {}",
            challenge_type.map(|t| t.as_str()).unwrap_or("all challenge types")
        );
    }
}

pub fn score_stats(stats: &MethodStats, weights: &ScoreWeights) -> f64 {
    let exploration = weights.exploration_weight / (1.0 + stats.total_attempts as f64);
    if stats.total_attempts == 0 {
        return exploration;
    }

    let latency = 1.0 / (1.0 + stats.avg_time_secs());
    let success_rate = stats.success_rate();
    success_rate * weights.success_weight
        + stats.avg_confidence() * weights.confidence_weight
        + success_rate * latency * weights.latency_weight
        + exploration
}
