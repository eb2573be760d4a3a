use crate::challenge::types::{ChallengeType, SolveMethod, StrategyResult};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Final outcomes of resolutions, grouped by challenge type
#[derive(Debug, Default)]
pub struct ResolutionStatistics {
    by_type: DashMap<ChallengeType, TypeCounters>,
    total: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeCounters {
    pub count: u64,
    pub success: u64,
    pub failure: u64,
    pub methods: BTreeMap<SolveMethod, u64>,
}

impl TypeCounters {
    pub fn success_rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.success as f64 / self.count as f64
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub total: u64,
    pub by_type: BTreeMap<ChallengeType, TypeCounters>,
}

impl ResolutionStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, challenge_type: ChallengeType, result: &StrategyResult) {
        let mut counters = self.by_type.entry(challenge_type).or_default();
        counters.count += 1;
        if result.success {
            counters.success += 1;
        } else {
            counters.failure += 1;
        }
        *counters.methods.entry(result.method).or_insert(0) += 1;
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            total: self.total(),
            by_type: self
                .by_type
                .iter()
                .map(|entry| (*entry.key(), entry.value().clone()))
                .collect(),
        }
    }

    /// Share of all recorded resolutions per challenge type
    pub fn type_distribution(&self) -> BTreeMap<ChallengeType, f64> {
        let total = self.total();
        if total == 0 {
            return BTreeMap::new();
        }
        self.by_type
            .iter()
            .map(|entry| (*entry.key(), entry.value().count as f64 / total as f64))
            .collect()
    }

    pub fn reset(&self) {
        self.by_type.clear();
        self.total.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_counts_and_distribution() {
        let stats = ResolutionStatistics::new();
        let ok = StrategyResult::success(SolveMethod::Ocr, Some("42".into()), 0.9, Duration::ZERO);
        let failed = StrategyResult::failure(SolveMethod::Manual, "gave up", Duration::ZERO);

        stats.record(ChallengeType::Image, &ok);
        stats.record(ChallengeType::Image, &failed);
        stats.record(ChallengeType::Image, &ok);
        stats.record(ChallengeType::Slider, &failed);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total, 4);
        let image = &snapshot.by_type[&ChallengeType::Image];
        assert_eq!(image.count, 3);
        assert_eq!(image.success, 2);
        assert_eq!(image.failure, 1);
        assert_eq!(image.methods[&SolveMethod::Ocr], 2);
        assert!((image.success_rate() - 2.0 / 3.0).abs() < 1e-9);

        let distribution = stats.type_distribution();
        assert!((distribution[&ChallengeType::Image] - 0.75).abs() < 1e-9);
        assert!((distribution[&ChallengeType::Slider] - 0.25).abs() < 1e-9);

        stats.reset();
        assert_eq!(stats.total(), 0);
        assert!(stats.type_distribution().is_empty());
    }
}
