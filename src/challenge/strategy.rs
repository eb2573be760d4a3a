use crate::challenge::expression;
use crate::challenge::scoreboard::Scoreboard;
use crate::challenge::solver::ChallengeSolver;
use crate::challenge::statistics::ResolutionStatistics;
use crate::challenge::types::*;
use futures::FutureExt;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const MAX_TIMEOUT_MULTIPLIER: f64 = 4.0;
const TIMEOUT_GROWTH: f64 = 1.5;

/// Resolves challenges by trying interchangeable solving methods, learning from
/// every attempt which method to try first next time.
#[derive(Debug)]
pub struct AdaptiveStrategy {
    config: StrategyConfig,
    scoreboard: Arc<Scoreboard>,
    statistics: Arc<ResolutionStatistics>,
}

impl AdaptiveStrategy {
    pub fn new(config: StrategyConfig) -> Self {
        Self::with_shared(
            config,
            Arc::new(Scoreboard::new()),
            Arc::new(ResolutionStatistics::new()),
        )
    }

    /// Build a strategy that learns into an existing scoreboard
    pub fn with_shared(
        config: StrategyConfig,
        scoreboard: Arc<Scoreboard>,
        statistics: Arc<ResolutionStatistics>,
    ) -> Self {
        Self {
            config,
            scoreboard,
            statistics,
        }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn scoreboard(&self) -> &Arc<Scoreboard> {
        &self.scoreboard
    }

    pub fn statistics(&self) -> &Arc<ResolutionStatistics> {
        &self.statistics
    }

    /// Resolve one challenge.
    ///
    /// Never fails: backend errors become unsuccessful attempts, and running out
    /// of attempts yields the last attempt marked unsuccessful.
    pub async fn execute_adaptive_strategy(
        &self,
        challenge_type: ChallengeType,
        recognition: &ChallengeRecognition,
        solver: &dyn ChallengeSolver,
    ) -> StrategyResult {
        let result = self.resolve(challenge_type, recognition, solver).await;
        self.statistics.record(challenge_type, &result);
        result
    }

    async fn resolve(
        &self,
        challenge_type: ChallengeType,
        recognition: &ChallengeRecognition,
        solver: &dyn ChallengeSolver,
    ) -> StrategyResult {
        if let Some(result) = self.try_fast_path(challenge_type, recognition) {
            return result;
        }

        if let Some(result) = self.try_accept_recognition(challenge_type, recognition) {
            return result;
        }

        self.search(challenge_type, recognition, solver).await
    }

    fn try_fast_path(
        &self,
        challenge_type: ChallengeType,
        recognition: &ChallengeRecognition,
    ) -> Option<StrategyResult> {
        if !challenge_type.carries_text() {
            return None;
        }

        let started = Instant::now();
        let (answer, normalized) = expression::solve(recognition.raw_data.text()?)?;
        info!(
            "Solved {} challenge {} deterministically -> {}",
            challenge_type, normalized, answer
        );

        Some(StrategyResult::success(
            SolveMethod::ExpressionSolver,
            Some(answer),
            1.0,
            started.elapsed(),
        ))
    }

    fn try_accept_recognition(
        &self,
        challenge_type: ChallengeType,
        recognition: &ChallengeRecognition,
    ) -> Option<StrategyResult> {
        if recognition.confidence < self.config.confidence_threshold {
            return None;
        }
        let answer = recognition.raw_data.as_answer()?;

        let result = StrategyResult::success(
            SolveMethod::Recognition,
            Some(answer),
            recognition.confidence,
            Duration::ZERO,
        );
        if self.config.enable_learning {
            self.scoreboard
                .record(challenge_type, SolveMethod::Recognition, &result);
        }

        info!(
            "Accepted upstream recognition for {} (confidence {:.2} >= {:.2})",
            challenge_type, recognition.confidence, self.config.confidence_threshold
        );
        Some(result)
    }

    async fn search(
        &self,
        challenge_type: ChallengeType,
        recognition: &ChallengeRecognition,
        solver: &dyn ChallengeSolver,
    ) -> StrategyResult {
        let candidates = challenge_type.candidate_methods();
        let max_attempts = self.config.max_attempts.max(1);
        let mut tried: HashSet<SolveMethod> = HashSet::new();
        let mut failures: HashMap<SolveMethod, u32> = HashMap::new();
        let mut last_result: Option<StrategyResult> = None;

        for attempt in 1..=max_attempts {
            if tried.len() >= candidates.len() {
                debug!(
                    "All {} methods tried for {}, starting another pass",
                    candidates.len(),
                    challenge_type
                );
                tried.clear();
            }

            let method = self.select_method(challenge_type, candidates, &tried);
            tried.insert(method);

            let request = SolveRequest {
                challenge_type,
                method,
                recognition: recognition.clone(),
                params: self.tune_params(challenge_type, failures.get(&method).copied().unwrap_or(0)),
                attempt,
            };
            let result = Self::invoke(solver, request).await;

            if self.config.enable_learning {
                self.scoreboard.record(challenge_type, method, &result);
            }

            if result.success && result.confidence >= self.config.confidence_threshold {
                info!(
                    "Adaptive strategy succeeded with {} for {} (confidence {:.2}, {:?}, attempt {})",
                    method, challenge_type, result.confidence, result.execution_time, attempt
                );
                return result;
            }

            *failures.entry(method).or_insert(0) += 1;
            warn!(
                "Method {} failed for {} (attempt {}/{}): {}",
                method,
                challenge_type,
                attempt,
                max_attempts,
                result.error.as_deref().unwrap_or("confidence below threshold")
            );
            last_result = Some(result);
        }

        warn!(
            "All adaptive attempts exhausted for {} after {} attempts",
            challenge_type, max_attempts
        );
        self.exhausted(last_result)
    }

    fn exhausted(&self, last_result: Option<StrategyResult>) -> StrategyResult {
        let mut result = last_result.unwrap_or_else(|| {
            StrategyResult::failure(SolveMethod::Manual, "no method attempted", Duration::ZERO)
        });
        if result.error.is_none() {
            result.error = Some(format!(
                "confidence {:.2} below threshold {:.2}",
                result.confidence, self.config.confidence_threshold
            ));
        }
        result.success = false;
        result
    }

    /// Highest scoring untried candidate; earlier candidates win ties
    fn select_method(
        &self,
        challenge_type: ChallengeType,
        candidates: &[SolveMethod],
        tried: &HashSet<SolveMethod>,
    ) -> SolveMethod {
        let mut best: Option<(SolveMethod, f64)> = None;
        for &method in candidates.iter().filter(|m| !tried.contains(m)) {
            let score = self.scoreboard.score(challenge_type, method);
            match best {
                Some((_, best_score)) if best_score >= score => {}
                _ => best = Some((method, score)),
            }
        }

        match best {
            Some((method, score)) => {
                debug!("Selected {} for {} (score {:.3})", method, challenge_type, score);
                method
            }
            None => SolveMethod::Manual,
        }
    }

    /// Base parameters for the challenge family, grown by prior failures of the method
    fn tune_params(&self, challenge_type: ChallengeType, failures: u32) -> SolveParams {
        let mut params = challenge_type.base_params();
        if !self.config.adaptive_params || failures == 0 {
            return params;
        }

        params.calibration_probes = params
            .calibration_probes
            .map(|probes| (probes + 2 * failures).min(MAX_CALIBRATION_PROBES));
        params.max_retries = params
            .max_retries
            .map(|retries| (retries + failures).min(MAX_RETRIES_CAP));
        params.timeout_ms = params.timeout_ms.map(|timeout| {
            let factor = TIMEOUT_GROWTH.powi(failures as i32).min(MAX_TIMEOUT_MULTIPLIER);
            (timeout as f64 * factor) as u64
        });

        debug!(
            "Adjusted params for {} after {} failures: {:?}",
            challenge_type, failures, params
        );
        params
    }

    async fn invoke(solver: &dyn ChallengeSolver, request: SolveRequest) -> StrategyResult {
        let method = request.method;
        let started = Instant::now();
        let outcome = match std::panic::catch_unwind(AssertUnwindSafe(|| solver.solve(request))) {
            Ok(future) => AssertUnwindSafe(future).catch_unwind().await,
            Err(panic) => Err(panic),
        };
        let elapsed = started.elapsed();

        match outcome {
            Ok(Ok(outcome)) => StrategyResult::from_outcome(method, outcome, elapsed),
            Ok(Err(error)) => StrategyResult::failure(method, error.to_string(), elapsed),
            Err(panic) => StrategyResult::failure(
                method,
                SolverError::Panicked(panic_message(panic.as_ref())).to_string(),
                elapsed,
            ),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
