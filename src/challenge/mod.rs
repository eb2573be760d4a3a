pub mod expression;
pub mod scoreboard;
pub mod solver;
pub mod statistics;
pub mod strategy;
pub mod types;

#[cfg(test)]
mod tests;

pub use expression::{extract_and_solve, is_expression_challenge, solve};
pub use scoreboard::{MethodSnapshot, MethodStats, ScoreWeights, Scoreboard};
pub use solver::{ChallengeSolver, ExpressionChallengeSolver, FnSolver, SolverRegistry};
pub use statistics::{ResolutionStatistics, StatisticsSnapshot, TypeCounters};
pub use strategy::AdaptiveStrategy;
pub use types::*;
