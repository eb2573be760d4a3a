use crate::env;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Kind of obstacle a task ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeType {
    /// Distorted text or arithmetic rendered as an image
    Image,
    Slider,
    Click,
    Rotate,
    Puzzle,
    Sms,
    Email,
    Voice,
    Recaptcha,
    Hcaptcha,
    Turnstile,
    Behavioral,
    Unknown,
}

impl ChallengeType {
    pub const ALL: [ChallengeType; 13] = [
        ChallengeType::Image,
        ChallengeType::Slider,
        ChallengeType::Click,
        ChallengeType::Rotate,
        ChallengeType::Puzzle,
        ChallengeType::Sms,
        ChallengeType::Email,
        ChallengeType::Voice,
        ChallengeType::Recaptcha,
        ChallengeType::Hcaptcha,
        ChallengeType::Turnstile,
        ChallengeType::Behavioral,
        ChallengeType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeType::Image => "image",
            ChallengeType::Slider => "slider",
            ChallengeType::Click => "click",
            ChallengeType::Rotate => "rotate",
            ChallengeType::Puzzle => "puzzle",
            ChallengeType::Sms => "sms",
            ChallengeType::Email => "email",
            ChallengeType::Voice => "voice",
            ChallengeType::Recaptcha => "recaptcha",
            ChallengeType::Hcaptcha => "hcaptcha",
            ChallengeType::Turnstile => "turnstile",
            ChallengeType::Behavioral => "behavioral",
            ChallengeType::Unknown => "unknown",
        }
    }

    /// Whether the recognized payload is text that may hold an arithmetic expression
    pub fn carries_text(&self) -> bool {
        matches!(self, ChallengeType::Image)
    }

    /// Candidate methods in tie-break priority order
    pub fn candidate_methods(&self) -> &'static [SolveMethod] {
        match self {
            ChallengeType::Image => &[
                SolveMethod::VisionModel,
                SolveMethod::Ocr,
                SolveMethod::Manual,
            ],
            // No fast path here, so the deterministic backend gets the first try
            ChallengeType::Unknown => &[
                SolveMethod::ExpressionSolver,
                SolveMethod::VisionModel,
                SolveMethod::Ocr,
                SolveMethod::Manual,
            ],
            ChallengeType::Slider
            | ChallengeType::Click
            | ChallengeType::Rotate
            | ChallengeType::Puzzle
            | ChallengeType::Recaptcha
            | ChallengeType::Hcaptcha
            | ChallengeType::Turnstile
            | ChallengeType::Behavioral => &[SolveMethod::VisionModel, SolveMethod::Manual],
            ChallengeType::Sms | ChallengeType::Email | ChallengeType::Voice => {
                &[SolveMethod::Manual]
            }
        }
    }

    /// Tunable parameters a backend starts from for this challenge family
    pub fn base_params(&self) -> SolveParams {
        let calibration_probes = match self {
            ChallengeType::Slider | ChallengeType::Rotate | ChallengeType::Puzzle => {
                Some(BASE_CALIBRATION_PROBES)
            }
            _ => None,
        };

        SolveParams {
            calibration_probes,
            max_retries: Some(BASE_MAX_RETRIES),
            timeout_ms: Some(BASE_TIMEOUT_MS),
        }
    }
}

impl fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A way of producing an answer for a challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveMethod {
    VisionModel,
    Ocr,
    ExpressionSolver,
    Manual,
    /// The upstream recognition accepted as-is
    Recognition,
}

impl SolveMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolveMethod::VisionModel => "vision_model",
            SolveMethod::Ocr => "ocr",
            SolveMethod::ExpressionSolver => "expression_solver",
            SolveMethod::Manual => "manual",
            SolveMethod::Recognition => "recognition",
        }
    }
}

impl fmt::Display for SolveMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const BASE_CALIBRATION_PROBES: u32 = 5;
pub const MAX_CALIBRATION_PROBES: u32 = 10;
pub const BASE_MAX_RETRIES: u32 = 3;
pub const MAX_RETRIES_CAP: u32 = 5;
pub const BASE_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Payload produced by the upstream recognition step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecognitionData {
    Text { text: String },
    Offset { distance: f64 },
    Points { points: Vec<Point> },
    Angle { degrees: f64 },
    None,
}

impl RecognitionData {
    pub fn text(&self) -> Option<&str> {
        match self {
            RecognitionData::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Render the payload as the answer a form would receive
    pub fn as_answer(&self) -> Option<String> {
        match self {
            RecognitionData::Text { text } => Some(text.clone()),
            RecognitionData::Offset { distance } => Some(distance.to_string()),
            RecognitionData::Angle { degrees } => Some(degrees.to_string()),
            RecognitionData::Points { points } if !points.is_empty() => Some(
                points
                    .iter()
                    .map(|p| format!("{},{}", p.x, p.y))
                    .collect::<Vec<_>>()
                    .join(";"),
            ),
            _ => None,
        }
    }
}

/// Initial observation handed to the strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeRecognition {
    pub challenge_type: ChallengeType,
    pub raw_data: RecognitionData,
    /// Clamped to [0, 1] by the constructors
    pub confidence: f64,
    pub description: String,
}

impl ChallengeRecognition {
    pub fn new(challenge_type: ChallengeType, raw_data: RecognitionData, confidence: f64) -> Self {
        Self {
            challenge_type,
            raw_data,
            confidence: clamp_unit(confidence),
            description: String::new(),
        }
    }

    pub fn text(challenge_type: ChallengeType, text: impl Into<String>, confidence: f64) -> Self {
        Self::new(
            challenge_type,
            RecognitionData::Text { text: text.into() },
            confidence,
        )
    }

    /// Nothing was recognized upstream
    pub fn empty(challenge_type: ChallengeType) -> Self {
        Self::new(challenge_type, RecognitionData::None, 0.0)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Parameters a backend may tune between retries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibration_probes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// One invocation of a solving backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveRequest {
    pub challenge_type: ChallengeType,
    pub method: SolveMethod,
    pub recognition: ChallengeRecognition,
    pub params: SolveParams,
    /// 1-based attempt number within the current resolution
    pub attempt: u32,
}

/// What a backend reports back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveOutcome {
    pub success: bool,
    pub confidence: f64,
    pub answer: Option<String>,
    pub error: Option<String>,
}

impl SolveOutcome {
    pub fn solved(answer: impl Into<String>, confidence: f64) -> Self {
        Self {
            success: true,
            confidence: clamp_unit(confidence),
            answer: Some(answer.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            confidence: 0.0,
            answer: None,
            error: Some(error.into()),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_unit(confidence);
        self
    }
}

/// Outcome of one method attempt, or the final outcome of a resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyResult {
    pub success: bool,
    pub method: SolveMethod,
    pub confidence: f64,
    pub execution_time: Duration,
    pub answer: Option<String>,
    pub error: Option<String>,
}

impl StrategyResult {
    pub fn success(
        method: SolveMethod,
        answer: Option<String>,
        confidence: f64,
        execution_time: Duration,
    ) -> Self {
        Self {
            success: true,
            method,
            confidence: clamp_unit(confidence),
            execution_time,
            answer,
            error: None,
        }
    }

    pub fn failure(method: SolveMethod, error: impl Into<String>, execution_time: Duration) -> Self {
        Self {
            success: false,
            method,
            confidence: 0.0,
            execution_time,
            answer: None,
            error: Some(error.into()),
        }
    }

    pub(crate) fn from_outcome(
        method: SolveMethod,
        outcome: SolveOutcome,
        execution_time: Duration,
    ) -> Self {
        Self {
            success: outcome.success,
            method,
            confidence: clamp_unit(outcome.confidence),
            execution_time,
            answer: outcome.answer,
            error: outcome.error,
        }
    }
}

/// Per-strategy tuning, fixed for the lifetime of a strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub max_attempts: u32,
    pub confidence_threshold: f64,
    pub enable_learning: bool,
    pub adaptive_params: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            max_attempts: env::strategy::DEFAULT_MAX_ATTEMPTS,
            confidence_threshold: env::strategy::DEFAULT_CONFIDENCE_THRESHOLD,
            enable_learning: true,
            adaptive_params: true,
        }
    }
}

impl StrategyConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = clamp_unit(threshold);
        self
    }

    pub fn with_learning(mut self, enabled: bool) -> Self {
        self.enable_learning = enabled;
        self
    }

    pub fn with_adaptive_params(mut self, enabled: bool) -> Self {
        self.adaptive_params = enabled;
        self
    }
}

/// Errors a solving backend can report
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolverError {
    #[error("No solver registered for method {0}")]
    Unregistered(SolveMethod),
    #[error("Solver backend failed: {0}")]
    Backend(String),
    #[error("Solver timed out after {0:?}")]
    Timeout(Duration),
    #[error("Invalid solver parameters: {0}")]
    InvalidParams(String),
    #[error("Solver panicked: {0}")]
    Panicked(String),
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
