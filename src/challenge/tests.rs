use super::*;
use std::sync::{Arc, Mutex};

/// Records every request and answers through `respond`
fn scripted<R>(respond: R) -> (impl ChallengeSolver, Arc<Mutex<Vec<SolveRequest>>>)
where
    R: Fn(&SolveRequest, usize) -> Result<SolveOutcome, SolverError> + Send + Sync + 'static,
{
    let calls = Arc::new(Mutex::new(Vec::new()));
    let recorded = calls.clone();
    let solver = FnSolver::new("scripted", move |request: SolveRequest| {
        let index = {
            let mut calls = recorded.lock().unwrap();
            calls.push(request.clone());
            calls.len() - 1
        };
        let outcome = respond(&request, index);
        async move { outcome }
    });
    (solver, calls)
}

fn methods(calls: &Arc<Mutex<Vec<SolveRequest>>>) -> Vec<SolveMethod> {
    calls.lock().unwrap().iter().map(|r| r.method).collect()
}

fn total_recorded(strategy: &AdaptiveStrategy, challenge_type: ChallengeType) -> u64 {
    strategy
        .scoreboard()
        .statistics(challenge_type)
        .values()
        .map(|s| s.total_attempts)
        .sum()
}

fn low_confidence_text(text: &str) -> ChallengeRecognition {
    ChallengeRecognition::text(ChallengeType::Image, text, 0.3)
}

#[tokio::test]
async fn test_falls_back_from_vision_to_ocr() {
    let strategy = AdaptiveStrategy::new(StrategyConfig::default().with_max_attempts(3));
    let (solver, calls) = scripted(|request, _| match request.method {
        SolveMethod::VisionModel => Ok(SolveOutcome::failed("blurry image")),
        SolveMethod::Ocr => Ok(SolveOutcome::solved("XY7Z", 0.9)),
        _ => Ok(SolveOutcome::failed("unexpected")),
    });

    let result = strategy
        .execute_adaptive_strategy(ChallengeType::Image, &low_confidence_text("XY7Z"), &solver)
        .await;

    assert!(result.success);
    assert_eq!(result.method, SolveMethod::Ocr);
    assert_eq!(result.answer.as_deref(), Some("XY7Z"));
    assert_eq!(methods(&calls), vec![SolveMethod::VisionModel, SolveMethod::Ocr]);
    assert_eq!(total_recorded(&strategy, ChallengeType::Image), 2);
}

#[tokio::test]
async fn test_fast_path_skips_method_search() {
    let strategy = AdaptiveStrategy::new(StrategyConfig::default());
    let (solver, calls) = scripted(|_, _| Ok(SolveOutcome::failed("should not be called")));

    let result = strategy
        .execute_adaptive_strategy(ChallengeType::Image, &low_confidence_text("6-9=?"), &solver)
        .await;

    assert!(result.success);
    assert_eq!(result.method, SolveMethod::ExpressionSolver);
    assert_eq!(result.answer.as_deref(), Some("-3"));
    assert_eq!(result.confidence, 1.0);
    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(total_recorded(&strategy, ChallengeType::Image), 0);
    assert_eq!(strategy.statistics().total(), 1);
}

#[tokio::test]
async fn test_fast_path_only_for_text_challenges() {
    let strategy = AdaptiveStrategy::new(StrategyConfig::default());
    let (solver, calls) = scripted(|_, _| Ok(SolveOutcome::solved("120", 0.8)));
    let recognition = ChallengeRecognition::text(ChallengeType::Slider, "6-9=?", 0.1);

    let result = strategy
        .execute_adaptive_strategy(ChallengeType::Slider, &recognition, &solver)
        .await;

    assert!(result.success);
    assert_eq!(result.method, SolveMethod::VisionModel);
    assert_eq!(calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_high_confidence_recognition_is_accepted() {
    let strategy = AdaptiveStrategy::new(StrategyConfig::default());
    let (solver, calls) = scripted(|_, _| Ok(SolveOutcome::failed("should not be called")));
    let recognition = ChallengeRecognition::text(ChallengeType::Image, "ABC123", 0.95)
        .with_description("clear image");

    let result = strategy
        .execute_adaptive_strategy(ChallengeType::Image, &recognition, &solver)
        .await;

    assert!(result.success);
    assert_eq!(result.method, SolveMethod::Recognition);
    assert_eq!(result.answer.as_deref(), Some("ABC123"));
    assert!((result.confidence - 0.95).abs() < 1e-9);
    assert!(calls.lock().unwrap().is_empty());

    let stats = strategy.scoreboard().statistics(ChallengeType::Image);
    assert_eq!(stats[&SolveMethod::Recognition].total_attempts, 1);
}

#[tokio::test]
async fn test_exhaustion_returns_last_attempt_unsuccessful() {
    let strategy = AdaptiveStrategy::new(StrategyConfig::default().with_max_attempts(5));
    let (solver, calls) = scripted(|request, _| {
        Ok(SolveOutcome::failed(format!("{} could not read it", request.method)))
    });

    let result = strategy
        .execute_adaptive_strategy(ChallengeType::Image, &low_confidence_text("??"), &solver)
        .await;

    assert!(!result.success);
    assert_eq!(
        methods(&calls),
        vec![
            SolveMethod::VisionModel,
            SolveMethod::Ocr,
            SolveMethod::Manual,
            SolveMethod::VisionModel,
            SolveMethod::Ocr,
        ]
    );
    assert_eq!(result.method, SolveMethod::Ocr);
    assert_eq!(result.error.as_deref(), Some("ocr could not read it"));
    assert_eq!(total_recorded(&strategy, ChallengeType::Image), 5);
}

#[tokio::test]
async fn test_low_confidence_success_keeps_searching() {
    let strategy = AdaptiveStrategy::new(
        StrategyConfig::default()
            .with_max_attempts(2)
            .with_confidence_threshold(0.6),
    );
    let (solver, calls) = scripted(|request, _| match request.method {
        SolveMethod::VisionModel => Ok(SolveOutcome::solved("maybe", 0.3)),
        _ => Ok(SolveOutcome::solved("sure", 0.7)),
    });

    let result = strategy
        .execute_adaptive_strategy(ChallengeType::Image, &low_confidence_text("??"), &solver)
        .await;

    assert!(result.success);
    assert_eq!(result.answer.as_deref(), Some("sure"));
    assert_eq!(calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_low_confidence_success_at_exhaustion_is_unsuccessful() {
    let strategy = AdaptiveStrategy::new(StrategyConfig::default().with_max_attempts(1));
    let (solver, _calls) = scripted(|_, _| Ok(SolveOutcome::solved("maybe", 0.2)));

    let result = strategy
        .execute_adaptive_strategy(ChallengeType::Image, &low_confidence_text("??"), &solver)
        .await;

    assert!(!result.success);
    assert_eq!(result.answer.as_deref(), Some("maybe"));
    assert!(result.error.unwrap().contains("below threshold"));
}

#[tokio::test]
async fn test_backend_errors_and_panics_are_failed_attempts() {
    let strategy = AdaptiveStrategy::new(StrategyConfig::default().with_max_attempts(3));
    let (solver, calls) = scripted(|request, _| match request.method {
        SolveMethod::VisionModel => Err(SolverError::Backend("connection reset".into())),
        SolveMethod::Ocr => panic!("ocr engine crashed"),
        _ => Ok(SolveOutcome::solved("typed by hand", 1.0)),
    });

    let result = strategy
        .execute_adaptive_strategy(ChallengeType::Image, &low_confidence_text("??"), &solver)
        .await;

    assert!(result.success);
    assert_eq!(result.method, SolveMethod::Manual);

    let stats = strategy.scoreboard().statistics(ChallengeType::Image);
    assert_eq!(stats[&SolveMethod::VisionModel].failure_count, 1);
    assert_eq!(stats[&SolveMethod::Ocr].failure_count, 1);
    assert_eq!(calls.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_panic_inside_future_is_contained() {
    let strategy = AdaptiveStrategy::new(StrategyConfig::default().with_max_attempts(1));
    let solver = FnSolver::new("exploding", |_request: SolveRequest| async move {
        if true {
            panic!("boom");
        }
        Ok(SolveOutcome::solved("never", 1.0))
    });

    let result = strategy
        .execute_adaptive_strategy(ChallengeType::Image, &low_confidence_text("??"), &solver)
        .await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("boom"));
}

#[tokio::test]
async fn test_learning_reorders_methods_across_invocations() {
    let strategy = AdaptiveStrategy::new(StrategyConfig::default());
    let (solver, calls) = scripted(|request, _| match request.method {
        SolveMethod::Ocr => Ok(SolveOutcome::solved("K3P9", 0.9)),
        _ => Ok(SolveOutcome::failed("no luck")),
    });
    let recognition = low_confidence_text("K3P9");

    strategy
        .execute_adaptive_strategy(ChallengeType::Image, &recognition, &solver)
        .await;
    let second = strategy
        .execute_adaptive_strategy(ChallengeType::Image, &recognition, &solver)
        .await;

    assert!(second.success);
    assert_eq!(
        methods(&calls),
        vec![SolveMethod::VisionModel, SolveMethod::Ocr, SolveMethod::Ocr]
    );
    assert_eq!(
        strategy.scoreboard().best_method(ChallengeType::Image).map(|(m, _)| m),
        Some(SolveMethod::Ocr)
    );
}

#[tokio::test]
async fn test_learning_disabled_records_nothing() {
    let strategy = AdaptiveStrategy::new(StrategyConfig::default().with_learning(false));
    let (solver, _calls) = scripted(|request, _| match request.method {
        SolveMethod::Ocr => Ok(SolveOutcome::solved("ok", 0.9)),
        _ => Ok(SolveOutcome::failed("no")),
    });

    let result = strategy
        .execute_adaptive_strategy(ChallengeType::Image, &low_confidence_text("??"), &solver)
        .await;

    assert!(result.success);
    assert!(strategy.scoreboard().statistics(ChallengeType::Image).is_empty());
    assert_eq!(strategy.statistics().total(), 1);
}

#[tokio::test]
async fn test_adaptive_params_grow_on_repeated_failure() {
    let strategy = AdaptiveStrategy::new(StrategyConfig::default().with_max_attempts(4));
    let (solver, calls) = scripted(|_, _| Ok(SolveOutcome::failed("missed the gap")));
    let recognition = ChallengeRecognition::new(
        ChallengeType::Slider,
        RecognitionData::Offset { distance: 112.0 },
        0.2,
    );

    strategy
        .execute_adaptive_strategy(ChallengeType::Slider, &recognition, &solver)
        .await;

    let calls = calls.lock().unwrap();
    let probes: Vec<_> = calls
        .iter()
        .map(|r| (r.method, r.params.calibration_probes))
        .collect();
    assert_eq!(
        probes,
        vec![
            (SolveMethod::VisionModel, Some(5)),
            (SolveMethod::Manual, Some(5)),
            (SolveMethod::VisionModel, Some(7)),
            (SolveMethod::Manual, Some(7)),
        ]
    );
    assert_eq!(calls[2].params.max_retries, Some(4));
    assert_eq!(calls[2].params.timeout_ms, Some(90_000));
    assert_eq!(calls[2].attempt, 3);
}

#[tokio::test]
async fn test_adaptive_params_disabled_keeps_base_params() {
    let strategy = AdaptiveStrategy::new(
        StrategyConfig::default()
            .with_max_attempts(4)
            .with_adaptive_params(false),
    );
    let (solver, calls) = scripted(|_, _| Ok(SolveOutcome::failed("missed")));
    let recognition = ChallengeRecognition::empty(ChallengeType::Rotate);

    strategy
        .execute_adaptive_strategy(ChallengeType::Rotate, &recognition, &solver)
        .await;

    assert!(
        calls
            .lock()
            .unwrap()
            .iter()
            .all(|r| r.params == ChallengeType::Rotate.base_params())
    );
}

#[tokio::test]
async fn test_manual_only_challenge_retries_manual() {
    let strategy = AdaptiveStrategy::new(StrategyConfig::default().with_max_attempts(2));
    let (solver, calls) = scripted(|_, n| {
        if n == 0 {
            Ok(SolveOutcome::failed("code expired"))
        } else {
            Ok(SolveOutcome::solved("482913", 1.0))
        }
    });

    let result = strategy
        .execute_adaptive_strategy(ChallengeType::Sms, &ChallengeRecognition::empty(ChallengeType::Sms), &solver)
        .await;

    assert!(result.success);
    assert_eq!(methods(&calls), vec![SolveMethod::Manual, SolveMethod::Manual]);
}

#[tokio::test]
async fn test_registry_backed_resolution_reports_unregistered_methods() {
    let registry = SolverRegistry::new().with_solver(
        SolveMethod::Ocr,
        Arc::new(FnSolver::new("ocr", |_req| async {
            Ok(SolveOutcome::solved("7HQ2", 0.85))
        })),
    );
    let strategy = AdaptiveStrategy::new(StrategyConfig::default());

    let result = strategy
        .execute_adaptive_strategy(ChallengeType::Image, &low_confidence_text("7HQ2"), &registry)
        .await;

    assert!(result.success);
    assert_eq!(result.method, SolveMethod::Ocr);
    let stats = strategy.scoreboard().statistics(ChallengeType::Image);
    assert_eq!(stats[&SolveMethod::VisionModel].failure_count, 1);
}

#[tokio::test]
async fn test_unknown_challenge_uses_expression_backend() {
    let strategy = AdaptiveStrategy::new(StrategyConfig::default());
    let recognition =
        ChallengeRecognition::text(ChallengeType::Unknown, "please enter 7*6=?", 0.2);

    let result = strategy
        .execute_adaptive_strategy(
            ChallengeType::Unknown,
            &recognition,
            &SolverRegistry::with_builtin(),
        )
        .await;

    assert!(result.success);
    assert_eq!(result.method, SolveMethod::ExpressionSolver);
    assert_eq!(result.answer.as_deref(), Some("42"));
    let stats = strategy.scoreboard().statistics(ChallengeType::Unknown);
    assert_eq!(stats[&SolveMethod::ExpressionSolver].total_attempts, 1);
}

#[tokio::test]
async fn test_unknown_challenge_falls_through_without_arithmetic() {
    let strategy = AdaptiveStrategy::new(StrategyConfig::default().with_max_attempts(2));
    let (solver, calls) = scripted(|request, _| match request.method {
        SolveMethod::ExpressionSolver => Ok(SolveOutcome::failed("no expression")),
        SolveMethod::VisionModel => Ok(SolveOutcome::solved("K9P", 0.9)),
        _ => Ok(SolveOutcome::failed("unexpected")),
    });
    let recognition = ChallengeRecognition::text(ChallengeType::Unknown, "K9P", 0.2);

    let result = strategy
        .execute_adaptive_strategy(ChallengeType::Unknown, &recognition, &solver)
        .await;

    assert!(result.success);
    assert_eq!(result.method, SolveMethod::VisionModel);
    assert_eq!(
        methods(&calls),
        vec![SolveMethod::ExpressionSolver, SolveMethod::VisionModel]
    );
}
