use crate::challenge::expression;
use crate::challenge::types::{SolveMethod, SolveOutcome, SolveRequest, SolverError};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// A backend able to attempt a challenge with one solving method
pub trait ChallengeSolver: Send + Sync {
    /// Attempt the challenge described by `request`.
    ///
    /// Returning `Err` is treated exactly like an unsuccessful outcome by the
    /// strategy; it never aborts the resolution.
    fn solve(&self, request: SolveRequest) -> BoxFuture<'_, Result<SolveOutcome, SolverError>>;

    /// Name used in logs
    fn solver_name(&self) -> &'static str;
}

/// Dispatches requests to the backend registered for `request.method`
#[derive(Clone, Default)]
pub struct SolverRegistry {
    solvers: HashMap<SolveMethod, Arc<dyn ChallengeSolver>>,
}

impl SolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the deterministic expression backend
    pub fn with_builtin() -> Self {
        Self::new().with_solver(
            SolveMethod::ExpressionSolver,
            Arc::new(ExpressionChallengeSolver),
        )
    }

    pub fn with_solver(mut self, method: SolveMethod, solver: Arc<dyn ChallengeSolver>) -> Self {
        self.register(method, solver);
        self
    }

    pub fn register(&mut self, method: SolveMethod, solver: Arc<dyn ChallengeSolver>) {
        debug!("Registering {} solver for method {}", solver.solver_name(), method);
        self.solvers.insert(method, solver);
    }

    pub fn get(&self, method: SolveMethod) -> Option<Arc<dyn ChallengeSolver>> {
        self.solvers.get(&method).cloned()
    }

    pub fn contains(&self, method: SolveMethod) -> bool {
        self.solvers.contains_key(&method)
    }

    pub fn methods(&self) -> Vec<SolveMethod> {
        let mut methods: Vec<_> = self.solvers.keys().copied().collect();
        methods.sort();
        methods
    }
}

impl std::fmt::Debug for SolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolverRegistry")
            .field("methods", &self.methods())
            .finish()
    }
}

impl ChallengeSolver for SolverRegistry {
    fn solve(&self, request: SolveRequest) -> BoxFuture<'_, Result<SolveOutcome, SolverError>> {
        match self.get(request.method) {
            Some(solver) => Box::pin(async move { solver.solve(request).await }),
            None => {
                let method = request.method;
                Box::pin(async move { Err(SolverError::Unregistered(method)) })
            }
        }
    }

    fn solver_name(&self) -> &'static str {
        "registry"
    }
}

/// Solves arithmetic challenges from the recognized text
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionChallengeSolver;

impl ChallengeSolver for ExpressionChallengeSolver {
    fn solve(&self, request: SolveRequest) -> BoxFuture<'_, Result<SolveOutcome, SolverError>> {
        Box::pin(async move {
            let text = request.recognition.raw_data.text().ok_or_else(|| {
                SolverError::InvalidParams("recognition carries no text".to_string())
            })?;

            Ok(match expression::extract_and_solve(text) {
                Some(answer) => SolveOutcome::solved(answer, 1.0),
                None => SolveOutcome::failed(format!("no arithmetic expression in {:?}", text)),
            })
        })
    }

    fn solver_name(&self) -> &'static str {
        "expression"
    }
}

/// Adapts an async closure into a solver
pub struct FnSolver<F> {
    name: &'static str,
    func: F,
}

impl<F, Fut> FnSolver<F>
where
    F: Fn(SolveRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<SolveOutcome, SolverError>> + Send + 'static,
{
    pub fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F, Fut> ChallengeSolver for FnSolver<F>
where
    F: Fn(SolveRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<SolveOutcome, SolverError>> + Send + 'static,
{
    fn solve(&self, request: SolveRequest) -> BoxFuture<'_, Result<SolveOutcome, SolverError>> {
        Box::pin((self.func)(request))
    }

    fn solver_name(&self) -> &'static str {
        self.name
    }
}
