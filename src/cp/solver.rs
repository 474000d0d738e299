//! CP solver interface.

use super::model::CpModel;
use super::variables::BoolVar;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Status of the solver after execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// Proven optimal solution found (or, when enumerating, the search
    /// space was exhausted).
    Optimal,
    /// Feasible solution found, but the search stopped before proving
    /// optimality (time limit or interrupt).
    Feasible,
    /// No feasible solution exists.
    Infeasible,
    /// Model is invalid or malformed.
    ModelInvalid,
    /// Time limit reached before any solution was found.
    Timeout,
    /// Interrupted before any solution was found.
    Interrupted,
}

/// Solution from a CP solver.
#[derive(Debug, Clone)]
pub struct CpSolution {
    /// Solver status.
    pub status: SolverStatus,
    /// Objective function value (if any).
    pub objective_value: Option<i64>,
    /// Variable assignment, indexed by [`BoolVar::index`]. Empty when
    /// no solution was found.
    pub values: Vec<bool>,
    /// Solve time in milliseconds.
    pub solve_time_ms: i64,
    /// Search nodes explored.
    pub nodes: u64,
}

impl CpSolution {
    /// Creates an empty solution with the given status.
    pub fn empty(status: SolverStatus) -> Self {
        Self {
            status,
            objective_value: None,
            values: Vec::new(),
            solve_time_ms: 0,
            nodes: 0,
        }
    }

    /// Whether a feasible solution was found.
    pub fn is_solution_found(&self) -> bool {
        matches!(self.status, SolverStatus::Optimal | SolverStatus::Feasible)
    }

    /// Value of a variable in this solution (`false` if none was found).
    pub fn value(&self, var: BoolVar) -> bool {
        self.values.get(var.index()).copied().unwrap_or(false)
    }
}

/// Outcome of an exhaustive enumeration.
#[derive(Debug, Clone)]
pub struct EnumerationOutcome {
    /// `Optimal` when the search space was exhausted with at least one
    /// solution, `Feasible` when it stopped early with at least one.
    pub status: SolverStatus,
    /// Number of distinct feasible assignments reported.
    pub solutions_found: u64,
    /// Solve time in milliseconds.
    pub solve_time_ms: i64,
    /// Search nodes explored.
    pub nodes: u64,
}

/// Solver configuration.
///
/// # Examples
///
/// ```
/// use u_allocate::cp::SolverConfig;
/// use std::sync::atomic::AtomicBool;
/// use std::sync::Arc;
///
/// let config = SolverConfig::default()
///     .with_time_limit_ms(5_000)
///     .with_cancel(Arc::new(AtomicBool::new(false)));
/// assert_eq!(config.time_limit_ms, Some(5_000));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SolverConfig {
    /// Maximum solve time in milliseconds. `None` = no limit.
    pub time_limit_ms: Option<u64>,
    /// Stop after finding the first feasible solution.
    pub stop_after_first: bool,
    /// External interrupt. When raised the solver returns its best
    /// solution so far.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl SolverConfig {
    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = Some(ms);
        self
    }

    pub fn with_stop_after_first(mut self, stop: bool) -> Self {
        self.stop_after_first = stop;
        self
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Time limit as a [`Duration`].
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_ms.map(Duration::from_millis)
    }

    /// Whether the external interrupt has been raised.
    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.time_limit_ms == Some(0) {
            return Err("time_limit_ms must be positive".into());
        }
        Ok(())
    }
}

/// Trait for CP solver implementations.
///
/// Implementors provide the actual constraint solving logic. This can
/// wrap an external solver or provide a custom search; model building
/// code only ever talks to this trait.
pub trait CpSolver {
    /// Solves the model and returns the best solution found.
    fn solve(&self, model: &CpModel, config: &SolverConfig) -> CpSolution;

    /// Enumerates every feasible assignment, ignoring the objective.
    ///
    /// `on_solution` is invoked once per distinct assignment with the
    /// variable values indexed by [`BoolVar::index`].
    fn enumerate(
        &self,
        model: &CpModel,
        config: &SolverConfig,
        on_solution: &mut dyn FnMut(&[bool]),
    ) -> EnumerationOutcome;
}
