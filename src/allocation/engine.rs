//! Allocation engine: validate, build, solve, decode.

use super::builder::{AllocationModel, AllocationModelBuilder};
use super::config::EngineConfig;
use super::error::AllocationError;
use super::extract::extract_allocation;
use super::objective::{ObjectiveBreakdown, ObjectiveComposer};
use super::progress::ProgressReporter;
use super::types::{Allocation, AvailabilityMatrix, Session, Tutor};
use super::validation::validate_availability;
use crate::cp::{BranchAndBoundSolver, CpSolver, SolverConfig, SolverStatus};
use log::{debug, info, warn};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

/// Terminal status of one solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AllocationStatus {
    /// The search completed and an allocation was found.
    Solved,
    /// The search completed and no allocation exists.
    Infeasible,
    /// Stopped by the time limit or an interrupt, with an allocation.
    TimedOutWithSolution,
    /// Stopped by the time limit or an interrupt, with nothing to show.
    TimedOutNoSolution,
}

impl AllocationStatus {
    pub fn has_solution(self) -> bool {
        matches!(self, Self::Solved | Self::TimedOutWithSolution)
    }

    fn from_solver(status: SolverStatus) -> Result<Self, AllocationError> {
        match status {
            SolverStatus::Optimal => Ok(Self::Solved),
            SolverStatus::Feasible => Ok(Self::TimedOutWithSolution),
            SolverStatus::Infeasible => Ok(Self::Infeasible),
            SolverStatus::Timeout | SolverStatus::Interrupted => Ok(Self::TimedOutNoSolution),
            SolverStatus::ModelInvalid => Err(AllocationError::InvalidModel(
                "backend rejected the model".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Idle,
    Building,
    Solving,
    Finished(AllocationStatus),
    Done,
}

/// Allocations found in debug mode.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnumerationReport {
    /// The first allocations found, up to the enumeration cap, each with
    /// its session lists sorted.
    pub snapshots: Vec<Allocation>,
    /// Number of distinct allocations found, which may exceed the cap.
    pub total_found: u64,
}

/// Everything one call to [`AllocationEngine::solve`] produced.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AllocationReport {
    pub status: AllocationStatus,
    /// `None` unless [`AllocationStatus::has_solution`].
    pub allocation: Option<Allocation>,
    /// Availability warnings. Logged, never fatal.
    pub diagnostics: Vec<String>,
    /// Objective terms of the returned allocation (normal mode only).
    pub objective: Option<ObjectiveBreakdown>,
    /// Debug mode only.
    pub enumeration: Option<EnumerationReport>,
    /// Wall time spent in the backend.
    pub solve_time_ms: i64,
}

impl AllocationReport {
    pub fn is_feasible(&self) -> bool {
        self.allocation.is_some()
    }
}

/// What to tell a user when no allocation was produced.
pub fn infeasible_message() -> &'static str {
    "No allocation was found because the allocation is infeasible.\n\
     Please ensure that a valid allocation is possible based on tutor availability: \
     every tutor needs at least their lower hour limit in available sessions, and \
     every session needs at least its lower tutor count in available tutors."
}

/// Allocates tutors to sessions.
///
/// Each call to [`solve`](Self::solve) builds a fresh model, runs the
/// backend once (optimizing, or enumerating in debug mode) and decodes
/// the result. Nothing is kept between calls.
///
/// # Examples
///
/// ```
/// use u_allocate::allocation::{
///     AllocationEngine, AllocationStatus, AvailabilityMatrix, Day, EngineConfig, Session, Tutor,
/// };
///
/// let tutors = [Tutor::new("Henry"), Tutor::new("Brae")];
/// let sessions = [
///     Session::new("T01", Day::Mon, 9),
///     Session::new("T02", Day::Mon, 10),
/// ];
/// let matrix = AvailabilityMatrix::from_fn(&tutors, &sessions, |t, s| {
///     (t.name == "Henry") == (s.id == "T01")
/// });
///
/// let report = AllocationEngine::new(EngineConfig::default())
///     .solve(&tutors, &sessions, &matrix)
///     .unwrap();
/// assert_eq!(report.status, AllocationStatus::Solved);
/// let allocation = report.allocation.unwrap();
/// assert_eq!(allocation.get("Henry"), Some(&["T01".to_string()][..]));
/// assert_eq!(allocation.get("Brae"), Some(&["T02".to_string()][..]));
/// ```
pub struct AllocationEngine<S: CpSolver = BranchAndBoundSolver> {
    config: EngineConfig,
    solver: S,
    interrupt: Option<Arc<AtomicBool>>,
}

impl AllocationEngine<BranchAndBoundSolver> {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_solver(config, BranchAndBoundSolver::new())
    }
}

impl<S: CpSolver> AllocationEngine<S> {
    pub fn with_solver(config: EngineConfig, solver: S) -> Self {
        Self {
            config,
            solver,
            interrupt: None,
        }
    }

    /// Raising `flag` stops a running solve, which then reports whatever
    /// it has found so far.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn solve(
        &self,
        tutors: &[Tutor],
        sessions: &[Session],
        availability: &AvailabilityMatrix,
    ) -> Result<AllocationReport, AllocationError> {
        self.config.validate().map_err(AllocationError::InvalidConfig)?;

        let mut state = EngineState::Idle;
        transition(&mut state, EngineState::Building);

        let diagnostics: Vec<String> = validate_availability(tutors, sessions, availability).collect();
        for message in &diagnostics {
            warn!("{message}");
        }

        let mut built = AllocationModelBuilder::new(tutors, sessions, availability).build()?;
        let composed = if self.config.debug {
            None
        } else {
            Some(ObjectiveComposer::new(tutors, sessions).compose(&mut built)?)
        };
        built.model.validate().map_err(AllocationError::InvalidModel)?;

        let solver_config = self.solver_config();
        transition(&mut state, EngineState::Solving);

        let progress = ProgressReporter::spawn(
            self.config.progress_interval,
            self.config.timeout(),
            self.config.long_run_warning,
            self.interrupt.clone(),
        );
        let started = Instant::now();

        let mut report = if self.config.debug {
            self.enumerate(tutors, sessions, &built, &solver_config)?
        } else {
            let solution = self.solver.solve(&built.model, &solver_config);
            debug!(
                "backend finished: {:?}, objective {:?}, {} nodes",
                solution.status, solution.objective_value, solution.nodes
            );
            let status = AllocationStatus::from_solver(solution.status)?;
            let (allocation, objective) = if status.has_solution() {
                (
                    Some(extract_allocation(tutors, sessions, &built.vars, &solution.values)),
                    composed.map(|c| c.breakdown(&solution.values)),
                )
            } else {
                (None, None)
            };
            AllocationReport {
                status,
                allocation,
                diagnostics: Vec::new(),
                objective,
                enumeration: None,
                solve_time_ms: 0,
            }
        };

        report.solve_time_ms = started.elapsed().as_millis() as i64;
        progress.finish();
        report.diagnostics = diagnostics;

        transition(&mut state, EngineState::Finished(report.status));
        match &report.objective {
            Some(objective) => info!(
                "allocation {:?} in {}ms, objective {objective}",
                report.status, report.solve_time_ms
            ),
            None => info!("allocation {:?} in {}ms", report.status, report.solve_time_ms),
        }
        transition(&mut state, EngineState::Done);

        Ok(report)
    }

    fn enumerate(
        &self,
        tutors: &[Tutor],
        sessions: &[Session],
        built: &AllocationModel,
        config: &SolverConfig,
    ) -> Result<AllocationReport, AllocationError> {
        let cap = self.config.enumeration_cap;
        let mut snapshots: Vec<Allocation> = Vec::new();
        let mut found: u64 = 0;

        let outcome = self.solver.enumerate(&built.model, config, &mut |values: &[bool]| {
            found += 1;
            if snapshots.len() < cap {
                let snapshot = extract_allocation(tutors, sessions, &built.vars, values).sorted();
                info!("solution {found}: {}", one_line(&snapshot));
                snapshots.push(snapshot);
            }
        });
        debug!(
            "enumeration finished: {:?}, {} solutions, {} nodes",
            outcome.status, outcome.solutions_found, outcome.nodes
        );
        info!("{found} feasible allocations found");

        let status = AllocationStatus::from_solver(outcome.status)?;
        let allocation = if status.has_solution() {
            snapshots.first().cloned()
        } else {
            None
        };

        Ok(AllocationReport {
            status,
            allocation,
            diagnostics: Vec::new(),
            objective: None,
            enumeration: Some(EnumerationReport {
                snapshots,
                total_found: found,
            }),
            solve_time_ms: 0,
        })
    }

    fn solver_config(&self) -> SolverConfig {
        let mut config = SolverConfig::default();
        if let Some(secs) = self.config.timeout_secs {
            config = config.with_time_limit_ms(secs.saturating_mul(1000));
        }
        if let Some(flag) = &self.interrupt {
            config = config.with_cancel(Arc::clone(flag));
        }
        config
    }
}

fn transition(state: &mut EngineState, next: EngineState) {
    debug!("engine: {state:?} -> {next:?}");
    *state = next;
}

fn one_line(allocation: &Allocation) -> String {
    allocation
        .iter()
        .map(|(tutor, sessions)| format!("{tutor} [{}]", sessions.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}
