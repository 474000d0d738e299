//! Branch-and-bound backend for 0/1 linear models.
//!
//! Depth-first search over the boolean variables in declaration order.
//! After every decision the linear constraints are propagated to a
//! fixpoint using their activity bounds (the smallest and largest value
//! each left-hand side can still reach). When an objective is present,
//! subtrees whose optimistic objective bound cannot beat the incumbent
//! are pruned.
//!
//! All state changes are recorded on a trail so that backtracking is an
//! undo of the trail down to the mark saved with each decision.
//!
//! The clock and the interrupt flag are polled every
//! `clock_check_mask + 1` nodes; on either signal the search returns the
//! incumbent (if any) instead of being aborted.

use super::model::{Constraint, CpModel};
use super::solver::{CpSolution, CpSolver, EnumerationOutcome, SolverConfig, SolverStatus};
use super::variables::LinearExpr;
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const UNASSIGNED: i8 = -1;

/// Exact depth-first branch-and-bound solver.
///
/// Deterministic: the same model always yields the same solution and
/// the same enumeration order.
///
/// # Examples
///
/// ```
/// use u_allocate::cp::{BranchAndBoundSolver, CpModel, CpSolver, LinearExpr, Objective, SolverConfig, SolverStatus};
///
/// let mut model = CpModel::new("knapsack");
/// let items: Vec<_> = (0..4).map(|i| model.new_bool_var(format!("x{i}"))).collect();
/// model.add_le("capacity", LinearExpr::weighted(items.iter().map(|&v| (v, 2))), 5);
/// model.set_objective(Objective::Maximize { terms: LinearExpr::weighted([
///     (items[0], 3), (items[1], 1), (items[2], 4), (items[3], 2),
/// ]) });
///
/// let solution = BranchAndBoundSolver::new().solve(&model, &SolverConfig::default());
/// assert_eq!(solution.status, SolverStatus::Optimal);
/// assert_eq!(solution.objective_value, Some(7));
/// ```
#[derive(Debug, Clone)]
pub struct BranchAndBoundSolver {
    clock_check_mask: u64,
}

impl BranchAndBoundSolver {
    /// Check the clock and interrupt flag every 1024 nodes.
    const DEFAULT_CLOCK_CHECK_MASK: u64 = 0x3FF;

    pub fn new() -> Self {
        Self {
            clock_check_mask: Self::DEFAULT_CLOCK_CHECK_MASK,
        }
    }

    /// Sets how often limits are polled. `mask` must be of the form
    /// `2^k - 1`; limits are checked when `nodes & mask == 0`.
    pub fn with_clock_check_mask(mut self, mask: u64) -> Self {
        self.clock_check_mask = mask;
        self
    }
}

impl Default for BranchAndBoundSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl CpSolver for BranchAndBoundSolver {
    fn solve(&self, model: &CpModel, config: &SolverConfig) -> CpSolution {
        if let Err(e) = model.validate().and_then(|_| config.validate()) {
            debug!("model '{}' rejected: {e}", model.name);
            return CpSolution::empty(SolverStatus::ModelInvalid);
        }

        let objective = model
            .objective
            .as_ref()
            .map(|o| o.as_maximization().normalized())
            .unwrap_or_default();

        let mut search = Search::new(model, &objective, config, self.clock_check_mask, true);
        let mut best: Option<Vec<bool>> = None;
        let stop_after_first = config.stop_after_first;

        let stop = search.run(&mut |values: &[bool], _: i64| {
            best = Some(values.to_vec());
            !stop_after_first
        });

        let status = match (stop, best.is_some()) {
            (StopReason::Exhausted, true) => SolverStatus::Optimal,
            (StopReason::Exhausted, false) => SolverStatus::Infeasible,
            (_, true) => SolverStatus::Feasible,
            (StopReason::TimeLimit, false) => SolverStatus::Timeout,
            (_, false) => SolverStatus::Interrupted,
        };

        let values = best.unwrap_or_default();
        let objective_value = match (&model.objective, values.is_empty()) {
            (Some(objective), false) => Some(objective.evaluate(&values)),
            _ => None,
        };

        debug!(
            "model '{}': {:?} after {} nodes ({:?}, stop: {:?})",
            model.name,
            status,
            search.nodes,
            search.started.elapsed(),
            stop
        );

        CpSolution {
            status,
            objective_value,
            values,
            solve_time_ms: search.started.elapsed().as_millis() as i64,
            nodes: search.nodes,
        }
    }

    fn enumerate(
        &self,
        model: &CpModel,
        config: &SolverConfig,
        on_solution: &mut dyn FnMut(&[bool]),
    ) -> EnumerationOutcome {
        let started = Instant::now();
        if let Err(e) = model.validate().and_then(|_| config.validate()) {
            debug!("model '{}' rejected: {e}", model.name);
            return EnumerationOutcome {
                status: SolverStatus::ModelInvalid,
                solutions_found: 0,
                solve_time_ms: 0,
                nodes: 0,
            };
        }

        let no_objective = LinearExpr::new();
        let mut search = Search::new(model, &no_objective, config, self.clock_check_mask, false);
        let mut found = 0u64;
        let stop_after_first = config.stop_after_first;

        let stop = search.run(&mut |values: &[bool], _: i64| {
            found += 1;
            on_solution(values);
            !stop_after_first
        });

        let status = match (stop, found > 0) {
            (StopReason::Exhausted, true) => SolverStatus::Optimal,
            (StopReason::Exhausted, false) => SolverStatus::Infeasible,
            (_, true) => SolverStatus::Feasible,
            (StopReason::TimeLimit, false) => SolverStatus::Timeout,
            (_, false) => SolverStatus::Interrupted,
        };

        debug!(
            "model '{}': enumerated {found} solutions in {} nodes ({:?}, stop: {:?})",
            model.name,
            search.nodes,
            started.elapsed(),
            stop
        );

        EnumerationOutcome {
            status,
            solutions_found: found,
            solve_time_ms: started.elapsed().as_millis() as i64,
            nodes: search.nodes,
        }
    }
}

/// Why the search loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    /// The whole tree was explored (or pruned).
    Exhausted,
    TimeLimit,
    Interrupted,
    /// The leaf callback asked to stop.
    Requested,
}

/// A linear row `lower <= Σ coef * x <= upper` with its current
/// activity bounds.
#[derive(Debug, Clone)]
struct Row {
    terms: Vec<(usize, i64)>,
    lower: i64,
    upper: i64,
    min_activity: i64,
    max_activity: i64,
}

impl Row {
    fn is_violated(&self) -> bool {
        self.min_activity > self.upper || self.max_activity < self.lower
    }

    /// Value a free variable with coefficient `coef` is forced to take.
    fn forced_value(&self, coef: i64) -> Option<bool> {
        if coef > 0 {
            if self.min_activity + coef > self.upper {
                Some(false)
            } else if self.max_activity - coef < self.lower {
                Some(true)
            } else {
                None
            }
        } else if self.max_activity + coef < self.lower {
            Some(false)
        } else if self.min_activity - coef > self.upper {
            Some(true)
        } else {
            None
        }
    }
}

/// A decision on the search stack.
#[derive(Debug, Clone, Copy)]
struct Frame {
    var: usize,
    /// Trail length before the decision was made.
    mark: usize,
    first_value: bool,
    /// Whether the second branch has already been taken.
    flipped: bool,
}

/// Per-run search state. Created fresh for every call.
struct Search {
    rows: Vec<Row>,
    /// For each variable, the rows it appears in with its coefficient.
    occurs: Vec<Vec<(usize, i64)>>,
    values: Vec<i8>,
    trail: Vec<usize>,
    queue: Vec<usize>,
    queued: Vec<bool>,
    root_conflict: bool,

    optimize: bool,
    objective: Vec<i64>,
    objective_fixed: i64,
    objective_free: i64,
    incumbent: Option<i64>,

    nodes: u64,
    clock_check_mask: u64,
    started: Instant,
    time_limit: Option<Duration>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Search {
    fn new(
        model: &CpModel,
        objective: &LinearExpr,
        config: &SolverConfig,
        clock_check_mask: u64,
        optimize: bool,
    ) -> Self {
        let n = model.var_count();
        let mut rows = Vec::new();
        let mut occurs: Vec<Vec<(usize, i64)>> = vec![Vec::new(); n];
        let mut fixes = Vec::new();
        let mut root_conflict = false;

        for constraint in &model.constraints {
            match constraint {
                Constraint::Linear {
                    expr, lower, upper, ..
                } => {
                    let expr = expr.normalized();
                    if matches!((lower, upper), (Some(lo), Some(hi)) if lo > hi) {
                        root_conflict = true;
                    }
                    let row_index = rows.len();
                    for &(var, coef) in &expr.terms {
                        occurs[var.index()].push((row_index, coef));
                    }
                    rows.push(Row {
                        terms: expr.terms.iter().map(|&(v, c)| (v.index(), c)).collect(),
                        lower: lower.unwrap_or(i64::MIN),
                        upper: upper.unwrap_or(i64::MAX),
                        min_activity: expr.min_value(),
                        max_activity: expr.max_value(),
                    });
                }
                Constraint::Fix { var, value } => fixes.push((var.index(), *value)),
            }
        }

        let mut coefficients = vec![0i64; n];
        for &(var, coef) in &objective.terms {
            coefficients[var.index()] += coef;
        }
        let objective_free = coefficients.iter().map(|&c| c.max(0)).sum();

        let row_count = rows.len();
        let mut search = Self {
            rows,
            occurs,
            values: vec![UNASSIGNED; n],
            trail: Vec::with_capacity(n),
            queue: (0..row_count).collect(),
            queued: vec![true; row_count],
            root_conflict,
            optimize,
            objective: coefficients,
            objective_fixed: 0,
            objective_free,
            incumbent: None,
            nodes: 0,
            clock_check_mask,
            started: Instant::now(),
            time_limit: config.time_limit(),
            cancel: config.cancel.clone(),
        };

        for (var, value) in fixes {
            match search.values[var] {
                UNASSIGNED => search.assign(var, value),
                current if (current == 1) != value => search.root_conflict = true,
                _ => {}
            }
        }
        search
    }

    /// Runs the search. `on_leaf` receives every complete consistent
    /// assignment (strictly improving ones when optimizing) together
    /// with its objective value, and returns whether to keep going.
    fn run(&mut self, on_leaf: &mut dyn FnMut(&[bool], i64) -> bool) -> StopReason {
        let mut frames: Vec<Frame> = Vec::new();
        let mut consistent = !self.root_conflict && self.propagate();

        loop {
            if let Some(stop) = self.check_limits() {
                return stop;
            }
            self.nodes += 1;

            if consistent && self.is_bounded_out() {
                consistent = false;
            }

            if consistent {
                let start = frames.last().map_or(0, |f| f.var + 1);
                match self.next_unassigned(start) {
                    Some(var) => {
                        let first_value = self.objective[var] >= 0;
                        frames.push(Frame {
                            var,
                            mark: self.trail.len(),
                            first_value,
                            flipped: false,
                        });
                        self.assign(var, first_value);
                        consistent = self.propagate();
                        continue;
                    }
                    None => {
                        let values: Vec<bool> = self.values.iter().map(|&v| v == 1).collect();
                        let value = self.objective_fixed;
                        if self.optimize {
                            self.incumbent = Some(value);
                        }
                        if !on_leaf(&values, value) {
                            return StopReason::Requested;
                        }
                    }
                }
            }

            // Backtrack to the deepest decision with an untried branch.
            loop {
                let Some(frame) = frames.last_mut() else {
                    return StopReason::Exhausted;
                };
                let (var, mark, value) = (frame.var, frame.mark, !frame.first_value);
                let flipped = frame.flipped;
                frame.flipped = true;
                self.undo_to(mark);
                if !flipped {
                    self.assign(var, value);
                    consistent = self.propagate();
                    break;
                }
                frames.pop();
            }
        }
    }

    fn check_limits(&self) -> Option<StopReason> {
        if self.nodes & self.clock_check_mask != 0 {
            return None;
        }
        if self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
        {
            return Some(StopReason::Interrupted);
        }
        match self.time_limit {
            Some(limit) if self.started.elapsed() >= limit => Some(StopReason::TimeLimit),
            _ => None,
        }
    }

    /// Whether the optimistic objective bound cannot beat the incumbent.
    fn is_bounded_out(&self) -> bool {
        match self.incumbent {
            Some(best) if self.optimize => self.objective_fixed + self.objective_free <= best,
            _ => false,
        }
    }

    fn next_unassigned(&self, start: usize) -> Option<usize> {
        (start..self.values.len()).find(|&v| self.values[v] == UNASSIGNED)
    }

    fn assign(&mut self, var: usize, value: bool) {
        self.values[var] = value as i8;
        self.trail.push(var);

        let c = self.objective[var];
        self.objective_free -= c.max(0);
        if value {
            self.objective_fixed += c;
        }

        for &(row, coef) in &self.occurs[var] {
            let r = &mut self.rows[row];
            match (coef > 0, value) {
                (true, true) => r.min_activity += coef,
                (true, false) => r.max_activity -= coef,
                (false, true) => r.max_activity += coef,
                (false, false) => r.min_activity -= coef,
            }
            if !self.queued[row] {
                self.queued[row] = true;
                self.queue.push(row);
            }
        }
    }

    fn unassign(&mut self, var: usize) {
        let value = self.values[var] == 1;
        self.values[var] = UNASSIGNED;

        let c = self.objective[var];
        self.objective_free += c.max(0);
        if value {
            self.objective_fixed -= c;
        }

        for &(row, coef) in &self.occurs[var] {
            let r = &mut self.rows[row];
            match (coef > 0, value) {
                (true, true) => r.min_activity -= coef,
                (true, false) => r.max_activity += coef,
                (false, true) => r.max_activity -= coef,
                (false, false) => r.min_activity += coef,
            }
        }
    }

    fn undo_to(&mut self, mark: usize) {
        while self.trail.len() > mark {
            if let Some(var) = self.trail.pop() {
                self.unassign(var);
            }
        }
        self.clear_queue();
    }

    fn clear_queue(&mut self) {
        for row in self.queue.drain(..) {
            self.queued[row] = false;
        }
    }

    /// Propagates queued rows to a fixpoint. Returns `false` on conflict.
    fn propagate(&mut self) -> bool {
        while let Some(row) = self.queue.pop() {
            self.queued[row] = false;
            if self.rows[row].is_violated() {
                self.clear_queue();
                return false;
            }
            for i in 0..self.rows[row].terms.len() {
                let (var, coef) = self.rows[row].terms[i];
                if self.values[var] != UNASSIGNED {
                    continue;
                }
                if let Some(value) = self.rows[row].forced_value(coef) {
                    self.assign(var, value);
                }
            }
        }
        true
    }
}
