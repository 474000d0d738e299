//! Constraint Programming (CP) backend layer.
//!
//! Provides a domain-agnostic 0/1 model for constrained optimization
//! problems: boolean variables, linear constraints over them, and an
//! optional linear objective.
//!
//! # Key Components
//!
//! - **Variables**: [`BoolVar`], [`LinearExpr`]: decision variables and
//!   linear combinations of them
//! - **Constraints**: [`Constraint`]: linear ranges and fixings
//! - **Model**: [`CpModel`]: container for variables, constraints, objective
//! - **Solver**: [`CpSolver`] trait: single-best and enumeration modes
//! - **Backend**: [`BranchAndBoundSolver`]: exact depth-first search
//!
//! # Design
//!
//! Model building code only talks to [`CpSolver`], so the bundled
//! branch-and-bound can be swapped for an external solver without
//! touching it. Time limits and interrupts are cooperative: a solver
//! returns its incumbent rather than being killed.
//!
//! # References
//!
//! Rossi, van Beek & Walsh (2006), "Handbook of Constraint Programming"

mod model;
mod search;
mod solver;
mod variables;

pub use model::{Constraint, CpModel, Objective};
pub use search::BranchAndBoundSolver;
pub use solver::{CpSolution, CpSolver, EnumerationOutcome, SolverConfig, SolverStatus};
pub use variables::{BoolVar, LinearExpr};
