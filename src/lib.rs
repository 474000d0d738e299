//! Tutor allocation engine.
//!
//! Assigns tutors to teaching sessions under hard eligibility rules and
//! soft preferences:
//!
//! - **Allocation**: domain types, model building, objective composition
//!   and the [`AllocationEngine`](allocation::AllocationEngine) that
//!   drives a solve from input data to an assignment.
//! - **CP (Constraint Programming)**: a domain-agnostic 0/1 modeling layer
//!   with a pluggable [`CpSolver`](cp::CpSolver) backend and a bundled
//!   exact branch-and-bound.
//!
//! # Architecture
//!
//! The engine only talks to the backend through [`cp::CpSolver`]. Loading
//! tutors and sessions from files and rendering the result are left to
//! callers; the engine takes and returns typed data.

pub mod allocation;
pub mod cp;
