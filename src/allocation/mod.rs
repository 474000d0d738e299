//! Tutor-to-session allocation.
//!
//! Turns tutors, sessions and an availability matrix into a 0/1 model
//! (see [`crate::cp`]), solves it and decodes the assignment.
//!
//! # Key Components
//!
//! - **Entities**: [`Tutor`], [`Session`], [`AvailabilityMatrix`],
//!   [`SlotAvailability`], [`Allocation`]
//! - **Diagnostics**: [`validate_availability`]: advisory coverage checks
//! - **Model**: [`AllocationModelBuilder`]: variables and hard constraints
//! - **Objective**: [`ObjectiveComposer`]: soft preferences, maximized
//! - **Engine**: [`AllocationEngine`]: runs the backend, reports progress,
//!   returns an [`AllocationReport`]
//!
//! # Hard constraints
//!
//! A tutor is only assigned to sessions they are available for; each
//! session gets a tutor count within its bounds; each tutor's hours stay
//! within their limits and their sessions per day under the daily
//! maximum; sessions with more than one tutor include a non-junior; no
//! tutor holds two clashing sessions.
//!
//! # Preferences
//!
//! Every assignment scores 1, plus 1 when the session id matches the
//! tutor's preferred pattern, plus 1 for preferred tutors, plus 1 per
//! back-to-back pair for tutors who like contiguous sessions.

mod builder;
mod config;
mod engine;
mod error;
mod extract;
mod objective;
mod progress;
mod types;
mod validation;

pub use builder::{
    clashing_pairs, contiguous_pairs, AllocationModel, AllocationModelBuilder, AssignmentVars,
};
pub use config::EngineConfig;
pub use engine::{
    infeasible_message, AllocationEngine, AllocationReport, AllocationStatus, EnumerationReport,
};
pub use error::AllocationError;
pub use extract::extract_allocation;
pub use objective::{ComposedObjective, ObjectiveBreakdown, ObjectiveComposer};
pub use progress::ProgressReporter;
pub use types::{
    Allocation, AvailabilityMatrix, Day, Session, SlotAvailability, TimeSlot, Timetable, Tutor,
    MATCH_ALL, UNBOUNDED,
};
pub use validation::validate_availability;
