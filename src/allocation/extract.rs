//! Assignment decoding.

use super::builder::AssignmentVars;
use super::types::{Allocation, Session, Tutor};

/// Reads the assignment grid out of a solver value vector.
///
/// Tutors appear in input order with their sessions in input order;
/// tutors with no assigned session are left out.
pub fn extract_allocation(
    tutors: &[Tutor],
    sessions: &[Session],
    vars: &AssignmentVars,
    values: &[bool],
) -> Allocation {
    let mut allocation = Allocation::new();
    for (t, s, var) in vars.iter() {
        if values.get(var.index()).copied().unwrap_or(false) {
            allocation.push(&tutors[t].name, &sessions[s].id);
        }
    }
    allocation
}
