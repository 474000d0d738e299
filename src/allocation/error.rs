//! Allocation errors.
//!
//! Only malformed input is an error. An infeasible problem or a timeout
//! is a normal outcome reported through
//! [`AllocationStatus`](super::AllocationStatus).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("duplicate tutor: {0}")]
    DuplicateTutor(String),

    #[error("duplicate session: {0}")]
    DuplicateSession(String),

    #[error("availability references unknown tutor: {0}")]
    UnknownTutor(String),

    #[error("availability references unknown session: {0}")]
    UnknownSession(String),

    #[error("{entity} has negative {field}: {value}")]
    NegativeBound {
        entity: String,
        field: &'static str,
        value: i64,
    },

    #[error("invalid session pattern for tutor {tutor}")]
    InvalidPattern {
        tutor: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid engine config: {0}")]
    InvalidConfig(String),

    #[error("invalid model: {0}")]
    InvalidModel(String),
}
