//! Soft-preference objective.

use super::builder::{contiguous_pairs, AllocationModel};
use super::error::AllocationError;
use super::types::{Session, Tutor};
use crate::cp::{LinearExpr, Objective};
use log::{debug, trace};
use regex::Regex;
use std::fmt;

/// Value of each objective term for one assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectiveBreakdown {
    pub total_assigned: i64,
    pub preferred_sessions: i64,
    pub preferred_tutors: i64,
    pub contiguity: i64,
}

impl ObjectiveBreakdown {
    /// Sum of all terms, i.e. the maximized objective.
    pub fn total(&self) -> i64 {
        self.total_assigned + self.preferred_sessions + self.preferred_tutors + self.contiguity
    }
}

impl fmt::Display for ObjectiveBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (assigned {}, preferred sessions {}, preferred tutors {}, contiguity {})",
            self.total(),
            self.total_assigned,
            self.preferred_sessions,
            self.preferred_tutors,
            self.contiguity
        )
    }
}

/// The objective terms added to a model.
#[derive(Debug, Clone)]
pub struct ComposedObjective {
    total_assigned: LinearExpr,
    preferred_sessions: LinearExpr,
    preferred_tutors: LinearExpr,
    contiguity: LinearExpr,
}

impl ComposedObjective {
    /// Evaluates every term against a full assignment.
    pub fn breakdown(&self, values: &[bool]) -> ObjectiveBreakdown {
        ObjectiveBreakdown {
            total_assigned: self.total_assigned.evaluate(values),
            preferred_sessions: self.preferred_sessions.evaluate(values),
            preferred_tutors: self.preferred_tutors.evaluate(values),
            contiguity: self.contiguity.evaluate(values),
        }
    }

    fn combined(&self) -> LinearExpr {
        let mut terms = LinearExpr::new();
        for part in [
            &self.total_assigned,
            &self.preferred_sessions,
            &self.preferred_tutors,
            &self.contiguity,
        ] {
            terms.extend(part);
        }
        terms.normalized()
    }
}

/// Adds the preference objective to a built model.
///
/// Four terms, all weighted 1:
/// - every assignment
/// - assignments whose session id matches the tutor's preferred pattern
///   (anchored at the start of the id)
/// - assignments of preferred tutors
/// - for tutors who prefer contiguous sessions, each pair of back-to-back
///   sessions they take on the same day
pub struct ObjectiveComposer<'a> {
    tutors: &'a [Tutor],
    sessions: &'a [Session],
}

impl<'a> ObjectiveComposer<'a> {
    pub fn new(tutors: &'a [Tutor], sessions: &'a [Session]) -> Self {
        Self { tutors, sessions }
    }

    /// Sets a maximization objective on `built` and returns its terms.
    ///
    /// Fails if a tutor's session pattern is not a valid regex.
    pub fn compose(&self, built: &mut AllocationModel) -> Result<ComposedObjective, AllocationError> {
        let patterns = self.compile_patterns()?;
        let vars = &built.vars;

        let total_assigned = LinearExpr::sum(vars.iter().map(|(_, _, var)| var));

        let preferred_sessions = LinearExpr::sum(
            vars.iter()
                .filter(|&(t, s, _)| patterns[t].is_match(&self.sessions[s].id))
                .map(|(_, _, var)| var),
        );

        let preferred_tutors = LinearExpr::sum(
            vars.iter()
                .filter(|&(t, _, _)| self.tutors[t].is_preferred)
                .map(|(_, _, var)| var),
        );

        let pairs = contiguous_pairs(self.sessions);
        let mut contiguity = LinearExpr::new();
        for (t, tutor) in self.tutors.iter().enumerate() {
            if !tutor.prefers_contiguous {
                continue;
            }
            for &(a, b) in &pairs {
                let first = built.vars.var(t, a);
                let second = built.vars.var(t, b);
                let both = built.model.new_bool_var(format!(
                    "{}-{}+{}",
                    tutor.name, self.sessions[a].id, self.sessions[b].id
                ));
                built.model.add_and(both, first, second);
                contiguity.add_term(both, 1);
            }
        }
        trace!(
            "{} contiguous pairs, {} contiguity terms",
            pairs.len(),
            contiguity.terms.len()
        );

        let composed = ComposedObjective {
            total_assigned,
            preferred_sessions,
            preferred_tutors,
            contiguity,
        };
        let terms = composed.combined();
        debug!(
            "objective composed: {} terms over {} variables",
            terms.terms.len(),
            built.model.var_count()
        );
        built.model.set_objective(Objective::Maximize { terms });
        Ok(composed)
    }

    fn compile_patterns(&self) -> Result<Vec<Regex>, AllocationError> {
        self.tutors
            .iter()
            .map(|tutor| {
                Regex::new(&format!("^(?:{})", tutor.preferred_session_pattern)).map_err(|source| {
                    AllocationError::InvalidPattern {
                        tutor: tutor.name.clone(),
                        source,
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::builder::AllocationModelBuilder;
    use crate::allocation::types::{AvailabilityMatrix, Day};

    fn build(tutors: &[Tutor], sessions: &[Session]) -> AllocationModel {
        let matrix = AvailabilityMatrix::from_fn(tutors, sessions, |_, _| true);
        AllocationModelBuilder::new(tutors, sessions, &matrix)
            .build()
            .unwrap()
    }

    #[test]
    fn test_breakdown_counts_each_term() {
        let tutors = [
            Tutor::new("A").with_session_pattern("P").with_preferred(true),
            Tutor::new("B").with_contiguous(true),
        ];
        let sessions = [
            Session::new("P01", Day::Mon, 9),
            Session::new("T01", Day::Mon, 10),
        ];
        let mut built = build(&tutors, &sessions);
        let composed = ObjectiveComposer::new(&tutors, &sessions)
            .compose(&mut built)
            .unwrap();

        // One aux variable for B's contiguous pair.
        assert_eq!(built.model.var_count(), 5);

        let mut values = vec![false; built.model.var_count()];
        values[built.vars.var(0, 0).index()] = true;
        values[built.vars.var(1, 0).index()] = true;
        values[built.vars.var(1, 1).index()] = true;
        values[4] = true;

        let breakdown = composed.breakdown(&values);
        assert_eq!(
            breakdown,
            ObjectiveBreakdown {
                total_assigned: 3,
                preferred_sessions: 3,
                preferred_tutors: 1,
                contiguity: 1,
            }
        );
        assert_eq!(breakdown.total(), 8);
    }

    #[test]
    fn test_pattern_is_anchored_at_start() {
        let tutors = [Tutor::new("A").with_session_pattern("T")];
        let sessions = [
            Session::new("T01", Day::Mon, 9),
            Session::new("PT01", Day::Tue, 9),
        ];
        let mut built = build(&tutors, &sessions);
        let composed = ObjectiveComposer::new(&tutors, &sessions)
            .compose(&mut built)
            .unwrap();

        let all = vec![true; built.model.var_count()];
        assert_eq!(composed.breakdown(&all).preferred_sessions, 1);
    }

    #[test]
    fn test_default_pattern_matches_everything() {
        let tutors = [Tutor::new("A")];
        let sessions = [Session::new("X1", Day::Mon, 9), Session::new("Y1", Day::Tue, 9)];
        let mut built = build(&tutors, &sessions);
        let composed = ObjectiveComposer::new(&tutors, &sessions)
            .compose(&mut built)
            .unwrap();

        let all = vec![true; built.model.var_count()];
        assert_eq!(composed.breakdown(&all).preferred_sessions, 2);
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        let tutors = [Tutor::new("A").with_session_pattern("(")];
        let sessions = [Session::new("T01", Day::Mon, 9)];
        let mut built = build(&tutors, &sessions);
        let err = ObjectiveComposer::new(&tutors, &sessions)
            .compose(&mut built)
            .unwrap_err();
        assert!(matches!(err, AllocationError::InvalidPattern { ref tutor, .. } if tutor == "A"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_sets_maximize_objective() {
        let tutors = [Tutor::new("A")];
        let sessions = [Session::new("T01", Day::Mon, 9)];
        let mut built = build(&tutors, &sessions);
        ObjectiveComposer::new(&tutors, &sessions)
            .compose(&mut built)
            .unwrap();
        assert!(matches!(built.model.objective, Some(Objective::Maximize { .. })));
    }
}
