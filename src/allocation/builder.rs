//! Hard-constraint model construction.
//!
//! Translates tutors, sessions and availability into a [`CpModel`] with
//! one boolean variable per (tutor, session) pair:
//!
//! - unavailable pairs are fixed to 0
//! - each session gets between `lower_tutor_count` and
//!   `upper_tutor_count` tutors
//! - each tutor works between `lower_hour_limit` and `upper_hour_limit`
//!   hours (session durations summed)
//! - each tutor has at most `daily_hour_max` sessions on any one day
//! - sessions needing more than one tutor get at least one non-junior
//! - no tutor is on two clashing sessions

use super::error::AllocationError;
use super::types::{AvailabilityMatrix, Day, Session, Tutor};
use crate::cp::{BoolVar, CpModel, LinearExpr};
use log::{info, trace};
use std::collections::{BTreeSet, HashSet};

/// Assignment variables laid out tutor-major: `var(t, s)` is the
/// variable of tutor `t` on session `s` (indices into the input slices).
#[derive(Debug, Clone)]
pub struct AssignmentVars {
    session_count: usize,
    vars: Vec<BoolVar>,
}

impl AssignmentVars {
    pub fn var(&self, tutor: usize, session: usize) -> BoolVar {
        self.vars[tutor * self.session_count + session]
    }

    /// Variables of one tutor, in session order.
    pub fn tutor_row(&self, tutor: usize) -> &[BoolVar] {
        let start = tutor * self.session_count;
        &self.vars[start..start + self.session_count]
    }

    /// Variables of one session, in tutor order.
    pub fn session_column(&self, session: usize) -> impl Iterator<Item = BoolVar> + '_ {
        self.vars
            .iter()
            .skip(session)
            .step_by(self.session_count.max(1))
            .copied()
    }

    /// `(tutor index, session index, variable)` in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, BoolVar)> + '_ {
        let n = self.session_count.max(1);
        self.vars
            .iter()
            .enumerate()
            .map(move |(i, &var)| (i / n, i % n, var))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// A built allocation model: the CP model plus the assignment grid.
#[derive(Debug, Clone)]
pub struct AllocationModel {
    pub model: CpModel,
    pub vars: AssignmentVars,
}

/// Builds the hard-constraint model for one solve.
pub struct AllocationModelBuilder<'a> {
    tutors: &'a [Tutor],
    sessions: &'a [Session],
    availability: &'a AvailabilityMatrix,
}

impl<'a> AllocationModelBuilder<'a> {
    pub fn new(
        tutors: &'a [Tutor],
        sessions: &'a [Session],
        availability: &'a AvailabilityMatrix,
    ) -> Self {
        Self {
            tutors,
            sessions,
            availability,
        }
    }

    /// Checks the input, then declares the variables and asserts every
    /// hard constraint.
    pub fn build(&self) -> Result<AllocationModel, AllocationError> {
        self.check_input()?;

        let mut model = CpModel::new("allocation");
        let vars = self.declare_vars(&mut model);

        self.assert_availability(&mut model, &vars);
        self.assert_tutor_counts(&mut model, &vars);
        self.assert_hour_limits(&mut model, &vars);
        self.assert_daily_max(&mut model, &vars);
        self.assert_juniors(&mut model, &vars);
        self.assert_clashes(&mut model, &vars);

        info!(
            "built allocation model: {} tutors, {} sessions, {} variables, {} constraints",
            self.tutors.len(),
            self.sessions.len(),
            model.var_count(),
            model.constraint_count()
        );
        Ok(AllocationModel { model, vars })
    }

    fn check_input(&self) -> Result<(), AllocationError> {
        let mut names = HashSet::new();
        for tutor in self.tutors {
            if !names.insert(tutor.name.as_str()) {
                return Err(AllocationError::DuplicateTutor(tutor.name.clone()));
            }
            for (field, value) in [
                ("lower_hour_limit", tutor.lower_hour_limit),
                ("upper_hour_limit", tutor.upper_hour_limit),
                ("daily_hour_max", tutor.daily_hour_max),
            ] {
                check_non_negative(&tutor.name, field, value)?;
            }
        }

        let mut ids = HashSet::new();
        for session in self.sessions {
            if !ids.insert(session.id.as_str()) {
                return Err(AllocationError::DuplicateSession(session.id.clone()));
            }
            for (field, value) in [
                ("duration_hours", session.duration_hours),
                ("lower_tutor_count", session.lower_tutor_count),
                ("upper_tutor_count", session.upper_tutor_count),
            ] {
                check_non_negative(&session.id, field, value)?;
            }
        }

        // Report the smallest offending key so errors are reproducible.
        let mut unknown_tutors = BTreeSet::new();
        let mut unknown_sessions = BTreeSet::new();
        for (tutor, session, _) in self.availability.iter() {
            if !names.contains(tutor) {
                unknown_tutors.insert(tutor);
            }
            if !ids.contains(session) {
                unknown_sessions.insert(session);
            }
        }
        if let Some(tutor) = unknown_tutors.first() {
            return Err(AllocationError::UnknownTutor(tutor.to_string()));
        }
        if let Some(session) = unknown_sessions.first() {
            return Err(AllocationError::UnknownSession(session.to_string()));
        }
        Ok(())
    }

    fn declare_vars(&self, model: &mut CpModel) -> AssignmentVars {
        let mut vars = Vec::with_capacity(self.tutors.len() * self.sessions.len());
        for tutor in self.tutors {
            for session in self.sessions {
                vars.push(model.new_bool_var(format!("{}-{}", tutor.name, session.id)));
            }
        }
        AssignmentVars {
            session_count: self.sessions.len(),
            vars,
        }
    }

    fn assert_availability(&self, model: &mut CpModel, vars: &AssignmentVars) {
        for (t, tutor) in self.tutors.iter().enumerate() {
            for (s, session) in self.sessions.iter().enumerate() {
                if !self.availability.is_available(&tutor.name, &session.id) {
                    model.fix(vars.var(t, s), false);
                }
            }
        }
    }

    fn assert_tutor_counts(&self, model: &mut CpModel, vars: &AssignmentVars) {
        for (s, session) in self.sessions.iter().enumerate() {
            model.add_range(
                format!("count[{}]", session.id),
                LinearExpr::sum(vars.session_column(s)),
                session.lower_tutor_count,
                session.upper_tutor_count,
            );
        }
    }

    fn assert_hour_limits(&self, model: &mut CpModel, vars: &AssignmentVars) {
        for (t, tutor) in self.tutors.iter().enumerate() {
            let hours: LinearExpr = self
                .sessions
                .iter()
                .enumerate()
                .map(|(s, session)| (vars.var(t, s), session.duration_hours))
                .collect();
            model.add_range(
                format!("hours[{}]", tutor.name),
                hours,
                tutor.lower_hour_limit,
                tutor.upper_hour_limit,
            );
        }
    }

    fn assert_daily_max(&self, model: &mut CpModel, vars: &AssignmentVars) {
        let days: BTreeSet<Day> = self.sessions.iter().map(|s| s.day).collect();
        for (t, tutor) in self.tutors.iter().enumerate() {
            for &day in &days {
                let on_day = LinearExpr::sum(
                    self.sessions
                        .iter()
                        .enumerate()
                        .filter(|(_, s)| s.day == day)
                        .map(|(s, _)| vars.var(t, s)),
                );
                model.add_le(
                    format!("daily[{},{day}]", tutor.name),
                    on_day,
                    tutor.daily_hour_max,
                );
            }
        }
    }

    fn assert_juniors(&self, model: &mut CpModel, vars: &AssignmentVars) {
        let seniors: Vec<usize> = self
            .tutors
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_junior)
            .map(|(t, _)| t)
            .collect();

        for (s, session) in self.sessions.iter().enumerate() {
            if session.lower_tutor_count > 1 {
                let supervised = LinearExpr::sum(seniors.iter().map(|&t| vars.var(t, s)));
                model.add_ge(format!("junior[{}]", session.id), supervised, 1);
            }
        }
    }

    fn assert_clashes(&self, model: &mut CpModel, vars: &AssignmentVars) {
        let clashes = clashing_pairs(self.sessions);
        trace!("{} clashing session pairs", clashes.len());

        for &(a, b) in &clashes {
            for (t, tutor) in self.tutors.iter().enumerate() {
                model.add_le(
                    format!(
                        "clash[{},{},{}]",
                        tutor.name, self.sessions[a].id, self.sessions[b].id
                    ),
                    LinearExpr::sum([vars.var(t, a), vars.var(t, b)]),
                    1,
                );
            }
        }
    }
}

fn check_non_negative(entity: &str, field: &'static str, value: i64) -> Result<(), AllocationError> {
    if value < 0 {
        return Err(AllocationError::NegativeBound {
            entity: entity.to_string(),
            field,
            value,
        });
    }
    Ok(())
}

/// Unordered pairs of same-day sessions where one session starts during
/// the other. Each pair appears once, as `(lower index, higher index)`.
pub fn clashing_pairs(sessions: &[Session]) -> BTreeSet<(usize, usize)> {
    let mut pairs = BTreeSet::new();
    for (i, session) in sessions.iter().enumerate() {
        for (j, other) in sessions.iter().enumerate() {
            if i == j || session.day != other.day {
                continue;
            }
            if session.start_hour <= other.start_hour && other.start_hour < session.end_hour() {
                pairs.insert((i.min(j), i.max(j)));
            }
        }
    }
    pairs
}

/// Unordered pairs of same-day sessions where one ends exactly when the
/// other begins. Each pair appears once, as `(lower index, higher index)`.
pub fn contiguous_pairs(sessions: &[Session]) -> BTreeSet<(usize, usize)> {
    let mut pairs = BTreeSet::new();
    for (i, session) in sessions.iter().enumerate() {
        for (j, other) in sessions.iter().enumerate() {
            if i != j && session.day == other.day && session.end_hour() == other.start_hour {
                pairs.insert((i.min(j), i.max(j)));
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cp::{BranchAndBoundSolver, CpSolver, SolverConfig, SolverStatus};

    fn all_available(tutors: &[Tutor], sessions: &[Session]) -> AvailabilityMatrix {
        AvailabilityMatrix::from_fn(tutors, sessions, |_, _| true)
    }

    fn enumerate(model: &AllocationModel) -> Vec<Vec<bool>> {
        let mut found = Vec::new();
        BranchAndBoundSolver::new().enumerate(&model.model, &SolverConfig::default(), &mut |v: &[bool]| {
            found.push(v.to_vec())
        });
        found
    }

    #[test]
    fn test_one_var_per_pair() {
        let tutors = [Tutor::new("A"), Tutor::new("B")];
        let sessions = [
            Session::new("S1", Day::Mon, 9),
            Session::new("S2", Day::Mon, 10),
            Session::new("S3", Day::Tue, 9),
        ];
        let matrix = all_available(&tutors, &sessions);
        let built = AllocationModelBuilder::new(&tutors, &sessions, &matrix)
            .build()
            .unwrap();

        assert_eq!(built.vars.len(), 6);
        assert_eq!(built.model.var_count(), 6);
        assert_eq!(built.model.var_name(built.vars.var(1, 2)), "B-S3");
        assert_eq!(built.vars.tutor_row(1).len(), 3);
        assert_eq!(
            built.vars.session_column(1).collect::<Vec<_>>(),
            vec![built.vars.var(0, 1), built.vars.var(1, 1)]
        );
        assert_eq!(built.vars.iter().nth(4).map(|(t, s, _)| (t, s)), Some((1, 1)));
    }

    #[test]
    fn test_clashing_pairs() {
        let sessions = [
            Session::new("A", Day::Mon, 9).with_duration(2),
            Session::new("B", Day::Mon, 10),
            Session::new("C", Day::Mon, 11),
            Session::new("D", Day::Tue, 9),
            Session::new("E", Day::Mon, 9),
        ];
        let pairs = clashing_pairs(&sessions);
        assert_eq!(pairs, BTreeSet::from([(0, 1), (0, 4)]));
    }

    #[test]
    fn test_clashing_pairs_with_long_and_empty_sessions() {
        let sessions = [
            Session::new("Long", Day::Mon, 0).with_duration(1_000_000_000),
            Session::new("Late", Day::Mon, 999_999_999),
            Session::new("After", Day::Mon, 1_000_000_000),
            Session::new("Empty", Day::Mon, 5).with_duration(0),
        ];
        let pairs = clashing_pairs(&sessions);
        // A zero-length session occupies no hour, but "Long" starts
        // before it and is still running.
        assert_eq!(pairs, BTreeSet::from([(0, 1), (0, 3)]));
    }

    #[test]
    fn test_contiguous_pairs() {
        let sessions = [
            Session::new("A", Day::Mon, 9).with_duration(2),
            Session::new("B", Day::Mon, 11),
            Session::new("C", Day::Mon, 12),
            Session::new("D", Day::Tue, 11),
        ];
        let pairs = contiguous_pairs(&sessions);
        assert_eq!(pairs, BTreeSet::from([(0, 1), (1, 2)]));
    }

    #[test]
    fn test_duplicate_tutor_rejected() {
        let tutors = [Tutor::new("A"), Tutor::new("A")];
        let sessions = [Session::new("S1", Day::Mon, 9)];
        let matrix = AvailabilityMatrix::new();
        let err = AllocationModelBuilder::new(&tutors, &sessions, &matrix)
            .build()
            .unwrap_err();
        assert!(matches!(err, AllocationError::DuplicateTutor(name) if name == "A"));
    }

    #[test]
    fn test_duplicate_session_rejected() {
        let tutors = [Tutor::new("A")];
        let sessions = [Session::new("S1", Day::Mon, 9), Session::new("S1", Day::Tue, 9)];
        let matrix = AvailabilityMatrix::new();
        let err = AllocationModelBuilder::new(&tutors, &sessions, &matrix)
            .build()
            .unwrap_err();
        assert!(matches!(err, AllocationError::DuplicateSession(id) if id == "S1"));
    }

    #[test]
    fn test_negative_bound_rejected() {
        let tutors = [Tutor::new("A").with_daily_max(-1)];
        let sessions = [Session::new("S1", Day::Mon, 9)];
        let matrix = AvailabilityMatrix::new();
        let err = AllocationModelBuilder::new(&tutors, &sessions, &matrix)
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "A has negative daily_hour_max: -1");

        let tutors = [Tutor::new("A")];
        let sessions = [Session::new("S1", Day::Mon, 9).with_tutor_count(-2, 1)];
        let err = AllocationModelBuilder::new(&tutors, &sessions, &matrix)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            AllocationError::NegativeBound { field: "lower_tutor_count", value: -2, .. }
        ));
    }

    #[test]
    fn test_unknown_references_rejected() {
        let tutors = [Tutor::new("A")];
        let sessions = [Session::new("S1", Day::Mon, 9)];

        let mut matrix = AvailabilityMatrix::new();
        matrix.set("Ghost", "S1", true);
        let err = AllocationModelBuilder::new(&tutors, &sessions, &matrix)
            .build()
            .unwrap_err();
        assert!(matches!(err, AllocationError::UnknownTutor(name) if name == "Ghost"));

        let mut matrix = AvailabilityMatrix::new();
        matrix.set("A", "S9", false);
        let err = AllocationModelBuilder::new(&tutors, &sessions, &matrix)
            .build()
            .unwrap_err();
        assert!(matches!(err, AllocationError::UnknownSession(id) if id == "S9"));
    }

    #[test]
    fn test_unavailable_pairs_never_assigned() {
        let tutors = [Tutor::new("A").with_hour_limits(0, 5), Tutor::new("B").with_hour_limits(0, 5)];
        let sessions = [Session::new("S1", Day::Mon, 9), Session::new("S2", Day::Tue, 9)];
        let matrix = AvailabilityMatrix::from_fn(&tutors, &sessions, |t, s| {
            !(t.name == "A" && s.id == "S2")
        });
        let built = AllocationModelBuilder::new(&tutors, &sessions, &matrix)
            .build()
            .unwrap();

        let solutions = enumerate(&built);
        assert!(!solutions.is_empty());
        let forbidden = built.vars.var(0, 1).index();
        assert!(solutions.iter().all(|v| !v[forbidden]));
    }

    #[test]
    fn test_junior_supervision_is_enforced() {
        let tutors = [
            Tutor::new("Senior").with_hour_limits(0, 5),
            Tutor::new("Junior1").with_junior(true).with_hour_limits(0, 5),
            Tutor::new("Junior2").with_junior(true).with_hour_limits(0, 5),
        ];
        let sessions = [Session::new("P01", Day::Mon, 9).with_tutor_count(2, 2)];
        let matrix = all_available(&tutors, &sessions);
        let built = AllocationModelBuilder::new(&tutors, &sessions, &matrix)
            .build()
            .unwrap();

        let solutions = enumerate(&built);
        // {Senior, Junior1} and {Senior, Junior2}; never the two juniors alone.
        assert_eq!(solutions.len(), 2);
        let senior = built.vars.var(0, 0).index();
        assert!(solutions.iter().all(|v| v[senior]));
    }

    #[test]
    fn test_juniors_alone_are_infeasible() {
        let tutors = [
            Tutor::new("J1").with_junior(true),
            Tutor::new("J2").with_junior(true),
        ];
        let sessions = [Session::new("P01", Day::Mon, 9).with_tutor_count(2, 2)];
        let matrix = all_available(&tutors, &sessions);
        let built = AllocationModelBuilder::new(&tutors, &sessions, &matrix)
            .build()
            .unwrap();

        let solution = BranchAndBoundSolver::new().solve(&built.model, &SolverConfig::default());
        assert_eq!(solution.status, SolverStatus::Infeasible);
    }

    #[test]
    fn test_clashes_and_daily_max() {
        let tutors = [Tutor::new("A").with_hour_limits(0, 10).with_daily_max(2)];
        let sessions = [
            Session::new("S1", Day::Mon, 9).with_duration(2).with_tutor_count(0, 1),
            Session::new("S2", Day::Mon, 10).with_tutor_count(0, 1),
            Session::new("S3", Day::Mon, 13).with_tutor_count(0, 1),
            Session::new("S4", Day::Mon, 15).with_tutor_count(0, 1),
        ];
        let matrix = all_available(&tutors, &sessions);
        let built = AllocationModelBuilder::new(&tutors, &sessions, &matrix)
            .build()
            .unwrap();

        for values in enumerate(&built) {
            let assigned: Vec<usize> = (0..4).filter(|&s| values[built.vars.var(0, s).index()]).collect();
            assert!(assigned.len() <= 2, "daily max violated: {assigned:?}");
            assert!(!(assigned.contains(&0) && assigned.contains(&1)), "clash violated");
        }
    }

    #[test]
    fn test_hour_limits_weighted_by_duration() {
        let tutors = [Tutor::new("A").with_hour_limits(3, 3)];
        let sessions = [
            Session::new("S1", Day::Mon, 9).with_duration(2).with_tutor_count(0, 1),
            Session::new("S2", Day::Tue, 9).with_tutor_count(0, 1),
            Session::new("S3", Day::Wed, 9).with_duration(2).with_tutor_count(0, 1),
        ];
        let matrix = all_available(&tutors, &sessions);
        let built = AllocationModelBuilder::new(&tutors, &sessions, &matrix)
            .build()
            .unwrap();

        // 2 + 1 hours: {S1, S2} or {S2, S3}.
        assert_eq!(enumerate(&built).len(), 2);
    }
}
