//! Availability sanity checks.

use super::types::{AvailabilityMatrix, Session, Tutor};

/// Checks that the availability can plausibly satisfy the tutor and
/// session lower bounds.
///
/// Yields one human-readable message per problem found. The messages
/// are advisory: they never stop the model from being built, they only
/// point at input data that is likely to make the problem infeasible.
///
/// # Examples
///
/// ```
/// use u_allocate::allocation::{validate_availability, AvailabilityMatrix, Day, Session, Tutor};
///
/// let tutors = [Tutor::new("Henry").with_hour_limits(2, 10)];
/// let sessions = [Session::new("T01", Day::Tue, 9)];
/// let mut matrix = AvailabilityMatrix::new();
/// matrix.set("Henry", "T01", true);
///
/// let messages: Vec<String> = validate_availability(&tutors, &sessions, &matrix).collect();
/// assert_eq!(messages, vec!["Henry has fewer available hours than their lower limit."]);
/// ```
pub fn validate_availability<'a>(
    tutors: &'a [Tutor],
    sessions: &'a [Session],
    availability: &'a AvailabilityMatrix,
) -> impl Iterator<Item = String> + 'a {
    let tutor_messages = tutors.iter().filter_map(move |tutor| {
        let available = sessions
            .iter()
            .filter(|s| availability.is_available(&tutor.name, &s.id))
            .count() as i64;
        (available < tutor.lower_hour_limit).then(|| {
            format!(
                "{} has fewer available hours than their lower limit.",
                tutor.name
            )
        })
    });

    let session_messages = sessions.iter().filter_map(move |session| {
        let available = tutors
            .iter()
            .filter(|t| availability.is_available(&t.name, &session.id))
            .count() as i64;
        (available < session.lower_tutor_count).then(|| {
            format!(
                "{} lacks enough available tutors to meet its lower bound.",
                session.id
            )
        })
    });

    tutor_messages.chain(session_messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::Day;

    fn sessions() -> Vec<Session> {
        vec![
            Session::new("T01", Day::Mon, 9),
            Session::new("P01", Day::Mon, 10).with_tutor_count(2, 2),
        ]
    }

    #[test]
    fn test_no_messages_when_coverage_is_enough() {
        let tutors = [Tutor::new("A"), Tutor::new("B")];
        let sessions = sessions();
        let matrix = AvailabilityMatrix::from_fn(&tutors, &sessions, |_, _| true);

        assert_eq!(validate_availability(&tutors, &sessions, &matrix).count(), 0);
    }

    #[test]
    fn test_tutor_without_any_availability_is_reported() {
        let tutors = [Tutor::new("A"), Tutor::new("B")];
        let sessions = sessions();
        let matrix = AvailabilityMatrix::from_fn(&tutors, &sessions, |t, _| t.name == "A");

        let messages: Vec<String> = validate_availability(&tutors, &sessions, &matrix).collect();
        assert_eq!(
            messages,
            vec![
                "B has fewer available hours than their lower limit.",
                "P01 lacks enough available tutors to meet its lower bound.",
            ]
        );
    }

    #[test]
    fn test_zero_lower_limit_is_never_reported() {
        let tutors = [Tutor::new("A").with_hour_limits(0, 5)];
        let sessions = [Session::new("T01", Day::Mon, 9).with_tutor_count(0, 1)];
        let matrix = AvailabilityMatrix::new();

        assert_eq!(validate_availability(&tutors, &sessions, &matrix).count(), 0);
    }

    #[test]
    fn test_is_lazy() {
        let tutors = [Tutor::new("A"), Tutor::new("B")];
        let sessions = sessions();
        let matrix = AvailabilityMatrix::new();

        let mut messages = validate_availability(&tutors, &sessions, &matrix);
        assert_eq!(
            messages.next().as_deref(),
            Some("A has fewer available hours than their lower limit.")
        );
    }
}
