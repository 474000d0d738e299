//! Allocation domain types.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Effectively unbounded hour limit.
pub const UNBOUNDED: i64 = 1_000_000_000;

/// Pattern that matches every session id.
pub const MATCH_ALL: &str = "(.*)";

/// Day of the week, Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Day {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Day {
    /// All days in week order.
    pub const ALL: [Day; 7] = [
        Day::Mon,
        Day::Tue,
        Day::Wed,
        Day::Thu,
        Day::Fri,
        Day::Sat,
        Day::Sun,
    ];

    /// Short name, e.g. `"Mon"`.
    pub fn short_name(self) -> &'static str {
        match self {
            Day::Mon => "Mon",
            Day::Tue => "Tue",
            Day::Wed => "Wed",
            Day::Thu => "Thu",
            Day::Fri => "Fri",
            Day::Sat => "Sat",
            Day::Sun => "Sun",
        }
    }

    /// Full name, e.g. `"Monday"`.
    pub fn long_name(self) -> &'static str {
        match self {
            Day::Mon => "Monday",
            Day::Tue => "Tuesday",
            Day::Wed => "Wednesday",
            Day::Thu => "Thursday",
            Day::Fri => "Friday",
            Day::Sat => "Saturday",
            Day::Sun => "Sunday",
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for Day {
    type Err = String;

    /// Accepts short (`"Tue"`) and long (`"Tuesday"`) names in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Day::ALL
            .into_iter()
            .find(|d| d.short_name().eq_ignore_ascii_case(s) || d.long_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown day: {s:?}"))
    }
}

/// A recurring weekly period. Equality is structural.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimeSlot {
    pub day: Day,
    pub start_hour: i64,
    pub duration_hours: i64,
}

impl TimeSlot {
    pub fn new(day: Day, start_hour: i64, duration_hours: i64) -> Self {
        Self {
            day,
            start_hour,
            duration_hours,
        }
    }

    /// Hour at which the slot ends (exclusive).
    pub fn end_hour(&self) -> i64 {
        self.start_hour + self.duration_hours
    }
}

/// A tutor and their allocation preferences.
///
/// # Examples
///
/// ```
/// use u_allocate::allocation::Tutor;
///
/// let tutor = Tutor::new("Emily")
///     .with_junior(true)
///     .with_hour_limits(2, 4)
///     .with_session_pattern("T");
/// assert_eq!(tutor.upper_hour_limit, 4);
/// assert!(!tutor.is_preferred);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Tutor {
    /// Unique key.
    pub name: String,
    /// Juniors may not be the only tutor on a multi-tutor session.
    pub is_junior: bool,
    pub prefers_contiguous: bool,
    pub is_preferred: bool,
    /// Minimum total hours.
    pub lower_hour_limit: i64,
    /// Maximum total hours.
    pub upper_hour_limit: i64,
    /// Maximum number of sessions on any one day.
    pub daily_hour_max: i64,
    /// Regex matched against the start of session ids.
    pub preferred_session_pattern: String,
}

impl Tutor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_junior: false,
            prefers_contiguous: false,
            is_preferred: false,
            lower_hour_limit: 1,
            upper_hour_limit: UNBOUNDED,
            daily_hour_max: UNBOUNDED,
            preferred_session_pattern: MATCH_ALL.to_string(),
        }
    }

    pub fn with_junior(mut self, is_junior: bool) -> Self {
        self.is_junior = is_junior;
        self
    }

    pub fn with_contiguous(mut self, prefers_contiguous: bool) -> Self {
        self.prefers_contiguous = prefers_contiguous;
        self
    }

    pub fn with_preferred(mut self, is_preferred: bool) -> Self {
        self.is_preferred = is_preferred;
        self
    }

    pub fn with_hour_limits(mut self, lower: i64, upper: i64) -> Self {
        self.lower_hour_limit = lower;
        self.upper_hour_limit = upper;
        self
    }

    pub fn with_daily_max(mut self, daily_hour_max: i64) -> Self {
        self.daily_hour_max = daily_hour_max;
        self
    }

    pub fn with_session_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.preferred_session_pattern = pattern.into();
        self
    }
}

/// A teaching session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Session {
    /// Unique key.
    pub id: String,
    pub day: Day,
    pub start_hour: i64,
    pub duration_hours: i64,
    pub lower_tutor_count: i64,
    pub upper_tutor_count: i64,
}

impl Session {
    /// One-hour session needing exactly one tutor.
    pub fn new(id: impl Into<String>, day: Day, start_hour: i64) -> Self {
        Self {
            id: id.into(),
            day,
            start_hour,
            duration_hours: 1,
            lower_tutor_count: 1,
            upper_tutor_count: 1,
        }
    }

    pub fn with_duration(mut self, hours: i64) -> Self {
        self.duration_hours = hours;
        self
    }

    pub fn with_tutor_count(mut self, lower: i64, upper: i64) -> Self {
        self.lower_tutor_count = lower;
        self.upper_tutor_count = upper;
        self
    }

    pub fn time_slot(&self) -> TimeSlot {
        TimeSlot::new(self.day, self.start_hour, self.duration_hours)
    }

    pub fn end_hour(&self) -> i64 {
        self.start_hour + self.duration_hours
    }
}

/// Availability of each tutor for each session, keyed by tutor name
/// and session id.
///
/// Pairs that were never set read as unavailable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AvailabilityMatrix {
    entries: HashMap<String, HashMap<String, bool>>,
}

impl AvailabilityMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a total matrix by evaluating `f` for every pair.
    pub fn from_fn(
        tutors: &[Tutor],
        sessions: &[Session],
        mut f: impl FnMut(&Tutor, &Session) -> bool,
    ) -> Self {
        let mut matrix = Self::new();
        for tutor in tutors {
            for session in sessions {
                matrix.set(&tutor.name, &session.id, f(tutor, session));
            }
        }
        matrix
    }

    pub fn set(&mut self, tutor: &str, session: &str, available: bool) {
        self.entries
            .entry(tutor.to_string())
            .or_default()
            .insert(session.to_string(), available);
    }

    /// Raw entry, `None` when the pair was never set.
    pub fn get(&self, tutor: &str, session: &str) -> Option<bool> {
        self.entries.get(tutor)?.get(session).copied()
    }

    pub fn is_available(&self, tutor: &str, session: &str) -> bool {
        self.get(tutor, session).unwrap_or(false)
    }

    /// Iterates `(tutor, session, available)` over every stored entry.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, bool)> + '_ {
        self.entries.iter().flat_map(|(tutor, row)| {
            row.iter()
                .map(move |(session, &available)| (tutor.as_str(), session.as_str(), available))
        })
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Availability expressed as time slots per tutor, the shape in which
/// poll exports and availability spreadsheets record it.
///
/// Converted into an [`AvailabilityMatrix`] once sessions are known.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SlotAvailability {
    slots: Vec<TimeSlot>,
    tutors: Vec<String>,
    available: HashMap<String, HashSet<TimeSlot>>,
}

impl SlotAvailability {
    /// Creates an availability table over the given slots (column order).
    pub fn new(slots: Vec<TimeSlot>) -> Self {
        Self {
            slots,
            tutors: Vec::new(),
            available: HashMap::new(),
        }
    }

    /// Marks a slot as available or unavailable for a tutor. Unknown
    /// tutors are added; unknown slots are appended to the slot list.
    pub fn set_available(&mut self, tutor: &str, slot: TimeSlot, available: bool) {
        if !self.available.contains_key(tutor) {
            self.tutors.push(tutor.to_string());
        }
        if !self.slots.contains(&slot) {
            self.slots.push(slot);
        }
        let set = self.available.entry(tutor.to_string()).or_default();
        if available {
            set.insert(slot);
        } else {
            set.remove(&slot);
        }
    }

    pub fn is_available(&self, tutor: &str, slot: &TimeSlot) -> bool {
        self.available
            .get(tutor)
            .is_some_and(|set| set.contains(slot))
    }

    /// Tutors in insertion order.
    pub fn tutors(&self) -> &[String] {
        &self.tutors
    }

    /// All slots in column order.
    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    /// Slots a tutor is available for, in column order.
    pub fn available_slots<'a>(&'a self, tutor: &'a str) -> impl Iterator<Item = TimeSlot> + 'a {
        self.slots
            .iter()
            .copied()
            .filter(move |slot| self.is_available(tutor, slot))
    }

    /// A session is available for a tutor iff its time slot is.
    pub fn to_matrix(&self, tutors: &[Tutor], sessions: &[Session]) -> AvailabilityMatrix {
        AvailabilityMatrix::from_fn(tutors, sessions, |tutor, session| {
            self.is_available(&tutor.name, &session.time_slot())
        })
    }

    /// Copy with every allocated session's slot marked unavailable for
    /// the tutor it was allocated to. Session ids not in `sessions` are
    /// skipped.
    pub fn without_allocation(&self, sessions: &[Session], allocation: &Allocation) -> Self {
        let slots: HashMap<&str, TimeSlot> = sessions
            .iter()
            .map(|s| (s.id.as_str(), s.time_slot()))
            .collect();

        let mut updated = self.clone();
        for (tutor, allocated) in allocation.iter() {
            for id in allocated {
                if let Some(&slot) = slots.get(id.as_str()) {
                    updated.set_available(tutor, slot, false);
                }
            }
        }
        updated
    }
}

/// Timetable view of an allocation: day → start hour → session id → tutors.
pub type Timetable = BTreeMap<Day, BTreeMap<i64, BTreeMap<String, Vec<String>>>>;

/// Tutor → allocated session ids.
///
/// Tutors appear in the order they were given to the engine; tutors
/// with no sessions are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Allocation {
    entries: Vec<(String, Vec<String>)>,
}

impl Allocation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a session to a tutor's list, adding the tutor if needed.
    pub fn push(&mut self, tutor: &str, session: &str) {
        match self.entries.iter_mut().find(|(name, _)| name == tutor) {
            Some((_, sessions)) => sessions.push(session.to_string()),
            None => self
                .entries
                .push((tutor.to_string(), vec![session.to_string()])),
        }
    }

    /// Sessions allocated to a tutor.
    pub fn get(&self, tutor: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(name, _)| name == tutor)
            .map(|(_, sessions)| sessions.as_slice())
    }

    pub fn tutors(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> + '_ {
        self.entries
            .iter()
            .map(|(name, sessions)| (name.as_str(), sessions.as_slice()))
    }

    /// Number of tutors with at least one session.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of (tutor, session) assignments.
    pub fn session_count(&self) -> usize {
        self.entries.iter().map(|(_, s)| s.len()).sum()
    }

    /// Tutors allocated to a session, in tutor order.
    pub fn tutors_on<'a>(&'a self, session: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(_, sessions)| sessions.iter().any(|s| s == session))
            .map(|(name, _)| name.as_str())
    }

    /// Copy with each tutor's session list sorted.
    pub fn sorted(&self) -> Self {
        let mut entries = self.entries.clone();
        for (_, sessions) in &mut entries {
            sessions.sort();
        }
        Self { entries }
    }

    /// Groups allocated tutors by day, start hour and session.
    ///
    /// Session ids not in `sessions` are skipped.
    pub fn to_timetable(&self, sessions: &[Session]) -> Timetable {
        let by_id: HashMap<&str, &Session> = sessions.iter().map(|s| (s.id.as_str(), s)).collect();
        let mut table = Timetable::new();
        for (tutor, allocated) in self.iter() {
            for id in allocated {
                if let Some(session) = by_id.get(id.as_str()) {
                    table
                        .entry(session.day)
                        .or_default()
                        .entry(session.start_hour)
                        .or_default()
                        .entry(session.id.clone())
                        .or_default()
                        .push(tutor.to_string());
                }
            }
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_parse_and_display() {
        assert_eq!("Tue".parse::<Day>(), Ok(Day::Tue));
        assert_eq!("wednesday".parse::<Day>(), Ok(Day::Wed));
        assert_eq!(" FRI ".parse::<Day>(), Ok(Day::Fri));
        assert!("Funday".parse::<Day>().is_err());
        assert_eq!(Day::Thu.to_string(), "Thu");
        assert!(Day::Mon < Day::Sun);
    }

    #[test]
    fn test_time_slot_equality_is_structural() {
        let a = TimeSlot::new(Day::Mon, 9, 2);
        let b = TimeSlot::new(Day::Mon, 9, 2);
        assert_eq!(a, b);
        assert_eq!(a.end_hour(), 11);
        assert_ne!(a, TimeSlot::new(Day::Mon, 9, 1));
    }

    #[test]
    fn test_tutor_defaults() {
        let t = Tutor::new("Henry");
        assert_eq!(t.lower_hour_limit, 1);
        assert_eq!(t.upper_hour_limit, UNBOUNDED);
        assert_eq!(t.daily_hour_max, UNBOUNDED);
        assert_eq!(t.preferred_session_pattern, MATCH_ALL);
        assert!(!t.is_junior && !t.prefers_contiguous && !t.is_preferred);
    }

    #[test]
    fn test_session_defaults() {
        let s = Session::new("P01", Day::Tue, 10).with_duration(2);
        assert_eq!(s.lower_tutor_count, 1);
        assert_eq!(s.upper_tutor_count, 1);
        assert_eq!(s.end_hour(), 12);
        assert_eq!(s.time_slot(), TimeSlot::new(Day::Tue, 10, 2));
    }

    #[test]
    fn test_matrix_absent_reads_unavailable() {
        let mut m = AvailabilityMatrix::new();
        m.set("Henry", "T01", true);
        m.set("Henry", "T02", false);

        assert!(m.is_available("Henry", "T01"));
        assert!(!m.is_available("Henry", "T02"));
        assert!(!m.is_available("Brae", "T01"));
        assert_eq!(m.get("Brae", "T01"), None);
        assert_eq!(m.len(), 2);
        assert_eq!(m.iter().filter(|&(_, _, a)| a).count(), 1);
    }

    #[test]
    fn test_slot_availability_to_matrix() {
        let slot = TimeSlot::new(Day::Wed, 9, 1);
        let mut avail = SlotAvailability::new(vec![slot, TimeSlot::new(Day::Wed, 10, 1)]);
        avail.set_available("Emily", slot, true);

        let tutors = [Tutor::new("Emily")];
        let sessions = [
            Session::new("T02", Day::Wed, 9),
            Session::new("T03", Day::Wed, 10),
        ];
        let matrix = avail.to_matrix(&tutors, &sessions);
        assert!(matrix.is_available("Emily", "T02"));
        assert!(!matrix.is_available("Emily", "T03"));
        assert_eq!(matrix.len(), 2);
        assert_eq!(avail.available_slots("Emily").collect::<Vec<_>>(), vec![slot]);
    }

    #[test]
    fn test_without_allocation() {
        let slot = TimeSlot::new(Day::Wed, 9, 1);
        let mut avail = SlotAvailability::new(vec![slot]);
        avail.set_available("Emily", slot, true);
        avail.set_available("Brae", slot, true);

        let sessions = [Session::new("T02", Day::Wed, 9)];
        let mut allocation = Allocation::new();
        allocation.push("Emily", "T02");

        let updated = avail.without_allocation(&sessions, &allocation);
        assert!(!updated.is_available("Emily", &slot));
        assert!(updated.is_available("Brae", &slot));
        assert!(avail.is_available("Emily", &slot));
    }

    #[test]
    fn test_allocation_accessors() {
        let mut a = Allocation::new();
        a.push("Henry", "P02");
        a.push("Emily", "P02");
        a.push("Henry", "P01");

        assert_eq!(a.len(), 2);
        assert_eq!(a.session_count(), 3);
        assert_eq!(a.get("Henry"), Some(&["P02".to_string(), "P01".to_string()][..]));
        assert_eq!(a.get("Brae"), None);
        assert_eq!(a.tutors().collect::<Vec<_>>(), vec!["Henry", "Emily"]);
        assert_eq!(a.tutors_on("P02").collect::<Vec<_>>(), vec!["Henry", "Emily"]);
        assert_eq!(a.sorted().get("Henry"), Some(&["P01".to_string(), "P02".to_string()][..]));
    }

    #[test]
    fn test_timetable() {
        let sessions = [
            Session::new("P01", Day::Tue, 10).with_tutor_count(2, 2),
            Session::new("T01", Day::Tue, 9),
        ];
        let mut a = Allocation::new();
        a.push("Henry", "T01");
        a.push("Henry", "P01");
        a.push("Brae", "P01");
        a.push("Brae", "X99");

        let table = a.to_timetable(&sessions);
        assert_eq!(table[&Day::Tue][&9]["T01"], vec!["Henry"]);
        assert_eq!(table[&Day::Tue][&10]["P01"], vec!["Henry", "Brae"]);
        assert_eq!(table.len(), 1);
    }
}
