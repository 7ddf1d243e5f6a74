use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MINIMUM_JOURNEY_STOPS: usize = 2;
pub const MAX_FLOOR: u8 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopType {
    Pickup,
    Stop,
    Dropoff,
}

impl StopType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pickup => "pickup",
            Self::Stop => "stop",
            Self::Dropoff => "dropoff",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JourneyStop {
    pub sequence: usize,
    pub stop_type: StopType,
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_elevator: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parking: Option<String>,
}

impl JourneyStop {
    pub fn new(stop_type: StopType, address: impl Into<String>) -> Self {
        Self {
            sequence: 0,
            stop_type,
            address: address.into(),
            floor: None,
            has_elevator: None,
            parking: None,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum JourneyError {
    #[error("a journey needs at least {minimum} stops; removal would leave {remaining}")]
    MinimumStops { minimum: usize, remaining: usize },
    #[error("stop index {index} is out of range for {len} stops")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("insert position {position} is past the end of {len} stops")]
    PositionOutOfRange { position: usize, len: usize },
}

/// Endpoint and metadata problems found by [`JourneyStopList::validate_endpoints`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopListIssue {
    TooFewStops { count: usize },
    FirstStopNotPickup { found: StopType },
    LastStopNotDropoff { found: StopType },
    InteriorEndpoint { sequence: usize, found: StopType },
    MissingAddress { sequence: usize },
    FloorOutOfRange { sequence: usize, floor: u8 },
    NonContiguousSequence { position: usize, sequence: usize },
}

impl std::fmt::Display for StopListIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewStops { count } => {
                write!(f, "journey has {count} stops, at least {MINIMUM_JOURNEY_STOPS} required")
            }
            Self::FirstStopNotPickup { found } => {
                write!(f, "first stop must be a pickup, found {}", found.as_str())
            }
            Self::LastStopNotDropoff { found } => {
                write!(f, "last stop must be a dropoff, found {}", found.as_str())
            }
            Self::InteriorEndpoint { sequence, found } => {
                write!(f, "interior stop {sequence} must be a plain stop, found {}", found.as_str())
            }
            Self::MissingAddress { sequence } => write!(f, "stop {sequence} has no address"),
            Self::FloorOutOfRange { sequence, floor } => {
                write!(f, "stop {sequence} floor {floor} is outside 0..={MAX_FLOOR}")
            }
            Self::NonContiguousSequence { position, sequence } => {
                write!(f, "stop at position {position} carries sequence {sequence}")
            }
        }
    }
}

/// Ordered waypoints of a request. Sequence numbers are reassigned after every
/// mutation so they always run 0..len without gaps.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JourneyStopList {
    stops: Vec<JourneyStop>,
    journey_mode: bool,
}

impl JourneyStopList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_journey() -> Self {
        let mut list = Self { stops: Vec::new(), journey_mode: true };
        list.seed_endpoints();
        list
    }

    pub fn from_stops(stops: Vec<JourneyStop>, journey_mode: bool) -> Self {
        let mut list = Self { stops, journey_mode };
        list.renumber();
        list
    }

    pub fn stops(&self) -> &[JourneyStop] {
        &self.stops
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    pub fn is_journey_mode(&self) -> bool {
        self.journey_mode
    }

    pub fn set_journey_mode(&mut self, journey_mode: bool) {
        self.journey_mode = journey_mode;
    }

    /// Fills in a pickup and a dropoff when fewer than two stops exist.
    pub fn seed_endpoints(&mut self) {
        if self.stops.is_empty() {
            self.stops.push(JourneyStop::new(StopType::Pickup, ""));
        }
        if self.stops.len() < MINIMUM_JOURNEY_STOPS {
            self.stops.push(JourneyStop::new(StopType::Dropoff, ""));
        }
        self.renumber();
    }

    pub fn add_stop(
        &mut self,
        stop_type: StopType,
        position: Option<usize>,
    ) -> Result<usize, JourneyError> {
        self.insert(JourneyStop::new(stop_type, ""), position)
    }

    pub fn insert(
        &mut self,
        stop: JourneyStop,
        position: Option<usize>,
    ) -> Result<usize, JourneyError> {
        let len = self.stops.len();
        let index = match position {
            Some(position) if position > len => {
                return Err(JourneyError::PositionOutOfRange { position, len });
            }
            Some(position) => position,
            None => len,
        };

        self.stops.insert(index, stop);
        self.renumber();
        Ok(index)
    }

    pub fn remove_stop(&mut self, index: usize) -> Result<JourneyStop, JourneyError> {
        let len = self.stops.len();
        if index >= len {
            return Err(JourneyError::IndexOutOfRange { index, len });
        }

        let remaining = len - 1;
        if self.journey_mode && remaining < MINIMUM_JOURNEY_STOPS {
            return Err(JourneyError::MinimumStops { minimum: MINIMUM_JOURNEY_STOPS, remaining });
        }

        let removed = self.stops.remove(index);
        self.renumber();
        Ok(removed)
    }

    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), JourneyError> {
        let len = self.stops.len();
        if from >= len {
            return Err(JourneyError::IndexOutOfRange { index: from, len });
        }
        if to >= len {
            return Err(JourneyError::IndexOutOfRange { index: to, len });
        }

        let stop = self.stops.remove(from);
        self.stops.insert(to, stop);
        self.renumber();
        Ok(())
    }

    pub fn update<F>(&mut self, index: usize, edit: F) -> Result<(), JourneyError>
    where
        F: FnOnce(&mut JourneyStop),
    {
        let len = self.stops.len();
        let stop = self.stops.get_mut(index).ok_or(JourneyError::IndexOutOfRange { index, len })?;
        edit(stop);
        self.renumber();
        Ok(())
    }

    pub fn validate_endpoints(&self) -> Vec<StopListIssue> {
        check_stops(&self.stops)
    }

    fn renumber(&mut self) {
        for (sequence, stop) in self.stops.iter_mut().enumerate() {
            stop.sequence = sequence;
        }
    }
}

/// Checks a journey's stops: at least two, pickup first, dropoff last, plain
/// stops in between, addresses present, floors in range, dense sequences.
pub fn check_stops(stops: &[JourneyStop]) -> Vec<StopListIssue> {
    let mut issues = Vec::new();

    if stops.len() < MINIMUM_JOURNEY_STOPS {
        issues.push(StopListIssue::TooFewStops { count: stops.len() });
    }

    let last_index = stops.len().saturating_sub(1);
    for (position, stop) in stops.iter().enumerate() {
        if stop.sequence != position {
            issues.push(StopListIssue::NonContiguousSequence { position, sequence: stop.sequence });
        }

        if position == 0 {
            if stop.stop_type != StopType::Pickup {
                issues.push(StopListIssue::FirstStopNotPickup { found: stop.stop_type });
            }
        } else if position == last_index {
            if stop.stop_type != StopType::Dropoff {
                issues.push(StopListIssue::LastStopNotDropoff { found: stop.stop_type });
            }
        } else if stop.stop_type != StopType::Stop {
            issues.push(StopListIssue::InteriorEndpoint { sequence: position, found: stop.stop_type });
        }

        if stop.address.trim().is_empty() {
            issues.push(StopListIssue::MissingAddress { sequence: position });
        }
        if let Some(floor) = stop.floor {
            if floor > MAX_FLOOR {
                issues.push(StopListIssue::FloorOutOfRange { sequence: position, floor });
            }
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::{JourneyError, JourneyStop, JourneyStopList, StopListIssue, StopType};

    fn sequences(list: &JourneyStopList) -> Vec<usize> {
        list.stops().iter().map(|stop| stop.sequence).collect()
    }

    fn types(list: &JourneyStopList) -> Vec<StopType> {
        list.stops().iter().map(|stop| stop.stop_type).collect()
    }

    fn three_stop_journey() -> JourneyStopList {
        JourneyStopList::from_stops(
            vec![
                JourneyStop::new(StopType::Pickup, "1 High Street"),
                JourneyStop::new(StopType::Stop, "2 Mill Lane"),
                JourneyStop::new(StopType::Dropoff, "3 Quay Road"),
            ],
            true,
        )
    }

    #[test]
    fn journey_list_is_seeded_with_both_endpoints() {
        let list = JourneyStopList::for_journey();
        assert_eq!(types(&list), vec![StopType::Pickup, StopType::Dropoff]);
        assert_eq!(sequences(&list), vec![0, 1]);
    }

    #[test]
    fn removing_interior_stop_then_endpoint_respects_minimum() {
        let mut list = three_stop_journey();

        let removed = list.remove_stop(1).expect("interior stop can be removed");
        assert_eq!(removed.address, "2 Mill Lane");
        assert_eq!(types(&list), vec![StopType::Pickup, StopType::Dropoff]);
        assert_eq!(sequences(&list), vec![0, 1]);

        let error = list.remove_stop(0).expect_err("would leave a single stop");
        assert_eq!(error, JourneyError::MinimumStops { minimum: 2, remaining: 1 });
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn non_journey_lists_may_be_emptied() {
        let mut list = JourneyStopList::from_stops(
            vec![JourneyStop::new(StopType::Pickup, "1 High Street")],
            false,
        );
        list.remove_stop(0).expect("no minimum outside journey mode");
        assert!(list.is_empty());
    }

    #[test]
    fn add_stop_inserts_at_position_and_renumbers() {
        let mut list = JourneyStopList::for_journey();
        let index = list.add_stop(StopType::Stop, Some(1)).expect("insert between endpoints");

        assert_eq!(index, 1);
        assert_eq!(types(&list), vec![StopType::Pickup, StopType::Stop, StopType::Dropoff]);
        assert_eq!(sequences(&list), vec![0, 1, 2]);

        let error = list.add_stop(StopType::Stop, Some(9)).expect_err("past the end");
        assert_eq!(error, JourneyError::PositionOutOfRange { position: 9, len: 3 });
    }

    #[test]
    fn reorder_moves_endpoints_like_any_other_stop() {
        let mut list = three_stop_journey();
        list.reorder(0, 2).expect("pickup can be moved");

        assert_eq!(types(&list), vec![StopType::Stop, StopType::Dropoff, StopType::Pickup]);
        assert_eq!(sequences(&list), vec![0, 1, 2]);

        let issues = list.validate_endpoints();
        assert!(issues.contains(&StopListIssue::FirstStopNotPickup { found: StopType::Stop }));
        assert!(issues.contains(&StopListIssue::LastStopNotDropoff { found: StopType::Pickup }));
    }

    #[test]
    fn reorder_rejects_out_of_range_indices() {
        let mut list = three_stop_journey();
        assert_eq!(
            list.reorder(3, 0).expect_err("source out of range"),
            JourneyError::IndexOutOfRange { index: 3, len: 3 }
        );
        assert_eq!(
            list.reorder(0, 5).expect_err("target out of range"),
            JourneyError::IndexOutOfRange { index: 5, len: 3 }
        );
    }

    #[test]
    fn sequences_stay_contiguous_over_mixed_operations() {
        let mut list = JourneyStopList::for_journey();
        // (op, a, b): 0 = add at a % (len + 1), 1 = remove a % len, 2 = reorder
        let script: [(u8, usize, usize); 14] = [
            (0, 1, 0),
            (0, 7, 0),
            (2, 0, 3),
            (1, 2, 0),
            (0, 0, 0),
            (2, 3, 1),
            (1, 0, 0),
            (1, 1, 0),
            (1, 0, 0),
            (0, 5, 0),
            (2, 1, 0),
            (1, 4, 0),
            (1, 2, 0),
            (1, 0, 0),
        ];

        for (op, a, b) in script {
            let len = list.len();
            let _ = match op {
                0 => list.add_stop(StopType::Stop, Some(a % (len + 1))).map(|_| ()),
                1 => list.remove_stop(a % len).map(|_| ()),
                _ => list.reorder(a % len, b % len),
            };

            assert!(list.len() >= 2, "journey mode never drops below two stops");
            let expected: Vec<usize> = (0..list.len()).collect();
            assert_eq!(sequences(&list), expected);
        }
    }

    #[test]
    fn endpoint_check_reports_missing_addresses_and_floors() {
        let mut list = JourneyStopList::for_journey();
        list.update(0, |stop| {
            stop.address = "1 High Street".to_owned();
            stop.floor = Some(120);
        })
        .expect("update pickup");

        let issues = list.validate_endpoints();
        assert_eq!(
            issues,
            vec![
                StopListIssue::FloorOutOfRange { sequence: 0, floor: 120 },
                StopListIssue::MissingAddress { sequence: 1 },
            ]
        );
    }
}
