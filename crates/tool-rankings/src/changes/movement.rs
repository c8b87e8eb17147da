use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementDirection {
    Up,
    Down,
    Same,
    New,
    Dropped,
}

impl MovementDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            MovementDirection::Up => "up",
            MovementDirection::Down => "down",
            MovementDirection::Same => "same",
            MovementDirection::New => "new",
            MovementDirection::Dropped => "dropped",
        }
    }
}

/// Position transition of one tool between two periods.
///
/// `rank_change` is `previous - current`, so climbing the table is positive.
/// New entrants carry no change or magnitude. A dropped tool's change is
/// the negation of its previous rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    pub direction: MovementDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnitude: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank_change: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_rank: Option<u32>,
}

impl Movement {
    pub fn new_entry() -> Self {
        Self {
            direction: MovementDirection::New,
            magnitude: None,
            rank_change: None,
            previous_rank: None,
        }
    }

    pub fn dropped(previous_rank: u32) -> Self {
        Self {
            direction: MovementDirection::Dropped,
            magnitude: Some(previous_rank),
            rank_change: Some(-i64::from(previous_rank)),
            previous_rank: Some(previous_rank),
        }
    }

    pub fn between(previous_rank: u32, current_rank: u32) -> Self {
        let rank_change = i64::from(previous_rank) - i64::from(current_rank);
        let direction = match rank_change {
            change if change > 0 => MovementDirection::Up,
            change if change < 0 => MovementDirection::Down,
            _ => MovementDirection::Same,
        };
        Self {
            direction,
            magnitude: Some(previous_rank.abs_diff(current_rank)),
            rank_change: Some(rank_change),
            previous_rank: Some(previous_rank),
        }
    }
}

/// Coarser bucket of a movement, used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCategory {
    MajorRise,
    Rise,
    Stable,
    Decline,
    MajorDecline,
    NewEntry,
    Dropped,
}

const MAJOR_MOVE: i64 = 5;

impl ChangeCategory {
    pub fn from_movement(movement: &Movement) -> Self {
        match (movement.direction, movement.rank_change) {
            (MovementDirection::New, _) => ChangeCategory::NewEntry,
            (MovementDirection::Dropped, _) => ChangeCategory::Dropped,
            (_, Some(change)) if change >= MAJOR_MOVE => ChangeCategory::MajorRise,
            (_, Some(change)) if change >= 1 => ChangeCategory::Rise,
            (_, Some(change)) if change <= -MAJOR_MOVE => ChangeCategory::MajorDecline,
            (_, Some(change)) if change <= -1 => ChangeCategory::Decline,
            _ => ChangeCategory::Stable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defined_previous_rank_always_classifies_as_up_down_or_same() {
        for previous in 1..=12u32 {
            for current in 1..=12u32 {
                let movement = Movement::between(previous, current);
                let expected = if previous > current {
                    MovementDirection::Up
                } else if previous < current {
                    MovementDirection::Down
                } else {
                    MovementDirection::Same
                };
                assert_eq!(movement.direction, expected);
                assert_eq!(movement.magnitude, Some(previous.abs_diff(current)));
            }
        }
    }

    #[test]
    fn categories_follow_rank_change_thresholds() {
        assert_eq!(
            ChangeCategory::from_movement(&Movement::between(9, 4)),
            ChangeCategory::MajorRise
        );
        assert_eq!(
            ChangeCategory::from_movement(&Movement::between(3, 2)),
            ChangeCategory::Rise
        );
        assert_eq!(
            ChangeCategory::from_movement(&Movement::between(2, 2)),
            ChangeCategory::Stable
        );
        assert_eq!(
            ChangeCategory::from_movement(&Movement::between(2, 6)),
            ChangeCategory::Decline
        );
        assert_eq!(
            ChangeCategory::from_movement(&Movement::between(1, 6)),
            ChangeCategory::MajorDecline
        );
        assert_eq!(
            ChangeCategory::from_movement(&Movement::new_entry()),
            ChangeCategory::NewEntry
        );
        assert_eq!(
            ChangeCategory::from_movement(&Movement::dropped(1)),
            ChangeCategory::Dropped
        );
    }

    #[test]
    fn dropped_movement_negates_previous_rank() {
        let movement = Movement::dropped(4);
        assert_eq!(movement.rank_change, Some(-4));
        assert_eq!(movement.magnitude, Some(4));
    }
}
