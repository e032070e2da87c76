//! Track - Ordered waypoints and the shared relay direction
//!
//! The track owns the waypoint sequence and the single direction flag.
//! Runners ask it where the baton goes next from their home waypoint.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, RelayResult};
use crate::relay::vector::Vec3;

/// Runner identifier; equal to the runner's creation index.
pub type RunnerId = u32;

/// Which way along the waypoint sequence the baton currently travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Towards higher indices (+1).
    Forward,
    /// Towards lower indices (-1).
    Backward,
}

impl Direction {
    /// The direction as a signed index step.
    pub fn step(self) -> i32 {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }

    /// The opposite direction.
    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}", self.step())
    }
}

/// A fixed track slot, optionally the home of one runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Waypoint {
    position: Vec3,
    owner: Option<RunnerId>,
}

impl Waypoint {
    /// World position, fixed at setup.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// The runner whose home this is. Ownership marks home, not occupancy.
    pub fn owner(&self) -> Option<RunnerId> {
        self.owner
    }
}

/// Result of resolving where the baton goes next from a home waypoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Unowned waypoints between home and the recipient, in travel order.
    pub intermediates: Vec<usize>,
    /// Runner that receives the baton.
    pub recipient: RunnerId,
    /// The recipient's home waypoint.
    pub recipient_waypoint: usize,
    /// Direction after any reversal.
    pub direction: Direction,
    /// True when resolving this route flipped the shared direction.
    pub reversed: bool,
}

/// One patrol leg: out from home to the end of the track, in travel order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatrolLeg {
    /// Waypoints from the one next to home up to the terminal waypoint.
    pub outward: Vec<usize>,
    /// Direction after any reversal.
    pub direction: Direction,
    /// True when planning this leg flipped the shared direction.
    pub reversed: bool,
}

/// Track coordinator: waypoint sequence plus the shared direction flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    waypoints: Vec<Waypoint>,
    direction: Direction,
}

impl Track {
    /// Build a track and assign runner `i` as owner of `occupied[i]`.
    pub fn new(positions: &[Vec3], occupied: &[usize]) -> RelayResult<Self> {
        if positions.len() < 2 {
            return Err(RelayError::track(format!(
                "need at least 2 waypoints, got {}",
                positions.len()
            )));
        }
        if occupied.len() < 2 {
            return Err(RelayError::track(format!(
                "need at least 2 occupied waypoints, got {}",
                occupied.len()
            )));
        }

        let mut waypoints: Vec<Waypoint> = positions
            .iter()
            .map(|&position| Waypoint {
                position,
                owner: None,
            })
            .collect();

        for (runner, &index) in occupied.iter().enumerate() {
            let waypoint = waypoints.get_mut(index).ok_or_else(|| {
                RelayError::track(format!(
                    "occupied index {} is out of range for {} waypoints",
                    index,
                    positions.len()
                ))
            })?;
            if let Some(existing) = waypoint.owner {
                return Err(RelayError::track(format!(
                    "waypoint {} is occupied twice (runners {} and {})",
                    index, existing, runner
                )));
            }
            waypoint.owner = Some(runner as RunnerId);
        }

        Ok(Self {
            waypoints,
            direction: Direction::Forward,
        })
    }

    /// Number of waypoints.
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// True for a track without waypoints (never the case after `new`).
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Waypoint at `index`, if in range.
    pub fn waypoint(&self, index: usize) -> Option<&Waypoint> {
        self.waypoints.get(index)
    }

    /// All waypoints in track order.
    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    /// Position of waypoint `index`. Callers only pass indices the track handed out.
    pub(crate) fn position(&self, index: usize) -> Vec3 {
        self.waypoints[index].position
    }

    /// Shared direction the baton currently travels in.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Neighbouring index in `direction`, or `None` past either end.
    fn step(&self, index: usize, direction: Direction) -> Option<usize> {
        match direction {
            Direction::Forward => (index + 1 < self.waypoints.len()).then_some(index + 1),
            Direction::Backward => index.checked_sub(1),
        }
    }

    fn has_owner_beyond(&self, home: usize, direction: Direction) -> bool {
        let mut cursor = self.step(home, direction);
        while let Some(index) = cursor {
            if self.waypoints[index].owner.is_some() {
                return true;
            }
            cursor = self.step(index, direction);
        }
        false
    }

    /// Resolve the next hand-off from `home` in the shared direction.
    ///
    /// A home with nothing owned ahead of it (always the case for the last
    /// index going forward and the first going backward) reverses the shared
    /// direction first; the returned route reports that via `reversed`.
    pub fn next_occupied_from(&mut self, home: usize) -> RelayResult<Route> {
        if home >= self.waypoints.len() {
            return Err(RelayError::track(format!(
                "home index {} is out of range for {} waypoints",
                home,
                self.waypoints.len()
            )));
        }

        let mut reversed = false;
        if !self.has_owner_beyond(home, self.direction) {
            self.direction = self.direction.reversed();
            reversed = true;
            log::debug!("direction reversed to {} at waypoint {}", self.direction, home);
        }

        let direction = self.direction;
        let mut intermediates = Vec::new();
        let mut cursor = self.step(home, direction);
        while let Some(index) = cursor {
            if let Some(recipient) = self.waypoints[index].owner {
                return Ok(Route {
                    intermediates,
                    recipient,
                    recipient_waypoint: index,
                    direction,
                    reversed,
                });
            }
            intermediates.push(index);
            cursor = self.step(index, direction);
        }

        Err(RelayError::track(format!(
            "no occupied waypoint in direction {} from index {}",
            direction, home
        )))
    }

    /// Plan a patrol leg from `home` to the end of the track, ignoring owners.
    ///
    /// With `turn_back` the leg heads the other way from the previous one.
    /// A home on the terminal waypoint of the chosen direction turns around.
    pub fn patrol_from(&mut self, home: usize, turn_back: bool) -> RelayResult<PatrolLeg> {
        if home >= self.waypoints.len() {
            return Err(RelayError::track(format!(
                "home index {} is out of range for {} waypoints",
                home,
                self.waypoints.len()
            )));
        }

        let start = self.direction;
        let mut direction = if turn_back { start.reversed() } else { start };
        if self.step(home, direction).is_none() {
            direction = direction.reversed();
        }
        self.direction = direction;
        let reversed = direction != start;
        if reversed {
            log::debug!("patrol reversed to {} at waypoint {}", direction, home);
        }

        let mut outward = Vec::new();
        let mut cursor = self.step(home, direction);
        while let Some(index) = cursor {
            outward.push(index);
            cursor = self.step(index, direction);
        }

        Ok(PatrolLeg {
            outward,
            direction,
            reversed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(count: usize) -> Vec<Vec3> {
        (0..count).map(|i| Vec3::new(i as f32 * 2.0, 0.0, 0.0)).collect()
    }

    #[test]
    fn forward_route_stops_at_first_owner() {
        let mut track = Track::new(&line(5), &[0, 2, 4]).unwrap();
        let route = track.next_occupied_from(0).unwrap();
        assert_eq!(route.intermediates, vec![1]);
        assert_eq!(route.recipient, 1);
        assert_eq!(route.recipient_waypoint, 2);
        assert!(!route.reversed);
        assert_eq!(track.direction(), Direction::Forward);
    }

    #[test]
    fn last_index_going_forward_reverses() {
        let mut track = Track::new(&line(5), &[0, 2, 4]).unwrap();
        let route = track.next_occupied_from(4).unwrap();
        assert!(route.reversed);
        assert_eq!(route.direction, Direction::Backward);
        assert_eq!(track.direction(), Direction::Backward);
        assert_eq!(route.intermediates, vec![3]);
        assert_eq!(route.recipient, 1);
    }

    #[test]
    fn first_index_going_backward_reverses() {
        let mut track = Track::new(&line(5), &[0, 2, 4]).unwrap();
        track.next_occupied_from(4).unwrap();
        let route = track.next_occupied_from(0).unwrap();
        assert!(route.reversed);
        assert_eq!(track.direction(), Direction::Forward);
        assert_eq!(route.recipient_waypoint, 2);
    }

    #[test]
    fn sparse_track_collects_every_gap() {
        let mut track = Track::new(&line(5), &[0, 4]).unwrap();
        let route = track.next_occupied_from(0).unwrap();
        assert_eq!(route.intermediates, vec![1, 2, 3]);
        assert_eq!(route.recipient, 1);
    }

    #[test]
    fn outermost_runner_off_the_end_still_reverses() {
        let mut track = Track::new(&line(6), &[1, 3]).unwrap();
        let route = track.next_occupied_from(3).unwrap();
        assert!(route.reversed);
        assert_eq!(route.intermediates, vec![2]);
        assert_eq!(route.recipient, 0);
    }

    #[test]
    fn owners_follow_occupied_order() {
        let track = Track::new(&line(5), &[3, 1]).unwrap();
        assert_eq!(track.waypoint(3).unwrap().owner(), Some(0));
        assert_eq!(track.waypoint(1).unwrap().owner(), Some(1));
        assert_eq!(track.waypoint(0).unwrap().owner(), None);
    }

    #[test]
    fn rejects_single_occupant() {
        let err = Track::new(&line(5), &[2]).unwrap_err();
        assert!(matches!(err, RelayError::InvalidTrackConfiguration(_)));
    }

    #[test]
    fn rejects_out_of_range_and_duplicate_indices() {
        assert!(Track::new(&line(3), &[0, 3]).is_err());
        assert!(Track::new(&line(3), &[1, 1]).is_err());
    }

    #[test]
    fn patrol_leg_runs_to_the_end_ignoring_owners() {
        let mut track = Track::new(&line(5), &[0, 2, 4]).unwrap();
        let leg = track.patrol_from(2, false).unwrap();
        assert_eq!(leg.outward, vec![3, 4]);
        assert!(!leg.reversed);

        let back = track.patrol_from(2, true).unwrap();
        assert_eq!(back.outward, vec![1, 0]);
        assert!(back.reversed);
        assert_eq!(track.direction(), Direction::Backward);
    }

    #[test]
    fn patrol_from_terminal_home_keeps_room_ahead() {
        let mut track = Track::new(&line(4), &[0, 3]).unwrap();
        let leg = track.patrol_from(0, true).unwrap();
        assert_eq!(leg.outward, vec![1, 2, 3]);
        assert_eq!(leg.direction, Direction::Forward);
        assert!(!leg.reversed);

        let leg = track.patrol_from(3, false).unwrap();
        assert_eq!(leg.outward, vec![2, 1, 0]);
        assert!(leg.reversed);
    }

    #[test]
    fn rejects_out_of_range_home() {
        let mut track = Track::new(&line(3), &[0, 2]).unwrap();
        assert!(matches!(
            track.next_occupied_from(7),
            Err(RelayError::InvalidTrackConfiguration(_))
        ));
    }
}
