//! Runner - Per-runner state and the hand-off state machine
//!
//! Each runner owns a home waypoint. The baton holder walks its pending
//! queue toward the next runner and hands off on proximity; everybody else
//! idles at home (or walks back there after a hand-off).

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::relay::track::{PatrolLeg, Route, RunnerId, Track};
use crate::relay::vector::Vec3;

/// Whether the baton is relayed between runners or patrolled by its holder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayVariant {
    /// Walk back through the waypoints already passed to home.
    #[default]
    Shuttle,
    /// Hand-off disabled: the holder patrols from home out to each end of
    /// the track and back, turning around at home.
    Patrol,
}

/// Runner state machine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunnerPhase {
    /// No baton, waiting to receive one.
    Idle,
    /// Holds the baton after a direction reversal, waiting out `wait_until`.
    Cooldown,
    /// Holds the baton and walks toward the recipient.
    Traveling,
    /// Handed the baton on, walking back home.
    ReturningHome,
    /// Within hand-off distance of the recipient; the transfer is pending.
    Delivering,
}

/// Tuning shared by every runner in a relay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunnerParams {
    /// Seconds a runner waits after reversing the relay direction.
    pub cooldown: f32,
    /// Distance to the recipient at which the baton changes hands.
    pub handoff_distance: f32,
    /// Distance at which a waypoint counts as reached.
    pub arrival_epsilon: f32,
    pub variant: RelayVariant,
}

/// Per-tick inputs for one runner.
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    /// Simulation time after this tick's advance.
    pub now: f64,
    pub delta: f32,
    /// Current position of this runner's hand-off recipient, if it has one.
    pub recipient_position: Option<Vec3>,
    pub params: &'a RunnerParams,
}

/// Something the driver has to act on after updating a runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerEvent {
    /// The runner is close enough to pass the baton to `to`.
    HandOff { to: RunnerId },
    /// The holder's queue ran dry and its route was recomputed from home.
    Resynchronized,
}

/// Complete state for a single runner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerState {
    /// Unique runner ID (creation order)
    pub id: RunnerId,
    /// Home waypoint index, fixed at spawn
    home: usize,
    /// Current world position
    pub position: Vec3,
    /// Unit vector the runner looks along
    pub facing: Vec3,
    /// Movement speed (units per second)
    pub speed: f32,
    /// Total path length walked so far
    pub odometer: f64,
    /// Whether this runner carries the baton
    pub holds_baton: bool,
    pub phase: RunnerPhase,
    /// Simulation time before which a cooling-down holder stays put
    pub wait_until: f64,
    /// Waypoints still to visit; the front is the current target
    pending: VecDeque<usize>,
    handoff_recipient: Option<RunnerId>,
    /// Waypoints reached since the baton was received, loops erased
    visited: Vec<usize>,
}

impl RunnerState {
    /// Create an idle runner standing at its home waypoint
    pub fn new(id: RunnerId, home: usize, position: Vec3, speed: f32, facing: Vec3) -> Self {
        Self {
            id,
            home,
            position,
            facing,
            speed,
            odometer: 0.0,
            holds_baton: false,
            phase: RunnerPhase::Idle,
            wait_until: 0.0,
            pending: VecDeque::new(),
            handoff_recipient: None,
            visited: Vec::new(),
        }
    }

    /// Home waypoint index; never changes after spawn.
    pub fn home(&self) -> usize {
        self.home
    }

    /// Waypoint currently moved toward.
    pub fn current_target(&self) -> Option<usize> {
        self.pending.front().copied()
    }

    /// Planned path, current target first.
    pub fn pending_queue(&self) -> impl Iterator<Item = usize> + '_ {
        self.pending.iter().copied()
    }

    /// Runner that receives the baton at the end of the current leg.
    pub fn handoff_recipient(&self) -> Option<RunnerId> {
        self.handoff_recipient
    }

    #[cfg(test)]
    pub(crate) fn clear_pending_queue(&mut self) {
        self.pending.clear();
    }

    fn face(&mut self, target: Vec3) {
        if let Some(dir) = self.position.direction_to(target) {
            self.facing = dir;
        }
    }

    fn face_current_target(&mut self, track: &Track) {
        if let Some(target) = self.current_target() {
            self.face(track.position(target));
        }
    }

    fn load_patrol(&mut self, leg: &PatrolLeg) {
        self.pending.clear();
        self.pending.extend(leg.outward.iter().copied());
        self.pending.extend(leg.outward.iter().rev().skip(1).copied());
        self.pending.push_back(self.home);
        self.handoff_recipient = None;
    }

    fn load_route(&mut self, route: &Route) {
        self.pending.clear();
        self.pending.extend(route.intermediates.iter().copied());
        self.pending.push_back(route.recipient_waypoint);
        self.handoff_recipient = Some(route.recipient);
    }

    fn record_visit(&mut self, waypoint: usize) {
        match self.visited.iter().position(|&w| w == waypoint) {
            Some(at) => self.visited.truncate(at + 1),
            None => self.visited.push(waypoint),
        }
    }
}

/// Runner state machine
pub struct Runner;

impl Runner {
    /// Make `state` the active holder: resolve its route from home.
    ///
    /// Resolving from a terminal home reverses the shared direction and puts
    /// the runner into `Cooldown` until `now + cooldown`.
    pub fn engage(state: &mut RunnerState, track: &mut Track, now: f64, params: &RunnerParams) {
        state.visited.clear();
        Self::plan(state, track, now, params, false);
    }

    fn plan(
        state: &mut RunnerState,
        track: &mut Track,
        now: f64,
        params: &RunnerParams,
        turn_back: bool,
    ) {
        state.handoff_recipient = None;
        state.pending.clear();

        let planned = match params.variant {
            RelayVariant::Shuttle => track.next_occupied_from(state.home).map(|route| {
                state.load_route(&route);
                (route.reversed, route.direction)
            }),
            RelayVariant::Patrol => track.patrol_from(state.home, turn_back).map(|leg| {
                state.load_patrol(&leg);
                (leg.reversed, leg.direction)
            }),
        };

        match planned {
            Ok((reversed, direction)) => {
                if reversed {
                    state.wait_until = now + f64::from(params.cooldown);
                    state.phase = RunnerPhase::Cooldown;
                    log::debug!(
                        "runner {} reversed the relay to {}, cooling down until {:.2}",
                        state.id,
                        direction,
                        state.wait_until
                    );
                } else {
                    state.phase = RunnerPhase::Traveling;
                }
                state.face_current_target(track);
            }
            Err(err) => {
                // Left Traveling with an empty queue: the next update retries.
                log::warn!("runner {} could not resolve a route: {}", state.id, err);
                state.phase = RunnerPhase::Traveling;
            }
        }
    }

    /// Advance one runner by one tick.
    pub fn update(
        state: &mut RunnerState,
        track: &mut Track,
        ctx: &TickContext<'_>,
    ) -> Option<RunnerEvent> {
        match state.phase {
            RunnerPhase::Idle | RunnerPhase::Delivering => None,
            RunnerPhase::Cooldown => {
                if ctx.now < state.wait_until {
                    return None;
                }
                state.phase = RunnerPhase::Traveling;
                Self::travel(state, track, ctx)
            }
            RunnerPhase::Traveling => Self::travel(state, track, ctx),
            RunnerPhase::ReturningHome => {
                Self::walk_home(state, track, ctx);
                None
            }
        }
    }

    fn travel(
        state: &mut RunnerState,
        track: &mut Track,
        ctx: &TickContext<'_>,
    ) -> Option<RunnerEvent> {
        let params = ctx.params;

        // Hand-off wins over waypoint arrival.
        if let (Some(recipient), Some(at)) = (state.handoff_recipient, ctx.recipient_position) {
            if state.position.distance(at) < params.handoff_distance {
                state.phase = RunnerPhase::Delivering;
                return Some(RunnerEvent::HandOff { to: recipient });
            }
        }

        Self::pop_if_arrived(state, track, params.arrival_epsilon);

        let mut event = None;
        if state.pending.is_empty() {
            match params.variant {
                RelayVariant::Shuttle => {
                    log::warn!(
                        "runner {} holds the baton with an empty queue, recomputing its route",
                        state.id
                    );
                    Self::engage(state, track, ctx.now, params);
                    event = Some(RunnerEvent::Resynchronized);
                }
                RelayVariant::Patrol => {
                    log::debug!("runner {} finished a patrol leg at home", state.id);
                    Self::plan(state, track, ctx.now, params, true);
                }
            }
            if state.phase == RunnerPhase::Cooldown {
                return event;
            }
        }

        Self::advance(state, track, ctx.delta);
        event
    }

    fn walk_home(state: &mut RunnerState, track: &Track, ctx: &TickContext<'_>) {
        Self::pop_if_arrived(state, track, ctx.params.arrival_epsilon);
        if state.pending.is_empty() {
            state.phase = RunnerPhase::Idle;
            return;
        }
        Self::advance(state, track, ctx.delta);
    }

    fn pop_if_arrived(state: &mut RunnerState, track: &Track, epsilon: f32) {
        let Some(target) = state.current_target() else {
            return;
        };
        if state.position.distance(track.position(target)) < epsilon {
            state.pending.pop_front();
            state.record_visit(target);
            state.face_current_target(track);
        }
    }

    fn advance(state: &mut RunnerState, track: &Track, delta: f32) {
        let Some(target) = state.current_target() else {
            return;
        };
        let next = state.position.move_towards(track.position(target), state.speed * delta);
        state.odometer += f64::from(state.position.distance(next));
        state.position = next;
    }

    /// Give up the baton after a hand-off and walk back home the way it came.
    pub fn complete_handoff(state: &mut RunnerState, track: &Track) {
        state.holds_baton = false;
        state.handoff_recipient = None;
        state.pending.clear();
        state.pending.extend(state.visited.iter().rev().copied());
        state.pending.push_back(state.home);
        state.phase = RunnerPhase::ReturningHome;
        state.face_current_target(track);
        state.visited.clear();
    }

    /// Take over the baton and start the next leg.
    pub fn receive(state: &mut RunnerState, track: &mut Track, now: f64, params: &RunnerParams) {
        state.holds_baton = true;
        Self::engage(state, track, now, params);
    }
}

/// Compact runner state for the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerSnapshot {
    pub id: RunnerId,
    pub home: usize,
    pub position: Vec3,
    pub facing: Vec3,
    pub holds_baton: bool,
    pub phase: RunnerPhase,
}

impl From<&RunnerState> for RunnerSnapshot {
    fn from(state: &RunnerState) -> Self {
        Self {
            id: state.id,
            home: state.home,
            position: state.position,
            facing: state.facing,
            holds_baton: state.holds_baton,
            phase: state.phase,
        }
    }
}
