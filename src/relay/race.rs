//! Relay - Configuration, setup and the per-tick driver
//!
//! Builds the track and runners from a `RelayConfig`, then advances every
//! runner once per tick in creation order and applies baton hand-offs.

use std::path::Path;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{RelayError, RelayResult};
use crate::relay::runner::{
    RelayVariant, Runner, RunnerEvent, RunnerParams, RunnerSnapshot, RunnerState, TickContext,
};
use crate::relay::track::{Direction, RunnerId, Track};
use crate::relay::vector::Vec3;

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Waypoint positions in track order
    pub waypoints: Vec<Vec3>,
    /// Waypoint indices that get a runner; runner `i` lives at `occupied[i]`
    pub occupied: Vec<usize>,
    /// Index into `occupied` of the runner that starts with the baton
    pub initial_holder: usize,
    /// Lower bound for a runner's speed
    pub speed_min: f32,
    /// Upper bound for a runner's speed
    pub speed_max: f32,
    /// Wait after a direction reversal (seconds)
    pub cooldown: f32,
    /// Runner-to-runner distance that triggers a hand-off
    pub handoff_distance: f32,
    /// Runner-to-waypoint distance that counts as arrival
    pub arrival_epsilon: f32,
    pub variant: RelayVariant,
    /// Optional RNG seed for reproducible spawns
    pub rng_seed: Option<u64>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            waypoints: (0..5).map(|i| Vec3::new(i as f32 * 2.0, 0.0, 0.0)).collect(),
            occupied: vec![0, 2, 4],
            initial_holder: 0,
            speed_min: 1.0,
            speed_max: 1.5,
            cooldown: 2.0,
            handoff_distance: 0.5,
            arrival_epsilon: 1e-4,
            variant: RelayVariant::Shuttle,
            rng_seed: None,
        }
    }
}

impl RelayConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> RelayResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> RelayResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| RelayError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Check tuning values. Layout errors are reported by `Track::new`.
    pub fn validate(&self) -> RelayResult<()> {
        if self.occupied.len() < 2 {
            return Err(RelayError::track(format!(
                "need at least 2 occupied waypoints, got {}",
                self.occupied.len()
            )));
        }
        if self.initial_holder >= self.occupied.len() {
            return Err(RelayError::track(format!(
                "initial holder {} is not one of the {} runners",
                self.initial_holder,
                self.occupied.len()
            )));
        }
        if !(self.speed_min.is_finite() && self.speed_min > 0.0) {
            return Err(RelayError::track("speed_min must be positive"));
        }
        if !(self.speed_max.is_finite() && self.speed_max >= self.speed_min) {
            return Err(RelayError::track("speed_max must be at least speed_min"));
        }
        if !(self.cooldown.is_finite() && self.cooldown >= 0.0) {
            return Err(RelayError::track("cooldown must be non-negative"));
        }
        if !(self.handoff_distance > 0.0) {
            return Err(RelayError::track("handoff_distance must be positive"));
        }
        if !(self.arrival_epsilon > 0.0) {
            return Err(RelayError::track("arrival_epsilon must be positive"));
        }
        Ok(())
    }

    /// Tuning handed to every runner
    pub fn runner_params(&self) -> RunnerParams {
        RunnerParams {
            cooldown: self.cooldown,
            handoff_distance: self.handoff_distance,
            arrival_epsilon: self.arrival_epsilon,
            variant: self.variant,
        }
    }

    /// Returns the configured RNG seed, generating one from entropy if absent.
    fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

/// Complete relay state
#[derive(Debug, Clone)]
pub struct Relay {
    params: RunnerParams,
    track: Track,
    /// All runners, in creation order
    runners: Vec<RunnerState>,
    /// Runner currently carrying the baton
    holder: RunnerId,
    /// Elapsed simulation time (seconds)
    elapsed: f64,
    tick: u64,
    handoffs: u64,
    resyncs: u64,
}

impl Relay {
    /// Build the track, spawn runners and give the baton to the initial holder
    pub fn new(config: RelayConfig) -> RelayResult<Self> {
        config.validate()?;
        let mut track = Track::new(&config.waypoints, &config.occupied)?;
        let params = config.runner_params();
        let mut rng = config.seeded_rng();

        let mut runners = Self::spawn_runners(&config, &track, &mut rng);

        let holder = config.initial_holder as RunnerId;
        Runner::receive(&mut runners[config.initial_holder], &mut track, 0.0, &params);

        log::info!(
            "Relay initialized with {} runners on {} waypoints, runner {} holds the baton",
            runners.len(),
            track.len(),
            holder
        );

        Ok(Self {
            params,
            track,
            runners,
            holder,
            elapsed: 0.0,
            tick: 0,
            handoffs: 0,
            resyncs: 0,
        })
    }

    /// Place each runner on its home waypoint with a random speed and facing
    fn spawn_runners(config: &RelayConfig, track: &Track, rng: &mut SmallRng) -> Vec<RunnerState> {
        config
            .occupied
            .iter()
            .enumerate()
            .map(|(id, &home)| {
                let speed = if config.speed_max > config.speed_min {
                    rng.gen_range(config.speed_min..config.speed_max)
                } else {
                    config.speed_min
                };
                let position = track.position(home);

                // Look at any other waypoint to start with.
                let look_at = loop {
                    let candidate = rng.gen_range(0..track.len());
                    if candidate != home {
                        break candidate;
                    }
                };
                let facing = position
                    .direction_to(track.position(look_at))
                    .unwrap_or(Vec3::ZERO);

                RunnerState::new(id as RunnerId, home, position, speed, facing)
            })
            .collect()
    }

    /// Advance every runner once, in creation order.
    ///
    /// A runner that receives the baton during a tick starts moving on the
    /// next one, so there is at most one hand-off per tick.
    pub fn update(&mut self, delta: f32) {
        self.tick += 1;
        self.elapsed += f64::from(delta);
        let now = self.elapsed;

        let mut received = None;
        for index in 0..self.runners.len() {
            if received == Some(index) {
                continue;
            }

            let recipient_position = self.runners[index]
                .handoff_recipient()
                .and_then(|id| self.runners.get(id as usize))
                .map(|r| r.position);
            let ctx = TickContext {
                now,
                delta,
                recipient_position,
                params: &self.params,
            };

            match Runner::update(&mut self.runners[index], &mut self.track, &ctx) {
                Some(RunnerEvent::HandOff { to }) => {
                    if self.hand_off(index, to as usize, now) {
                        received = Some(to as usize);
                    }
                }
                Some(RunnerEvent::Resynchronized) => self.resyncs += 1,
                None => {}
            }
        }
    }

    fn hand_off(&mut self, from: usize, to: usize, now: f64) -> bool {
        if from == to || to >= self.runners.len() {
            log::warn!("runner {} tried to hand off to invalid runner {}", from, to);
            Runner::engage(&mut self.runners[from], &mut self.track, now, &self.params);
            return false;
        }

        Runner::complete_handoff(&mut self.runners[from], &self.track);
        Runner::receive(&mut self.runners[to], &mut self.track, now, &self.params);
        self.holder = to as RunnerId;
        self.handoffs += 1;

        log::debug!(
            "tick {}: runner {} handed the baton to runner {} (direction {})",
            self.tick,
            from,
            to,
            self.track.direction()
        );
        true
    }

    /// Get compact snapshot for the host
    pub fn get_snapshot(&self) -> RelaySnapshot {
        RelaySnapshot {
            tick: self.tick,
            elapsed: self.elapsed,
            direction: self.track.direction(),
            holder: self.holder,
            handoffs: self.handoffs,
            runners: self.runners.iter().map(RunnerSnapshot::from).collect(),
        }
    }

    /// Get runner by ID
    pub fn get_runner(&self, id: RunnerId) -> Option<&RunnerState> {
        self.runners.get(id as usize)
    }

    /// Planned waypoints of a runner, current target first
    pub fn pending_queue(&self, id: RunnerId) -> Option<Vec<usize>> {
        self.get_runner(id).map(|r| r.pending_queue().collect())
    }

    /// All runners, in creation order
    pub fn runners(&self) -> &[RunnerState] {
        &self.runners
    }

    /// Track coordinator (waypoints and shared direction)
    pub fn track(&self) -> &Track {
        &self.track
    }

    /// Runner currently carrying the baton
    pub fn holder(&self) -> RunnerId {
        self.holder
    }

    /// Elapsed simulation time (seconds)
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Number of ticks simulated
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Number of completed hand-offs
    pub fn handoffs(&self) -> u64 {
        self.handoffs
    }

    /// Number of holder queues rebuilt after running dry
    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }

    #[cfg(test)]
    pub(crate) fn runner_mut(&mut self, id: RunnerId) -> &mut RunnerState {
        &mut self.runners[id as usize]
    }
}

/// Compact relay snapshot for the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySnapshot {
    pub tick: u64,
    pub elapsed: f64,
    pub direction: Direction,
    pub holder: RunnerId,
    pub handoffs: u64,
    pub runners: Vec<RunnerSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::runner::RunnerPhase;

    const DT: f32 = 1.0 / 60.0;

    fn seeded(occupied: Vec<usize>) -> RelayConfig {
        RelayConfig {
            occupied,
            rng_seed: Some(7),
            ..Default::default()
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(RelayConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_tuning() {
        let cases = [
            RelayConfig { occupied: vec![1], ..Default::default() },
            RelayConfig { initial_holder: 3, ..Default::default() },
            RelayConfig { speed_min: 0.0, ..Default::default() },
            RelayConfig { speed_max: 0.5, ..Default::default() },
            RelayConfig { cooldown: -1.0, ..Default::default() },
            RelayConfig { handoff_distance: 0.0, ..Default::default() },
            RelayConfig { arrival_epsilon: f32::NAN, ..Default::default() },
        ];
        for config in cases {
            assert!(
                matches!(Relay::new(config.clone()), Err(RelayError::InvalidTrackConfiguration(_))),
                "{config:?} should be rejected"
            );
        }
    }

    #[test]
    fn out_of_range_occupied_index_is_fatal() {
        let err = Relay::new(seeded(vec![0, 9])).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn json_config_fills_defaults() {
        let config = RelayConfig::from_json_str(
            r#"{ "occupied": [0, 4], "variant": "patrol", "rng_seed": 3 }"#,
        )
        .unwrap();
        assert_eq!(config.occupied, vec![0, 4]);
        assert_eq!(config.variant, RelayVariant::Patrol);
        assert_eq!(config.waypoints.len(), 5);
        assert_eq!(config.cooldown, 2.0);
    }

    #[test]
    fn missing_config_file_reports_path() {
        let err = RelayConfig::from_json_file("/nonexistent/relay.json").unwrap_err();
        assert!(matches!(err, RelayError::ConfigIo { .. }));
        assert!(err.to_string().contains("/nonexistent/relay.json"));
    }

    #[test]
    fn spawn_is_reproducible_for_a_seed() {
        let a = Relay::new(seeded(vec![0, 2, 4])).unwrap();
        let b = Relay::new(seeded(vec![0, 2, 4])).unwrap();
        for (ra, rb) in a.runners().iter().zip(b.runners()) {
            assert_eq!(ra.speed, rb.speed);
            assert_eq!(ra.facing, rb.facing);
            assert!((1.0..1.5).contains(&ra.speed));
            assert_eq!(ra.position, a.track().position(ra.home()));
        }
    }

    #[test]
    fn first_hand_off_goes_to_the_next_runner() {
        let mut relay = Relay::new(seeded(vec![0, 2, 4])).unwrap();
        assert_eq!(relay.pending_queue(0), Some(vec![1, 2]));

        while relay.handoffs() == 0 {
            relay.update(DT);
            assert!(relay.tick_count() < 10_000);
        }
        assert_eq!(relay.holder(), 1);
        assert_eq!(relay.get_runner(0).unwrap().phase, RunnerPhase::ReturningHome);
        assert_eq!(relay.get_runner(1).unwrap().phase, RunnerPhase::Traveling);
        assert_eq!(relay.pending_queue(1), Some(vec![3, 4]));
    }

    #[test]
    fn recipient_does_not_move_on_the_receiving_tick() {
        let mut relay = Relay::new(seeded(vec![0, 2, 4])).unwrap();
        let home = relay.get_runner(1).unwrap().position;
        while relay.handoffs() == 0 {
            relay.update(DT);
        }
        assert_eq!(relay.get_runner(1).unwrap().position, home);
        relay.update(DT);
        assert_ne!(relay.get_runner(1).unwrap().position, home);
    }

    #[test]
    fn forced_empty_queue_matches_fresh_route() {
        let mut relay = Relay::new(seeded(vec![0, 2, 4])).unwrap();
        for _ in 0..10 {
            relay.update(DT);
        }
        let mut fresh = relay.track().clone();
        let route = fresh.next_occupied_from(0).unwrap();
        let mut expected = route.intermediates.clone();
        expected.push(route.recipient_waypoint);

        relay.runner_mut(0).clear_pending_queue();
        relay.update(DT);

        assert_eq!(relay.resyncs(), 1);
        assert_eq!(relay.pending_queue(0), Some(expected));
        assert_eq!(relay.get_runner(0).unwrap().handoff_recipient(), Some(route.recipient));
    }

    #[test]
    fn terminal_recipient_reverses_and_cools_down() {
        let mut relay = Relay::new(seeded(vec![0, 2, 4])).unwrap();
        while relay.handoffs() < 2 {
            relay.update(DT);
            assert!(relay.tick_count() < 10_000);
        }
        let runner = relay.get_runner(2).unwrap();
        assert_eq!(relay.holder(), 2);
        assert_eq!(relay.track().direction(), Direction::Backward);
        assert_eq!(runner.phase, RunnerPhase::Cooldown);
        assert!((runner.wait_until - (relay.elapsed() + 2.0)).abs() < 1e-9);
    }

    #[test]
    fn cooldown_still_expires_after_a_long_run() {
        let mut relay = Relay::new(seeded(vec![0, 2, 4])).unwrap();
        relay.update(600_000.0);
        let start = relay.elapsed();

        for _ in 0..20_000 {
            relay.update(DT);
        }
        assert!(relay.elapsed() - start > 300.0);
        // Reversals at both ends had to wait out their cooldown.
        assert!(relay.handoffs() >= 4);
    }
}
