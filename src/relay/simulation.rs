//! Simulation - Host-facing relay server
//!
//! Owns the relay lifecycle (init, start, pause, resume, reset), feeds the
//! host's per-frame delta into the relay and keeps tick statistics.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::RelayResult;
use crate::relay::race::{Relay, RelayConfig, RelaySnapshot};
use crate::relay::runner::RunnerSnapshot;
use crate::relay::track::RunnerId;

/// Server lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerState {
    Idle,
    Ready,
    Running,
    Paused,
}

/// Server statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStats {
    pub tick_count: u64,
    pub elapsed: f64,
    pub handoffs: u64,
    pub resyncs: u64,
    pub avg_tick_time_ms: f32,
    pub runner_count: u32,
    pub state: ServerState,
}

/// Number of recent ticks averaged for `avg_tick_time_ms`
const TICK_WINDOW: usize = 60;

/// Main relay server
pub struct RelayServer {
    state: ServerState,
    relay: Option<Relay>,
    /// Wall-clock cost of recent ticks (ms)
    tick_times: Vec<f32>,
}

impl RelayServer {
    /// Create an idle server with no relay
    pub fn new() -> Self {
        Self {
            state: ServerState::Idle,
            relay: None,
            tick_times: Vec::with_capacity(TICK_WINDOW),
        }
    }

    /// Build a relay from `config`. On error the server keeps its previous relay.
    pub fn init(&mut self, config: RelayConfig) -> RelayResult<()> {
        let relay = Relay::new(config)?;
        self.relay = Some(relay);
        self.tick_times.clear();
        self.state = ServerState::Ready;
        Ok(())
    }

    /// Start ticking a freshly initialized relay
    pub fn start(&mut self) {
        if self.relay.is_some() && self.state == ServerState::Ready {
            self.state = ServerState::Running;
            log::info!("Relay started");
        }
    }

    /// Advance the relay by `delta` seconds of simulation time.
    ///
    /// Outside `Running` this only reports the current snapshot.
    pub fn tick(&mut self, delta: f32) -> Option<RelaySnapshot> {
        if self.state != ServerState::Running {
            return self.snapshot();
        }

        let tick_start = Instant::now();
        if let Some(relay) = &mut self.relay {
            relay.update(delta);
        }

        let tick_time = tick_start.elapsed().as_secs_f32() * 1000.0;
        if self.tick_times.len() == TICK_WINDOW {
            self.tick_times.remove(0);
        }
        self.tick_times.push(tick_time);

        self.snapshot()
    }

    /// Current relay snapshot without advancing the simulation
    pub fn snapshot(&self) -> Option<RelaySnapshot> {
        self.relay.as_ref().map(Relay::get_snapshot)
    }

    /// Render-facing state of one runner
    pub fn runner_state(&self, id: RunnerId) -> Option<RunnerSnapshot> {
        self.relay
            .as_ref()
            .and_then(|r| r.get_runner(id))
            .map(RunnerSnapshot::from)
    }

    /// Planned path of one runner, for debug drawing
    pub fn pending_queue(&self, id: RunnerId) -> Option<Vec<usize>> {
        self.relay.as_ref().and_then(|r| r.pending_queue(id))
    }

    /// Active relay, if one is initialized
    pub fn relay(&self) -> Option<&Relay> {
        self.relay.as_ref()
    }

    /// Get server statistics
    pub fn stats(&self) -> ServerStats {
        let avg_tick_time_ms = if self.tick_times.is_empty() {
            0.0
        } else {
            self.tick_times.iter().sum::<f32>() / self.tick_times.len() as f32
        };

        let relay = self.relay.as_ref();
        ServerStats {
            tick_count: relay.map_or(0, Relay::tick_count),
            elapsed: relay.map_or(0.0, Relay::elapsed),
            handoffs: relay.map_or(0, Relay::handoffs),
            resyncs: relay.map_or(0, Relay::resyncs),
            avg_tick_time_ms,
            runner_count: relay.map_or(0, |r| r.runners().len() as u32),
            state: self.state,
        }
    }

    /// Get current server state
    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Pause the simulation
    pub fn pause(&mut self) {
        if self.state == ServerState::Running {
            self.state = ServerState::Paused;
            log::info!("Relay paused");
        }
    }

    /// Resume a paused simulation
    pub fn resume(&mut self) {
        if self.state == ServerState::Paused {
            self.state = ServerState::Running;
            log::info!("Relay resumed");
        }
    }

    /// Drop the relay and return to idle
    pub fn reset(&mut self) {
        self.state = ServerState::Idle;
        self.relay = None;
        self.tick_times.clear();
        log::info!("Relay reset");
    }
}

impl Default for RelayServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe relay server handle for hosts driving it from another thread
pub type SharedRelayServer = Arc<RwLock<RelayServer>>;

/// Create a new shared relay server
pub fn create_shared_server() -> SharedRelayServer {
    Arc::new(RwLock::new(RelayServer::new()))
}
