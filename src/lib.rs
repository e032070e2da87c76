//! Relay Race - Baton relay simulation core
//!
//! Runners stationed on an ordered waypoint track pass a single baton back
//! and forth. The host supplies a configuration and a per-frame delta; the
//! crate exposes runner positions, facings and who carries the baton.

pub mod error;
pub mod relay;

pub use error::{RelayError, RelayResult};
pub use relay::{
    Direction, Relay, RelayConfig, RelayServer, RelaySnapshot, RelayVariant, RunnerId,
    RunnerPhase, RunnerSnapshot, ServerState, ServerStats, SharedRelayServer, Vec3,
};
