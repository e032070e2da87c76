//! Relay Module
//!
//! Baton relay along a linear waypoint track: the track coordinator, the
//! runner state machine, the tick driver and the host-facing server.

pub mod race;
pub mod runner;
pub mod simulation;
pub mod track;
pub mod vector;

pub use race::{Relay, RelayConfig, RelaySnapshot};
pub use runner::{RelayVariant, Runner, RunnerPhase, RunnerSnapshot, RunnerState};
pub use simulation::{RelayServer, ServerState, ServerStats, SharedRelayServer};
pub use track::{Direction, PatrolLeg, Route, RunnerId, Track, Waypoint};
pub use vector::Vec3;
