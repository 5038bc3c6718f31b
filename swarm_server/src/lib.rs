//! `swarm_server`
//!
//! Server-side systems:
//! - Fixed timestep enemy simulation
//! - Client handshake and bookkeeping
//! - Receives `DamageCommand`s
//! - Sends full-state `Snapshot`s
//!
//! Networking model:
//! - TCP: handshake/control plane
//! - UDP: gameplay plane (commands/snapshots)

pub mod server;

pub use server::GameServer;
