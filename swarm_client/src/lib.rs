//! `swarm_client`
//!
//! Client-side systems:
//! - Connection management (reliable + unreliable channels)
//! - Snapshot mirroring of the server's swarm
//! - Global key dispatch and panel switching
//! - Offline play with a locally simulated swarm

pub mod client;
pub mod input;
pub mod offline;
pub mod panels;

pub use client::GameClient;
