//! `swarm_shared`
//!
//! Shared libraries used by both client and server.
//!
//! Design goals:
//! - Deterministic where practical: randomness and time are injected.
//! - Clear separation of concerns (math, steering, entities, net, render).
//! - Traits for abstraction and dependency injection.
//! - No `unsafe`.

pub mod audio;
pub mod clock;
pub mod config;
pub mod enemy;
pub mod error;
pub mod math;
pub mod net;
pub mod render;
pub mod steering;
pub mod swarm;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::audio::*;
    pub use crate::clock::*;
    pub use crate::config::*;
    pub use crate::enemy::Enemy;
    pub use crate::error::SyncError;
    pub use crate::math::*;
    pub use crate::net::*;
    pub use crate::render::*;
    pub use crate::swarm::*;
}
