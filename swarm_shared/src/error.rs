//! Typed errors for entity state synchronization.

use thiserror::Error;

use crate::net::EntityId;

/// Why a remote `EnemyState` could not be applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    #[error("state for {got} applied to enemy {expected}")]
    IdMismatch { expected: EntityId, got: EntityId },
    #[error("state for enemy {id} has no steering target")]
    MissingTarget { id: EntityId },
    #[error("state for enemy {id} has a non-finite {field}")]
    NonFinite { id: EntityId, field: &'static str },
}
