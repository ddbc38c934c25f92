use crate::types::EntityId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Invalid retention tier: {0}")]
    InvalidTier(String),

    #[error("Invalid sensitivity: {0}")]
    InvalidSensitivity(String),

    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    #[error("Duplicate entity: {0}")]
    DuplicateEntity(EntityId),

    #[error("Invalid relationship: {reason}")]
    InvalidRelationship { reason: String },

    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Invalid vector dimension: {0}")]
    InvalidDimension(usize),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}
