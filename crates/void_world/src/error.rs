//! Error types for world streaming

use thiserror::Error;

use crate::chunk::ChunkState;
use crate::coord::{ChunkCoordinate, ChunkIndex};

/// World streaming errors
#[derive(Debug, Error)]
pub enum WorldError {
    /// A live chunk already occupies this coordinate
    #[error("Chunk {0} is already registered")]
    AlreadyRegistered(ChunkCoordinate),

    /// Two distinct coordinates produced the same index
    #[error("Chunk index {index} of {incoming} collides with registered chunk {existing}")]
    IndexCollision {
        index: ChunkIndex,
        existing: ChunkCoordinate,
        incoming: ChunkCoordinate,
    },

    /// No chunk with this index is registered
    #[error("Chunk {0} not found")]
    ChunkNotFound(ChunkIndex),

    /// Operation not allowed in the chunk's current lifecycle state
    #[error("Chunk {chunk} in invalid state {state:?} for {operation}")]
    InvalidState {
        chunk: ChunkIndex,
        state: ChunkState,
        operation: &'static str,
    },

    /// Configuration could not be parsed
    #[error("Invalid world configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Failures while building one object of a chunk.
///
/// The loader logs these and omits the object; the rest of the chunk still loads.
#[derive(Debug, Error)]
pub enum AuthoringError {
    #[error("Unknown material '{material}' for {object}")]
    MissingMaterial { object: String, material: String },

    #[error("{0} has empty or inverted bounds")]
    DegenerateBounds(String),

    #[error("Instanced model {0} has no instances")]
    NoInstances(String),

    #[error("Point light {index} has non-positive radius {radius}")]
    InvalidLight { index: usize, radius: f32 },
}

/// Result type for world operations
pub type Result<T> = std::result::Result<T, WorldError>;
