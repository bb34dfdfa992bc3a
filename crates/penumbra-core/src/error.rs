//! Error types for Penumbra

use thiserror::Error;

/// Result type alias using Penumbra's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while preparing or baking a distance field
///
/// Unclosed meshes and a non-positive resolution scale are not errors: they
/// are reported through the returned volume's flags.
#[derive(Error, Debug)]
pub enum Error {
    /// Mesh input violates the snapshot contract
    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// No triangle survived degenerate filtering
    #[error("Mesh has no non-degenerate triangles")]
    EmptyMesh,

    /// Bake was cancelled through its cancel token
    #[error("Bake cancelled")]
    Cancelled,

    /// Worker pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}
