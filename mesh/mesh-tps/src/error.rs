//! Error types for thin-plate spline solving.

use thiserror::Error;

/// Errors that can occur while solving TPS coefficients.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TpsError {
    /// Not enough landmark correspondences were supplied.
    #[error("at least {required} landmark pair(s) required, got {provided}")]
    InsufficientLandmarks {
        /// Number of landmarks required.
        required: usize,
        /// Number of landmarks provided.
        provided: usize,
    },

    /// The TPS linear system is singular or produced a non-finite solution.
    #[error("TPS system is degenerate: {0}")]
    DegenerateSystem(String),
}

/// Result type for TPS operations.
pub type TpsResult<T> = Result<T, TpsError>;
