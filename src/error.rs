//! Error types for cluster analysis.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Invalid cluster: {0}")]
    InvalidCluster(String),

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Khachiyan iteration did not converge after {iterations} iterations (error {error:e})")]
    Convergence { iterations: usize, error: f64 },

    #[error("Invalid centre point: {0}")]
    InvalidCenter(String),

    #[error("Invalid cluster table: {0}")]
    InvalidTable(String),

    #[error("Unable to perform file operation: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl PartialEq for ClusterError {
    fn eq(&self, other: &Self) -> bool {
        use ClusterError::*;
        match (self, other) {
            (InvalidCluster(a), InvalidCluster(b)) => a == b,
            (DegenerateGeometry(a), DegenerateGeometry(b)) => a == b,
            (
                Convergence {
                    iterations: ia,
                    error: ea,
                },
                Convergence {
                    iterations: ib,
                    error: eb,
                },
            ) => ia == ib && ea == eb,
            (InvalidCenter(a), InvalidCenter(b)) => a == b,
            (InvalidTable(a), InvalidTable(b)) => a == b,

            // Wrapped foreign errors compare by variant only
            (Io(_), Io(_)) => true,
            (Csv(_), Csv(_)) => true,

            _ => false,
        }
    }
}

/// Result type alias for cluster analysis operations
pub type Result<T> = std::result::Result<T, ClusterError>;
