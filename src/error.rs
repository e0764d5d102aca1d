//! Error types for whittle.
//!
//! Only configuration and construction problems are reported through
//! [`MeshError`]. An edit that cannot be performed right now is not an error:
//! the engines defer it and retry later.

use thiserror::Error;

/// Result type alias using [`MeshError`].
pub type Result<T> = std::result::Result<T, MeshError>;

/// Errors that can occur while building meshes or configuring algorithms.
#[derive(Error, Debug)]
pub enum MeshError {
    /// The mesh has no triangles.
    #[error("mesh has no triangles")]
    EmptyMesh,

    /// A triangle references an invalid vertex index.
    #[error("triangle {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The triangle index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// A triangle has duplicate vertex indices.
    #[error("triangle {face} is degenerate (has duplicate vertices)")]
    DegenerateFace {
        /// The triangle index.
        face: usize,
    },

    /// A named option is not recognised by the algorithm.
    #[error("unknown option: {key}")]
    UnknownOption {
        /// The offending key.
        key: String,
    },

    /// A named option could not be parsed or is out of range.
    #[error("invalid value for option {key}: {value} ({reason})")]
    InvalidOption {
        /// Option key.
        key: String,
        /// The raw value.
        value: String,
        /// Reason the value was refused.
        reason: &'static str,
    },

    /// Invalid parameter value passed through a typed builder.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },

    /// The mesh violates a structural invariant.
    #[error("invalid mesh state: {0}")]
    InvalidState(String),

    /// File I/O error while writing a checkpoint.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MeshError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        MeshError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Create an invalid option error.
    pub fn invalid_option(key: &str, value: &str, reason: &'static str) -> Self {
        MeshError::InvalidOption {
            key: key.to_string(),
            value: value.to_string(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = MeshError::invalid_option("rho", "-3", "must be positive");
        assert_eq!(
            err.to_string(),
            "invalid value for option rho: -3 (must be positive)"
        );
        let err = MeshError::UnknownOption {
            key: "foo".to_string(),
        };
        assert_eq!(err.to_string(), "unknown option: foo");
    }
}
