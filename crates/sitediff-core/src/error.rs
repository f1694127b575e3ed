//! Error types for the comparison engine
//!
//! Three tiers, mirroring how far a failure may travel:
//! - [`ArtifactError`]: a single artifact write failed
//! - [`ScoreError`]: one path could not be compared (absorbed into its record)
//! - [`CompareError`]: the run itself failed (surfaced to the caller)

use std::fmt;
use std::path::PathBuf;

/// Which variant a per-path failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Reference variant (e.g. production)
    Reference,
    /// Candidate variant (e.g. pending release)
    Candidate,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference => f.write_str("reference"),
            Self::Candidate => f.write_str("candidate"),
        }
    }
}

/// Artifact persistence errors
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// IO error while writing an artifact
    #[error("io error writing {path}: {source}")]
    Io {
        /// File or directory being written
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Difference image could not be encoded
    #[error("failed to encode difference image: {0}")]
    Encode(#[from] image::ImageError),
}

impl ArtifactError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Per-path comparison errors
///
/// Never propagated past the task boundary; the pipeline turns them into
/// `ComparisonError` records.
#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    /// Screenshot bytes could not be decoded
    #[error("failed to decode {side} screenshot: {source}")]
    Decode {
        /// Variant whose screenshot failed
        side: Side,
        /// Decoder error
        #[source]
        source: image::ImageError,
    },

    /// Artifact write failed
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    /// Worker task failed to complete
    #[error("comparison task failed: {0}")]
    Task(String),
}

impl ScoreError {
    /// Create decode error for side
    pub fn decode(side: Side, source: image::ImageError) -> Self {
        Self::Decode { side, source }
    }
}

/// Run-level errors
#[derive(Debug, thiserror::Error)]
pub enum CompareError {
    /// Artifact directory could not be created
    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        /// Artifact directory
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Final report could not be written
    #[error("cannot write report {path}: {source}")]
    Report {
        /// Report file
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Configuration rejected before the run started
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Report serialization failed
    #[error("report serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CompareError {
    /// Create output directory error
    pub fn output_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::OutputDir {
            path: path.into(),
            source,
        }
    }

    /// Create report write error
    pub fn report(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Report {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for run-level operations
pub type CompareResult<T> = Result<T, CompareError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_error_display() {
        let err = ArtifactError::io_error(
            "diff_output/x_diff.png",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(
            err.to_string(),
            "io error writing diff_output/x_diff.png: denied"
        );
    }

    #[test]
    fn score_error_wraps_artifact() {
        let err: ScoreError = ArtifactError::io_error(
            "a",
            std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        )
        .into();
        assert!(matches!(err, ScoreError::Artifact(_)));
        assert!(err.to_string().starts_with("artifact error"));
    }

    #[test]
    fn compare_error_display() {
        let err = CompareError::output_dir(
            "out",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("cannot create output directory out"));
        assert_eq!(Side::Candidate.to_string(), "candidate");
    }
}
