//! Error taxonomy for network assembly
//!
//! [`NetworkError`] carries one variant per failure kind the pipeline can
//! produce. Only [`ErrorKind::SourceUnavailable`] is ever absorbed (by the
//! config repository, which logs it and returns an empty table); every other
//! kind aborts the build. The orchestrator wraps the failing error together
//! with the stage it came from in a [`BuildError`].
//!
//! # Example
//!
//! ```
//! use hyrenet_core::{ComponentClass, ErrorKind, NetworkError};
//!
//! let err = NetworkError::MissingBusReference {
//!     class: ComponentClass::Generator,
//!     component: "G1".into(),
//!     bus: "north".into(),
//! };
//! assert_eq!(err.kind(), ErrorKind::MissingBusReference);
//! assert!(err.to_string().contains("north"));
//! ```

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::components::ComponentClass;

/// What went wrong when a profile index was compared with the snapshot index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexMismatch {
    /// Index names differ (e.g. `time` vs `snapshot`)
    Name { expected: String, found: String },
    /// Different number of entries
    Length { expected: usize, found: usize },
    /// Same length, but a timestamp differs
    Values {
        position: usize,
        expected: String,
        found: String,
    },
    /// A timestamp required by a window is absent from the profile
    MissingTimestamp { timestamp: String },
    /// The profile has no column with the requested attribute
    MissingColumn { column: String },
}

impl fmt::Display for IndexMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexMismatch::Name { expected, found } => {
                write!(f, "index named '{}' but snapshots are named '{}'", found, expected)
            }
            IndexMismatch::Length { expected, found } => {
                write!(f, "length {} does not match {} snapshots", found, expected)
            }
            IndexMismatch::Values {
                position,
                expected,
                found,
            } => write!(
                f,
                "timestamp {} at position {} differs from snapshot {}",
                found, position, expected
            ),
            IndexMismatch::MissingTimestamp { timestamp } => {
                write!(f, "no value for snapshot {}", timestamp)
            }
            IndexMismatch::MissingColumn { column } => {
                write!(f, "profile has no column '{}'", column)
            }
        }
    }
}

/// Kind discriminant for [`NetworkError`], handy for matching in callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SourceUnavailable,
    DisallowedSource,
    UnknownTechnologyType,
    MissingBusReference,
    VoltageMismatch,
    ProfileIndexMismatch,
    InvalidConstraintTarget,
    DuplicateComponent,
    InvalidComponentData,
    InvalidTechnologyLibrary,
    InvalidConfig,
    EngineRejected,
    Io,
}

/// Typed failure raised by any pipeline stage.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    /// File absent, empty or unparseable. Absorbed by the repository.
    #[error("source '{path}' unavailable: {reason}")]
    SourceUnavailable { path: String, reason: String },

    /// Requested file is not on the allow-list for its category
    #[error("source '{name}' is not allowed in {category}")]
    DisallowedSource { category: String, name: String },

    #[error("{class} '{component}' references unknown technology type '{tech_type}'")]
    UnknownTechnologyType {
        class: ComponentClass,
        component: String,
        tech_type: String,
    },

    #[error("{class} '{component}' references missing bus '{bus}'")]
    MissingBusReference {
        class: ComponentClass,
        component: String,
        bus: String,
    },

    #[error("{class} '{component}' voltage mismatch: {detail}")]
    VoltageMismatch {
        class: ComponentClass,
        component: String,
        detail: String,
    },

    #[error("profile for '{entity}' does not match snapshots: {mismatch}")]
    ProfileIndexMismatch {
        entity: String,
        mismatch: IndexMismatch,
    },

    #[error("constraint '{constraint}' has invalid target: {detail}")]
    InvalidConstraintTarget { constraint: String, detail: String },

    #[error("{class} '{name}' is already registered")]
    DuplicateComponent { class: ComponentClass, name: String },

    #[error("{class} data invalid ({entity}): {detail}")]
    InvalidComponentData {
        class: ComponentClass,
        entity: String,
        detail: String,
    },

    #[error("technology library '{library}' invalid: {detail}")]
    InvalidTechnologyLibrary { library: String, detail: String },

    #[error("configuration error: {0}")]
    InvalidConfig(String),

    /// The external engine refused the network in its own consistency check
    #[error("engine rejected network: {0}")]
    EngineRejected(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl NetworkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NetworkError::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            NetworkError::DisallowedSource { .. } => ErrorKind::DisallowedSource,
            NetworkError::UnknownTechnologyType { .. } => ErrorKind::UnknownTechnologyType,
            NetworkError::MissingBusReference { .. } => ErrorKind::MissingBusReference,
            NetworkError::VoltageMismatch { .. } => ErrorKind::VoltageMismatch,
            NetworkError::ProfileIndexMismatch { .. } => ErrorKind::ProfileIndexMismatch,
            NetworkError::InvalidConstraintTarget { .. } => ErrorKind::InvalidConstraintTarget,
            NetworkError::DuplicateComponent { .. } => ErrorKind::DuplicateComponent,
            NetworkError::InvalidComponentData { .. } => ErrorKind::InvalidComponentData,
            NetworkError::InvalidTechnologyLibrary { .. } => ErrorKind::InvalidTechnologyLibrary,
            NetworkError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            NetworkError::EngineRejected(_) => ErrorKind::EngineRejected,
            NetworkError::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<std::io::Error> for NetworkError {
    fn from(err: std::io::Error) -> Self {
        NetworkError::Io(err.to_string())
    }
}

/// Convenience type alias for Results using NetworkError.
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Pipeline stage a [`BuildError`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStage {
    Initialize,
    TechnologyLibraries,
    Assembly,
    Constraints,
    Validation,
    Analysis,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BuildStage::Initialize => "initialize",
            BuildStage::TechnologyLibraries => "technology libraries",
            BuildStage::Assembly => "assembly",
            BuildStage::Constraints => "constraints",
            BuildStage::Validation => "validation",
            BuildStage::Analysis => "analysis",
        };
        f.write_str(label)
    }
}

/// The single error a caller of the build pipeline receives.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("network build failed during {stage}: {error}")]
pub struct BuildError {
    pub stage: BuildStage,
    #[source]
    pub error: NetworkError,
}

impl BuildError {
    pub fn new(stage: BuildStage, error: NetworkError) -> Self {
        Self { stage, error }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_entity() {
        let err = NetworkError::UnknownTechnologyType {
            class: ComponentClass::Generator,
            component: "G7".into(),
            tech_type: "UnknownGenType".into(),
        };
        let text = err.to_string();
        assert!(text.contains("Generator 'G7'"));
        assert!(text.contains("UnknownGenType"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: NetworkError = io_err.into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_build_error_carries_stage() {
        let err = BuildError::new(
            BuildStage::Assembly,
            NetworkError::DuplicateComponent {
                class: ComponentClass::Bus,
                name: "b1".into(),
            },
        );
        assert_eq!(err.kind(), ErrorKind::DuplicateComponent);
        assert!(err.to_string().starts_with("network build failed during assembly"));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> NetworkResult<()> {
            Err(NetworkError::InvalidConfig("test".into()))
        }

        fn outer() -> NetworkResult<()> {
            inner()?;
            Ok(())
        }

        assert!(matches!(outer(), Err(NetworkError::InvalidConfig(_))));
    }

    #[test]
    fn test_index_mismatch_display() {
        let mismatch = IndexMismatch::Length {
            expected: 24,
            found: 23,
        };
        assert_eq!(mismatch.to_string(), "length 23 does not match 24 snapshots");
    }
}
