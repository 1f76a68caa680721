use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, RepairError>;

/// Errors that abort an engine operation
#[derive(Error, Debug)]
pub enum RepairError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The target build phase is not present in the project
    #[error("Build phase {phase_id} not found (or it has no files list)")]
    MissingPhase { phase_id: String },

    /// A section needed to anchor insertions is not present
    #[error("Section {section} not found")]
    MissingSection { section: String },

    /// The file changed since the edit set was planned
    #[error("Edit target drifted at line {line}: expected {expected:?}, found {found:?}")]
    Drift {
        line: usize,
        expected: String,
        found: String,
    },

    /// The identifier source kept producing taken identifiers
    #[error("No free identifier after {attempts} attempts")]
    IdentifierExhausted { attempts: usize },

    /// A caller-supplied identifier is not 24 uppercase hex digits
    #[error("Invalid object identifier: {0}")]
    InvalidIdentifier(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RepairError {
    /// Stable machine-readable code for JSON error envelopes
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::MissingPhase { .. } => "missing_phase",
            Self::MissingSection { .. } => "missing_section",
            Self::Drift { .. } => "drift",
            Self::IdentifierExhausted { .. } => "identifier_exhausted",
            Self::InvalidIdentifier(_) => "invalid_identifier",
            Self::InvalidConfig(_) => "invalid_config",
        }
    }

    pub fn missing_phase(phase_id: impl Into<String>) -> Self {
        Self::MissingPhase {
            phase_id: phase_id.into(),
        }
    }

    pub fn missing_section(section: impl Into<String>) -> Self {
        Self::MissingSection {
            section: section.into(),
        }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
