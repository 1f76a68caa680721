use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const REVIEW_SCHEMA_VERSION: u32 = 1;

/// One independently reviewable edit against the original project file.
///
/// Field names follow the edit-list format consumed by external review
/// tooling, hence the PascalCase keys.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub struct ReviewEdit {
    /// First original line covered by the edit (1-indexed)
    pub start_line: usize,
    /// Last original line covered by the edit (1-indexed, inclusive)
    pub end_line: usize,
    /// Exact original text of the covered lines, used to detect drift
    pub target_content: String,
    /// Text that replaces the covered lines (empty for a pure deletion)
    pub replacement_content: String,
    #[serde(default)]
    pub allow_multiple: bool,
}

impl ReviewEdit {
    #[must_use]
    pub fn is_deletion(&self) -> bool {
        self.replacement_content.is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    DuplicateFileReference,
    DuplicateRegistration,
    DuplicateMembership,
    DanglingMembership,
    DanglingFileReference,
}

impl FindingKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DuplicateFileReference => "duplicate_file_reference",
            Self::DuplicateRegistration => "duplicate_registration",
            Self::DuplicateMembership => "duplicate_membership",
            Self::DanglingMembership => "dangling_membership",
            Self::DanglingFileReference => "dangling_file_reference",
        }
    }

    /// Dangling findings need a human decision; the engine never edits them.
    #[must_use]
    pub const fn is_auto_repaired(self) -> bool {
        !matches!(self, Self::DanglingMembership | Self::DanglingFileReference)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct FindingRecord {
    pub kind: FindingKind,
    pub ids: Vec<String>,
    /// Lines of every record involved (1-indexed)
    pub lines: Vec<usize>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApplyMode {
    InPlace,
    Report,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct RunSummary {
    pub mode: ApplyMode,
    pub removed_lines: usize,
    pub inserted_lines: usize,
    pub written: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub hint: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct ReviewDocument {
    pub schema_version: u32,
    pub summary: RunSummary,
    pub edits: Vec<ReviewEdit>,
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}

pub fn review_edit_schema() -> Result<String> {
    let schema = schemars::schema_for!(ReviewEdit);
    serde_json::to_string_pretty(&schema).map_err(Into::into)
}
