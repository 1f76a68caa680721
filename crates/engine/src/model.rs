use crate::error::{RepairError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of an object identifier in hex digits
pub const ID_LEN: usize = 24;

/// Opaque 24-digit uppercase hex primary key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if Self::is_valid(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(RepairError::InvalidIdentifier(raw.to_string()))
        }
    }

    /// Callers must have matched the text against the identifier grammar
    pub(crate) fn from_matched(raw: &str) -> Self {
        debug_assert!(Self::is_valid(raw), "not an object id: {raw}");
        Self(raw.to_string())
    }

    #[must_use]
    pub fn is_valid(raw: &str) -> bool {
        raw.len() == ID_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `PBXFileReference`: a file known to the project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReference {
    pub id: ObjectId,
    /// Display name from the trailing comment
    pub name: String,
    /// `path` attribute, quotes stripped
    pub path: String,
    /// `lastKnownFileType` or `explicitFileType`
    pub file_type: Option<String>,
    /// Line of the definition (1-indexed)
    pub line: usize,
}

/// `PBXBuildFile`: registers a file reference as a compile unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: ObjectId,
    pub name: String,
    /// Phase label from `/* Foo.swift in Sources */`
    pub phase_label: Option<String>,
    pub file_ref: ObjectId,
    pub line: usize,
}

/// One line of a phase `files = ( ... );` list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipEntry {
    pub id: ObjectId,
    pub name: Option<String>,
    pub line: usize,
}

/// Ordered membership list owned by one build phase object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseMembership {
    pub phase_id: ObjectId,
    /// Comment name of the phase object (`Sources`, `Frameworks`, ...)
    pub name: String,
    /// Section the phase lives in (`PBXSourcesBuildPhase`, ...)
    pub kind: String,
    pub header_line: usize,
    /// Line of `files = (`
    pub open_line: usize,
    /// Line of the closing `);`
    pub close_line: usize,
    pub entries: Vec<MembershipEntry>,
}

impl PhaseMembership {
    #[must_use]
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.entries.iter().any(|entry| &entry.id == id)
    }

    pub fn entry_ids(&self) -> impl Iterator<Item = &ObjectId> {
        self.entries.iter().map(|entry| &entry.id)
    }
}

/// A parsed record, tagged by kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    FileReference(FileReference),
    Registration(Registration),
}

impl Record {
    #[must_use]
    pub const fn id(&self) -> &ObjectId {
        match self {
            Self::FileReference(file) => &file.id,
            Self::Registration(reg) => &reg.id,
        }
    }

    #[must_use]
    pub const fn line(&self) -> usize {
        match self {
            Self::FileReference(file) => file.line,
            Self::Registration(reg) => reg.line,
        }
    }
}

/// Line span of a `Begin X section` / `End X section` pair (1-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSpan {
    pub begin_line: usize,
    pub end_line: usize,
}

/// A line inside a modeled section that did not match its record grammar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseMiss {
    pub line: usize,
    pub section: String,
}
