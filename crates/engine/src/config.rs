use serde::{Deserialize, Serialize};

/// Policy knobs for detection, resolution and gap filling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    /// What to do with the non-canonical members of a duplicate-path group
    pub duplicate_file_refs: DuplicateFileRefPolicy,

    /// Canonical pick for a duplicate-path group where no member is registered
    pub canonical_fallback: CanonicalFallback,

    /// Where new membership entries go inside the target phase list
    pub membership_insertion: MembershipInsertion,

    /// `lastKnownFileType` values eligible for gap filling (empty = every file)
    pub source_file_types: Vec<String>,

    /// Identifier draws before giving up
    pub max_id_attempts: usize,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            duplicate_file_refs: DuplicateFileRefPolicy::Retain,
            canonical_fallback: CanonicalFallback::FirstInFile,
            membership_insertion: MembershipInsertion::Append,
            source_file_types: [
                "sourcecode.swift",
                "sourcecode.c.objc",
                "sourcecode.c.c",
                "sourcecode.cpp.cpp",
                "sourcecode.cpp.objcpp",
                "sourcecode.metal",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            max_id_attempts: 64,
        }
    }
}

impl RepairConfig {
    /// Also drop the lines of duplicate file references, not just their dependents
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            duplicate_file_refs: DuplicateFileRefPolicy::Remove,
            ..Default::default()
        }
    }

    /// Swift-only projects
    #[must_use]
    pub fn swift_only() -> Self {
        Self {
            source_file_types: vec!["sourcecode.swift".to_string()],
            ..Default::default()
        }
    }

    /// Whether a file reference with this type takes part in gap filling
    #[must_use]
    pub fn is_source_type(&self, file_type: Option<&str>) -> bool {
        if self.source_file_types.is_empty() {
            return true;
        }
        file_type.is_some_and(|ty| self.source_file_types.iter().any(|known| known == ty))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_id_attempts == 0 {
            return Err("max_id_attempts must be > 0".to_string());
        }

        if let Some(blank) = self
            .source_file_types
            .iter()
            .position(|ty| ty.trim().is_empty())
        {
            return Err(format!("source_file_types[{blank}] is empty"));
        }

        Ok(())
    }
}

/// Handling of file references that share a path with the canonical one.
///
/// Their dependent registrations and membership entries are removed under
/// both policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateFileRefPolicy {
    /// Report only; other object kinds may still point at the record
    #[default]
    Retain,

    /// Remove the record line as well
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalFallback {
    #[default]
    FirstInFile,
    LastInFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MembershipInsertion {
    /// Before the closing `);` of the list
    #[default]
    Append,

    /// Right after the opening `files = (`
    AfterOpening,
}
