//! Canonical picks for conflicting records and the cascade of removals
//! they imply.
//!
//! Ownership runs file reference → build file → list entry. Removing a
//! build file always removes every list entry naming it, in every phase.

use crate::config::{CanonicalFallback, DuplicateFileRefPolicy, RepairConfig};
use crate::model::ObjectId;
use crate::parser::Store;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RemovalReason {
    DuplicateFileReference {
        id: ObjectId,
        canonical: ObjectId,
    },
    RegistrationOfDuplicateFileReference {
        id: ObjectId,
        file_ref: ObjectId,
    },
    DuplicateRegistration {
        id: ObjectId,
        kept: ObjectId,
    },
    MembershipOfRemovedRegistration {
        id: ObjectId,
        phase_id: ObjectId,
    },
    DuplicateMembership {
        id: ObjectId,
        phase_id: ObjectId,
    },
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateFileReference { id, canonical } => {
                write!(f, "Duplicate FileRef {id} (keeping {canonical})")
            }
            Self::RegistrationOfDuplicateFileReference { id, file_ref } => {
                write!(f, "BuildFile {id} for duplicate FileRef {file_ref}")
            }
            Self::DuplicateRegistration { id, kept } => {
                write!(f, "Duplicate BuildFile {id} (keeping {kept})")
            }
            Self::MembershipOfRemovedRegistration { id, phase_id } => {
                write!(f, "Phase {phase_id} entry for removed BuildFile {id}")
            }
            Self::DuplicateMembership { id, phase_id } => {
                write!(f, "Repeated phase {phase_id} entry {id}")
            }
        }
    }
}

/// Drop one original line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalDirective {
    pub line: usize,
    pub reason: RemovalReason,
}

/// Outcome of canonicalization over a whole store
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Non-canonical members of duplicate-path groups
    pub superseded: HashSet<ObjectId>,
    pub removed_registrations: HashSet<ObjectId>,
    directives: BTreeMap<usize, RemovalDirective>,
}

impl Resolution {
    /// Directives ordered by line, one per line
    pub fn directives(&self) -> impl Iterator<Item = &RemovalDirective> {
        self.directives.values()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    fn push(&mut self, line: usize, reason: RemovalReason) {
        self.directives
            .entry(line)
            .or_insert(RemovalDirective { line, reason });
    }
}

/// Pick the surviving file reference of a duplicate-path group.
///
/// The first member with a build file wins; without one the configured
/// fallback decides.
#[must_use]
pub fn canonical_file_reference<'a>(
    store: &Store,
    group: &'a [ObjectId],
    fallback: CanonicalFallback,
) -> Option<&'a ObjectId> {
    group
        .iter()
        .find(|id| !store.registrations_for(id).is_empty())
        .or_else(|| match fallback {
            CanonicalFallback::FirstInFile => group.first(),
            CanonicalFallback::LastInFile => group.last(),
        })
}

/// Non-canonical file references across every duplicate-path group
#[must_use]
pub fn superseded_file_references(
    store: &Store,
    fallback: CanonicalFallback,
) -> HashSet<ObjectId> {
    let mut superseded = HashSet::new();
    for (_, group) in store.path_groups() {
        if group.len() < 2 {
            continue;
        }
        if let Some(keep) = canonical_file_reference(store, group, fallback) {
            superseded.extend(group.iter().filter(|id| *id != keep).cloned());
        }
    }
    superseded
}

/// Phase-scoped ownership among the build files of one file reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseOwnership<'a> {
    pub canonical: &'a ObjectId,
    /// (phase, owning build file) in claim order
    pub owners: Vec<(&'a ObjectId, &'a ObjectId)>,
    /// Build files that own no phase while a sibling survives
    pub redundant: Vec<&'a ObjectId>,
}

/// Assign every phase listing one of `registrations` to a single owner.
///
/// The canonical build file is the first one listed in any phase, or the
/// first one when none is listed; it claims its phases before the others
/// claim theirs in appearance order. Every other build file left without a
/// phase is redundant.
pub fn phase_ownership<'a>(
    store: &'a Store,
    registrations: &[&'a ObjectId],
) -> Option<PhaseOwnership<'a>> {
    let canonical = registrations
        .iter()
        .copied()
        .find(|id| !store.phases_listing(id).is_empty())
        .or_else(|| registrations.first().copied())?;

    let mut ownership = PhaseOwnership {
        canonical,
        owners: Vec::new(),
        redundant: Vec::new(),
    };
    let mut claimed_phases: HashSet<&ObjectId> = HashSet::new();
    let order = std::iter::once(canonical).chain(
        registrations
            .iter()
            .copied()
            .filter(|id| *id != canonical),
    );
    for reg_id in order {
        let mut claimed = false;
        for phase_id in store.phases_listing(reg_id) {
            if claimed_phases.insert(phase_id) {
                ownership.owners.push((phase_id, reg_id));
                claimed = true;
            }
        }
        if !claimed && reg_id != canonical {
            ownership.redundant.push(reg_id);
        }
    }
    Some(ownership)
}

pub struct Resolver<'a> {
    store: &'a Store,
    config: &'a RepairConfig,
}

impl<'a> Resolver<'a> {
    #[must_use]
    pub const fn new(store: &'a Store, config: &'a RepairConfig) -> Self {
        Self { store, config }
    }

    pub fn resolve(&self) -> Resolution {
        let mut resolution = Resolution::default();
        self.resolve_file_references(&mut resolution);
        let owners = self.resolve_registrations(&mut resolution);
        self.resolve_memberships(&owners, &mut resolution);

        log::debug!(
            "Resolution: {} superseded file refs, {} removed build files, {} lines",
            resolution.superseded.len(),
            resolution.removed_registrations.len(),
            resolution.directives.len()
        );
        resolution
    }

    fn resolve_file_references(&self, out: &mut Resolution) {
        for (path, group) in self.store.path_groups() {
            if group.len() < 2 {
                continue;
            }
            let Some(keep) =
                canonical_file_reference(self.store, group, self.config.canonical_fallback)
            else {
                continue;
            };
            log::debug!("path '{path}': keeping file reference {keep}");

            for id in group.iter().filter(|id| *id != keep) {
                out.superseded.insert(id.clone());
                if self.config.duplicate_file_refs == DuplicateFileRefPolicy::Remove {
                    if let Some(file) = self.store.file_reference(id) {
                        out.push(
                            file.line,
                            RemovalReason::DuplicateFileReference {
                                id: id.clone(),
                                canonical: keep.clone(),
                            },
                        );
                    }
                }
                for reg_id in self.store.registrations_for(id) {
                    self.remove_registration(
                        reg_id,
                        RemovalReason::RegistrationOfDuplicateFileReference {
                            id: reg_id.clone(),
                            file_ref: id.clone(),
                        },
                        out,
                    );
                }
            }
        }
    }

    /// Decide which build files survive; returns the owner of every
    /// (file reference, phase) slot.
    fn resolve_registrations(
        &self,
        out: &mut Resolution,
    ) -> HashMap<(ObjectId, ObjectId), ObjectId> {
        let mut owners = HashMap::new();

        for (file_ref, group) in self.store.registration_groups() {
            let survivors: Vec<&ObjectId> = group
                .iter()
                .filter(|id| !out.removed_registrations.contains(*id))
                .collect();
            let Some(ownership) = phase_ownership(self.store, &survivors) else {
                continue;
            };
            for (phase_id, reg_id) in &ownership.owners {
                owners.insert((file_ref.clone(), (*phase_id).clone()), (*reg_id).clone());
            }
            for reg_id in ownership.redundant {
                self.remove_registration(
                    reg_id,
                    RemovalReason::DuplicateRegistration {
                        id: reg_id.clone(),
                        kept: ownership.canonical.clone(),
                    },
                    out,
                );
            }
        }

        owners
    }

    fn resolve_memberships(
        &self,
        owners: &HashMap<(ObjectId, ObjectId), ObjectId>,
        out: &mut Resolution,
    ) {
        for phase in self.store.phases() {
            let mut seen = HashSet::new();
            for entry in &phase.entries {
                let reason = if out.removed_registrations.contains(&entry.id) {
                    Some(RemovalReason::MembershipOfRemovedRegistration {
                        id: entry.id.clone(),
                        phase_id: phase.phase_id.clone(),
                    })
                } else if !seen.insert(&entry.id) {
                    Some(RemovalReason::DuplicateMembership {
                        id: entry.id.clone(),
                        phase_id: phase.phase_id.clone(),
                    })
                } else {
                    self.store.registration(&entry.id).and_then(|reg| {
                        let slot = (reg.file_ref.clone(), phase.phase_id.clone());
                        (owners.get(&slot) != Some(&entry.id)).then(|| {
                            RemovalReason::DuplicateMembership {
                                id: entry.id.clone(),
                                phase_id: phase.phase_id.clone(),
                            }
                        })
                    })
                };

                if let Some(reason) = reason {
                    out.push(entry.line, reason);
                }
            }
        }
    }

    fn remove_registration(&self, id: &ObjectId, reason: RemovalReason, out: &mut Resolution) {
        if !out.removed_registrations.insert(id.clone()) {
            return;
        }
        if let Some(reg) = self.store.registration(id) {
            out.push(reg.line, reason);
        }
    }
}
