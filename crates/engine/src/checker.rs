use crate::model::ObjectId;
use crate::parser::Store;
use crate::resolver::phase_ownership;
use pbxfix_protocol::{FindingKind, FindingRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One invariant violation, anchored to the lines of every record involved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub ids: Vec<ObjectId>,
    pub lines: Vec<usize>,
    pub message: String,
}

impl Finding {
    #[must_use]
    pub fn first_line(&self) -> usize {
        self.lines.iter().copied().min().unwrap_or(0)
    }

    #[must_use]
    pub fn to_record(&self) -> FindingRecord {
        FindingRecord {
            kind: self.kind,
            ids: self.ids.iter().map(ToString::to_string).collect(),
            lines: self.lines.clone(),
            message: self.message.clone(),
        }
    }
}

/// Walk the graph and report every violation, ordered by first line
#[must_use]
pub fn check(store: &Store) -> Vec<Finding> {
    let mut findings = Vec::new();
    duplicate_file_references(store, &mut findings);
    duplicate_registrations(store, &mut findings);
    duplicate_memberships(store, &mut findings);
    dangling_references(store, &mut findings);

    findings.sort_by_key(Finding::first_line);
    findings
}

fn duplicate_file_references(store: &Store, out: &mut Vec<Finding>) {
    for (path, ids) in store.path_groups() {
        if ids.len() < 2 {
            continue;
        }
        out.push(Finding {
            kind: FindingKind::DuplicateFileReference,
            ids: ids.to_vec(),
            lines: ids
                .iter()
                .filter_map(|id| store.file_reference(id))
                .map(|file| file.line)
                .collect(),
            message: format!("{} file references share path '{path}'", ids.len()),
        });
    }
}

/// Build files of one file reference conflict when one of them links the
/// file into no phase its siblings have not already covered.
fn duplicate_registrations(store: &Store, out: &mut Vec<Finding>) {
    for (file_ref, ids) in store.registration_groups() {
        if ids.len() < 2 {
            continue;
        }
        let registrations: Vec<&ObjectId> = ids.iter().collect();
        let redundant = phase_ownership(store, &registrations)
            .is_some_and(|ownership| !ownership.redundant.is_empty());
        if !redundant {
            continue;
        }
        out.push(Finding {
            kind: FindingKind::DuplicateRegistration,
            ids: ids.to_vec(),
            lines: ids
                .iter()
                .filter_map(|id| store.registration(id))
                .map(|reg| reg.line)
                .collect(),
            message: format!("{} build files register file reference {file_ref}", ids.len()),
        });
    }
}

fn duplicate_memberships(store: &Store, out: &mut Vec<Finding>) {
    for phase in store.phases() {
        let mut order: Vec<&ObjectId> = Vec::new();
        let mut by_file: HashMap<&ObjectId, Vec<usize>> = HashMap::new();
        for (idx, entry) in phase.entries.iter().enumerate() {
            let key = store
                .registration(&entry.id)
                .map_or(&entry.id, |reg| &reg.file_ref);
            let slot = by_file.entry(key).or_default();
            if slot.is_empty() {
                order.push(key);
            }
            slot.push(idx);
        }

        for key in order {
            let idxs = &by_file[key];
            if idxs.len() < 2 {
                continue;
            }
            let entries: Vec<_> = idxs.iter().map(|&i| &phase.entries[i]).collect();
            out.push(Finding {
                kind: FindingKind::DuplicateMembership,
                ids: entries.iter().map(|entry| entry.id.clone()).collect(),
                lines: entries.iter().map(|entry| entry.line).collect(),
                message: format!(
                    "phase {} ({}) lists the same file {} times",
                    phase.phase_id,
                    phase.name,
                    entries.len()
                ),
            });
        }
    }
}

fn dangling_references(store: &Store, out: &mut Vec<Finding>) {
    for phase in store.phases() {
        for entry in &phase.entries {
            if store.is_defined(&entry.id) {
                continue;
            }
            log::warn!(
                "line {}: phase {} lists undefined object {}",
                entry.line,
                phase.phase_id,
                entry.id
            );
            out.push(Finding {
                kind: FindingKind::DanglingMembership,
                ids: vec![entry.id.clone()],
                lines: vec![entry.line],
                message: format!(
                    "phase {} ({}) lists {} which is not defined",
                    phase.phase_id, phase.name, entry.id
                ),
            });
        }
    }

    for reg in store.registrations() {
        if store.is_defined(&reg.file_ref) {
            continue;
        }
        log::warn!(
            "line {}: build file {} points at undefined file reference {}",
            reg.line,
            reg.id,
            reg.file_ref
        );
        out.push(Finding {
            kind: FindingKind::DanglingFileReference,
            ids: vec![reg.id.clone(), reg.file_ref.clone()],
            lines: vec![reg.line],
            message: format!(
                "build file {} references {} which is not defined",
                reg.id, reg.file_ref
            ),
        });
    }
}
