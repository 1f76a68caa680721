use crate::config::{MembershipInsertion, RepairConfig};
use crate::error::{RepairError, Result};
use crate::ids::{IdAllocator, IdSource};
use crate::model::{FileReference, ObjectId, PhaseMembership};
use crate::parser::{Store, REGISTRATION_SECTION};
use crate::patch::{Anchor, EditSet};
use crate::resolver::superseded_file_references;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const DEFAULT_PHASE_LABEL: &str = "Sources";

/// A file newly linked into the target phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedFile {
    pub file_ref: ObjectId,
    pub name: String,
    pub registration: ObjectId,
}

#[derive(Debug, Clone, Default)]
pub struct GapFill {
    pub linked: Vec<LinkedFile>,
    pub edits: EditSet,
}

/// File references with no build file listed in `phase`.
///
/// A build file listed only in some other phase does not count: each phase
/// linkage gets its own build file.
pub fn unlinked_files<'a>(
    store: &'a Store,
    config: &RepairConfig,
    phase: &PhaseMembership,
) -> Vec<&'a FileReference> {
    let listed: HashSet<&ObjectId> = phase.entry_ids().collect();
    let superseded = superseded_file_references(store, config.canonical_fallback);

    store
        .file_references()
        .filter(|file| config.is_source_type(file.file_type.as_deref()))
        .filter(|file| !superseded.contains(&file.id))
        .filter(|file| {
            !store
                .registrations_for(&file.id)
                .iter()
                .any(|reg| listed.contains(reg))
        })
        .collect()
}

/// Plan new build files and list entries closing the gap for one phase
pub fn synthesize<S: IdSource>(
    store: &Store,
    config: &RepairConfig,
    phase_id: &ObjectId,
    ids: &mut IdAllocator<S>,
) -> Result<GapFill> {
    let phase = store
        .phase(phase_id)
        .ok_or_else(|| RepairError::missing_phase(phase_id.as_str()))?;
    let section = store
        .section(REGISTRATION_SECTION)
        .ok_or_else(|| RepairError::missing_section(REGISTRATION_SECTION))?;

    let unlinked = unlinked_files(store, config, phase);
    if unlinked.is_empty() {
        log::info!("Phase {phase_id} ({}) already links every file", phase.name);
        return Ok(GapFill::default());
    }

    let label = if phase.name.is_empty() {
        DEFAULT_PHASE_LABEL
    } else {
        phase.name.as_str()
    };
    let record_indent = store
        .registrations()
        .next()
        .and_then(|reg| store.line_text(reg.line))
        .map_or_else(|| "\t\t".to_string(), indent_of);
    let entry_indent = phase
        .entries
        .first()
        .and_then(|entry| store.line_text(entry.line))
        .map_or_else(
            || format!("{}\t", store.line_text(phase.open_line).map_or("\t\t\t", indent_of_str)),
            indent_of,
        );

    let mut fill = GapFill::default();
    let mut records = Vec::with_capacity(unlinked.len());
    let mut entries = Vec::with_capacity(unlinked.len());
    for file in unlinked {
        let reg_id = ids.allocate()?;
        records.push(format!(
            "{record_indent}{reg_id} /* {name} in {label} */ = {{isa = PBXBuildFile; fileRef = {file_id} /* {name} */; }};",
            name = file.name,
            file_id = file.id,
        ));
        entries.push(format!("{entry_indent}{reg_id} /* {} in {label} */,", file.name));
        log::debug!("Linking {} ({}) as {reg_id}", file.name, file.id);
        fill.linked.push(LinkedFile {
            file_ref: file.id.clone(),
            name: file.name.clone(),
            registration: reg_id,
        });
    }

    let end_text = store.line_text(section.end_line).unwrap_or_default();
    fill.edits.insert(Anchor::Before(section.end_line), end_text, records);

    let anchor = match config.membership_insertion {
        MembershipInsertion::Append => Anchor::Before(phase.close_line),
        MembershipInsertion::AfterOpening => Anchor::After(phase.open_line),
    };
    let anchor_text = store.line_text(anchor.line()).unwrap_or_default();
    fill.edits.insert(anchor, anchor_text, entries);

    log::info!(
        "Phase {phase_id} ({}): {} unlinked files",
        phase.name,
        fill.linked.len()
    );
    Ok(fill)
}

fn indent_of(text: &str) -> String {
    indent_of_str(text).to_string()
}

fn indent_of_str(text: &str) -> &str {
    let trimmed = text.trim_start_matches([' ', '\t']);
    &text[..text.len() - trimmed.len()]
}
