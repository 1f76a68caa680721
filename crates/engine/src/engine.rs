use crate::checker::{self, Finding};
use crate::config::RepairConfig;
use crate::error::{RepairError, Result};
use crate::ids::{IdAllocator, IdSource};
use crate::model::{ObjectId, PhaseMembership};
use crate::parser::Store;
use crate::patch::{write_atomic, ApplyOutcome, EditSet};
use crate::resolver::Resolver;
use crate::synth::{self, GapFill};
use pbxfix_protocol::ApplyMode;
use std::fs;
use std::path::Path;

/// Entry point for callers: detect, plan and apply against one project file
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: RepairConfig,
}

impl Engine {
    pub fn new(config: RepairConfig) -> Result<Self> {
        config.validate().map_err(RepairError::InvalidConfig)?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &RepairConfig {
        &self.config
    }

    /// Read and parse a project file
    pub fn load(path: impl AsRef<Path>) -> Result<Store> {
        let text = fs::read_to_string(path.as_ref())?;
        Ok(Store::parse(&text))
    }

    pub fn find_violations(&self, path: impl AsRef<Path>) -> Result<Vec<Finding>> {
        let store = Self::load(path)?;
        Ok(self.violations_in(&store))
    }

    #[must_use]
    pub fn violations_in(&self, store: &Store) -> Vec<Finding> {
        checker::check(store)
    }

    pub fn plan_removals(&self, path: impl AsRef<Path>) -> Result<EditSet> {
        let store = Self::load(path)?;
        Ok(self.removals_in(&store))
    }

    #[must_use]
    pub fn removals_in(&self, store: &Store) -> EditSet {
        let resolution = Resolver::new(store, &self.config).resolve();
        let edits = EditSet::from_resolution(store, &resolution);
        log::info!("Planned removal of {} lines", edits.removed_count());
        edits
    }

    pub fn plan_additions(&self, path: impl AsRef<Path>, phase_id: &str) -> Result<EditSet> {
        let phase_id = ObjectId::parse(phase_id)?;
        let store = Self::load(path)?;
        Ok(self.additions_in(&store, &phase_id)?.edits)
    }

    pub fn additions_in(&self, store: &Store, phase_id: &ObjectId) -> Result<GapFill> {
        let mut ids = IdAllocator::new(store.known_ids().clone(), self.config.max_id_attempts);
        self.additions_with(store, phase_id, &mut ids)
    }

    /// Gap fill with a caller-provided identifier allocator
    pub fn additions_with<S: IdSource>(
        &self,
        store: &Store,
        phase_id: &ObjectId,
        ids: &mut IdAllocator<S>,
    ) -> Result<GapFill> {
        synth::synthesize(store, &self.config, phase_id, ids)
    }

    /// Removals and gap fill for one phase, planned against the same numbering
    pub fn plan_repair(&self, path: impl AsRef<Path>, phase_id: &str) -> Result<EditSet> {
        let phase_id = ObjectId::parse(phase_id)?;
        let store = Self::load(path)?;
        self.repair_in(&store, &phase_id)
    }

    pub fn repair_in(&self, store: &Store, phase_id: &ObjectId) -> Result<EditSet> {
        let additions = self.additions_in(store, phase_id)?;
        let mut edits = self.removals_in(store);
        edits.merge(additions.edits);
        Ok(edits)
    }

    pub fn phases(&self, path: impl AsRef<Path>) -> Result<Vec<PhaseMembership>> {
        Ok(Self::load(path)?.phases().to_vec())
    }

    /// Apply in place (all-or-nothing) or describe the edits without writing
    pub fn apply_edits(
        &self,
        path: impl AsRef<Path>,
        edits: &EditSet,
        mode: ApplyMode,
    ) -> Result<ApplyOutcome> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let lines: Vec<String> = text.split_inclusive('\n').map(str::to_string).collect();

        let mut outcome = ApplyOutcome {
            mode,
            removed_lines: edits.removed_count(),
            inserted_lines: edits.inserted_count(),
            written: false,
            edits: edits.review_edits(),
        };

        match mode {
            ApplyMode::Report => edits.verify(&lines)?,
            ApplyMode::InPlace => {
                if edits.is_empty() {
                    log::info!("Nothing to change in {}", path.display());
                    return Ok(outcome);
                }
                let rewritten = edits.apply_to_lines(&lines)?;
                write_atomic(path, &rewritten.concat())?;
                outcome.written = true;
                log::info!(
                    "Rewrote {}: -{} +{} lines",
                    path.display(),
                    outcome.removed_lines,
                    outcome.inserted_lines
                );
            }
        }

        Ok(outcome)
    }
}
