//! # pbxfix engine
//!
//! Structural repair for Xcode `project.pbxproj` files: duplicate build-file
//! registrations and source files missing from a compile phase.
//!
//! ## Architecture
//!
//! ```text
//! project.pbxproj lines
//!     │
//!     ├──> Store Parser (section-scoped, tolerant)
//!     │      ├─ PBXFileReference / PBXBuildFile records with line numbers
//!     │      ├─ path → file refs, file ref → build files
//!     │      └─ *BuildPhase `files = ( ... );` lists
//!     │
//!     ├──> Checker ──> Findings (duplicates, dangling ids)
//!     │
//!     ├──> Resolver ──> canonical picks + cascading removals
//!     │
//!     ├──> Synthesizer ──> new build files + list entries for one phase
//!     │
//!     └──> Patch ──> single-pass rewrite | review edit list
//! ```
//!
//! ## Example
//!
//! ```rust
//! use pbxfix_engine::{EditSet, Engine, Store};
//!
//! let text = "/* Begin PBXBuildFile section */\n/* End PBXBuildFile section */\n";
//! let store = Store::parse(text);
//! let engine = Engine::default();
//!
//! assert!(engine.violations_in(&store).is_empty());
//! let edits: EditSet = engine.removals_in(&store);
//! assert!(edits.is_empty());
//! ```

mod checker;
mod config;
mod engine;
mod error;
mod ids;
mod model;
mod parser;
mod patch;
mod resolver;
mod synth;

pub use checker::{check, Finding};
pub use config::{CanonicalFallback, DuplicateFileRefPolicy, MembershipInsertion, RepairConfig};
pub use engine::Engine;
pub use error::{RepairError, Result};
pub use ids::{IdAllocator, IdSource, RandomIdSource};
pub use model::{
    FileReference, MembershipEntry, ObjectId, ParseMiss, PhaseMembership, Record, Registration,
    SectionSpan, ID_LEN,
};
pub use parser::{Store, FILE_REFERENCE_SECTION, REGISTRATION_SECTION};
pub use patch::{display_line, write_atomic, Anchor, ApplyOutcome, EditSet, Insertion, Removal};
pub use pbxfix_protocol::{ApplyMode, FindingKind, ReviewEdit, RunSummary};
pub use resolver::{
    canonical_file_reference, phase_ownership, superseded_file_references, PhaseOwnership,
    RemovalDirective, RemovalReason, Resolution, Resolver,
};
pub use synth::{synthesize, unlinked_files, GapFill, LinkedFile};
