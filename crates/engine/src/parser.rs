use crate::model::{
    FileReference, MembershipEntry, ObjectId, ParseMiss, PhaseMembership, Record, Registration,
    SectionSpan,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

pub const FILE_REFERENCE_SECTION: &str = "PBXFileReference";
pub const REGISTRATION_SECTION: &str = "PBXBuildFile";
const PHASE_SECTION_SUFFIX: &str = "BuildPhase";

static SECTION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*/\* (Begin|End) (\w+) section \*/\s*$").unwrap());
static ID_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[0-9A-F]{24}\b").unwrap());
static DEFINITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([0-9A-F]{24})(?: /\*.*?\*/)? = \{").unwrap());
static RECORD_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([0-9A-F]{24})(?: /\* (.*?) \*/)? = \{(.*)\};\s*$").unwrap()
});
static ISA: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bisa = (\w+);").unwrap());
static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\b(path|lastKnownFileType|explicitFileType) = ("(?:[^"\\]|\\.)*"|[^;]*);"#)
        .unwrap()
});
static FILE_REF_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bfileRef = ([0-9A-F]{24})\b").unwrap());
static OBJECT_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([0-9A-F]{24})(?: /\* (.*?) \*/)? = \{\s*$").unwrap());
static FILES_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*files = \(\s*$").unwrap());
static LIST_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\);\s*$").unwrap());
static OBJECT_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\};\s*$").unwrap());
// Ends in `,` right after the id or its comment, so never a record definition.
static LIST_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([0-9A-F]{24})(?: /\* (.*?) \*/)?,\s*$").unwrap());

/// Indexed object graph recovered from a project file
#[derive(Debug, Clone, Default)]
pub struct Store {
    /// Raw lines with their terminators
    lines: Vec<String>,

    records: HashMap<ObjectId, Record>,
    file_ref_order: Vec<ObjectId>,
    registration_order: Vec<ObjectId>,

    /// path -> file references, in appearance order
    refs_by_path: HashMap<String, Vec<ObjectId>>,
    path_order: Vec<String>,

    /// fileRef id -> registrations, in appearance order
    registrations_by_file: HashMap<ObjectId, Vec<ObjectId>>,

    phases: Vec<PhaseMembership>,
    /// registration id -> phases listing it
    phases_by_registration: HashMap<ObjectId, Vec<ObjectId>>,

    sections: HashMap<String, SectionSpan>,
    known_ids: HashSet<ObjectId>,
    defined_ids: HashSet<ObjectId>,
    misses: Vec<ParseMiss>,
}

struct OpenPhase {
    id: ObjectId,
    name: String,
    kind: String,
    header_line: usize,
    open_line: Option<usize>,
    entries: Vec<MembershipEntry>,
}

impl Store {
    /// Parse project text. Never fails: unmatched lines become [`ParseMiss`]es.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut store = Self {
            lines: text.split_inclusive('\n').map(str::to_string).collect(),
            ..Default::default()
        };

        let mut section: Option<(String, usize)> = None;
        let mut phase: Option<OpenPhase> = None;
        let mut in_list = false;

        for idx in 0..store.lines.len() {
            let line_no = idx + 1;
            let text = trim_terminator(&store.lines[idx]).to_string();

            for token in ID_TOKEN.find_iter(&text) {
                store.known_ids.insert(ObjectId::from_matched(token.as_str()));
            }
            if let Some(caps) = DEFINITION.captures(&text) {
                store.defined_ids.insert(ObjectId::from_matched(&caps[1]));
            }

            if let Some(caps) = SECTION_MARKER.captures(&text) {
                let name = caps[2].to_string();
                if &caps[1] == "Begin" {
                    section = Some((name, line_no));
                } else if let Some((open, begin_line)) = section.take() {
                    if open == name {
                        store.sections.insert(
                            name,
                            SectionSpan {
                                begin_line,
                                end_line: line_no,
                            },
                        );
                    } else {
                        log::debug!("line {line_no}: End {name} closes open section {open}");
                    }
                }
                phase = None;
                in_list = false;
                continue;
            }

            let Some((kind, _)) = section.as_ref() else {
                continue;
            };
            if text.trim().is_empty() {
                continue;
            }

            match kind.as_str() {
                FILE_REFERENCE_SECTION => match parse_file_reference(&text, line_no) {
                    Some(file) => store.insert_file_reference(file),
                    None => store.miss(line_no, kind.clone()),
                },
                REGISTRATION_SECTION => match parse_registration(&text, line_no) {
                    Some(reg) => store.insert_registration(reg),
                    None => store.miss(line_no, kind.clone()),
                },
                k if k.ends_with(PHASE_SECTION_SUFFIX) => {
                    if in_list {
                        if LIST_CLOSE.is_match(&text) {
                            in_list = false;
                            if let Some(open) = phase.take() {
                                store.finish_phase(open, line_no);
                            }
                        } else if let Some(caps) = LIST_ENTRY.captures(&text) {
                            if let Some(open) = phase.as_mut() {
                                open.entries.push(MembershipEntry {
                                    id: ObjectId::from_matched(&caps[1]),
                                    name: caps.get(2).map(|m| m.as_str().to_string()),
                                    line: line_no,
                                });
                            }
                        } else {
                            store.miss(line_no, kind.clone());
                        }
                    } else if let Some(caps) = OBJECT_OPEN.captures(&text) {
                        phase = Some(OpenPhase {
                            id: ObjectId::from_matched(&caps[1]),
                            name: caps
                                .get(2)
                                .map(|m| m.as_str().to_string())
                                .unwrap_or_default(),
                            kind: kind.clone(),
                            header_line: line_no,
                            open_line: None,
                            entries: Vec::new(),
                        });
                    } else if FILES_OPEN.is_match(&text) {
                        if let Some(open) = phase.as_mut() {
                            open.open_line = Some(line_no);
                            in_list = true;
                        }
                    } else if OBJECT_CLOSE.is_match(&text) {
                        phase = None;
                    }
                }
                _ => {}
            }
        }

        log::debug!(
            "Parsed store: {} file references, {} registrations, {} phases, {} misses",
            store.file_ref_order.len(),
            store.registration_order.len(),
            store.phases.len(),
            store.misses.len()
        );

        store
    }

    fn miss(&mut self, line: usize, section: String) {
        log::debug!("line {line}: no {section} record grammar match, skipped");
        self.misses.push(ParseMiss { line, section });
    }

    fn insert_file_reference(&mut self, file: FileReference) {
        if self.records.contains_key(&file.id) {
            log::warn!("line {}: identifier {} defined twice", file.line, file.id);
            return;
        }
        let id = file.id.clone();
        match self.refs_by_path.get_mut(&file.path) {
            Some(ids) => ids.push(id.clone()),
            None => {
                self.path_order.push(file.path.clone());
                self.refs_by_path.insert(file.path.clone(), vec![id.clone()]);
            }
        }
        self.file_ref_order.push(id.clone());
        self.records.insert(id, Record::FileReference(file));
    }

    fn insert_registration(&mut self, reg: Registration) {
        if self.records.contains_key(&reg.id) {
            log::warn!("line {}: identifier {} defined twice", reg.line, reg.id);
            return;
        }
        let id = reg.id.clone();
        self.registrations_by_file
            .entry(reg.file_ref.clone())
            .or_default()
            .push(id.clone());
        self.registration_order.push(id.clone());
        self.records.insert(id, Record::Registration(reg));
    }

    fn finish_phase(&mut self, open: OpenPhase, close_line: usize) {
        let Some(open_line) = open.open_line else {
            return;
        };
        for entry in &open.entries {
            let listed = self
                .phases_by_registration
                .entry(entry.id.clone())
                .or_default();
            if !listed.contains(&open.id) {
                listed.push(open.id.clone());
            }
        }
        self.phases.push(PhaseMembership {
            phase_id: open.id,
            name: open.name,
            kind: open.kind,
            header_line: open.header_line,
            open_line,
            close_line,
            entries: open.entries,
        });
    }

    /// Raw lines, terminators included
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Raw text of a 1-indexed line
    #[must_use]
    pub fn line_text(&self, line: usize) -> Option<&str> {
        line.checked_sub(1)
            .and_then(|idx| self.lines.get(idx))
            .map(String::as_str)
    }

    #[must_use]
    pub fn record(&self, id: &ObjectId) -> Option<&Record> {
        self.records.get(id)
    }

    #[must_use]
    pub fn file_reference(&self, id: &ObjectId) -> Option<&FileReference> {
        match self.records.get(id) {
            Some(Record::FileReference(file)) => Some(file),
            _ => None,
        }
    }

    #[must_use]
    pub fn registration(&self, id: &ObjectId) -> Option<&Registration> {
        match self.records.get(id) {
            Some(Record::Registration(reg)) => Some(reg),
            _ => None,
        }
    }

    /// File references in appearance order
    pub fn file_references(&self) -> impl Iterator<Item = &FileReference> {
        self.file_ref_order
            .iter()
            .filter_map(move |id| self.file_reference(id))
    }

    /// Registrations in appearance order
    pub fn registrations(&self) -> impl Iterator<Item = &Registration> {
        self.registration_order
            .iter()
            .filter_map(move |id| self.registration(id))
    }

    #[must_use]
    pub fn registrations_for(&self, file_ref: &ObjectId) -> &[ObjectId] {
        self.registrations_by_file
            .get(file_ref)
            .map_or(&[], Vec::as_slice)
    }

    /// File-ref groups keyed by the registration target, in appearance order
    pub fn registration_groups(&self) -> Vec<(&ObjectId, &[ObjectId])> {
        let mut seen = HashSet::new();
        self.registrations()
            .filter(|reg| seen.insert(&reg.file_ref))
            .map(|reg| (&reg.file_ref, self.registrations_for(&reg.file_ref)))
            .collect()
    }

    #[must_use]
    pub fn file_refs_with_path(&self, path: &str) -> &[ObjectId] {
        self.refs_by_path.get(path).map_or(&[], Vec::as_slice)
    }

    /// Path groups in order of first appearance
    pub fn path_groups(&self) -> impl Iterator<Item = (&str, &[ObjectId])> {
        self.path_order
            .iter()
            .map(move |path| (path.as_str(), self.file_refs_with_path(path)))
    }

    #[must_use]
    pub fn phases(&self) -> &[PhaseMembership] {
        &self.phases
    }

    #[must_use]
    pub fn phase(&self, phase_id: &ObjectId) -> Option<&PhaseMembership> {
        self.phases.iter().find(|phase| &phase.phase_id == phase_id)
    }

    /// Phase ids whose list mentions the registration
    #[must_use]
    pub fn phases_listing(&self, registration: &ObjectId) -> &[ObjectId] {
        self.phases_by_registration
            .get(registration)
            .map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn section(&self, name: &str) -> Option<SectionSpan> {
        self.sections.get(name).copied()
    }

    /// Every identifier-shaped token anywhere in the file
    #[must_use]
    pub fn known_ids(&self) -> &HashSet<ObjectId> {
        &self.known_ids
    }

    /// Whether any object (of any kind) is defined under this id
    #[must_use]
    pub fn is_defined(&self, id: &ObjectId) -> bool {
        self.defined_ids.contains(id)
    }

    #[must_use]
    pub fn misses(&self) -> &[ParseMiss] {
        &self.misses
    }
}

/// Line text without `\n` / `\r\n`
pub(crate) fn trim_terminator(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

fn parse_file_reference(text: &str, line: usize) -> Option<FileReference> {
    let caps = RECORD_LINE.captures(text)?;
    let body = caps.get(3)?.as_str();
    if !is_kind(body, FILE_REFERENCE_SECTION) {
        return None;
    }

    let mut path = None;
    let mut last_known = None;
    let mut explicit = None;
    for attr in ATTRIBUTE.captures_iter(body) {
        let value = unquote(attr[2].trim());
        match &attr[1] {
            "path" => path = Some(value),
            "lastKnownFileType" => last_known = Some(value),
            "explicitFileType" => explicit = Some(value),
            _ => {}
        }
    }
    let path = path?;

    Some(FileReference {
        id: ObjectId::from_matched(&caps[1]),
        name: caps
            .get(2)
            .map_or_else(|| path.clone(), |m| m.as_str().to_string()),
        path,
        file_type: last_known.or(explicit),
        line,
    })
}

fn parse_registration(text: &str, line: usize) -> Option<Registration> {
    let caps = RECORD_LINE.captures(text)?;
    let body = caps.get(3)?.as_str();
    if !is_kind(body, REGISTRATION_SECTION) {
        return None;
    }
    let file_ref = FILE_REF_FIELD.captures(body)?;

    let comment = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
    let (name, phase_label) = match comment.rsplit_once(" in ") {
        Some((name, phase)) => (name.to_string(), Some(phase.to_string())),
        None => (comment.to_string(), None),
    };

    Some(Registration {
        id: ObjectId::from_matched(&caps[1]),
        name,
        phase_label,
        file_ref: ObjectId::from_matched(&file_ref[1]),
        line,
    })
}

fn is_kind(body: &str, kind: &str) -> bool {
    ISA.captures(body).is_some_and(|isa| &isa[1] == kind)
}

fn unquote(value: &str) -> String {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}
