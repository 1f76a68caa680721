use crate::error::{RepairError, Result};
use crate::parser::{trim_terminator, Store};
use crate::resolver::Resolution;
use pbxfix_protocol::{ApplyMode, ReviewEdit, RunSummary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Position of an insertion, relative to an original line (1-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "at", content = "line", rename_all = "snake_case")]
pub enum Anchor {
    Before(usize),
    After(usize),
}

impl Anchor {
    #[must_use]
    pub const fn line(self) -> usize {
        match self {
            Self::Before(line) | Self::After(line) => line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Removal {
    pub line: usize,
    /// Original text, terminator included
    pub text: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insertion {
    pub anchor: Anchor,
    /// Original text of the anchor line, terminator included
    pub anchor_text: String,
    /// New lines without terminators, in output order
    pub lines: Vec<String>,
}

/// Removals and insertions, all positioned against the same pre-edit numbering
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditSet {
    removals: BTreeMap<usize, Removal>,
    insertions: Vec<Insertion>,
}

impl EditSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removal directives materialized against the store's lines
    #[must_use]
    pub fn from_resolution(store: &Store, resolution: &Resolution) -> Self {
        let mut edits = Self::new();
        for directive in resolution.directives() {
            if let Some(text) = store.line_text(directive.line) {
                edits.remove(directive.line, text, directive.reason.to_string());
            }
        }
        edits
    }

    /// First reason wins when a line is removed twice
    pub fn remove(&mut self, line: usize, text: &str, reason: impl Into<String>) {
        self.removals.entry(line).or_insert_with(|| Removal {
            line,
            text: text.to_string(),
            reason: reason.into(),
        });
    }

    /// Lines pushed at the same anchor keep their push order
    pub fn insert(&mut self, anchor: Anchor, anchor_text: &str, lines: Vec<String>) {
        if lines.is_empty() {
            return;
        }
        match self.insertions.iter_mut().find(|ins| ins.anchor == anchor) {
            Some(existing) => existing.lines.extend(lines),
            None => self.insertions.push(Insertion {
                anchor,
                anchor_text: anchor_text.to_string(),
                lines,
            }),
        }
    }

    /// Combine two plans computed against the same source
    pub fn merge(&mut self, other: Self) {
        for (line, removal) in other.removals {
            self.removals.entry(line).or_insert(removal);
        }
        for insertion in other.insertions {
            self.insert(insertion.anchor, &insertion.anchor_text, insertion.lines);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.insertions.is_empty()
    }

    pub fn removals(&self) -> impl Iterator<Item = &Removal> {
        self.removals.values()
    }

    #[must_use]
    pub fn insertions(&self) -> &[Insertion] {
        &self.insertions
    }

    #[must_use]
    pub fn removed_count(&self) -> usize {
        self.removals.len()
    }

    #[must_use]
    pub fn inserted_count(&self) -> usize {
        self.insertions.iter().map(|ins| ins.lines.len()).sum()
    }

    /// Fail with [`RepairError::Drift`] unless every target line still holds
    /// the text it was planned against
    pub fn verify(&self, lines: &[String]) -> Result<()> {
        let targets = self
            .removals
            .values()
            .map(|removal| (removal.line, removal.text.as_str()))
            .chain(
                self.insertions
                    .iter()
                    .map(|ins| (ins.anchor.line(), ins.anchor_text.as_str())),
            );

        for (line, expected) in targets {
            let found = line
                .checked_sub(1)
                .and_then(|idx| lines.get(idx))
                .map_or("", String::as_str);
            if found != expected {
                return Err(RepairError::Drift {
                    line,
                    expected: expected.to_string(),
                    found: found.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Rewrite in one pass over the original numbering
    pub fn apply_to_lines(&self, lines: &[String]) -> Result<Vec<String>> {
        self.verify(lines)?;

        let blocks = self.blocks();
        let mut out = Vec::with_capacity(lines.len() + self.inserted_count());
        for (idx, text) in lines.iter().enumerate() {
            let line = idx + 1;
            let terminator = terminator_of(text);
            let block = blocks.get(&line);

            if let Some(block) = block {
                out.extend(block.before.iter().map(|new| format!("{new}{terminator}")));
            }
            if !self.removals.contains_key(&line) {
                out.push(text.clone());
            }
            if let Some(block) = block {
                if !block.after.is_empty() {
                    if let Some(last) = out.last_mut() {
                        if !last.ends_with('\n') {
                            last.push_str(terminator);
                        }
                    }
                    out.extend(block.after.iter().map(|new| format!("{new}{terminator}")));
                }
            }
        }
        Ok(out)
    }

    /// One review record per touched original line, ordered by line
    #[must_use]
    pub fn review_edits(&self) -> Vec<ReviewEdit> {
        let blocks = self.blocks();
        let mut lines: Vec<usize> = self.removals.keys().copied().collect();
        lines.extend(blocks.keys().copied());
        lines.sort_unstable();
        lines.dedup();

        lines
            .into_iter()
            .filter_map(|line| {
                let block = blocks.get(&line);
                let target = self
                    .removals
                    .get(&line)
                    .map(|removal| removal.text.clone())
                    .or_else(|| block.map(|b| b.anchor_text.to_string()))?;
                let terminator = terminator_of(&target);

                let mut replacement = String::new();
                if let Some(block) = block {
                    for new in &block.before {
                        replacement.push_str(new);
                        replacement.push_str(terminator);
                    }
                }
                if !self.removals.contains_key(&line) {
                    replacement.push_str(&target);
                }
                if let Some(block) = block {
                    for new in &block.after {
                        replacement.push_str(new);
                        replacement.push_str(terminator);
                    }
                }

                Some(ReviewEdit {
                    start_line: line,
                    end_line: line,
                    target_content: target,
                    replacement_content: replacement,
                    allow_multiple: false,
                })
            })
            .collect()
    }

    fn blocks(&self) -> BTreeMap<usize, Block<'_>> {
        let mut blocks: BTreeMap<usize, Block<'_>> = BTreeMap::new();
        for ins in &self.insertions {
            let block = blocks.entry(ins.anchor.line()).or_insert_with(|| Block {
                anchor_text: &ins.anchor_text,
                before: Vec::new(),
                after: Vec::new(),
            });
            let target = match ins.anchor {
                Anchor::Before(_) => &mut block.before,
                Anchor::After(_) => &mut block.after,
            };
            target.extend(ins.lines.iter().map(String::as_str));
        }
        blocks
    }
}

struct Block<'a> {
    anchor_text: &'a str,
    before: Vec<&'a str>,
    after: Vec<&'a str>,
}

fn terminator_of(text: &str) -> &'static str {
    if text.ends_with("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

/// Result of [`crate::Engine::apply_edits`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub mode: ApplyMode,
    pub removed_lines: usize,
    pub inserted_lines: usize,
    /// Whether the project file was rewritten
    pub written: bool,
    pub edits: Vec<ReviewEdit>,
}

impl ApplyOutcome {
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            mode: self.mode,
            removed_lines: self.removed_lines,
            inserted_lines: self.inserted_lines,
            written: self.written,
        }
    }
}

/// Replace `path` with `contents` via a sibling temp file and a rename.
///
/// An existing file keeps its permissions.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let mut tmp_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".pbxfix.tmp");
    let tmp = path.with_file_name(tmp_name);

    fs::write(&tmp, contents)?;
    if let Err(err) = copy_permissions(path, &tmp).and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }
    Ok(())
}

fn copy_permissions(from: &Path, to: &Path) -> std::io::Result<()> {
    match fs::metadata(from) {
        Ok(meta) => fs::set_permissions(to, meta.permissions()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

/// Strip the terminator for display
#[must_use]
pub fn display_line(text: &str) -> &str {
    trim_terminator(text)
}
