use pbxfix_engine::{display_line, ApplyOutcome, EditSet, Finding, LinkedFile, PhaseMembership};

pub fn render_findings(project: &str, findings: &[Finding]) -> String {
    let mut out = String::new();
    if findings.is_empty() {
        out.push_str(&format!("{project}: no violations found\n"));
        return out;
    }

    out.push_str(&format!("{project}: {} violations\n", findings.len()));
    for finding in findings {
        let lines: Vec<String> = finding.lines.iter().map(ToString::to_string).collect();
        let repair = if finding.kind.is_auto_repaired() {
            ""
        } else {
            " (manual)"
        };
        out.push_str(&format!(
            "  [{}]{repair} lines {}: {}\n",
            finding.kind.as_str(),
            lines.join(", "),
            finding.message
        ));
    }
    out
}

/// One line per removed line, like `Line 42: Duplicate BuildFile ...`
pub fn render_plan(edits: &EditSet) -> String {
    let mut out = String::new();
    for removal in edits.removals() {
        out.push_str(&format!("Line {}: {}\n", removal.line, removal.reason));
    }
    for insertion in edits.insertions() {
        out.push_str(&format!(
            "Insert {} lines at {:?}\n",
            insertion.lines.len(),
            insertion.anchor
        ));
    }
    out
}

pub fn render_linked(linked: &[LinkedFile]) -> String {
    let mut out = String::new();
    if linked.is_empty() {
        out.push_str("No missing files found.\n");
        return out;
    }
    out.push_str(&format!("Found {} missing files to add to target.\n", linked.len()));
    for file in linked {
        out.push_str(&format!(
            "  {} ({}) -> {}\n",
            file.name, file.file_ref, file.registration
        ));
    }
    out
}

pub fn render_outcome(project: &str, outcome: &ApplyOutcome) -> String {
    let mut out = String::new();
    if outcome.written {
        out.push_str(&format!(
            "{project} updated: removed {} lines, inserted {} lines\n",
            outcome.removed_lines, outcome.inserted_lines
        ));
        return out;
    }
    if outcome.edits.is_empty() {
        out.push_str(&format!("{project}: nothing to change\n"));
        return out;
    }

    out.push_str(&format!(
        "{project}: {} edits (dry run, file not modified)\n",
        outcome.edits.len()
    ));
    for edit in &outcome.edits {
        out.push_str(&format!("@@ line {} @@\n", edit.start_line));
        out.push_str(&format!("- {}\n", display_line(&edit.target_content)));
        for line in edit.replacement_content.split_inclusive('\n') {
            out.push_str(&format!("+ {}\n", display_line(line)));
        }
    }
    out
}

pub fn render_phases(phases: &[PhaseMembership]) -> String {
    let mut out = String::new();
    out.push_str("| id | kind | name | files |\n");
    out.push_str("|---|---|---|---:|\n");
    for phase in phases {
        out.push_str(&format!(
            "| `{}` | {} | {} | {} |\n",
            phase.phase_id,
            phase.kind,
            escape_cell(&phase.name),
            phase.entries.len()
        ));
    }
    out
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|")
}
