mod support;

use pbxfix_engine::{ApplyMode, Engine, FindingKind, RepairConfig, RepairError, Store};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use support::{
    assert_referential_closure, distinct_paths, id, ProjectBuilder, SOURCES, WIDGET_SOURCES,
};
use tempfile::TempDir;

fn write_project(text: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("project.pbxproj");
    fs::write(&path, text).unwrap();
    (dir, path)
}

fn apply_in_memory(store: &Store, edits: &pbxfix_engine::EditSet) -> Store {
    Store::parse(&edits.apply_to_lines(store.lines()).unwrap().concat())
}

#[test]
fn scenario_a_duplicate_path_keeps_registered_reference() {
    let text = ProjectBuilder::new()
        .build_file("0000000000000000000000B2", "0000000000000000000000F2", "Foo.src")
        .file_ref("0000000000000000000000F1", "Foo.src")
        .file_ref("0000000000000000000000F2", "Foo.src")
        .phase(SOURCES, "Sources", &[("0000000000000000000000B2", "Foo.src")])
        .build();
    let store = Store::parse(&text);
    let engine = Engine::new(RepairConfig::aggressive()).unwrap();

    let findings = engine.violations_in(&store);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].kind, FindingKind::DuplicateFileReference);

    let edits = engine.removals_in(&store);
    let first_ref_line = store.file_reference(&id("0000000000000000000000F1")).unwrap().line;
    let removed: Vec<usize> = edits.removals().map(|r| r.line).collect();
    assert_eq!(removed, vec![first_ref_line]);

    let after = apply_in_memory(&store, &edits);
    assert!(after.file_reference(&id("0000000000000000000000F1")).is_none());
    assert!(after.file_reference(&id("0000000000000000000000F2")).is_some());
    assert!(after.registration(&id("0000000000000000000000B2")).is_some());
    assert_eq!(distinct_paths(&after), distinct_paths(&store));
}

#[test]
fn scenario_a_default_policy_only_reports() {
    let text = ProjectBuilder::new()
        .build_file("0000000000000000000000B2", "0000000000000000000000F2", "Foo.src")
        .file_ref("0000000000000000000000F1", "Foo.src")
        .file_ref("0000000000000000000000F2", "Foo.src")
        .phase(SOURCES, "Sources", &[("0000000000000000000000B2", "Foo.src")])
        .build();
    let store = Store::parse(&text);
    let engine = Engine::default();

    assert_eq!(engine.violations_in(&store).len(), 1);
    assert!(engine.removals_in(&store).is_empty());
    // the superseded reference is not re-linked either
    assert!(engine.additions_in(&store, &id(SOURCES)).unwrap().edits.is_empty());
}

#[test]
fn scenario_b_second_registration_and_its_entry_are_removed() {
    let text = ProjectBuilder::new()
        .build_file("0000000000000000000000B1", "0000000000000000000000F1", "Item.swift")
        .build_file("0000000000000000000000B2", "0000000000000000000000F1", "Item.swift")
        .file_ref("0000000000000000000000F1", "Item.swift")
        .phase(
            SOURCES,
            "Sources",
            &[
                ("0000000000000000000000B1", "Item.swift"),
                ("0000000000000000000000B2", "Item.swift"),
            ],
        )
        .build();
    let store = Store::parse(&text);
    let engine = Engine::default();

    let edits = engine.removals_in(&store);
    let b2_line = store.registration(&id("0000000000000000000000B2")).unwrap().line;
    let entry_line = store.phases()[0].entries[1].line;
    let removed: Vec<usize> = edits.removals().map(|r| r.line).collect();
    assert_eq!(removed, vec![b2_line, entry_line]);

    let after = apply_in_memory(&store, &edits);
    assert!(after.registration(&id("0000000000000000000000B1")).is_some());
    assert!(after.registration(&id("0000000000000000000000B2")).is_none());
    assert_eq!(
        after.phases()[0].entry_ids().cloned().collect::<Vec<_>>(),
        vec![id("0000000000000000000000B1")]
    );
    assert_referential_closure(&after);
    assert!(engine.violations_in(&after).is_empty());
}

#[test]
fn scenario_b_unlisted_second_registration_is_removed() {
    let text = ProjectBuilder::new()
        .build_file("0000000000000000000000B1", "0000000000000000000000F1", "Item.swift")
        .build_file("0000000000000000000000B2", "0000000000000000000000F1", "Item.swift")
        .file_ref("0000000000000000000000F1", "Item.swift")
        .phase(SOURCES, "Sources", &[("0000000000000000000000B1", "Item.swift")])
        .build();
    let store = Store::parse(&text);

    let edits = Engine::default().removals_in(&store);
    let removed: Vec<usize> = edits.removals().map(|r| r.line).collect();
    assert_eq!(
        removed,
        vec![store.registration(&id("0000000000000000000000B2")).unwrap().line]
    );
}

#[test]
fn unlisted_registration_yields_to_listed_sibling() {
    let text = ProjectBuilder::new()
        .build_file("0000000000000000000000B1", "0000000000000000000000F1", "Item.swift")
        .build_file("0000000000000000000000B2", "0000000000000000000000F1", "Item.swift")
        .file_ref("0000000000000000000000F1", "Item.swift")
        .phase(SOURCES, "Sources", &[("0000000000000000000000B2", "Item.swift")])
        .build();
    let (_dir, path) = write_project(&text);
    let engine = Engine::default();

    let findings = engine.find_violations(&path).unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].kind, FindingKind::DuplicateRegistration);

    let store = Engine::load(&path).unwrap();
    let edits = engine.plan_repair(&path, SOURCES).unwrap();
    let removed: Vec<usize> = edits.removals().map(|r| r.line).collect();
    assert_eq!(
        removed,
        vec![store.registration(&id("0000000000000000000000B1")).unwrap().line]
    );
    assert_eq!(edits.inserted_count(), 0);
    engine.apply_edits(&path, &edits, ApplyMode::InPlace).unwrap();

    let after = Engine::load(&path).unwrap();
    assert!(after.registration(&id("0000000000000000000000B1")).is_none());
    assert!(after
        .phase(&id(SOURCES))
        .unwrap()
        .contains(&id("0000000000000000000000B2")));
    assert!(engine.violations_in(&after).is_empty());
    assert!(engine.plan_repair(&path, SOURCES).unwrap().is_empty());
}

#[test]
fn file_name_with_equals_sign_is_linked_once() {
    let text = ProjectBuilder::new()
        .build_file("0000000000000000000000B1", "0000000000000000000000F1", "A=B.swift")
        .file_ref("0000000000000000000000F1", "A=B.swift")
        .phase(SOURCES, "Sources", &[("0000000000000000000000B1", "A=B.swift")])
        .build();
    let store = Store::parse(&text);
    assert!(store.misses().is_empty(), "{:?}", store.misses());
    assert_eq!(store.phase(&id(SOURCES)).unwrap().entries.len(), 1);

    let engine = Engine::default();
    assert!(engine.repair_in(&store, &id(SOURCES)).unwrap().is_empty());
    assert!(engine.violations_in(&store).is_empty());
}

#[test]
fn scenario_c_gap_fill_links_file_into_target_phase_once() {
    let text = ProjectBuilder::new()
        .build_file("0000000000000000000000B1", "0000000000000000000000F1", "Item.swift")
        .file_ref("0000000000000000000000F1", "Item.swift")
        .phase(SOURCES, "Sources", &[])
        .phase(WIDGET_SOURCES, "Sources", &[("0000000000000000000000B1", "Item.swift")])
        .build();
    let (_dir, path) = write_project(&text);
    let engine = Engine::default();

    let edits = engine.plan_additions(&path, SOURCES).unwrap();
    assert_eq!(edits.inserted_count(), 2);
    let outcome = engine.apply_edits(&path, &edits, ApplyMode::InPlace).unwrap();
    assert!(outcome.written);

    let after = Engine::load(&path).unwrap();
    let target = after.phase(&id(SOURCES)).unwrap();
    assert_eq!(target.entries.len(), 1);
    let new_reg = after.registration(&target.entries[0].id).unwrap();
    assert_eq!(new_reg.file_ref, id("0000000000000000000000F1"));
    assert_eq!(new_reg.name, "Item.swift");
    assert_ne!(new_reg.id, id("0000000000000000000000B1"));
    // the other phase keeps its own build file
    assert!(after
        .phase(&id(WIDGET_SOURCES))
        .unwrap()
        .contains(&id("0000000000000000000000B1")));

    assert!(engine.plan_additions(&path, SOURCES).unwrap().is_empty());
    assert!(engine.plan_removals(&path).unwrap().is_empty());
}

#[test]
fn scenario_d_missing_phase_leaves_file_untouched() {
    let text = ProjectBuilder::new()
        .file_ref("0000000000000000000000F1", "Item.swift")
        .phase(WIDGET_SOURCES, "Sources", &[])
        .build();
    let (_dir, path) = write_project(&text);

    let err = Engine::default().plan_additions(&path, SOURCES).unwrap_err();
    assert!(matches!(err, RepairError::MissingPhase { .. }), "{err}");
    assert_eq!(fs::read_to_string(&path).unwrap(), text);
}

#[test]
fn invalid_phase_identifier_is_rejected() {
    let (_dir, path) = write_project(&ProjectBuilder::new().build());
    let err = Engine::default()
        .plan_additions(&path, "not-an-id")
        .unwrap_err();
    assert!(matches!(err, RepairError::InvalidIdentifier(_)), "{err}");
}

fn messy_project() -> String {
    ProjectBuilder::new()
        .build_file("0000000000000000000000B1", "0000000000000000000000F1", "A.swift")
        .build_file("0000000000000000000000B2", "0000000000000000000000F1", "A.swift")
        .build_file("0000000000000000000000B3", "0000000000000000000000F2", "B.swift")
        .build_file("0000000000000000000000B4", "0000000000000000000000F3", "B.swift")
        .file_ref("0000000000000000000000F1", "A.swift")
        .file_ref("0000000000000000000000F2", "B.swift")
        .file_ref("0000000000000000000000F3", "B.swift")
        .file_ref("0000000000000000000000F4", "C.swift")
        .file_ref("0000000000000000000000F5", "D.swift")
        .phase(
            SOURCES,
            "Sources",
            &[
                ("0000000000000000000000B1", "A.swift"),
                ("0000000000000000000000B2", "A.swift"),
                ("0000000000000000000000B4", "B.swift"),
                ("0000000000000000000000B3", "B.swift"),
            ],
        )
        .build()
}

#[test]
fn full_cycle_is_idempotent() {
    let (_dir, path) = write_project(&messy_project());
    let engine = Engine::default();

    let first = engine.plan_repair(&path, SOURCES).unwrap();
    assert!(!first.is_empty());
    engine.apply_edits(&path, &first, ApplyMode::InPlace).unwrap();
    let after_first = fs::read_to_string(&path).unwrap();

    let second = engine.plan_repair(&path, SOURCES).unwrap();
    assert!(second.is_empty(), "second run planned {second:?}");
    let outcome = engine.apply_edits(&path, &second, ApplyMode::InPlace).unwrap();
    assert!(!outcome.written);
    assert_eq!(fs::read_to_string(&path).unwrap(), after_first);

    let store = Engine::load(&path).unwrap();
    assert_referential_closure(&store);
}

#[test]
fn cleanup_preserves_distinct_paths_and_closure() {
    let store = Store::parse(&messy_project());
    let engine = Engine::new(RepairConfig::aggressive()).unwrap();

    let after = apply_in_memory(&store, &engine.removals_in(&store));
    assert_referential_closure(&after);
    assert_eq!(distinct_paths(&after), distinct_paths(&store));
    assert!(engine
        .violations_in(&after)
        .iter()
        .all(|finding| !finding.kind.is_auto_repaired()));
}

#[test]
fn gap_fill_is_append_only_with_fresh_ids() {
    let store = Store::parse(&messy_project());
    let engine = Engine::default();
    let before: Vec<_> = store.phase(&id(SOURCES)).unwrap().entry_ids().cloned().collect();

    let fill = engine.additions_in(&store, &id(SOURCES)).unwrap();
    let linked: Vec<_> = fill.linked.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(linked, vec!["C.swift", "D.swift"]);

    let fresh: HashSet<_> = fill.linked.iter().map(|l| l.registration.clone()).collect();
    assert_eq!(fresh.len(), fill.linked.len());
    assert!(fresh.iter().all(|new| !store.known_ids().contains(new)));

    let after = apply_in_memory(&store, &fill.edits);
    let entries: Vec<_> = after.phase(&id(SOURCES)).unwrap().entry_ids().cloned().collect();
    assert_eq!(&entries[..before.len()], before.as_slice());
    assert_eq!(entries.len(), before.len() + fill.linked.len());
    assert!(entries[before.len()..].iter().all(|e| fresh.contains(e)));
}

#[test]
fn report_mode_describes_without_writing() {
    let text = messy_project();
    let (_dir, path) = write_project(&text);
    let engine = Engine::default();

    let edits = engine.plan_removals(&path).unwrap();
    let outcome = engine.apply_edits(&path, &edits, ApplyMode::Report).unwrap();
    assert!(!outcome.written);
    assert_eq!(outcome.edits.len(), edits.removed_count());
    assert_eq!(fs::read_to_string(&path).unwrap(), text);

    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    for edit in &outcome.edits {
        assert_eq!(edit.target_content, lines[edit.start_line - 1]);
        assert!(edit.is_deletion());
    }
}

#[test]
fn drifted_file_is_not_rewritten() {
    let text = messy_project();
    let (_dir, path) = write_project(&text);
    let engine = Engine::default();
    let edits = engine.plan_removals(&path).unwrap();

    let shifted = format!("// touched\n{text}");
    fs::write(&path, &shifted).unwrap();
    let err = engine
        .apply_edits(&path, &edits, ApplyMode::InPlace)
        .unwrap_err();
    assert!(matches!(err, RepairError::Drift { .. }), "{err}");
    assert_eq!(fs::read_to_string(&path).unwrap(), shifted);
}
