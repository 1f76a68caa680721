#![allow(dead_code)]

use pbxfix_engine::{ObjectId, Store};
use std::collections::BTreeSet;

pub const SOURCES: &str = "BC0FA6301BFA2AFD38D4CF8E";
pub const WIDGET_SOURCES: &str = "BC0FA6301BFA2AFD38D4CF8F";

pub fn id(raw: &str) -> ObjectId {
    ObjectId::parse(raw).unwrap()
}

/// Assembles a minimal but realistic project.pbxproj
#[derive(Default)]
pub struct ProjectBuilder {
    build_files: Vec<String>,
    file_refs: Vec<String>,
    phases: Vec<(String, String, Vec<String>)>,
}

impl ProjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_ref(mut self, id: &str, path: &str) -> Self {
        self.file_refs.push(format!(
            "\t\t{id} /* {path} */ = {{isa = PBXFileReference; lastKnownFileType = sourcecode.swift; path = {path}; sourceTree = \"<group>\"; }};\n"
        ));
        self
    }

    pub fn build_file(mut self, id: &str, file: &str, name: &str) -> Self {
        self.build_files.push(format!(
            "\t\t{id} /* {name} in Sources */ = {{isa = PBXBuildFile; fileRef = {file} /* {name} */; }};\n"
        ));
        self
    }

    pub fn phase(mut self, id: &str, name: &str, entries: &[(&str, &str)]) -> Self {
        self.phases.push((
            id.to_string(),
            name.to_string(),
            entries
                .iter()
                .map(|(entry, label)| format!("\t\t\t\t{entry} /* {label} in {name} */,\n"))
                .collect(),
        ));
        self
    }

    pub fn build(&self) -> String {
        let mut out = String::from("// !$*UTF8*$!\n{\n\tarchiveVersion = 1;\n\tobjects = {\n\n");
        out.push_str("/* Begin PBXBuildFile section */\n");
        out.push_str(&self.build_files.concat());
        out.push_str("/* End PBXBuildFile section */\n\n");
        out.push_str("/* Begin PBXFileReference section */\n");
        out.push_str(&self.file_refs.concat());
        out.push_str("/* End PBXFileReference section */\n\n");
        out.push_str("/* Begin PBXSourcesBuildPhase section */\n");
        for (id, name, entries) in &self.phases {
            out.push_str(&format!("\t\t{id} /* {name} */ = {{\n"));
            out.push_str("\t\t\tisa = PBXSourcesBuildPhase;\n");
            out.push_str("\t\t\tbuildActionMask = 2147483647;\n");
            out.push_str("\t\t\tfiles = (\n");
            out.push_str(&entries.concat());
            out.push_str("\t\t\t);\n");
            out.push_str("\t\t\trunOnlyForDeploymentPostprocessing = 0;\n");
            out.push_str("\t\t};\n");
        }
        out.push_str("/* End PBXSourcesBuildPhase section */\n");
        out.push_str("\t};\n\trootObject = 0000000000000000000000EE /* Project object */;\n}\n");
        out
    }
}

/// Every membership id resolves to a build file, every build file to a file ref
pub fn assert_referential_closure(store: &Store) {
    for phase in store.phases() {
        for entry in &phase.entries {
            assert!(
                store.registration(&entry.id).is_some(),
                "phase {} lists unresolvable {} at line {}",
                phase.phase_id,
                entry.id,
                entry.line
            );
        }
    }
    for reg in store.registrations() {
        assert!(
            store.file_reference(&reg.file_ref).is_some(),
            "build file {} points at missing {}",
            reg.id,
            reg.file_ref
        );
    }
}

pub fn distinct_paths(store: &Store) -> BTreeSet<String> {
    store.file_references().map(|file| file.path.clone()).collect()
}
