//! Build metadata collected alongside the generated code

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::errors::{ConfgenError, ConfgenResult};

/// Libraries, compiler flags and include directives a program needs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildMetadata {
    pub required_libraries: BTreeSet<String>,
    /// Flag to the components that requested it
    pub build_flags: BTreeMap<String, BTreeSet<String>>,
    pub include_directives: Vec<String>,
}

impl BuildMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_library(&mut self, library: impl Into<String>) {
        self.required_libraries.insert(library.into());
    }

    /// Record `flag` as requested by `component`; duplicates collapse
    pub fn add_build_flag(&mut self, flag: impl Into<String>, component: impl Into<String>) {
        self.build_flags
            .entry(flag.into())
            .or_default()
            .insert(component.into());
    }

    pub fn add_include(&mut self, directive: impl Into<String>) {
        let directive = directive.into();
        if !self.include_directives.contains(&directive) {
            self.include_directives.push(directive);
        }
    }

    /// The de-duplicated flags, sorted
    pub fn flags(&self) -> impl Iterator<Item = &str> {
        self.build_flags.keys().map(String::as_str)
    }

    pub fn to_json(&self) -> ConfgenResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ConfgenError::io_error(format!("failed to serialize metadata: {}", e)))
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// `target` relative to the directory `from`
pub fn relative_path(target: &Path, from: &Path) -> PathBuf {
    let target = normalize(target);
    let from = normalize(from);
    let target_parts: Vec<Component> = target.components().collect();
    let from_parts: Vec<Component> = from.components().collect();
    let common = target_parts
        .iter()
        .zip(&from_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..from_parts.len() {
        out.push("..");
    }
    for part in &target_parts[common..] {
        out.push(part.as_os_str());
    }
    out
}

/// `#include` line for a user header.
///
/// The path is relative to the directory holding `main.cpp`, which is where
/// the preprocessor looks first for a quoted include.
pub fn include_directive(include: &Path, main_cpp: &Path) -> String {
    let from = main_cpp.parent().unwrap_or_else(|| Path::new(""));
    let relative = relative_path(include, from);
    let text = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("#include \"{}\"", text)
}
