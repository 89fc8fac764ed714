//! Path-aware exclusion patterns.
//!
//! Patterns are matched against the full rendered path of an entry, e.g.
//! `Engineering/Archived` for a folder or `Engineering/web01` for a VM.
//! `*`, `?` and `[...]` never match `/`; a `**` component matches any number
//! of path segments. `{a,b}` alternation is supported. Matching is
//! case-sensitive.

use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use tracing::debug;

use crate::error::Error;
use crate::folder_path::FolderPath;

/// A single compiled pattern, keeping its source text for diagnostics.
#[derive(Debug, Clone)]
pub struct Pattern {
    text: String,
    matcher: GlobMatcher,
}

impl Pattern {
    pub fn new(text: &str) -> Result<Self, Error> {
        let glob = build_glob(text)?;
        Ok(Pattern {
            text: text.to_string(),
            matcher: glob.compile_matcher(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.matcher.is_match(path)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Pattern {}

fn build_glob(text: &str) -> Result<Glob, Error> {
    GlobBuilder::new(text)
        .literal_separator(true)
        .backslash_escape(true)
        .build()
        .map_err(|source| Error::Pattern {
            pattern: text.to_string(),
            source,
        })
}

/// Evaluate a single pattern against a full path.
pub fn matches(pattern: &str, path: &str) -> Result<bool, Error> {
    Ok(Pattern::new(pattern)?.is_match(path))
}

/// Exclusion rules split by what they apply to.
///
/// General rules apply to folders and VMs alike. A folder rule that matches
/// also prunes the folder's whole subtree, since the walker never descends
/// into it.
#[derive(Debug, Clone)]
pub struct ExclusionRules {
    folder_patterns: Vec<String>,
    vm_patterns: Vec<String>,
    folders: GlobSet,
    vms: GlobSet,
}

impl ExclusionRules {
    pub fn new<S: AsRef<str>>(general: &[S], folder_only: &[S], vm_only: &[S]) -> Result<Self, Error> {
        let general: Vec<&str> = general.iter().map(AsRef::as_ref).collect();
        let folder_patterns: Vec<String> = general
            .iter()
            .copied()
            .chain(folder_only.iter().map(AsRef::as_ref))
            .map(str::to_string)
            .collect();
        let vm_patterns: Vec<String> = general
            .iter()
            .copied()
            .chain(vm_only.iter().map(AsRef::as_ref))
            .map(str::to_string)
            .collect();

        let folders = build_set(&folder_patterns)?;
        let vms = build_set(&vm_patterns)?;

        debug!(
            "Exclusion rules: {} folder patterns, {} VM patterns",
            folder_patterns.len(),
            vm_patterns.len()
        );

        Ok(ExclusionRules {
            folder_patterns,
            vm_patterns,
            folders,
            vms,
        })
    }

    /// Rules that exclude nothing.
    pub fn none() -> Self {
        ExclusionRules {
            folder_patterns: Vec::new(),
            vm_patterns: Vec::new(),
            folders: GlobSet::empty(),
            vms: GlobSet::empty(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.folder_patterns.is_empty() && self.vm_patterns.is_empty()
    }

    pub fn excludes_folder(&self, path: &FolderPath) -> bool {
        !self.folders.is_empty() && self.folders.is_match(path.to_string())
    }

    /// `path` is the VM's full rendered path, see [`FolderPath::entry_path`].
    pub fn excludes_vm(&self, path: &str) -> bool {
        !self.vms.is_empty() && self.vms.is_match(path)
    }

    pub fn folder_patterns(&self) -> &[String] {
        &self.folder_patterns
    }

    pub fn vm_patterns(&self) -> &[String] {
        &self.vm_patterns
    }
}

impl Default for ExclusionRules {
    fn default() -> Self {
        ExclusionRules::none()
    }
}

fn build_set(patterns: &[String]) -> Result<GlobSet, Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(build_glob(pattern)?);
    }
    builder.build().map_err(|source| Error::Pattern {
        pattern: patterns.join(", "),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(pattern: &str, path: &str) -> bool {
        matches(pattern, path).unwrap()
    }

    #[test]
    fn test_star_stays_within_segment() {
        assert!(m("Engineering/*", "Engineering/Archived"));
        assert!(!m("Engineering/*", "Engineering/Archived/2019"));
        assert!(!m("*", "Engineering/Archived"));
    }

    #[test]
    fn test_double_star_crosses_separators() {
        assert!(m("Engineering/**", "Engineering/Archived/2019"));
        assert!(m("**/tmp-*", "Ops/Lab/tmp-01"));
        assert!(m("**/tmp-*", "tmp-01"));
    }

    #[test]
    fn test_question_mark_and_class() {
        assert!(m("web0?", "web01"));
        assert!(!m("web0?", "web0/"));
        assert!(m("web[0-3]", "web2"));
        assert!(!m("web[0-3]", "web7"));
    }

    #[test]
    fn test_brace_alternation() {
        assert!(m("{Sales,Ops}/*", "Ops/db01"));
        assert!(m("{Sales,Ops}/*", "Sales/crm"));
        assert!(!m("{Sales,Ops}/*", "Engineering/web01"));
    }

    #[test]
    fn test_match_is_case_sensitive_and_full_path() {
        assert!(!m("engineering", "Engineering"));
        assert!(!m("Archived", "Engineering/Archived"));
    }

    #[test]
    fn test_malformed_pattern_is_an_error() {
        let err = matches("[", "anything").unwrap_err();
        assert!(err.to_string().contains("'['"));
        assert!(ExclusionRules::new(&["ok"], &["{open"], &[]).is_err());
    }

    #[test]
    fn test_rules_split_by_target() {
        let rules = ExclusionRules::new(&["Temp"], &["Engineering/Archived"], &["**/scratch*"]).unwrap();
        let archived: FolderPath = "Engineering/Archived".parse().unwrap();
        let temp = FolderPath::root("Temp");

        assert!(rules.excludes_folder(&archived));
        assert!(rules.excludes_folder(&temp));
        assert!(!rules.excludes_folder(&FolderPath::root("scratch01")));

        assert!(rules.excludes_vm("Engineering/scratch01"));
        assert!(rules.excludes_vm("Temp"));
        assert!(!rules.excludes_vm("Engineering/Archived"));
    }

    #[test]
    fn test_no_rules_excludes_nothing() {
        let rules = ExclusionRules::none();
        assert!(rules.is_empty());
        assert!(!rules.excludes_folder(&FolderPath::root("a")));
        assert!(!rules.excludes_vm("a/b"));
    }
}
