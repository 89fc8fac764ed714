//! Folder positions inside the datacenter's VM folder hierarchy.
//!
//! A [`FolderPath`] is a non-empty list of folder names, starting below the
//! datacenter's VM root folder. Its string form joins the names with `/`.
//! Names that themselves contain `/` or `%` are escaped (`%2F`, `%25`), the
//! same way the inventory renders them, so the string form always splits back
//! into the original names.

use std::fmt;
use std::str::FromStr;

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

pub const SEPARATOR: char = '/';

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FolderPath {
    segments: Vec<String>,
}

impl FolderPath {
    /// A single-segment path for a folder directly under the VM root.
    pub fn root(name: &str) -> Self {
        FolderPath {
            segments: vec![name.to_string()],
        }
    }

    pub fn from_segments<I, S>(segments: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
            return Err(Error::InvalidPath(segments.join("/")));
        }
        Ok(FolderPath { segments })
    }

    /// Path of `name` placed directly inside this folder.
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        FolderPath { segments }
    }

    /// `None` for a top-level folder.
    pub fn parent(&self) -> Option<FolderPath> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(FolderPath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// The first `depth` segments of this path.
    pub fn prefix(&self, depth: usize) -> Option<FolderPath> {
        if depth == 0 || depth > self.segments.len() {
            return None;
        }
        Some(FolderPath {
            segments: self.segments[..depth].to_vec(),
        })
    }

    pub fn name(&self) -> &str {
        // segments is never empty
        &self.segments[self.segments.len() - 1]
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// True when `self` equals `other` or lies somewhere below it.
    pub fn starts_with(&self, other: &FolderPath) -> bool {
        self.segments.len() >= other.segments.len()
            && self.segments[..other.segments.len()] == other.segments[..]
    }

    /// Rendered path of an entry called `name` inside this folder. Used for
    /// VM exclusion matching, where the VM itself never becomes a key.
    pub fn entry_path(&self, name: &str) -> String {
        format!("{}{}{}", self, SEPARATOR, escape_segment(name))
    }
}

fn escape_segment(segment: &str) -> String {
    segment.replace('%', "%25").replace('/', "%2F")
}

fn unescape_segment(segment: &str) -> Option<String> {
    let mut out = String::with_capacity(segment.len());
    let mut rest = segment;
    while let Some(idx) = rest.find('%') {
        out.push_str(&rest[..idx]);
        let code = rest.get(idx + 1..idx + 3)?;
        match code {
            "25" => out.push('%'),
            "2F" | "2f" => out.push('/'),
            _ => return None,
        }
        rest = &rest[idx + 3..];
    }
    out.push_str(rest);
    Some(out)
}

impl fmt::Display for FolderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", SEPARATOR)?;
            }
            write!(f, "{}", escape_segment(segment))?;
        }
        Ok(())
    }
}

impl FromStr for FolderPath {
    type Err = Error;

    /// Leading and trailing separators are tolerated so that `/Engineering/`
    /// on a command line means `Engineering`; empty inner segments are not.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FolderPath::parse_rendered(s.trim_matches(SEPARATOR))
            .ok_or_else(|| Error::InvalidPath(s.to_string()))
    }
}

impl FolderPath {
    /// Strict inverse of `Display`: no outer separators, no empty segments,
    /// only `%25` and `%2F` escapes.
    pub fn parse_key(s: &str) -> Result<Self, Error> {
        FolderPath::parse_rendered(s).ok_or_else(|| Error::InvalidPath(s.to_string()))
    }

    fn parse_rendered(s: &str) -> Option<Self> {
        if s.is_empty() {
            return None;
        }
        let segments = s
            .split(SEPARATOR)
            .map(|raw| unescape_segment(raw).filter(|seg| !seg.is_empty()))
            .collect::<Option<Vec<_>>>()?;
        Some(FolderPath { segments })
    }
}

impl Serialize for FolderPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FolderPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        FolderPath::parse_key(&raw).map_err(D::Error::custom)
    }
}

/// Remove paths that lie inside other paths in the list, keeping the
/// outermost one in its original position.
pub fn non_overlapping_folders(paths: Vec<FolderPath>) -> Vec<FolderPath> {
    let mut result: Vec<FolderPath> = Vec::new();

    for path in paths {
        if result.iter().any(|kept| path.starts_with(kept)) {
            continue;
        }
        result.retain(|kept| !kept.starts_with(&path));
        result.push(path);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> FolderPath {
        s.parse().unwrap()
    }

    #[test]
    fn test_display_joins_segments() {
        let path = FolderPath::root("Engineering").child("Archived");
        assert_eq!(path.to_string(), "Engineering/Archived");
        assert_eq!(path.depth(), 2);
        assert_eq!(path.name(), "Archived");
    }

    #[test]
    fn test_parse_trims_outer_separators() {
        assert_eq!(p("/Engineering/Web/"), p("Engineering/Web"));
    }

    #[test]
    fn test_parse_rejects_empty_and_inner_gaps() {
        assert!("".parse::<FolderPath>().is_err());
        assert!("/".parse::<FolderPath>().is_err());
        assert!("a//b".parse::<FolderPath>().is_err());
        assert!("a/%zz".parse::<FolderPath>().is_err());
    }

    #[test]
    fn test_key_parsing_is_strict() {
        assert_eq!(FolderPath::parse_key("Engineering/Web").unwrap(), p("Engineering/Web"));
        assert!(FolderPath::parse_key("/Engineering").is_err());
        assert!(FolderPath::parse_key("Engineering/").is_err());
        assert!(FolderPath::parse_key("").is_err());
        assert!(serde_json::from_str::<FolderPath>("\"/Engineering/\"").is_err());
    }

    #[test]
    fn test_slash_in_name_round_trips() {
        let path = FolderPath::root("QA/Test").child("100%");
        let rendered = path.to_string();
        assert_eq!(rendered, "QA%2FTest/100%25");
        let parsed: FolderPath = rendered.parse().unwrap();
        assert_eq!(parsed, path);
        assert_eq!(parsed.segments()[0], "QA/Test");
    }

    #[test]
    fn test_parent_and_prefix() {
        let path = p("a/b/c");
        assert_eq!(path.parent(), Some(p("a/b")));
        assert_eq!(p("a").parent(), None);
        assert_eq!(path.prefix(1), Some(p("a")));
        assert_eq!(path.prefix(3), Some(path.clone()));
        assert_eq!(path.prefix(0), None);
        assert_eq!(path.prefix(4), None);
    }

    #[test]
    fn test_starts_with_matches_whole_segments() {
        assert!(p("a/b").starts_with(&p("a")));
        assert!(p("a").starts_with(&p("a")));
        assert!(!p("ab/c").starts_with(&p("a")));
    }

    #[test]
    fn test_entry_path_escapes_name() {
        assert_eq!(p("Eng").entry_path("web/01"), "Eng/web%2F01");
    }

    #[test]
    fn test_non_overlapping_no_overlap() {
        let result = non_overlapping_folders(vec![p("Engineering"), p("Sales"), p("Ops/Lab")]);
        assert_eq!(result, vec![p("Engineering"), p("Sales"), p("Ops/Lab")]);
    }

    #[test]
    fn test_non_overlapping_with_subfolder() {
        let result =
            non_overlapping_folders(vec![p("Engineering/Web"), p("Sales"), p("Engineering")]);
        assert_eq!(result, vec![p("Sales"), p("Engineering")]);

        let result = non_overlapping_folders(vec![p("Engineering"), p("Engineering/Web")]);
        assert_eq!(result, vec![p("Engineering")]);
    }

    #[test]
    fn test_non_overlapping_drops_duplicates() {
        let result = non_overlapping_folders(vec![p("a"), p("a")]);
        assert_eq!(result, vec![p("a")]);
    }
}
