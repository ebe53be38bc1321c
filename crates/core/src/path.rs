//! Logical path handling.
//!
//! Paths address folders inside a space using `/` as the separator. A missing
//! path, the empty string and `"/"` all denote the space root. Empty segments
//! produced by leading, trailing or repeated separators are discarded, so
//! `"//docs///notes/"` and `"docs/notes"` address the same folder.
//!
//! Nothing here touches persistence; walking the tree is done by the resolver
//! in `docspace-vfs`.

use crate::error::{Error, Result};
use std::fmt;

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '/';

/// A normalized, slash-delimited path relative to a space root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LogicalPath {
    segments: Vec<String>,
}

impl LogicalPath {
    /// The space root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Normalize a raw, possibly absent, path.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::root();
        };
        let segments = raw
            .trim()
            .split(PATH_SEPARATOR)
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        Self { segments }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of folder levels beneath the root.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Append a single validated name.
    pub fn join(&self, name: &str) -> Result<Self> {
        validate_segment_name(name)?;
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Ok(Self { segments })
    }

    /// Split off the final segment.
    ///
    /// Fails for the root, which has no name of its own.
    pub fn split_leaf(&self) -> Result<(Self, String)> {
        let Some((leaf, parent)) = self.segments.split_last() else {
            return Err(Error::InvalidPath(
                "the space root has no parent".to_string(),
            ));
        };
        Ok((
            Self {
                segments: parent.to_vec(),
            },
            leaf.clone(),
        ))
    }

    /// Whether `self` equals `other` or lies beneath it.
    pub fn starts_with(&self, other: &LogicalPath) -> bool {
        self.segments.starts_with(&other.segments)
    }

    /// Display form without a leading separator, as reported for folders
    /// (`"docs/notes"`). The root renders as the empty string.
    pub fn display_path(&self) -> String {
        self.segments.join("/")
    }

    /// Display form with a leading separator, as reported for directories
    /// containing files (`"/docs/notes"`, or `"/"` for the root).
    pub fn directory_path(&self) -> String {
        format!("/{}", self.display_path())
    }
}

impl fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.directory_path())
    }
}

/// Split a raw path into its parent directory and final name.
pub fn resolve_parent_and_leaf(raw: &str) -> Result<(LogicalPath, String)> {
    LogicalPath::parse(Some(raw)).split_leaf()
}

/// Validate a single new folder or file name.
///
/// Runs independently of path splitting, so a client cannot smuggle a
/// multi-segment path into what should be one name.
pub fn validate_segment_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidName("name must not be empty".to_string()));
    }
    if name.contains(PATH_SEPARATOR) {
        return Err(Error::InvalidName(format!(
            "name must not contain '{PATH_SEPARATOR}': {name}"
        )));
    }
    if name == "." || name == ".." {
        return Err(Error::InvalidName(format!("reserved name: {name}")));
    }
    if name.chars().any(char::is_control) {
        return Err(Error::InvalidName(
            "name must not contain control characters".to_string(),
        ));
    }
    Ok(())
}

/// Join a display path and a child name (`"docs" + "notes"` is `"docs/notes"`).
pub fn join_display(parent: &str, name: &str) -> String {
    let parent = parent.trim_matches(PATH_SEPARATOR);
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}{PATH_SEPARATOR}{name}")
    }
}
