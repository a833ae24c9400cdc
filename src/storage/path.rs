// Copyright 2025 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.
//
// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

//! Container-relative path algebra.
//!
//! Paths are stored without a leading separator: object stores turn a leading
//! `/` into a spurious empty root segment. A trailing separator survives
//! normalization and marks the path as a directory for callers that care.
//! The empty path is the container root.

use std::fmt::{Display, Formatter};

/// Separator used in paths, object keys and listing delimiters.
pub const DELIMITER: char = '/';

/// A normalized container-relative path.
///
/// Equality only considers the component sequence, so `a/b` and `a/b/`
/// denote the same path.
#[derive(Debug, Clone, Default, Eq)]
pub struct ContainerPath {
    components: Vec<String>,
    directory: bool,
}

impl ContainerPath {
    /// The container root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse and normalize a path string.
    pub fn parse(path: &str) -> Self {
        let path = path.replace('\\', "/");
        let mut components: Vec<String> = Vec::new();
        for part in path.split(DELIMITER) {
            match part {
                "" | "." => {}
                ".." => {
                    components.pop();
                }
                name => components.push(name.to_string()),
            }
        }
        let directory = !components.is_empty() && path.ends_with(DELIMITER);
        Self {
            components,
            directory,
        }
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Whether the original spelling ended in a separator.
    pub fn is_directory(&self) -> bool {
        self.directory
    }

    pub fn file_name(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    /// The parent path, or `None` for the root.
    pub fn parent(&self) -> Option<ContainerPath> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            components: self.components[..self.components.len() - 1].to_vec(),
            directory: false,
        })
    }

    /// Append `other` to this path and normalize the result.
    pub fn join(&self, other: &str) -> ContainerPath {
        ContainerPath::parse(&format!("{}{}{}", self, DELIMITER, other))
    }

    /// Whether every component of `base` prefixes this path.
    pub fn starts_with(&self, base: &ContainerPath) -> bool {
        self.components.starts_with(&base.components)
    }

    /// Express this path relative to `base`.
    ///
    /// Both sides are resolved as rooted paths first, so an empty `base`
    /// yields the path unchanged and a non-descendant yields `..` steps.
    pub fn relativize(&self, base: &ContainerPath) -> String {
        let common = self
            .components
            .iter()
            .zip(base.components.iter())
            .take_while(|(a, b)| a == b)
            .count();
        let mut parts: Vec<&str> = vec![".."; base.components.len() - common];
        parts.extend(self.components[common..].iter().map(String::as_str));
        parts.join("/")
    }

    /// Normalized string with the trailing separator stripped.
    pub fn as_key(&self) -> String {
        self.components.join("/")
    }
}

impl PartialEq for ContainerPath {
    fn eq(&self, other: &Self) -> bool {
        self.components == other.components
    }
}

impl std::hash::Hash for ContainerPath {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.components.hash(state);
    }
}

impl Display for ContainerPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.components.join("/"))?;
        if self.directory {
            write!(f, "{}", DELIMITER)?;
        }
        Ok(())
    }
}

impl From<&str> for ContainerPath {
    fn from(path: &str) -> Self {
        ContainerPath::parse(path)
    }
}

/// Normalize a path: back-slashes become separators, repeated separators
/// collapse, `.`/`..` resolve, the leading separator is dropped and a
/// trailing separator is kept.
pub fn normalize(path: &str) -> String {
    ContainerPath::parse(path).to_string()
}

/// Named components of a path, root first.
pub fn components(path: &str) -> Vec<String> {
    ContainerPath::parse(path).components
}

/// Join non-empty parts with a single separator. Zero parts yield the root.
pub fn compose<S: AsRef<str>>(parts: &[S]) -> String {
    let joined = parts
        .iter()
        .map(AsRef::as_ref)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    normalize(&joined)
}

/// Parent of a path, `None` for the root.
pub fn parent(path: &str) -> Option<String> {
    ContainerPath::parse(path).parent().map(|p| p.to_string())
}

/// `path` relative to `base`; `relativize(p, p)` is always empty.
pub fn relativize(path: &str, base: &str) -> String {
    let path = ContainerPath::parse(&format!("/{}", path));
    path.relativize(&ContainerPath::parse(&format!("/{}", base)))
}

/// Append the delimiter unless `path` is empty or already ends with it.
pub fn add_trailing_delimiter(path: &str) -> String {
    if path.is_empty() || path.ends_with(DELIMITER) {
        path.to_string()
    } else {
        format!("{}{}", path, DELIMITER)
    }
}

pub fn remove_leading_delimiter(path: &str) -> &str {
    path.trim_start_matches(DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_collapses_separators() {
        assert_eq!(normalize("a//b///c"), "a/b/c");
        assert_eq!(normalize("/a/b"), "a/b");
        assert_eq!(normalize("//a/b/"), "a/b/");
    }

    #[test]
    fn test_normalize_root() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("/"), "");
        assert_eq!(normalize("///"), "");
        assert_eq!(normalize("."), "");
    }

    #[test]
    fn test_normalize_dots_and_backslashes() {
        assert_eq!(normalize("a/./b/../c"), "a/c");
        assert_eq!(normalize("../../a"), "a");
        assert_eq!(normalize("a\\b\\c"), "a/b/c");
        assert_eq!(normalize("a/.."), "");
        assert_eq!(normalize("a/../"), "");
    }

    #[test]
    fn test_components() {
        assert_eq!(components("/a/b/c/"), vec!["a", "b", "c"]);
        assert!(components("").is_empty());
    }

    #[test]
    fn test_compose() {
        assert_eq!(compose(&["a", "b", "c"]), "a/b/c");
        assert_eq!(compose(&["/a/", "", "/b"]), "a/b");
        assert_eq!(compose(&["a", "b/"]), "a/b/");
        assert_eq!(compose::<&str>(&[]), "");
    }

    #[test]
    fn test_parent() {
        assert_eq!(parent("a/b/c"), Some("a/b".to_string()));
        assert_eq!(parent("a"), Some(String::new()));
        assert_eq!(parent("/"), None);
        assert_eq!(parent(""), None);
    }

    #[test]
    fn test_relativize() {
        assert_eq!(relativize("a/b/c", "a"), "b/c");
        assert_eq!(relativize("a/b/c/", "a/b/"), "c");
        assert_eq!(relativize("a/b", ""), "a/b");
        assert_eq!(relativize("", ""), "");
        assert_eq!(relativize("a/x", "a/b"), "../x");
    }

    #[test]
    fn test_equality_ignores_trailing_separator() {
        assert_eq!(ContainerPath::parse("a/b"), ContainerPath::parse("/a//b/"));
        assert_ne!(ContainerPath::parse("a/b"), ContainerPath::parse("a/c"));
        assert!(ContainerPath::parse("a/b/").is_directory());
        assert!(!ContainerPath::parse("a/b").is_directory());
    }

    #[test]
    fn test_join_and_starts_with() {
        let base = ContainerPath::parse("a/b");
        let child = base.join("c/d");
        assert_eq!(child.as_key(), "a/b/c/d");
        assert!(child.starts_with(&base));
        assert!(!base.starts_with(&child));
        assert_eq!(child.file_name(), Some("d"));
    }

    #[test]
    fn test_trailing_delimiter_helpers() {
        assert_eq!(add_trailing_delimiter(""), "");
        assert_eq!(add_trailing_delimiter("a"), "a/");
        assert_eq!(add_trailing_delimiter("a/"), "a/");
        assert_eq!(remove_leading_delimiter("//a/b"), "a/b");
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(path in "[a-c./\\\\]{0,24}") {
            let once = normalize(&path);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn prop_relativize_self_is_empty(path in "[a-c./]{0,24}") {
            prop_assert_eq!(relativize(&path, &path), "");
        }

        #[test]
        fn prop_normalized_has_no_leading_separator(path in "[a-c/]{0,24}") {
            prop_assert!(!normalize(&path).starts_with('/'));
        }
    }
}
