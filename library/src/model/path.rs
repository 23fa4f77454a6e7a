//! Addresses into a value tree.
//!
//! A [`Path`] is a sequence of [`PathStep`]s, each selecting a record field or
//! an array element. Paths are plain data: they are only meaningful relative
//! to one tree, and array resizes shift the indices they contain, so they are
//! never treated as live references. Resizes are propagated with
//! [`Path::reindexed`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LibraryError;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathStep {
    Field(String),
    Index(usize),
}

impl PathStep {
    pub fn field(name: &str) -> Self {
        PathStep::Field(name.to_string())
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathStep::Index(i) => Some(*i),
            PathStep::Field(_) => None,
        }
    }
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Field(name) => write!(f, "{}", name),
            PathStep::Index(i) => write!(f, "[{}]", i),
        }
    }
}

/// Outcome of moving a path across an array insertion or removal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reindex {
    /// The path does not go through a shifted element.
    Unaffected,
    /// The path went through a shifted element and now reads this.
    Moved(Path),
    /// The path addressed an element that was removed.
    Removed,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Path {
    steps: Vec<PathStep>,
}

impl Path {
    pub fn root() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn from_steps(steps: Vec<PathStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last(&self) -> Option<&PathStep> {
        self.steps.last()
    }

    /// Returns a new path with `step` appended.
    pub fn child(&self, step: PathStep) -> Path {
        let mut steps = self.steps.clone();
        steps.push(step);
        Path { steps }
    }

    pub fn field(&self, name: &str) -> Path {
        self.child(PathStep::field(name))
    }

    pub fn index(&self, index: usize) -> Path {
        self.child(PathStep::Index(index))
    }

    pub fn join(&self, other: &Path) -> Path {
        let mut steps = self.steps.clone();
        steps.extend(other.steps.iter().cloned());
        Path { steps }
    }

    pub fn parent(&self) -> Option<Path> {
        if self.steps.is_empty() {
            None
        } else {
            Some(self.truncated(self.steps.len() - 1))
        }
    }

    pub fn truncated(&self, len: usize) -> Path {
        Path {
            steps: self.steps[..len.min(self.steps.len())].to_vec(),
        }
    }

    /// True when `prefix` addresses this node or one of its ancestors.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.steps.starts_with(&prefix.steps)
    }

    pub fn is_prefix_of(&self, other: &Path) -> bool {
        other.starts_with(self)
    }

    pub fn strip_prefix(&self, prefix: &Path) -> Option<Path> {
        if self.starts_with(prefix) {
            Some(Path {
                steps: self.steps[prefix.steps.len()..].to_vec(),
            })
        } else {
            None
        }
    }

    /// Moves this path across a resize of the array at `array`.
    ///
    /// Entries at or after `pivot` shift by `delta`. With a negative delta the
    /// entries `pivot..pivot - delta` are the removed ones.
    pub fn reindexed(&self, array: &Path, pivot: usize, delta: isize) -> Reindex {
        if delta == 0 || !self.starts_with(array) {
            return Reindex::Unaffected;
        }
        let position = array.steps.len();
        let index = match self.steps.get(position).and_then(PathStep::as_index) {
            Some(index) => index,
            None => return Reindex::Unaffected,
        };
        if index < pivot {
            return Reindex::Unaffected;
        }
        let shifted = if delta < 0 {
            let removed = delta.unsigned_abs();
            if index < pivot + removed {
                return Reindex::Removed;
            }
            index - removed
        } else {
            index + delta as usize
        };
        let mut steps = self.steps.clone();
        steps[position] = PathStep::Index(shifted);
        Reindex::Moved(Path { steps })
    }
}

impl From<Vec<PathStep>> for Path {
    fn from(steps: Vec<PathStep>) -> Self {
        Path::from_steps(steps)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "/");
        }
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                PathStep::Field(name) if i > 0 => write!(f, ".{}", name)?,
                other => write!(f, "{}", other)?,
            }
        }
        Ok(())
    }
}

/// Parses the display form: `a.b[2].c`, with `/` (or an empty string) for the root.
impl FromStr for Path {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == "/" {
            return Ok(Path::root());
        }
        let invalid = |reason: &str| LibraryError::Parse(format!("invalid path '{}': {}", s, reason));
        let mut steps = Vec::new();
        let mut chars = s.chars().peekable();
        let mut name = String::new();
        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if name.is_empty() {
                        return Err(invalid("empty field name"));
                    }
                    steps.push(PathStep::Field(std::mem::take(&mut name)));
                }
                '[' => {
                    if !name.is_empty() {
                        steps.push(PathStep::Field(std::mem::take(&mut name)));
                    }
                    let mut digits = String::new();
                    loop {
                        match chars.next() {
                            Some(']') => break,
                            Some(d) if d.is_ascii_digit() => digits.push(d),
                            _ => return Err(invalid("malformed index")),
                        }
                    }
                    let index = digits.parse().map_err(|_| invalid("malformed index"))?;
                    steps.push(PathStep::Index(index));
                    if chars.peek() == Some(&'.') {
                        chars.next();
                        if chars.peek().is_none() {
                            return Err(invalid("trailing separator"));
                        }
                    }
                }
                other => name.push(other),
            }
        }
        if !name.is_empty() {
            steps.push(PathStep::Field(name));
        }
        Ok(Path::from_steps(steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Path {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        let path = p("values[3].x");
        assert_eq!(
            path.steps(),
            &[
                PathStep::field("values"),
                PathStep::Index(3),
                PathStep::field("x")
            ]
        );
        assert_eq!(path.to_string(), "values[3].x");
        assert_eq!(p("[0][1]").to_string(), "[0][1]");
        assert!(p("/").is_root());
        assert!("a..b".parse::<Path>().is_err());
        assert!("a[x]".parse::<Path>().is_err());
    }

    #[test]
    fn test_prefix_queries() {
        let base = p("a[1]");
        assert!(p("a[1].b").starts_with(&base));
        assert!(base.is_prefix_of(&p("a[1]")));
        assert!(!p("a[2].b").starts_with(&base));
        assert_eq!(p("a[1].b").strip_prefix(&base), Some(p("b")));
        assert_eq!(p("a[1].b").parent(), Some(base.clone()));
        assert_eq!(Path::root().parent(), None);
        assert_eq!(p("a[1].b").truncated(1), p("a"));
    }

    #[test]
    fn test_reindex_insert() {
        let array = p("items");
        assert_eq!(
            p("items[2].x").reindexed(&array, 1, 3),
            Reindex::Moved(p("items[5].x"))
        );
        assert_eq!(
            p("items[2].x").reindexed(&array, 2, 1),
            Reindex::Moved(p("items[3].x"))
        );
        assert_eq!(p("items[0]").reindexed(&array, 1, 3), Reindex::Unaffected);
        assert_eq!(p("other[4]").reindexed(&array, 0, 1), Reindex::Unaffected);
        assert_eq!(p("items").reindexed(&array, 0, 1), Reindex::Unaffected);
    }

    #[test]
    fn test_reindex_remove() {
        let array = p("items");
        assert_eq!(
            p("items[5]").reindexed(&array, 1, -2),
            Reindex::Moved(p("items[3]"))
        );
        assert_eq!(
            p("items[3]").reindexed(&array, 1, -2),
            Reindex::Moved(p("items[1]"))
        );
        assert_eq!(p("items[2]").reindexed(&array, 1, -2), Reindex::Removed);
        assert_eq!(p("items[1].y").reindexed(&array, 1, -2), Reindex::Removed);
        assert_eq!(p("items[0]").reindexed(&array, 1, -2), Reindex::Unaffected);
    }

    #[test]
    fn test_serde_is_step_list() {
        let json = serde_json::to_string(&p("a[0]")).unwrap();
        assert_eq!(json, r#"[{"Field":"a"},{"Index":0}]"#);
        let back: Path = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p("a[0]"));
    }
}
