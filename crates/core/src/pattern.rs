//! Pattern compiler.
//!
//! A pattern is literal text with embedded `%(...)` groups:
//!
//! ```
//! use filefinder_core::Pattern;
//!
//! let pattern = Pattern::new("test_%(Y)-%(m)-%(d).ext", false).unwrap();
//! assert_eq!(pattern.regex(), r"test_(\d{4})\-(\d\d)\-(\d\d)\.ext");
//! ```

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::error::{Error, Result};
use crate::group::Group;
use crate::matches::Matches;
use crate::types::{FixValue, GroupKey};

/// Opening sequence of a group.
const GROUP_START: &str = "%(";

/// Number of characters shown for an unterminated group.
const UNBALANCED_PREVIEW: usize = 7;

/// A compiled pattern: groups and the literal segments between them.
#[derive(Debug, Clone)]
pub struct Pattern {
    pattern: String,
    use_regex: bool,
    /// Literal text at even indices, group text `%(...)` at odd indices.
    segments: Vec<String>,
    groups: Vec<Arc<Group>>,
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

impl Pattern {
    /// Compile a pattern.
    ///
    /// With `use_regex`, the literal text between groups is inserted in the
    /// regex as is, otherwise it is escaped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnbalancedGroup`] if a group is never closed, and any
    /// error raised while compiling a group definition.
    pub fn new(pattern: &str, use_regex: bool) -> Result<Self> {
        let (segments, groups) = scan(pattern)?;
        Ok(Self {
            pattern: pattern.to_string(),
            use_regex,
            segments,
            groups: groups.into_iter().map(Arc::new).collect(),
        })
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[must_use]
    pub fn use_regex(&self) -> bool {
        self.use_regex
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    #[must_use]
    pub fn groups(&self) -> &[Arc<Group>] {
        &self.groups
    }

    /// Regex matching the filenames of this pattern, with fixed groups
    /// narrowed to their values.
    #[must_use]
    pub fn regex(&self) -> String {
        self.segments
            .iter()
            .enumerate()
            .map(|(i, segment)| {
                if i % 2 == 1 {
                    self.groups[i / 2].get_regex()
                } else if self.use_regex {
                    segment.clone()
                } else {
                    regex::escape(segment)
                }
            })
            .collect()
    }

    /// Compile [`Pattern::regex`], anchored to match whole filenames.
    pub fn compile(&self) -> Result<Regex> {
        Ok(Regex::new(&format!("^(?:{})$", self.regex()))?)
    }

    /// Indices of the groups selected by `key`, in pattern order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no group is selected.
    pub fn get_group_indices(&self, key: impl Into<GroupKey>) -> Result<Vec<usize>> {
        select_groups(self.groups.iter().map(|g| g.as_ref()), &key.into())
    }

    /// Groups selected by `key`, in pattern order.
    pub fn get_groups(&self, key: impl Into<GroupKey>) -> Result<Vec<&Group>> {
        Ok(self
            .get_group_indices(key)?
            .into_iter()
            .map(|i| self.groups[i].as_ref())
            .collect())
    }

    /// Fix every group selected by `key` to `value`.
    ///
    /// Groups flagged `:discard` are left alone unless `fix_discard` is set.
    pub fn fix_group(
        &mut self,
        key: impl Into<GroupKey>,
        value: impl Into<FixValue>,
        fix_discard: bool,
    ) -> Result<()> {
        let value = value.into();
        for idx in self.get_group_indices(key)? {
            let group = Arc::make_mut(&mut self.groups[idx]);
            if group.discard() && !fix_discard {
                continue;
            }
            group.fix_value(value.clone())?;
        }
        Ok(())
    }

    /// Fix several groups at once.
    pub fn fix_groups<K, V>(
        &mut self,
        fixes: impl IntoIterator<Item = (K, V)>,
        fix_discard: bool,
    ) -> Result<()>
    where
        K: Into<GroupKey>,
        V: Into<FixValue>,
    {
        for (key, value) in fixes {
            self.fix_group(key, value, fix_discard)?;
        }
        Ok(())
    }

    /// Unfix the groups selected by each key.
    pub fn unfix_groups<K: Into<GroupKey>>(&mut self, keys: impl IntoIterator<Item = K>) -> Result<()> {
        for key in keys {
            for idx in self.get_group_indices(key)? {
                Arc::make_mut(&mut self.groups[idx]).unfix();
            }
        }
        Ok(())
    }

    /// Unfix every group.
    pub fn unfix_all(&mut self) {
        for group in &mut self.groups {
            if group.is_fixed() {
                Arc::make_mut(group).unfix();
            }
        }
    }

    /// Generate a filename, applying `fixes` on top of the groups already
    /// fixed. The pattern itself is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FilenameWithRegex`] for a pattern compiled with
    /// `use_regex`, and [`Error::UnfixedGroup`] if a group has no value.
    pub fn make_filename<K, V>(&self, fixes: impl IntoIterator<Item = (K, V)>) -> Result<String>
    where
        K: Into<GroupKey>,
        V: Into<FixValue>,
    {
        if self.use_regex {
            return Err(Error::FilenameWithRegex);
        }

        let mut groups: Vec<Group> = self.groups.iter().map(|g| g.as_ref().clone()).collect();
        for (key, value) in fixes {
            let value = value.into();
            for idx in select_groups(groups.iter(), &key.into())? {
                groups[idx].fix_value(value.clone())?;
            }
        }

        let mut filename = String::new();
        for (i, segment) in self.segments.iter().enumerate() {
            if i % 2 == 0 {
                filename.push_str(segment);
                continue;
            }
            let group = &groups[i / 2];
            let fixed = group.fixed_string().ok_or_else(|| Error::UnfixedGroup {
                group: group.to_string(),
            })?;
            filename.push_str(fixed);
        }
        Ok(filename)
    }

    /// Generate a filename from the groups already fixed.
    pub fn fixed_filename(&self) -> Result<String> {
        self.make_filename(std::iter::empty::<(GroupKey, FixValue)>())
    }

    /// Match a filename against the pattern.
    ///
    /// Returns `None` when the filename does not match. Compiles the regex on
    /// each call; use [`Matches::from_filename`] with [`Pattern::compile`] to
    /// match many filenames.
    pub fn match_filename(&self, filename: &str) -> Result<Option<Matches>> {
        let regex = self.compile()?;
        Matches::from_filename(filename, &regex, &self.groups)
    }
}

/// Indices of the groups selected by `key`.
///
/// An index selects one group, a name every group sharing it.
pub(crate) fn select_groups<'a>(
    groups: impl ExactSizeIterator<Item = &'a Group>,
    key: &GroupKey,
) -> Result<Vec<usize>> {
    let selected: Vec<usize> = match key {
        GroupKey::Index(i) if *i < groups.len() => vec![*i],
        GroupKey::Index(_) => Vec::new(),
        GroupKey::Name(name) => groups
            .enumerate()
            .filter(|(_, g)| g.name() == name)
            .map(|(i, _)| i)
            .collect(),
    };
    if selected.is_empty() {
        return Err(Error::not_found(key));
    }
    Ok(selected)
}

/// Split a pattern into segments and groups.
fn scan(pattern: &str) -> Result<(Vec<String>, Vec<Group>)> {
    let mut segments = Vec::new();
    let mut groups = Vec::new();
    let mut literal_start = 0;

    while let Some(offset) = pattern[literal_start..].find(GROUP_START) {
        let start = literal_start + offset;
        let inner_start = start + GROUP_START.len();
        let end = closing_paren(&pattern[inner_start..])
            .map(|i| inner_start + i)
            .ok_or_else(|| unbalanced(pattern, start))?;

        segments.push(pattern[literal_start..start].to_string());
        segments.push(pattern[start..=end].to_string());
        groups.push(Group::new(&pattern[inner_start..end], groups.len())?);
        literal_start = end + 1;
    }
    segments.push(pattern[literal_start..].to_string());

    Ok((segments, groups))
}

/// Byte offset of the parenthesis closing an already opened one.
fn closing_paren(s: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, b) in s.bytes().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn unbalanced(pattern: &str, start: usize) -> Error {
    let rest = &pattern[start..];
    let mut span: String = rest.chars().take(UNBALANCED_PREVIEW).collect();
    if span.len() < rest.len() {
        span.push_str("...");
    }
    Error::UnbalancedGroup { span }
}
