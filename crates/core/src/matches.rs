//! Values extracted from a matched filename.
//!
//! A [`Matches`] holds one [`Match`] per group of the pattern. Each match
//! parses its string lazily, the first time its value is requested.

use std::fmt;
use std::sync::{Arc, OnceLock};

use chrono::NaiveDateTime;
use regex::Regex;

use crate::date::{self, DefaultDate};
use crate::error::{Error, Result};
use crate::group::Group;
use crate::pattern::select_groups;
use crate::types::{GroupKey, Value};

/// Outcome of parsing a matched string.
#[derive(Debug, Clone, PartialEq)]
enum Parsed {
    Ok(Value),
    Failed,
}

/// The part of a filename captured by one group.
#[derive(Debug, Clone)]
pub struct Match {
    group: Arc<Group>,
    raw: String,
    /// Byte offsets, `None` if an optional group did not participate.
    span: Option<(usize, usize)>,
    /// Empty until a value is first requested.
    parsed: OnceLock<Parsed>,
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.group, self.raw)
    }
}

impl Match {
    pub fn new(group: Arc<Group>, raw: impl Into<String>, span: Option<(usize, usize)>) -> Self {
        Self {
            group,
            raw: raw.into(),
            span,
            parsed: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn group(&self) -> &Group {
        &self.group
    }

    /// String matched in the filename.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn span(&self) -> Option<(usize, usize)> {
        self.span
    }

    #[must_use]
    pub fn start(&self) -> Option<usize> {
        self.span.map(|(start, _)| start)
    }

    #[must_use]
    pub fn end(&self) -> Option<usize> {
        self.span.map(|(_, end)| end)
    }

    fn parsed(&self) -> &Parsed {
        self.parsed.get_or_init(|| {
            if self.span.is_none() {
                tracing::debug!(group = %self.group, "group did not participate in the match");
                return Parsed::Failed;
            }
            match self.group.parse(&self.raw) {
                Ok(value) => Parsed::Ok(value),
                Err(e) => {
                    tracing::debug!(group = %self.group, raw = %self.raw, error = %e, "failed to parse match");
                    Parsed::Failed
                }
            }
        })
    }

    /// Parsed value, or `None` if parsing failed.
    #[must_use]
    pub fn try_value(&self) -> Option<&Value> {
        match self.parsed() {
            Parsed::Ok(value) => Some(value),
            Parsed::Failed => None,
        }
    }

    /// Parsed value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValueParse`] if the matched string could not be parsed.
    pub fn value(&self) -> Result<&Value> {
        self.try_value().ok_or_else(|| Error::ValueParse {
            input: self.raw.clone(),
            pattern: self.group.get_regex(),
        })
    }

    #[must_use]
    pub fn can_parse(&self) -> bool {
        self.try_value().is_some()
    }
}

/// Matches of every group for one filename.
#[derive(Debug, Clone)]
pub struct Matches {
    matches: Vec<Match>,
}

impl fmt::Display for Matches {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, m) in self.matches.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{m}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Matches {
    type Item = &'a Match;
    type IntoIter = std::slice::Iter<'a, Match>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.iter()
    }
}

impl Matches {
    /// Match `filename` against `regex`, which must be anchored on both ends
    /// (see [`crate::Pattern::compile`]).
    ///
    /// Returns `None` if the filename does not match.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StructureMismatch`] when the regex does not have one
    /// capturing group per pattern group.
    pub fn from_filename(filename: &str, regex: &Regex, groups: &[Arc<Group>]) -> Result<Option<Self>> {
        let Some(captures) = regex.captures(filename) else {
            return Ok(None);
        };

        let n_captures = captures.len() - 1;
        if n_captures != groups.len() {
            return Err(Error::StructureMismatch {
                groups: groups.len(),
                captures: n_captures,
            });
        }

        let matches = groups
            .iter()
            .enumerate()
            .map(|(i, group)| match captures.get(i + 1) {
                Some(m) => Match::new(Arc::clone(group), m.as_str(), Some((m.start(), m.end()))),
                None => Match::new(Arc::clone(group), "", None),
            })
            .collect();

        Ok(Some(Self { matches }))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Match> {
        self.matches.iter()
    }

    /// Match of the group at index `idx`.
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&Match> {
        self.matches.get(idx)
    }

    /// Matches of the groups selected by `key`.
    ///
    /// Groups flagged `:discard` are left out unless `keep_discard` is set,
    /// so the result can be empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the key selects no group at all.
    pub fn get_matches(&self, key: impl Into<GroupKey>, keep_discard: bool) -> Result<Vec<&Match>> {
        let indices = select_groups(self.matches.iter().map(Match::group), &key.into())?;
        Ok(indices
            .into_iter()
            .map(|i| &self.matches[i])
            .filter(|m| keep_discard || !m.group.discard())
            .collect())
    }

    /// Parsed values of the groups selected by `key`.
    ///
    /// # Errors
    ///
    /// Fails if the key selects no group or if one of the values cannot be
    /// parsed.
    pub fn get_values(&self, key: impl Into<GroupKey>, keep_discard: bool) -> Result<Vec<Value>> {
        self.get_matches(key, keep_discard)?
            .into_iter()
            .map(|m| m.value().cloned())
            .collect()
    }

    /// Parsed value of the first group selected by `key`.
    ///
    /// When several groups are selected and hold different values, the first
    /// one wins and a warning is logged. Use [`Matches::check_agreement`] to
    /// reject such filenames.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no (non-discarded) group is selected.
    pub fn get_value(&self, key: impl Into<GroupKey>, keep_discard: bool) -> Result<Value> {
        let key = key.into();
        let mut values = self.get_values(key.clone(), keep_discard)?.into_iter();
        let first = values.next().ok_or_else(|| Error::not_found(&key))?;
        let others: Vec<Value> = values.collect();
        if others.iter().any(|v| *v != first) {
            tracing::warn!(key = %key, first = %first, others = ?others, "different parsed values for key");
        }
        Ok(first)
    }

    /// Matched strings of the groups selected by `key`.
    pub fn get_strings(&self, key: impl Into<GroupKey>, keep_discard: bool) -> Result<Vec<&str>> {
        Ok(self
            .get_matches(key, keep_discard)?
            .into_iter()
            .map(Match::raw)
            .collect())
    }

    /// Matched string of the first group selected by `key`.
    pub fn get_string(&self, key: impl Into<GroupKey>, keep_discard: bool) -> Result<&str> {
        let key = key.into();
        self.get_strings(key.clone(), keep_discard)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(&key))
    }

    /// Value shared by every (non-discarded) group selected by `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValueConflict`] if the groups disagree.
    pub fn check_agreement(&self, key: impl Into<GroupKey>) -> Result<Value> {
        let key = key.into();
        let values = self.get_values(key.clone(), false)?;
        let first = values.first().cloned().ok_or_else(|| Error::not_found(&key))?;
        if values.iter().any(|v| *v != first) {
            return Err(Error::ValueConflict {
                key: key.to_string(),
                values: format!("{values:?}"),
            });
        }
        Ok(first)
    }

    /// Date of the filename, see [`date::reconcile`].
    pub fn get_date(&self, default: &DefaultDate) -> Result<NaiveDateTime> {
        date::reconcile(self, default)
    }
}
