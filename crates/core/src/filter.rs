//! Filters applied to matched files.
//!
//! A filter looks at a file once it matched the pattern and decides whether
//! to keep it. Several filters combine with AND logic in a [`CompositeFilter`].
//!
//! # Example
//!
//! ```
//! use filefinder_core::filter::{filter_by_range, CompositeFilter, Filter};
//! use filefinder_core::Pattern;
//!
//! let pattern = Pattern::new("data_%(Y)_%(idx:fmt=d).nc", false).unwrap();
//! let filter = CompositeFilter::new()
//!     .with_filter(Box::new(filter_by_range("Y", Some(2000.0), None)))
//!     .with_filter(Box::new(filter_by_range("idx", None, Some(5.0))));
//!
//! let keep = pattern.match_filename("data_2001_3.nc").unwrap().unwrap();
//! let drop = pattern.match_filename("data_1999_3.nc").unwrap().unwrap();
//! assert!(filter.is_valid(&pattern, "data_2001_3.nc", &keep));
//! assert!(!filter.is_valid(&pattern, "data_1999_3.nc", &drop));
//! ```

use std::fmt;

use chrono::NaiveDateTime;

use crate::date::DefaultDate;
use crate::matches::Matches;
use crate::pattern::Pattern;
use crate::types::{GroupKey, Value};

/// Decides whether a matched file is kept.
pub trait Filter: Send + Sync {
    fn is_valid(&self, pattern: &Pattern, filename: &str, matches: &Matches) -> bool;

    /// Short human readable description.
    fn description(&self) -> String;

    /// Key of the groups this filter checks, if it checks groups.
    fn group_key(&self) -> Option<&GroupKey> {
        None
    }

    fn checks_date(&self) -> bool {
        false
    }
}

impl<F> Filter for F
where
    F: Fn(&Pattern, &str, &Matches) -> bool + Send + Sync,
{
    fn is_valid(&self, pattern: &Pattern, filename: &str, matches: &Matches) -> bool {
        self(pattern, filename, matches)
    }

    fn description(&self) -> String {
        "custom".to_string()
    }
}

type ValuePredicate = Box<dyn Fn(&Value) -> bool + Send + Sync>;

/// Keeps files whose groups selected by a key all satisfy a predicate.
///
/// Groups flagged `:discard` are not checked. A value that cannot be parsed
/// fails the filter, as does a key selecting no group.
pub struct GroupFilter {
    key: GroupKey,
    description: String,
    predicate: ValuePredicate,
}

impl GroupFilter {
    pub fn new(
        key: impl Into<GroupKey>,
        description: impl Into<String>,
        predicate: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            key: key.into(),
            description: description.into(),
            predicate: Box::new(predicate),
        }
    }

    #[must_use]
    pub fn key(&self) -> &GroupKey {
        &self.key
    }
}

impl Filter for GroupFilter {
    fn is_valid(&self, _pattern: &Pattern, filename: &str, matches: &Matches) -> bool {
        match matches.get_matches(self.key.clone(), false) {
            Ok(selected) => selected
                .iter()
                .all(|m| m.try_value().is_some_and(|v| (self.predicate)(v))),
            Err(e) => {
                tracing::debug!(filename, error = %e, "group filter rejects file");
                false
            }
        }
    }

    fn description(&self) -> String {
        format!("{}: {}", self.key, self.description)
    }

    fn group_key(&self) -> Option<&GroupKey> {
        Some(&self.key)
    }
}

impl fmt::Debug for GroupFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupFilter")
            .field("key", &self.key)
            .field("description", &self.description)
            .finish()
    }
}

/// Keep files whose numeric values for `key` lie in `[min, max]`.
///
/// Either bound can be left open.
pub fn filter_by_range(key: impl Into<GroupKey>, min: Option<f64>, max: Option<f64>) -> GroupFilter {
    let bound = |b: Option<f64>| b.map_or_else(|| "..".to_string(), |v| v.to_string());
    let description = format!("in [{}, {}]", bound(min), bound(max));
    GroupFilter::new(key, description, move |value| {
        value.as_f64().is_some_and(|v| {
            min.map_or(true, |lo| v >= lo) && max.map_or(true, |hi| v <= hi)
        })
    })
}

/// Keeps files whose date lies in `[start, stop]`.
///
/// Files whose date cannot be reconciled are rejected.
#[derive(Debug, Clone, Default)]
pub struct DateRangeFilter {
    start: Option<NaiveDateTime>,
    stop: Option<NaiveDateTime>,
    default: DefaultDate,
}

impl DateRangeFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject files dated before `start`.
    #[must_use]
    pub fn with_start(mut self, start: NaiveDateTime) -> Self {
        self.start = Some(start);
        self
    }

    /// Reject files dated after `stop`.
    #[must_use]
    pub fn with_stop(mut self, stop: NaiveDateTime) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Default date used for reconciliation.
    #[must_use]
    pub fn with_default(mut self, default: DefaultDate) -> Self {
        self.default = default;
        self
    }

    #[must_use]
    pub fn contains(&self, date: &NaiveDateTime) -> bool {
        self.start.map_or(true, |start| *date >= start) && self.stop.map_or(true, |stop| *date <= stop)
    }
}

impl Filter for DateRangeFilter {
    fn is_valid(&self, _pattern: &Pattern, filename: &str, matches: &Matches) -> bool {
        match matches.get_date(&self.default) {
            Ok(date) => self.contains(&date),
            Err(e) => {
                tracing::debug!(filename, error = %e, "could not date file");
                false
            }
        }
    }

    fn description(&self) -> String {
        let bound = |d: Option<NaiveDateTime>| d.map_or_else(|| "..".to_string(), |d| d.to_string());
        format!("date in [{}, {}]", bound(self.start), bound(self.stop))
    }

    fn checks_date(&self) -> bool {
        true
    }
}

/// Combines filters with AND logic.
///
/// A file is kept only if every filter keeps it. An empty composite keeps
/// everything.
#[derive(Default)]
pub struct CompositeFilter {
    filters: Vec<Box<dyn Filter>>,
}

impl CompositeFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter (builder pattern).
    #[must_use]
    pub fn with_filter(mut self, filter: Box<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn add_filter(&mut self, filter: Box<dyn Filter>) {
        self.filters.push(filter);
    }

    pub fn clear(&mut self) {
        self.filters.clear();
    }

    /// Remove the filters checking the groups selected by `key`.
    ///
    /// Returns the number of filters removed.
    pub fn remove_by_group(&mut self, key: &GroupKey) -> usize {
        let before = self.filters.len();
        self.filters.retain(|f| f.group_key() != Some(key));
        before - self.filters.len()
    }

    /// Remove the filters checking dates.
    pub fn remove_by_date(&mut self) -> usize {
        let before = self.filters.len();
        self.filters.retain(|f| !f.checks_date());
        before - self.filters.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    #[must_use]
    pub fn filter_descriptions(&self) -> Vec<String> {
        self.filters.iter().map(|f| f.description()).collect()
    }
}

impl Filter for CompositeFilter {
    fn is_valid(&self, pattern: &Pattern, filename: &str, matches: &Matches) -> bool {
        self.filters
            .iter()
            .all(|f| f.is_valid(pattern, filename, matches))
    }

    fn description(&self) -> String {
        if self.filters.is_empty() {
            "composite(empty)".to_string()
        } else {
            format!("composite({})", self.filter_descriptions().join(" AND "))
        }
    }
}

impl fmt::Debug for CompositeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeFilter")
            .field("filters", &self.filter_descriptions())
            .finish()
    }
}
