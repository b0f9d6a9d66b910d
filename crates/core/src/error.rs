//! Errors raised while compiling patterns, matching filenames and
//! reconciling dates.

use std::path::PathBuf;

/// Convenient result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in filefinder operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Group definition does not follow the grammar, repeats a spec, has an
    /// empty name or produces no regex.
    #[error("invalid group definition '{definition}': {message}")]
    GroupParse { definition: String, message: String },

    /// A `%letter` in a group regex does not name a built-in group.
    #[error("unknown replacement '%{letter}' in group regex '{regex}'")]
    UnknownReplacement { letter: char, regex: String },

    /// Malformed format spec, or an option the kind does not support.
    #[error("invalid format spec '{spec}': {message}")]
    Format { spec: String, message: String },

    /// Numeric format whose output could not be parsed back unambiguously.
    #[error("dangerous format spec '{spec}': fill '{fill}', align '{align}' and sign '{sign}' make the output ambiguous")]
    DangerousFormat {
        spec: String,
        fill: char,
        align: char,
        sign: char,
    },

    /// A `%(` span never finds its matching `)`.
    #[error("no group end found for '{span}'")]
    UnbalancedGroup { span: String },

    /// The compiled regex does not have one capture group per pattern group.
    #[error("{captures} captured groups for {groups} pattern groups; does a group regex contain a capturing group?")]
    StructureMismatch { groups: usize, captures: usize },

    /// A matched string could not be converted by its format.
    #[error("could not parse '{input}' with pattern '{pattern}'")]
    ValueParse { input: String, pattern: String },

    /// A value cannot be pinned onto a group.
    #[error("cannot fix group '{group}': {message}")]
    InvalidFix { group: String, message: String },

    /// Filename generation with a group lacking a fixed value.
    #[error("group '{group}' has no fixed value")]
    UnfixedGroup { group: String },

    /// Filename generation on a pattern whose literal text is a regex.
    #[error("cannot generate a filename when regex is used outside groups")]
    FilenameWithRegex,

    /// Several date groups disagree on a calendar element.
    #[error("conflicting values for {element}: {values:?}")]
    DateConflict { element: String, values: Vec<i64> },

    /// Several groups sharing a name hold different values.
    #[error("groups '{key}' have different values: {values}")]
    ValueConflict { key: String, values: String },

    /// Unrecognized month name or abbreviation.
    #[error("unknown month name '{0}'")]
    UnknownMonth(String),

    /// Reconciled components do not form a calendar date.
    #[error("invalid date {year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}")]
    InvalidDate {
        year: i64,
        month: i64,
        day: i64,
        hour: i64,
        minute: i64,
        second: i64,
    },

    /// A lookup by group key matched nothing.
    #[error("no group found for key '{key}'")]
    NotFound { key: String },

    /// A filename did not match the pattern.
    #[error("filename '{0}' does not match the pattern")]
    NoMatch(String),

    /// Path outside of the finder root.
    #[error("path '{0}' is not under the finder root")]
    OutsideRoot(PathBuf),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

impl Error {
    pub(crate) fn group_parse(definition: &str, message: impl Into<String>) -> Self {
        Self::GroupParse {
            definition: definition.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn format(spec: &str, message: impl Into<String>) -> Self {
        Self::Format {
            spec: spec.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn not_found(key: impl ToString) -> Self {
        Self::NotFound {
            key: key.to_string(),
        }
    }
}
