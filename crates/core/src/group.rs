//! Group compiler.
//!
//! A group is one `%(...)` span of a pattern. Its definition follows
//! `name[:fmt=<format-spec>][:rgx=<regex>][:bool=<true>[:<false>]][:opt][:discard]`,
//! specs in any order, each at most once.
//!
//! Some names come with a default regex and format (see [`BUILTIN_GROUPS`]).
//! Inside a group regex, `%<letter>` is replaced by the regex of the built-in
//! group of that name, and `%%` stands for a literal percent sign.

use std::collections::HashSet;
use std::fmt;

use crate::error::{Error, Result};
use crate::format::{FormatKind, FormatSpec};
use crate::types::{FixValue, Value};

/// A built-in group: name, regex and format spec.
#[derive(Debug, Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub regex: &'static str,
    pub format: &'static str,
}

const fn builtin(name: &'static str, regex: &'static str, format: &'static str) -> Builtin {
    Builtin {
        name,
        regex,
        format,
    }
}

/// Default regex and format of well-known group names.
pub const BUILTIN_GROUPS: &[Builtin] = &[
    builtin("I", r"\d+", "d"),
    builtin("Y", r"\d{4}", "04d"),
    builtin("m", r"\d\d", "02d"),
    builtin("d", r"\d\d", "02d"),
    builtin("j", r"\d{3}", "03d"),
    builtin("H", r"\d\d", "02d"),
    builtin("M", r"\d\d", "02d"),
    builtin("S", r"\d\d", "02d"),
    builtin("x", "%Y%m%d", "08d"),
    builtin("X", "%H%M%S", "06d"),
    builtin("F", "%Y-%m-%d", "s"),
    builtin("B", "[a-zA-Z]*", "s"),
    builtin("text", r"\w", "s"),
    builtin("char", r"\S*", "s"),
];

/// Nesting limit of `%letter` replacements.
const MAX_REPLACEMENT_DEPTH: usize = 8;

fn find_builtin<'a>(table: &'a [Builtin], name: &str) -> Option<&'a Builtin> {
    table.iter().find(|b| b.name == name)
}

/// Replace `%<letter>` in `regex` by the regex of the matching entry of
/// `table`, recursively. `%%` becomes `%`.
///
/// # Errors
///
/// Returns [`Error::UnknownReplacement`] for a letter absent from the table,
/// and [`Error::GroupParse`] when replacements nest too deep.
pub fn expand_replacements(regex: &str, table: &[Builtin]) -> Result<String> {
    expand_at_depth(regex, table, 0)
}

fn expand_at_depth(regex: &str, table: &[Builtin], depth: usize) -> Result<String> {
    if depth > MAX_REPLACEMENT_DEPTH {
        return Err(Error::group_parse(regex, "replacements nest too deep"));
    }
    let mut out = String::with_capacity(regex.len());
    let mut chars = regex.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('%') => {
                chars.next();
                out.push('%');
            }
            Some(letter) if letter.is_ascii_alphabetic() => {
                chars.next();
                let entry = find_builtin(table, letter.encode_utf8(&mut [0; 4])).ok_or_else(|| {
                    Error::UnknownReplacement {
                        letter,
                        regex: regex.to_string(),
                    }
                })?;
                out.push_str(&expand_at_depth(entry.regex, table, depth + 1)?);
            }
            _ => out.push('%'),
        }
    }
    Ok(out)
}

/// Fixed-value state of a group.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Fixed {
    #[default]
    Unfixed,
    Fixed {
        /// Value given by the caller.
        value: FixValue,
        /// String used when generating a filename.
        string: String,
        /// Regex replacing the group regex.
        regex: String,
    },
}

/// Spec keys of a group definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SpecKey {
    Fmt,
    Rgx,
    Bool,
    Opt,
    Discard,
}

impl SpecKey {
    fn as_str(self) -> &'static str {
        match self {
            Self::Fmt => "fmt",
            Self::Rgx => "rgx",
            Self::Bool => "bool",
            Self::Opt => "opt",
            Self::Discard => "discard",
        }
    }
}

/// Recognize the spec starting at `rest` (which starts with ':').
///
/// Returns the key, the length of its prefix, and whether a value follows.
fn spec_at(rest: &str) -> Option<(SpecKey, usize, bool)> {
    let valued = [(":fmt=", SpecKey::Fmt), (":rgx=", SpecKey::Rgx), (":bool=", SpecKey::Bool)];
    for (prefix, key) in valued {
        if rest.starts_with(prefix) {
            return Some((key, prefix.len(), true));
        }
    }
    let flags = [(":opt", SpecKey::Opt), (":discard", SpecKey::Discard), (":bool", SpecKey::Bool)];
    for (prefix, key) in flags {
        if let Some(after) = rest.strip_prefix(prefix) {
            if after.is_empty() || after.starts_with(':') {
                return Some((key, prefix.len(), false));
            }
        }
    }
    None
}

/// Specs found in a definition.
#[derive(Debug, Default)]
struct Specs<'a> {
    name: &'a str,
    fmt: Option<&'a str>,
    rgx: Option<&'a str>,
    bool: Option<&'a str>,
    opt: bool,
    discard: bool,
}

/// Split a definition into its specs.
///
/// A spec value runs until the next spec prefix. Every spec may appear once.
fn tokenize(definition: &str) -> Result<Specs<'_>> {
    let name_end = definition.find(':').unwrap_or(definition.len());
    let name = &definition[..name_end];
    if name.is_empty() {
        return Err(Error::group_parse(definition, "empty group name"));
    }

    let mut specs = Specs {
        name,
        ..Specs::default()
    };
    let mut seen = HashSet::new();
    let mut pos = name_end;

    while pos < definition.len() {
        let rest = &definition[pos..];
        let (key, prefix_len, valued) = spec_at(rest).ok_or_else(|| {
            Error::group_parse(definition, format!("unrecognized spec '{rest}'"))
        })?;
        if !seen.insert(key) {
            return Err(Error::group_parse(
                definition,
                format!("spec '{}' given more than once", key.as_str()),
            ));
        }

        let value_start = pos + prefix_len;
        let value_end = if valued {
            next_spec(definition, value_start)
        } else {
            value_start
        };
        let value = &definition[value_start..value_end];

        match key {
            SpecKey::Fmt => specs.fmt = Some(value),
            SpecKey::Rgx => specs.rgx = Some(value),
            SpecKey::Bool => specs.bool = Some(value),
            SpecKey::Opt => specs.opt = true,
            SpecKey::Discard => specs.discard = true,
        }
        pos = value_end;
    }

    Ok(specs)
}

/// Position of the next spec prefix at or after `from`, or the end.
fn next_spec(definition: &str, from: usize) -> usize {
    definition[from..]
        .match_indices(':')
        .map(|(i, _)| from + i)
        .find(|&i| spec_at(&definition[i..]).is_some())
        .unwrap_or(definition.len())
}

/// One group of a pattern.
#[derive(Debug, Clone)]
pub struct Group {
    definition: String,
    idx: usize,
    name: String,
    regex: String,
    format: FormatSpec,
    discard: bool,
    optional: bool,
    /// Literals for (false, true).
    options: Option<(String, String)>,
    fixed: Fixed,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.idx)
    }
}

impl Group {
    /// Compile a group definition (the text inside `%(...)`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::GroupParse`] if the definition does not follow the
    /// grammar, repeats a spec, or produces no regex. Errors from the format
    /// spec and from regex replacements are propagated.
    pub fn new(definition: &str, idx: usize) -> Result<Self> {
        Self::with_builtins(definition, idx, BUILTIN_GROUPS)
    }

    /// Same as [`Group::new`] with a custom table of built-in groups.
    pub fn with_builtins(definition: &str, idx: usize, builtins: &[Builtin]) -> Result<Self> {
        let specs = tokenize(definition)?;

        let mut regex = String::new();
        let mut format = FormatSpec::new("s")?;

        if let Some(default) = find_builtin(builtins, specs.name) {
            regex = default.regex.to_string();
            format = FormatSpec::new(default.format)?;
        }

        let rgx = specs.rgx.filter(|r| !r.is_empty());

        if let Some(fmt) = specs.fmt {
            if fmt.is_empty() {
                return Err(Error::group_parse(definition, "empty format spec"));
            }
            format = FormatSpec::new(fmt)?;
            if rgx.is_none() {
                regex = format.generate_expression();
            }
        }

        let mut options = None;
        if let Some(bool_spec) = specs.bool {
            let (when_true, when_false) = bool_spec.split_once(':').unwrap_or((bool_spec, ""));
            regex = format!("{}|{}", regex::escape(when_true), regex::escape(when_false));
            options = Some((when_false.to_string(), when_true.to_string()));
        }

        if let Some(rgx) = rgx {
            regex = rgx.to_string();
        }

        if regex.is_empty() {
            return Err(Error::group_parse(definition, "no regex has been produced"));
        }

        // Literal alternatives of ':bool' are not subject to replacements.
        if options.is_none() || rgx.is_some() {
            regex = expand_replacements(&regex, builtins)?;
        }

        Ok(Self {
            definition: definition.to_string(),
            idx,
            name: specs.name.to_string(),
            regex,
            format,
            discard: specs.discard,
            optional: specs.opt,
            options,
            fixed: Fixed::Unfixed,
        })
    }

    /// The definition this group was compiled from.
    #[must_use]
    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// Index of the group in its pattern.
    #[must_use]
    pub fn idx(&self) -> usize {
        self.idx
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compiled regex, ignoring any fixed value, without capturing group.
    #[must_use]
    pub fn regex(&self) -> &str {
        &self.regex
    }

    #[must_use]
    pub fn format_spec(&self) -> &FormatSpec {
        &self.format
    }

    /// Whether the group is left out of value lookups and date reconciliation.
    #[must_use]
    pub fn discard(&self) -> bool {
        self.discard
    }

    #[must_use]
    pub fn optional(&self) -> bool {
        self.optional
    }

    /// Literals of a `:bool` group, in (false, true) order.
    #[must_use]
    pub fn options(&self) -> Option<(&str, &str)> {
        self.options.as_ref().map(|(f, t)| (f.as_str(), t.as_str()))
    }

    #[must_use]
    pub fn fixed(&self) -> &Fixed {
        &self.fixed
    }

    #[must_use]
    pub fn is_fixed(&self) -> bool {
        matches!(self.fixed, Fixed::Fixed { .. })
    }

    #[must_use]
    pub fn fixed_value(&self) -> Option<&FixValue> {
        match &self.fixed {
            Fixed::Fixed { value, .. } => Some(value),
            Fixed::Unfixed => None,
        }
    }

    #[must_use]
    pub fn fixed_string(&self) -> Option<&str> {
        match &self.fixed {
            Fixed::Fixed { string, .. } => Some(string),
            Fixed::Unfixed => None,
        }
    }

    #[must_use]
    pub fn fixed_regex(&self) -> Option<&str> {
        match &self.fixed {
            Fixed::Fixed { regex, .. } => Some(regex),
            Fixed::Unfixed => None,
        }
    }

    /// Render a value with the group format.
    pub fn format(&self, value: &Value) -> Result<String> {
        self.format.format(value)
    }

    /// Parse a matched string into a value.
    ///
    /// A `:bool` group yields a boolean, other groups go through their format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValueParse`] when the string cannot be converted.
    pub fn parse(&self, s: &str) -> Result<Value> {
        if let Some((when_false, when_true)) = &self.options {
            if s == when_true {
                return Ok(Value::Bool(true));
            }
            if s == when_false {
                return Ok(Value::Bool(false));
            }
            return Err(Error::ValueParse {
                input: s.to_string(),
                pattern: self.regex.clone(),
            });
        }
        self.format.parse(s)
    }

    /// Convert user input (a plain number, a literal) into a value of the
    /// type this group holds.
    pub fn value_from_str(&self, s: &str) -> Result<Value> {
        let parse_error = || Error::ValueParse {
            input: s.to_string(),
            pattern: self.format.spec().to_string(),
        };
        if let Some((when_false, when_true)) = &self.options {
            return match s {
                _ if s == when_true || s == "true" => Ok(Value::Bool(true)),
                _ if s == when_false || s == "false" => Ok(Value::Bool(false)),
                _ => Err(parse_error()),
            };
        }
        match self.format.kind() {
            FormatKind::String => Ok(Value::Str(s.to_string())),
            FormatKind::Integer => s.trim().parse().map(Value::Int).map_err(|_| parse_error()),
            FormatKind::Float | FormatKind::Exponent { .. } => {
                s.trim().parse().map(Value::Float).map_err(|_| parse_error())
            }
        }
    }

    /// Pin the group to a value.
    ///
    /// A string is used verbatim, both in filenames and as a regex. A boolean
    /// selects one of the `:bool` literals. Other values are rendered with the
    /// group format, and escaped for the regex. With a list, the regex matches
    /// any element while filenames use the first one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFix`] for an empty list or a boolean on a group
    /// without `:bool`, and a format error if a value cannot be rendered.
    pub fn fix_value(&mut self, value: impl Into<FixValue>) -> Result<()> {
        let value = value.into();
        let elements: Vec<&Value> = match &value {
            FixValue::One(v) => vec![v],
            FixValue::List(list) => list.iter().collect(),
        };
        if elements.is_empty() {
            return Err(self.invalid_fix("a list of fixes must contain at least one element"));
        }

        let rendered = elements
            .into_iter()
            .map(|v| self.render_fix(v))
            .collect::<Result<Vec<_>>>()?;

        let string = rendered[0].0.clone();
        let regex = rendered
            .iter()
            .map(|(_, rgx)| rgx.as_str())
            .collect::<Vec<_>>()
            .join("|");

        self.fixed = Fixed::Fixed {
            value,
            string,
            regex,
        };
        Ok(())
    }

    /// Filename string and regex for one fixed element.
    fn render_fix(&self, value: &Value) -> Result<(String, String)> {
        match value {
            Value::Str(s) => Ok((s.clone(), s.clone())),
            Value::Bool(b) => {
                let (when_false, when_true) = self
                    .options()
                    .ok_or_else(|| self.invalid_fix("group has no ':bool' options"))?;
                let literal = if *b { when_true } else { when_false };
                Ok((literal.to_string(), regex::escape(literal)))
            }
            _ => {
                let s = self.format(value)?;
                let rgx = regex::escape(&s);
                Ok((s, rgx))
            }
        }
    }

    fn invalid_fix(&self, message: &str) -> Error {
        Error::InvalidFix {
            group: self.to_string(),
            message: message.to_string(),
        }
    }

    /// Revert to the compiled regex.
    pub fn unfix(&mut self) {
        self.fixed = Fixed::Unfixed;
    }

    /// Regex of the group as it appears in the pattern regex: the fixed regex
    /// if any, else the compiled one, inside a capturing group, optional with
    /// `:opt`.
    #[must_use]
    pub fn get_regex(&self) -> String {
        let rgx = self.fixed_regex().unwrap_or(&self.regex);
        let mut out = format!("({rgx})");
        if self.optional {
            out.push('?');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn assert_grp(definition: &str, expected_rgx: &str, expected_fmt: &str) {
        let grp = Group::new(definition, 0).unwrap();
        assert_eq!(grp.get_regex(), expected_rgx, "definition {definition}");
        assert_eq!(grp.format_spec().spec(), expected_fmt, "definition {definition}");
    }

    #[test]
    fn test_definition_parsing() {
        let g = Group::new("param:fmt=.2f:opt:discard", 3).unwrap();
        assert_eq!(g.name(), "param");
        assert_eq!(g.idx(), 3);
        assert!(g.optional());
        assert!(g.discard());
        assert_eq!(g.regex(), r"-?\d+\.\d{2}");
        assert_eq!(g.get_regex(), r"(-?\d+\.\d{2})?");
        assert_eq!(g.to_string(), "param:3");
    }

    #[test]
    fn test_specs_in_any_order() {
        let a = Group::new("a:discard:rgx=[a-z]+:opt", 0).unwrap();
        let b = Group::new("a:opt:discard:rgx=[a-z]+", 0).unwrap();
        assert_eq!(a.get_regex(), b.get_regex());
        assert_eq!(a.get_regex(), "([a-z]+)?");
        assert!(a.discard() && b.discard());
    }

    #[test]
    fn test_regex_value_with_colons() {
        let g = Group::new("a:rgx=foo:bar:opt", 0).unwrap();
        assert_eq!(g.regex(), "foo:bar");
        assert!(g.optional());

        let g = Group::new("a:rgx=x:optional", 0).unwrap();
        assert_eq!(g.regex(), "x:optional");
        assert!(!g.optional());
    }

    #[test]
    fn test_bool_regex() {
        let g = Group::new("name:bool=yes.1:no", 0).unwrap();
        assert_eq!(g.regex(), r"yes\.1|no");
        assert_eq!(g.options(), Some(("no", "yes.1")));

        let g = Group::new("name:bool=_yes", 0).unwrap();
        assert_eq!(g.regex(), "_yes|");
        assert_eq!(g.options(), Some(("", "_yes")));

        let g = Group::new("name:bool", 0).unwrap();
        assert_eq!(g.regex(), "|");
        assert_eq!(g.options(), Some(("", "")));
    }

    #[test]
    fn test_bool_literals_are_not_replaced() {
        let g = Group::new("name:bool=100%d:none", 0).unwrap();
        assert_eq!(g.regex(), "100%d|none");
    }

    #[test]
    fn test_bad_definition() {
        let specs = [
            "",
            ":fmt=08d",
            "a:opt=stuff",
            "a:discard=stuff",
            "a:fmt=",
            "a:opt:fmt=02d:opt",
            "a:rgx=foo:rgx=bar",
            "a:opt:rgx=bar:opt:opt",
            "a:optional",
            "a:fmt",
            "a",
            "a:opt",
            "a:rgx=",
        ];
        for spec in specs {
            assert!(
                matches!(Group::new(spec, 0), Err(Error::GroupParse { .. })),
                "'{spec}' should be rejected"
            );
        }
    }

    #[test]
    fn test_some_default_names() {
        assert_grp("I", r"(\d+)", "d");
        assert_grp("Y", r"(\d{4})", "04d");
        assert_grp("m", r"(\d\d)", "02d");
        assert_grp("x", r"(\d{4}\d\d\d\d)", "08d");
        assert_grp("X", r"(\d\d\d\d\d\d)", "06d");
        assert_grp("F", r"(\d{4}-\d\d-\d\d)", "s");
        assert_grp("B", r"([a-zA-Z]*)", "s");
    }

    #[test]
    fn test_default_overwrite() {
        assert_grp("Y:rgx=[a-z]*?", "([a-z]*?)", "04d");
        assert_grp("Y:rgx=foo:fmt=s", "(foo)", "s");
        assert_grp("Y:rgx=foo:fmt=s:opt:discard", "(foo)?", "s");
        let expected = format!("({})", FormatSpec::new("08d").unwrap().generate_expression());
        assert_grp("Y:fmt=08d", &expected, "08d");
        assert_grp("Y:bool=true:false:fmt=s", "(true|false)", "s");
    }

    #[test]
    fn test_percent_rgx() {
        assert_grp("foo:rgx=a-%x", r"(a-\d{4}\d\d\d\d)", "s");
        assert_grp("foo:rgx=%Y.%m.%d", r"(\d{4}.\d\d.\d\d)", "s");
        assert_grp("foo:rgx=%Y-100%%", r"(\d{4}-100%)", "s");

        assert!(matches!(
            Group::new("foo:rgx=%e", 0),
            Err(Error::UnknownReplacement { letter: 'e', .. })
        ));
    }

    #[test]
    fn test_expansion_depth_is_bounded() {
        let table = [builtin("a", "%a", "s")];
        assert!(matches!(
            expand_replacements("%a", &table),
            Err(Error::GroupParse { .. })
        ));
    }

    #[test]
    fn test_fix_format_number() {
        let mut g = Group::new("foo:fmt=+08.2f", 0).unwrap();
        g.fix_value(-3.14159).unwrap();
        assert_eq!(g.fixed_value(), Some(&FixValue::One(Value::Float(-3.14159))));
        assert_eq!(g.fixed_string(), Some("-0003.14"));
        assert_eq!(g.fixed_regex(), Some(r"\-0003\.14"));
        assert_eq!(g.get_regex(), r"(\-0003\.14)");
    }

    #[test]
    fn test_fix_value_consecutive() {
        let mut g = Group::new("foo:fmt=d", 0).unwrap();
        let before = g.get_regex();
        g.fix_value(12i64).unwrap();
        assert_eq!(g.fixed_value(), Some(&FixValue::One(Value::Int(12))));
        g.unfix();
        assert_eq!(g.fixed_value(), None);
        assert_eq!(g.get_regex(), before);
        g.fix_value(-4i64).unwrap();
        assert_eq!(g.fixed_string(), Some("-4"));
    }

    #[test]
    fn test_fix_value_string() {
        let mut g = Group::new("foo:fmt=s", 0).unwrap();
        g.fix_value("a|b.c").unwrap();
        assert_eq!(g.fixed_string(), Some("a|b.c"));
        assert_eq!(g.fixed_regex(), Some("a|b.c"));
        assert_eq!(g.get_regex(), "(a|b.c)");
    }

    #[test]
    fn test_fix_value_bool() {
        let mut g = Group::new("foo:bool=opt1:opt2", 0).unwrap();
        g.fix_value(true).unwrap();
        assert_eq!(g.fixed_string(), Some("opt1"));
        assert_eq!(g.fixed_regex(), Some("opt1"));
        g.fix_value(false).unwrap();
        assert_eq!(g.fixed_string(), Some("opt2"));

        let mut g = Group::new("Y", 0).unwrap();
        assert!(matches!(g.fix_value(true), Err(Error::InvalidFix { .. })));
    }

    #[test]
    fn test_fix_value_integer_list() {
        let mut g = Group::new("foo:fmt=+03d", 0).unwrap();
        g.fix_value(vec![5i64, -6, 70]).unwrap();
        assert_eq!(g.fixed_string(), Some("+05"));
        assert_eq!(g.fixed_regex(), Some(r"\+05|\-06|\+70"));

        assert!(matches!(
            g.fix_value(Vec::<i64>::new()),
            Err(Error::InvalidFix { .. })
        ));
    }

    #[test]
    fn test_parse_values() {
        let g = Group::new("Y", 0).unwrap();
        assert_eq!(g.parse("2020").unwrap(), Value::Int(2020));

        let g = Group::new("o:bool=yes:no", 0).unwrap();
        assert_eq!(g.parse("yes").unwrap(), Value::Bool(true));
        assert_eq!(g.parse("no").unwrap(), Value::Bool(false));
        assert!(g.parse("maybe").is_err());
    }

    #[test]
    fn test_value_from_str() {
        let g = Group::new("m", 0).unwrap();
        assert_eq!(g.value_from_str("5").unwrap(), Value::Int(5));
        let g = Group::new("p:fmt=.1f", 0).unwrap();
        assert_eq!(g.value_from_str("2.5").unwrap(), Value::Float(2.5));
        let g = Group::new("o:bool=_yes", 0).unwrap();
        assert_eq!(g.value_from_str("_yes").unwrap(), Value::Bool(true));
        assert_eq!(g.value_from_str("false").unwrap(), Value::Bool(false));
        let g = Group::new("char", 0).unwrap();
        assert_eq!(g.value_from_str("abc").unwrap(), Value::from("abc"));
    }
}
