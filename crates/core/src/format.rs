//! Format spec compiler.
//!
//! Parses format specs of the mini-language
//! `[[fill]align][sign]["#"]["0"][width][,_][.precision][type]` and uses them
//! three ways: render a value as a string, generate a regular expression
//! matching every string rendered that way, and parse such a string back into
//! a value.
//!
//! Only the `s`, `d`, `f`, `e` and `E` types are supported. Some fill,
//! alignment and sign combinations produce strings that cannot be parsed back
//! unambiguously; those are rejected when the spec is built.
//!
//! ```
//! use filefinder_core::{FormatSpec, Value};
//!
//! let fmt = FormatSpec::new("05.1f").unwrap();
//! assert_eq!(fmt.format(&Value::Float(2.5)).unwrap(), "002.5");
//! assert_eq!(fmt.parse("002.5").unwrap(), Value::Float(2.5));
//! ```

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::types::Value;

/// Grammar of a format spec.
fn spec_regex() -> &'static Regex {
    static SPEC: OnceLock<Regex> = OnceLock::new();
    SPEC.get_or_init(|| {
        Regex::new(concat!(
            r"^(?s)(?:(?P<fill>.)?(?P<align>[<>=^]))?",
            r"(?P<sign>[-+ ])?",
            r"(?P<alternate>#)?(?P<zero>0)?",
            r"(?P<width>\d+)?",
            r"(?P<grouping>[,_])?",
            r"(?:\.(?P<precision>\d+))?",
            r"(?P<type>[a-zA-Z])$",
        ))
        .expect("format spec grammar is a valid regex")
    })
}

/// Type of value handled by a spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    /// `s`
    String,
    /// `d`
    Integer,
    /// `f`
    Float,
    /// `e` or `E`
    Exponent { upper: bool },
}

impl FormatKind {
    fn from_type(c: char) -> Option<Self> {
        match c {
            's' => Some(Self::String),
            'd' => Some(Self::Integer),
            'f' => Some(Self::Float),
            'e' => Some(Self::Exponent { upper: false }),
            'E' => Some(Self::Exponent { upper: true }),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::String)
    }
}

/// Position of the value inside its padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    /// `<`
    Left,
    /// `>`
    Right,
    /// `^`
    Center,
    /// `=`, padding goes between the sign and the digits.
    SignAware,
}

impl Align {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '<' => Some(Self::Left),
            '>' => Some(Self::Right),
            '^' => Some(Self::Center),
            '=' => Some(Self::SignAware),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_char(self) -> char {
        match self {
            Self::Left => '<',
            Self::Right => '>',
            Self::Center => '^',
            Self::SignAware => '=',
        }
    }
}

/// When to show the sign of a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    /// `+`
    Always,
    /// `-`
    NegativeOnly,
    /// ` `, a space in front of positive numbers.
    Space,
}

impl Sign {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Self::Always),
            '-' => Some(Self::NegativeOnly),
            ' ' => Some(Self::Space),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_char(self) -> char {
        match self {
            Self::Always => '+',
            Self::NegativeOnly => '-',
            Self::Space => ' ',
        }
    }
}

/// A compiled format spec.
///
/// Immutable once built. The regex used by [`FormatSpec::parse`] is compiled
/// on first use and cached.
#[derive(Debug, Clone)]
pub struct FormatSpec {
    spec: String,
    kind: FormatKind,
    fill: char,
    align: Align,
    sign: Sign,
    alternate: bool,
    zero: bool,
    width: usize,
    grouping: Option<char>,
    precision: usize,
    parser: OnceLock<Regex>,
}

impl PartialEq for FormatSpec {
    fn eq(&self, other: &Self) -> bool {
        self.spec == other.spec
    }
}

impl fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec)
    }
}

impl FormatSpec {
    /// Parse a format spec.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] if the spec does not follow the grammar, uses
    /// an unsupported type, or an option its type does not support.
    /// Returns [`Error::DangerousFormat`] for numeric specs whose output could
    /// not be parsed back.
    pub fn new(spec: &str) -> Result<Self> {
        let caps = spec_regex()
            .captures(spec)
            .ok_or_else(|| Error::format(spec, "does not follow the format mini-language"))?;

        let char_of = |name: &str| caps.name(name).and_then(|m| m.as_str().chars().next());

        let type_char = char_of("type").unwrap_or('s');
        let kind = FormatKind::from_type(type_char).ok_or_else(|| {
            Error::format(spec, format!("unsupported type '{type_char}', expected one of 'sdfeE'"))
        })?;

        let explicit_fill = char_of("fill");
        let explicit_align = char_of("align").and_then(Align::from_char);
        let explicit_sign = char_of("sign").and_then(Sign::from_char);
        let alternate = caps.name("alternate").is_some();
        let zero = caps.name("zero").is_some();
        let grouping = char_of("grouping");
        let width = match caps.name("width") {
            Some(m) => m
                .as_str()
                .parse()
                .map_err(|_| Error::format(spec, "width is too large"))?,
            None => 0,
        };
        let explicit_precision = match caps.name("precision") {
            Some(m) => Some(
                m.as_str()
                    .parse()
                    .map_err(|_| Error::format(spec, "precision is too large"))?,
            ),
            None => None,
        };

        if kind == FormatKind::String {
            let forbidden = [
                (explicit_sign.is_some(), "sign"),
                (alternate, "alternate form (#)"),
                (zero, "zero padding"),
                (grouping.is_some(), "grouping"),
                (explicit_precision.is_some(), "precision"),
                (explicit_align == Some(Align::SignAware), "'=' alignment"),
            ];
            if let Some((_, what)) = forbidden.iter().find(|(present, _)| *present) {
                return Err(Error::format(spec, format!("{what} not allowed with type 's'")));
            }
        }
        if kind == FormatKind::Integer && explicit_precision.is_some() {
            return Err(Error::format(spec, "precision not allowed with type 'd'"));
        }

        // '0' before the width selects zero padding, sign-aware unless an
        // alignment was given.
        let (fill, align) = match (explicit_fill, explicit_align) {
            (Some(f), Some(a)) => (f, a),
            (None, Some(a)) => (if zero { '0' } else { ' ' }, a),
            (_, None) if zero => ('0', Align::SignAware),
            (_, None) if kind.is_numeric() => (' ', Align::Right),
            (_, None) => (' ', Align::Left),
        };
        let sign = explicit_sign.unwrap_or(Sign::NegativeOnly);

        let format = Self {
            spec: spec.to_string(),
            kind,
            fill,
            align,
            sign,
            alternate,
            zero,
            width,
            grouping,
            precision: explicit_precision.unwrap_or(6),
            parser: OnceLock::new(),
        };
        format.check_dangerous()?;
        Ok(format)
    }

    /// Reject numeric specs whose padding cannot be told apart from the
    /// sign or the digits.
    fn check_dangerous(&self) -> Result<()> {
        if !self.kind.is_numeric() {
            return Ok(());
        }
        let fill_on_left = matches!(self.align, Align::Right | Align::Center | Align::SignAware);
        let digit_fill = self.fill.is_ascii_digit() && !(self.fill == '0' && self.align == Align::SignAware);
        let minus_fill = self.fill == '-' && (fill_on_left || self.sign == Sign::Always);
        if digit_fill || minus_fill {
            return Err(Error::DangerousFormat {
                spec: self.spec.clone(),
                fill: self.fill,
                align: self.align.as_char(),
                sign: self.sign.as_char(),
            });
        }
        Ok(())
    }

    /// The spec string this was built from.
    #[must_use]
    pub fn spec(&self) -> &str {
        &self.spec
    }

    #[must_use]
    pub fn kind(&self) -> FormatKind {
        self.kind
    }

    #[must_use]
    pub fn fill(&self) -> char {
        self.fill
    }

    #[must_use]
    pub fn align(&self) -> Align {
        self.align
    }

    #[must_use]
    pub fn sign(&self) -> Sign {
        self.sign
    }

    #[must_use]
    pub fn alternate(&self) -> bool {
        self.alternate
    }

    #[must_use]
    pub fn zero_pad(&self) -> bool {
        self.zero
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn grouping(&self) -> Option<char> {
        self.grouping
    }

    /// Digits after the decimal point (float kinds only, 6 by default).
    #[must_use]
    pub fn precision(&self) -> usize {
        self.precision
    }

    // ------------------------------------------------------------------
    // Regex generation
    // ------------------------------------------------------------------

    /// Regular expression matching strings rendered with this spec.
    ///
    /// The expression contains no capturing group.
    #[must_use]
    pub fn generate_expression(&self) -> String {
        self.build_expression(false)
    }

    fn build_expression(&self, capture: bool) -> String {
        let wrap = |rgx: String| if capture { format!("({rgx})") } else { rgx };
        let inner = match self.kind {
            FormatKind::String => wrap(".*?".to_string()),
            FormatKind::Integer => wrap(self.sign_regex()) + &self.sign_aware_fill() + &wrap(self.left_of_decimal()),
            FormatKind::Float => {
                wrap(self.sign_regex())
                    + &self.sign_aware_fill()
                    + &wrap(self.left_of_decimal() + &self.right_of_decimal())
            }
            FormatKind::Exponent { upper } => {
                let marker = if upper { 'E' } else { 'e' };
                wrap(self.sign_regex())
                    + &self.sign_aware_fill()
                    + &wrap(format!(r"\d{}{marker}[+-]\d{{2,3}}", self.right_of_decimal()))
            }
        };
        self.add_outer_alignment(inner)
    }

    fn fill_regex(&self) -> String {
        format!("{}*", regex::escape(&self.fill.to_string()))
    }

    fn add_outer_alignment(&self, rgx: String) -> String {
        if self.width == 0 {
            return rgx;
        }
        match self.align {
            Align::SignAware => rgx,
            Align::Right => self.fill_regex() + &rgx,
            Align::Left => rgx + &self.fill_regex(),
            Align::Center => format!("{fill}{rgx}{fill}", fill = self.fill_regex()),
        }
    }

    fn sign_regex(&self) -> String {
        match self.sign {
            Sign::NegativeOnly => "-?",
            Sign::Always => "[+-]",
            Sign::Space => r"[\s-]",
        }
        .to_string()
    }

    fn sign_aware_fill(&self) -> String {
        if self.width == 0 || self.align != Align::SignAware {
            return String::new();
        }
        match (self.kind, self.grouping) {
            // The mantissa has a single digit, the separators all land in the padding.
            (FormatKind::Exponent { .. }, Some(sep)) if self.fill == '0' => {
                format!("(?:0{}?)*", regex::escape(&sep.to_string()))
            }
            _ => self.fill_regex(),
        }
    }

    fn left_of_decimal(&self) -> String {
        match self.grouping {
            Some(sep) => format!(r"\d?\d?\d(?:{}\d{{3}})*", regex::escape(&sep.to_string())),
            None => r"\d+".to_string(),
        }
    }

    fn right_of_decimal(&self) -> String {
        let mut rgx = String::new();
        if self.precision != 0 || self.alternate {
            rgx.push_str(r"\.");
        }
        if self.precision != 0 {
            rgx.push_str(&format!(r"\d{{{}}}", self.precision));
        }
        rgx
    }

    // ------------------------------------------------------------------
    // Formatting
    // ------------------------------------------------------------------

    /// Render a value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] if the value type does not suit the spec type
    /// (a string with a numeric type, a float with `d`, a number with `s`).
    pub fn format(&self, value: &Value) -> Result<String> {
        let (negative, body) = match (self.kind, value) {
            (FormatKind::String, Value::Str(s)) => (false, s.clone()),
            (FormatKind::Integer, Value::Int(i)) => (*i < 0, self.group_digits(&i.unsigned_abs().to_string())),
            (FormatKind::Integer, Value::Bool(b)) => (false, u8::from(*b).to_string()),
            (FormatKind::Float | FormatKind::Exponent { .. }, v) => match v {
                Value::Int(i) => self.float_body(*i as f64),
                Value::Float(x) => self.float_body(*x),
                Value::Bool(b) => self.float_body(f64::from(u8::from(*b))),
                Value::Str(_) => return Err(self.type_mismatch(value)),
            },
            _ => return Err(self.type_mismatch(value)),
        };

        let sign = match (negative, self.sign) {
            (true, _) => "-",
            (false, Sign::Always) => "+",
            (false, Sign::Space) => " ",
            (false, Sign::NegativeOnly) => "",
        };

        Ok(self.pad(sign, body))
    }

    fn type_mismatch(&self, value: &Value) -> Error {
        Error::format(
            &self.spec,
            format!("cannot format a {} value", value.type_name()),
        )
    }

    /// Sign flag and unsigned body of a float.
    fn float_body(&self, x: f64) -> (bool, String) {
        let upper = matches!(self.kind, FormatKind::Exponent { upper: true });
        if x.is_nan() {
            return (false, if upper { "NAN" } else { "nan" }.to_string());
        }
        let negative = x.is_sign_negative();
        if x.is_infinite() {
            return (negative, if upper { "INF" } else { "inf" }.to_string());
        }

        let abs = x.abs();
        let p = self.precision;
        let body = match self.kind {
            FormatKind::Exponent { upper } => {
                let rendered = format!("{abs:.p$e}");
                let (mantissa, exponent) = rendered.split_once('e').unwrap_or((&rendered, "0"));
                let exponent: i32 = exponent.parse().unwrap_or(0);
                let mut mantissa = mantissa.to_string();
                if self.alternate && p == 0 {
                    mantissa.push('.');
                }
                let marker = if upper { 'E' } else { 'e' };
                let exp_sign = if exponent < 0 { '-' } else { '+' };
                format!("{mantissa}{marker}{exp_sign}{:02}", exponent.unsigned_abs())
            }
            _ => {
                let mut rendered = format!("{abs:.p$}");
                if self.alternate && p == 0 {
                    rendered.push('.');
                }
                self.group_digits(&rendered)
            }
        };
        (negative, body)
    }

    /// Insert the grouping separator in the integer part of `body`.
    fn group_digits(&self, body: &str) -> String {
        let Some(sep) = self.grouping else {
            return body.to_string();
        };
        let split = body.find(|c: char| !c.is_ascii_digit()).unwrap_or(body.len());
        let (int_part, rest) = body.split_at(split);
        insert_grouping(int_part, sep) + rest
    }

    fn pad(&self, sign: &str, body: String) -> String {
        let len = sign.chars().count() + body.chars().count();
        if self.width <= len {
            return format!("{sign}{body}");
        }
        let missing = self.width - len;
        let fill = |n: usize| self.fill.to_string().repeat(n);

        match self.align {
            Align::SignAware if self.fill == '0' && self.grouping.is_some() => {
                format!("{sign}{}", self.zero_pad_grouped(sign, &body))
            }
            Align::SignAware => format!("{sign}{}{body}", fill(missing)),
            Align::Left => format!("{sign}{body}{}", fill(missing)),
            Align::Right => format!("{}{sign}{body}", fill(missing)),
            Align::Center => {
                let left = missing / 2;
                format!("{}{sign}{body}{}", fill(left), fill(missing - left))
            }
        }
    }

    /// Zero padding counts as digits, so separators are inserted in it too.
    fn zero_pad_grouped(&self, sign: &str, body: &str) -> String {
        let sep = self.grouping.unwrap_or(',');
        let split = body.find(|c: char| !c.is_ascii_digit() && c != sep).unwrap_or(body.len());
        let (int_part, rest) = body.split_at(split);
        let digits: String = int_part.chars().filter(char::is_ascii_digit).collect();

        let target = self
            .width
            .saturating_sub(sign.chars().count() + rest.chars().count());
        let mut n = digits.len().max(1);
        while n + (n - 1) / 3 < target {
            n += 1;
        }
        let padded = format!("{digits:0>n$}");
        insert_grouping(&padded, sep) + rest
    }

    // ------------------------------------------------------------------
    // Parsing
    // ------------------------------------------------------------------

    fn parser(&self) -> Result<&Regex> {
        if let Some(rgx) = self.parser.get() {
            return Ok(rgx);
        }
        let rgx = Regex::new(&format!("^(?:{})$", self.build_expression(true)))?;
        Ok(self.parser.get_or_init(|| rgx))
    }

    /// Parse a string rendered with this spec.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValueParse`] if the string does not match the spec
    /// expression or its number cannot be converted.
    pub fn parse(&self, s: &str) -> Result<Value> {
        let parse_error = || Error::ValueParse {
            input: s.to_string(),
            pattern: self.generate_expression(),
        };

        let caps = self.parser()?.captures(s).ok_or_else(parse_error)?;

        if self.kind == FormatKind::String {
            let inner = caps.get(1).map_or("", |m| m.as_str());
            return Ok(Value::Str(inner.to_string()));
        }

        let sign = caps.get(1).map_or("", |m| m.as_str());
        let body = caps.get(2).map_or("", |m| m.as_str());
        let mut number = String::with_capacity(body.len() + 1);
        if sign == "-" {
            number.push('-');
        }
        number.extend(body.chars().filter(|c| Some(*c) != self.grouping));

        match self.kind {
            FormatKind::Integer => number.parse().map(Value::Int).map_err(|_| parse_error()),
            _ => number.parse().map(Value::Float).map_err(|_| parse_error()),
        }
    }
}

fn insert_grouping(digits: &str, sep: char) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(sep);
        }
        out.push(c);
    }
    out
}
