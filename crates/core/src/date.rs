//! Date reconciliation.
//!
//! Several groups can carry part of a date: `Y`, `m`, `d`, `H`, `M`, `S`
//! directly, `B` as a month name, `j` as a day of year, and `F`, `x`, `X`
//! as combined strings. [`reconcile`] merges them into one date and fails
//! when two groups disagree on the same element.
//!
//! Elements are resolved in a fixed order: month names first, then combined
//! strings are split, then the atomic groups are applied, and the day of year
//! last, since it needs the year.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::matches::Matches;
use crate::types::Value;

/// Names of the groups contributing to a date.
pub const DATE_GROUP_NAMES: &[&str] = &["Y", "B", "m", "d", "j", "H", "M", "S", "F", "x", "X"];

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Whether `name` is a date group name.
#[must_use]
pub fn is_date_group(name: &str) -> bool {
    DATE_GROUP_NAMES.contains(&name)
}

/// Components used for the elements no group provides.
///
/// Unset components fall back to 1970-01-01 00:00:00.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultDate {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub hour: Option<u32>,
    pub minute: Option<u32>,
    pub second: Option<u32>,
}

impl From<NaiveDateTime> for DefaultDate {
    fn from(date: NaiveDateTime) -> Self {
        Self {
            year: Some(date.year()),
            month: Some(date.month()),
            day: Some(date.day()),
            hour: Some(date.hour()),
            minute: Some(date.minute()),
            second: Some(date.second()),
        }
    }
}

impl From<NaiveDate> for DefaultDate {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: Some(date.year()),
            month: Some(date.month()),
            day: Some(date.day()),
            ..Self::default()
        }
    }
}

impl DefaultDate {
    fn components(&self) -> [i64; 6] {
        [
            self.year.map_or(1970, i64::from),
            self.month.map_or(1, i64::from),
            self.day.map_or(1, i64::from),
            self.hour.map_or(0, i64::from),
            self.minute.map_or(0, i64::from),
            self.second.map_or(0, i64::from),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    Year = 0,
    Month = 1,
    Day = 2,
    Hour = 3,
    Minute = 4,
    Second = 5,
}

impl Element {
    const ALL: [Self; 6] = [
        Self::Year,
        Self::Month,
        Self::Day,
        Self::Hour,
        Self::Minute,
        Self::Second,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
            Self::Hour => "hour",
            Self::Minute => "minute",
            Self::Second => "second",
        }
    }

    fn from_group(name: &str) -> Option<Self> {
        match name {
            "Y" => Some(Self::Year),
            "m" => Some(Self::Month),
            "d" => Some(Self::Day),
            "H" => Some(Self::Hour),
            "M" => Some(Self::Minute),
            "S" => Some(Self::Second),
            _ => None,
        }
    }
}

/// Values found for each element, in order of contribution.
#[derive(Debug, Default)]
struct Collected {
    values: [Vec<i64>; 6],
}

impl Collected {
    fn push(&mut self, element: Element, value: i64) {
        self.values[element as usize].push(value);
    }

    /// Integer in `raw[range]`, pushed to `element`.
    fn push_slice(
        &mut self,
        element: Element,
        raw: &str,
        range: std::ops::Range<usize>,
        group: &str,
    ) -> Result<()> {
        let part = raw.get(range).ok_or_else(|| Error::ValueParse {
            input: raw.to_string(),
            pattern: group.to_string(),
        })?;
        self.push(element, parse_int(part, group)?);
        Ok(())
    }

    /// Single value of `element`, or `default` if no group provided one.
    fn resolve(&self, element: Element, default: i64) -> Result<i64> {
        let values = &self.values[element as usize];
        match values.split_first() {
            None => Ok(default),
            Some((first, rest)) if rest.iter().all(|v| v == first) => Ok(*first),
            Some(_) => Err(Error::DateConflict {
                element: element.name().to_string(),
                values: values.clone(),
            }),
        }
    }
}

fn parse_int(s: &str, group: &str) -> Result<i64> {
    s.trim().parse().map_err(|_| Error::ValueParse {
        input: s.to_string(),
        pattern: group.to_string(),
    })
}

/// Month number (1-12) of a full month name or its three-letter
/// abbreviation, in any case.
pub fn month_number(name: &str) -> Result<u32> {
    let lower = name.to_lowercase();
    MONTH_NAMES
        .iter()
        .position(|m| *m == lower || (lower.len() == 3 && m.starts_with(&lower)))
        .map(|i| i as u32 + 1)
        .ok_or_else(|| Error::UnknownMonth(name.to_string()))
}

/// Merge the date groups of `matches` into one date.
///
/// Groups flagged `:discard` and optional groups absent from the filename
/// are ignored. Elements no group provides are taken from `default`.
///
/// # Errors
///
/// Returns [`Error::DateConflict`] if groups disagree on an element,
/// [`Error::UnknownMonth`] for an unknown month name, and
/// [`Error::InvalidDate`] if the result is not a calendar date.
pub fn reconcile(matches: &Matches, default: &DefaultDate) -> Result<NaiveDateTime> {
    let elements: Vec<(&str, &str)> = matches
        .iter()
        .filter(|m| !m.group().discard() && m.span().is_some())
        .filter(|m| is_date_group(m.group().name()))
        .map(|m| (m.group().name(), m.raw()))
        .collect();

    let defaults = default.components();
    if elements.is_empty() {
        tracing::warn!("no group to retrieve a date from, using the default date");
        return build_date(defaults);
    }

    let of = |name: &'static str| {
        elements
            .iter()
            .filter(move |(n, _)| *n == name)
            .map(|(_, raw)| *raw)
    };

    let mut collected = Collected::default();

    for raw in of("B") {
        collected.push(Element::Month, i64::from(month_number(raw)?));
    }

    for raw in of("F") {
        collected.push_slice(Element::Year, raw, 0..4, "F")?;
        collected.push_slice(Element::Month, raw, 5..7, "F")?;
        collected.push_slice(Element::Day, raw, 8..10, "F")?;
    }
    for raw in of("x") {
        collected.push_slice(Element::Year, raw, 0..4, "x")?;
        collected.push_slice(Element::Month, raw, 4..6, "x")?;
        collected.push_slice(Element::Day, raw, 6..8, "x")?;
    }
    for raw in of("X") {
        collected.push_slice(Element::Hour, raw, 0..2, "X")?;
        collected.push_slice(Element::Minute, raw, 2..4, "X")?;
        if raw.len() > 4 {
            collected.push_slice(Element::Second, raw, 4..6, "X")?;
        }
    }

    for (name, raw) in &elements {
        if let Some(element) = Element::from_group(name) {
            collected.push(element, parse_int(raw, name)?);
        }
    }

    let year = collected.resolve(Element::Year, defaults[Element::Year as usize])?;
    for raw in of("j") {
        let doy = parse_int(raw, "j")?;
        let (month, day) = from_day_of_year(year, doy)?;
        collected.push(Element::Month, month);
        collected.push(Element::Day, day);
    }

    let mut components = [0; 6];
    for element in Element::ALL {
        components[element as usize] = collected.resolve(element, defaults[element as usize])?;
    }
    build_date(components)
}

/// Month and day of the `doy`-th day counted from January 1st of `year`.
fn from_day_of_year(year: i64, doy: i64) -> Result<(i64, i64)> {
    let invalid = || Error::InvalidDate {
        year,
        month: 1,
        day: doy,
        hour: 0,
        minute: 0,
        second: 0,
    };
    let date = i32::try_from(year)
        .ok()
        .and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1))
        .zip(Duration::try_days(doy - 1))
        .and_then(|(jan1, offset)| jan1.checked_add_signed(offset))
        .ok_or_else(invalid)?;
    Ok((i64::from(date.month()), i64::from(date.day())))
}

fn build_date(c: [i64; 6]) -> Result<NaiveDateTime> {
    let [year, month, day, hour, minute, second] = c;
    let invalid = || Error::InvalidDate {
        year,
        month,
        day,
        hour,
        minute,
        second,
    };
    let date = NaiveDate::from_ymd_opt(
        i32::try_from(year).map_err(|_| invalid())?,
        u32::try_from(month).map_err(|_| invalid())?,
        u32::try_from(day).map_err(|_| invalid())?,
    )
    .ok_or_else(invalid)?;
    date.and_hms_opt(
        u32::try_from(hour).map_err(|_| invalid())?,
        u32::try_from(minute).map_err(|_| invalid())?,
        u32::try_from(second).map_err(|_| invalid())?,
    )
    .ok_or_else(invalid)
}

/// Render the element of `date` held by the date group `name`.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if `name` is not a date group.
pub fn date_to_string(date: &NaiveDateTime, name: &str) -> Result<String> {
    let fmt = match name {
        "F" => "%Y-%m-%d",
        "x" => "%Y%m%d",
        "X" => "%H%M%S",
        "Y" => "%Y",
        "B" => "%B",
        "m" => "%m",
        "d" => "%d",
        "j" => "%j",
        "H" => "%H",
        "M" => "%M",
        "S" => "%S",
        _ => return Err(Error::not_found(name)),
    };
    Ok(date.format(fmt).to_string())
}

/// Value of the element of `date` held by the date group `name`, ready to
/// fix that group.
///
/// Combined groups and month names give strings, the others integers.
pub fn date_to_value(date: &NaiveDateTime, name: &str) -> Result<Value> {
    let value = match name {
        "F" | "x" | "X" | "B" => Value::Str(date_to_string(date, name)?),
        "Y" => Value::Int(i64::from(date.year())),
        "m" => Value::Int(i64::from(date.month())),
        "d" => Value::Int(i64::from(date.day())),
        "j" => Value::Int(i64::from(date.ordinal())),
        "H" => Value::Int(i64::from(date.hour())),
        "M" => Value::Int(i64::from(date.minute())),
        "S" => Value::Int(i64::from(date.second())),
        _ => return Err(Error::not_found(name)),
    };
    Ok(value)
}
