//! Terminal and JSON rendering of patterns and matches.
//!
//! Colors:
//! - Group names: blue
//! - Matched text: green
//! - Parsed values: cyan
//! - Dates: yellow
//! - Spans and type names: dimmed

use chrono::NaiveDateTime;
use colored::Colorize;
use filefinder_core::{Fixed, Group, Match, Matches, Pattern, Result, Value};
use serde_json::{json, Map};

/// Plain JSON form of a value.
pub fn value_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Int(i) => json!(i),
        // NaN and infinities have no JSON form.
        Value::Float(f) => serde_json::Number::from_f64(*f).map_or(serde_json::Value::Null, Into::into),
        Value::Str(s) => json!(s),
        Value::Bool(b) => json!(b),
    }
}

fn match_json(m: &Match) -> serde_json::Value {
    let group = m.group();
    let mut obj = Map::new();
    obj.insert("name".into(), json!(group.name()));
    obj.insert("idx".into(), json!(group.idx()));
    obj.insert("raw".into(), json!(m.raw()));
    obj.insert(
        "span".into(),
        m.span().map_or(serde_json::Value::Null, |(s, e)| json!([s, e])),
    );
    obj.insert(
        "value".into(),
        m.try_value().map_or(serde_json::Value::Null, value_json),
    );
    if group.discard() {
        obj.insert("discard".into(), json!(true));
    }
    serde_json::Value::Object(obj)
}

/// JSON document for one matched filename.
///
/// `date` is only included when it was requested; a failed reconciliation
/// is reported under `date_error`.
pub fn matches_json(
    filename: &str,
    matches: &Matches,
    date: Option<&Result<NaiveDateTime>>,
) -> serde_json::Value {
    let mut obj = Map::new();
    obj.insert("filename".into(), json!(filename));
    obj.insert(
        "groups".into(),
        serde_json::Value::Array(matches.iter().map(match_json).collect()),
    );
    match date {
        Some(Ok(date)) => {
            obj.insert("date".into(), json!(date.format("%Y-%m-%dT%H:%M:%S").to_string()));
        }
        Some(Err(e)) => {
            obj.insert("date_error".into(), json!(e.to_string()));
        }
        None => {}
    }
    serde_json::Value::Object(obj)
}

/// JSON description of the groups of a pattern.
pub fn groups_json(pattern: &Pattern) -> serde_json::Value {
    let groups = pattern
        .groups()
        .iter()
        .map(|g| {
            json!({
                "idx": g.idx(),
                "name": g.name(),
                "definition": g.definition(),
                "regex": g.get_regex(),
                "format": g.format_spec().spec(),
                "discard": g.discard(),
                "optional": g.optional(),
                "fixed": g.fixed_string(),
            })
        })
        .collect();
    json!({
        "pattern": pattern.pattern(),
        "regex": pattern.regex(),
        "groups": serde_json::Value::Array(groups),
    })
}

fn group_flags(group: &Group) -> String {
    let mut flags = Vec::new();
    if group.discard() {
        flags.push("discard".to_string());
    }
    if group.optional() {
        flags.push("optional".to_string());
    }
    if let Some((when_false, when_true)) = group.options() {
        flags.push(format!("bool={when_true}:{when_false}"));
    }
    if let Fixed::Fixed { string, .. } = group.fixed() {
        flags.push(format!("fixed={string}"));
    }
    if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    }
}

/// Render the groups of a pattern, one per line.
pub fn format_groups(pattern: &Pattern) -> String {
    let mut out = String::new();
    for group in pattern.groups() {
        out.push_str(&format!(
            "  {} {}  {} {}{}\n",
            format!("#{}", group.idx()).dimmed(),
            group.name().blue().bold(),
            group.get_regex().green(),
            format!("fmt={}", group.format_spec().spec()).dimmed(),
            group_flags(group),
        ));
    }
    out
}

/// Render one matched filename with its groups.
pub fn format_matches(filename: &str, matches: &Matches, date: Option<&Result<NaiveDateTime>>) -> String {
    let mut out = format!("{} {}\n", "▶".bold(), filename.bold());
    for m in matches {
        let group = m.group();
        let span = m
            .span()
            .map_or_else(|| "-".to_string(), |(s, e)| format!("{s}..{e}"));
        let value = match m.try_value() {
            Some(v) => format!("{} {}", v.to_string().cyan(), format!("({})", v.type_name()).dimmed()),
            None if m.span().is_none() => "absent".dimmed().to_string(),
            None => "unparsable".red().to_string(),
        };
        let discard = if group.discard() { " (discarded)".dimmed().to_string() } else { String::new() };
        out.push_str(&format!(
            "  {}:{}  {} → {}  {}{}\n",
            group.name().blue().bold(),
            group.idx(),
            m.raw().green(),
            value,
            span.dimmed(),
            discard,
        ));
    }
    match date {
        Some(Ok(date)) => out.push_str(&format!("  {} {}\n", "date".bold(), date.to_string().yellow())),
        Some(Err(e)) => out.push_str(&format!("  {} {}\n", "date".bold(), e.to_string().red())),
        None => {}
    }
    out
}

/// One line per file, as listed by `find`.
pub fn format_file_line(filename: &str, date: Option<&Result<NaiveDateTime>>) -> String {
    match date {
        Some(Ok(date)) => format!("{}  {}", date.to_string().yellow(), filename),
        Some(Err(e)) => format!("{}  {} {}", "?".red(), filename, format!("({e})").dimmed()),
        None => filename.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_color() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_value_json() {
        assert_eq!(value_json(&Value::Int(3)), json!(3));
        assert_eq!(value_json(&Value::Float(2.5)), json!(2.5));
        assert_eq!(value_json(&Value::Float(f64::NAN)), serde_json::Value::Null);
        assert_eq!(value_json(&Value::from("abc")), json!("abc"));
        assert_eq!(value_json(&Value::Bool(true)), json!(true));
    }

    #[test]
    fn test_matches_json() {
        let pattern = Pattern::new("%(Y)_%(m)%(opt:rgx=_x:opt)", false).unwrap();
        let matches = pattern.match_filename("2020_03").unwrap().unwrap();
        let date = matches.get_date(&Default::default());
        let doc = matches_json("2020_03", &matches, Some(&date));

        assert_eq!(doc["filename"], "2020_03");
        assert_eq!(doc["groups"][0]["name"], "Y");
        assert_eq!(doc["groups"][0]["value"], 2020);
        assert_eq!(doc["groups"][1]["span"], json!([5, 7]));
        assert_eq!(doc["groups"][2]["span"], serde_json::Value::Null);
        assert_eq!(doc["date"], "2020-03-01T00:00:00");
    }

    #[test]
    fn test_groups_json() {
        let pattern = Pattern::new("%(Y)_%(depth:fmt=.1f:discard)", false).unwrap();
        let doc = groups_json(&pattern);
        assert_eq!(doc["groups"][1]["format"], ".1f");
        assert_eq!(doc["groups"][1]["discard"], true);
        assert_eq!(doc["groups"][0]["fixed"], serde_json::Value::Null);
    }

    #[test]
    fn test_format_matches_plain() {
        no_color();
        let pattern = Pattern::new("%(Y)-%(m)", false).unwrap();
        let matches = pattern.match_filename("2020-03").unwrap().unwrap();
        let out = format_matches("2020-03", &matches, None);
        assert!(out.starts_with("▶ 2020-03\n"));
        assert!(out.contains("Y:0  2020 → 2020 (int)  0..4"));
        assert!(out.contains("m:1  03 → 3 (int)  5..7"));
    }

    #[test]
    fn test_format_file_line() {
        no_color();
        assert_eq!(format_file_line("a/b.nc", None), "a/b.nc");
        let date = chrono::NaiveDate::from_ymd_opt(2020, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(format_file_line("a/b.nc", Some(&Ok(date))), "2020-01-02 00:00:00  a/b.nc");
    }
}
