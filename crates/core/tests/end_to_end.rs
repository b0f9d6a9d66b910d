//! End-to-end scenarios: compile, scan, match, reconcile and generate.

use std::fs;
use std::path::Path;

use filefinder_core::{
    date_to_value, filter_by_range, DateRangeFilter, DefaultDate, Error, Finder, FixValue, FormatSpec, Group,
    GroupKey, Pattern, Value,
};
use pretty_assertions::assert_eq;
use regex::Regex;

fn touch(root: &Path, relative: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"").unwrap();
}

#[test]
fn test_compile_and_match() {
    let pattern = Pattern::new("test_%(Y)-%(m)-%(d).ext", false).unwrap();
    assert_eq!(pattern.regex(), r"test_(\d{4})\-(\d\d)\-(\d\d)\.ext");

    let matches = pattern.match_filename("test_2020-03-04.ext").unwrap().unwrap();
    let values: Vec<Value> = matches.iter().map(|m| m.value().unwrap().clone()).collect();
    assert_eq!(values, [Value::Int(2020), Value::Int(3), Value::Int(4)]);
}

#[test]
fn test_explicit_regex_wins() {
    assert_eq!(Group::new("Y:rgx=[a-z]*?", 0).unwrap().get_regex(), "([a-z]*?)");
}

#[test]
fn test_exponent_zero() {
    let spec = FormatSpec::new(".2e").unwrap();
    let formatted = spec.format(&Value::Int(0)).unwrap();
    let regex = Regex::new(&format!("^(?:{})$", spec.generate_expression())).unwrap();
    assert!(regex.is_match(&formatted));
    assert_eq!(spec.parse(&formatted).unwrap(), Value::Float(0.0));
}

#[test]
fn test_date_conflict() {
    let pattern = Pattern::new("%(Y)_%(m)_%(F)", false).unwrap();
    let matches = pattern.match_filename("2005_01_2006-01-02").unwrap().unwrap();
    let err = matches.get_date(&DefaultDate::default()).unwrap_err();
    assert!(matches!(err, Error::DateConflict { ref element, .. } if element == "year"));
    assert!(err.to_string().contains("2005"));
    assert!(err.to_string().contains("2006"));
}

#[test]
fn test_generation_inverts_matching() {
    let pattern = Pattern::new(
        "%(Y)/sst_%(x)_%(depth:fmt=06.2f)m_%(kind:fmt=s:rgx=[a-z]+)%(smooth:bool=_smooth).nc",
        false,
    )
    .unwrap();
    let filename = "2012/sst_20120315_012.50m_day_smooth.nc";
    let matches = pattern.match_filename(filename).unwrap().unwrap();

    let fixes: Vec<(GroupKey, FixValue)> = matches
        .iter()
        .map(|m| (GroupKey::from(m.group().idx()), FixValue::from(m.value().unwrap().clone())))
        .collect();
    assert_eq!(pattern.make_filename(fixes).unwrap(), filename);
}

#[test]
fn test_group_count_invariant() {
    for p in ["", "%(Y)", "a_%(Y)/%(m)_%(foo:rgx=(?:a|b)+)", "%(x)%(X)%(I)%(F)"] {
        let pattern = Pattern::new(p, false).unwrap();
        assert_eq!(pattern.segments().len(), 2 * pattern.groups().len() + 1);
    }
    assert_eq!(Pattern::new("%(x)%(X)%(I)%(F)", false).unwrap().groups().len(), 4);
}

#[test]
fn test_date_round_trip_through_filename() {
    let pattern = Pattern::new("%(Y)/%(F)_%(X).nc", false).unwrap();
    let date = chrono::NaiveDate::from_ymd_opt(2003, 2, 5)
        .unwrap()
        .and_hms_opt(7, 8, 9)
        .unwrap();
    let fixes: Vec<(&str, Value)> = ["Y", "F", "X"]
        .into_iter()
        .map(|name| (name, date_to_value(&date, name).unwrap()))
        .collect();
    let filename = pattern.make_filename(fixes).unwrap();
    assert_eq!(filename, "2003/2003-02-05_070809.nc");

    let matches = pattern.match_filename(&filename).unwrap().unwrap();
    assert_eq!(matches.get_date(&DefaultDate::default()).unwrap(), date);
}

#[test]
fn test_finder_on_tree() {
    let dir = tempfile::tempdir().unwrap();
    for day in 1..=31 {
        touch(dir.path(), &format!("2020/01/sst_202001{day:02}.nc"));
    }
    touch(dir.path(), "2020/02/sst_20200201.nc");
    touch(dir.path(), "2020/01/readme.md");
    touch(dir.path(), "misc/sst_20200101.nc");

    let mut finder = Finder::new(dir.path(), "%(Y)/%(m)/sst_%(x).nc").unwrap();
    assert_eq!(finder.files().unwrap().len(), 32);

    finder.fix_group("m", 1, false).unwrap();
    assert_eq!(finder.files().unwrap().len(), 31);

    let start = chrono::NaiveDate::from_ymd_opt(2020, 1, 10)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let stop = chrono::NaiveDate::from_ymd_opt(2020, 1, 19)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    finder.add_filter(DateRangeFilter::new().with_start(start).with_stop(stop));
    let files = finder.get_files(true).unwrap();
    assert_eq!(files.len(), 10);
    assert_eq!(files[0], Path::new("2020/01/sst_20200110.nc"));

    finder.clear_filters();
    finder.add_filter(filter_by_range("x", Some(20200130.0), None));
    assert_eq!(finder.files().unwrap().len(), 2);
}
