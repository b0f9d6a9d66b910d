//! Directory scanner.
//!
//! A [`Finder`] walks a directory tree and collects the files whose path,
//! relative to the root, matches a pattern. Each directory level of the
//! pattern is used to prune the walk.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use regex::Regex;
use walkdir::WalkDir;

use crate::date::DefaultDate;
use crate::error::{Error, Result};
use crate::filter::{CompositeFilter, Filter};
use crate::matches::Matches;
use crate::pattern::Pattern;
use crate::types::{FixValue, GroupKey};

/// Separator of directory levels in patterns and relative paths.
const SEPARATOR: char = '/';

/// Files grouped level by level on the strings matched by some groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nested {
    Files(Vec<PathBuf>),
    Groups(Vec<Nested>),
}

/// Files under a root directory matching a pattern.
#[derive(Debug)]
pub struct Finder {
    root: PathBuf,
    pattern: Pattern,
    filters: CompositeFilter,
    /// Relative paths and matches, sorted by path. `None` until scanned.
    files: Option<Vec<(String, Matches)>>,
}

impl fmt::Display for Finder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "root: {}", self.root.display())?;
        writeln!(f, "pattern: {}", self.pattern)?;
        write!(f, "regex: {}", self.pattern.regex())?;
        if !self.filters.is_empty() {
            write!(f, "\nfilters: {}", self.filters.description())?;
        }
        match &self.files {
            Some(files) => write!(f, "\nscanned: {} files", files.len()),
            None => write!(f, "\nnot scanned"),
        }
    }
}

impl Finder {
    /// Finder for a pattern whose literal text is escaped.
    pub fn new(root: impl Into<PathBuf>, pattern: &str) -> Result<Self> {
        Self::with_regex(root, pattern, false)
    }

    /// Finder for a pattern, with literal text used as regex if `use_regex`.
    pub fn with_regex(root: impl Into<PathBuf>, pattern: &str, use_regex: bool) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            pattern: Pattern::new(pattern, use_regex)?,
            filters: CompositeFilter::new(),
            files: None,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Current regex, with fixed groups.
    #[must_use]
    pub fn regex(&self) -> String {
        self.pattern.regex()
    }

    #[must_use]
    pub fn scanned(&self) -> bool {
        self.files.is_some()
    }

    fn invalidate(&mut self) {
        self.files = None;
    }

    /// Matching files with their matches, sorted by relative path.
    ///
    /// The tree is scanned on first access, and again after any change of
    /// fixes or filters.
    pub fn files(&mut self) -> Result<&[(String, Matches)]> {
        if self.files.is_none() {
            let found = self.find_files()?;
            self.files = Some(found);
        }
        Ok(self.files.get_or_insert_with(Vec::new))
    }

    /// Paths of the matching files, relative to the root or absolute.
    pub fn get_files(&mut self, relative: bool) -> Result<Vec<PathBuf>> {
        let root = self.root.clone();
        Ok(self
            .files()?
            .iter()
            .map(|(filename, _)| {
                if relative {
                    PathBuf::from(filename)
                } else {
                    root.join(filename)
                }
            })
            .collect())
    }

    /// Matching files nested by the groups selected by each key in turn.
    ///
    /// At each level, files are split on the string matched by the groups
    /// of one key (discarded ones included), in order of first appearance.
    /// The last key is the innermost level. Without keys this is the flat
    /// list of [`Finder::get_files`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if a key selects no group of the pattern.
    pub fn get_files_nested<K: Into<GroupKey>>(
        &mut self,
        keys: impl IntoIterator<Item = K>,
        relative: bool,
    ) -> Result<Nested> {
        let keys: Vec<GroupKey> = keys.into_iter().map(Into::into).collect();
        for key in &keys {
            self.pattern.get_group_indices(key.clone())?;
        }
        let root = self.root.clone();
        let files: Vec<&(String, Matches)> = self.files()?.iter().collect();
        nest(&files, &keys, &|filename: &str| {
            if relative {
                PathBuf::from(filename)
            } else {
                root.join(filename)
            }
        })
    }

    /// Path of `path` relative to the root, with `/` separators.
    pub fn get_relative(&self, path: &Path) -> Result<String> {
        let relative = path
            .strip_prefix(&self.root)
            .map_err(|_| Error::OutsideRoot(path.to_path_buf()))?;
        Ok(relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join(&SEPARATOR.to_string()))
    }

    /// Absolute path of a filename relative to the root.
    #[must_use]
    pub fn get_absolute(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    /// Match a single filename against the current pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoMatch`] if the filename does not match, and
    /// [`Error::OutsideRoot`] for an absolute filename outside the root.
    pub fn find_matches(&self, filename: &str, relative: bool) -> Result<Matches> {
        let filename = if relative {
            filename.to_string()
        } else {
            self.get_relative(Path::new(filename))?
        };
        let regex = self.pattern.compile()?;
        Matches::from_filename(&filename, &regex, self.pattern.groups())?
            .ok_or(Error::NoMatch(filename))
    }

    /// Date of a filename, see [`crate::date::reconcile`].
    pub fn get_date(&self, filename: &str, relative: bool, default: &DefaultDate) -> Result<NaiveDateTime> {
        self.find_matches(filename, relative)?.get_date(default)
    }

    /// Fix the groups selected by `key`.
    ///
    /// Groups flagged `:discard` are skipped unless `fix_discard` is set.
    pub fn fix_group(
        &mut self,
        key: impl Into<GroupKey>,
        value: impl Into<FixValue>,
        fix_discard: bool,
    ) -> Result<()> {
        self.invalidate();
        self.pattern.fix_group(key, value, fix_discard)
    }

    pub fn fix_groups<K, V>(&mut self, fixes: impl IntoIterator<Item = (K, V)>, fix_discard: bool) -> Result<()>
    where
        K: Into<GroupKey>,
        V: Into<FixValue>,
    {
        self.invalidate();
        self.pattern.fix_groups(fixes, fix_discard)
    }

    pub fn unfix_groups<K: Into<GroupKey>>(&mut self, keys: impl IntoIterator<Item = K>) -> Result<()> {
        self.invalidate();
        self.pattern.unfix_groups(keys)
    }

    pub fn unfix_all(&mut self) {
        self.invalidate();
        self.pattern.unfix_all();
    }

    #[must_use]
    pub fn filters(&self) -> &CompositeFilter {
        &self.filters
    }

    /// Add a filter applied to every matched file.
    pub fn add_filter(&mut self, filter: impl Filter + 'static) {
        self.invalidate();
        self.filters.add_filter(Box::new(filter));
    }

    pub fn clear_filters(&mut self) {
        self.invalidate();
        self.filters.clear();
    }

    /// Remove the group filters on `key`, returns how many were removed.
    pub fn remove_filters_by_group(&mut self, key: impl Into<GroupKey>) -> usize {
        self.invalidate();
        self.filters.remove_by_group(&key.into())
    }

    /// Remove the date filters, returns how many were removed.
    pub fn remove_date_filters(&mut self) -> usize {
        self.invalidate();
        self.filters.remove_by_date()
    }

    /// Generate a filename from the pattern, relative to the root or absolute.
    pub fn make_filename<K, V>(&self, fixes: impl IntoIterator<Item = (K, V)>, relative: bool) -> Result<PathBuf>
    where
        K: Into<GroupKey>,
        V: Into<FixValue>,
    {
        let filename = self.pattern.make_filename(fixes)?;
        Ok(if relative {
            PathBuf::from(filename)
        } else {
            self.root.join(filename)
        })
    }

    /// Walk the tree and collect matching files.
    fn find_files(&self) -> Result<Vec<(String, Matches)>> {
        let regex = self.pattern.regex();
        let full = self.pattern.compile()?;

        // One regex per directory level, when the regex can be split.
        let levels: Option<Vec<Regex>> = regex
            .split(SEPARATOR)
            .map(|part| Regex::new(&format!("^(?:{part})$")).ok())
            .collect();
        let depth = regex.split(SEPARATOR).count();
        if levels.is_none() {
            tracing::debug!(regex = %regex, "regex cannot be split by directory, matching full paths");
        }

        let mut walker = WalkDir::new(&self.root).min_depth(1).sort_by_file_name();
        if levels.is_some() {
            walker = walker.max_depth(depth);
        }

        let entries = walker.into_iter().filter_entry(|entry| {
            let Some(levels) = &levels else {
                return true;
            };
            let d = entry.depth();
            if d == 0 || d >= depth || !entry.file_type().is_dir() {
                return true;
            }
            levels[d - 1].is_match(&entry.file_name().to_string_lossy())
        });

        let mut found = Vec::new();
        let mut n_candidates = 0usize;
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(e.into()),
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if entry.file_type().is_dir() || (levels.is_some() && entry.depth() != depth) {
                continue;
            }
            n_candidates += 1;

            let relative = self.get_relative(entry.path())?;
            let Some(matches) = Matches::from_filename(&relative, &full, self.pattern.groups())? else {
                continue;
            };
            if self.filters.is_valid(&self.pattern, &relative, &matches) {
                found.push((relative, matches));
            }
        }

        found.sort_by(|a, b| a.0.cmp(&b.0));
        tracing::debug!(
            root = %self.root.display(),
            regex = %regex,
            candidates = n_candidates,
            found = found.len(),
            "scanned directory"
        );
        Ok(found)
    }
}

fn nest(
    files: &[&(String, Matches)],
    keys: &[GroupKey],
    to_path: &dyn Fn(&str) -> PathBuf,
) -> Result<Nested> {
    let Some((key, rest)) = keys.split_first() else {
        return Ok(Nested::Files(files.iter().map(|(f, _)| to_path(f.as_str())).collect()));
    };

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut grouped: Vec<Vec<&(String, Matches)>> = Vec::new();
    for &entry in files {
        let label = entry.1.get_strings(key.clone(), true)?.concat();
        let i = *index.entry(label).or_insert_with(|| {
            grouped.push(Vec::new());
            grouped.len() - 1
        });
        grouped[i].push(entry);
    }

    grouped
        .iter()
        .map(|group| nest(group, rest, to_path))
        .collect::<Result<Vec<_>>>()
        .map(Nested::Groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::filter_by_range;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for f in [
            "2020/data_2020-01-01.nc",
            "2020/data_2020-01-02.nc",
            "2020/notes.txt",
            "2021/data_2021-05-01.nc",
            "junk/data_2020-01-03.nc",
            "data_2020-01-04.nc",
        ] {
            touch(dir.path(), f);
        }
        dir
    }

    fn relative_files(finder: &mut Finder) -> Vec<String> {
        finder
            .files()
            .unwrap()
            .iter()
            .map(|(f, _)| f.clone())
            .collect()
    }

    #[test]
    fn test_scan() {
        let dir = tree();
        let mut finder = Finder::new(dir.path(), "%(Y)/data_%(Y)-%(m)-%(d).nc").unwrap();
        assert!(!finder.scanned());
        assert_eq!(
            relative_files(&mut finder),
            [
                "2020/data_2020-01-01.nc",
                "2020/data_2020-01-02.nc",
                "2021/data_2021-05-01.nc",
            ]
        );
        assert!(finder.scanned());

        let absolute = finder.get_files(false).unwrap();
        assert_eq!(absolute[0], dir.path().join("2020/data_2020-01-01.nc"));
    }

    #[test]
    fn test_fix_rescans() {
        let dir = tree();
        let mut finder = Finder::new(dir.path(), "%(Y)/data_%(Y)-%(m)-%(d).nc").unwrap();
        assert_eq!(finder.files().unwrap().len(), 3);

        finder.fix_group("Y", 2021, false).unwrap();
        assert!(!finder.scanned());
        assert_eq!(relative_files(&mut finder), ["2021/data_2021-05-01.nc"]);

        finder.unfix_all();
        finder.fix_groups([("d", vec![1, 2])], false).unwrap();
        assert_eq!(finder.files().unwrap().len(), 2);

        finder.unfix_groups(["d"]).unwrap();
        assert_eq!(finder.files().unwrap().len(), 3);
    }

    #[test]
    fn test_filters() {
        let dir = tree();
        let mut finder = Finder::new(dir.path(), "%(Y)/data_%(Y)-%(m)-%(d).nc").unwrap();
        finder.add_filter(filter_by_range("m", Some(2.0), None));
        assert_eq!(relative_files(&mut finder), ["2021/data_2021-05-01.nc"]);
        finder.clear_filters();
        assert_eq!(finder.files().unwrap().len(), 3);
    }

    #[test]
    fn test_nested_files() {
        let dir = tree();
        let mut finder = Finder::new(dir.path(), "%(Y)/data_%(Y)-%(m)-%(d).nc").unwrap();

        let by_year = finder.get_files_nested(["Y"], true).unwrap();
        assert_eq!(
            by_year,
            Nested::Groups(vec![
                Nested::Files(vec![
                    PathBuf::from("2020/data_2020-01-01.nc"),
                    PathBuf::from("2020/data_2020-01-02.nc"),
                ]),
                Nested::Files(vec![PathBuf::from("2021/data_2021-05-01.nc")]),
            ])
        );

        let Nested::Groups(years) = finder.get_files_nested(["Y", "d"], false).unwrap() else {
            panic!("Expected groups");
        };
        assert_eq!(years.len(), 2);
        assert_eq!(
            years[0],
            Nested::Groups(vec![
                Nested::Files(vec![dir.path().join("2020/data_2020-01-01.nc")]),
                Nested::Files(vec![dir.path().join("2020/data_2020-01-02.nc")]),
            ])
        );

        let flat = finder.get_files_nested(Vec::<GroupKey>::new(), true).unwrap();
        assert_eq!(flat, Nested::Files(finder.get_files(true).unwrap()));

        assert!(matches!(
            finder.get_files_nested(["Y", "nope"], true),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_nested_keeps_first_seen_order() {
        let dir = tempfile::tempdir().unwrap();
        for f in ["a_2.nc", "b_1.nc", "c_2.nc"] {
            touch(dir.path(), f);
        }
        let mut finder = Finder::new(dir.path(), "%(name:fmt=s:rgx=[a-z])_%(n:fmt=d).nc").unwrap();
        assert_eq!(
            finder.get_files_nested(["n"], true).unwrap(),
            Nested::Groups(vec![
                Nested::Files(vec![PathBuf::from("a_2.nc"), PathBuf::from("c_2.nc")]),
                Nested::Files(vec![PathBuf::from("b_1.nc")]),
            ])
        );
    }

    #[test]
    fn test_remove_filters() {
        let dir = tree();
        let mut finder = Finder::new(dir.path(), "%(Y)/data_%(Y)-%(m)-%(d).nc").unwrap();
        finder.add_filter(filter_by_range("m", Some(2.0), None));
        finder.add_filter(crate::filter::DateRangeFilter::new().with_stop(
            chrono::NaiveDate::from_ymd_opt(2020, 12, 31)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        ));
        assert!(relative_files(&mut finder).is_empty());

        assert_eq!(finder.remove_date_filters(), 1);
        assert!(!finder.scanned());
        assert_eq!(relative_files(&mut finder), ["2021/data_2021-05-01.nc"]);

        assert_eq!(finder.remove_filters_by_group("m"), 1);
        assert_eq!(finder.files().unwrap().len(), 3);
    }

    #[test]
    fn test_relative_paths_use_slash() {
        let dir = tree();
        let finder = Finder::new(dir.path(), "%(Y)/data_%(Y)-%(m)-%(d).nc").unwrap();
        let path = dir.path().join("2020").join("data_2020-01-01.nc");
        assert_eq!(finder.get_relative(&path).unwrap(), "2020/data_2020-01-01.nc");
        let nested = dir.path().join("a").join("b").join("c.nc");
        assert_eq!(finder.get_relative(&nested).unwrap(), "a/b/c.nc");
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tree();
        touch(dir.path(), "2022/data_2022-01-01.nc");
        let locked = dir.path().join("2022");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        // Privileged users can still read it.
        let readable = fs::read_dir(&locked).is_ok();

        let mut finder = Finder::new(dir.path(), "%(Y)/data_%(Y)-%(m)-%(d).nc").unwrap();
        let files = finder.files().map(|files| files.len());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(files.unwrap(), if readable { 4 } else { 3 });
    }

    #[test]
    fn test_unsplittable_regex() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "ab/cd_2020.nc");
        touch(dir.path(), "ab/cd/ef_2020.nc");
        let mut finder = Finder::new(dir.path(), "%(path:fmt=s:rgx=[a-z]+/[a-z]+)_%(Y).nc").unwrap();
        assert_eq!(relative_files(&mut finder), ["ab/cd_2020.nc"]);
    }

    #[test]
    fn test_find_matches() {
        let dir = tree();
        let finder = Finder::new(dir.path(), "%(Y)/data_%(Y)-%(m)-%(d).nc").unwrap();
        let matches = finder.find_matches("2020/data_2020-01-02.nc", true).unwrap();
        assert_eq!(matches.get_string("d", false).unwrap(), "02");

        let absolute = dir.path().join("2020/data_2020-01-02.nc");
        assert!(finder
            .find_matches(absolute.to_str().unwrap(), false)
            .is_ok());
        assert!(matches!(
            finder.find_matches("2020/other.nc", true),
            Err(Error::NoMatch(_))
        ));
        assert!(matches!(
            finder.find_matches("/elsewhere/file.nc", false),
            Err(Error::OutsideRoot(_))
        ));

        let date = finder
            .get_date("2020/data_2020-01-02.nc", true, &DefaultDate::default())
            .unwrap();
        assert_eq!(date.to_string(), "2020-01-02 00:00:00");
    }

    #[test]
    fn test_make_filename() {
        let dir = tree();
        let finder = Finder::new(dir.path(), "%(Y)/data_%(Y)-%(m)-%(d).nc").unwrap();
        let relative = finder
            .make_filename([("Y", 2020), ("m", 1), ("d", 2)], true)
            .unwrap();
        assert_eq!(relative, PathBuf::from("2020/data_2020-01-02.nc"));
        let absolute = finder
            .make_filename([("Y", 2020), ("m", 1), ("d", 2)], false)
            .unwrap();
        assert!(absolute.exists());
    }

    #[test]
    fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut finder = Finder::new(dir.path().join("missing"), "%(Y).nc").unwrap();
        assert!(matches!(finder.files(), Err(Error::Walk(_))));
    }
}
