mod config;
mod output;

use config::Config;

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use clap::{CommandFactory, Parser, Subcommand};
use colored::{control::set_override, Colorize};
use filefinder_core::{
    filter_by_range, DateRangeFilter, DefaultDate, Error, Finder, FixValue, GroupKey, Pattern, Result,
};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

const LONG_ABOUT: &str = r##"
Filefinder finds files from a filename pattern and retrieves the values
their filenames hold.

A pattern is literal text with embedded groups, %(name[:specs]). Each group
matches part of a filename and parses it into a value, or formats a value
back into a filename. Directory levels are separated by '/'.

GROUP SPECS:
  :fmt=SPEC        Format spec, e.g. 05.2f, +d, >8s (type letter required)
  :rgx=REGEX       Custom regex, may use %Y style replacements
  :bool=TRUE[:F]   Boolean group matching one of two literals
  :opt             Group may be absent from the filename
  :discard         Group is ignored when reading values and dates

DEFAULT GROUPS:
  Y year, m month, d day, j day of year, H hour, M minute, S second,
  x YYYYMMDD, X HHMMSS, F YYYY-MM-DD, B month name, I integer,
  text letters, char any filename characters

EXAMPLES:
  filefinder regex '%(Y)/sst_%(x).nc'                      Show the regex
  filefinder match '%(Y)_%(m)' 2020_03 --date              Parse one filename
  filefinder find /data '%(Y)/sst_%(x).nc' -f Y=2012       Find files
  filefinder make '%(Y)/sst_%(x).nc' -f Y=2012 -f x=20120315  Generate

FIXING GROUPS:
  --fix KEY=VALUE pins groups to a value. KEY is a group name (every group
  with that name) or an index. VALUE is parsed with the group format; a
  comma separated list matches any of its elements.

CONFIG:
  Settings are read from the config file (see --config-path), then the
  FILEFINDER_* environment variables, then the command line.
"##;

#[derive(Parser)]
#[command(name = "filefinder")]
#[command(version, about = "Find files from a filename pattern", long_about = LONG_ABOUT)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Treat patterns as regular expressions
    ///
    /// Special characters outside groups are not escaped. Filenames can no
    /// longer be generated.
    #[arg(long, short = 'R', global = true)]
    use_regex: bool,

    /// Disable colored output
    #[arg(long, short = 'C', global = true)]
    no_color: bool,

    /// Maximum files listed by `find` (0 = unlimited)
    #[arg(long, short = 'l', global = true)]
    limit: Option<usize>,

    /// Date used for the elements a filename does not hold
    ///
    /// Format: YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS. Defaults to 1970-01-01.
    #[arg(long, value_name = "DATE", value_parser = config::parse_default_date, global = true)]
    default_date: Option<DefaultDate>,

    /// Enable verbose logging (use multiple times for more detail)
    ///
    /// -v shows debug messages, -vv shows trace messages.
    /// Useful for understanding why a file was or wasn't matched.
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Show config file path
    #[arg(long)]
    config_path: bool,

    /// Generate default config file (see --config-path for location)
    #[arg(long)]
    config_init: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show the regex a pattern compiles to
    Regex {
        pattern: String,

        /// Fix a group to a value (repeatable)
        #[arg(long = "fix", short = 'f', value_name = "KEY=VALUE", value_parser = parse_fix)]
        fixes: Vec<(GroupKey, String)>,

        /// List the groups of the pattern
        #[arg(long, short = 'g')]
        groups: bool,

        /// Output as JSON
        #[arg(long, short = 'j')]
        json: bool,
    },

    /// Match a single filename against a pattern
    Match {
        pattern: String,

        filename: String,

        /// Also reconcile the date held by the filename
        #[arg(long, short = 'd')]
        date: bool,

        /// Output as JSON
        #[arg(long, short = 'j')]
        json: bool,
    },

    /// Find the files matching a pattern below a root directory
    Find {
        root: PathBuf,

        pattern: String,

        /// Fix a group to a value (repeatable)
        #[arg(long = "fix", short = 'f', value_name = "KEY=VALUE", value_parser = parse_fix)]
        fixes: Vec<(GroupKey, String)>,

        /// Keep files whose group value is at least N (repeatable)
        #[arg(long, value_name = "KEY=N", value_parser = parse_bound)]
        min: Vec<(GroupKey, f64)>,

        /// Keep files whose group value is at most N (repeatable)
        #[arg(long, value_name = "KEY=N", value_parser = parse_bound)]
        max: Vec<(GroupKey, f64)>,

        /// Keep files dated at or after DATE
        #[arg(long, value_name = "DATE", value_parser = config::parse_datetime)]
        after: Option<NaiveDateTime>,

        /// Keep files dated at or before DATE
        #[arg(long, value_name = "DATE", value_parser = config::parse_datetime)]
        before: Option<NaiveDateTime>,

        /// Show the date of each file
        #[arg(long, short = 'd')]
        date: bool,

        /// Print absolute paths
        #[arg(long, short = 'a')]
        absolute: bool,

        /// Show every group of every file
        #[arg(long, short = 'm')]
        matches: bool,

        /// Output as JSON
        #[arg(long, short = 'j')]
        json: bool,
    },

    /// Generate a filename from a pattern and group values
    Make {
        pattern: String,

        /// Value of a group (repeatable)
        #[arg(long = "fix", short = 'f', value_name = "KEY=VALUE", value_parser = parse_fix, required = true)]
        fixes: Vec<(GroupKey, String)>,

        /// Prepend a root directory
        #[arg(long, short = 'r')]
        root: Option<PathBuf>,
    },
}

/// Settings merged from the command line, environment and config file.
struct Settings {
    use_regex: bool,
    limit: usize,
    default_date: DefaultDate,
}

/// A group index or a group name.
fn parse_key(s: &str) -> GroupKey {
    s.parse::<usize>()
        .map(GroupKey::Index)
        .unwrap_or_else(|_| GroupKey::from(s))
}

/// Parse `KEY=VALUE`. The value is kept as text until the group is known.
fn parse_fix(s: &str) -> std::result::Result<(GroupKey, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("missing group key in '{}'", s));
    }
    Ok((parse_key(key), value.to_string()))
}

/// Parse `KEY=N` for range bounds.
fn parse_bound(s: &str) -> std::result::Result<(GroupKey, f64), String> {
    let (key, value) = parse_fix(s)?;
    let n = value
        .trim()
        .parse()
        .map_err(|_| format!("expected a number after '=', got '{}'", value))?;
    Ok((key, n))
}

/// Turn textual fixes into values, using the format of the first group each
/// key selects.
fn resolve_fixes(pattern: &Pattern, fixes: &[(GroupKey, String)]) -> Result<Vec<(GroupKey, FixValue)>> {
    fixes
        .iter()
        .map(|(key, raw)| {
            let groups = pattern.get_groups(key.clone())?;
            let group = groups.first().ok_or_else(|| Error::NotFound { key: key.to_string() })?;
            let mut values = raw
                .split(',')
                .map(|part| group.value_from_str(part))
                .collect::<Result<Vec<_>>>()?;
            let value = if values.len() == 1 {
                FixValue::One(values.remove(0))
            } else {
                FixValue::List(values)
            };
            tracing::debug!(key = %key, value = ?value, "resolved fix");
            Ok((key.clone(), value))
        })
        .collect()
}

/// Print an error and exit with status 1.
fn fail(e: impl Display) -> ! {
    eprintln!("{}: {}", "error".red().bold(), e);
    std::process::exit(1);
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => fail(e),
    }
}

fn cmd_regex(
    settings: &Settings,
    pattern: &str,
    fixes: &[(GroupKey, String)],
    groups: bool,
    json: bool,
) -> Result<()> {
    let mut pattern = Pattern::new(pattern, settings.use_regex)?;
    let fixes = resolve_fixes(&pattern, fixes)?;
    pattern.fix_groups(fixes, false)?;
    // Fail early on a regex the engine rejects.
    pattern.compile()?;

    if json {
        print_json(&output::groups_json(&pattern));
        return Ok(());
    }
    println!("{}", pattern.regex());
    if groups {
        print!("{}", output::format_groups(&pattern));
    }
    Ok(())
}

fn cmd_match(settings: &Settings, pattern: &str, filename: &str, date: bool, json: bool) -> Result<()> {
    let pattern = Pattern::new(pattern, settings.use_regex)?;
    let matches = pattern
        .match_filename(filename)?
        .ok_or_else(|| Error::NoMatch(filename.to_string()))?;
    let date = date.then(|| matches.get_date(&settings.default_date));

    if json {
        print_json(&output::matches_json(filename, &matches, date.as_ref()));
    } else {
        print!("{}", output::format_matches(filename, &matches, date.as_ref()));
    }
    Ok(())
}

/// Range filters, one per key, from `--min` and `--max`.
fn range_bounds(
    min: &[(GroupKey, f64)],
    max: &[(GroupKey, f64)],
) -> BTreeMap<String, (GroupKey, Option<f64>, Option<f64>)> {
    let mut bounds: BTreeMap<String, (GroupKey, Option<f64>, Option<f64>)> = BTreeMap::new();
    for (key, n) in min {
        bounds
            .entry(key.to_string())
            .or_insert_with(|| (key.clone(), None, None))
            .1 = Some(*n);
    }
    for (key, n) in max {
        bounds
            .entry(key.to_string())
            .or_insert_with(|| (key.clone(), None, None))
            .2 = Some(*n);
    }
    bounds
}

#[allow(clippy::too_many_arguments)]
fn cmd_find(
    settings: &Settings,
    root: &Path,
    pattern: &str,
    fixes: &[(GroupKey, String)],
    min: &[(GroupKey, f64)],
    max: &[(GroupKey, f64)],
    after: Option<NaiveDateTime>,
    before: Option<NaiveDateTime>,
    show_date: bool,
    absolute: bool,
    show_matches: bool,
    json: bool,
) -> Result<()> {
    let mut finder = Finder::with_regex(root, pattern, settings.use_regex)?;
    let fixes = resolve_fixes(finder.pattern(), fixes)?;
    finder.fix_groups(fixes, false)?;

    for (_, (key, lo, hi)) in range_bounds(min, max) {
        finder.add_filter(filter_by_range(key, lo, hi));
    }
    if after.is_some() || before.is_some() {
        let mut filter = DateRangeFilter::new().with_default(settings.default_date);
        if let Some(start) = after {
            filter = filter.with_start(start);
        }
        if let Some(stop) = before {
            filter = filter.with_stop(stop);
        }
        finder.add_filter(filter);
    }
    if !finder.filters().is_empty() {
        tracing::debug!(filters = ?finder.filters().filter_descriptions(), "filters");
    }

    let root = finder.root().to_path_buf();
    let files = finder.files()?;
    let total = files.len();
    let shown = if settings.limit == 0 { total } else { total.min(settings.limit) };

    let display_name = |filename: &str| {
        if absolute {
            root.join(filename).display().to_string()
        } else {
            filename.to_string()
        }
    };

    if json {
        let docs = files[..shown]
            .iter()
            .map(|(filename, matches)| {
                let date = show_date.then(|| matches.get_date(&settings.default_date));
                output::matches_json(&display_name(filename), matches, date.as_ref())
            })
            .collect();
        print_json(&serde_json::Value::Array(docs));
        return Ok(());
    }

    for (filename, matches) in &files[..shown] {
        let date = show_date.then(|| matches.get_date(&settings.default_date));
        if show_matches {
            print!("{}", output::format_matches(&display_name(filename), matches, date.as_ref()));
        } else {
            println!("{}", output::format_file_line(&display_name(filename), date.as_ref()));
        }
    }
    if shown < total {
        eprintln!(
            "{}",
            format!("... {} more files (use -l 0 to show all)", total - shown).dimmed()
        );
    }
    Ok(())
}

fn cmd_make(settings: &Settings, pattern: &str, fixes: &[(GroupKey, String)], root: Option<&Path>) -> Result<()> {
    let pattern = Pattern::new(pattern, settings.use_regex)?;
    let fixes = resolve_fixes(&pattern, fixes)?;
    let filename = pattern.make_filename(fixes)?;
    match root {
        Some(root) => println!("{}", root.join(filename).display()),
        None => println!("{}", filename),
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    // Handle --config-path
    if cli.config_path {
        match Config::path() {
            Some(path) => println!("{}", path.display()),
            None => fail("Cannot determine config directory"),
        }
        return;
    }

    // Handle --config-init
    if cli.config_init {
        match config::init_config() {
            Ok(path) => println!("Created config file: {}", path.display()),
            Err(e) => fail(e),
        }
        return;
    }

    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        std::process::exit(2);
    };

    // Initialize tracing based on verbosity level (before config loading for logging)
    let level = match cli.verbose {
        0 => LevelFilter::OFF,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    if level != LevelFilter::OFF {
        let filter = EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy();
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    // Precedence: CLI args > Environment vars > Config file > Defaults
    let file_config = Config::load();

    if let Some(path) = Config::path() {
        if path.exists() {
            tracing::debug!("Loaded config from: {}", path.display());
        } else {
            tracing::trace!("No config file at: {}", path.display());
        }
    }

    let use_regex = if cli.use_regex {
        tracing::debug!("use_regex = true (from CLI)");
        true
    } else {
        let r = file_config.use_regex();
        let source = if std::env::var("FILEFINDER_USE_REGEX").is_ok() {
            "env FILEFINDER_USE_REGEX"
        } else if file_config.use_regex.is_some() {
            "config file"
        } else {
            "default"
        };
        tracing::debug!("use_regex = {} (from {})", r, source);
        r
    };

    let limit = if let Some(l) = cli.limit {
        tracing::debug!("limit = {} (from CLI)", l);
        l
    } else {
        let l = file_config.limit();
        let source = if std::env::var("FILEFINDER_LIMIT").is_ok() {
            "env FILEFINDER_LIMIT"
        } else if file_config.limit.is_some() {
            "config file"
        } else {
            "default"
        };
        tracing::debug!("limit = {} (from {})", l, source);
        l
    };

    let default_date = if let Some(d) = cli.default_date {
        tracing::debug!("default_date = {:?} (from CLI)", d);
        d
    } else {
        let d = file_config.default_date();
        let source = if std::env::var("FILEFINDER_DEFAULT_DATE").is_ok() {
            "env FILEFINDER_DEFAULT_DATE"
        } else if file_config.default_date.is_some() {
            "config file"
        } else {
            "default"
        };
        tracing::debug!("default_date = {:?} (from {})", d, source);
        d
    };

    let no_color = if cli.no_color {
        tracing::debug!("no_color = true (from CLI)");
        true
    } else {
        let nc = file_config.no_color();
        if nc {
            let source = if std::env::var("NO_COLOR").is_ok() {
                "env NO_COLOR"
            } else if std::env::var("FILEFINDER_NO_COLOR").is_ok() {
                "env FILEFINDER_NO_COLOR"
            } else {
                "config file"
            };
            tracing::debug!("no_color = true (from {})", source);
        }
        nc
    };
    if no_color {
        set_override(false);
    }

    let settings = Settings {
        use_regex,
        limit,
        default_date,
    };

    let result = match command {
        Command::Regex {
            pattern,
            fixes,
            groups,
            json,
        } => cmd_regex(&settings, &pattern, &fixes, groups, json),
        Command::Match {
            pattern,
            filename,
            date,
            json,
        } => cmd_match(&settings, &pattern, &filename, date, json),
        Command::Find {
            root,
            pattern,
            fixes,
            min,
            max,
            after,
            before,
            date,
            absolute,
            matches,
            json,
        } => cmd_find(
            &settings, &root, &pattern, &fixes, &min, &max, after, before, date, absolute, matches, json,
        ),
        Command::Make { pattern, fixes, root } => cmd_make(&settings, &pattern, &fixes, root.as_deref()),
    };

    if let Err(e) = result {
        fail(e);
    }
}
