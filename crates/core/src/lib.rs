//! Filefinder Core
//!
//! Describe a family of filenames with a pattern, find the matching files in
//! a directory tree, and retrieve the values each filename holds.
//!
//! A pattern is literal text with embedded groups, `%(name[:specs])`. Each
//! group compiles to a regex and knows how to parse its match into a value,
//! or format a value back into a filename.
//!
//! # Quick Start
//!
//! ```
//! use filefinder_core::{Pattern, Value};
//!
//! let pattern = Pattern::new("%(Y)/sst_%(Y)%(m)%(d)_%(depth:fmt=.1f)m.nc", false).unwrap();
//!
//! let matches = pattern.match_filename("2012/sst_20120315_12.5m.nc").unwrap().unwrap();
//! assert_eq!(matches.get_value("m", false).unwrap(), Value::Int(3));
//! assert_eq!(matches.get_value("depth", false).unwrap(), Value::Float(12.5));
//!
//! let date = matches.get_date(&Default::default()).unwrap();
//! assert_eq!(date.to_string(), "2012-03-15 00:00:00");
//! ```
//!
//! # Generating Filenames
//!
//! ```
//! use filefinder_core::Pattern;
//!
//! let pattern = Pattern::new("%(Y)/sst_%(Y)%(m)%(d).nc", false).unwrap();
//! let filename = pattern.make_filename([("Y", 2012), ("m", 3), ("d", 15)]).unwrap();
//! assert_eq!(filename, "2012/sst_20120315.nc");
//! ```
//!
//! # Scanning a Directory
//!
//! ```no_run
//! use filefinder_core::Finder;
//!
//! let mut finder = Finder::new("/data/sst", "%(Y)/sst_%(Y)%(m)%(d).nc").unwrap();
//! finder.fix_group("m", vec![6, 7, 8], false).unwrap();
//! for (filename, matches) in finder.files().unwrap() {
//!     println!("{filename}: {}", matches.get_date(&Default::default()).unwrap());
//! }
//! ```

pub mod date;
pub mod error;
pub mod filter;
pub mod finder;
pub mod format;
pub mod group;
pub mod matches;
pub mod pattern;
pub mod types;

pub use date::{date_to_string, date_to_value, DefaultDate};
pub use error::{Error, Result};
pub use filter::{filter_by_range, CompositeFilter, DateRangeFilter, Filter, GroupFilter};
pub use finder::{Finder, Nested};
pub use format::{Align, FormatKind, FormatSpec, Sign};
pub use group::{Fixed, Group, BUILTIN_GROUPS};
pub use matches::{Match, Matches};
pub use pattern::Pattern;
pub use types::{FixValue, GroupKey, Value};
