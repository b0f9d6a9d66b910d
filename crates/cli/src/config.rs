//! Configuration file loading and environment variable handling.
//!
//! Precedence: CLI args > Environment vars > Config file > Defaults

use filefinder_core::DefaultDate;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Default config file content for `--config-init`.
pub const DEFAULT_CONFIG: &str = r#"# Filefinder configuration
# See: filefinder --help for all options

# Treat patterns as regular expressions (special characters are not escaped)
use_regex = false

# Disable colored output
no_color = false

# Files to list with `find` (0 = unlimited)
limit = 0

# Date elements used when a filename does not hold them
[default_date]
year = 1970
month = 1
day = 1
"#;

/// Configuration loaded from file and environment.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub use_regex: Option<bool>,
    pub no_color: Option<bool>,
    pub limit: Option<usize>,
    pub default_date: Option<DefaultDate>,
}

impl Config {
    /// Get the config file path.
    ///
    /// - Linux: `~/.config/filefinder/config.toml`
    /// - macOS: `~/Library/Application Support/filefinder/config.toml`
    /// - Windows: `%APPDATA%\filefinder\config.toml`
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("filefinder").join("config.toml"))
    }

    /// Load config from file. Returns default if file doesn't exist.
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            return Self::default();
        };

        let Ok(contents) = fs::read_to_string(&path) else {
            return Self::default();
        };

        toml::from_str(&contents).unwrap_or_else(|e| {
            eprintln!("Warning: Failed to parse {}: {}", path.display(), e);
            Self::default()
        })
    }

    /// Read value from environment variable.
    fn env_var<T: std::str::FromStr>(name: &str) -> Option<T> {
        std::env::var(name).ok()?.parse().ok()
    }

    /// Get use_regex with precedence: env > config > default.
    pub fn use_regex(&self) -> bool {
        Self::env_var("FILEFINDER_USE_REGEX")
            .or(self.use_regex)
            .unwrap_or(false)
    }

    /// Get no_color with precedence: env > config > default.
    ///
    /// Respects the `NO_COLOR` standard (https://no-color.org/).
    pub fn no_color(&self) -> bool {
        if std::env::var("NO_COLOR").is_ok() {
            return true;
        }
        if std::env::var("FILEFINDER_NO_COLOR").is_ok() {
            return true;
        }
        self.no_color.unwrap_or(false)
    }

    /// Get limit with precedence: env > config > default.
    pub fn limit(&self) -> usize {
        Self::env_var("FILEFINDER_LIMIT").or(self.limit).unwrap_or(0)
    }

    /// Get default_date with precedence: env > config > default.
    ///
    /// The environment variable holds a date, `2000-01-01` or
    /// `2000-01-01T12:00:00`.
    pub fn default_date(&self) -> DefaultDate {
        std::env::var("FILEFINDER_DEFAULT_DATE")
            .ok()
            .and_then(|s| parse_default_date(&s).ok())
            .or(self.default_date)
            .unwrap_or_default()
    }
}

/// Parse a date given on the command line or in the environment.
///
/// Accepts a date with an optional time, separated by `T` or a space.
pub fn parse_default_date(s: &str) -> Result<DefaultDate, String> {
    parse_datetime(s).map(DefaultDate::from)
}

/// Parse `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS` or `YYYY-MM-DD HH:MM:SS`.
pub fn parse_datetime(s: &str) -> Result<chrono::NaiveDateTime, String> {
    let s = s.trim();
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| format!("Invalid date '{}' (expected YYYY-MM-DD[THH:MM:SS])", s))
}

/// Create a default config file at the standard location.
pub fn init_config() -> Result<PathBuf, String> {
    let path = Config::path().ok_or("Cannot determine config directory")?;

    if path.exists() {
        return Err(format!("Config file already exists: {}", path.display()));
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create directory: {}", e))?;
    }

    fs::write(&path, DEFAULT_CONFIG).map_err(|e| format!("Failed to write config: {}", e))?;

    Ok(path)
}
