//! Configuration file parser for the hashauth tools
//!
//! Files are INI-style: `[section]` headers followed by `key = value`
//! lines. Lines starting with `#` or `;` are comments. Keys that appear
//! before any header belong to `[global]`.
//!
//! # Example
//!
//! ```no_run
//! use authconfig::AuthConfigFile;
//!
//! let config = AuthConfigFile::from_file("/etc/hashauth/hashauth.conf").unwrap();
//! let secret = config.secret("server");
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Section consulted after the role-specific one
pub const GLOBAL_SECTION: &str = "global";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Missing required option: {0}")]
    MissingOption(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Types that can be parsed from a configuration value
pub trait ConfigValue: Sized + Clone {
    fn parse_config_value(s: &str) -> Result<Self>;

    /// Type name used in error messages
    fn type_name() -> &'static str;
}

/// Duration value (units: ms, s, m, h, d; bare numbers are seconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration(pub std::time::Duration);

impl Duration {
    pub const fn from_secs(secs: u64) -> Self {
        Duration(std::time::Duration::from_secs(secs))
    }
}

impl ConfigValue for Duration {
    fn parse_config_value(s: &str) -> Result<Self> {
        parse_duration(s).map(Duration)
    }

    fn type_name() -> &'static str {
        "duration"
    }
}

/// Count value (plain non-negative integer)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Count(pub u64);

impl ConfigValue for Count {
    fn parse_config_value(s: &str) -> Result<Self> {
        s.trim()
            .parse()
            .map(Count)
            .map_err(|_| ConfigError::ParseError(format!("Invalid count: {}", s)))
    }

    fn type_name() -> &'static str {
        "count"
    }
}

impl ConfigValue for bool {
    fn parse_config_value(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => Err(ConfigError::ParseError(format!("Invalid bool: {}", s))),
        }
    }

    fn type_name() -> &'static str {
        "bool"
    }
}

impl ConfigValue for String {
    fn parse_config_value(s: &str) -> Result<Self> {
        Ok(s.to_string())
    }

    fn type_name() -> &'static str {
        "string"
    }
}

/// A named option with a typed default
pub struct ConfigOption<T: ConfigValue> {
    name: &'static str,
    default: T,
}

impl<T: ConfigValue> ConfigOption<T> {
    pub const fn new(name: &'static str, default: T) -> Self {
        Self { name, default }
    }

    /// Value from the first section in `sections` that sets the option,
    /// or the default when none does
    ///
    /// A value that fails to parse is an error rather than a silent
    /// fallback to the default.
    pub fn get(&self, config: &AuthConfigFile, sections: &[&str]) -> Result<T> {
        match config.get_with_fallback(sections, self.name) {
            Some(raw) => T::parse_config_value(raw).map_err(|e| {
                ConfigError::ParseError(format!(
                    "option '{}' expects a {}: {}",
                    self.name,
                    T::type_name(),
                    e
                ))
            }),
            None => Ok(self.default.clone()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }
}

fn parse_duration(s: &str) -> Result<std::time::Duration> {
    let s = s.trim();

    let num_end = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let num_str = &s[..num_end];
    let unit = s[num_end..].trim().to_lowercase();

    let num: f64 = num_str
        .parse()
        .map_err(|_| ConfigError::ParseError(format!("Invalid number: {}", num_str)))?;

    let seconds = match unit.as_str() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => num,
        "ms" | "msec" | "millisecond" | "milliseconds" => num / 1000.0,
        "m" | "min" | "mins" | "minute" | "minutes" => num * 60.0,
        "h" | "hr" | "hour" | "hours" => num * 3600.0,
        "d" | "day" | "days" => num * 86400.0,
        _ => {
            return Err(ConfigError::ParseError(format!(
                "Unknown time unit: {}",
                unit
            )))
        }
    };

    std::time::Duration::try_from_secs_f64(seconds)
        .map_err(|e| ConfigError::ParseError(format!("Invalid duration {}: {}", s, e)))
}

/// A parsed configuration file
#[derive(Debug, Clone, Default)]
pub struct AuthConfigFile {
    sections: HashMap<String, HashMap<String, String>>,
}

impl AuthConfigFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current_section = String::from(GLOBAL_SECTION);

        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let name = header.strip_suffix(']').ok_or_else(|| {
                    ConfigError::ParseError(format!(
                        "line {}: unterminated section header",
                        lineno + 1
                    ))
                })?;
                current_section = name.trim().to_string();
                sections.entry(current_section.clone()).or_default();
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| {
                ConfigError::ParseError(format!("line {}: expected 'key = value'", lineno + 1))
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::ParseError(format!(
                    "line {}: empty key",
                    lineno + 1
                )));
            }

            sections
                .entry(current_section.clone())
                .or_default()
                .insert(key.to_string(), value.trim().to_string());
        }

        Ok(Self { sections })
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|s| s.get(key))
            .map(|v| v.as_str())
    }

    /// Value of `key` from the first section in `sections` that sets it
    pub fn get_with_fallback(&self, sections: &[&str], key: &str) -> Option<&str> {
        sections
            .iter()
            .find_map(|section| self.get(section, key))
    }

    /// The shared secret for a role, looked up in `section` then `[global]`
    pub fn secret(&self, section: &str) -> Result<String> {
        self.get_with_fallback(&[section, GLOBAL_SECTION], "secret")
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .ok_or_else(|| ConfigError::MissingOption("secret".to_string()))
    }

    pub fn sections(&self) -> Vec<&str> {
        self.sections.keys().map(|s| s.as_str()).collect()
    }

    pub fn keys(&self, section: &str) -> Vec<&str> {
        self.sections
            .get(section)
            .map(|s| s.keys().map(|k| k.as_str()).collect())
            .unwrap_or_default()
    }
}

/// Define a struct of typed options loaded with section fallback
///
/// # Example
///
/// ```
/// use authconfig::{define_options, AuthConfigFile, Count, Duration};
///
/// define_options! {
///     pub struct Limits {
///         nonce_lifetime: Duration = Duration::from_secs(300),
///         nonce_size: Count = Count(64),
///     }
/// }
///
/// let file = AuthConfigFile::parse("[server]\nnonce_size = 32\n").unwrap();
/// let limits = Limits::from_config(&file, &["server", "global"]).unwrap();
///
/// assert_eq!(limits.nonce_size.0, 32);
/// assert_eq!(limits.nonce_lifetime.0.as_secs(), 300);
/// ```
#[macro_export]
macro_rules! define_options {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field:ident: $ty:ty = $default:expr
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                pub $field: $ty,
            )*
        }

        impl $name {
            /// Create with default values
            pub fn new() -> Self {
                Self {
                    $(
                        $field: $default,
                    )*
                }
            }

            /// Load from a configuration file, checking `sections` in order
            pub fn from_config(
                config: &$crate::AuthConfigFile,
                sections: &[&str],
            ) -> $crate::Result<Self> {
                Ok(Self {
                    $(
                        $field: $crate::ConfigOption::new(stringify!($field), $default)
                            .get(config, sections)?,
                    )*
                })
            }

            pub fn option_names() -> &'static [&'static str] {
                &[
                    $(stringify!($field),)*
                ]
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}
