use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::classifier::Category;
use crate::error::ConfigError;

/// SMTP settings used to build the email notifier.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP relay host, reached with STARTTLS.
    /// Environment variable: `SMTP_SERVER`
    pub server: String,

    /// SMTP submission port.
    /// Environment variable: `SMTP_PORT`
    pub port: u16,

    /// Account used to log in; also the `From` address.
    /// Environment variable: `SMTP_EMAIL`
    pub login: String,

    /// Password (or app password) for `login`.
    /// Environment variable: `SMTP_PASS`
    pub password: String,

    /// Address every notification is delivered to.
    /// Environment variable: `SMTP_TO`
    pub recipient: String,
}

/// Configuration for the printer monitor loaded from environment variables.
///
/// Paths fall back to defaults relative to the working directory so the
/// monitor can be started from its install directory by a service manager.
/// SMTP credentials have no defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// The Klipper log to follow.
    /// Environment variable: `KLIPPY_LOG`
    pub log_file: PathBuf,

    /// TOML document defining the keyword categories.
    /// Environment variable: `MONITOR_CONFIG`
    pub categories_file: PathBuf,

    /// Append-only event log.
    /// Environment variable: `MONITOR_EVENT_LOG`
    pub event_log_file: PathBuf,

    pub smtp: SmtpConfig,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value cannot be parsed:
    /// - `KLIPPY_LOG`: Klipper log path (default: "printer_data/logs/klippy.log")
    /// - `MONITOR_CONFIG`: category document (default: "printer_monitor_config.toml")
    /// - `MONITOR_EVENT_LOG`: event log path (default: "monitor_events.log")
    /// - `SMTP_SERVER`: SMTP relay (default: "smtp.gmail.com")
    /// - `SMTP_PORT`: SMTP port (default: "587")
    /// - `SMTP_EMAIL`: login and sender address (required)
    /// - `SMTP_PASS`: SMTP password (required)
    /// - `SMTP_TO`: notification recipient (required)
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_file = PathBuf::from(
            lookup("KLIPPY_LOG").unwrap_or_else(|| "printer_data/logs/klippy.log".to_string()),
        );

        let categories_file = PathBuf::from(
            lookup("MONITOR_CONFIG").unwrap_or_else(|| "printer_monitor_config.toml".to_string()),
        );

        let event_log_file = PathBuf::from(
            lookup("MONITOR_EVENT_LOG").unwrap_or_else(|| "monitor_events.log".to_string()),
        );

        let server = lookup("SMTP_SERVER").unwrap_or_else(|| "smtp.gmail.com".to_string());

        let port_value = lookup("SMTP_PORT").unwrap_or_else(|| "587".to_string());
        let port = port_value
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "SMTP_PORT".to_string(),
                value: port_value.clone(),
                reason: e.to_string(),
            })?;

        let required = |name: &str| {
            lookup(name).ok_or_else(|| ConfigError::MissingEnvVar {
                var_name: name.to_string(),
            })
        };

        let smtp = SmtpConfig {
            server,
            port,
            login: required("SMTP_EMAIL")?,
            password: required("SMTP_PASS")?,
            recipient: required("SMTP_TO")?,
        };

        Ok(Config {
            log_file,
            categories_file,
            event_log_file,
            smtp,
        })
    }
}

/// Keyword rule and side-effect policy for one category.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRule {
    /// Matched as case-insensitive substrings of each log line.
    pub keywords: Vec<String>,
    /// Send an email when the category fires.
    pub notify: bool,
    /// Append an event record when the category fires.
    pub log: bool,
}

/// The category document: one required section per [`Category`].
#[derive(Debug, Clone, Deserialize)]
pub struct CategoriesConfig {
    pub complete: CategoryRule,
    pub pause: CategoryRule,
    pub resume: CategoryRule,
    pub error: CategoryRule,
    pub custom: CategoryRule,
}

impl CategoriesConfig {
    /// Read and validate the category document at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, is
    /// missing a section or field, or contains a blank keyword.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    /// Parse and validate a category document. `origin` names the source in errors.
    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: CategoriesConfig =
            toml::from_str(content).map_err(|e| ConfigError::InvalidCategories {
                path: origin.to_string(),
                reason: e.message().to_string(),
            })?;

        // A blank keyword is a substring of every line.
        for category in Category::ALL {
            let rule = config.rule(category);
            if let Some(index) = rule.keywords.iter().position(|k| k.trim().is_empty()) {
                return Err(ConfigError::InvalidCategories {
                    path: origin.to_string(),
                    reason: format!(
                        "keyword #{} of section '{}' is empty",
                        index + 1,
                        category.section()
                    ),
                });
            }
        }

        Ok(config)
    }

    /// The rule configured for `category`.
    pub fn rule(&self, category: Category) -> &CategoryRule {
        match category {
            Category::Complete => &self.complete,
            Category::Pause => &self.pause,
            Category::Resume => &self.resume,
            Category::Error => &self.error,
            Category::Custom => &self.custom,
        }
    }
}

/// Application constants used throughout the system.
pub mod constants {
    use std::time::Duration;

    /// Idle delay of the main tail loop when no new line is available.
    pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

    /// Idle delay inside the shutdown collection window.
    pub const COLLECT_POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// How long related lines are gathered after an error line.
    pub const SHUTDOWN_COLLECT_WINDOW: Duration = Duration::from_secs(5);

    /// Lines inside the collection window containing this are reported.
    pub const SHUTDOWN_MARKER: &str = "shutdown";

    /// Public address used to discover the outbound interface. Nothing is sent.
    pub const IP_PROBE_ADDR: &str = "8.8.8.8:80";

    /// Reported in place of the local IP when it cannot be determined.
    pub const IP_UNAVAILABLE: &str = "Unavailable";
}
