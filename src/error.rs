use std::fmt;

/// Custom error types for the printer monitor.
///
/// These cover the three places the monitor can fail in a way worth naming:
/// loading configuration, reading the Klipper log, and delivering email.
/// Everything else travels as a plain `anyhow::Error`.

/// Main error type for printer monitor operations.
#[derive(Debug)]
pub enum MonitorError {
    /// Configuration and setup errors.
    ConfigError(ConfigError),

    /// Errors related to following the Klipper log.
    TailError(TailError),

    /// Errors related to email delivery.
    NotifyError(NotifyError),
}

/// Errors related to configuration and application setup.
#[derive(Debug)]
pub enum ConfigError {
    /// Required environment variable is missing.
    MissingEnvVar { var_name: String },

    /// Configuration file could not be read.
    FileReadError { path: String, reason: String },

    /// Invalid configuration values provided.
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// The category document is missing a section or field, or is not valid TOML.
    InvalidCategories { path: String, reason: String },
}

/// Errors specific to tailing the source log.
#[derive(Debug)]
pub enum TailError {
    /// The source log could not be opened or positioned at its end.
    OpenFailed { path: String, reason: String },

    /// Reading new content from the source log failed.
    ReadFailed { path: String, reason: String },
}

/// Errors specific to the email notifier.
#[derive(Debug)]
pub enum NotifyError {
    /// A sender or recipient address could not be parsed.
    InvalidAddress { address: String, reason: String },

    /// The SMTP transport could not be configured.
    TransportSetup { host: String, reason: String },

    /// The message could not be assembled.
    MessageBuild { reason: String },

    /// The SMTP server rejected the message or could not be reached.
    SendFailed { subject: String, reason: String },
}

impl MonitorError {
    /// Short name of the failure family, used in `SCRIPT_ERROR` records.
    pub fn kind(&self) -> &'static str {
        match self {
            MonitorError::ConfigError(_) => "ConfigError",
            MonitorError::TailError(_) => "TailError",
            MonitorError::NotifyError(_) => "NotifyError",
        }
    }
}

/// Name the kind of an error that escaped the monitoring loop.
///
/// Known crate errors report their family; I/O errors report `IoError`;
/// anything else is a generic `Error`.
pub fn error_kind(err: &anyhow::Error) -> &'static str {
    if let Some(e) = err.downcast_ref::<MonitorError>() {
        e.kind()
    } else if err.downcast_ref::<ConfigError>().is_some() {
        "ConfigError"
    } else if err.downcast_ref::<TailError>().is_some() {
        "TailError"
    } else if err.downcast_ref::<NotifyError>().is_some() {
        "NotifyError"
    } else if err.downcast_ref::<std::io::Error>().is_some() {
        "IoError"
    } else {
        "Error"
    }
}

// Implement Display trait for user-friendly error messages
impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::ConfigError(e) => write!(f, "Configuration error: {}", e),
            MonitorError::TailError(e) => write!(f, "Log tail error: {}", e),
            MonitorError::NotifyError(e) => write!(f, "Notification error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingEnvVar { var_name } => {
                write!(f, "Required environment variable '{}' is not set", var_name)
            }
            ConfigError::FileReadError { path, reason } => {
                write!(
                    f,
                    "Failed to read configuration file '{}': {}",
                    path, reason
                )
            }
            ConfigError::InvalidValue {
                field,
                value,
                reason,
            } => {
                write!(
                    f,
                    "Invalid value '{}' for field '{}': {}",
                    value, field, reason
                )
            }
            ConfigError::InvalidCategories { path, reason } => {
                write!(f, "Invalid category configuration in '{}': {}", path, reason)
            }
        }
    }
}

impl fmt::Display for TailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TailError::OpenFailed { path, reason } => {
                write!(f, "Failed to open log '{}' for tailing: {}", path, reason)
            }
            TailError::ReadFailed { path, reason } => {
                write!(f, "Failed to read from log '{}': {}", path, reason)
            }
        }
    }
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyError::InvalidAddress { address, reason } => {
                write!(f, "Invalid email address '{}': {}", address, reason)
            }
            NotifyError::TransportSetup { host, reason } => {
                write!(f, "Failed to configure SMTP relay '{}': {}", host, reason)
            }
            NotifyError::MessageBuild { reason } => {
                write!(f, "Failed to build email message: {}", reason)
            }
            NotifyError::SendFailed { subject, reason } => {
                write!(f, "Failed to send email '{}': {}", subject, reason)
            }
        }
    }
}

// Implement std::error::Error trait
impl std::error::Error for MonitorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MonitorError::ConfigError(e) => Some(e),
            MonitorError::TailError(e) => Some(e),
            MonitorError::NotifyError(e) => Some(e),
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for TailError {}
impl std::error::Error for NotifyError {}

// Conversion traits for easy error propagation
impl From<ConfigError> for MonitorError {
    fn from(err: ConfigError) -> Self {
        MonitorError::ConfigError(err)
    }
}

impl From<TailError> for MonitorError {
    fn from(err: TailError) -> Self {
        MonitorError::TailError(err)
    }
}

impl From<NotifyError> for MonitorError {
    fn from(err: NotifyError) -> Self {
        MonitorError::NotifyError(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_names_crate_errors() {
        let err = anyhow::Error::from(MonitorError::from(NotifyError::SendFailed {
            subject: "x".to_string(),
            reason: "refused".to_string(),
        }));
        assert_eq!(error_kind(&err), "NotifyError");

        let err = anyhow::Error::from(TailError::OpenFailed {
            path: "klippy.log".to_string(),
            reason: "missing".to_string(),
        });
        assert_eq!(error_kind(&err), "TailError");
    }

    #[test]
    fn test_error_kind_falls_back() {
        let io = anyhow::Error::from(std::io::Error::other("disk gone"));
        assert_eq!(error_kind(&io), "IoError");

        let other = anyhow::anyhow!("something else");
        assert_eq!(error_kind(&other), "Error");
    }

    #[test]
    fn test_display_includes_context() {
        let err = MonitorError::from(ConfigError::MissingEnvVar {
            var_name: "SMTP_TO".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Configuration error: Required environment variable 'SMTP_TO' is not set"
        );
    }
}
