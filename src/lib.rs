//! Printer Monitor - email alerts from a Klipper log.
//!
//! This library follows `klippy.log` as it grows, classifies each new line
//! by keyword, and reports print completions, pauses, resumes, shutdowns and
//! custom matches by email and/or an append-only event log.
//!
//! # Core Components
//!
//! * [`config`] - Environment settings and the TOML category document
//! * [`classifier`] - Keyword categories in priority order
//! * [`tailer`] - `tail -f` style line source
//! * [`monitor`] - The polling loop with pause debouncing and shutdown collection
//! * [`alerts`] - Device identity and email templates
//! * [`notifier`] - SMTP email delivery
//! * [`event_log`] - Append-only event records
//! * [`clock`] - Injectable time source
//! * [`error`] - Error types and handling
//!
//! # Quick Start
//!
//! ```no_run
//! use printer_monitor::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let categories = CategoriesConfig::load(&config.categories_file)?;
//! let notifier = SmtpNotifier::new(&config.smtp)?;
//! let event_log = EventLog::new(config.event_log_file.clone());
//!
//! let tailer = LogTailer::open(&config.log_file)?;
//! let mut monitor = Monitor::new(
//!     tailer,
//!     &categories,
//!     &notifier,
//!     &event_log,
//!     DeviceInfo::detect(),
//!     SystemClock,
//! );
//! let _outcome = monitor.run()?;
//! # Ok(())
//! # }
//! ```

pub mod alerts;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod error;
pub mod event_log;
pub mod monitor;
pub mod notifier;
pub mod tailer;

// Re-export commonly used types for convenience
pub use alerts::{Alert, DeviceInfo};
pub use classifier::{Category, Classifier, PauseReason};
pub use clock::{Clock, SystemClock};
pub use config::{CategoriesConfig, CategoryRule, Config, SmtpConfig};
pub use error::MonitorError;
pub use event_log::{EventLog, EventTag};
pub use monitor::{Monitor, Outcome, TailState, report_fatal};
pub use notifier::{Notifier, SmtpNotifier};
pub use tailer::{LineSource, LogTailer};
