use anyhow::{Context, Result};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::alerts::timestamp;
use crate::classifier::Category;

/// Tag written in the second bracket of each event record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTag {
    Complete,
    Pause,
    Resume,
    Error,
    Custom,
    ScriptError,
}

impl From<Category> for EventTag {
    fn from(category: Category) -> Self {
        match category {
            Category::Complete => EventTag::Complete,
            Category::Pause => EventTag::Pause,
            Category::Resume => EventTag::Resume,
            Category::Error => EventTag::Error,
            Category::Custom => EventTag::Custom,
        }
    }
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            EventTag::Complete => "COMPLETE",
            EventTag::Pause => "PAUSE",
            EventTag::Resume => "RESUME",
            EventTag::Error => "ERROR",
            EventTag::Custom => "CUSTOM",
            EventTag::ScriptError => "SCRIPT_ERROR",
        };
        f.write_str(tag)
    }
}

/// Append-only event file with one `[time] [TAG] message` line per event.
///
/// The file is opened and closed on every write and created on first use.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record.
    pub fn record(&self, tag: EventTag, message: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open event log {}", self.path.display()))?;

        writeln!(file, "[{}] [{}] {}", timestamp(), tag, message)
            .with_context(|| format!("Failed to write event log {}", self.path.display()))?;

        Ok(())
    }
}
