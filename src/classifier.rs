use std::fmt;

use crate::config::CategoriesConfig;

/// Event category a Klipper log line can belong to.
///
/// The declaration order is the matching priority: when a line matches
/// several categories, the earliest one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Complete,
    Pause,
    Resume,
    Error,
    Custom,
}

impl Category {
    /// All categories in priority order.
    pub const ALL: [Category; 5] = [
        Category::Complete,
        Category::Pause,
        Category::Resume,
        Category::Error,
        Category::Custom,
    ];

    /// Section name in the category document.
    pub fn section(self) -> &'static str {
        match self {
            Category::Complete => "complete",
            Category::Pause => "pause",
            Category::Resume => "resume",
            Category::Error => "error",
            Category::Custom => "custom",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section())
    }
}

/// Likely cause of a pause, guessed from the pause line itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    FilamentRunout,
    PauseCommand,
    Unknown,
}

impl PauseReason {
    /// Inspect a pause line. Runout wins over an explicit pause command.
    pub fn from_line(line: &str) -> Self {
        let lowered = line.to_lowercase();
        if lowered.contains("runout") {
            PauseReason::FilamentRunout
        } else if lowered.contains("action: pause") {
            PauseReason::PauseCommand
        } else {
            PauseReason::Unknown
        }
    }
}

impl fmt::Display for PauseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PauseReason::FilamentRunout => "Filament runout detected",
            PauseReason::PauseCommand => "Klipper pause command",
            PauseReason::Unknown => "Unknown",
        };
        f.write_str(text)
    }
}

/// Keyword classifier for log lines.
///
/// Keywords are lower-cased once at construction; each line is lower-cased
/// and tested by substring containment, so `"pause"` also matches
/// `"paused"` and `"unpause"`.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<(Category, Vec<String>)>,
}

impl Classifier {
    pub fn new(categories: &CategoriesConfig) -> Self {
        let rules = Category::ALL
            .iter()
            .map(|&category| {
                let keywords = categories
                    .rule(category)
                    .keywords
                    .iter()
                    .map(|k| k.to_lowercase())
                    .collect();
                (category, keywords)
            })
            .collect();
        Self { rules }
    }

    /// The first category, in priority order, with a keyword contained in `line`.
    pub fn classify(&self, line: &str) -> Option<Category> {
        let lowered = line.to_lowercase();
        self.rules
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k.as_str())))
            .map(|(category, _)| *category)
    }
}
