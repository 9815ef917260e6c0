use serde::{Deserialize, Serialize};

use crate::parsing::tree::{Position, TextRange};

/// Where a declaration or reference lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Document the location belongs to
    pub uri: String,
    pub range: TextRange,
}

impl Location {
    pub fn new(uri: impl Into<String>, range: TextRange) -> Self {
        Self {
            uri: uri.into(),
            range,
        }
    }

    pub fn start_byte(&self) -> u32 {
        self.range.start_byte
    }

    pub fn contains(&self, offset: u32) -> bool {
        self.range.contains(offset)
    }

    /// Store disambiguator keeping same-named declarations of different sites apart.
    pub fn disambiguator(&self) -> String {
        format!("{}#{}", self.uri, self.range.start_byte)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Information,
    Hint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub range: TextRange,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn new(range: TextRange, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            range,
            severity,
            message: message.into(),
        }
    }
}

/// Text to insert at a position, e.g. a missing `use` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEdit {
    pub position: Position,
    pub new_text: String,
}
