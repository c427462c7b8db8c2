pub mod error;
pub mod repo;
pub mod wiki;

pub use error::{ErrorCategory, Result, ResultExt, TransportKind, WikiError};
pub use repo::{HostType, RepositorySpec};
pub use wiki::{
    GeneratedPage, Importance, PageMap, PagePlan, PageStatus, StructurePlan, WikiSection,
};

// =============================================================================
// Domain Newtypes
// =============================================================================

use std::fmt;

/// Type-safe wrapper for run IDs
///
/// Each generation run gets a fresh id so log lines from concurrent runs
/// can be told apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for log prefixes
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Language code passed to the backend (`en`, `ja`, `zh`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Language(String);

impl Language {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    /// Human-readable name used inside prompts
    pub fn display_name(&self) -> &'static str {
        match self.0.as_str() {
            "ja" => "Japanese (日本語)",
            "zh" => "Mandarin Chinese (中文)",
            "es" => "Spanish (Español)",
            "kr" => "Korean (한국어)",
            "vi" => "Vietnamese (Tiếng Việt)",
            _ => "English",
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Self("en".to_string())
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_short() {
        let id = RunId::from("0123456789abcdef");
        assert_eq!(id.short(), "01234567");
        assert_eq!(RunId::from("abc").short(), "abc");
        assert_ne!(RunId::generate(), RunId::generate());
    }

    #[test]
    fn test_language_display_name() {
        assert_eq!(Language::new("ja").display_name(), "Japanese (日本語)");
        assert_eq!(Language::new("en").display_name(), "English");
        assert_eq!(Language::new("xx").display_name(), "English");
        assert_eq!(Language::default().code(), "en");
    }
}
