use serde::Serialize;
use std::fmt;

/// Default when the oracle does not name the object.
pub const UNKNOWN_ITEM: &str = "Unknown Item";

/// Default when the oracle gives no reason.
pub const NO_TIP_PROVIDED: &str = "No specific tip provided.";

/// Structured disposal recommendation parsed from an oracle response.
///
/// Only [`crate::services::parser`] builds these; `classification` is never blank.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub(crate) classification: String,
    pub(crate) identified_object: String,
    pub(crate) reason: String,
}

impl ClassificationResult {
    pub(crate) fn new(
        classification: impl Into<String>,
        identified_object: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            classification: classification.into(),
            identified_object: identified_object.into(),
            reason: reason.into(),
        }
    }

    pub fn classification(&self) -> &str {
        &self.classification
    }

    pub fn identified_object(&self) -> &str {
        &self.identified_object
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn result_type(&self) -> ResultType {
        ResultType::from_classification(&self.classification)
    }
}

/// Cosmetic category used to pick an icon and color for a result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ResultType {
    Recycle,
    Trash,
    Compost,
    Uncertain,
    /// Assigned by the presentation layer for error states only.
    Error,
}

impl ResultType {
    /// Map a free-text classification to a category.
    ///
    /// Checks run in a fixed order, so "recycling or trash" is `Recycle`.
    /// Unrecognized text falls back to `Uncertain`; this never returns `Error`.
    #[allow(clippy::if_same_then_else)]
    pub fn from_classification(classification: &str) -> Self {
        let lower = classification.to_lowercase();
        if lower.contains("recycling") {
            ResultType::Recycle
        } else if lower.contains("trash") {
            ResultType::Trash
        } else if lower.contains("compost") {
            ResultType::Compost
        } else if lower.contains("uncertain") || lower.contains("check locally") {
            ResultType::Uncertain
        } else {
            ResultType::Uncertain
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ResultType::Recycle => "Recycle",
            ResultType::Trash => "Trash",
            ResultType::Compost => "Compost",
            ResultType::Uncertain => "Check locally",
            ResultType::Error => "Error",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            ResultType::Recycle => "♻",
            ResultType::Trash => "🗑",
            ResultType::Compost => "🌱",
            ResultType::Uncertain => "?",
            ResultType::Error => "⚠",
        }
    }

    /// ANSI 256-color code for terminal rendering.
    pub fn ansi_color(self) -> u8 {
        match self {
            ResultType::Recycle => 42,
            ResultType::Trash => 250,
            ResultType::Compost => 137,
            ResultType::Uncertain => 220,
            ResultType::Error => 196,
        }
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorizer_table() {
        assert_eq!(ResultType::from_classification("Recycling ♻️"), ResultType::Recycle);
        assert_eq!(
            ResultType::from_classification("Not sure, check locally"),
            ResultType::Uncertain
        );
        assert_eq!(ResultType::from_classification("Trash"), ResultType::Trash);
        assert_eq!(
            ResultType::from_classification("banana peel compost"),
            ResultType::Compost
        );
        assert_eq!(ResultType::from_classification("Hazardous"), ResultType::Uncertain);
    }

    #[test]
    fn test_categorizer_priority() {
        // "recycling" is checked before "trash"
        assert_eq!(
            ResultType::from_classification("TRASH, not recycling"),
            ResultType::Recycle
        );
        assert_eq!(
            ResultType::from_classification("Compost or Trash"),
            ResultType::Trash
        );
    }

    #[test]
    fn test_categorizer_never_returns_error() {
        for text in ["", "error", "Error: failed", "???"] {
            assert_ne!(ResultType::from_classification(text), ResultType::Error);
        }
    }

    #[test]
    fn test_result_type_from_result() {
        let result = ClassificationResult::new("Compost", "Apple core", "Food scraps.");
        assert_eq!(result.result_type(), ResultType::Compost);
        assert_eq!(result.identified_object(), "Apple core");
    }
}
