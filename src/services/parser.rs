use crate::models::{ClassificationResult, NO_TIP_PROVIDED, UNKNOWN_ITEM};
use regex::Regex;
use std::sync::LazyLock;

use super::prompt::{CLASSIFICATION_PLACEHOLDER, OBJECT_PLACEHOLDER, REASON_PLACEHOLDER};

static DEFAULT_PARSER: LazyLock<ResponseParser> = LazyLock::new(ResponseParser::new);

/// Parse oracle text with the shared parser.
///
/// Returns `None` when no usable `Classification:` line is present; a partial
/// result is never returned.
pub fn parse_classification(raw: &str) -> Option<ClassificationResult> {
    DEFAULT_PARSER.parse(raw)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Object,
    Classification,
    Reason,
}

/// Turns labeled oracle output into a [`ClassificationResult`].
///
/// # Fields
///
/// Patterns are compiled once at construction:
///
/// - `labels`: one pattern per label, tried in order Object, Classification, Reason
///   - Pattern: `(?i)^object\s*:(.*)$`
///   - Example match: "object :  Plastic Bottle" captures "  Plastic Bottle"
///
/// The value keeps its original case. Only the label keyword is matched
/// case-insensitively.
pub struct ResponseParser {
    labels: Vec<(Field, Regex, &'static str)>,
}

impl ResponseParser {
    pub fn new() -> Self {
        let label = |name: &str| {
            Regex::new(&format!(r"(?i)^{}\s*:(.*)$", name)).expect("Invalid label regex")
        };

        Self {
            labels: vec![
                (Field::Object, label("object"), OBJECT_PLACEHOLDER),
                (
                    Field::Classification,
                    label("classification"),
                    CLASSIFICATION_PLACEHOLDER,
                ),
                (Field::Reason, label("reason"), REASON_PLACEHOLDER),
            ],
        }
    }

    pub fn parse(&self, raw: &str) -> Option<ClassificationResult> {
        if raw.trim().is_empty() {
            tracing::debug!("Oracle response is blank");
            return None;
        }

        let mut object: Option<String> = None;
        let mut classification: Option<String> = None;
        let mut reason: Option<String> = None;

        for line in raw.lines().map(str::trim) {
            let Some((field, value)) = self.match_line(line) else {
                continue;
            };
            // Last match wins; a placeholder resets the field to unset
            let slot = match field {
                Field::Object => &mut object,
                Field::Classification => &mut classification,
                Field::Reason => &mut reason,
            };
            *slot = value;
        }

        // Only an unset field is defaulted; a blank object or reason stays blank
        let classification = classification.filter(|c| !c.is_empty())?;

        Some(ClassificationResult::new(
            classification,
            object.unwrap_or_else(|| UNKNOWN_ITEM.to_string()),
            reason.unwrap_or_else(|| NO_TIP_PROVIDED.to_string()),
        ))
    }

    /// Match one trimmed line. The inner `Option` is `None` for a placeholder value.
    fn match_line(&self, line: &str) -> Option<(Field, Option<String>)> {
        self.labels.iter().find_map(|(field, pattern, placeholder)| {
            let captures = pattern.captures(line)?;
            let value = captures.get(1).map_or("", |m| m.as_str()).trim();
            if value.eq_ignore_ascii_case(placeholder) {
                Some((*field, None))
            } else {
                Some((*field, Some(value.to_string())))
            }
        })
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_complete_response() {
        let result = parse_classification(
            "Object: Plastic Bottle\nClassification: Recycling\nReason: PET #1 is accepted curbside.",
        )
        .unwrap();

        assert_eq!(result.identified_object(), "Plastic Bottle");
        assert_eq!(result.classification(), "Recycling");
        assert_eq!(result.reason(), "PET #1 is accepted curbside.");
    }

    #[test]
    fn test_classification_only_uses_defaults() {
        let result = parse_classification("Classification: Recycling").unwrap();
        assert_eq!(result.classification(), "Recycling");
        assert_eq!(result.identified_object(), UNKNOWN_ITEM);
        assert_eq!(result.reason(), NO_TIP_PROVIDED);
    }

    #[test]
    fn test_placeholders_are_unset() {
        let result = parse_classification(
            "Object: [object name]\nClassification: Trash\nReason: [Brief Explanation]",
        )
        .unwrap();
        assert_eq!(result.identified_object(), UNKNOWN_ITEM);
        assert_eq!(result.reason(), NO_TIP_PROVIDED);

        // The echoed template on its own has no classification
        assert!(
            parse_classification(
                "Object: [Object Name]\nClassification: [Recycling/Trash/Compost/Uncertain/Check Locally]\nReason: [Brief Explanation]"
            )
            .is_none()
        );
    }

    #[test]
    fn test_missing_or_blank_classification_fails() {
        assert!(parse_classification("Object: Can\nReason: Metal").is_none());
        assert!(parse_classification("Object: Can\nClassification:   \nReason: Metal").is_none());
        assert!(parse_classification("").is_none());
        assert!(parse_classification("  \n\t \n").is_none());
        assert!(parse_classification("I think this is a bottle.").is_none());
    }

    #[test]
    fn test_blank_object_and_reason_stay_blank() {
        let result = parse_classification("Object:\nClassification: Trash").unwrap();
        assert_eq!(result.identified_object(), "");
        assert_eq!(result.reason(), NO_TIP_PROVIDED);

        let result = parse_classification("Object:\nClassification: Trash\nReason:   ").unwrap();
        assert_eq!(result.identified_object(), "");
        assert_eq!(result.reason(), "");
    }

    #[test]
    fn test_last_match_wins() {
        let result = parse_classification(
            "Classification: Trash\nObject: Cup\nClassification: Compost\nObject: Paper cup",
        )
        .unwrap();
        assert_eq!(result.classification(), "Compost");
        assert_eq!(result.identified_object(), "Paper cup");
    }

    #[test]
    fn test_later_placeholder_unsets_field() {
        let result =
            parse_classification("Object: Cup\nObject: [Object Name]\nClassification: Trash")
                .unwrap();
        assert_eq!(result.identified_object(), UNKNOWN_ITEM);
    }

    #[test]
    fn test_label_whitespace_and_case() {
        let result = parse_classification(
            "   OBJECT :  Glass Jar  \n  classification\t: Check Locally\nREASON:Rinse It First ",
        )
        .unwrap();
        assert_eq!(result.identified_object(), "Glass Jar");
        assert_eq!(result.classification(), "Check Locally");
        assert_eq!(result.reason(), "Rinse It First");
    }

    #[test]
    fn test_value_may_contain_colons() {
        let result =
            parse_classification("Classification: Recycling\nReason: Note: rinse first").unwrap();
        assert_eq!(result.reason(), "Note: rinse first");
    }

    #[test]
    fn test_unlabeled_lines_ignored() {
        let result = parse_classification(
            "Sure! Here is my answer.\n\nObject: Banana peel\nClassification: Compost\nReason: Food scraps.\nHope this helps.",
        )
        .unwrap();
        assert_eq!(result.classification(), "Compost");
    }

    #[test]
    fn test_label_must_start_line() {
        assert!(parse_classification("My Classification: Trash").is_none());
    }

    #[test]
    fn test_windows_line_endings() {
        let result = parse_classification("Object: Can\r\nClassification: Recycling\r\n").unwrap();
        assert_eq!(result.identified_object(), "Can");
        assert_eq!(result.classification(), "Recycling");
    }

    fn field_value() -> impl Strategy<Value = String> {
        "[A-Za-z0-9][A-Za-z0-9 ,.'-]{0,30}[A-Za-z0-9.]"
    }

    proptest! {
        #[test]
        fn prop_well_formed_response_round_trips(
            object in field_value(),
            classification in field_value(),
            reason in field_value(),
        ) {
            let raw = format!(
                "Object: {}\nClassification: {}\nReason: {}",
                object, classification, reason
            );
            let result = parse_classification(&raw).unwrap();
            prop_assert_eq!(result.identified_object(), object.as_str());
            prop_assert_eq!(result.classification(), classification.as_str());
            prop_assert_eq!(result.reason(), reason.as_str());
        }

        #[test]
        fn prop_never_panics(raw in "\\PC*") {
            let _ = parse_classification(&raw);
        }

        #[test]
        fn prop_result_classification_never_blank(raw in "(?s).{0,200}") {
            if let Some(result) = parse_classification(&raw) {
                prop_assert!(!result.classification().trim().is_empty());
            }
        }
    }
}
