//! Command tags attached to functionality-driven turns.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::l10n::{self, Locale, TextKey};

/// A code action the user can trigger on selected source.
///
/// Serialized with the backend's wire tag (`EXPLAIN_CODE`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Functionality {
    #[serde(rename = "EXPLAIN_CODE")]
    ExplainCode,
    #[serde(rename = "FIX_CODE")]
    FixCode,
    #[serde(rename = "GENERATE_COMMENTS")]
    CommentCode,
    #[serde(rename = "GENERATE_TESTS")]
    GenerateTest,
    #[serde(rename = "CHECK_PERFORMANCE")]
    CheckPerformance,
    #[serde(rename = "REVIEW_CODE")]
    ReviewCode,
    #[serde(rename = "COMMENT_METHOD")]
    CommentMethod,
    #[serde(rename = "GENERATE_COMMIT")]
    GenerateCommit,
}

impl Functionality {
    /// All functionalities, in menu order.
    pub fn all() -> &'static [Functionality] {
        &[
            Functionality::ExplainCode,
            Functionality::FixCode,
            Functionality::CommentCode,
            Functionality::GenerateTest,
            Functionality::CheckPerformance,
            Functionality::ReviewCode,
            Functionality::CommentMethod,
            Functionality::GenerateCommit,
        ]
    }

    /// Wire tag understood by the DevPilot backend.
    pub fn wire_tag(&self) -> &'static str {
        match self {
            Functionality::ExplainCode => "EXPLAIN_CODE",
            Functionality::FixCode => "FIX_CODE",
            Functionality::CommentCode => "GENERATE_COMMENTS",
            Functionality::GenerateTest => "GENERATE_TESTS",
            Functionality::CheckPerformance => "CHECK_PERFORMANCE",
            Functionality::ReviewCode => "REVIEW_CODE",
            Functionality::CommentMethod => "COMMENT_METHOD",
            Functionality::GenerateCommit => "GENERATE_COMMIT",
        }
    }

    /// Label displayed as the user message of a functionality turn.
    pub fn label(&self, locale: Locale) -> &'static str {
        let key = match self {
            Functionality::ExplainCode => TextKey::OperationExplain,
            Functionality::FixCode => TextKey::OperationFix,
            Functionality::CommentCode => TextKey::OperationComment,
            Functionality::GenerateTest => TextKey::OperationTest,
            Functionality::CheckPerformance => TextKey::OperationPerformance,
            Functionality::ReviewCode => TextKey::OperationReview,
            Functionality::CommentMethod => TextKey::OperationCommentMethod,
            Functionality::GenerateCommit => TextKey::OperationCommit,
        };
        l10n::text(locale, key)
    }
}

impl fmt::Display for Functionality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_tag())
    }
}

impl FromStr for Functionality {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_ascii_uppercase().replace('-', "_");
        Functionality::all()
            .iter()
            .copied()
            .find(|f| f.wire_tag() == normalized)
            .or(match normalized.as_str() {
                "EXPLAIN" => Some(Functionality::ExplainCode),
                "FIX" => Some(Functionality::FixCode),
                "COMMENT" => Some(Functionality::CommentCode),
                "TEST" => Some(Functionality::GenerateTest),
                "PERFORMANCE" => Some(Functionality::CheckPerformance),
                "REVIEW" => Some(Functionality::ReviewCode),
                _ => None,
            })
            .ok_or_else(|| CoreError::UnknownFunctionality(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_tag_serialization() {
        let json = serde_json::to_string(&Functionality::CommentCode).unwrap();
        assert_eq!(json, "\"GENERATE_COMMENTS\"");

        let parsed: Functionality = serde_json::from_str("\"FIX_CODE\"").unwrap();
        assert_eq!(parsed, Functionality::FixCode);
    }

    #[test]
    fn test_parse_short_names() {
        assert_eq!(
            "explain".parse::<Functionality>().unwrap(),
            Functionality::ExplainCode
        );
        assert_eq!(
            "generate_tests".parse::<Functionality>().unwrap(),
            Functionality::GenerateTest
        );
        assert!("dance".parse::<Functionality>().is_err());
    }
}
