//! Answer types returned by the engine.

use crate::document::{DocType, MetaValue, Metadata, TYPE_KEY};
use crate::router::Intent;
use serde::Serialize;

/// One retrieved chunk cited in an answer.
///
/// Carries a short excerpt and the chunk's full metadata so callers can
/// render their own attribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    pub excerpt: String,
    pub metadata: Metadata,
}

impl SourceRef {
    fn text(&self, key: &str) -> String {
        self.metadata
            .get(key)
            .map(MetaValue::to_string)
            .unwrap_or_else(|| "?".to_string())
    }

    /// Short human label for the source, by document type.
    pub fn attribution(&self) -> String {
        let doc_type = self.metadata.get(TYPE_KEY).and_then(MetaValue::as_str);
        match doc_type {
            Some(t) if t == DocType::UserReview.as_str() => {
                format!("r/{} (score {})", self.text("subreddit"), self.text("score"))
            }
            Some(t) if t == DocType::RitualGuide.as_str() => {
                format!("ritual: {}", self.text("section"))
            }
            Some(t) if t == DocType::Hotel.as_str() => {
                format!("{} ({})", self.text("name"), self.text("city"))
            }
            Some(t) if t == DocType::DestinationInfo.as_str() => {
                format!("{}: {}", self.text("city"), self.text("section"))
            }
            _ => self
                .metadata
                .get("url")
                .map(MetaValue::to_string)
                .unwrap_or_else(|| "unknown source".to_string()),
        }
    }
}

/// Result of one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub intent: Intent,
    /// Produced from the raw question with no retrieved context.
    pub ungrounded: bool,
    /// The filtered search returned nothing; the model was not called.
    pub no_match: bool,
}

impl RagAnswer {
    pub fn no_matching_data(question: &str, intent: Intent) -> Self {
        Self {
            answer: format!(
                "I could not find any information matching \"{}\" in the knowledge base.",
                question
            ),
            sources: Vec::new(),
            intent,
            ungrounded: false,
            no_match: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(pairs: &[(&str, MetaValue)]) -> SourceRef {
        SourceRef {
            excerpt: String::new(),
            metadata: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn test_attribution_per_type() {
        let review = source(&[
            ("type", "user_review".into()),
            ("subreddit", "Umrah".into()),
            ("score", MetaValue::Int(42)),
        ]);
        assert_eq!(review.attribution(), "r/Umrah (score 42)");

        let ritual = source(&[("type", "ritual_guide".into()), ("section", "tawaf".into())]);
        assert_eq!(ritual.attribution(), "ritual: tawaf");

        let hotel = source(&[
            ("type", "hotel".into()),
            ("name", "Dar Al Eiman".into()),
            ("city", "makkah".into()),
        ]);
        assert_eq!(hotel.attribution(), "Dar Al Eiman (makkah)");

        let destination = source(&[
            ("type", "destination_info".into()),
            ("city", "madinah".into()),
            ("section", "attractions".into()),
        ]);
        assert_eq!(destination.attribution(), "madinah: attractions");
    }

    #[test]
    fn test_no_matching_data_shape() {
        let answer = RagAnswer::no_matching_data("Hotels in Taif?", Intent::Hotel);
        assert!(answer.no_match);
        assert!(!answer.ungrounded);
        assert!(answer.sources.is_empty());
        assert!(answer.answer.contains("Hotels in Taif?"));
    }
}
