//! Annotation input types.
//!
//! Annotation lists arrive from a stored file or a generative service with
//! loosely shaped records. `RawAnnotation` accepts every known spelling;
//! `AnnotationInput` resolves it once, so the engine only ever sees a
//! validated `Annotation` or an explicit malformed marker.

use serde::{Deserialize, Serialize};

use super::color::Rgb;
use crate::error::LayoutError;

/// An annotation exactly as supplied, with every field optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAnnotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
    /// Compatibility alias of `quote`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl RawAnnotation {
    pub fn new(quote: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            quote: Some(quote.into()),
            explanation: Some(explanation.into()),
            ..Default::default()
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// Which input field supplied the quote text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteField {
    Quote,
    Query,
}

/// A validated annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub quote: String,
    pub explanation: String,
    /// Parsed color; `None` when absent or unparseable.
    pub color: Option<Rgb>,
    pub quote_field: QuoteField,
    /// The record this annotation was resolved from.
    pub raw: RawAnnotation,
}

impl Annotation {
    /// Builds an annotation directly. The quote is taken as given; use
    /// `TryFrom<RawAnnotation>` for untrusted input.
    pub fn new(quote: impl Into<String>, explanation: impl Into<String>) -> Self {
        let quote = quote.into();
        let explanation = explanation.into();
        Self {
            raw: RawAnnotation::new(quote.clone(), explanation.clone()),
            quote,
            explanation,
            color: None,
            quote_field: QuoteField::Quote,
        }
    }

    pub fn with_color(mut self, color: Rgb) -> Self {
        self.color = Some(color);
        self.raw.color = Some(color.to_string());
        self
    }
}

impl TryFrom<RawAnnotation> for Annotation {
    type Error = LayoutError;

    fn try_from(raw: RawAnnotation) -> Result<Self, Self::Error> {
        let pick = |field: &Option<String>| {
            field
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let (quote, quote_field) = match (pick(&raw.quote), pick(&raw.query)) {
            (Some(q), _) => (q, QuoteField::Quote),
            (None, Some(q)) => (q, QuoteField::Query),
            (None, None) => {
                return Err(LayoutError::MalformedAnnotation {
                    reason: "missing quote (also checked \"query\")".to_string(),
                });
            }
        };
        let explanation = raw
            .explanation
            .clone()
            .unwrap_or_else(|| format!("Note: {quote}"));
        let color = raw
            .color
            .as_deref()
            .and_then(|c| Rgb::parse_optional(c).ok().flatten());

        Ok(Self {
            quote,
            explanation,
            color,
            quote_field,
            raw,
        })
    }
}

/// An annotation after boundary resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationInput {
    Valid(Annotation),
    Malformed { raw: RawAnnotation, reason: String },
}

impl AnnotationInput {
    /// Resolves a whole list, keeping input order.
    pub fn resolve_all(raws: impl IntoIterator<Item = RawAnnotation>) -> Vec<AnnotationInput> {
        raws.into_iter().map(AnnotationInput::from).collect()
    }

    pub fn raw(&self) -> &RawAnnotation {
        match self {
            AnnotationInput::Valid(a) => &a.raw,
            AnnotationInput::Malformed { raw, .. } => raw,
        }
    }

    pub fn as_valid(&self) -> Option<&Annotation> {
        match self {
            AnnotationInput::Valid(a) => Some(a),
            AnnotationInput::Malformed { .. } => None,
        }
    }
}

impl From<RawAnnotation> for AnnotationInput {
    fn from(raw: RawAnnotation) -> Self {
        match Annotation::try_from(raw.clone()) {
            Ok(a) => AnnotationInput::Valid(a),
            Err(LayoutError::MalformedAnnotation { reason }) => {
                AnnotationInput::Malformed { raw, reason }
            }
            Err(other) => AnnotationInput::Malformed {
                raw,
                reason: other.to_string(),
            },
        }
    }
}

impl From<Annotation> for AnnotationInput {
    fn from(a: Annotation) -> Self {
        AnnotationInput::Valid(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_alias_resolves_to_quote() {
        let raw = RawAnnotation {
            query: Some("  The quick fox ".to_string()),
            ..Default::default()
        };
        let a = Annotation::try_from(raw).unwrap();
        assert_eq!(a.quote, "The quick fox");
        assert_eq!(a.quote_field, QuoteField::Query);
        assert_eq!(a.explanation, "Note: The quick fox");
    }

    #[test]
    fn quote_wins_over_query() {
        let raw = RawAnnotation {
            quote: Some("a".to_string()),
            query: Some("b".to_string()),
            ..Default::default()
        };
        let a = Annotation::try_from(raw).unwrap();
        assert_eq!(a.quote, "a");
        assert_eq!(a.quote_field, QuoteField::Quote);
    }

    #[test]
    fn blank_quote_is_malformed() {
        let raw = RawAnnotation {
            quote: Some("   ".to_string()),
            explanation: Some("x".to_string()),
            ..Default::default()
        };
        match AnnotationInput::from(raw.clone()) {
            AnnotationInput::Malformed { raw: kept, reason } => {
                assert_eq!(kept, raw);
                assert!(reason.contains("missing quote"));
            }
            other => panic!("expected malformed, got {other:?}"),
        }
    }

    #[test]
    fn bad_color_is_dropped_not_fatal() {
        let raw = RawAnnotation::new("q", "e").with_color("not-a-color");
        let a = Annotation::try_from(raw).unwrap();
        assert_eq!(a.color, None);
        assert_eq!(a.raw.color.as_deref(), Some("not-a-color"));
    }

    #[test]
    fn deserializes_with_missing_fields() {
        let raws: Vec<RawAnnotation> =
            serde_json::from_str(r##"[{"quote":"x","color":"#A5D6A7"},{"explanation":"y"}]"##)
                .unwrap();
        let inputs = AnnotationInput::resolve_all(raws);
        assert!(inputs[0].as_valid().is_some());
        assert!(inputs[1].as_valid().is_none());
    }
}
