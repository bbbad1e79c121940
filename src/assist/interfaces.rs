use crate::schema::record::SourceKind;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Drafting request sent to an assisting text-inference collaborator.
/// The transcript is already pseudonymized by the caller when the
/// deployment requires it; providers never see raw names in that case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftRequest {
    pub transcript: String,
    pub source: SourceKind,
}

/// Raw reply from a drafting collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftResponse {
    pub content: String,
    pub model: String,
}

/// A drafting reply split into its machine-readable payload and the
/// optional clarifying question the drafter appended for the interviewer.
#[derive(Debug, Clone, Default)]
pub struct DraftReply {
    pub payload: Option<serde_json::Value>,
    pub follow_up: Option<String>,
}

impl DraftResponse {
    /// Split the reply into a JSON payload and a trailing follow-up
    /// question. Drafters are prompted to answer with one JSON object
    /// first; anything after it is treated as conversational text.
    pub fn split(&self) -> DraftReply {
        let (Some(start), Some(span)) = (self.content.find('{'), first_json_object(&self.content))
        else {
            return DraftReply::default();
        };
        let payload = serde_json::from_str(span).ok();

        let tail = self.content[start + span.len()..].trim();
        let follow_up = if tail.is_empty() {
            None
        } else {
            Some(tail.to_string())
        };

        DraftReply { payload, follow_up }
    }
}

/// The first balanced `{...}` span in `text`, tracking string literals and
/// escapes so braces inside quoted values do not end the span early.
pub fn first_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// An assisting collaborator that drafts a structured pedigree payload
/// from free text. One attempt per extraction; retry policy belongs to
/// the collaborator itself, not to callers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DraftExtractor: Send + Sync {
    /// Send a drafting request to the collaborator
    async fn draft(&self, request: DraftRequest) -> Result<DraftResponse>;

    /// Check if the collaborator is available
    async fn health_check(&self) -> Result<bool>;

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(content: &str) -> DraftResponse {
        DraftResponse {
            content: content.to_string(),
            model: "test".to_string(),
        }
    }

    #[test]
    fn test_split_payload_and_follow_up() {
        let reply = response(
            "{\"schema_version\": 3, \"individuals\": []}\nCould you tell me whether the aunt was on the mother's side?",
        )
        .split();

        assert!(reply.payload.is_some());
        assert_eq!(
            reply.follow_up.as_deref(),
            Some("Could you tell me whether the aunt was on the mother's side?")
        );
    }

    #[test]
    fn test_split_payload_only() {
        let reply = response("{\"individuals\": []}").split();
        assert!(reply.payload.is_some());
        assert!(reply.follow_up.is_none());
    }

    #[test]
    fn test_split_without_json_is_empty() {
        let reply = response("I could not find any family information.").split();
        assert!(reply.payload.is_none());
        assert!(reply.follow_up.is_none());
    }

    #[test]
    fn test_first_json_object_ignores_braces_in_strings() {
        let text = "noise {\"note\": \"use {curly} braces\", \"n\": 1} trailing";
        let span = first_json_object(text).unwrap();
        assert_eq!(span, "{\"note\": \"use {curly} braces\", \"n\": 1}");
    }

    #[test]
    fn test_first_json_object_handles_nesting() {
        let text = "{\"a\": {\"b\": {\"c\": 1}}}";
        assert_eq!(first_json_object(text).unwrap(), text);
    }

    #[test]
    fn test_unbalanced_input_yields_nothing() {
        assert!(first_json_object("{\"a\": 1").is_none());
    }
}
