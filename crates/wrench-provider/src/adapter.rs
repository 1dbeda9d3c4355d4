//! LLM response adapters.
//!
//! Each vendor dialect gets its own adapter, chosen from the provider's
//! configured dialect. Parsing never invents content: a payload that does not
//! have the expected shape comes back as `Malformed` with the raw body.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use wrench_core::types::Dialect;

use crate::error::ProviderError;

/// Token accounting reported by the vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl Usage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

/// Normalized completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub usage: Option<Usage>,
    pub model_id: Option<String>,
}

/// Result of parsing a vendor payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome<T> {
    Parsed(T),
    Malformed { raw: String, reason: String },
}

impl<T> ParseOutcome<T> {
    fn malformed(raw: &str, reason: impl Into<String>) -> Self {
        ParseOutcome::Malformed {
            raw: raw.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, ParseOutcome::Parsed(_))
    }

    /// Convert into an attempt result. `Malformed` becomes a permanent
    /// provider error so the executor moves on.
    pub fn into_result(self) -> Result<T, ProviderError> {
        match self {
            ParseOutcome::Parsed(value) => Ok(value),
            ParseOutcome::Malformed { reason, .. } => Err(ProviderError::Malformed(reason)),
        }
    }
}

/// Parses one vendor's completion payload.
pub trait ResponseAdapter: Send + Sync {
    fn dialect(&self) -> Dialect;

    fn parse(&self, raw: &str) -> ParseOutcome<Completion>;
}

/// `choices[].message.content`
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiAdapter;

/// `candidates[].content.parts[].text`
#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiAdapter;

static OPENAI: OpenAiAdapter = OpenAiAdapter;
static GEMINI: GeminiAdapter = GeminiAdapter;

/// Adapter for a configured dialect.
pub fn adapter_for(dialect: Dialect) -> &'static dyn ResponseAdapter {
    match dialect {
        Dialect::Openai => &OPENAI,
        Dialect::Gemini => &GEMINI,
    }
}

impl ResponseAdapter for OpenAiAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Openai
    }

    fn parse(&self, raw: &str) -> ParseOutcome<Completion> {
        let json = match parse_object(raw) {
            Ok(json) => json,
            Err(outcome) => return outcome,
        };

        let text = match json
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
        {
            Some(text) if !text.trim().is_empty() => text.trim().to_string(),
            Some(_) => return ParseOutcome::malformed(raw, "empty choices[0].message.content"),
            None => return ParseOutcome::malformed(raw, "missing choices[0].message.content"),
        };

        let usage = json.get("usage").map(|u| Usage {
            prompt_tokens: read_u32(u, "prompt_tokens"),
            completion_tokens: read_u32(u, "completion_tokens"),
        });
        let model_id = json.get("model").and_then(Value::as_str).map(str::to_string);

        ParseOutcome::Parsed(Completion {
            text,
            usage,
            model_id,
        })
    }
}

impl ResponseAdapter for GeminiAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Gemini
    }

    fn parse(&self, raw: &str) -> ParseOutcome<Completion> {
        let json = match parse_object(raw) {
            Ok(json) => json,
            Err(outcome) => return outcome,
        };

        let parts = match json
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
        {
            Some(parts) => parts,
            None => return ParseOutcome::malformed(raw, "missing candidates[0].content.parts"),
        };

        let text: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("");
        if text.trim().is_empty() {
            return ParseOutcome::malformed(raw, "no text in candidates[0].content.parts");
        }

        let usage = json.get("usageMetadata").map(|u| Usage {
            prompt_tokens: read_u32(u, "promptTokenCount"),
            completion_tokens: read_u32(u, "candidatesTokenCount"),
        });
        let model_id = json
            .get("modelVersion")
            .and_then(Value::as_str)
            .map(str::to_string);

        ParseOutcome::Parsed(Completion {
            text: text.trim().to_string(),
            usage,
            model_id,
        })
    }
}

fn parse_object(raw: &str) -> Result<Value, ParseOutcome<Completion>> {
    let json: Value = serde_json::from_str(raw)
        .map_err(|e| ParseOutcome::malformed(raw, format!("invalid JSON: {}", e)))?;

    if let Some(message) = json.pointer("/error/message").and_then(Value::as_str) {
        return Err(ParseOutcome::malformed(
            raw,
            format!("vendor error: {}", message),
        ));
    }
    if !json.is_object() {
        return Err(ParseOutcome::malformed(raw, "payload is not a JSON object"));
    }
    Ok(json)
}

fn read_u32(value: &Value, key: &str) -> u32 {
    value
        .get(key)
        .and_then(Value::as_u64)
        .map(|n| n.min(u32::MAX as u64) as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_payload() {
        let raw = r#"{
            "id": "chatcmpl-1",
            "model": "llama-3.1-70b-versatile",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "  Reset the breaker.  "}}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 8, "total_tokens": 128}
        }"#;
        let outcome = OpenAiAdapter.parse(raw);
        assert_eq!(
            outcome,
            ParseOutcome::Parsed(Completion {
                text: "Reset the breaker.".to_string(),
                usage: Some(Usage {
                    prompt_tokens: 120,
                    completion_tokens: 8
                }),
                model_id: Some("llama-3.1-70b-versatile".to_string()),
            })
        );
    }

    #[test]
    fn test_gemini_payload_joins_parts() {
        let raw = r#"{
            "candidates": [{"content": {"parts": [{"text": "Check the filter. "}, {"text": "Then restart."}], "role": "model"}}],
            "usageMetadata": {"promptTokenCount": 50, "candidatesTokenCount": 9},
            "modelVersion": "gemini-1.5-flash"
        }"#;
        match GeminiAdapter.parse(raw) {
            ParseOutcome::Parsed(c) => {
                assert_eq!(c.text, "Check the filter. Then restart.");
                assert_eq!(c.usage.unwrap().total(), 59);
                assert_eq!(c.model_id.as_deref(), Some("gemini-1.5-flash"));
            }
            other => panic!("expected parsed, got {:?}", other),
        }
    }

    #[test]
    fn test_usage_is_optional() {
        let raw = r#"{"choices": [{"message": {"content": "ok"}}]}"#;
        match OpenAiAdapter.parse(raw) {
            ParseOutcome::Parsed(c) => {
                assert!(c.usage.is_none());
                assert!(c.model_id.is_none());
            }
            other => panic!("expected parsed, got {:?}", other),
        }
    }

    #[test]
    fn test_usage_total_saturates() {
        let usage = Usage {
            prompt_tokens: u32::MAX,
            completion_tokens: 10,
        };
        assert_eq!(usage.total(), u32::MAX);
        assert_eq!(
            Usage {
                prompt_tokens: 12,
                completion_tokens: 30
            }
            .total(),
            42
        );
    }

    #[test]
    fn test_wrong_dialect_is_malformed_not_empty() {
        let gemini_raw = r#"{"candidates": [{"content": {"parts": [{"text": "hi"}]}}]}"#;
        let outcome = OpenAiAdapter.parse(gemini_raw);
        match outcome {
            ParseOutcome::Malformed { raw, reason } => {
                assert_eq!(raw, gemini_raw);
                assert!(reason.contains("choices"));
            }
            other => panic!("expected malformed, got {:?}", other),
        }
        assert!(!GeminiAdapter
            .parse(r#"{"choices": [{"message": {"content": "hi"}}]}"#)
            .is_parsed());
    }

    #[test]
    fn test_invalid_json_and_vendor_errors() {
        assert!(!OpenAiAdapter.parse("<html>502 Bad Gateway</html>").is_parsed());
        match OpenAiAdapter.parse(r#"{"error": {"message": "quota exceeded", "code": 429}}"#) {
            ParseOutcome::Malformed { reason, .. } => assert_eq!(reason, "vendor error: quota exceeded"),
            other => panic!("expected malformed, got {:?}", other),
        }
        assert!(!GeminiAdapter.parse("[1, 2, 3]").is_parsed());
    }

    #[test]
    fn test_blank_content_is_malformed() {
        let raw = r#"{"choices": [{"message": {"content": "   "}}]}"#;
        assert!(!OpenAiAdapter.parse(raw).is_parsed());
    }

    #[test]
    fn test_into_result() {
        let ok: ParseOutcome<u8> = ParseOutcome::Parsed(1);
        assert_eq!(ok.into_result(), Ok(1));
        let bad: ParseOutcome<u8> = ParseOutcome::Malformed {
            raw: "x".into(),
            reason: "nope".into(),
        };
        let err = bad.into_result().unwrap_err();
        assert_eq!(err, ProviderError::Malformed("nope".to_string()));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_adapter_for_dialect() {
        assert_eq!(adapter_for(Dialect::Openai).dialect(), Dialect::Openai);
        assert_eq!(adapter_for(Dialect::Gemini).dialect(), Dialect::Gemini);
    }
}
