//! Safety scanner for generated maintenance answers.
//!
//! Sentences mentioning hazards (electrical isolation, PPE, pressure, ...)
//! are pulled out of the answer body so they can be rendered as a separate,
//! prominent warnings list.

use regex::Regex;

use crate::config::SafetyConfig;
use crate::error::Result;

/// Answer text split into plain content and safety warnings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SafetySplit {
    pub body: String,
    pub warnings: Vec<String>,
}

/// Detects safety-relevant sentences.
#[derive(Debug, Clone)]
pub struct SafetyScanner {
    terms: Option<Regex>,
    patterns: Vec<Regex>,
}

impl SafetyScanner {
    /// Compile the configured terms and patterns.
    ///
    /// Fails if any extra pattern is not a valid regular expression.
    pub fn new(config: &SafetyConfig) -> Result<Self> {
        let alternatives: Vec<String> = config
            .terms
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(regex::escape)
            .collect();

        let terms = if alternatives.is_empty() {
            None
        } else {
            Some(Regex::new(&format!(
                r"(?i)\b(?:{})\b",
                alternatives.join("|")
            ))?)
        };

        let patterns = config
            .patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self { terms, patterns })
    }

    /// True if the sentence matches any safety term or pattern.
    pub fn is_safety_sentence(&self, sentence: &str) -> bool {
        if let Some(ref terms) = self.terms {
            if terms.is_match(sentence) {
                return true;
            }
        }
        self.patterns.iter().any(|p| p.is_match(sentence))
    }

    /// Split text into body sentences and warning sentences, preserving order
    /// within each.
    pub fn split(&self, text: &str) -> SafetySplit {
        let mut body: Vec<&str> = Vec::new();
        let mut warnings = Vec::new();

        for line in text.lines() {
            for sentence in split_sentences(line) {
                let sentence = sentence.trim();
                if sentence.is_empty() {
                    continue;
                }
                if self.is_safety_sentence(sentence) {
                    warnings.push(sentence.to_string());
                } else {
                    body.push(sentence);
                }
            }
        }

        SafetySplit {
            body: body.join(" "),
            warnings,
        }
    }
}

/// Split on `.`, `!` or `?` followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut result = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    for (i, c) in text.char_indices() {
        if (c == '.' || c == '!' || c == '?') && i + 1 < text.len() {
            let next = bytes.get(i + 1).copied().unwrap_or(0);
            if next == b' ' || next == b'\n' || next == b'\t' {
                result.push(&text[start..=i]);
                start = i + 1;
            }
        }
    }
    if start < text.len() {
        result.push(&text[start..]);
    }
    result
}
