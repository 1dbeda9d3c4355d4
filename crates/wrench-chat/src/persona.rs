//! Assistant voice: every user-visible reply and every generation prompt is
//! rendered here so the three routing strategies sound like one person.

use wrench_core::config::PersonaConfig;
use wrench_core::types::{ChatMessage, MessageRole};
use wrench_rag::ScoredAtom;

use crate::generator::GenerationRequest;

/// Response styling profile built from `[persona]`.
#[derive(Debug, Clone)]
pub struct Persona {
    config: PersonaConfig,
}

impl Persona {
    pub fn new(config: PersonaConfig) -> Self {
        Self { config }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn fallback_question(&self) -> &str {
        &self.config.fallback_question
    }

    /// System message stored first in every new session.
    pub fn system_preamble(&self, vendor: &str, equipment_context: Option<&str>) -> String {
        let mut preamble = format!(
            "You are {}, a maintenance assistant for {}. Tone: {}.",
            self.config.name, self.config.organisation, self.config.tone
        );
        if !vendor.trim().is_empty() {
            preamble.push_str(&format!(" Equipment vendor: {}.", vendor.trim()));
        }
        if let Some(equipment) = equipment_context.filter(|e| !e.trim().is_empty()) {
            preamble.push_str(&format!(" Equipment: {}.", equipment.trim()));
        }
        preamble.push_str(
            " Answer only from the maintenance knowledge provided. \
             Keep every safety warning in its own sentence.",
        );
        preamble
    }

    /// Wrap a knowledge atom verbatim in the persona's opening and closing.
    pub fn restyle_direct(&self, content: &str) -> String {
        format!(
            "{}\n\n{}\n\n{}",
            self.config.opening,
            content.trim(),
            self.config.closing
        )
    }

    /// Close a synthesized answer in the persona's voice.
    pub fn restyle_synthesized(&self, body: &str) -> String {
        let body = body.trim();
        if body.is_empty() {
            return self.config.closing.clone();
        }
        format!("{}\n\n{}", body, self.config.closing)
    }

    /// Safety block appended after the answer body. Empty when there are no
    /// warnings.
    pub fn render_warnings(&self, warnings: &[String]) -> String {
        if warnings.is_empty() {
            return String::new();
        }
        let mut block = String::from("\n\nSafety first:");
        for warning in warnings {
            block.push_str("\n- ");
            block.push_str(warning.trim());
        }
        block
    }

    /// Prompt for answering from retrieved knowledge.
    pub fn synthesize_request(
        &self,
        query: &str,
        atoms: &[ScoredAtom],
        history: &[ChatMessage],
        equipment_context: Option<&str>,
        max_tokens: u32,
    ) -> GenerationRequest {
        let system = format!(
            "You are {}, a maintenance assistant for {}. Tone: {}. \
             Answer the technician's question using only the numbered knowledge below. \
             Give concrete steps. Put each safety warning in a separate sentence.",
            self.config.name, self.config.organisation, self.config.tone
        );

        let mut prompt = String::from("Knowledge:\n");
        for (i, scored) in atoms.iter().enumerate() {
            prompt.push_str(&format!("[{}] {}\n", i + 1, scored.atom.content.trim()));
        }
        push_context(&mut prompt, history, equipment_context);
        prompt.push_str(&format!("\nQuestion: {}", query.trim()));

        GenerationRequest {
            system,
            prompt,
            max_tokens,
        }
    }

    /// Prompt for asking one question about missing specifics.
    pub fn clarify_request(
        &self,
        query: &str,
        atoms: &[ScoredAtom],
        history: &[ChatMessage],
        equipment_context: Option<&str>,
        max_tokens: u32,
    ) -> GenerationRequest {
        let system = format!(
            "You are {}, a maintenance assistant for {}. Tone: {}. \
             You do not have enough information to answer yet. \
             Reply with exactly one short question asking for the missing specifics: \
             the equipment model or variant, the fault code shown, or a clearer description of the symptom. \
             Do not attempt an answer.",
            self.config.name, self.config.organisation, self.config.tone
        );

        let mut prompt = String::new();
        if !atoms.is_empty() {
            prompt.push_str("Possibly related knowledge:\n");
            for scored in atoms {
                prompt.push_str(&format!("- {}\n", first_line(&scored.atom.content)));
            }
        }
        push_context(&mut prompt, history, equipment_context);
        prompt.push_str(&format!("\nTechnician said: {}", query.trim()));

        GenerationRequest {
            system,
            prompt,
            max_tokens,
        }
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self::new(PersonaConfig::default())
    }
}

fn push_context(prompt: &mut String, history: &[ChatMessage], equipment_context: Option<&str>) {
    let turns: Vec<&ChatMessage> = history
        .iter()
        .filter(|m| m.role != MessageRole::System)
        .collect();
    if !turns.is_empty() {
        prompt.push_str("\nConversation so far:\n");
        for m in turns {
            prompt.push_str(&format!("{}: {}\n", m.role.as_str(), m.content.trim()));
        }
    }
    if let Some(equipment) = equipment_context.filter(|e| !e.trim().is_empty()) {
        prompt.push_str(&format!("\nEquipment: {}\n", equipment.trim()));
    }
}

fn first_line(text: &str) -> &str {
    text.trim().lines().next().unwrap_or("")
}
