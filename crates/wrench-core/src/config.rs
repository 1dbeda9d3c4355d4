use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, WrenchError};
use crate::types::{Dialect, ProviderKind};

/// Top-level configuration for the wrench support core.
///
/// Loaded from `~/.wrench/config.toml` by default. Each section corresponds
/// to one component; `[[providers]]` lists every candidate provider of every
/// chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WrenchConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub failover: FailoverConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub persona: PersonaConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl WrenchConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: WrenchConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| WrenchError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the session database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.wrench/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Per-attempt timeouts applied by the failover executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FailoverConfig {
    /// Timeout for a single database attempt, in milliseconds.
    pub database_timeout_ms: u64,
    /// Timeout for a single LLM attempt, in milliseconds.
    pub llm_timeout_ms: u64,
}

impl FailoverConfig {
    pub fn timeout_for(&self, kind: ProviderKind) -> Duration {
        match kind {
            ProviderKind::Database => Duration::from_millis(self.database_timeout_ms),
            ProviderKind::Llm => Duration::from_millis(self.llm_timeout_ms),
        }
    }
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            database_timeout_ms: ProviderKind::Database.default_timeout().as_millis() as u64,
            llm_timeout_ms: ProviderKind::Llm.default_timeout().as_millis() as u64,
        }
    }
}

/// Rolling health window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Number of recent outcomes kept per provider.
    pub window_size: usize,
    /// Minimum success ratio for `Healthy`.
    pub healthy_threshold: f64,
    /// Outcomes older than this are dropped before classification.
    pub max_age_secs: Option<u64>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            window_size: 20,
            healthy_threshold: 0.8,
            max_age_secs: None,
        }
    }
}

/// Knowledge retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of atoms requested from the search backend.
    pub top_k: usize,
    /// Matches below this cosine similarity are discarded.
    pub min_similarity: f64,
    /// How many recent turns feed the query summary.
    pub summary_turns: usize,
    /// Upper bound on the query summary length, in characters.
    pub summary_chars: usize,
    /// Chain used for embedding calls.
    pub embed_chain: String,
    /// Chain used for vector search calls.
    pub search_chain: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_similarity: 0.35,
            summary_turns: 3,
            summary_chars: 240,
            embed_chain: "embedding".to_string(),
            search_chain: "knowledge".to_string(),
        }
    }
}

/// Confidence routing thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Confidence at or above which the top atom is answered directly.
    pub direct_threshold: f64,
    /// Confidence at or above which an answer is synthesized.
    pub synthesize_threshold: f64,
    /// History turns included in generation prompts.
    pub history_turns: usize,
    /// Chain used for generative calls.
    pub generation_chain: String,
    /// Token cap passed to the generator.
    pub max_tokens: u32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            direct_threshold: 0.85,
            synthesize_threshold: 0.70,
            history_turns: 6,
            generation_chain: "generation".to_string(),
            max_tokens: 512,
        }
    }
}

/// Chat session lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle minutes before a sweep marks a session timed out.
    pub inactivity_minutes: i64,
    /// Seconds between background sweeps.
    pub sweep_interval_secs: u64,
    /// Default number of messages returned by a history fetch.
    pub history_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_minutes: 30,
            sweep_interval_secs: 60,
            history_limit: 10,
        }
    }
}

/// Terms and patterns that mark a sentence as a safety warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Plain terms, matched case-insensitively on word boundaries.
    pub terms: Vec<String>,
    /// Extra regular expressions.
    pub patterns: Vec<String>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        let terms = [
            "lockout",
            "tagout",
            "lock out",
            "tag out",
            "de-energize",
            "disconnect power",
            "isolate power",
            "high voltage",
            "arc flash",
            "PPE",
            "protective gloves",
            "safety glasses",
            "danger",
            "warning",
            "caution",
            "hazard",
            "hot surface",
            "refrigerant",
            "pressurized",
            "gas leak",
        ];
        Self {
            terms: terms.iter().map(|t| t.to_string()).collect(),
            patterns: vec![],
        }
    }
}

/// Voice used for every assistant reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    /// Name the assistant introduces itself with.
    pub name: String,
    /// Who the assistant works for.
    pub organisation: String,
    /// Short description of tone, fed to generation prompts.
    pub tone: String,
    /// Line opening a direct answer.
    pub opening: String,
    /// Line closing every answer.
    pub closing: String,
    /// Asked when retrieval gives nothing to work with.
    pub fallback_question: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: "Wrench".to_string(),
            organisation: "the maintenance support desk".to_string(),
            tone: "calm, practical, short sentences, no jargon without explanation".to_string(),
            opening: "Here is what the manual says:".to_string(),
            closing: "Let me know if that sorts it out.".to_string(),
            fallback_question: "Could you tell me the exact equipment model, any fault code on the display, and what the unit is doing?".to_string(),
        }
    }
}

/// One candidate provider in a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique provider name.
    pub name: String,
    /// Chain this provider belongs to.
    pub chain: String,
    pub kind: ProviderKind,
    /// Inline credential: a connection URL for databases, an API key for LLMs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    /// Environment variable holding the credential, read at load time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_env: Option<String>,
    /// Lower is tried first. Unique within a chain.
    pub priority: u32,
    #[serde(default)]
    pub dialect: Dialect,
    /// Overrides the per-kind attempt timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ProviderConfig {
    /// Provider with an inline credential, default dialect and timeout.
    pub fn new(
        name: impl Into<String>,
        chain: impl Into<String>,
        kind: ProviderKind,
        credential: impl Into<String>,
        priority: u32,
    ) -> Self {
        Self {
            name: name.into(),
            chain: chain.into(),
            kind,
            credential: Some(credential.into()),
            credential_env: None,
            priority,
            dialect: Dialect::default(),
            timeout_ms: None,
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Resolve the credential: the inline value wins, then the environment
    /// variable. A missing variable yields an empty credential.
    pub fn resolve_credential(&self) -> String {
        if let Some(ref c) = self.credential {
            return c.clone();
        }
        match self.credential_env {
            Some(ref var) => std::env::var(var).unwrap_or_default(),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = WrenchConfig::default();
        assert_eq!(config.failover.database_timeout_ms, 5_000);
        assert_eq!(config.failover.llm_timeout_ms, 10_000);
        assert_eq!(config.health.window_size, 20);
        assert!((config.health.healthy_threshold - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.retrieval.top_k, 5);
        assert!((config.routing.direct_threshold - 0.85).abs() < f64::EPSILON);
        assert!((config.routing.synthesize_threshold - 0.70).abs() < f64::EPSILON);
        assert_eq!(config.session.inactivity_minutes, 30);
        assert_eq!(config.session.history_limit, 10);
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_timeout_for_kind() {
        let failover = FailoverConfig::default();
        assert_eq!(
            failover.timeout_for(ProviderKind::Database),
            Duration::from_secs(5)
        );
        assert_eq!(failover.timeout_for(ProviderKind::Llm), Duration::from_secs(10));
    }

    #[test]
    fn test_load_partial_config_with_providers() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[routing]
direct_threshold = 0.9

[[providers]]
name = "groq"
chain = "generation"
kind = "llm"
credential = "gsk_abcdefghijklmnopqrstuvwxyz"
priority = 1

[[providers]]
name = "gemini"
chain = "generation"
kind = "llm"
credential_env = "WRENCH_TEST_UNSET_GEMINI_KEY"
priority = 2
dialect = "gemini"
timeout_ms = 8000
"#
        )
        .unwrap();

        let config = WrenchConfig::load(file.path()).unwrap();
        assert!((config.routing.direct_threshold - 0.9).abs() < f64::EPSILON);
        // Untouched fields keep their defaults.
        assert!((config.routing.synthesize_threshold - 0.70).abs() < f64::EPSILON);
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].dialect, Dialect::Openai);
        assert_eq!(config.providers[1].dialect, Dialect::Gemini);
        assert_eq!(config.providers[1].timeout_ms, Some(8000));
        assert_eq!(config.providers[1].resolve_credential(), "");
    }

    #[test]
    fn test_load_missing_file_errors() {
        let result = WrenchConfig::load(Path::new("/nonexistent/wrench/config.toml"));
        assert!(matches!(result, Err(WrenchError::Io(_))));
    }

    #[test]
    fn test_load_or_default_on_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is = = not toml").unwrap();
        let config = WrenchConfig::load_or_default(file.path());
        assert_eq!(config.retrieval.top_k, 5);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = WrenchConfig::default();
        config.session.inactivity_minutes = 45;
        config.providers.push(ProviderConfig {
            name: "neon".to_string(),
            chain: "database".to_string(),
            kind: ProviderKind::Database,
            credential: Some("postgres://user:pw@db.example.com/app".to_string()),
            credential_env: None,
            priority: 1,
            dialect: Dialect::default(),
            timeout_ms: None,
        });
        config.save(&path).unwrap();

        let loaded = WrenchConfig::load(&path).unwrap();
        assert_eq!(loaded.session.inactivity_minutes, 45);
        assert_eq!(loaded.providers, config.providers);
    }

    #[test]
    fn test_inline_credential_wins_over_env() {
        let provider = ProviderConfig {
            name: "p".to_string(),
            chain: "c".to_string(),
            kind: ProviderKind::Llm,
            credential: Some("inline".to_string()),
            credential_env: Some("PATH".to_string()),
            priority: 1,
            dialect: Dialect::Openai,
            timeout_ms: None,
        };
        assert_eq!(provider.resolve_credential(), "inline");
    }
}
