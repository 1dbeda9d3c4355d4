//! Credential eligibility checks, run once when a provider is registered.

use wrench_core::types::ProviderKind;

/// URL schemes accepted for database providers.
const DATABASE_SCHEMES: &[&str] = &[
    "postgres",
    "postgresql",
    "mysql",
    "mariadb",
    "sqlite",
    "mongodb",
    "mongodb+srv",
    "redis",
    "rediss",
    "https",
];

/// Shortest API key accepted for LLM providers.
const MIN_API_KEY_LEN: usize = 16;

/// Whole-value placeholders seen in sample `.env` files.
const PLACEHOLDER_VALUES: &[&str] = &[
    "changeme",
    "change_me",
    "change-me",
    "placeholder",
    "todo",
    "none",
    "null",
    "undefined",
    "secret",
    "api_key",
    "apikey",
    "your_api_key",
];

/// Check a credential without contacting the provider.
///
/// Returns the reason the credential is unusable, if any.
pub fn validate_credential(kind: ProviderKind, credential: &str) -> Result<(), String> {
    let value = credential.trim();
    if value.is_empty() {
        return Err("credential is empty".to_string());
    }
    if let Some(reason) = placeholder_reason(value) {
        return Err(reason);
    }
    match kind {
        ProviderKind::Database => validate_database_url(value),
        ProviderKind::Llm => validate_api_key(value),
    }
}

fn placeholder_reason(value: &str) -> Option<String> {
    let lower = value.to_ascii_lowercase();

    if lower.contains("your_") || lower.contains("your-") || lower.ends_with("_here") {
        return Some("credential is a placeholder".to_string());
    }
    if value.contains("${") || value.contains("{{") || (value.starts_with('<') && value.ends_with('>')) {
        return Some("credential is an unexpanded template".to_string());
    }
    if PLACEHOLDER_VALUES.contains(&lower.as_str()) {
        return Some("credential is a placeholder".to_string());
    }

    // "sk-xxxxxxxx", "********"
    let tail = lower.rsplit(['-', '_']).next().unwrap_or(&lower);
    if tail.len() >= 4 && tail.chars().all(|c| c == 'x' || c == '*') {
        return Some("credential is masked".to_string());
    }

    None
}

fn validate_database_url(value: &str) -> Result<(), String> {
    let (scheme, rest) = value
        .split_once("://")
        .ok_or_else(|| "database credential is not a URL".to_string())?;

    let scheme = scheme.to_ascii_lowercase();
    if !DATABASE_SCHEMES.contains(&scheme.as_str()) {
        return Err(format!("unsupported database scheme '{}'", scheme));
    }
    if rest.is_empty() {
        return Err("database URL has nothing after the scheme".to_string());
    }
    if value.chars().any(char::is_whitespace) {
        return Err("database URL contains whitespace".to_string());
    }

    if scheme != "sqlite" {
        let authority = rest.split(['/', '?']).next().unwrap_or("");
        let host = authority.rsplit('@').next().unwrap_or("");
        if host.is_empty() || host.starts_with(':') {
            return Err("database URL has no host".to_string());
        }
    }

    Ok(())
}

fn validate_api_key(value: &str) -> Result<(), String> {
    if value.len() < MIN_API_KEY_LEN {
        return Err(format!(
            "API key shorter than {} characters",
            MIN_API_KEY_LEN
        ));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(format!("API key contains invalid character {:?}", bad));
    }
    Ok(())
}
