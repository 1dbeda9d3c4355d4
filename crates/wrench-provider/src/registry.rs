//! Provider registry: the validated, priority-ordered providers of each chain.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use wrench_core::config::ProviderConfig;
use wrench_core::types::{ChainId, Dialect, ProviderKind, ProviderId};

use crate::credential::validate_credential;
use crate::error::RegistryError;

/// Whether a provider may be attempted. Decided once, at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    SkippedInvalidCredential { reason: String },
}

/// A registered provider. Immutable until the registry is rebuilt.
#[derive(Clone)]
pub struct Provider {
    pub id: ProviderId,
    pub chain: ChainId,
    pub kind: ProviderKind,
    pub priority: u32,
    pub dialect: Dialect,
    /// Overrides the per-kind attempt timeout.
    pub timeout: Option<Duration>,
    pub eligibility: Eligibility,
    credential: String,
}

impl Provider {
    /// The resolved credential (connection URL or API key).
    pub fn credential(&self) -> &str {
        &self.credential
    }

    pub fn is_eligible(&self) -> bool {
        self.eligibility == Eligibility::Eligible
    }
}

// Credentials never reach logs.
impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("id", &self.id)
            .field("chain", &self.chain)
            .field("kind", &self.kind)
            .field("priority", &self.priority)
            .field("dialect", &self.dialect)
            .field("timeout", &self.timeout)
            .field("eligibility", &self.eligibility)
            .finish_non_exhaustive()
    }
}

/// Every configured provider, grouped by chain and sorted by priority.
///
/// Built once from configuration and shared behind an `Arc`. There is no
/// process-wide registry; callers pass it to whatever needs it.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    chains: HashMap<ChainId, Vec<Arc<Provider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from the `[[providers]]` config list.
    ///
    /// Stops at the first structural error. Invalid credentials do not fail
    /// the build; those providers are registered as skipped.
    pub fn from_config(providers: &[ProviderConfig]) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for config in providers {
            registry.register(config)?;
        }
        Ok(registry)
    }

    /// Validate and add one provider.
    ///
    /// The credential check runs here and only here. Duplicate names and
    /// duplicate priorities within a chain are rejected.
    pub fn register(&mut self, config: &ProviderConfig) -> Result<Arc<Provider>, RegistryError> {
        let name = config.name.trim();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let id = ProviderId::new(name);
        let chain = ChainId::new(config.chain.trim());
        if chain.as_str().is_empty() {
            return Err(RegistryError::EmptyChain { provider: id });
        }
        if self.get(&id).is_some() {
            return Err(RegistryError::DuplicateName(id));
        }

        let members = self.chains.entry(chain.clone()).or_default();
        if let Some(existing) = members.iter().find(|p| p.priority == config.priority) {
            return Err(RegistryError::DuplicatePriority {
                chain,
                priority: config.priority,
                existing: existing.id.clone(),
                provider: id,
            });
        }

        let credential = config.resolve_credential();
        let eligibility = match validate_credential(config.kind, &credential) {
            Ok(()) => {
                info!(provider = %id, chain = %chain, priority = config.priority, "Provider eligible");
                Eligibility::Eligible
            }
            Err(reason) => {
                warn!(provider = %id, chain = %chain, reason = %reason, "Provider skipped: invalid credential");
                Eligibility::SkippedInvalidCredential { reason }
            }
        };

        let provider = Arc::new(Provider {
            id,
            chain,
            kind: config.kind,
            priority: config.priority,
            dialect: config.dialect,
            timeout: config.timeout_ms.map(Duration::from_millis),
            eligibility,
            credential,
        });

        let pos = members.partition_point(|p| p.priority < provider.priority);
        members.insert(pos, Arc::clone(&provider));
        Ok(provider)
    }

    /// Eligible providers of a chain, ascending by priority.
    pub fn list_eligible(&self, chain: &ChainId) -> Vec<Arc<Provider>> {
        self.chains
            .get(chain)
            .map(|members| {
                members
                    .iter()
                    .filter(|p| p.is_eligible())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every provider of a chain, skipped ones included, ascending by priority.
    pub fn list_all(&self, chain: &ChainId) -> Vec<Arc<Provider>> {
        self.chains.get(chain).cloned().unwrap_or_default()
    }

    /// Chain names, sorted.
    pub fn chains(&self) -> Vec<ChainId> {
        let mut chains: Vec<ChainId> = self.chains.keys().cloned().collect();
        chains.sort();
        chains
    }

    pub fn get(&self, id: &ProviderId) -> Option<Arc<Provider>> {
        self.chains
            .values()
            .flat_map(|members| members.iter())
            .find(|p| &p.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.chains.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
