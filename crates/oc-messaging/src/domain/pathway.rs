//! # Path Configuration Registry
//!
//! Per (application, counterpart chain) security policy: which verifiers must
//! attest, how many optional verifiers are enough, how deep the source block
//! must be, and which library version is active.
//!
//! Pathways are never deleted. An update bumps the revision and keeps the
//! superseded config.

use super::errors::{MessagingError, MessagingResult};
use super::invariants::invariant_verification_requirement;
use super::value_objects::{LibraryVersion, PathKey, VerifierId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Default maximum message size (10 KiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: u32 = 10_000;

/// Verification policy for one pathway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathwayConfig {
    /// Verifiers that must all attest.
    pub required_verifiers: BTreeSet<VerifierId>,
    /// Verifiers of which `optional_threshold` must attest.
    pub optional_verifiers: BTreeSet<VerifierId>,
    /// Distinct optional attestations needed.
    pub optional_threshold: u8,
    /// Source-chain confirmations required before commit.
    pub min_confirmations: u64,
    /// Largest message accepted on send.
    pub max_message_bytes: u32,
}

impl PathwayConfig {
    /// Config requiring every verifier in `required`.
    pub fn with_required<I>(required: I) -> Self
    where
        I: IntoIterator<Item = VerifierId>,
    {
        Self {
            required_verifiers: required.into_iter().collect(),
            optional_verifiers: BTreeSet::new(),
            optional_threshold: 0,
            min_confirmations: 1,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }

    /// Add an optional verifier set with its threshold.
    pub fn optional<I>(mut self, optional: I, threshold: u8) -> Self
    where
        I: IntoIterator<Item = VerifierId>,
    {
        self.optional_verifiers = optional.into_iter().collect();
        self.optional_threshold = threshold;
        self
    }

    /// Set required source confirmations.
    pub fn min_confirmations(mut self, confirmations: u64) -> Self {
        self.min_confirmations = confirmations;
        self
    }

    /// Set the maximum message size.
    pub fn max_message_bytes(mut self, max: u32) -> Self {
        self.max_message_bytes = max;
        self
    }

    /// Check structural rules.
    pub fn validate(&self, max_verifiers_per_set: usize) -> MessagingResult<()> {
        if !invariant_verification_requirement(
            self.required_verifiers.len(),
            self.optional_threshold,
        ) {
            return Err(invalid(
                "at least one required verifier or an optional threshold is needed",
            ));
        }
        if usize::from(self.optional_threshold) > self.optional_verifiers.len() {
            return Err(MessagingError::InvalidPathwayConfig {
                reason: format!(
                    "optional threshold {} exceeds {} optional verifiers",
                    self.optional_threshold,
                    self.optional_verifiers.len()
                ),
            });
        }
        if self.required_verifiers.len() > max_verifiers_per_set
            || self.optional_verifiers.len() > max_verifiers_per_set
        {
            return Err(MessagingError::InvalidPathwayConfig {
                reason: format!("verifier set larger than {}", max_verifiers_per_set),
            });
        }
        if !self.optional_verifiers.is_empty() && self.optional_threshold == 0 {
            return Err(invalid("optional verifiers configured with zero threshold"));
        }
        if self
            .required_verifiers
            .intersection(&self.optional_verifiers)
            .next()
            .is_some()
        {
            return Err(invalid("verifier listed as both required and optional"));
        }
        if self.max_message_bytes == 0 {
            return Err(invalid("max message size must be positive"));
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> MessagingError {
    MessagingError::InvalidPathwayConfig {
        reason: reason.to_string(),
    }
}

/// A configured pathway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pathway {
    /// Pathway key.
    pub key: PathKey,
    /// Current policy.
    pub config: PathwayConfig,
    /// Active library version.
    pub library: LibraryVersion,
    /// Starts at 1, bumped by each update.
    pub revision: u32,
    /// Config superseded by the last update.
    pub previous: Option<PathwayConfig>,
}

/// Pathway store.
pub struct PathRegistry {
    pathways: RwLock<HashMap<PathKey, Pathway>>,
    max_verifiers_per_set: usize,
}

impl PathRegistry {
    /// Create an empty registry.
    pub fn new(max_verifiers_per_set: usize) -> Self {
        Self {
            pathways: RwLock::new(HashMap::new()),
            max_verifiers_per_set,
        }
    }

    /// Create a pathway. Fails if one exists for the key.
    pub fn create(
        &self,
        key: PathKey,
        config: PathwayConfig,
        library: LibraryVersion,
    ) -> MessagingResult<Pathway> {
        config.validate(self.max_verifiers_per_set)?;

        let mut pathways = self.pathways.write();
        if pathways.contains_key(&key) {
            return Err(MessagingError::PathwayExists {
                app: key.app,
                remote_chain: key.remote_chain,
            });
        }
        let pathway = Pathway {
            key,
            config,
            library,
            revision: 1,
            previous: None,
        };
        pathways.insert(key, pathway.clone());
        Ok(pathway)
    }

    /// Replace the policy of an existing pathway.
    pub fn update(&self, key: PathKey, config: PathwayConfig) -> MessagingResult<Pathway> {
        config.validate(self.max_verifiers_per_set)?;

        let mut pathways = self.pathways.write();
        let pathway = pathways.get_mut(&key).ok_or_else(|| not_configured(&key))?;
        let superseded = std::mem::replace(&mut pathway.config, config);
        pathway.previous = Some(superseded);
        pathway.revision = pathway.revision.saturating_add(1);
        Ok(pathway.clone())
    }

    /// Set the active library version.
    pub fn set_library(&self, key: &PathKey, library: LibraryVersion) -> MessagingResult<()> {
        let mut pathways = self.pathways.write();
        let pathway = pathways.get_mut(key).ok_or_else(|| not_configured(key))?;
        pathway.library = library;
        Ok(())
    }

    /// Look up a pathway.
    pub fn get(&self, key: &PathKey) -> MessagingResult<Pathway> {
        self.pathways
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| not_configured(key))
    }

    /// Whether a pathway exists.
    pub fn contains(&self, key: &PathKey) -> bool {
        self.pathways.read().contains_key(key)
    }

    /// All pathways, ordered by key.
    pub fn all(&self) -> Vec<Pathway> {
        let mut all: Vec<Pathway> = self.pathways.read().values().cloned().collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        all
    }

    /// Replace the store contents.
    pub fn restore(&self, pathways: Vec<Pathway>) {
        let mut map = self.pathways.write();
        map.clear();
        map.extend(pathways.into_iter().map(|p| (p.key, p)));
    }
}

fn not_configured(key: &PathKey) -> MessagingError {
    MessagingError::PathNotConfigured {
        app: key.app,
        remote_chain: key.remote_chain,
    }
}
