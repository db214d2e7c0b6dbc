//! # Library Registry
//!
//! Registered message-library versions, per-chain defaults, and scheduled
//! per-pathway migrations.
//!
//! A migration `(old → new, cutover, expiry)` resolves as:
//!
//! ```text
//!        at < cutover      cutover ≤ at < expiry      at ≥ expiry
//! active     old                  new                  new (finalized)
//! valid      old                old + new                  new
//! ```
//!
//! Finalization is lazy: the first resolution at or after `expiry` writes
//! the new version into the pathway and drops the record.

use super::errors::{ChainId, MessagingError, MessagingResult};
use super::pathway::PathRegistry;
use super::value_objects::{LibraryVersion, PathKey};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::info;

/// A scheduled library switch on one pathway.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryMigration {
    /// Pathway being migrated.
    pub path: PathKey,
    /// Version active before cutover.
    pub old_version: LibraryVersion,
    /// Version active from cutover.
    pub new_version: LibraryVersion,
    /// First instant the new version is active.
    pub cutover: u64,
    /// First instant the old version is no longer accepted.
    pub expiry: u64,
}

impl LibraryMigration {
    fn active_at(&self, at: u64) -> LibraryVersion {
        if at < self.cutover {
            self.old_version
        } else {
            self.new_version
        }
    }

    fn in_grace_period(&self, at: u64) -> bool {
        self.cutover <= at && at < self.expiry
    }
}

/// Library versions and migrations.
#[derive(Default)]
pub struct LibraryRegistry {
    registered: RwLock<BTreeSet<LibraryVersion>>,
    defaults: RwLock<HashMap<ChainId, LibraryVersion>>,
    migrations: RwLock<HashMap<PathKey, LibraryMigration>>,
}

impl LibraryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a version.
    pub fn register(&self, version: LibraryVersion) -> MessagingResult<()> {
        if !self.registered.write().insert(version) {
            return Err(MessagingError::LibraryAlreadyRegistered {
                version: version.to_string(),
            });
        }
        Ok(())
    }

    /// Whether a version is registered.
    pub fn is_registered(&self, version: &LibraryVersion) -> bool {
        self.registered.read().contains(version)
    }

    /// Set the version new pathways towards `remote_chain` start with.
    pub fn set_default(&self, remote_chain: ChainId, version: LibraryVersion) -> MessagingResult<()> {
        self.ensure_registered(&version)?;
        self.defaults.write().insert(remote_chain, version);
        Ok(())
    }

    /// Default version for `remote_chain`.
    pub fn default_for(&self, remote_chain: ChainId) -> Option<LibraryVersion> {
        self.defaults.read().get(&remote_chain).copied()
    }

    fn ensure_registered(&self, version: &LibraryVersion) -> MessagingResult<()> {
        if !self.is_registered(version) {
            return Err(MessagingError::UnknownLibrary {
                version: version.to_string(),
            });
        }
        Ok(())
    }

    /// Schedule a switch to `new_version` on `key`.
    ///
    /// A migration whose expiry has passed is finalized first; one still in
    /// progress blocks scheduling.
    pub fn schedule_migration(
        &self,
        paths: &PathRegistry,
        key: PathKey,
        new_version: LibraryVersion,
        cutover: u64,
        expiry: u64,
        now: u64,
    ) -> MessagingResult<LibraryMigration> {
        self.ensure_registered(&new_version)?;
        if cutover > expiry {
            return Err(MessagingError::InvalidMigrationWindow {
                reason: format!("cutover {} after expiry {}", cutover, expiry),
            });
        }

        let mut migrations = self.migrations.write();
        Self::finalize_if_expired(&mut migrations, paths, &key, now)?;
        if migrations.contains_key(&key) {
            return Err(MessagingError::InvalidMigrationWindow {
                reason: "a migration is already scheduled for this pathway".to_string(),
            });
        }

        let current = paths.get(&key)?.library;
        if current == new_version {
            return Err(MessagingError::InvalidMigrationWindow {
                reason: format!("pathway already on {}", new_version),
            });
        }

        let migration = LibraryMigration {
            path: key,
            old_version: current,
            new_version,
            cutover,
            expiry,
        };
        migrations.insert(key, migration);
        Ok(migration)
    }

    fn finalize_if_expired(
        migrations: &mut HashMap<PathKey, LibraryMigration>,
        paths: &PathRegistry,
        key: &PathKey,
        at: u64,
    ) -> MessagingResult<()> {
        let expired = matches!(migrations.get(key), Some(m) if at >= m.expiry);
        if expired {
            if let Some(migration) = migrations.remove(key) {
                paths.set_library(key, migration.new_version)?;
                info!(
                    "[oc-messaging] Library migration finalized: chain {} now on {}",
                    key.remote_chain, migration.new_version
                );
            }
        }
        Ok(())
    }

    /// Version active on `key` at `at`, finalizing an expired migration.
    pub fn resolve_active(
        &self,
        paths: &PathRegistry,
        key: &PathKey,
        at: u64,
    ) -> MessagingResult<LibraryVersion> {
        let mut migrations = self.migrations.write();
        Self::finalize_if_expired(&mut migrations, paths, key, at)?;
        match migrations.get(key) {
            Some(migration) => Ok(migration.active_at(at)),
            None => Ok(paths.get(key)?.library),
        }
    }

    /// Whether `version` may be used on `key` at `at`.
    pub fn is_valid(
        &self,
        paths: &PathRegistry,
        key: &PathKey,
        version: &LibraryVersion,
        at: u64,
    ) -> MessagingResult<bool> {
        let active = self.resolve_active(paths, key, at)?;
        if active == *version {
            return Ok(true);
        }
        let migrations = self.migrations.read();
        Ok(matches!(
            migrations.get(key),
            Some(m) if m.in_grace_period(at) && m.old_version == *version
        ))
    }

    /// Migration scheduled on `key`, if any.
    pub fn pending_migration(&self, key: &PathKey) -> Option<LibraryMigration> {
        self.migrations.read().get(key).copied()
    }

    /// Export versions, defaults and migrations.
    pub fn export(
        &self,
    ) -> (
        Vec<LibraryVersion>,
        Vec<(ChainId, LibraryVersion)>,
        Vec<LibraryMigration>,
    ) {
        let registered = self.registered.read().iter().copied().collect();
        let mut defaults: Vec<_> = self.defaults.read().iter().map(|(c, v)| (*c, *v)).collect();
        defaults.sort();
        let mut migrations: Vec<_> = self.migrations.read().values().copied().collect();
        migrations.sort_by(|a, b| a.path.cmp(&b.path));
        (registered, defaults, migrations)
    }

    /// Replace versions, defaults and migrations.
    pub fn restore(
        &self,
        registered: Vec<LibraryVersion>,
        defaults: Vec<(ChainId, LibraryVersion)>,
        migrations: Vec<LibraryMigration>,
    ) {
        *self.registered.write() = registered.into_iter().collect();
        *self.defaults.write() = defaults.into_iter().collect();
        *self.migrations.write() = migrations.into_iter().map(|m| (m.path, m)).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pathway::PathwayConfig;
    use crate::domain::value_objects::VerifierId;

    const V1: LibraryVersion = LibraryVersion::new(1, 0, 2);
    const V2: LibraryVersion = LibraryVersion::new(2, 0, 2);

    fn key() -> PathKey {
        PathKey::new([0xAA; 32], 30101)
    }

    fn setup() -> (LibraryRegistry, PathRegistry) {
        let libraries = LibraryRegistry::new();
        libraries.register(V1).unwrap();
        libraries.register(V2).unwrap();
        let paths = PathRegistry::new(32);
        paths
            .create(key(), PathwayConfig::with_required([VerifierId([1; 32])]), V1)
            .unwrap();
        (libraries, paths)
    }

    #[test]
    fn test_register_twice() {
        let libraries = LibraryRegistry::new();
        libraries.register(V1).unwrap();
        assert!(matches!(
            libraries.register(V1),
            Err(MessagingError::LibraryAlreadyRegistered { .. })
        ));
    }

    #[test]
    fn test_default_requires_registration() {
        let libraries = LibraryRegistry::new();
        assert!(matches!(
            libraries.set_default(30101, V1),
            Err(MessagingError::UnknownLibrary { .. })
        ));
        libraries.register(V1).unwrap();
        libraries.set_default(30101, V1).unwrap();
        assert_eq!(libraries.default_for(30101), Some(V1));
        assert_eq!(libraries.default_for(1), None);
    }

    #[test]
    fn test_no_migration_uses_pathway_library() {
        let (libraries, paths) = setup();
        assert_eq!(libraries.resolve_active(&paths, &key(), 0).unwrap(), V1);
        assert!(libraries.is_valid(&paths, &key(), &V1, 0).unwrap());
        assert!(!libraries.is_valid(&paths, &key(), &V2, 0).unwrap());
    }

    #[test]
    fn test_migration_window() {
        let (libraries, paths) = setup();
        libraries
            .schedule_migration(&paths, key(), V2, 100, 200, 0)
            .unwrap();

        assert_eq!(libraries.resolve_active(&paths, &key(), 99).unwrap(), V1);
        assert!(!libraries.is_valid(&paths, &key(), &V2, 99).unwrap());

        assert_eq!(libraries.resolve_active(&paths, &key(), 100).unwrap(), V2);
        assert!(libraries.is_valid(&paths, &key(), &V1, 150).unwrap());
        assert!(libraries.is_valid(&paths, &key(), &V2, 150).unwrap());
        // Pathway record unchanged until expiry.
        assert_eq!(paths.get(&key()).unwrap().library, V1);

        assert_eq!(libraries.resolve_active(&paths, &key(), 200).unwrap(), V2);
        assert!(!libraries.is_valid(&paths, &key(), &V1, 200).unwrap());
        assert_eq!(paths.get(&key()).unwrap().library, V2);
        assert!(libraries.pending_migration(&key()).is_none());
    }

    #[test]
    fn test_schedule_rejects_bad_window() {
        let (libraries, paths) = setup();
        assert!(matches!(
            libraries.schedule_migration(&paths, key(), V2, 200, 100, 0),
            Err(MessagingError::InvalidMigrationWindow { .. })
        ));
    }

    #[test]
    fn test_schedule_rejects_unknown_version() {
        let (libraries, paths) = setup();
        let v3 = LibraryVersion::new(3, 0, 2);
        assert!(matches!(
            libraries.schedule_migration(&paths, key(), v3, 1, 2, 0),
            Err(MessagingError::UnknownLibrary { .. })
        ));
    }

    #[test]
    fn test_schedule_rejects_overlapping_migration() {
        let (libraries, paths) = setup();
        libraries
            .schedule_migration(&paths, key(), V2, 100, 200, 0)
            .unwrap();
        assert!(libraries
            .schedule_migration(&paths, key(), V2, 300, 400, 150)
            .is_err());
    }

    #[test]
    fn test_schedule_after_expiry_finalizes_first() {
        let (libraries, paths) = setup();
        libraries
            .schedule_migration(&paths, key(), V2, 100, 200, 0)
            .unwrap();
        let back = libraries
            .schedule_migration(&paths, key(), V1, 300, 400, 250)
            .unwrap();
        assert_eq!(back.old_version, V2);
        assert_eq!(paths.get(&key()).unwrap().library, V2);
    }

    #[test]
    fn test_schedule_missing_pathway() {
        let (libraries, paths) = setup();
        let other = PathKey::new([0xBB; 32], 1);
        assert!(matches!(
            libraries.schedule_migration(&paths, other, V2, 1, 2, 0),
            Err(MessagingError::PathNotConfigured { .. })
        ));
    }
}
