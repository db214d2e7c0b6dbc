//! # Security Validator
//!
//! Who may do what:
//!
//! - the endpoint owner manages deliverers and libraries;
//! - authorized deliverers commit, execute and retry;
//! - an application's administrator configures its pathways and peers;
//! - a packet is accepted only from the peer registered for its pathway.

use super::errors::{Address, MessagingError, MessagingResult};
use super::value_objects::PathKey;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

/// Role and peer registry.
pub struct SecurityValidator {
    owner: Address,
    deliverers: RwLock<BTreeSet<Address>>,
    admins: RwLock<HashMap<Address, Address>>,
    peers: RwLock<HashMap<PathKey, Address>>,
}

impl SecurityValidator {
    /// Create a validator with no deliverers, applications or peers.
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            deliverers: RwLock::new(BTreeSet::new()),
            admins: RwLock::new(HashMap::new()),
            peers: RwLock::new(HashMap::new()),
        }
    }

    /// Endpoint owner.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Fail unless `caller` is the owner.
    pub fn assert_owner(&self, caller: &Address, action: &'static str) -> MessagingResult<()> {
        if *caller != self.owner {
            return Err(MessagingError::Unauthorized {
                caller: *caller,
                action,
            });
        }
        Ok(())
    }

    /// Grant the deliverer role. Returns `false` if already held.
    pub fn add_deliverer(&self, caller: &Address, deliverer: Address) -> MessagingResult<bool> {
        self.assert_owner(caller, "add deliverer")?;
        Ok(self.deliverers.write().insert(deliverer))
    }

    /// Revoke the deliverer role. Returns `false` if not held.
    pub fn remove_deliverer(&self, caller: &Address, deliverer: &Address) -> MessagingResult<bool> {
        self.assert_owner(caller, "remove deliverer")?;
        Ok(self.deliverers.write().remove(deliverer))
    }

    /// Fail unless `caller` holds the deliverer role.
    pub fn assert_authorized_deliverer(&self, caller: &Address) -> MessagingResult<()> {
        if !self.deliverers.read().contains(caller) {
            return Err(MessagingError::UnauthorizedDeliverer { caller: *caller });
        }
        Ok(())
    }

    /// Register `app` with `admin`. Only the application itself may do this;
    /// re-registering replaces the admin.
    pub fn register_application(
        &self,
        caller: &Address,
        app: Address,
        admin: Address,
    ) -> MessagingResult<()> {
        if *caller != app {
            return Err(MessagingError::Unauthorized {
                caller: *caller,
                action: "register application",
            });
        }
        self.admins.write().insert(app, admin);
        Ok(())
    }

    /// Whether `app` is registered.
    pub fn is_registered(&self, app: &Address) -> bool {
        self.admins.read().contains_key(app)
    }

    /// Fail unless `app` is registered.
    pub fn assert_registered(&self, app: &Address) -> MessagingResult<()> {
        if !self.is_registered(app) {
            return Err(MessagingError::ApplicationNotRegistered { app: *app });
        }
        Ok(())
    }

    /// Fail unless `caller` administers `app`.
    pub fn assert_app_admin(&self, caller: &Address, app: &Address) -> MessagingResult<()> {
        let admins = self.admins.read();
        match admins.get(app) {
            None => Err(MessagingError::ApplicationNotRegistered { app: *app }),
            Some(admin) if admin == caller => Ok(()),
            Some(_) => Err(MessagingError::Unauthorized {
                caller: *caller,
                action: "administer application",
            }),
        }
    }

    /// Register the counterpart application on `key.remote_chain`.
    pub fn set_peer(&self, caller: &Address, key: PathKey, peer: Address) -> MessagingResult<()> {
        self.assert_app_admin(caller, &key.app)?;
        self.peers.write().insert(key, peer);
        Ok(())
    }

    /// Registered peer for `key`.
    pub fn peer_of(&self, key: &PathKey) -> Option<Address> {
        self.peers.read().get(key).copied()
    }

    /// Fail unless `claimed` is the registered peer for `key`.
    pub fn assert_trusted_counterpart(&self, key: &PathKey, claimed: &Address) -> MessagingResult<()> {
        let expected = self.peer_of(key);
        if expected.as_ref() != Some(claimed) {
            return Err(MessagingError::UntrustedPeer {
                remote_chain: key.remote_chain,
                expected,
                claimed: *claimed,
            });
        }
        Ok(())
    }

    /// Export deliverers, application admins and peers.
    pub fn export(
        &self,
    ) -> (
        Vec<Address>,
        Vec<(Address, Address)>,
        Vec<(PathKey, Address)>,
    ) {
        let deliverers = self.deliverers.read().iter().copied().collect();
        let mut admins: Vec<_> = self.admins.read().iter().map(|(a, b)| (*a, *b)).collect();
        admins.sort();
        let mut peers: Vec<_> = self.peers.read().iter().map(|(k, p)| (*k, *p)).collect();
        peers.sort();
        (deliverers, admins, peers)
    }

    /// Replace deliverers, application admins and peers.
    pub fn restore(
        &self,
        deliverers: Vec<Address>,
        admins: Vec<(Address, Address)>,
        peers: Vec<(PathKey, Address)>,
    ) {
        *self.deliverers.write() = deliverers.into_iter().collect();
        *self.admins.write() = admins.into_iter().collect();
        *self.peers.write() = peers.into_iter().collect();
    }
}
