//! Mapping external identities onto local user accounts.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use log::*;

use super::provider::ExternalIdentity;

/// Which identity field a provider's accounts are keyed by locally.
///
/// Providers differ in which field is stable: GitHub hands out an opaque node id,
/// Google logins are keyed by email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKey {
    /// `"<provider_id>:<subject_id>"`.
    Subject,
    /// The email address. Refused when the provider explicitly reports it unverified.
    Email,
}

impl IdentityKey {
    /// Derive the directory key for `identity`, if this policy can produce one.
    pub fn key_for(&self, identity: &ExternalIdentity) -> Option<String> {
        match self {
            IdentityKey::Subject => Some(format!("{}:{}", identity.provider_id, identity.subject_id)),
            IdentityKey::Email => match (&identity.email, identity.verified_email) {
                (Some(_), Some(false)) => None,
                (Some(email), _) if !email.is_empty() => Some(email.to_lowercase()),
                _ => None,
            },
        }
    }
}

/// Read-only view of the local user table, owned by the surrounding system.
#[async_trait]
pub trait LocalUserDirectory: Send + Sync {
    /// Look up the local user id stored under `key`.
    async fn lookup(&self, key: &str) -> Option<String>;
}

/// In-memory directory for demos and tests.
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: DashMap<String, String>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `user_id` under `key`. Keys containing `@` match case-insensitively.
    pub fn insert(&self, key: impl Into<String>, user_id: impl Into<String>) {
        self.users.insert(normalize_key(key.into()), user_id.into());
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for MemoryUserDirectory
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let directory = Self::new();
        for (key, user_id) in iter {
            directory.insert(key, user_id);
        }
        directory
    }
}

#[async_trait]
impl LocalUserDirectory for MemoryUserDirectory {
    async fn lookup(&self, key: &str) -> Option<String> {
        self.users
            .get(&normalize_key(key.to_string()))
            .map(|entry| entry.value().clone())
    }
}

// Applied on both insert and lookup so a key always finds what was stored under it.
fn normalize_key(key: String) -> String {
    if key.contains('@') {
        key.to_lowercase()
    } else {
        key
    }
}

/// Outcome of resolving an external identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// An existing local account.
    Found(String),
    /// No local account yet. Provisioning is up to the caller; `key` is `None` when the
    /// identity carried nothing usable under the provider's key policy.
    NotFound { key: Option<String> },
}

impl Resolution {
    pub fn found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Resolution::Found(user_id) => Some(user_id),
            Resolution::NotFound { .. } => None,
        }
    }
}

/// Maps verified external identities to local user ids. Pure lookup, never writes.
#[derive(Clone)]
pub struct IdentityResolver {
    directory: Arc<dyn LocalUserDirectory>,
}

impl IdentityResolver {
    pub fn new(directory: Arc<dyn LocalUserDirectory>) -> Self {
        Self { directory }
    }

    /// Resolve `identity` using the provider's key policy.
    pub async fn resolve(&self, identity: &ExternalIdentity, policy: IdentityKey) -> Resolution {
        let Some(key) = policy.key_for(identity) else {
            debug!(
                "No {:?} key available for identity from provider {}",
                policy, identity.provider_id
            );
            return Resolution::NotFound { key: None };
        };

        match self.directory.lookup(&key).await {
            Some(user_id) => Resolution::Found(user_id),
            None => Resolution::NotFound { key: Some(key) },
        }
    }
}
