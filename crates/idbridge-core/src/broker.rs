//! The federated-identity credential broker capability.
//!
//! The broker exchanges a provider token for temporary cloud credentials.
//! Its wire protocol is out of scope here; the client only drives it
//! through `CredentialBroker`.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use futures::future::BoxFuture;

use crate::credentials::CloudCredentials;
use crate::error::CredentialError;

/// Shared login map: provider endpoint -> token presented for that provider.
///
/// Clone is cheap and every clone sees the same map. The client writes
/// tokens into it directly; the broker reads it whenever it fetches.
#[derive(Debug, Clone, Default)]
pub struct Logins {
    entries: Arc<RwLock<BTreeMap<String, Option<String>>>>,
}

impl Logins {
    /// Single-entry map for `endpoint`
    pub fn new(endpoint: &str, token: Option<String>) -> Self {
        let logins = Self::default();
        logins.set(endpoint, token);
        logins
    }

    /// Token for `endpoint`; `None` for both a null entry and a missing one
    pub fn get(&self, endpoint: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(endpoint).cloned().flatten()
    }

    pub fn set(&self, endpoint: &str, token: Option<String>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(endpoint.to_string(), token);
    }

    /// Endpoints that currently carry a token
    pub fn active(&self) -> BTreeMap<String, String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|t| (k.clone(), t.clone())))
            .collect()
    }
}

/// Parameters a broker handle is created with.
#[derive(Debug, Clone)]
pub struct BrokerParams {
    pub identity_pool_id: String,
    pub role_arn: String,
    pub logins: Logins,
}

/// Credential broker handle.
///
/// `get` may answer from the broker's cache; `refresh` always goes back to
/// the identity service. Both resolve once the broker's credential fields
/// have been updated (or the attempt failed).
pub trait CredentialBroker: Send + Sync + 'static {
    fn new(params: BrokerParams) -> Self
    where
        Self: Sized;

    fn get(&self) -> BoxFuture<'_, Result<(), CredentialError>>;

    fn refresh(&self) -> BoxFuture<'_, Result<(), CredentialError>>;

    /// Forget the identity id cached for the previous login
    fn clear_cached_id(&self);

    /// Snapshot of the broker's current credential fields
    fn credentials(&self) -> CloudCredentials;

    /// Overwrite the broker's credential fields, e.g. from a cached session
    fn set_credentials(&self, credentials: CloudCredentials);

    fn identity_id(&self) -> Option<String>;
}
