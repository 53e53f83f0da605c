//! Token-only persistence.
//!
//! Older integrations persisted nothing but the provider token. `TokenStore`
//! keeps that layout (a JSON string under a single key) so such
//! applications can keep their stored logins. New code should prefer
//! `AuthenticationClient::resume_session`.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::broker::Logins;
use crate::error::StorageError;
use crate::events::{AuthEvent, EventReceiver};
use crate::storage::Storage;

/// Default key the token is stored under
pub const TOKEN_KEY: &str = "authToken";

#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn Storage>,
    key: String,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_key(storage, TOKEN_KEY)
    }

    pub fn with_key(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// Stored token, or `None` for anything that is not a non-empty JSON
    /// string
    pub fn read(&self) -> Option<String> {
        let raw = match self.storage.get_item(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to read stored token");
                return None;
            }
        };
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(serde_json::Value::String(token)) if !token.is_empty() => Some(token),
            Ok(_) => None,
            Err(e) => {
                debug!(key = %self.key, error = %e, "Ignoring malformed stored token");
                None
            }
        }
    }

    /// Store `token`, or remove the entry when it is absent or empty
    pub fn write(&self, token: Option<&str>) {
        let result = match token.filter(|t| !t.is_empty()) {
            Some(token) => serde_json::to_string(token)
                .map_err(|e| StorageError::Backend(e.to_string()))
                .and_then(|json| self.storage.set_item(&self.key, &json)),
            None => self.storage.remove_item(&self.key),
        };
        if let Err(e) = result {
            warn!(key = %self.key, error = %e, "Failed to save token");
        }
    }

    /// Mirror the client's token into storage until the client goes away
    pub(crate) async fn persist_events(
        self,
        mut rx: EventReceiver,
        logins: Logins,
        provider_endpoint: String,
    ) {
        while let Some(event) = rx.recv().await {
            match event {
                AuthEvent::Authenticated => {
                    self.write(logins.get(&provider_endpoint).as_deref());
                }
                AuthEvent::Deauthenticated(_) => self.write(None),
                AuthEvent::Ready => {}
            }
        }
    }
}
