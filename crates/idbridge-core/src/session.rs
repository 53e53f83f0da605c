//! Persisted session: last known token, cloud credentials, user profile
//! and free-form application data.
//!
//! Every mutation rewrites the whole record to storage before returning.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::credentials::CloudCredentials;
use crate::error::StorageError;
use crate::storage::Storage;

/// Storage key the session record is written under
pub const SESSION_KEY: &str = "session";

/// Free-form JSON object used for `profile` and `store`
pub type JsonMap = Map<String, Value>;

/// Wire layout of a persisted session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub auth_token: Option<String>,
    #[serde(default)]
    pub profile: JsonMap,
    #[serde(default)]
    pub store: JsonMap,
    #[serde(default)]
    pub aws: CloudCredentials,
}

impl SessionRecord {
    /// Parse a persisted record, tolerating wrong shapes.
    ///
    /// Only invalid JSON is an error. Valid JSON that is not an object
    /// yields an empty record, and each field that has the wrong type
    /// falls back to its empty value on its own.
    pub fn parse_lenient(raw: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(raw)?;
        let Value::Object(mut fields) = value else {
            return Ok(Self::default());
        };

        let auth_token = match fields.remove("authToken") {
            Some(Value::String(token)) if !token.is_empty() => Some(token),
            _ => None,
        };
        let profile = match fields.remove("profile") {
            Some(Value::Object(map)) => map,
            _ => JsonMap::new(),
        };
        let store = match fields.remove("store") {
            Some(Value::Object(map)) => map,
            _ => JsonMap::new(),
        };
        let aws = fields
            .remove("aws")
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        Ok(Self {
            auth_token,
            profile,
            store,
            aws,
        })
    }
}

struct SessionState {
    auth_token: Option<String>,
    profile: Arc<JsonMap>,
    store: JsonMap,
    aws: CloudCredentials,
}

impl SessionState {
    fn to_record(&self) -> SessionRecord {
        SessionRecord {
            auth_token: self.auth_token.clone(),
            profile: (*self.profile).clone(),
            store: self.store.clone(),
            aws: self.aws.clone(),
        }
    }
}

impl From<SessionRecord> for SessionState {
    fn from(record: SessionRecord) -> Self {
        Self {
            auth_token: record.auth_token,
            profile: Arc::new(record.profile),
            store: record.store,
            aws: record.aws,
        }
    }
}

/// Session value object, shareable between an `AuthenticationClient` and
/// the rest of the application through `Arc<Session>`.
pub struct Session {
    storage: Arc<dyn Storage>,
    key: String,
    state: Mutex<SessionState>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Session")
            .field("key", &self.key)
            .field("has_auth_token", &state.auth_token.is_some())
            .field("store_keys", &state.store.len())
            .finish()
    }
}

impl Session {
    /// Empty session persisted under the default key. Nothing is written
    /// until the first mutation.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_key(storage, SESSION_KEY)
    }

    pub fn with_key(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        Self::from_record(storage, key, SessionRecord::default())
    }

    pub fn from_record(
        storage: Arc<dyn Storage>,
        key: impl Into<String>,
        record: SessionRecord,
    ) -> Self {
        Self {
            storage,
            key: key.into(),
            state: Mutex::new(record.into()),
        }
    }

    /// Restore the session persisted under the default key.
    ///
    /// Never fails: missing, unreadable or corrupt data gives an empty
    /// session.
    pub fn from_storage(storage: Arc<dyn Storage>) -> Self {
        Self::from_storage_with_key(storage, SESSION_KEY)
    }

    pub fn from_storage_with_key(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        let key = key.into();
        let record = match storage.get_item(&key) {
            Ok(Some(raw)) => match SessionRecord::parse_lenient(&raw) {
                Ok(record) => record,
                Err(e) => {
                    warn!(key = %key, error = %e, "Discarding corrupt persisted session");
                    SessionRecord::default()
                }
            },
            Ok(None) => {
                debug!(key = %key, "No persisted session found");
                SessionRecord::default()
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read persisted session");
                SessionRecord::default()
            }
        };
        Self::from_record(storage, key, record)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn auth_token(&self) -> Option<String> {
        self.lock().auth_token.clone()
    }

    pub fn set_auth_token(&self, auth_token: Option<String>) -> Result<(), StorageError> {
        self.update(|state| state.auth_token = auth_token)
    }

    pub fn aws(&self) -> CloudCredentials {
        self.lock().aws.clone()
    }

    pub fn set_aws(&self, aws: CloudCredentials) -> Result<(), StorageError> {
        self.update(|state| state.aws = aws)
    }

    /// Read-only profile. Replacing it goes through `set_profile`.
    pub fn profile(&self) -> Arc<JsonMap> {
        Arc::clone(&self.lock().profile)
    }

    /// Replace the whole profile; the previous one is never merged into.
    pub fn set_profile(&self, profile: JsonMap) -> Result<(), StorageError> {
        let profile = Arc::new(profile);
        self.update(|state| state.profile = profile)
    }

    /// Deep copy of the store. Mutating it does not touch the session.
    pub fn store(&self) -> JsonMap {
        self.lock().store.clone()
    }

    /// Make the store key-for-key identical to `store`: keys missing from
    /// it are removed, the rest are added or overwritten.
    pub fn set_store(&self, store: JsonMap) -> Result<(), StorageError> {
        self.update(|state| {
            state.store.retain(|k, _| store.contains_key(k));
            for (k, v) in store {
                state.store.insert(k, v);
            }
        })
    }

    pub fn get_item(&self, key: &str) -> Option<Value> {
        self.lock().store.get(key).cloned()
    }

    pub fn set_item(&self, key: impl Into<String>, value: Value) -> Result<(), StorageError> {
        let key = key.into();
        self.update(|state| {
            state.store.insert(key, value);
        })
    }

    /// Reset every field to its empty value and write the record once.
    /// The in-memory reset always happens, even when the write fails.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.update(|state| *state = SessionRecord::default().into())
    }

    /// Snapshot of the four persisted fields
    pub fn to_record(&self) -> SessionRecord {
        self.lock().to_record()
    }

    /// Write the current state to storage
    pub fn save(&self) -> Result<(), StorageError> {
        let state = self.lock();
        self.persist(&state)
    }

    fn update<F>(&self, apply: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut SessionState),
    {
        let mut state = self.lock();
        apply(&mut state);
        self.persist(&state)
    }

    fn persist(&self, state: &SessionState) -> Result<(), StorageError> {
        let contents = serde_json::to_string(&state.to_record())
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        self.storage.set_item(&self.key, &contents)?;
        debug!(key = %self.key, bytes = contents.len(), "Session persisted");
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// Tests
// ============================================================================
