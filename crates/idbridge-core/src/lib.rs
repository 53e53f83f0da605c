//! Client-side authentication state for federated identity.
//!
//! An `AuthenticationClient` exchanges a third-party identity token (for
//! example from an OpenID provider) for temporary cloud credentials through
//! a federated-identity broker, and reports the outcome as `AuthEvent`s.
//! An optional `Session` mirrors the token and credentials into durable
//! storage so state survives restarts.
//!
//! ```ignore
//! let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
//! let config = Settings::load()?.apply_env().into_client_config();
//! let client = AuthenticationClient::<MyBroker>::resume_session(config, storage)?;
//! let mut events = client.subscribe();
//! client.init();
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! ```
//!
//! The broker and the storage backend are capabilities supplied by the
//! application (`CredentialBroker`, `Storage`).

pub mod broker;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod events;
pub mod sdk;
pub mod session;
pub mod storage;
pub mod token_store;

#[cfg(test)]
mod test_support;

pub use broker::{BrokerParams, CredentialBroker, Logins};
pub use client::AuthenticationClient;
pub use config::{ClientConfig, Settings};
pub use credentials::CloudCredentials;
pub use error::{ConfigError, CredentialError, StorageError};
pub use events::{AuthEvent, EventReceiver};
pub use session::{JsonMap, Session, SessionRecord};
pub use storage::{MemoryStorage, Storage};
pub use token_store::TokenStore;
