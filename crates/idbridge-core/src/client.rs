//! Authentication state machine.
//!
//! `AuthenticationClient` owns a credential broker handle, drives it on
//! `init`/`open`/`close`, mirrors the outcome into an optional `Session`
//! and notifies listeners through `AuthEvent`s.
//!
//! States: uninitialized until `init()`, then authenticated or
//! deauthenticated, cycling between the two any number of times.
//! `initialized` and `ready` are one-way latches.
//!
//! Overlapping operations are not fenced. If `open` is called again
//! before the previous broker call has answered, whichever answer lands
//! last decides the final state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::broker::{BrokerParams, CredentialBroker, Logins};
use crate::config::ClientConfig;
use crate::credentials::CloudCredentials;
use crate::error::{ConfigError, CredentialError};
use crate::events::{AuthEvent, EventHub, EventReceiver};
use crate::sdk;
use crate::session::Session;
use crate::storage::Storage;
use crate::token_store::TokenStore;

/// Client handle. Clone is cheap and every clone drives the same state.
pub struct AuthenticationClient<B: CredentialBroker> {
    inner: Arc<ClientInner<B>>,
}

impl<B: CredentialBroker> Clone for AuthenticationClient<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ClientInner<B> {
    provider_endpoint: String,
    region: String,
    logins: Logins,
    credentials: Arc<B>,
    session: Option<Arc<Session>>,
    emit_ready_event: bool,
    confirmed_auth_events_only: bool,
    initialized: AtomicBool,
    ready: AtomicBool,
    runtime: Handle,
    events: EventHub,
}

impl<B: CredentialBroker> AuthenticationClient<B> {
    /// Create a client and its broker handle.
    ///
    /// Must be called inside a Tokio runtime. Events are delivered from a
    /// separate task, so a listener subscribed right after `init`/`open`/
    /// `close` only sees the resulting event on a current-thread runtime
    /// (`#[tokio::main(flavor = "current_thread")]` or a `LocalSet`). On a
    /// multi-thread runtime, subscribe before starting operations. Unless
    /// `configure_sdk_defaults` is off, this also installs the broker handle
    /// and the pool's region as process-wide SDK defaults.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;

        let existing_token = config.existing_auth_token.filter(|t| !t.is_empty());
        let logins = Logins::new(&config.provider_endpoint, existing_token);
        let region = sdk::region_from_pool_id(&config.identity_pool_id).to_string();
        let credentials = Arc::new(B::new(BrokerParams {
            identity_pool_id: config.identity_pool_id,
            role_arn: config.auth_role_arn,
            logins: logins.clone(),
        }));

        if config.configure_sdk_defaults {
            let handle: Arc<dyn CredentialBroker> = credentials.clone();
            sdk::install(region.clone(), handle);
        }

        debug!(
            provider = %config.provider_endpoint,
            region = %region,
            has_token = logins.get(&config.provider_endpoint).is_some(),
            has_session = config.session.is_some(),
            "AuthenticationClient created"
        );

        let events = EventHub::new(&runtime);
        Ok(Self {
            inner: Arc::new(ClientInner {
                provider_endpoint: config.provider_endpoint,
                region,
                logins,
                credentials,
                session: config.session,
                emit_ready_event: config.emit_ready_event,
                confirmed_auth_events_only: config.confirmed_auth_events_only,
                initialized: AtomicBool::new(false),
                ready: AtomicBool::new(false),
                runtime,
                events,
            }),
        })
    }

    /// Create a client around the session persisted in `storage`.
    ///
    /// A session already present in `config` is kept. The token defaults to
    /// the session's last known token.
    pub fn resume_session(
        mut config: ClientConfig,
        storage: Arc<dyn Storage>,
    ) -> Result<Self, ConfigError> {
        let session = config
            .session
            .get_or_insert_with(|| Arc::new(Session::from_storage(storage)));
        if config.existing_auth_token.is_none() {
            config.existing_auth_token = session.auth_token();
        }
        Self::new(config)
    }

    /// Create a client whose token alone is persisted in `store`.
    ///
    /// The stored token is used unless `config` already carries one. The
    /// token is written back after every authentication and removed after
    /// every deauthentication.
    pub fn with_token_store(
        mut config: ClientConfig,
        store: TokenStore,
    ) -> Result<Self, ConfigError> {
        if config.existing_auth_token.is_none() {
            config.existing_auth_token = store.read();
        }
        let client = Self::new(config)?;
        let rx = client.subscribe();
        client.inner.runtime.spawn(store.persist_events(
            rx,
            client.inner.logins.clone(),
            client.inner.provider_endpoint.clone(),
        ));
        Ok(client)
    }

    /// Register a listener. Events emitted before this call but not yet
    /// delivered are still received. On a multi-thread runtime the
    /// dispatcher may already have delivered them, so subscribe before
    /// calling `init`/`open`/`close` there.
    pub fn subscribe(&self) -> EventReceiver {
        self.inner.events.subscribe()
    }

    /// Write `token` into the broker's login map. Does not re-authenticate.
    /// An empty token is stored as no token.
    pub fn set_auth_token(&self, token: Option<String>) {
        self.inner.set_auth_token(token);
    }

    pub fn get_auth_token(&self) -> Option<String> {
        self.inner.auth_token()
    }

    /// Bootstrap the state machine. Meant to be called once.
    ///
    /// Without a token this deauthenticates immediately. With a token and a
    /// session holding complete cached credentials, the client declares
    /// itself authenticated from the cache before asking the broker. Either
    /// way the broker is then asked for credentials and its answer decides.
    pub fn init(&self) {
        let inner = &self.inner;
        if inner.auth_token().is_none() {
            debug!("init without token");
            inner.initialized.store(true, Ordering::SeqCst);
            inner.on_deauth(None);
            return;
        }

        if let Some(session) = &inner.session {
            let cached = session.aws();
            if cached.is_valid() {
                debug!("Resuming cached session credentials");
                inner.credentials.set_credentials(CloudCredentials {
                    updated_at: None,
                    ..cached
                });
                inner.on_auth();
            }
        }

        let task = Arc::clone(inner);
        inner.runtime.spawn(async move {
            let result = task.credentials.get().await;
            task.initialized.store(true, Ordering::SeqCst);
            task.handle_result(result);
        });
    }

    /// Authenticate, or re-authenticate, with `token`
    pub fn open(&self, token: impl Into<String>) {
        self.inner.set_auth_token(Some(token.into()));
        self.spawn_refresh();
    }

    /// Drop the token and the broker's cached identity, then refresh
    pub fn close(&self) {
        self.inner.set_auth_token(None);
        self.inner.credentials.clear_cached_id();
        self.spawn_refresh();
    }

    /// True when a token is set and the broker holds complete credentials.
    /// Never calls the broker.
    pub fn is_authenticated(&self) -> bool {
        self.inner.auth_token().is_some() && self.inner.credentials.credentials().is_valid()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    pub fn provider_endpoint(&self) -> &str {
        &self.inner.provider_endpoint
    }

    /// Region parsed from the identity pool id
    pub fn region(&self) -> &str {
        &self.inner.region
    }

    /// Broker handle, for wiring into cloud SDK clients explicitly
    pub fn credentials(&self) -> Arc<B> {
        Arc::clone(&self.inner.credentials)
    }

    pub fn identity_id(&self) -> Option<String> {
        self.inner.credentials.identity_id()
    }

    pub fn session(&self) -> Option<Arc<Session>> {
        self.inner.session.clone()
    }

    fn spawn_refresh(&self) {
        let task = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            let result = task.credentials.refresh().await;
            task.handle_result(result);
        });
    }
}

impl<B: CredentialBroker> ClientInner<B> {
    /// An empty string in the login map reads as no token
    fn auth_token(&self) -> Option<String> {
        self.logins
            .get(&self.provider_endpoint)
            .filter(|t| !t.is_empty())
    }

    fn set_auth_token(&self, token: Option<String>) {
        let token = token.filter(|t| !t.is_empty());
        self.logins.set(&self.provider_endpoint, token);
    }

    /// Route a broker answer to a transition. A successful answer without
    /// a token (e.g. after `close`) is a deauthentication with no error.
    fn handle_result(&self, result: Result<(), CredentialError>) {
        match result {
            Err(e) => self.on_deauth(Some(e)),
            Ok(()) if self.auth_token().is_none() => self.on_deauth(None),
            Ok(()) => self.on_auth(),
        }
    }

    fn on_auth(&self) {
        if let Some(session) = &self.session {
            self.persist_tokens_to_session(session);
        }
        self.on_ready();
        if self.may_emit() {
            info!(provider = %self.provider_endpoint, "Authenticated");
            self.events.emit(AuthEvent::Authenticated);
        }
    }

    fn on_deauth(&self, error: Option<CredentialError>) {
        if let Some(session) = &self.session {
            if let Err(e) = session.clear() {
                warn!(error = %e, "Failed to clear session");
            }
        }
        self.on_ready();
        if self.may_emit() {
            match &error {
                Some(e) => info!(provider = %self.provider_endpoint, error = %e, "Deauthenticated"),
                None => info!(provider = %self.provider_endpoint, "Deauthenticated"),
            }
            self.events.emit(AuthEvent::Deauthenticated(error));
        }
    }

    fn on_ready(&self) {
        if self.ready.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Client ready");
        if self.emit_ready_event {
            self.events.emit(AuthEvent::Ready);
        }
    }

    fn may_emit(&self) -> bool {
        self.initialized.load(Ordering::SeqCst) || !self.confirmed_auth_events_only
    }

    fn persist_tokens_to_session(&self, session: &Session) {
        let current = self.credentials.credentials();
        let aws = if current.is_valid() {
            current.stamped(Utc::now().timestamp_millis())
        } else {
            CloudCredentials::default()
        };
        let result = session
            .set_auth_token(self.auth_token())
            .and_then(|_| session.set_aws(aws));
        if let Err(e) = result {
            warn!(error = %e, "Failed to save session");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
