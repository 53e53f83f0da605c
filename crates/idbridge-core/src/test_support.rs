//! Shared fixtures for unit tests: a scripted credential broker and event
//! helpers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};

use crate::broker::{BrokerParams, CredentialBroker};
use crate::config::ClientConfig;
use crate::credentials::CloudCredentials;
use crate::error::CredentialError;
use crate::events::{AuthEvent, EventReceiver};

pub(crate) const POOL_ID: &str = "us-east-1:00000000-test-pool";
pub(crate) const ROLE_ARN: &str = "arn:aws:iam::123456789012:role/test-auth";
pub(crate) const ENDPOINT: &str = "accounts.example.test";

/// Upper bound on waiting for an event that is expected to arrive
const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// Config that leaves the process-wide SDK defaults alone
pub(crate) fn test_config() -> ClientConfig {
    ClientConfig {
        configure_sdk_defaults: false,
        ..ClientConfig::new(POOL_ID, ROLE_ARN, ENDPOINT)
    }
}

pub(crate) fn issued_credentials() -> CloudCredentials {
    CloudCredentials::new("AKIDMOCK", "mock-secret", "mock-session-token")
}

struct Step {
    outcome: Result<(), CredentialError>,
    delay: Duration,
}

/// Broker whose answers are queued up front by the test.
///
/// Unscripted calls succeed after a short delay. A successful call issues
/// `issued_credentials()` when a login token is present and clears the
/// credential fields otherwise; a failed call always clears them.
pub(crate) struct MockBroker {
    pub params: BrokerParams,
    steps: Mutex<VecDeque<Step>>,
    credentials: Mutex<CloudCredentials>,
    identity_id: Mutex<Option<String>>,
    pub get_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub clear_calls: AtomicUsize,
}

impl MockBroker {
    const DEFAULT_DELAY: Duration = Duration::from_millis(5);

    pub fn respond_with(&self, outcome: Result<(), CredentialError>) {
        self.respond_after(outcome, Self::DEFAULT_DELAY);
    }

    pub fn respond_after(&self, outcome: Result<(), CredentialError>, delay: Duration) {
        self.steps
            .lock()
            .unwrap()
            .push_back(Step { outcome, delay });
    }

    pub fn calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst) + self.refresh_calls.load(Ordering::SeqCst)
    }

    fn answer(&self) -> BoxFuture<'_, Result<(), CredentialError>> {
        let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step {
            outcome: Ok(()),
            delay: Self::DEFAULT_DELAY,
        });
        async move {
            tokio::time::sleep(step.delay).await;
            let has_login = !self.params.logins.active().is_empty();
            let issued = match (&step.outcome, has_login) {
                (Ok(()), true) => issued_credentials(),
                _ => CloudCredentials::default(),
            };
            *self.identity_id.lock().unwrap() =
                has_login.then(|| "us-east-1:identity-mock".to_string());
            *self.credentials.lock().unwrap() = issued;
            step.outcome
        }
        .boxed()
    }
}

impl CredentialBroker for MockBroker {
    fn new(params: BrokerParams) -> Self {
        Self {
            params,
            steps: Mutex::new(VecDeque::new()),
            credentials: Mutex::new(CloudCredentials::default()),
            identity_id: Mutex::new(None),
            get_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            clear_calls: AtomicUsize::new(0),
        }
    }

    fn get(&self) -> BoxFuture<'_, Result<(), CredentialError>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.answer()
    }

    fn refresh(&self) -> BoxFuture<'_, Result<(), CredentialError>> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.answer()
    }

    fn clear_cached_id(&self) {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        *self.identity_id.lock().unwrap() = None;
    }

    fn credentials(&self) -> CloudCredentials {
        self.credentials.lock().unwrap().clone()
    }

    fn set_credentials(&self, credentials: CloudCredentials) {
        *self.credentials.lock().unwrap() = credentials;
    }

    fn identity_id(&self) -> Option<String> {
        self.identity_id.lock().unwrap().clone()
    }
}

pub(crate) async fn next_event(rx: &mut EventReceiver) -> AuthEvent {
    tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Fail if any event arrives within `wait`
pub(crate) async fn assert_no_event(rx: &mut EventReceiver, wait: Duration) {
    if let Ok(Some(event)) = tokio::time::timeout(wait, rx.recv()).await {
        panic!("unexpected event: {:?}", event);
    }
}

/// Poll `check` until it holds, yielding to other tasks in between
pub(crate) async fn eventually<F: Fn() -> bool>(check: F) {
    let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met in time"
        );
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
