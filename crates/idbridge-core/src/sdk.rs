//! Process-wide cloud SDK defaults.
//!
//! Constructing an `AuthenticationClient` (with `configure_sdk_defaults`
//! set) points the defaults at the client's broker handle and at the region
//! encoded in its identity pool id. This module is the only place that
//! global is touched; applications that wire credentials explicitly can
//! turn it off and use `AuthenticationClient::credentials()` instead.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::broker::CredentialBroker;

/// Separator between the region and the pool-specific part of a pool id
const POOL_ID_SEPARATOR: char = ':';

#[derive(Clone)]
pub struct SdkDefaults {
    pub region: String,
    pub credentials: Arc<dyn CredentialBroker>,
}

impl fmt::Debug for SdkDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SdkDefaults")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

static DEFAULTS: RwLock<Option<SdkDefaults>> = RwLock::new(None);

/// Region prefix of an identity pool id, e.g. `us-east-1` for
/// `us-east-1:1234-abcd`. An id without a separator is returned whole.
pub fn region_from_pool_id(identity_pool_id: &str) -> &str {
    identity_pool_id
        .split(POOL_ID_SEPARATOR)
        .next()
        .unwrap_or(identity_pool_id)
}

/// Replace the process-wide defaults
pub fn install(region: impl Into<String>, credentials: Arc<dyn CredentialBroker>) {
    let region = region.into();
    debug!(region = %region, "Installing SDK default credentials");
    let mut defaults = DEFAULTS.write().unwrap_or_else(PoisonError::into_inner);
    *defaults = Some(SdkDefaults {
        region,
        credentials,
    });
}

pub fn current() -> Option<SdkDefaults> {
    DEFAULTS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}
