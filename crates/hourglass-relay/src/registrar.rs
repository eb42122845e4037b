//! Pseudonym registrar.
//!
//! Validates a batch of contact pseudonyms and writes `pseudonym -> identity`
//! for each of them into the store selected by the caller's hour bucket.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::hour::HourId;
use crate::domain::pseudonym::{KeyFormatError, PseudonymKey, MAX_CONTACT_KEYS};
use crate::ports::store::StoreError;
use crate::router::DualStoreRouter;

/// Registration failures. Everything except `Store` is the caller's fault.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("tempEphemeralUserId is not a valid 256bit hash key: {0}")]
    InvalidIdentity(KeyFormatError),

    #[error("ephemeralContactKeysList is empty")]
    EmptyList,

    #[error("ephemeralContactKeysList contains {count} keys, more than {max}")]
    TooManyKeys { count: usize, max: usize },

    #[error("ephemeralContactKeysList contains an invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: KeyFormatError },

    #[error("store error: {0}")]
    Store(StoreError),
}

impl RegistrationError {
    /// True when the request itself was at fault
    pub fn is_client_error(&self) -> bool {
        !matches!(self, RegistrationError::Store(_))
    }
}

/// A batch that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRegistration {
    pub identity: PseudonymKey,
    pub pseudonyms: Vec<PseudonymKey>,
}

impl ValidatedRegistration {
    /// `(pseudonym, identity)` pairs for a bulk set
    pub fn entries(&self) -> Vec<(String, String)> {
        self.pseudonyms
            .iter()
            .map(|p| (p.as_str().to_owned(), self.identity.as_str().to_owned()))
            .collect()
    }
}

/// Validate a registration. The first violation wins, checked in this order:
/// identity format, empty list, list size, then each key in order.
pub fn validate_registration(
    pseudonyms: &[String],
    identity: &str,
) -> Result<ValidatedRegistration, RegistrationError> {
    let identity = PseudonymKey::parse(identity).map_err(RegistrationError::InvalidIdentity)?;

    if pseudonyms.is_empty() {
        return Err(RegistrationError::EmptyList);
    }
    if pseudonyms.len() > MAX_CONTACT_KEYS {
        return Err(RegistrationError::TooManyKeys {
            count: pseudonyms.len(),
            max: MAX_CONTACT_KEYS,
        });
    }

    let pseudonyms = pseudonyms
        .iter()
        .map(|key| {
            PseudonymKey::parse(key).map_err(|reason| RegistrationError::InvalidKey {
                key: key.clone(),
                reason,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ValidatedRegistration {
        identity,
        pseudonyms,
    })
}

pub struct PseudonymRegistrar {
    router: Arc<DualStoreRouter>,
}

impl PseudonymRegistrar {
    pub fn new(router: Arc<DualStoreRouter>) -> Self {
        Self { router }
    }

    /// Validate and store the batch in the store for `hour_id`.
    ///
    /// `hour_id` must already have been checked against the clock. Returns the
    /// number of pseudonyms written.
    pub async fn register(
        &self,
        pseudonyms: &[String],
        identity: &str,
        hour_id: HourId,
    ) -> Result<usize, RegistrationError> {
        let registration = validate_registration(pseudonyms, identity)?;

        let store = self
            .router
            .select(hour_id)
            .await
            .map_err(RegistrationError::Store)?;

        let entries = registration.entries();
        if let Err(e) = store.set_many(&entries).await {
            warn!(hour_id, slot = %store.slot(), error = %e, "Bulk registration write failed");
            return Err(RegistrationError::Store(e));
        }

        debug!(hour_id, slot = %store.slot(), count = entries.len(), "Pseudonyms registered");
        Ok(entries.len())
    }
}
