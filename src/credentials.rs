//! Secret storage in the operating system keyring.
//!
//! The `keyring` crate is wrapped behind a small trait so command
//! handlers can be tested against an in-memory double while sharing the
//! same miss and error semantics as the real platform store.

use keyring::Entry;
use tracing::trace;

const SERVICE: &str = "crosstie";

// Keyring account names, one per secret.
pub const BUGZILLA_API_KEY: &str = "bugzilla-api-key";
pub const JIRA_USERNAME: &str = "jira-username";
pub const JIRA_PASSWORD: &str = "jira-password";

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

pub type Result<T> = core::result::Result<T, CredentialError>;

/// Storage for one named secret per account.
///
/// A missing secret is `Ok(None)`, not an error; callers fall back to
/// prompting and store what the user types.
pub trait CredentialStore: std::fmt::Debug + Send + Sync {
    fn load(&self, account: &str) -> Result<Option<String>>;
    /// Stores the secret, replacing any previous value.
    fn save(&self, account: &str, value: &str) -> Result<()>;
}

/// The real store, backed by the platform keyring.
#[derive(Debug, Default)]
pub struct Keyring;

impl CredentialStore for Keyring {
    fn load(&self, account: &str) -> Result<Option<String>> {
        let entry = Entry::new(SERVICE, account)?;
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => {
                trace!("no {account} entry in keyring");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, account: &str, value: &str) -> Result<()> {
        trace!("saving {account} to keyring");
        Entry::new(SERVICE, account)?.set_password(value)?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockStore;
    use super::*;

    #[test]
    fn missing_secret_is_none() {
        let store = MockStore::default();
        assert_eq!(store.load(BUGZILLA_API_KEY).unwrap(), None);
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = MockStore::default();
        store.save(JIRA_USERNAME, "quay-robot").unwrap();
        assert_eq!(
            store.load(JIRA_USERNAME).unwrap(),
            Some("quay-robot".to_string())
        );
        assert_eq!(
            store.saved_value(JIRA_USERNAME),
            Some("quay-robot".to_string())
        );
    }

    #[test]
    fn platform_failure_surfaces_as_error() {
        let store = MockStore::default();
        store.set_error(
            JIRA_PASSWORD,
            keyring::Error::Invalid("password".into(), "forced failure".into()),
        );
        assert!(store.load(JIRA_PASSWORD).is_err());
    }
}
