//! Secret store and interactive prompt seams.
//!
//! Passwords are never written to the session file. They live in memory for
//! the duration of one command and in the OS keyring across commands.

use crate::error::{Result, WorkflowError};

/// OS-level secret storage keyed by `(service, username)`.
pub trait SecretStore {
    fn get(&self, service: &str, username: &str) -> Result<Option<String>>;
    fn set(&self, service: &str, username: &str, secret: &str) -> Result<()>;
    /// Removing an entry that does not exist is not an error.
    fn delete(&self, service: &str, username: &str) -> Result<()>;
}

/// Interactive input from the person running the tool.
pub trait Prompter {
    fn text(&self, message: &str) -> Result<String>;
    fn text_with_default(&self, message: &str, default: &str) -> Result<String>;
    /// Input is not echoed.
    fn password(&self, message: &str) -> Result<String>;
    /// Block until the user presses enter.
    fn pause(&self, message: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Keyring
// ---------------------------------------------------------------------------

/// [`SecretStore`] backed by the platform keychain / secret service.
#[derive(Debug, Default)]
pub struct KeyringStore;

impl KeyringStore {
    fn entry(service: &str, username: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(service, username).map_err(|e| store_error(service, e))
    }
}

fn store_error(service: &str, e: keyring::Error) -> WorkflowError {
    WorkflowError::SecretStore {
        service: service.to_string(),
        message: e.to_string(),
    }
}

impl SecretStore for KeyringStore {
    fn get(&self, service: &str, username: &str) -> Result<Option<String>> {
        match Self::entry(service, username)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(store_error(service, e)),
        }
    }

    fn set(&self, service: &str, username: &str, secret: &str) -> Result<()> {
        Self::entry(service, username)?
            .set_password(secret)
            .map_err(|e| store_error(service, e))
    }

    fn delete(&self, service: &str, username: &str) -> Result<()> {
        match Self::entry(service, username)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(store_error(service, e)),
        }
    }
}
