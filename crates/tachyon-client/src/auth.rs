//! Capabilities the host provides to the client: a place to keep the bearer
//! token and a way to send the user back through authentication.

use std::sync::RwLock;

use tracing::warn;

/// Process-wide store for the bearer token.
pub trait CredentialStore: Send + Sync {
    /// Current token, if any.
    fn token(&self) -> Option<String>;

    fn set_token(&self, token: String);

    fn clear_token(&self);
}

/// In-memory credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn token(&self) -> Option<String> {
        self.token
            .read()
            .map(|t| t.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn set_token(&self, token: String) {
        match self.token.write() {
            Ok(mut guard) => *guard = Some(token),
            Err(poisoned) => *poisoned.into_inner() = Some(token),
        }
    }

    fn clear_token(&self) {
        match self.token.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

/// Invoked by the client when the server answers 401, after the stored
/// token has been cleared.
pub trait UnauthorizedHandler: Send + Sync {
    fn on_unauthorized(&self);
}

impl<F> UnauthorizedHandler for F
where
    F: Fn() + Send + Sync,
{
    fn on_unauthorized(&self) {
        self()
    }
}

/// Default handler: log and let the host notice the 401 error.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogUnauthorized;

impl UnauthorizedHandler for LogUnauthorized {
    fn on_unauthorized(&self) {
        warn!("Session rejected by server, re-authentication required");
    }
}
