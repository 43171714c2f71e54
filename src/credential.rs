//! Request-scoped upstream credentials.
//!
//! Each inbound request runs inside [`with_credential`], which binds the
//! caller's key to the current tokio task. Components resolve it with
//! [`require`]; there is no process-wide fallback key.

use crate::error::{Result, SmartEdError};
use std::fmt;
use std::future::Future;

tokio::task_local! {
    static ACTIVE_CREDENTIAL: Credential;
}

/// An opaque caller-supplied API key.
///
/// Not `Serialize`, and `Debug` is redacted, so it cannot end up in logs or
/// responses by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw key. Blank keys are treated as absent.
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The raw key, for building an upstream request.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Run `fut` with `credential` as the active credential.
///
/// The binding is dropped when `fut` completes, errors, panics or is
/// cancelled.
pub async fn with_credential<F>(credential: Credential, fut: F) -> F::Output
where
    F: Future,
{
    ACTIVE_CREDENTIAL.scope(credential, fut).await
}

/// The credential bound to the current task, if any.
pub fn current() -> Option<Credential> {
    ACTIVE_CREDENTIAL.try_with(Credential::clone).ok()
}

/// The credential bound to the current task, or [`SmartEdError::NoCredential`].
pub fn require() -> Result<Credential> {
    current().ok_or(SmartEdError::NoCredential)
}
