// src/auth/backend.rs

use std::error::Error as StdError;
use std::fmt;

use super::{DelegatedCredential, DelegationFlags, Mechanism, Principal};
use crate::error::{self, BoxError, Error};

/// The identity backend that owns the actual security mechanisms.
///
/// This crate never implements Kerberos or password checks itself. It drives
/// the contexts handed out here and relies on the backend for every
/// cryptographic decision. All calls block the calling worker until the
/// backend answers.
pub trait IdentityBackend: Send + Sync {
    /// Acquire an accept-only server credential for `mechanism` and open a
    /// context over it.
    ///
    /// `service` is the server identity claim, e.g. `HTTP/www.example.com`;
    /// `None` lets the backend pick its default credential.
    fn accept_context(
        &self,
        mechanism: Mechanism,
        service: Option<&str>,
    ) -> Result<Box<dyn AcceptContext>, BackendError>;

    /// Check a user id and password.
    ///
    /// `login_context` names the backend configuration to use. Returns
    /// `Ok(None)` when the credentials are rejected.
    fn verify_password(
        &self,
        login_context: &str,
        user_id: &str,
        password: &str,
    ) -> Result<Option<Principal>, BackendError>;

    /// Open an initiator context toward `target` using a delegated credential.
    fn initiate_context(
        &self,
        credential: &DelegatedCredential,
        target: &str,
        mechanism: Mechanism,
        flags: DelegationFlags,
    ) -> Result<Box<dyn InitiateContext>, BackendError>;

    /// Release whatever the backend holds for a principal that logged out.
    fn logout(&self, principal: &Principal) {
        let _ = principal;
    }
}

/// Server side of one security context.
pub trait AcceptContext: Send {
    /// Feed one client token and return the token to relay back, which may
    /// be empty.
    fn accept(&mut self, token: &[u8]) -> Result<Vec<u8>, BackendError>;

    fn is_established(&self) -> bool;

    /// Whether the client granted credential delegation.
    fn delegation_granted(&self) -> bool;

    /// The authenticated client name, once established.
    fn source_name(&self) -> Option<String>;

    fn delegated_credential(&self) -> Option<DelegatedCredential>;

    /// Release the context and any credential material it holds.
    ///
    /// Called exactly once by this crate, after which the context is dropped.
    fn dispose(&mut self);
}

/// Client side of one security context.
pub trait InitiateContext: Send {
    /// Produce the next token to send, given the peer's last token (empty on
    /// the first round).
    fn initiate(&mut self, token: &[u8]) -> Result<Vec<u8>, BackendError>;

    /// Release the context. Called exactly once.
    fn dispose(&mut self);
}

/// Failure reported by an [`IdentityBackend`].
pub struct BackendError {
    kind: BackendErrorKind,
    source: BoxError,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BackendErrorKind {
    InvalidToken,
    Rejected,
    Unavailable,
}

impl BackendError {
    /// The token could not be parsed for the declared mechanism.
    pub fn invalid_token<E: Into<BoxError>>(source: E) -> Self {
        BackendError::new(BackendErrorKind::InvalidToken, source)
    }

    /// The token was understood but refused: expired, wrong realm, clock skew.
    pub fn rejected<E: Into<BoxError>>(source: E) -> Self {
        BackendError::new(BackendErrorKind::Rejected, source)
    }

    /// The backend itself could not be reached or initialized.
    pub fn unavailable<E: Into<BoxError>>(source: E) -> Self {
        BackendError::new(BackendErrorKind::Unavailable, source)
    }

    fn new<E: Into<BoxError>>(kind: BackendErrorKind, source: E) -> Self {
        BackendError {
            kind,
            source: source.into(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.kind == BackendErrorKind::Unavailable
    }
}

impl fmt::Debug for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendError")
            .field("kind", &self.kind)
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            BackendErrorKind::InvalidToken => write!(f, "invalid token: {}", self.source),
            BackendErrorKind::Rejected => write!(f, "rejected: {}", self.source),
            BackendErrorKind::Unavailable => write!(f, "unavailable: {}", self.source),
        }
    }
}

impl StdError for BackendError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.source as &(dyn StdError + 'static))
    }
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Error {
        match err.kind {
            BackendErrorKind::InvalidToken => error::invalid_token(err),
            BackendErrorKind::Rejected => error::handshake_rejected(err),
            BackendErrorKind::Unavailable => error::backend_unavailable(err),
        }
    }
}
