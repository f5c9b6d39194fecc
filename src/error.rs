// src/error.rs

use std::error::Error as StdError;
use std::fmt;

/// A `Result` alias where the `Err` case is `negotiate_filter::Error`.
pub type Result<T> = std::result::Result<T, Error>;

pub(crate) type BoxError = Box<dyn StdError + Send + Sync>;

/// The Errors that may occur when authorizing a request.
///
/// Note: Errors may include the source of the failure reported by the
/// identity backend. Tokens and passwords are never part of an error.
pub struct Error {
    inner: Box<Inner>,
}

struct Inner {
    kind: Kind,
    source: Option<BoxError>,
}

impl Error {
    pub(crate) fn new<E>(kind: Kind, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(Inner {
                kind,
                source: source.map(Into::into),
            }),
        }
    }

    /// Returns true if the `Authorization` header could not be parsed.
    pub fn is_malformed_header(&self) -> bool {
        matches!(self.inner.kind, Kind::MalformedHeader)
    }

    /// Returns true if the payload was not a token for the negotiated mechanism.
    pub fn is_invalid_token(&self) -> bool {
        matches!(self.inner.kind, Kind::InvalidToken)
    }

    /// Returns true if the identity backend rejected the handshake.
    pub fn is_handshake_rejected(&self) -> bool {
        matches!(self.inner.kind, Kind::HandshakeRejected)
    }

    /// Returns true if the identity backend could not be reached or initialized.
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self.inner.kind, Kind::BackendUnavailable)
    }

    /// Returns true if delegation was attempted without a delegated credential.
    pub fn is_no_delegated_credential(&self) -> bool {
        matches!(self.inner.kind, Kind::NoDelegatedCredential)
    }

    /// Returns true if the error is from a type Builder.
    pub fn is_builder(&self) -> bool {
        matches!(self.inner.kind, Kind::Builder)
    }

    /// Returns true if the failure was caused by what the client sent.
    ///
    /// These map to `401 Unauthorized`; everything else is a server fault.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self.inner.kind,
            Kind::MalformedHeader | Kind::InvalidToken | Kind::HandshakeRejected
        )
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut builder = f.debug_struct("negotiate_filter::Error");

        builder.field("kind", &self.inner.kind);

        if let Some(ref source) = self.inner.source {
            builder.field("source", source);
        }

        builder.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.inner.kind {
            Kind::MalformedHeader => f.write_str("malformed Authorization header")?,
            Kind::InvalidToken => f.write_str("invalid negotiation token")?,
            Kind::HandshakeRejected => f.write_str("security context handshake rejected")?,
            Kind::BackendUnavailable => f.write_str("identity backend unavailable")?,
            Kind::NoDelegatedCredential => f.write_str("no delegated credential available")?,
            Kind::Builder => f.write_str("builder error")?,
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| &**e as _)
    }
}

#[derive(Debug)]
pub(crate) enum Kind {
    MalformedHeader,
    InvalidToken,
    HandshakeRejected,
    BackendUnavailable,
    NoDelegatedCredential,
    Builder,
}

// constructors

pub(crate) fn malformed_header<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::MalformedHeader, Some(e))
}

pub(crate) fn invalid_token<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::InvalidToken, Some(e))
}

pub(crate) fn handshake_rejected<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::HandshakeRejected, Some(e))
}

pub(crate) fn backend_unavailable<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::BackendUnavailable, Some(e))
}

pub(crate) fn no_delegated_credential() -> Error {
    Error::new(Kind::NoDelegatedCredential, None::<Error>)
}

pub(crate) fn builder<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Builder, Some(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn test_source_chain() {
        let root = Error::new(Kind::HandshakeRejected, None::<Error>);
        assert!(root.source().is_none());

        let link = backend_unavailable(root);
        assert!(link.source().is_some());
        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn test_client_fault_kinds() {
        assert!(malformed_header("no space").is_client_fault());
        assert!(invalid_token("garbage").is_client_fault());
        assert!(handshake_rejected("clock skew").is_client_fault());
        assert!(!backend_unavailable("kdc down").is_client_fault());
        assert!(!no_delegated_credential().is_client_fault());
    }

    #[test]
    fn test_display_omits_source() {
        let err = invalid_token("secret detail");
        assert_eq!(err.to_string(), "invalid negotiation token");
        assert!(format!("{:?}", err).contains("InvalidToken"));
    }

    #[test]
    fn test_is_predicates() {
        assert!(no_delegated_credential().is_no_delegated_credential());
        assert!(builder("bad realm").is_builder());
        assert!(backend_unavailable("down").is_backend_unavailable());
    }
}
