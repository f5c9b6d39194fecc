// src/auth/mod.rs

//! Authorization schemes for HTTP Negotiate (Kerberos/SPNEGO) and Basic.
//!
//! A request is classified by the scheme of its `Authorization` header and
//! handed to exactly one [`Authorizer`]. Negotiate requests run a security
//! context handshake against the [`IdentityBackend`]; Basic requests verify
//! a user id and password against the same backend. Anything else is
//! unauthorized and answered with the configured [`ChallengeCatalog`].

use std::fmt;

use bytes::Bytes;
use http::HeaderValue;

mod authorizer;
mod backend;
mod basic;
mod challenge;
pub mod codec;
mod context;
mod delegate;
mod negotiate;
mod router;

pub use self::authorizer::{AuthorizationState, Authorizer, NullAuthorizer};
pub use self::backend::{AcceptContext, BackendError, IdentityBackend, InitiateContext};
pub use self::basic::{BasicAuthorizer, BasicConfig, DEFAULT_LOGIN_CONTEXT};
pub use self::challenge::{Challenge, ChallengeCatalog, DEFAULT_REALM};
pub use self::codec::NegotiationToken;
pub use self::context::{AcceptorConfig, SecurityContext, SecurityContextEngine};
pub use self::delegate::{derive_spn, CredentialDelegator, DelegationFlags};
pub use self::negotiate::NegotiateAuthorizer;
pub use self::router::{AuthorizationRouter, RouterError};

/// The scheme named by an `Authorization` header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthorizationType {
    /// `Negotiate <token>`, RFC 4559.
    Negotiate,
    /// `Basic <base64 user:password>`, RFC 7617.
    Basic,
    /// No usable scheme. Never a successful anonymous login.
    Null,
}

impl AuthorizationType {
    /// Classify a header value by its scheme, ignoring ASCII case.
    ///
    /// Missing, non-text, or unrecognized values classify as `Null`.
    pub fn classify(header: Option<&HeaderValue>) -> AuthorizationType {
        let value = match header.map(HeaderValue::to_str) {
            Some(Ok(value)) => value,
            Some(Err(_)) => {
                log::info!("Authorization header is not valid text");
                return AuthorizationType::Null;
            }
            None => return AuthorizationType::Null,
        };

        let scheme = value.split(' ').next().unwrap_or_default();

        if scheme.eq_ignore_ascii_case("negotiate") {
            AuthorizationType::Negotiate
        } else if scheme.eq_ignore_ascii_case("basic") {
            AuthorizationType::Basic
        } else {
            log::info!("Unsupported authorization type: {}", scheme);
            AuthorizationType::Null
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationType::Negotiate => "Negotiate",
            AuthorizationType::Basic => "Basic",
            AuthorizationType::Null => "Null",
        }
    }
}

impl fmt::Display for AuthorizationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Security mechanism negotiated by the acceptor and initiator contexts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Mechanism {
    /// SPNEGO pseudo-mechanism, the one browsers use with `Negotiate`.
    #[default]
    Spnego,
    /// Raw Kerberos v5.
    Kerberos,
}

impl Mechanism {
    /// The dotted object identifier of this mechanism.
    pub fn oid(&self) -> &'static str {
        match self {
            Mechanism::Spnego => "1.3.6.1.5.5.2",
            Mechanism::Kerberos => "1.2.840.113554.1.2.2",
        }
    }
}

/// A credential the client allowed the server to use on its behalf.
///
/// The handle is opaque to this crate; only the identity backend can
/// interpret it. `Debug` never prints the contents.
#[derive(Clone, PartialEq, Eq)]
pub struct DelegatedCredential(Bytes);

impl DelegatedCredential {
    pub fn new(handle: impl Into<Bytes>) -> Self {
        DelegatedCredential(handle.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for DelegatedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DelegatedCredential(..)")
    }
}

/// A verified identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    name: String,
    delegated_credential: Option<DelegatedCredential>,
}

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Principal {
            name: name.into(),
            delegated_credential: None,
        }
    }

    /// Attach a credential the client delegated to this server.
    pub fn with_delegated_credential(mut self, credential: DelegatedCredential) -> Self {
        self.delegated_credential = Some(credential);
        self
    }

    /// The full principal name, e.g. `alice@EXAMPLE.COM`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The principal name without its realm, e.g. `alice`.
    pub fn remote_user(&self) -> &str {
        self.name.split('@').next().unwrap_or_default()
    }

    pub fn delegated_credential(&self) -> Option<&DelegatedCredential> {
        self.delegated_credential.as_ref()
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Request extension describing who was authorized, and how.
///
/// Inserted into the request before it reaches the downstream service.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    principal: Principal,
    scheme: Option<AuthorizationType>,
}

impl AuthenticatedUser {
    pub(crate) fn new(principal: Principal, scheme: Option<AuthorizationType>) -> Self {
        AuthenticatedUser { principal, scheme }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// The scheme that produced the principal, or `None` when it came from
    /// the session cache.
    pub fn scheme(&self) -> Option<AuthorizationType> {
        self.scheme
    }

    pub fn remote_user(&self) -> &str {
        self.principal.remote_user()
    }
}
