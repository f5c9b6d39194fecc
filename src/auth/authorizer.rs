// src/auth/authorizer.rs

use http::StatusCode;

use super::basic::BasicAuthorizer;
use super::challenge::ChallengeCatalog;
use super::codec::NegotiationToken;
use super::negotiate::NegotiateAuthorizer;
use super::{AuthorizationType, Principal};
use crate::filter::ResponseHead;

/// Progress of one request through authorization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthorizationState {
    /// The request has not been looked at.
    Unchecked,
    /// The scheme is known, credentials not yet checked.
    Classified(AuthorizationType),
    Authorized,
    Unauthorized,
}

/// The authorizer used when no recognized scheme is present. Never
/// authorizes anything.
#[derive(Debug, Default)]
pub struct NullAuthorizer {
    _priv: (),
}

impl NullAuthorizer {
    pub fn new() -> Self {
        NullAuthorizer::default()
    }

    pub fn state(&self) -> AuthorizationState {
        AuthorizationState::Unauthorized
    }
}

/// The authorizer chosen for one request.
#[derive(Debug)]
pub enum Authorizer {
    Negotiate(NegotiateAuthorizer),
    Basic(BasicAuthorizer),
    Null(NullAuthorizer),
}

impl Authorizer {
    pub fn authorization_type(&self) -> AuthorizationType {
        match self {
            Authorizer::Negotiate(_) => AuthorizationType::Negotiate,
            Authorizer::Basic(_) => AuthorizationType::Basic,
            Authorizer::Null(_) => AuthorizationType::Null,
        }
    }

    pub fn state(&self) -> AuthorizationState {
        match self {
            Authorizer::Negotiate(authz) => authz.state(),
            Authorizer::Basic(authz) => authz.state(),
            Authorizer::Null(authz) => authz.state(),
        }
    }

    pub fn is_authorized(&self) -> bool {
        self.state() == AuthorizationState::Authorized
    }

    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Authorizer::Negotiate(authz) => authz.principal(),
            Authorizer::Basic(authz) => authz.principal(),
            Authorizer::Null(_) => None,
        }
    }

    /// Whether the principal was already written to the session.
    pub(crate) fn is_cached(&self) -> bool {
        match self {
            Authorizer::Basic(authz) => authz.is_cached(),
            _ => false,
        }
    }

    /// Token for the client's next Negotiate round, when the handshake is
    /// incomplete.
    pub fn continuation_token(&self) -> Option<&NegotiationToken> {
        match self {
            Authorizer::Negotiate(authz) if !authz.is_authorized() => {
                Some(authz.response_token()).filter(|token| !token.is_empty())
            }
            _ => None,
        }
    }

    /// Mutual authentication reply to attach to the successful response.
    pub fn mutual_token(&self) -> Option<&NegotiationToken> {
        match self {
            Authorizer::Negotiate(authz) if authz.is_authorized() => {
                Some(authz.response_token()).filter(|token| !token.is_empty())
            }
            _ => None,
        }
    }

    /// Write `401` and one `WWW-Authenticate` line per challenge.
    ///
    /// Does nothing once the response head is committed.
    pub fn prepare_unauthorized_response(
        &self,
        catalog: &ChallengeCatalog,
        response: &mut ResponseHead,
    ) {
        if response.is_committed() {
            log::debug!("response already committed, not adding challenges");
            return;
        }

        catalog.apply(response.headers_mut(), self.continuation_token());
        response.set_status(StatusCode::UNAUTHORIZED);
    }

    pub(crate) fn into_principal(self) -> Option<Principal> {
        match self {
            Authorizer::Negotiate(authz) => authz.into_principal(),
            Authorizer::Basic(authz) => authz.into_principal(),
            Authorizer::Null(_) => None,
        }
    }
}
