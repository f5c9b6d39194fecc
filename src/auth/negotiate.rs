// src/auth/negotiate.rs

//! HTTP Negotiate authorization (RFC 4559).
//!
//! The client sends `Authorization: Negotiate <token>`. The token is run
//! through one acceptor round; the request is authorized only if that round
//! establishes the context.

use http::HeaderValue;

use super::authorizer::AuthorizationState;
use super::codec::{self, NegotiationToken};
use super::context::SecurityContextEngine;
use super::Principal;
use crate::error::Result;

/// Authorizes a request carrying a Negotiate token.
#[derive(Debug)]
pub struct NegotiateAuthorizer {
    state: AuthorizationState,
    principal: Option<Principal>,
    response_token: NegotiationToken,
}

impl NegotiateAuthorizer {
    /// Run the handshake for one request.
    ///
    /// Malformed headers, invalid tokens, and rejected handshakes leave the
    /// authorizer unauthorized; they are logged and never returned. Only a
    /// `BackendUnavailable` error is returned, since it is a server fault.
    pub fn authorize(engine: &SecurityContextEngine, header: Option<&HeaderValue>) -> Result<Self> {
        let token = match codec::decode_header(header) {
            Ok(decoded) => decoded.token().cloned().unwrap_or_default(),
            Err(err) => {
                log::debug!("Problem with Negotiate header: {}", err);
                return Ok(NegotiateAuthorizer::unauthorized(NegotiationToken::empty()));
            }
        };

        log::trace!("Negotiate token of {} bytes", token.len());

        match engine.handshake(&token) {
            Ok(context) if context.is_established() => {
                let (principal, response_token) = context.into_parts();
                log::debug!(
                    "Negotiate handshake established for {}",
                    principal.as_ref().map(Principal::name).unwrap_or_default()
                );
                Ok(NegotiateAuthorizer {
                    state: AuthorizationState::Authorized,
                    principal,
                    response_token,
                })
            }
            Ok(context) => {
                log::debug!("Negotiate handshake needs another round");
                let (_, response_token) = context.into_parts();
                Ok(NegotiateAuthorizer::unauthorized(response_token))
            }
            Err(err) if err.is_backend_unavailable() => {
                log::error!("Problem initializing security context: {:?}", err);
                Err(err)
            }
            Err(err) => {
                log::info!("Problem with Negotiate token: {}", err);
                Ok(NegotiateAuthorizer::unauthorized(NegotiationToken::empty()))
            }
        }
    }

    fn unauthorized(response_token: NegotiationToken) -> Self {
        NegotiateAuthorizer {
            state: AuthorizationState::Unauthorized,
            principal: None,
            response_token,
        }
    }

    pub fn state(&self) -> AuthorizationState {
        self.state
    }

    pub fn is_authorized(&self) -> bool {
        self.state == AuthorizationState::Authorized
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// The acceptor's last output token.
    ///
    /// When authorized, a non-empty token is the mutual authentication reply.
    /// When unauthorized, it is the continuation challenge for the next round.
    pub fn response_token(&self) -> &NegotiationToken {
        &self.response_token
    }

    pub(crate) fn into_principal(self) -> Option<Principal> {
        self.principal
    }
}
