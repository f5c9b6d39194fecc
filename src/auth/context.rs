// src/auth/context.rs

//! Acceptor-side security context handling.
//!
//! A handshake acquires a context from the [`IdentityBackend`], feeds it the
//! client token, and copies the outcome into a [`SecurityContext`]. The
//! backend context is held by a guard that disposes it on every exit path.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use super::backend::{AcceptContext, IdentityBackend, InitiateContext};
use super::codec::NegotiationToken;
use super::{DelegatedCredential, Mechanism, Principal};
use crate::error::{self, Result};

/// Something holding live credential material until disposed.
pub(crate) trait Dispose {
    fn dispose(&mut self);
}

impl Dispose for dyn AcceptContext {
    fn dispose(&mut self) {
        AcceptContext::dispose(self)
    }
}

impl Dispose for dyn InitiateContext {
    fn dispose(&mut self) {
        InitiateContext::dispose(self)
    }
}

/// Owns a backend context and disposes it exactly once, on drop.
pub(crate) struct ContextGuard<C: ?Sized + Dispose> {
    context: Box<C>,
}

impl<C: ?Sized + Dispose> ContextGuard<C> {
    pub(crate) fn new(context: Box<C>) -> Self {
        ContextGuard { context }
    }
}

impl<C: ?Sized + Dispose> Deref for ContextGuard<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.context
    }
}

impl<C: ?Sized + Dispose> DerefMut for ContextGuard<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.context
    }
}

impl<C: ?Sized + Dispose> Drop for ContextGuard<C> {
    fn drop(&mut self) {
        log::trace!("disposing security context");
        self.context.dispose();
    }
}

/// How the server accepts security contexts.
#[derive(Clone, Debug, Default)]
pub struct AcceptorConfig {
    /// Server identity claim, e.g. `HTTP/www.example.com`. `None` lets the
    /// backend choose.
    pub service_principal: Option<String>,
    pub mechanism: Mechanism,
}

/// The outcome of one handshake round.
#[derive(Clone, Debug)]
pub struct SecurityContext {
    established: bool,
    response_token: NegotiationToken,
    delegation_granted: bool,
    delegated_credential: Option<DelegatedCredential>,
    source_principal: Option<Principal>,
}

impl SecurityContext {
    /// Whether this round completed the handshake.
    pub fn is_established(&self) -> bool {
        self.established
    }

    /// Token to relay back to the client. Empty when there is nothing to send.
    pub fn response_token(&self) -> &NegotiationToken {
        &self.response_token
    }

    /// Whether another round is needed before the context is established.
    pub fn needs_continuation(&self) -> bool {
        !self.established && !self.response_token.is_empty()
    }

    pub fn delegation_granted(&self) -> bool {
        self.delegation_granted
    }

    /// Present only when delegation was granted.
    pub fn delegated_credential(&self) -> Option<&DelegatedCredential> {
        self.delegated_credential.as_ref()
    }

    /// Present only when established. Carries the delegated credential, if any.
    pub fn source_principal(&self) -> Option<&Principal> {
        self.source_principal.as_ref()
    }

    pub(crate) fn into_parts(self) -> (Option<Principal>, NegotiationToken) {
        (self.source_principal, self.response_token)
    }
}

/// Runs acceptor handshakes against the identity backend.
#[derive(Clone)]
pub struct SecurityContextEngine {
    backend: Arc<dyn IdentityBackend>,
    config: AcceptorConfig,
}

impl SecurityContextEngine {
    pub fn new(backend: Arc<dyn IdentityBackend>, config: AcceptorConfig) -> Self {
        SecurityContextEngine { backend, config }
    }

    pub fn config(&self) -> &AcceptorConfig {
        &self.config
    }

    /// Accept one client token.
    ///
    /// The backend context is disposed before this returns, whether the
    /// handshake succeeds, needs another round, or fails.
    pub fn handshake(&self, token: &NegotiationToken) -> Result<SecurityContext> {
        if token.is_empty() {
            return Err(error::invalid_token("empty negotiation token"));
        }

        let context = self.backend.accept_context(
            self.config.mechanism,
            self.config.service_principal.as_deref(),
        )?;
        let mut context = ContextGuard::new(context);

        let response = context.accept(token.as_bytes())?;
        let established = context.is_established();

        if !established && response.is_empty() {
            return Err(error::handshake_rejected(
                "context not established and no continuation token",
            ));
        }

        let delegation_granted = established && context.delegation_granted();
        let delegated_credential = if delegation_granted {
            context.delegated_credential().filter(|cred| !cred.is_empty())
        } else {
            None
        };

        let source_principal = if established {
            let name = context.source_name().ok_or_else(|| {
                error::handshake_rejected("established context has no source name")
            })?;
            let principal = Principal::new(name);
            Some(match delegated_credential.clone() {
                Some(credential) => principal.with_delegated_credential(credential),
                None => principal,
            })
        } else {
            None
        };

        log::debug!(
            "handshake round complete: established={} response_len={} delegation={}",
            established,
            response.len(),
            delegation_granted,
        );

        Ok(SecurityContext {
            established,
            response_token: NegotiationToken::from(response),
            delegation_granted,
            delegated_credential,
            source_principal,
        })
    }
}

impl std::fmt::Debug for SecurityContextEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityContextEngine")
            .field("config", &self.config)
            .finish()
    }
}
