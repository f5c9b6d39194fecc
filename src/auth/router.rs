// src/auth/router.rs

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use http::header::AUTHORIZATION;
use http::HeaderMap;

use super::authorizer::{Authorizer, NullAuthorizer};
use super::backend::IdentityBackend;
use super::basic::{BasicAuthorizer, BasicConfig};
use super::context::SecurityContextEngine;
use super::negotiate::NegotiateAuthorizer;
use super::AuthorizationType;
use crate::error::Error;
use crate::session::Session;

/// Picks and runs the authorizer for a request.
#[derive(Clone)]
pub struct AuthorizationRouter {
    engine: SecurityContextEngine,
    backend: Arc<dyn IdentityBackend>,
    basic: BasicConfig,
}

impl AuthorizationRouter {
    pub fn new(
        engine: SecurityContextEngine,
        backend: Arc<dyn IdentityBackend>,
        basic: BasicConfig,
    ) -> Self {
        AuthorizationRouter { engine, backend, basic }
    }

    /// Classify the request's `Authorization` header and build the matching
    /// authorizer.
    ///
    /// An unauthorized outcome is still `Ok`. Only a backend fault while
    /// building the authorizer is an error.
    pub fn route(
        &self,
        headers: &HeaderMap,
        session: Option<&Session<'_>>,
    ) -> Result<Authorizer, RouterError> {
        let header = headers.get(AUTHORIZATION);

        let authorizer = match AuthorizationType::classify(header) {
            AuthorizationType::Negotiate => {
                Authorizer::Negotiate(NegotiateAuthorizer::authorize(&self.engine, header)?)
            }
            AuthorizationType::Basic => Authorizer::Basic(BasicAuthorizer::authorize(
                &*self.backend,
                &self.basic,
                header,
                session,
            )?),
            AuthorizationType::Null => Authorizer::Null(NullAuthorizer::new()),
        };

        log::trace!(
            "{} authorizer finished in state {:?}",
            authorizer.authorization_type(),
            authorizer.state()
        );
        Ok(authorizer)
    }
}

impl fmt::Debug for AuthorizationRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationRouter")
            .field("engine", &self.engine)
            .field("basic", &self.basic)
            .finish()
    }
}

/// The authorizer could not be built. Answered with `500`.
#[derive(Debug)]
pub struct RouterError {
    source: Error,
}

impl RouterError {
    pub fn error(&self) -> &Error {
        &self.source
    }
}

impl From<Error> for RouterError {
    fn from(source: Error) -> RouterError {
        RouterError { source }
    }
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unable to authorize request")
    }
}

impl StdError for RouterError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}
