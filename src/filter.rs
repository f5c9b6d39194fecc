// src/filter.rs

//! The request filter.
//!
//! An [`AuthFilter`] decides, for each request, whether it may proceed to the
//! protected service. Decisions are made in this order:
//!
//! 1. A principal cached for the request's session lets it through without a
//!    handshake.
//! 2. Otherwise the [`AuthorizationRouter`] runs exactly one authorizer.
//! 3. An authorized request has its principal cached (when there is a
//!    session) and proceeds with an [`AuthenticatedUser`] extension.
//! 4. An unauthorized request is answered with `401` and the challenge
//!    catalog, or with `302` when a login redirect is configured.
//! 5. A backend fault is answered with `500`.

use std::fmt;
use std::sync::Arc;

use http::header::{COOKIE, LOCATION};
use cookie_crate::Cookie;
use http::{HeaderMap, HeaderValue, Request, Response, StatusCode};

use crate::auth::codec::{self, NegotiationToken};
use crate::auth::{
    AcceptorConfig, AuthenticatedUser, AuthorizationRouter, Authorizer, BasicConfig, Challenge,
    ChallengeCatalog, IdentityBackend, Mechanism, SecurityContextEngine, DEFAULT_LOGIN_CONTEXT,
};
use crate::error::{self, Result};
use crate::session::{SessionId, SessionIdentityCache, SessionStore};

/// Authorizes requests before they reach a protected service.
///
/// Cloning is cheap; clones share configuration and the session store.
#[derive(Clone)]
pub struct AuthFilter {
    inner: Arc<FilterRef>,
}

struct FilterRef {
    router: AuthorizationRouter,
    catalog: ChallengeCatalog,
    sessions: SessionIdentityCache,
    backend: Arc<dyn IdentityBackend>,
    login_redirect: Option<HeaderValue>,
    session_cookie: Option<String>,
}

/// A `AuthFilterBuilder` can be used to create an `AuthFilter` with custom
/// configuration.
#[must_use]
pub struct AuthFilterBuilder {
    config: Config,
}

struct Config {
    backend: Option<Arc<dyn IdentityBackend>>,
    session_store: Option<Arc<dyn SessionStore>>,
    realm: Option<String>,
    challenges: Option<Vec<Challenge>>,
    service_principal: Option<String>,
    mechanism: Mechanism,
    login_context: String,
    allow_empty_password: bool,
    login_redirect: Option<String>,
    session_cookie: Option<String>,
}

impl Default for AuthFilterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthFilterBuilder {
    /// Constructs a new `AuthFilterBuilder`.
    ///
    /// This is the same as `AuthFilter::builder()`.
    pub fn new() -> AuthFilterBuilder {
        AuthFilterBuilder {
            config: Config {
                backend: None,
                session_store: None,
                realm: None,
                challenges: None,
                service_principal: None,
                mechanism: Mechanism::default(),
                login_context: DEFAULT_LOGIN_CONTEXT.to_owned(),
                allow_empty_password: true,
                login_redirect: None,
                session_cookie: None,
            },
        }
    }

    /// Returns an `AuthFilter` that uses this builder's configuration.
    ///
    /// # Errors
    ///
    /// This method fails if no identity backend was set, or if the realm,
    /// challenges, login redirect, or session cookie name cannot be used in
    /// HTTP headers.
    pub fn build(self) -> Result<AuthFilter> {
        let config = self.config;

        let backend = config
            .backend
            .ok_or_else(|| error::builder("an identity backend is required"))?;

        let catalog = match (config.challenges, config.realm) {
            (Some(challenges), _) => ChallengeCatalog::new(challenges)?,
            (None, Some(realm)) => ChallengeCatalog::with_realm(&realm)?,
            (None, None) => ChallengeCatalog::default(),
        };

        let login_redirect = match config.login_redirect {
            Some(location) if location.is_empty() => {
                return Err(error::builder("login redirect location is empty"));
            }
            Some(location) => Some(HeaderValue::from_str(&location).map_err(error::builder)?),
            None => None,
        };

        if let Some(name) = &config.session_cookie {
            let invalid =
                |c: char| c.is_ascii_whitespace() || c.is_ascii_control() || "=;,\"".contains(c);
            if name.is_empty() || name.chars().any(invalid) {
                return Err(error::builder(format!("invalid session cookie name: {:?}", name)));
            }
        }

        let sessions = match config.session_store {
            Some(store) => SessionIdentityCache::new(store),
            None => SessionIdentityCache::default(),
        };

        let engine = SecurityContextEngine::new(
            backend.clone(),
            AcceptorConfig {
                service_principal: config.service_principal,
                mechanism: config.mechanism,
            },
        );
        let basic = BasicConfig {
            login_context: config.login_context,
            allow_empty_password: config.allow_empty_password,
        };

        log::debug!(
            "auth filter built: challenges={:?} redirect={} cookie={:?}",
            catalog.challenges(),
            login_redirect.is_some(),
            config.session_cookie,
        );

        Ok(AuthFilter {
            inner: Arc::new(FilterRef {
                router: AuthorizationRouter::new(engine, backend.clone(), basic),
                catalog,
                sessions,
                backend,
                login_redirect,
                session_cookie: config.session_cookie,
            }),
        })
    }

    /// Set the identity backend. Required.
    pub fn backend(mut self, backend: Arc<dyn IdentityBackend>) -> AuthFilterBuilder {
        self.config.backend = Some(backend);
        self
    }

    /// Set where session principals are stored.
    ///
    /// Defaults to an in-process [`MemorySessionStore`](crate::session::MemorySessionStore).
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> AuthFilterBuilder {
        self.config.session_store = Some(store);
        self
    }

    /// Set the realm advertised in the Basic challenge.
    ///
    /// Ignored when [`challenges`](AuthFilterBuilder::challenges) is set.
    pub fn realm(mut self, realm: impl Into<String>) -> AuthFilterBuilder {
        self.config.realm = Some(realm.into());
        self
    }

    /// Replace the advertised challenges. They are sent in the given order.
    pub fn challenges(mut self, challenges: Vec<Challenge>) -> AuthFilterBuilder {
        self.config.challenges = Some(challenges);
        self
    }

    /// Set the service principal the acceptor claims, e.g.
    /// `HTTP/www.example.com`.
    pub fn service_principal(mut self, spn: impl Into<String>) -> AuthFilterBuilder {
        self.config.service_principal = Some(spn.into());
        self
    }

    pub fn mechanism(mut self, mechanism: Mechanism) -> AuthFilterBuilder {
        self.config.mechanism = mechanism;
        self
    }

    /// Set the login configuration name passed to password checks.
    pub fn login_context(mut self, name: impl Into<String>) -> AuthFilterBuilder {
        self.config.login_context = name.into();
        self
    }

    /// Whether Basic logins with an empty password reach the backend.
    ///
    /// Default is `true`.
    pub fn allow_empty_password(mut self, enabled: bool) -> AuthFilterBuilder {
        self.config.allow_empty_password = enabled;
        self
    }

    /// Redirect unauthorized requests to a login page instead of
    /// challenging them.
    ///
    /// A Negotiate handshake that needs another round is still challenged.
    pub fn login_redirect(mut self, location: impl Into<String>) -> AuthFilterBuilder {
        self.config.login_redirect = Some(location.into());
        self
    }

    /// Read the session id from this cookie when the request carries no
    /// [`SessionId`] extension.
    pub fn session_cookie(mut self, name: impl Into<String>) -> AuthFilterBuilder {
        self.config.session_cookie = Some(name.into());
        self
    }
}

impl fmt::Debug for AuthFilterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthFilterBuilder")
            .field("has_backend", &self.config.backend.is_some())
            .field("realm", &self.config.realm)
            .field("challenges", &self.config.challenges)
            .field("service_principal", &self.config.service_principal)
            .field("mechanism", &self.config.mechanism)
            .field("login_context", &self.config.login_context)
            .field("allow_empty_password", &self.config.allow_empty_password)
            .field("login_redirect", &self.config.login_redirect)
            .field("session_cookie", &self.config.session_cookie)
            .finish()
    }
}

/// What to do with a request.
#[derive(Debug)]
pub enum Decision {
    /// Pass the request on as `user`.
    Proceed {
        user: AuthenticatedUser,
        /// Mutual authentication token for the downstream response.
        mutual: Option<NegotiationToken>,
    },
    /// Answer `401` with the challenges for this authorizer.
    Challenge(Authorizer),
    /// Answer `302` to the login page.
    Redirect(HeaderValue),
    /// Answer `500`.
    Fault,
}

impl Decision {
    pub fn is_proceed(&self) -> bool {
        matches!(self, Decision::Proceed { .. })
    }
}

/// Result of [`AuthFilter::filter`].
#[derive(Debug)]
pub enum Filtered<B> {
    /// Forward the request. Append `mutual`, when present, to the
    /// downstream response as a `WWW-Authenticate` line.
    Proceed {
        request: Request<B>,
        mutual: Option<HeaderValue>,
    },
    /// Answer with this response head.
    Respond(ResponseHead),
}

/// Status and headers of a response that may already have been sent.
#[derive(Debug)]
pub struct ResponseHead {
    status: StatusCode,
    headers: HeaderMap,
    committed: bool,
}

impl ResponseHead {
    pub fn new() -> ResponseHead {
        ResponseHead {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            committed: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Whether the head was sent. A committed head is never written again.
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn commit(&mut self) {
        self.committed = true;
    }

    /// Build an empty-bodied response from this head.
    pub fn into_response<B: Default>(self) -> Response<B> {
        let mut response = Response::new(B::default());
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl Default for ResponseHead {
    fn default() -> Self {
        ResponseHead::new()
    }
}

impl AuthFilter {
    /// Creates a `AuthFilterBuilder` to configure an `AuthFilter`.
    ///
    /// This is the same as `AuthFilterBuilder::new()`.
    pub fn builder() -> AuthFilterBuilder {
        AuthFilterBuilder::new()
    }

    /// The challenges sent with `401` responses.
    pub fn challenges(&self) -> &ChallengeCatalog {
        &self.inner.catalog
    }

    /// The session identity cache shared by every clone of this filter.
    pub fn sessions(&self) -> &SessionIdentityCache {
        &self.inner.sessions
    }

    /// The session a request belongs to.
    ///
    /// A [`SessionId`] request extension wins over the session cookie.
    pub fn session_id<B>(&self, request: &Request<B>) -> Option<SessionId> {
        if let Some(id) = request.extensions().get::<SessionId>() {
            return Some(id.clone());
        }
        let name = self.inner.session_cookie.as_deref()?;
        session_cookie(request.headers(), name)
    }

    /// Decide what to do with a request, given its headers and session.
    pub fn decide(&self, headers: &HeaderMap, session: Option<&SessionId>) -> Decision {
        let session = session.map(|id| self.inner.sessions.session(id));

        if let Some(principal) = session.as_ref().and_then(|session| session.get()) {
            log::trace!("session cache hit for {}", principal);
            return Decision::Proceed {
                user: AuthenticatedUser::new(principal, None),
                mutual: None,
            };
        }

        let authorizer = match self.inner.router.route(headers, session.as_ref()) {
            Ok(authorizer) => authorizer,
            Err(err) => {
                log::error!("unable to authorize request: {:?}", err.error());
                return Decision::Fault;
            }
        };

        if !authorizer.is_authorized() {
            if authorizer.continuation_token().is_none() {
                if let Some(location) = &self.inner.login_redirect {
                    return Decision::Redirect(location.clone());
                }
            }
            return Decision::Challenge(authorizer);
        }

        let scheme = authorizer.authorization_type();
        let cached = authorizer.is_cached();
        let mutual = authorizer.mutual_token().cloned();

        let principal = match authorizer.into_principal() {
            Some(principal) => principal,
            None => {
                log::warn!("{} authorizer succeeded without a principal", scheme);
                return Decision::Fault;
            }
        };

        if let Some(session) = session.as_ref().filter(|_| !cached) {
            // a racing request may have filled the slot first; this request
            // still proceeds as the principal it verified
            session.put(principal.clone());
        }

        log::debug!("{} authorized {}", scheme, principal);
        Decision::Proceed {
            user: AuthenticatedUser::new(principal, Some(scheme)),
            mutual,
        }
    }

    /// Write the response for a decision that does not proceed.
    ///
    /// The head is committed afterwards. A head that is already committed is
    /// left alone.
    pub fn respond(&self, decision: &Decision, head: &mut ResponseHead) {
        if head.is_committed() {
            log::debug!("response already committed, leaving it alone");
            return;
        }

        match decision {
            Decision::Proceed { .. } => return,
            Decision::Challenge(authorizer) => {
                authorizer.prepare_unauthorized_response(&self.inner.catalog, head);
            }
            Decision::Redirect(location) => {
                head.set_status(StatusCode::FOUND);
                head.headers_mut().insert(LOCATION, location.clone());
            }
            Decision::Fault => head.set_status(StatusCode::INTERNAL_SERVER_ERROR),
        }
        head.commit();
    }

    /// Run the filter over a request.
    pub fn filter<B>(&self, mut request: Request<B>) -> Filtered<B> {
        let session = self.session_id(&request);

        match self.decide(request.headers(), session.as_ref()) {
            Decision::Proceed { user, mutual } => {
                request.extensions_mut().insert(user);
                let mutual = mutual.and_then(|token| {
                    match codec::authorization_header("Negotiate", &token) {
                        Ok(value) => Some(value),
                        Err(err) => {
                            log::warn!("dropping mutual authentication token: {}", err);
                            None
                        }
                    }
                });
                Filtered::Proceed { request, mutual }
            }
            decision => {
                let mut head = ResponseHead::new();
                self.respond(&decision, &mut head);
                Filtered::Respond(head)
            }
        }
    }

    /// End a session.
    ///
    /// Returns `403 Forbidden` when the session holds no principal. Otherwise
    /// the backend is told about the logout, the session is invalidated, and
    /// `200 OK` is returned.
    pub fn logout(&self, session: &SessionId) -> StatusCode {
        let principal = match self.inner.sessions.get(session) {
            Some(principal) => principal,
            None => {
                log::debug!("logout without a cached principal");
                return StatusCode::FORBIDDEN;
            }
        };

        self.inner.backend.logout(&principal);
        self.inner.sessions.invalidate(session);
        log::info!("logged out {}", principal);
        StatusCode::OK
    }
}

impl fmt::Debug for AuthFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthFilter")
            .field("router", &self.inner.router)
            .field("catalog", &self.inner.catalog)
            .field("login_redirect", &self.inner.login_redirect)
            .field("session_cookie", &self.inner.session_cookie)
            .finish()
    }
}

fn session_cookie(headers: &HeaderMap, name: &str) -> Option<SessionId> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(|cookie| match cookie {
            Ok(cookie) => Some(cookie),
            Err(err) => {
                log::trace!("skipping unparsable cookie: {}", err);
                None
            }
        })
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value_trimmed().to_owned())
        .filter(|value| !value.is_empty())
        .map(SessionId::new)
}
