// src/auth/basic.rs

//! HTTP Basic authorization (RFC 7617).

use http::HeaderValue;

use super::authorizer::AuthorizationState;
use super::backend::IdentityBackend;
use super::codec;
use super::Principal;
use crate::error::Result;
use crate::session::Session;

/// Name of the login configuration handed to the backend by default.
pub const DEFAULT_LOGIN_CONTEXT: &str = "negotiate-filter.login";

/// Password-check settings.
#[derive(Clone, Debug)]
pub struct BasicConfig {
    /// Backend login configuration name.
    pub login_context: String,
    /// Attempt a login when the password is empty or missing, leaving the
    /// decision to the backend (service accounts without passwords). When
    /// disabled such requests are unauthorized without a backend call.
    pub allow_empty_password: bool,
}

impl Default for BasicConfig {
    fn default() -> Self {
        BasicConfig {
            login_context: DEFAULT_LOGIN_CONTEXT.to_owned(),
            allow_empty_password: true,
        }
    }
}

/// Authorizes a request carrying Basic credentials.
#[derive(Debug)]
pub struct BasicAuthorizer {
    state: AuthorizationState,
    principal: Option<Principal>,
    cached: bool,
}

impl BasicAuthorizer {
    /// Check the request's credentials.
    ///
    /// A principal already cached in `session` is reused without calling the
    /// backend. A newly verified principal is cached into `session`. Only a
    /// backend-unavailable fault is returned as an error.
    pub fn authorize(
        backend: &dyn IdentityBackend,
        config: &BasicConfig,
        header: Option<&HeaderValue>,
        session: Option<&Session<'_>>,
    ) -> Result<Self> {
        if let Some(principal) = session.and_then(|session| session.get()) {
            log::debug!("Basic: using cached principal {}", principal);
            return Ok(BasicAuthorizer {
                state: AuthorizationState::Authorized,
                principal: Some(principal),
                cached: true,
            });
        }

        let (user_id, password) = match decode_credentials(header) {
            Some(credentials) => credentials,
            None => return Ok(BasicAuthorizer::unauthorized()),
        };

        if user_id.is_empty() {
            log::debug!("Basic: user id is missing");
            return Ok(BasicAuthorizer::unauthorized());
        }

        if password.is_empty() && !config.allow_empty_password {
            log::debug!("Basic: empty password refused for {}", user_id);
            return Ok(BasicAuthorizer::unauthorized());
        }

        let principal = match backend.verify_password(&config.login_context, &user_id, &password) {
            Ok(principal) => principal,
            Err(err) if err.is_unavailable() => {
                log::error!("Problem verifying password: {:?}", err);
                return Err(err.into());
            }
            Err(err) => {
                log::info!("Basic login failed for {}: {}", user_id, err);
                None
            }
        };

        match principal {
            Some(principal) => {
                let cached = match session {
                    Some(session) => {
                        session.put(principal.clone());
                        true
                    }
                    None => false,
                };
                Ok(BasicAuthorizer {
                    state: AuthorizationState::Authorized,
                    principal: Some(principal),
                    cached,
                })
            }
            None => {
                log::debug!("Basic login rejected for {}", user_id);
                Ok(BasicAuthorizer::unauthorized())
            }
        }
    }

    fn unauthorized() -> Self {
        BasicAuthorizer {
            state: AuthorizationState::Unauthorized,
            principal: None,
            cached: false,
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

    /// Whether the principal is already held by the session.
    pub fn is_cached(&self) -> bool {
        self.cached
    }

    pub(crate) fn into_principal(self) -> Option<Principal> {
        self.principal
    }
}

/// Decode `<userId>:<password>`, splitting on the first colon.
///
/// A payload without a colon is a user id with an empty password.
fn decode_credentials(header: Option<&HeaderValue>) -> Option<(String, String)> {
    let decoded = match codec::decode_header(header) {
        Ok(decoded) => decoded,
        Err(err) => {
            log::debug!("Problem with Basic header: {}", err);
            return None;
        }
    };

    let bytes = decoded.token()?.as_bytes();
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            log::debug!("Basic credentials are not UTF-8: {}", err);
            return None;
        }
    };

    Some(match text.split_once(':') {
        Some((user_id, password)) => (user_id.to_owned(), password.to_owned()),
        None => (text.to_owned(), String::new()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::backend::{AcceptContext, BackendError, InitiateContext};
    use crate::auth::{DelegatedCredential, DelegationFlags, Mechanism};
    use crate::session::{MemorySessionStore, SessionId, SessionIdentityCache};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct PasswordBackend {
        accept_empty: bool,
        unavailable: bool,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl IdentityBackend for PasswordBackend {
        fn accept_context(
            &self,
            _mechanism: Mechanism,
            _service: Option<&str>,
        ) -> std::result::Result<Box<dyn AcceptContext>, BackendError> {
            Err(BackendError::unavailable("not used"))
        }

        fn verify_password(
            &self,
            _login_context: &str,
            user_id: &str,
            password: &str,
        ) -> std::result::Result<Option<Principal>, BackendError> {
            self.calls
                .lock()
                .unwrap()
                .push((user_id.to_owned(), password.to_owned()));
            if self.unavailable {
                return Err(BackendError::unavailable("directory down"));
            }
            let ok = (password.is_empty() && self.accept_empty) || password == "s3cret:with:colons";
            Ok(if ok { Some(Principal::new(user_id)) } else { None })
        }

        fn initiate_context(
            &self,
            _credential: &DelegatedCredential,
            _target: &str,
            _mechanism: Mechanism,
            _flags: DelegationFlags,
        ) -> std::result::Result<Box<dyn InitiateContext>, BackendError> {
            Err(BackendError::unavailable("not used"))
        }
    }

    fn basic(credentials: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Basic {}", codec::encode(credentials.as_bytes()))).unwrap()
    }

    #[test]
    fn test_empty_password_reaches_backend() {
        let backend = PasswordBackend {
            accept_empty: true,
            ..Default::default()
        };
        let config = BasicConfig::default();
        let authz =
            BasicAuthorizer::authorize(&backend, &config, Some(&basic("alice:")), None).unwrap();

        assert!(authz.is_authorized());
        assert_eq!(authz.principal().unwrap().name(), "alice");
        assert_eq!(backend.calls.lock().unwrap()[0], ("alice".to_owned(), String::new()));
    }

    #[test]
    fn test_missing_colon_means_empty_password() {
        let backend = PasswordBackend::default();
        let config = BasicConfig::default();
        let header = basic("svc-batch");
        let authz = BasicAuthorizer::authorize(&backend, &config, Some(&header), None).unwrap();

        assert!(!authz.is_authorized());
        assert_eq!(backend.calls.lock().unwrap()[0], ("svc-batch".to_owned(), String::new()));
    }

    #[test]
    fn test_empty_password_can_fail_fast() {
        let backend = PasswordBackend {
            accept_empty: true,
            ..Default::default()
        };
        let config = BasicConfig {
            allow_empty_password: false,
            ..Default::default()
        };
        let authz =
            BasicAuthorizer::authorize(&backend, &config, Some(&basic("alice:")), None).unwrap();

        assert!(!authz.is_authorized());
        assert!(backend.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_password_keeps_later_colons() {
        let backend = PasswordBackend::default();
        let header = basic("bob:s3cret:with:colons");
        let config = BasicConfig::default();
        let authz = BasicAuthorizer::authorize(&backend, &config, Some(&header), None).unwrap();

        assert!(authz.is_authorized());
    }

    #[test]
    fn test_empty_user_is_unauthorized() {
        let backend = PasswordBackend::default();
        let config = BasicConfig::default();
        let authz =
            BasicAuthorizer::authorize(&backend, &config, Some(&basic(":pw")), None).unwrap();

        assert!(!authz.is_authorized());
        assert!(backend.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_session_cache_hit_and_fill() {
        let backend = PasswordBackend {
            accept_empty: true,
            ..Default::default()
        };
        let cache = SessionIdentityCache::new(Arc::new(MemorySessionStore::new()));
        let id = SessionId::new("tab-1");
        let session = cache.session(&id);
        let config = BasicConfig::default();

        let header = basic("alice:");
        let first =
            BasicAuthorizer::authorize(&backend, &config, Some(&header), Some(&session)).unwrap();
        assert!(first.is_cached());
        assert_eq!(cache.get(&id).unwrap().name(), "alice");

        let second = BasicAuthorizer::authorize(&backend, &config, None, Some(&session)).unwrap();
        assert!(second.is_authorized());
        assert_eq!(backend.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_backend_unavailable_is_error() {
        let backend = PasswordBackend {
            unavailable: true,
            ..Default::default()
        };
        let config = BasicConfig::default();
        let err =
            BasicAuthorizer::authorize(&backend, &config, Some(&basic("a:b")), None).unwrap_err();
        assert!(err.is_backend_unavailable());
    }

    #[test]
    fn test_malformed_payload_is_unauthorized() {
        let backend = PasswordBackend::default();
        let header = HeaderValue::from_static("Basic ***");
        let config = BasicConfig::default();
        let authz = BasicAuthorizer::authorize(&backend, &config, Some(&header), None).unwrap();

        assert!(!authz.is_authorized());
    }
}
