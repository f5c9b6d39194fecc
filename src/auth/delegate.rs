// src/auth/delegate.rs

//! Acting as the authenticated client toward a second-tier service.

use std::sync::Arc;

use super::backend::IdentityBackend;
use super::codec::NegotiationToken;
use super::context::ContextGuard;
use super::{DelegatedCredential, Mechanism};
use crate::error::{self, Result};

/// Flags requested on the outbound context.
///
/// Must be chosen before the first token is generated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DelegationFlags {
    /// Ask the target to authenticate itself back.
    pub mutual_auth: bool,
    /// Allow the target to delegate further.
    pub credential_delegation: bool,
}

impl Default for DelegationFlags {
    fn default() -> Self {
        DelegationFlags {
            mutual_auth: true,
            credential_delegation: true,
        }
    }
}

/// Derive the Service Principal Name (SPN) from a URL.
///
/// For HTTP authentication, the SPN format is "HTTP/<hostname>".
///
/// # Examples
/// ```
/// # use negotiate_filter::auth::derive_spn;
/// let url = url::Url::parse("https://server.corp.com:8080/").unwrap();
/// assert_eq!(derive_spn(&url).unwrap(), "HTTP/server.corp.com");
/// ```
pub fn derive_spn(url: &url::Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| error::builder("URL has no host for SPN"))?;

    Ok(format!("HTTP/{}", host))
}

/// Mints first-round tokens for downstream services from a delegated
/// credential (constrained delegation).
#[derive(Clone)]
pub struct CredentialDelegator {
    backend: Arc<dyn IdentityBackend>,
    mechanism: Mechanism,
    flags: DelegationFlags,
}

impl CredentialDelegator {
    pub fn new(backend: Arc<dyn IdentityBackend>) -> Self {
        CredentialDelegator {
            backend,
            mechanism: Mechanism::default(),
            flags: DelegationFlags::default(),
        }
    }

    pub fn mechanism(mut self, mechanism: Mechanism) -> Self {
        self.mechanism = mechanism;
        self
    }

    pub fn mutual_auth(mut self, enabled: bool) -> Self {
        self.flags.mutual_auth = enabled;
        self
    }

    pub fn credential_delegation(mut self, enabled: bool) -> Self {
        self.flags.credential_delegation = enabled;
        self
    }

    pub fn flags(&self) -> DelegationFlags {
        self.flags
    }

    /// Produce the token a client would send to `target` on its first round.
    ///
    /// Fails with a `NoDelegatedCredential` error if `credential` is missing
    /// or empty. The outbound context is disposed before returning.
    pub fn delegate(
        &self,
        credential: Option<&DelegatedCredential>,
        target: &str,
    ) -> Result<NegotiationToken> {
        let credential = match credential {
            Some(credential) if !credential.is_empty() => credential,
            _ => return Err(error::no_delegated_credential()),
        };

        let context = self
            .backend
            .initiate_context(credential, target, self.mechanism, self.flags)?;
        let mut context = ContextGuard::new(context);

        let token = context.initiate(&[])?;
        log::debug!("minted {} byte token for {}", token.len(), target);

        Ok(NegotiationToken::from(token))
    }

    /// Like [`delegate`](Self::delegate), deriving the target SPN from a URL.
    pub fn delegate_to_url(
        &self,
        credential: Option<&DelegatedCredential>,
        url: &url::Url,
    ) -> Result<NegotiationToken> {
        let spn = derive_spn(url)?;
        self.delegate(credential, &spn)
    }
}

impl std::fmt::Debug for CredentialDelegator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialDelegator")
            .field("mechanism", &self.mechanism)
            .field("flags", &self.flags)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::backend::{AcceptContext, BackendError, InitiateContext};
    use crate::auth::Principal;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorded {
        targets: Vec<(String, DelegationFlags)>,
        disposals: usize,
    }

    struct Initiator(Arc<Mutex<Recorded>>);

    impl InitiateContext for Initiator {
        fn initiate(&mut self, token: &[u8]) -> std::result::Result<Vec<u8>, BackendError> {
            assert!(token.is_empty());
            Ok(b"\x60\x82first".to_vec())
        }

        fn dispose(&mut self) {
            self.0.lock().unwrap().disposals += 1;
        }
    }

    struct Backend(Arc<Mutex<Recorded>>);

    impl IdentityBackend for Backend {
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
            _user_id: &str,
            _password: &str,
        ) -> std::result::Result<Option<Principal>, BackendError> {
            Ok(None)
        }

        fn initiate_context(
            &self,
            _credential: &DelegatedCredential,
            target: &str,
            _mechanism: Mechanism,
            flags: DelegationFlags,
        ) -> std::result::Result<Box<dyn InitiateContext>, BackendError> {
            self.0.lock().unwrap().targets.push((target.to_owned(), flags));
            Ok(Box::new(Initiator(self.0.clone())))
        }
    }

    fn delegator() -> (CredentialDelegator, Arc<Mutex<Recorded>>) {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        (CredentialDelegator::new(Arc::new(Backend(recorded.clone()))), recorded)
    }

    #[test]
    fn test_derive_spn() {
        let url = url::Url::parse("http://example.com/path").unwrap();
        assert_eq!(derive_spn(&url).unwrap(), "HTTP/example.com");

        let url = url::Url::parse("https://server.corp.com:8080/api").unwrap();
        assert_eq!(derive_spn(&url).unwrap(), "HTTP/server.corp.com");
    }

    #[test]
    fn test_derive_spn_without_host() {
        let url = url::Url::parse("data:text/plain,hi").unwrap();
        assert!(derive_spn(&url).unwrap_err().is_builder());
    }

    #[test]
    fn test_delegate_requires_credential() {
        let (delegator, recorded) = delegator();

        let err = delegator.delegate(None, "HTTP/db.example.com").unwrap_err();
        assert!(err.is_no_delegated_credential());

        let empty = DelegatedCredential::new(Vec::new());
        let err = delegator.delegate(Some(&empty), "HTTP/db.example.com").unwrap_err();
        assert!(err.is_no_delegated_credential());

        assert!(recorded.lock().unwrap().targets.is_empty());
    }

    #[test]
    fn test_delegate_mints_token_and_disposes() {
        let (delegator, recorded) = delegator();
        let credential = DelegatedCredential::new(&b"tgt"[..]);

        let token = delegator.delegate(Some(&credential), "HTTP/db.example.com").unwrap();
        assert_eq!(token.as_bytes(), b"\x60\x82first");

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.targets[0].0, "HTTP/db.example.com");
        assert_eq!(recorded.targets[0].1, DelegationFlags::default());
        assert_eq!(recorded.disposals, 1);
    }

    #[test]
    fn test_delegate_to_url_with_flags() {
        let (delegator, recorded) = delegator();
        let delegator = delegator.mutual_auth(false).credential_delegation(false);
        let credential = DelegatedCredential::new(&b"tgt"[..]);
        let url = url::Url::parse("https://reports.corp.com/q").unwrap();

        delegator.delegate_to_url(Some(&credential), &url).unwrap();

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.targets[0].0, "HTTP/reports.corp.com");
        assert!(!recorded.targets[0].1.mutual_auth);
        assert!(!recorded.targets[0].1.credential_delegation);
    }
}
