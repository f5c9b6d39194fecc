// tests/support/mod.rs

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue};
use negotiate_filter::auth::{
    codec, AcceptContext, BackendError, DelegatedCredential, DelegationFlags, IdentityBackend,
    InitiateContext, Mechanism, Principal,
};

/// Client token that establishes a context for `alice@EXAMPLE.COM`.
pub const ALICE_TICKET: &[u8] = b"alice-ticket";
/// Establishes for `bob@EXAMPLE.COM` and answers with a mutual auth token.
pub const MUTUAL_TICKET: &[u8] = b"mutual-ticket";
pub const MUTUAL_REPLY: &[u8] = b"server-proof";
/// Establishes for `carol@EXAMPLE.COM` with a delegated credential.
pub const DELEGATING_TICKET: &[u8] = b"delegating-ticket";
pub const CAROL_TGT: &[u8] = b"carol-tgt";
/// First leg of a two-round handshake.
pub const STEP_ONE: &[u8] = b"step-one";
pub const STEP_TWO: &[u8] = b"step-two";

/// An in-memory stand-in for a KDC and password directory.
#[derive(Default)]
pub struct MockBackend {
    pub accept_empty_password: bool,
    pub unavailable: bool,
    pub barrier: Option<Arc<Barrier>>,
    pub opened: AtomicUsize,
    pub disposed: Arc<AtomicUsize>,
    pub password_checks: AtomicUsize,
    pub logouts: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> MockBackend {
        MockBackend::default()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

struct MockAccept {
    established: bool,
    name: Option<&'static str>,
    credential: Option<&'static [u8]>,
    barrier: Option<Arc<Barrier>>,
    disposed: Arc<AtomicUsize>,
}

impl AcceptContext for MockAccept {
    fn accept(&mut self, token: &[u8]) -> Result<Vec<u8>, BackendError> {
        if let Some(barrier) = &self.barrier {
            barrier.wait();
        }
        match token {
            t if t == ALICE_TICKET => {
                self.established = true;
                self.name = Some("alice@EXAMPLE.COM");
                Ok(Vec::new())
            }
            t if t == MUTUAL_TICKET => {
                self.established = true;
                self.name = Some("bob@EXAMPLE.COM");
                Ok(MUTUAL_REPLY.to_vec())
            }
            t if t == DELEGATING_TICKET => {
                self.established = true;
                self.name = Some("carol@EXAMPLE.COM");
                self.credential = Some(CAROL_TGT);
                Ok(Vec::new())
            }
            t if t == STEP_ONE => Ok(STEP_TWO.to_vec()),
            _ => Err(BackendError::invalid_token("defective token")),
        }
    }

    fn is_established(&self) -> bool {
        self.established
    }

    fn delegation_granted(&self) -> bool {
        self.credential.is_some()
    }

    fn source_name(&self) -> Option<String> {
        self.name.map(str::to_owned)
    }

    fn delegated_credential(&self) -> Option<DelegatedCredential> {
        self.credential.map(DelegatedCredential::new)
    }

    fn dispose(&mut self) {
        self.disposed.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockInitiate {
    target: String,
    disposed: Arc<AtomicUsize>,
}

impl InitiateContext for MockInitiate {
    fn initiate(&mut self, _token: &[u8]) -> Result<Vec<u8>, BackendError> {
        Ok(format!("ticket-for:{}", self.target).into_bytes())
    }

    fn dispose(&mut self) {
        self.disposed.fetch_add(1, Ordering::SeqCst);
    }
}

impl IdentityBackend for MockBackend {
    fn accept_context(
        &self,
        _mechanism: Mechanism,
        _service: Option<&str>,
    ) -> Result<Box<dyn AcceptContext>, BackendError> {
        if self.unavailable {
            return Err(BackendError::unavailable("keytab missing"));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockAccept {
            established: false,
            name: None,
            credential: None,
            barrier: self.barrier.clone(),
            disposed: self.disposed.clone(),
        }))
    }

    fn verify_password(
        &self,
        _login_context: &str,
        user_id: &str,
        password: &str,
    ) -> Result<Option<Principal>, BackendError> {
        self.password_checks.fetch_add(1, Ordering::SeqCst);
        if let Some(barrier) = &self.barrier {
            barrier.wait();
        }
        if self.unavailable {
            return Err(BackendError::unavailable("directory unreachable"));
        }
        let ok = match (user_id, password) {
            ("alice", "") => self.accept_empty_password,
            ("bob", "hunter2") => true,
            _ => false,
        };
        Ok(if ok {
            Some(Principal::new(format!("{}@EXAMPLE.COM", user_id)))
        } else {
            None
        })
    }

    fn initiate_context(
        &self,
        credential: &DelegatedCredential,
        target: &str,
        _mechanism: Mechanism,
        _flags: DelegationFlags,
    ) -> Result<Box<dyn InitiateContext>, BackendError> {
        if credential.as_bytes() != CAROL_TGT {
            return Err(BackendError::rejected("unknown credential"));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockInitiate {
            target: target.to_owned(),
            disposed: self.disposed.clone(),
        }))
    }

    fn logout(&self, _principal: &Principal) {
        self.logouts.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn negotiate(token: &[u8]) -> HeaderValue {
    HeaderValue::from_str(&format!("Negotiate {}", codec::encode(token))).unwrap()
}

pub fn basic(credentials: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Basic {}", codec::encode(credentials.as_bytes()))).unwrap()
}

pub fn headers(authorization: HeaderValue) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, authorization);
    headers
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
