// src/lib.rs

#![deny(missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # negotiate-filter
//!
//! Server-side HTTP authorization for `Negotiate` (Kerberos/SPNEGO, RFC 4559)
//! and `Basic` (RFC 7617), with a session identity cache and a tower layer.
//!
//! The Kerberos machinery itself is not part of this crate. It is reached
//! through an [`IdentityBackend`](auth::IdentityBackend), which accepts
//! security contexts, checks passwords, and initiates delegated contexts.
//!
//! ## Filtering requests
//!
//! Build an [`AuthFilter`] with a backend and wrap a service with
//! [`layer::AuthLayer`]:
//!
//! ```
//! # use std::sync::Arc;
//! # use negotiate_filter::{auth::IdentityBackend, AuthFilter};
//! # fn run(backend: Arc<dyn IdentityBackend>) -> negotiate_filter::Result<()> {
//! let filter = AuthFilter::builder()
//!     .backend(backend)
//!     .realm("Intranet")
//!     .session_cookie("SID")
//!     .build()?;
//! # let _ = filter;
//! # Ok(())
//! # }
//! ```
//!
//! Requests without credentials get `401 Unauthorized` with one
//! `WWW-Authenticate` line per advertised scheme:
//!
//! ```text
//! WWW-Authenticate: Negotiate
//! WWW-Authenticate: Basic realm="Intranet"
//! ```
//!
//! Authorized requests reach the inner service with an
//! [`AuthenticatedUser`](auth::AuthenticatedUser) extension.
//!
//! ## Delegation
//!
//! When a client delegates its credential, the principal carries it and a
//! [`CredentialDelegator`](auth::CredentialDelegator) can produce a token
//! to call another service as that user.
//!
//! ## Optional Features
//!
//! - **layer** *(enabled by default)*: tower `Layer`/`Service` adapter.

pub mod auth;
mod error;
pub mod filter;
#[cfg(feature = "layer")]
#[cfg_attr(docsrs, doc(cfg(feature = "layer")))]
pub mod layer;
pub mod session;

pub use self::error::{Error, Result};
pub use self::filter::{AuthFilter, AuthFilterBuilder, Decision, Filtered, ResponseHead};
pub use self::session::{MemorySessionStore, SessionId, SessionIdentityCache, SessionStore};
