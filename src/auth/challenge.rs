// src/auth/challenge.rs

use std::fmt;

use http::header::WWW_AUTHENTICATE;
use http::{HeaderMap, HeaderValue};

use super::codec::NegotiationToken;
use crate::error::{self, Result};

/// Realm advertised in the Basic challenge unless configured otherwise.
pub const DEFAULT_REALM: &str = "Negotiate-Filter";

/// One authentication scheme offered in a `401` response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Challenge {
    /// `Negotiate`
    Negotiate,
    /// `Negotiate <token>`, sent when the handshake needs another round or
    /// to complete mutual authentication.
    NegotiateContinue(NegotiationToken),
    /// `Basic realm="<realm>"`
    Basic { realm: String },
}

impl Challenge {
    pub fn basic(realm: impl Into<String>) -> Self {
        Challenge::Basic {
            realm: realm.into(),
        }
    }

    /// The scheme name, as it appears first in the header value.
    pub fn scheme(&self) -> &'static str {
        match self {
            Challenge::Negotiate | Challenge::NegotiateContinue(_) => "Negotiate",
            Challenge::Basic { .. } => "Basic",
        }
    }

    /// Render as a `WWW-Authenticate` header value.
    pub fn to_header_value(&self) -> Result<HeaderValue> {
        match self {
            Challenge::Negotiate => Ok(HeaderValue::from_static("Negotiate")),
            _ => HeaderValue::from_str(&self.to_string()).map_err(error::builder),
        }
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Challenge::Negotiate => f.write_str("Negotiate"),
            Challenge::NegotiateContinue(token) => write!(f, "Negotiate {}", token.encode()),
            Challenge::Basic { realm } => write!(f, "Basic realm=\"{}\"", realm),
        }
    }
}

/// The ordered, fixed set of challenges this server advertises.
///
/// Header values are rendered once, when the catalog is built, so every
/// unauthorized response carries the same lines in the same order.
#[derive(Clone, Debug)]
pub struct ChallengeCatalog {
    challenges: Vec<Challenge>,
    rendered: Vec<HeaderValue>,
}

impl ChallengeCatalog {
    /// Build a catalog. Fails if it is empty, or if a challenge cannot be a
    /// header value, e.g. a realm containing a newline.
    pub fn new(challenges: Vec<Challenge>) -> Result<Self> {
        if challenges.is_empty() {
            return Err(error::builder("at least one challenge is required"));
        }

        let rendered = challenges
            .iter()
            .map(Challenge::to_header_value)
            .collect::<Result<Vec<_>>>()?;

        Ok(ChallengeCatalog {
            challenges,
            rendered,
        })
    }

    /// `Negotiate` followed by `Basic realm="<realm>"`.
    pub fn with_realm(realm: &str) -> Result<Self> {
        ChallengeCatalog::new(vec![Challenge::Negotiate, Challenge::basic(realm)])
    }

    pub fn challenges(&self) -> &[Challenge] {
        &self.challenges
    }

    /// The header values, in catalog order.
    pub fn render(&self) -> &[HeaderValue] {
        &self.rendered
    }

    /// Append one `WWW-Authenticate` line per challenge.
    ///
    /// With a continuation token, the bare `Negotiate` entry is replaced by
    /// `Negotiate <token>` so the client can run the next round.
    pub fn apply(&self, headers: &mut HeaderMap, continuation: Option<&NegotiationToken>) {
        let continuation = continuation
            .filter(|token| !token.is_empty())
            .and_then(|token| {
                Challenge::NegotiateContinue(token.clone())
                    .to_header_value()
                    .ok()
            });

        for (challenge, value) in self.challenges.iter().zip(&self.rendered) {
            match (challenge, &continuation) {
                (Challenge::Negotiate, Some(next)) => {
                    headers.append(WWW_AUTHENTICATE, next.clone());
                }
                _ => {
                    headers.append(WWW_AUTHENTICATE, value.clone());
                }
            }
        }
    }
}

impl Default for ChallengeCatalog {
    fn default() -> Self {
        ChallengeCatalog {
            challenges: vec![Challenge::Negotiate, Challenge::basic(DEFAULT_REALM)],
            rendered: vec![
                HeaderValue::from_static("Negotiate"),
                HeaderValue::from_static("Basic realm=\"Negotiate-Filter\""),
            ],
        }
    }
}
