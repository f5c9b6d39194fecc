// src/auth/codec.rs

//! Wire representation of negotiation tokens.
//!
//! An `Authorization` header value has the shape `<scheme> <payload>`, where
//! the payload is base64 text. Decoding splits on the first space and turns
//! the payload back into bytes; encoding is the reverse.

use std::fmt;

use base64::alphabet;
use base64::engine::{general_purpose, DecodePaddingMode, GeneralPurpose};
use base64::Engine as _;
use bytes::Bytes;
use http::HeaderValue;

use crate::error::{self, Result};

/// Padded on encode, padding optional on decode. Some clients strip `=`.
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    general_purpose::PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// An opaque token exchanged during a security handshake.
///
/// The raw bytes are never printed: `Debug` only reports the length.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct NegotiationToken(Bytes);

impl NegotiationToken {
    /// Wrap raw token bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        NegotiationToken(bytes.into())
    }

    /// An empty token.
    pub fn empty() -> Self {
        NegotiationToken(Bytes::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Transport encoding of this token.
    pub fn encode(&self) -> String {
        encode(&self.0)
    }
}

impl fmt::Debug for NegotiationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NegotiationToken({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for NegotiationToken {
    fn from(bytes: Vec<u8>) -> Self {
        NegotiationToken(Bytes::from(bytes))
    }
}

/// The result of decoding an `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderToken {
    /// The request carried no `Authorization` header.
    Absent,
    /// A scheme name and its decoded payload.
    Present {
        scheme: String,
        token: NegotiationToken,
    },
}

impl HeaderToken {
    pub fn token(&self) -> Option<&NegotiationToken> {
        match self {
            HeaderToken::Absent => None,
            HeaderToken::Present { token, .. } => Some(token),
        }
    }

    pub fn scheme(&self) -> Option<&str> {
        match self {
            HeaderToken::Absent => None,
            HeaderToken::Present { scheme, .. } => Some(scheme),
        }
    }
}

/// Split a header value into its scheme and decoded payload.
///
/// An absent header yields [`HeaderToken::Absent`]. A value without a space,
/// or whose payload is not valid base64, is a `MalformedHeader` error.
pub fn decode(header: Option<&str>) -> Result<HeaderToken> {
    let value = match header {
        Some(value) => value,
        None => return Ok(HeaderToken::Absent),
    };

    let (scheme, payload) = value
        .split_once(' ')
        .ok_or_else(|| error::malformed_header("Authorization header has no payload"))?;

    if scheme.is_empty() {
        return Err(error::malformed_header("Authorization header has no scheme"));
    }

    let bytes = TOKEN_ENGINE
        .decode(payload.trim())
        .map_err(error::malformed_header)?;

    Ok(HeaderToken::Present {
        scheme: scheme.to_owned(),
        token: NegotiationToken::from(bytes),
    })
}

/// Decode a raw header value, treating non-text values as malformed.
pub fn decode_header(header: Option<&HeaderValue>) -> Result<HeaderToken> {
    match header {
        Some(value) => {
            let text = value.to_str().map_err(error::malformed_header)?;
            decode(Some(text))
        }
        None => decode(None),
    }
}

/// Transport-encode token bytes. The empty sequence encodes to `""`.
pub fn encode(bytes: &[u8]) -> String {
    TOKEN_ENGINE.encode(bytes)
}

/// Render `<scheme> <base64 token>` as a header value.
///
/// A bare scheme is produced when the token is empty.
pub fn authorization_header(scheme: &str, token: &NegotiationToken) -> Result<HeaderValue> {
    let value = if token.is_empty() {
        scheme.to_owned()
    } else {
        format!("{} {}", scheme, token.encode())
    };

    HeaderValue::from_str(&value).map_err(error::builder)
}
