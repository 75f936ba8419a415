//! Token minting and scan-payload codec.
//!
//! A [`Token`] is the opaque identifier of a single ticket and the only
//! credential needed to redeem it. Tokens are minted from a cryptographically
//! strong random source and are never interpreted beyond equality.
//!
//! The codec half of this module translates between a token and its external
//! scan representation: either a fully-qualified verification URL
//! (`<base_url>/verify?id=<token>`) or, for offline/LAN deployments, the bare
//! token itself. The payload carries only the token; holder data never
//! appears in a rendered image.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Opaque unique identifier for one ticket.
///
/// Minted once at issuance, immutable, used as the store's primary key and as
/// the sole content of the scan payload. Possession of the token is the only
/// credential needed to redeem the ticket, so tokens must be unguessable
/// (the default minter provides 122 bits of entropy).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Wrap an externally supplied token string.
    ///
    /// Leading/trailing whitespace is trimmed; no other normalization is
    /// applied since tokens are opaque.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self(raw.trim().to_string())
    }

    /// View the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A short prefix for log lines.
    ///
    /// The full token is a redemption credential: anyone who reads it can
    /// redeem the ticket, so it never goes to logs whole. Eight characters
    /// of a minted token are enough to correlate log lines without granting
    /// that capability.
    #[must_use]
    pub fn prefix(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of fresh tokens.
///
/// Abstracted behind a trait so tests can substitute a deliberately narrow
/// token space and force the store's collision handling.
pub trait TokenMinter: Send + Sync {
    /// Mint a fresh token.
    ///
    /// Collision probability must be negligible over the expected ticket
    /// volume; the store's primary-key constraint is the backstop, not a
    /// pre-insert uniqueness check.
    fn mint(&self) -> Token;
}

/// Default minter: hyphenated UUIDv4 strings (122 bits of entropy from the
/// OS random source).
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidMinter;

impl TokenMinter for UuidMinter {
    fn mint(&self) -> Token {
        Token(Uuid::new_v4().to_string())
    }
}

/// Errors produced when a scan payload cannot be resolved to a token.
///
/// These are user-facing "invalid code" failures and are never retried.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload was empty or whitespace-only.
    #[error("scan payload is empty")]
    Empty,

    /// The payload looked like a URL but used a scheme or path this system
    /// does not recognize.
    #[error("unrecognized scan payload scheme: {0}")]
    UnrecognizedScheme(String),

    /// The payload was a verification URL without an `id` parameter.
    #[error("scan payload is missing the token parameter")]
    MissingToken,

    /// The token carried by the payload contained characters a minted token
    /// never has (encoding noise, whitespace).
    #[error("malformed token in scan payload: {0}")]
    MalformedToken(String),
}

/// Encode a token into its scan payload: `<base_url>/verify?id=<token>`.
///
/// A trailing slash on `base_url` is tolerated. For offline deployments with
/// no base URL, use [`Token::as_str`] directly as the payload; the decoder
/// accepts both forms.
#[must_use]
pub fn encode_payload(token: &Token, base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    format!("{base}/verify?id={token}")
}

/// Decode a scan payload back into a token.
///
/// Accepts the verification-URL form produced by [`encode_payload`] and the
/// bare-token fallback used by offline/LAN deployments.
///
/// # Errors
///
/// Returns a [`DecodeError`] when the payload is empty, uses an unrecognized
/// URL scheme, lacks the `id` parameter, or carries a token with characters
/// no minted token contains.
pub fn decode_payload(payload: &str) -> Result<Token, DecodeError> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(DecodeError::Empty);
    }

    if let Some(scheme_end) = payload.find("://") {
        let scheme = &payload[..scheme_end];
        if scheme != "http" && scheme != "https" {
            return Err(DecodeError::UnrecognizedScheme(scheme.to_string()));
        }
        return decode_url(payload);
    }

    // Bare-token fallback.
    validate_token_chars(payload)?;
    Ok(Token::new(payload))
}

/// Decode the URL form: require a `verify` path segment and an `id` query
/// parameter with a non-empty value.
fn decode_url(url: &str) -> Result<Token, DecodeError> {
    let (location, query) = match url.split_once('?') {
        Some((location, query)) => (location, query),
        None => return Err(DecodeError::MissingToken),
    };

    if !location
        .trim_end_matches('/')
        .split('/')
        .any(|segment| segment == "verify")
    {
        return Err(DecodeError::UnrecognizedScheme(location.to_string()));
    }

    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key == "id" {
            if value.is_empty() {
                return Err(DecodeError::MissingToken);
            }
            validate_token_chars(value)?;
            return Ok(Token::new(value));
        }
    }

    Err(DecodeError::MissingToken)
}

/// Reject encoding noise a minted token never contains. Tokens are minted
/// URL-safe, so `%`-escapes, `+`, and whitespace all indicate a mangled scan.
fn validate_token_chars(raw: &str) -> Result<(), DecodeError> {
    if raw
        .chars()
        .any(|c| c.is_whitespace() || c == '%' || c == '+' || c == '&' || c == '?')
    {
        return Err(DecodeError::MalformedToken(raw.to_string()));
    }
    Ok(())
}
