//! Error types for the defra-id crate.
//!
//! - `TokenDecodeError`: failures decoding a JWT payload into claims
//! - `ProfileError`: failures turning decoded claims into a user profile

use std::fmt;

/// Errors from decoding a JWT payload into identity claims.
///
/// Decoding here is payload extraction only; signature verification is the
/// responsibility of the OAuth2 provider exchange upstream of this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenDecodeError {
    /// The token does not have the three dot-separated JWT segments.
    MalformedToken { segments: usize },
    /// The payload segment is not valid base64url.
    InvalidEncoding { reason: String },
    /// The decoded payload is not the expected JSON claims shape.
    InvalidPayload { reason: String },
}

impl fmt::Display for TokenDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedToken { segments } => {
                write!(f, "malformed token: expected 3 segments, found {segments}")
            }
            Self::InvalidEncoding { reason } => {
                write!(f, "token payload is not valid base64url: {reason}")
            }
            Self::InvalidPayload { reason } => {
                write!(f, "token payload is not a valid claims document: {reason}")
            }
        }
    }
}

impl std::error::Error for TokenDecodeError {}

/// Errors from resolving a user profile out of decoded claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    /// No display name could be derived from the available claims.
    MissingDisplayName,
    /// A claim required to build the session record was absent.
    MissingClaim { claim: String },
    /// The token response lacked a field required to build the session record.
    MissingTokenField { field: String },
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDisplayName => {
                write!(f, "no display name could be derived from the claims")
            }
            Self::MissingClaim { claim } => {
                write!(f, "missing required claim: {claim}")
            }
            Self::MissingTokenField { field } => {
                write!(f, "token response missing required field: {field}")
            }
        }
    }
}

impl std::error::Error for ProfileError {}
