//! Common errors
//!
//! Every failure surfaced by this crate is an [`Error`] carrying a stable
//! [`ErrorKind`] that consumers may branch on, a human-readable message, and,
//! when the failure originated in an underlying primitive (cryptography,
//! parsing, secret resolution), the wrapped original error.

use std::{error::Error as StdError, fmt, sync::Arc};

use thiserror::Error;

/// The closed set of failure kinds
///
/// Each kind maps to a stable string code via [`ErrorKind::code`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The input value has an unusable type or shape
    InvalidType,
    /// A configuration option is invalid
    InvalidOption,
    /// The algorithm is unknown, or not usable with the given key
    InvalidAlgorithm,
    /// A claim is present but has the wrong JSON type
    InvalidClaimType,
    /// A claim value is outside the configured allow-list
    InvalidClaimValue,
    /// The key material is unusable
    InvalidKey,
    /// The token signature does not match
    InvalidSignature,
    /// The token structure cannot be parsed
    Malformed,
    /// The token carries no signature but a key was provided
    MissingSignature,
    /// The token carries a signature but no key resolved
    MissingSecret,
    /// The token is not yet valid
    Inactive,
    /// The token has expired
    Expired,
    /// The key resolver failed
    SecretFetching,
    /// Signature creation failed in the underlying primitive
    Sign,
    /// Signature verification failed in the underlying primitive
    Verify,
}

impl ErrorKind {
    /// The stable string code for this kind
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidType => "invalidType",
            Self::InvalidOption => "invalidOption",
            Self::InvalidAlgorithm => "invalidAlgorithm",
            Self::InvalidClaimType => "invalidClaimType",
            Self::InvalidClaimValue => "invalidClaimValue",
            Self::InvalidKey => "invalidKey",
            Self::InvalidSignature => "invalidSignature",
            Self::Malformed => "malformed",
            Self::MissingSignature => "missingSignature",
            Self::MissingSecret => "missingSecret",
            Self::Inactive => "inactive",
            Self::Expired => "expired",
            Self::SecretFetching => "secretFetchingError",
            Self::Sign => "signError",
            Self::Verify => "verifyError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// An error raised while signing, verifying, or decoding a token
///
/// The wrapped source is reference-counted so that errors can be held in the
/// detection and verification caches and re-thrown on later lookups.
#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn wrapped(
        kind: ErrorKind,
        message: impl Into<String>,
        source: Arc<dyn StdError + Send + Sync + 'static>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(source),
        }
    }

    /// The kind of failure
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The stable string code for this error
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// The underlying error this one wraps, if any
    #[must_use]
    pub fn original_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }
}

#[inline]
pub(crate) fn invalid_type(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidType, message)
}

#[inline]
pub(crate) fn invalid_option(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidOption, message)
}

#[inline]
pub(crate) fn invalid_algorithm(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidAlgorithm, message)
}

#[inline]
pub(crate) fn invalid_claim_type(claim: &str) -> Error {
    Error::new(
        ErrorKind::InvalidClaimType,
        format!("the {claim} claim must be a {}", date_or_string(claim)),
    )
}

fn date_or_string(claim: &str) -> &'static str {
    match claim {
        "exp" | "nbf" | "iat" => "number",
        "aud" => "string or an array of strings",
        _ => "string",
    }
}

#[inline]
pub(crate) fn invalid_claim_value(claim: &str) -> Error {
    Error::new(
        ErrorKind::InvalidClaimValue,
        format!("the {claim} claim value is not allowed"),
    )
}

#[inline]
pub(crate) fn invalid_key(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidKey, message)
}

#[inline]
pub(crate) fn invalid_signature() -> Error {
    Error::new(ErrorKind::InvalidSignature, "the token signature is invalid")
}

#[inline]
pub(crate) fn malformed(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::Malformed, message)
}

#[inline]
pub(crate) fn malformed_wrapped(
    message: impl Into<String>,
    source: impl StdError + Send + Sync + 'static,
) -> Error {
    Error::wrapped(ErrorKind::Malformed, message, Arc::new(source))
}

#[inline]
pub(crate) fn missing_signature() -> Error {
    Error::new(
        ErrorKind::MissingSignature,
        "the token signature is missing",
    )
}

#[inline]
pub(crate) fn missing_secret() -> Error {
    Error::new(ErrorKind::MissingSecret, "no key was resolved for the token")
}

#[inline]
pub(crate) fn inactive(boundary: impl fmt::Display) -> Error {
    Error::new(
        ErrorKind::Inactive,
        format!("the token will be active at {boundary}"),
    )
}

#[inline]
pub(crate) fn expired(boundary: impl fmt::Display) -> Error {
    Error::new(ErrorKind::Expired, format!("the token has expired at {boundary}"))
}

/// Wraps a resolver failure, preserving an [`Error`] untouched.
pub(crate) fn secret_fetching(source: Box<dyn StdError + Send + Sync + 'static>) -> Error {
    match source.downcast::<Error>() {
        Ok(err) => *err,
        Err(source) => Error::wrapped(
            ErrorKind::SecretFetching,
            "failed to fetch the signing or verification key",
            Arc::from(source),
        ),
    }
}

#[inline]
pub(crate) fn sign_error(
    source: impl StdError + Send + Sync + 'static,
) -> Error {
    Error::wrapped(
        ErrorKind::Sign,
        "failed to create the token signature",
        Arc::new(source),
    )
}

#[inline]
pub(crate) fn verify_error(
    source: impl StdError + Send + Sync + 'static,
) -> Error {
    Error::wrapped(
        ErrorKind::Verify,
        "failed to verify the token signature",
        Arc::new(source),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ErrorKind::Malformed.code(), "malformed");
        assert_eq!(ErrorKind::SecretFetching.code(), "secretFetchingError");
        assert_eq!(invalid_signature().code(), "invalidSignature");
    }

    #[test]
    fn secret_fetching_preserves_token_errors() {
        let inner = invalid_key("bad key");
        let wrapped = secret_fetching(Box::new(inner));
        assert_eq!(wrapped.kind(), ErrorKind::InvalidKey);

        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let wrapped = secret_fetching(Box::new(io));
        assert_eq!(wrapped.kind(), ErrorKind::SecretFetching);
        assert!(wrapped.original_error().is_some());
    }
}
