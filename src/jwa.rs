//! Signing algorithms and the signature engine
//!
//! [`sign`] and [`verify`] are pure functions over explicit inputs so the
//! identical code runs in-process and on worker threads. The HMAC family is
//! backed by `ring` (constant-time verification); the RSA, ECDSA, and EdDSA
//! families are backed by `openssl`, which covers every curve this crate
//! supports.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    error::{self, Error},
    key::Key,
};

pub(crate) mod ec;
pub(crate) mod hmac;
pub(crate) mod okp;
mod pkey;
pub(crate) mod rsa;

/// A token signing algorithm
///
/// The first letter of the wire name selects the signature family; `EdDSA`
/// carries no bit-length suffix because the digest is fixed by the curve.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::upper_case_acronyms)]
#[non_exhaustive]
pub enum Algorithm {
    /// Unsecured: no signature
    #[serde(rename = "none")]
    None,
    /// HMAC using SHA-256
    HS256,
    /// HMAC using SHA-384
    HS384,
    /// HMAC using SHA-512
    HS512,
    /// RSA PKCS#1 v1.5 using SHA-256
    RS256,
    /// RSA PKCS#1 v1.5 using SHA-384
    RS384,
    /// RSA PKCS#1 v1.5 using SHA-512
    RS512,
    /// RSASSA-PSS using SHA-256
    PS256,
    /// RSASSA-PSS using SHA-384
    PS384,
    /// RSASSA-PSS using SHA-512
    PS512,
    /// ECDSA using P-256 and SHA-256
    ES256,
    /// ECDSA using P-384 and SHA-384
    ES384,
    /// ECDSA using P-521 and SHA-512
    ES512,
    /// Edwards-curve signatures (Ed25519 or Ed448)
    EdDSA,
}

/// The signature family an algorithm belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Family {
    /// No signature
    None,
    /// HMAC shared-secret signatures
    Hmac,
    /// RSA PKCS#1 v1.5 signatures
    Rsa,
    /// RSASSA-PSS signatures
    RsaPss,
    /// ECDSA signatures
    EllipticCurve,
    /// Edwards-curve signatures
    Eddsa,
}

impl Algorithm {
    /// All members of the HMAC family
    pub const HMAC: [Algorithm; 3] = [Self::HS256, Self::HS384, Self::HS512];

    /// All RSA algorithms a single RSA key can participate in
    pub const RSA: [Algorithm; 6] = [
        Self::RS256,
        Self::RS384,
        Self::RS512,
        Self::PS256,
        Self::PS384,
        Self::PS512,
    ];

    /// The signature family this algorithm belongs to
    #[must_use]
    pub const fn family(self) -> Family {
        match self {
            Self::None => Family::None,
            Self::HS256 | Self::HS384 | Self::HS512 => Family::Hmac,
            Self::RS256 | Self::RS384 | Self::RS512 => Family::Rsa,
            Self::PS256 | Self::PS384 | Self::PS512 => Family::RsaPss,
            Self::ES256 | Self::ES384 | Self::ES512 => Family::EllipticCurve,
            Self::EdDSA => Family::Eddsa,
        }
    }

    /// The wire name of the algorithm
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::PS256 => "PS256",
            Self::PS384 => "PS384",
            Self::PS512 => "PS512",
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
            Self::ES512 => "ES512",
            Self::EdDSA => "EdDSA",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "HS256" => Ok(Self::HS256),
            "HS384" => Ok(Self::HS384),
            "HS512" => Ok(Self::HS512),
            "RS256" => Ok(Self::RS256),
            "RS384" => Ok(Self::RS384),
            "RS512" => Ok(Self::RS512),
            "PS256" => Ok(Self::PS256),
            "PS384" => Ok(Self::PS384),
            "PS512" => Ok(Self::PS512),
            "ES256" => Ok(Self::ES256),
            "ES384" => Ok(Self::ES384),
            "ES512" => Ok(Self::ES512),
            "EdDSA" => Ok(Self::EdDSA),
            other => Err(error::invalid_algorithm(format!(
                "'{other}' does not match any supported algorithm"
            ))),
        }
    }
}

/// Signs `input` with `key` using `algorithm`, producing raw signature bytes.
///
/// ECDSA signatures are re-encoded from DER to the fixed-width `r‖s` form
/// used on the wire. `Algorithm::None` produces an empty signature.
///
/// # Errors
///
/// Returns an `invalidKey` error when the key's shape does not fit the
/// algorithm family, and a `signError` wrapping the underlying failure when
/// the cryptographic primitive rejects the operation.
pub fn sign(algorithm: Algorithm, key: &Key, input: &[u8]) -> Result<Vec<u8>, Error> {
    match algorithm.family() {
        Family::None => Ok(Vec::new()),
        Family::Hmac => hmac::sign(algorithm, key, input),
        Family::Rsa | Family::RsaPss => rsa::sign(algorithm, key, input),
        Family::EllipticCurve => ec::sign(algorithm, key, input),
        Family::Eddsa => okp::sign(key, input),
    }
}

/// Verifies `signature` over `input` with `key` using `algorithm`.
///
/// A mismatching signature yields `Ok(false)`; only failures of the
/// underlying primitive (unusable key, wrong key family) produce errors.
/// `Algorithm::None` verifies exactly the empty signature.
///
/// # Errors
///
/// Returns an `invalidKey` error when the key's shape does not fit the
/// algorithm family, and a `verifyError` when the key cannot be loaded.
pub fn verify(
    algorithm: Algorithm,
    key: &Key,
    input: &[u8],
    signature: &[u8],
) -> Result<bool, Error> {
    match algorithm.family() {
        Family::None => Ok(signature.is_empty()),
        Family::Hmac => hmac::verify(algorithm, key, input, signature),
        Family::Rsa | Family::RsaPss => rsa::verify(algorithm, key, input, signature),
        Family::EllipticCurve => ec::verify(algorithm, key, input, signature),
        Family::Eddsa => okp::verify(key, input, signature),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for alg in [
            Algorithm::None,
            Algorithm::HS384,
            Algorithm::PS512,
            Algorithm::ES512,
            Algorithm::EdDSA,
        ] {
            assert_eq!(alg.name().parse::<Algorithm>().unwrap(), alg);
        }
        assert!("HS123".parse::<Algorithm>().is_err());
    }

    #[test]
    fn serde_uses_wire_names() {
        assert_eq!(serde_json::to_string(&Algorithm::None).unwrap(), "\"none\"");
        assert_eq!(
            serde_json::to_string(&Algorithm::EdDSA).unwrap(),
            "\"EdDSA\""
        );
        let alg: Algorithm = serde_json::from_str("\"ES384\"").unwrap();
        assert_eq!(alg, Algorithm::ES384);
    }

    #[test]
    fn none_signs_to_empty_and_verifies_only_empty() {
        let key = Key::secret(b"unused".to_vec());
        assert!(sign(Algorithm::None, &key, b"x").unwrap().is_empty());
        assert!(verify(Algorithm::None, &key, b"x", b"").unwrap());
        assert!(!verify(Algorithm::None, &key, b"x", b"sig").unwrap());
    }
}
