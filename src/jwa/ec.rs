//! ECDSA signature paths
//!
//! openssl produces and consumes DER-encoded `ECDSA-Sig-Value` structures;
//! the wire format instead carries the fixed-width `r‖s` concatenation, with
//! each coordinate padded to the curve's field size. Both directions of that
//! re-encoding live here.

use openssl::{bn::BigNum, ecdsa::EcdsaSig, hash::MessageDigest, pkey::Id, sign::Verifier};

use super::pkey;
use crate::{
    error::{self, Error},
    jwa::Algorithm,
    key::Key,
};

fn digest(algorithm: Algorithm) -> MessageDigest {
    match algorithm {
        Algorithm::ES256 => MessageDigest::sha256(),
        Algorithm::ES384 => MessageDigest::sha384(),
        Algorithm::ES512 => MessageDigest::sha512(),
        _ => unreachable!("non-ECDSA algorithm dispatched to the ECDSA path"),
    }
}

/// Field size in bytes of the curve backing the algorithm
fn coordinate_size(algorithm: Algorithm) -> usize {
    match algorithm {
        Algorithm::ES256 => 32,
        Algorithm::ES384 => 48,
        Algorithm::ES512 => 66,
        _ => unreachable!("non-ECDSA algorithm dispatched to the ECDSA path"),
    }
}

fn der_to_fixed(der: &[u8], size: usize) -> Result<Vec<u8>, openssl::error::ErrorStack> {
    let sig = EcdsaSig::from_der(der)?;
    let mut out = sig.r().to_vec_padded(size as i32)?;
    out.extend(sig.s().to_vec_padded(size as i32)?);
    Ok(out)
}

fn fixed_to_der(fixed: &[u8], size: usize) -> Option<Vec<u8>> {
    if fixed.len() != size * 2 {
        return None;
    }
    let r = BigNum::from_slice(&fixed[..size]).ok()?;
    let s = BigNum::from_slice(&fixed[size..]).ok()?;
    EcdsaSig::from_private_components(r, s)
        .and_then(|sig| sig.to_der())
        .ok()
}

pub(crate) fn sign(algorithm: Algorithm, key: &Key, input: &[u8]) -> Result<Vec<u8>, Error> {
    let pkey = pkey::signing_key(key)?;
    pkey::expect_id(&pkey, &[Id::EC], "ECDSA")?;

    let mut signer =
        openssl::sign::Signer::new(digest(algorithm), &pkey).map_err(error::sign_error)?;
    let der = signer.sign_oneshot_to_vec(input).map_err(error::sign_error)?;
    der_to_fixed(&der, coordinate_size(algorithm)).map_err(error::sign_error)
}

pub(crate) fn verify(
    algorithm: Algorithm,
    key: &Key,
    input: &[u8],
    signature: &[u8],
) -> Result<bool, Error> {
    let pkey = pkey::verification_key(key)?;
    pkey::expect_id(&pkey, &[Id::EC], "ECDSA")?;

    // A signature of the wrong width or with unusable components can never
    // have been produced by this key
    let der = match fixed_to_der(signature, coordinate_size(algorithm)) {
        Some(der) => der,
        None => return Ok(false),
    };

    let mut verifier = Verifier::new(digest(algorithm), &pkey).map_err(error::verify_error)?;
    Ok(verifier.verify_oneshot(&der, input).unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test;

    fn round_trip(algorithm: Algorithm, private: &str, public: &str) {
        let private = Key::pem(private);
        let public = Key::pem(public);
        let sig = sign(algorithm, &private, b"message").unwrap();
        assert_eq!(sig.len(), coordinate_size(algorithm) * 2);
        assert!(verify(algorithm, &public, b"message", &sig).unwrap());
        assert!(!verify(algorithm, &public, b"other", &sig).unwrap());
    }

    #[test]
    fn es256_round_trip() {
        round_trip(Algorithm::ES256, test::ec::P256_PKCS8, test::ec::P256_PUBLIC);
    }

    #[test]
    fn es384_round_trip() {
        round_trip(Algorithm::ES384, test::ec::P384_PKCS8, test::ec::P384_PUBLIC);
    }

    #[test]
    fn es512_round_trip() {
        round_trip(Algorithm::ES512, test::ec::P521_PKCS8, test::ec::P521_PUBLIC);
    }

    #[test]
    fn sec1_encoded_private_key_signs() {
        round_trip(Algorithm::ES256, test::ec::P256_SEC1, test::ec::P256_PUBLIC);
    }

    #[test]
    fn encrypted_private_key_signs_with_its_passphrase() {
        let private = Key::pem_with_passphrase(test::ec::P256_ENCRYPTED, "secret");
        let public = Key::pem(test::ec::P256_PUBLIC);
        let sig = sign(Algorithm::ES256, &private, b"message").unwrap();
        assert!(verify(Algorithm::ES256, &public, b"message", &sig).unwrap());

        let wrong = Key::pem_with_passphrase(test::ec::P256_ENCRYPTED, "not it");
        assert_eq!(
            sign(Algorithm::ES256, &wrong, b"message").unwrap_err().code(),
            "signError"
        );
    }

    #[test]
    fn truncated_signature_is_a_mismatch() {
        let private = Key::pem(test::ec::P256_PKCS8);
        let public = Key::pem(test::ec::P256_PUBLIC);
        let sig = sign(Algorithm::ES256, &private, b"message").unwrap();
        assert!(!verify(Algorithm::ES256, &public, b"message", &sig[..63]).unwrap());
    }
}
