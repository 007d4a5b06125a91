//! EdDSA signature paths (Ed25519 and Ed448)
//!
//! Edwards-curve keys fix their own digest, so signing goes through
//! openssl's one-shot interface without a message digest.

use openssl::{pkey::Id, sign::Verifier};

use super::pkey;
use crate::{
    error::{self, Error},
    key::Key,
};

const EDWARDS_IDS: &[Id] = &[Id::ED25519, Id::ED448];

pub(crate) fn sign(key: &Key, input: &[u8]) -> Result<Vec<u8>, Error> {
    let pkey = pkey::signing_key(key)?;
    pkey::expect_id(&pkey, EDWARDS_IDS, "EdDSA")?;

    let mut signer = openssl::sign::Signer::new_without_digest(&pkey).map_err(error::sign_error)?;
    signer.sign_oneshot_to_vec(input).map_err(error::sign_error)
}

pub(crate) fn verify(key: &Key, input: &[u8], signature: &[u8]) -> Result<bool, Error> {
    let pkey = pkey::verification_key(key)?;
    pkey::expect_id(&pkey, EDWARDS_IDS, "EdDSA")?;

    let mut verifier = Verifier::new_without_digest(&pkey).map_err(error::verify_error)?;
    Ok(verifier.verify_oneshot(signature, input).unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test;

    #[test]
    fn ed25519_round_trip() {
        let private = Key::pem(test::okp::ED25519);
        let public = Key::pem(test::okp::ED25519_PUBLIC);
        let sig = sign(&private, b"message").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(verify(&public, b"message", &sig).unwrap());
        assert!(!verify(&public, b"other", &sig).unwrap());
    }

    #[test]
    fn ed448_round_trip() {
        let private = Key::pem(test::okp::ED448);
        let public = Key::pem(test::okp::ED448_PUBLIC);
        let sig = sign(&private, b"message").unwrap();
        assert_eq!(sig.len(), 114);
        assert!(verify(&public, b"message", &sig).unwrap());
    }

    #[test]
    fn hmac_secret_is_rejected() {
        let key = Key::secret(b"secret".to_vec());
        let err = sign(&key, b"message").unwrap_err();
        assert_eq!(err.code(), "invalidKey");
    }
}
