//! RSA signature paths: PKCS#1 v1.5 and RSASSA-PSS
//!
//! PSS signing uses a salt the same length as the digest, matching the JOSE
//! requirement for the PS* algorithms.

use openssl::{
    hash::MessageDigest,
    pkey::Id,
    rsa::Padding,
    sign::{RsaPssSaltlen, Signer, Verifier},
};

use super::pkey;
use crate::{
    error::{self, Error},
    jwa::{Algorithm, Family},
    key::Key,
};

const RSA_IDS: &[Id] = &[Id::RSA, Id::RSA_PSS];

fn digest(algorithm: Algorithm) -> MessageDigest {
    match algorithm {
        Algorithm::RS256 | Algorithm::PS256 => MessageDigest::sha256(),
        Algorithm::RS384 | Algorithm::PS384 => MessageDigest::sha384(),
        Algorithm::RS512 | Algorithm::PS512 => MessageDigest::sha512(),
        _ => unreachable!("non-RSA algorithm dispatched to the RSA path"),
    }
}

fn configure_pss(
    signer: &mut Signer<'_>,
    algorithm: Algorithm,
) -> Result<(), openssl::error::ErrorStack> {
    if algorithm.family() == Family::RsaPss {
        signer.set_rsa_padding(Padding::PKCS1_PSS)?;
        signer.set_rsa_pss_saltlen(RsaPssSaltlen::DIGEST_LENGTH)?;
        signer.set_rsa_mgf1_md(digest(algorithm))?;
    }
    Ok(())
}

pub(crate) fn sign(algorithm: Algorithm, key: &Key, input: &[u8]) -> Result<Vec<u8>, Error> {
    let pkey = pkey::signing_key(key)?;
    pkey::expect_id(&pkey, RSA_IDS, "RSA")?;

    let mut signer = Signer::new(digest(algorithm), &pkey).map_err(error::sign_error)?;
    configure_pss(&mut signer, algorithm).map_err(error::sign_error)?;
    signer.sign_oneshot_to_vec(input).map_err(error::sign_error)
}

pub(crate) fn verify(
    algorithm: Algorithm,
    key: &Key,
    input: &[u8],
    signature: &[u8],
) -> Result<bool, Error> {
    let pkey = pkey::verification_key(key)?;
    pkey::expect_id(&pkey, RSA_IDS, "RSA")?;

    let mut verifier = Verifier::new(digest(algorithm), &pkey).map_err(error::verify_error)?;
    if algorithm.family() == Family::RsaPss {
        verifier
            .set_rsa_padding(Padding::PKCS1_PSS)
            .and_then(|()| verifier.set_rsa_pss_saltlen(RsaPssSaltlen::DIGEST_LENGTH))
            .and_then(|()| verifier.set_rsa_mgf1_md(digest(algorithm)))
            .map_err(error::verify_error)?;
    }

    // A structurally bad signature is a mismatch, not a failure
    Ok(verifier.verify_oneshot(signature, input).unwrap_or(false))
}
