//! Shared openssl key loading for the asymmetric signature paths

use openssl::pkey::{Id, PKey, Private, Public};

use crate::{
    error::{self, Error},
    key::Key,
};

fn pem_bytes(key: &Key) -> Result<(&[u8], Option<&str>), Error> {
    match key {
        Key::Pem { pem, passphrase } => Ok((pem.as_bytes(), passphrase.as_deref())),
        Key::Secret(_) => Err(error::invalid_key(
            "asymmetric algorithms require a PEM key, not a raw secret",
        )),
    }
}

/// Loads a private key for signing.
pub(crate) fn signing_key(key: &Key) -> Result<PKey<Private>, Error> {
    let (pem, passphrase) = pem_bytes(key)?;
    let loaded = match passphrase {
        Some(pass) => PKey::private_key_from_pem_passphrase(pem, pass.as_bytes()),
        None => PKey::private_key_from_pem(pem),
    };
    loaded.map_err(error::sign_error)
}

/// Loads a key for verification, accepting either a public PEM or a private
/// PEM (from which the public half is taken).
pub(crate) fn verification_key(key: &Key) -> Result<PKey<Public>, Error> {
    let (pem, passphrase) = pem_bytes(key)?;
    let text = std::str::from_utf8(pem).map_err(|_| error::invalid_key("key is not valid UTF-8"))?;

    if text.contains("PRIVATE KEY-----") {
        let private = match passphrase {
            Some(pass) => PKey::private_key_from_pem_passphrase(pem, pass.as_bytes()),
            None => PKey::private_key_from_pem(pem),
        }
        .map_err(error::verify_error)?;
        let public_pem = private.public_key_to_pem().map_err(error::verify_error)?;
        PKey::public_key_from_pem(&public_pem).map_err(error::verify_error)
    } else if text.contains("-----BEGIN RSA PUBLIC KEY-----") {
        let rsa = openssl::rsa::Rsa::public_key_from_pem_pkcs1(pem).map_err(error::verify_error)?;
        PKey::from_rsa(rsa).map_err(error::verify_error)
    } else {
        PKey::public_key_from_pem(pem).map_err(error::verify_error)
    }
}

/// Rejects keys whose type does not fit the dispatched algorithm family.
pub(crate) fn expect_id<T>(pkey: &PKey<T>, expected: &[Id], family: &str) -> Result<(), Error> {
    if expected.contains(&pkey.id()) {
        Ok(())
    } else {
        Err(error::invalid_key(format!(
            "the provided key cannot be used with {family} algorithms"
        )))
    }
}
