//! This crate issues and validates compact signed tokens (JWS/JWT,
//! [RFC7515][] and [RFC7519][]): a structural codec, a signature engine
//! covering HMAC, RSA (PKCS#1 v1.5 and PSS), ECDSA, and EdDSA, a key-format
//! detector that infers an algorithm family from PEM/ASN.1 structure, a
//! configurable claim validator, and expiry-aware result caching.
//!
//! JSON Web Encryption (JWE), [RFC7516][], is not supported; tokens are
//! signed, never encrypted.
//!
//! [RFC7515]: https://tools.ietf.org/html/rfc7515
//! [RFC7516]: https://tools.ietf.org/html/rfc7516
//! [RFC7519]: https://tools.ietf.org/html/rfc7519
//!
//! # Example
//!
//! ```
//! use brevet::{Signer, Verifier};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), brevet::Error> {
//! let mut claims = serde_json::Map::new();
//! claims.insert("sub".into(), json!("user-1"));
//!
//! let signer = Signer::builder().key("a shared secret").build()?;
//! let token = signer.sign(claims)?;
//!
//! let verifier = Verifier::builder()
//!     .key("a shared secret")
//!     .allowed_sub(["user-1"])
//!     .build()?;
//! let payload = verifier.verify(&token)?;
//! assert_eq!(payload.claims().unwrap()["sub"], json!("user-1"));
//! # Ok(()) }
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod b64;
mod cache;
pub mod clock;
pub mod decode;
pub mod detect;
pub mod error;
pub mod jwa;
pub mod key;
pub mod sign;
pub mod verify;
pub mod workers;

#[cfg(test)]
pub(crate) mod test;

#[doc(inline)]
pub use decode::{Decoded, Decoder, Payload};
#[doc(inline)]
pub use detect::DetectorContext;
#[doc(inline)]
pub use error::{Error, ErrorKind};
#[doc(inline)]
pub use jwa::Algorithm;
#[doc(inline)]
pub use key::{JsonMap, Key, KeyProvider};
#[doc(inline)]
pub use sign::Signer;
#[doc(inline)]
pub use verify::{ClaimMatcher, Verified, Verifier};
#[doc(inline)]
pub use workers::CryptoPool;
