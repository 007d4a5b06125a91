//! Token creation
//!
//! A [`Signer`] is configured once through its builder and then reused for
//! any number of tokens. Structured payloads receive claim injection
//! (`iat`, `exp`, `nbf`, and the configured fixed claims); text and byte
//! payloads pass through unchanged. Claim injection always operates on the
//! signer's own copy of the payload.

use std::{sync::Arc, time::Duration};

use serde_json::Value;
use tracing::debug;

use crate::{
    b64,
    clock::{Clock, System},
    decode::Payload,
    detect::DetectorContext,
    error::{self, Error},
    jwa::{self, Algorithm, Family},
    key::{JsonMap, KeyProvider},
    workers::CryptoPool,
};

/// Builder for [`Signer`]
///
/// All configuration validation happens in [`SignerBuilder::build`]; the
/// per-token path never raises configuration errors.
pub struct SignerBuilder {
    algorithm: Option<Algorithm>,
    key: KeyProvider,
    no_timestamp: bool,
    expires_in: Option<Duration>,
    not_before: Option<Duration>,
    jti: Option<String>,
    aud: Option<Value>,
    iss: Option<String>,
    sub: Option<String>,
    nonce: Option<String>,
    kid: Option<String>,
    header: JsonMap,
    clock: Arc<dyn Clock + Send + Sync>,
    detector: Arc<DetectorContext>,
    pool: Option<Arc<CryptoPool>>,
}

impl Default for SignerBuilder {
    fn default() -> Self {
        Self {
            algorithm: None,
            key: KeyProvider::None,
            no_timestamp: false,
            expires_in: None,
            not_before: None,
            jti: None,
            aud: None,
            iss: None,
            sub: None,
            nonce: None,
            kid: None,
            header: JsonMap::new(),
            clock: Arc::new(System),
            detector: DetectorContext::shared(),
            pool: None,
        }
    }
}

impl std::fmt::Debug for SignerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("SignerBuilder")
            .field("algorithm", &self.algorithm)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl SignerBuilder {
    /// Fixes the signing algorithm instead of detecting it from the key
    #[must_use]
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    /// The signing key, or a provider that resolves one per token
    #[must_use]
    pub fn key(mut self, key: impl Into<KeyProvider>) -> Self {
        self.key = key.into();
        self
    }

    /// Suppresses the injected `iat` claim
    #[must_use]
    pub fn no_timestamp(mut self) -> Self {
        self.no_timestamp = true;
        self
    }

    /// Injects `exp` at `lifetime` past the issued-at time
    #[must_use]
    pub fn expires_in(mut self, lifetime: Duration) -> Self {
        self.expires_in = Some(lifetime);
        self
    }

    /// Injects `nbf` at `delay` past the issued-at time
    #[must_use]
    pub fn not_before(mut self, delay: Duration) -> Self {
        self.not_before = Some(delay);
        self
    }

    /// Injects a fixed `jti` claim
    #[must_use]
    pub fn jti(mut self, jti: impl Into<String>) -> Self {
        self.jti = Some(jti.into());
        self
    }

    /// Injects a single-valued `aud` claim
    #[must_use]
    pub fn aud(mut self, aud: impl Into<String>) -> Self {
        self.aud = Some(Value::String(aud.into()));
        self
    }

    /// Injects a multi-valued `aud` claim
    #[must_use]
    pub fn aud_many<I, S>(mut self, aud: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aud = Some(Value::Array(
            aud.into_iter().map(|s| Value::String(s.into())).collect(),
        ));
        self
    }

    /// Injects a fixed `iss` claim
    #[must_use]
    pub fn iss(mut self, iss: impl Into<String>) -> Self {
        self.iss = Some(iss.into());
        self
    }

    /// Injects a fixed `sub` claim
    #[must_use]
    pub fn sub(mut self, sub: impl Into<String>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    /// Injects a fixed `nonce` claim
    #[must_use]
    pub fn nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Sets the `kid` header field
    #[must_use]
    pub fn kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    /// Extra header fields, merged after the generated ones
    ///
    /// Extras win on collision, except `alg`, which is always the
    /// configured algorithm.
    #[must_use]
    pub fn header(mut self, header: JsonMap) -> Self {
        self.header = header;
        self
    }

    /// The clock used for the issued-at time
    #[must_use]
    pub fn clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// The detection context used for algorithm autodetection
    #[must_use]
    pub fn detector(mut self, detector: Arc<DetectorContext>) -> Self {
        self.detector = detector;
        self
    }

    /// Offloads the signing call to a worker pool; every sign call then
    /// goes through [`Signer::sign_async`]
    #[must_use]
    pub fn worker_pool(mut self, pool: Arc<CryptoPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Validates the configuration and builds the signer.
    ///
    /// When no algorithm is fixed and the key is static, the signing
    /// algorithm is detected here, once.
    ///
    /// # Errors
    ///
    /// Returns an `invalidOption` error for a key paired with the `none`
    /// algorithm, a signing algorithm without a key, or a zero
    /// `expires_in`/`not_before`; detection failures surface as
    /// `invalidKey`.
    pub fn build(self) -> Result<Signer, Error> {
        let mut algorithm = self.algorithm;

        match (algorithm, &self.key) {
            (Some(Algorithm::None), KeyProvider::None) => {}
            (Some(Algorithm::None), _) => {
                return Err(error::invalid_option(
                    "no key may be provided when the algorithm is 'none'",
                ));
            }
            (_, KeyProvider::None) => {
                return Err(error::invalid_option(
                    "a key is required unless the algorithm is 'none'",
                ));
            }
            _ => {}
        }

        if self.expires_in == Some(Duration::ZERO) {
            return Err(error::invalid_option("expires_in must be positive"));
        }
        if self.not_before == Some(Duration::ZERO) {
            return Err(error::invalid_option("not_before must be positive"));
        }

        if algorithm.is_none() {
            if let Some(key) = self.key.static_key() {
                algorithm = Some(self.detector.private_key_algorithm(key)?);
            }
        }

        let mut fixed_claims = JsonMap::new();
        if let Some(jti) = self.jti {
            fixed_claims.insert("jti".to_owned(), Value::String(jti));
        }
        if let Some(aud) = self.aud {
            fixed_claims.insert("aud".to_owned(), aud);
        }
        if let Some(iss) = self.iss {
            fixed_claims.insert("iss".to_owned(), Value::String(iss));
        }
        if let Some(sub) = self.sub {
            fixed_claims.insert("sub".to_owned(), Value::String(sub));
        }
        if let Some(nonce) = self.nonce {
            fixed_claims.insert("nonce".to_owned(), Value::String(nonce));
        }

        Ok(Signer {
            algorithm,
            key: self.key,
            no_timestamp: self.no_timestamp,
            expires_in: self.expires_in,
            not_before: self.not_before,
            fixed_claims,
            kid: self.kid,
            header: self.header,
            clock: self.clock,
            detector: self.detector,
            pool: self.pool,
        })
    }
}

/// Creates signed tokens
pub struct Signer {
    /// `None` only when the key comes from a resolver; detected per call
    algorithm: Option<Algorithm>,
    key: KeyProvider,
    no_timestamp: bool,
    expires_in: Option<Duration>,
    not_before: Option<Duration>,
    fixed_claims: JsonMap,
    kid: Option<String>,
    header: JsonMap,
    clock: Arc<dyn Clock + Send + Sync>,
    detector: Arc<DetectorContext>,
    pool: Option<Arc<CryptoPool>>,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("algorithm", &self.algorithm)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl Signer {
    /// Starts building a signer
    #[must_use]
    pub fn builder() -> SignerBuilder {
        SignerBuilder::default()
    }

    /// Signs a payload synchronously.
    ///
    /// # Errors
    ///
    /// Returns an `invalidOption` error when the signer carries a key
    /// resolver or a worker pool, which both require [`Signer::sign_async`];
    /// otherwise errors come from the signature engine.
    pub fn sign(&self, payload: impl Into<Payload>) -> Result<String, Error> {
        if self.pool.is_some() {
            return Err(error::invalid_option(
                "a signer with a worker pool must sign through sign_async",
            ));
        }
        let Some(algorithm) = self.algorithm else {
            return Err(error::invalid_option(
                "a signer with a key resolver must sign through sign_async",
            ));
        };

        let input = self.signing_input(payload.into(), algorithm)?;
        let signature = match self.key.static_key() {
            Some(key) => jwa::sign(algorithm, key, input.as_bytes())?,
            None if algorithm == Algorithm::None => Vec::new(),
            None => {
                return Err(error::invalid_option(
                    "a signer with a key resolver must sign through sign_async",
                ));
            }
        };

        Ok(assemble(input, &signature))
    }

    /// Signs a payload, resolving the key and offloading the cryptographic
    /// call to the worker pool when either is configured.
    ///
    /// # Errors
    ///
    /// Key resolution failures surface as `secretFetchingError`; a resolver
    /// that produces no key fails with `missingSecret`.
    pub async fn sign_async(&self, payload: impl Into<Payload>) -> Result<String, Error> {
        let key = self.key.resolve(None).await?;

        let algorithm = match (self.algorithm, &key) {
            (Some(algorithm), _) => algorithm,
            (None, Some(key)) => self.detector.private_key_algorithm(key)?,
            (None, None) => return Err(error::missing_secret()),
        };

        let input = self.signing_input(payload.into(), algorithm)?;
        let signature = match (algorithm.family(), key) {
            (Family::None, _) => Vec::new(),
            (_, None) => return Err(error::missing_secret()),
            (_, Some(key)) => match &self.pool {
                Some(pool) => pool.sign(algorithm, key, input.clone().into_bytes()).await?,
                None => jwa::sign(algorithm, &key, input.as_bytes())?,
            },
        };

        Ok(assemble(input, &signature))
    }

    /// The first two token segments, with claims injected
    fn signing_input(&self, payload: Payload, algorithm: Algorithm) -> Result<String, Error> {
        debug!(algorithm = %algorithm, "signing token");

        let structured = matches!(payload, Payload::Claims(_));
        let payload = match payload {
            Payload::Claims(claims) => Payload::Claims(self.inject_claims(claims)),
            other => other,
        };

        let mut header = JsonMap::new();
        header.insert("alg".to_owned(), Value::String(algorithm.name().to_owned()));
        if structured {
            header.insert("typ".to_owned(), Value::String("JWT".to_owned()));
        }
        if let Some(kid) = &self.kid {
            header.insert("kid".to_owned(), Value::String(kid.clone()));
        }
        for (name, value) in &self.header {
            header.insert(name.clone(), value.clone());
        }
        // Extras win on collision, except the algorithm; re-inserting keeps
        // alg in its original first slot
        header.insert("alg".to_owned(), Value::String(algorithm.name().to_owned()));

        let header_bytes = serde_json::to_vec(&header)
            .map_err(|err| error::invalid_type(format!("the header cannot be serialized: {err}")))?;

        Ok(format!(
            "{}.{}",
            b64::encode(header_bytes),
            b64::encode(payload.to_bytes()?)
        ))
    }

    fn inject_claims(&self, mut claims: JsonMap) -> JsonMap {
        let iat = claims
            .get("iat")
            .and_then(Value::as_u64)
            .unwrap_or_else(|| self.clock.now().0);

        if !self.no_timestamp {
            claims.insert("iat".to_owned(), Value::from(iat));
        }
        if let Some(expires_in) = self.expires_in {
            claims.insert("exp".to_owned(), Value::from(iat + expires_in.as_secs()));
        }
        if let Some(not_before) = self.not_before {
            claims.insert("nbf".to_owned(), Value::from(iat + not_before.as_secs()));
        }
        for (name, value) in &self.fixed_claims {
            claims.insert(name.clone(), value.clone());
        }

        claims
    }
}

fn assemble(input: String, signature: &[u8]) -> String {
    let mut token = input;
    token.push('.');
    token.push_str(&b64::encode(signature));
    token
}
