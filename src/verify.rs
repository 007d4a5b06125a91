//! Token verification and claim validation
//!
//! A [`Verifier`] runs the full pipeline: structural decode, key
//! resolution, algorithm compatibility (against the caller's allow-list and
//! the set the key itself supports), signature verification, and the
//! configured claim checks. Any failed step aborts the whole operation.
//!
//! With a cache enabled, outcomes are stored together with the validity
//! window implied by the token's `nbf`/`exp`/`iat` claims; a cached success
//! is served only while the current time lies inside that window, and a
//! cached not-yet-valid failure only until the token becomes active.

use std::{sync::Arc, time::Duration};

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::{
    cache::{CachedOutcome, ResultCache},
    clock::{iso_timestamp, Clock, System},
    decode::{Decoded, Decoder, Payload},
    detect::DetectorContext,
    error::{self, Error},
    jwa::{self, Algorithm},
    key::{JsonMap, Key, KeyProvider},
    workers::CryptoPool,
};

/// A matcher for an allow-listed claim value
#[derive(Clone, Debug)]
pub enum ClaimMatcher {
    /// Matches exactly this value
    Exact(String),
    /// Matches values the pattern matches
    Pattern(Regex),
}

impl ClaimMatcher {
    fn matches(&self, value: &str) -> bool {
        match self {
            Self::Exact(expected) => expected == value,
            Self::Pattern(pattern) => pattern.is_match(value),
        }
    }
}

impl From<&str> for ClaimMatcher {
    fn from(value: &str) -> Self {
        Self::Exact(value.to_owned())
    }
}

impl From<String> for ClaimMatcher {
    fn from(value: String) -> Self {
        Self::Exact(value)
    }
}

impl From<Regex> for ClaimMatcher {
    fn from(pattern: Regex) -> Self {
        Self::Pattern(pattern)
    }
}

/// One claim check, built once at verifier construction
#[derive(Clone, Debug)]
enum ClaimCheck {
    /// `adjusted = claim*1000 + modifier_ms`; when `until` is set the claim
    /// is an upper bound (valid while `now < adjusted`, else expired),
    /// otherwise a lower bound (valid once `now >= adjusted`, else inactive)
    Time {
        claim: &'static str,
        modifier_ms: i64,
        until: bool,
    },
    AllowList {
        claim: &'static str,
        matchers: Vec<ClaimMatcher>,
        array: bool,
    },
}

impl ClaimCheck {
    fn run(&self, claims: &JsonMap, now_ms: u64) -> Result<(), Error> {
        match self {
            Self::Time {
                claim,
                modifier_ms,
                until,
            } => {
                let Some(value) = claims.get(*claim) else {
                    return Ok(());
                };
                let seconds = value
                    .as_f64()
                    .ok_or_else(|| error::invalid_claim_type(claim))?;
                let adjusted = (seconds * 1000.0) as i64 + modifier_ms;
                let now = now_ms as i64;
                if *until {
                    if now >= adjusted {
                        return Err(error::expired(iso_timestamp(adjusted)));
                    }
                } else if now < adjusted {
                    return Err(error::inactive(iso_timestamp(adjusted)));
                }
                Ok(())
            }
            Self::AllowList {
                claim,
                matchers,
                array,
            } => {
                let Some(value) = claims.get(*claim) else {
                    return Ok(());
                };
                let matched = match value {
                    Value::String(value) => matchers.iter().any(|m| m.matches(value)),
                    Value::Array(items) if *array => {
                        let mut any = false;
                        for item in items {
                            let item = item
                                .as_str()
                                .ok_or_else(|| error::invalid_claim_type(claim))?;
                            any = any || matchers.iter().any(|m| m.matches(item));
                        }
                        any
                    }
                    _ => return Err(error::invalid_claim_type(claim)),
                };
                if matched {
                    Ok(())
                } else {
                    Err(error::invalid_claim_value(claim))
                }
            }
        }
    }
}

/// A fully verified token
#[derive(Clone, Debug, PartialEq)]
pub struct Verified {
    /// The parsed token header
    pub header: JsonMap,
    /// The verified payload
    pub payload: Payload,
    /// The raw signature bytes
    pub signature: Vec<u8>,
}

/// Builder for [`Verifier`]
pub struct VerifierBuilder {
    key: KeyProvider,
    algorithms: Option<Vec<Algorithm>>,
    ignore_expiration: bool,
    ignore_not_before: bool,
    max_age: Option<Duration>,
    clock_tolerance: Duration,
    allowed: Vec<(&'static str, Vec<ClaimMatcher>)>,
    cache: Option<usize>,
    clock: Arc<dyn Clock + Send + Sync>,
    detector: Arc<DetectorContext>,
    pool: Option<Arc<CryptoPool>>,
}

impl Default for VerifierBuilder {
    fn default() -> Self {
        Self {
            key: KeyProvider::None,
            algorithms: None,
            ignore_expiration: false,
            ignore_not_before: false,
            max_age: None,
            clock_tolerance: Duration::ZERO,
            allowed: Vec::new(),
            cache: None,
            clock: Arc::new(System),
            detector: DetectorContext::shared(),
            pool: None,
        }
    }
}

impl std::fmt::Debug for VerifierBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("VerifierBuilder")
            .field("key", &self.key)
            .field("algorithms", &self.algorithms)
            .finish_non_exhaustive()
    }
}

impl VerifierBuilder {
    /// The verification key, or a provider that resolves one per token
    ///
    /// Verifier-side resolvers receive the decoded token header, so a key
    /// can be selected by `kid`. Without a key, only unsecured (`none`)
    /// tokens verify.
    #[must_use]
    pub fn key(mut self, key: impl Into<KeyProvider>) -> Self {
        self.key = key.into();
        self
    }

    /// Restricts the accepted algorithms beyond what the key supports
    #[must_use]
    pub fn algorithms(mut self, algorithms: impl IntoIterator<Item = Algorithm>) -> Self {
        self.algorithms = Some(algorithms.into_iter().collect());
        self
    }

    /// Skips the `exp` claim check
    #[must_use]
    pub fn ignore_expiration(mut self) -> Self {
        self.ignore_expiration = true;
        self
    }

    /// Skips the `nbf` claim check
    #[must_use]
    pub fn ignore_not_before(mut self) -> Self {
        self.ignore_not_before = true;
        self
    }

    /// Rejects tokens issued more than `max_age` ago, from `iat`,
    /// independent of `exp`
    #[must_use]
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Slack applied to every time-based claim check
    #[must_use]
    pub fn clock_tolerance(mut self, tolerance: Duration) -> Self {
        self.clock_tolerance = tolerance;
        self
    }

    /// Allow-list for the `jti` claim
    #[must_use]
    pub fn allowed_jti<I, M>(self, matchers: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<ClaimMatcher>,
    {
        self.allowed("jti", matchers)
    }

    /// Allow-list for the `aud` claim; the claim may be a string or an
    /// array of strings, and one matching element suffices
    #[must_use]
    pub fn allowed_aud<I, M>(self, matchers: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<ClaimMatcher>,
    {
        self.allowed("aud", matchers)
    }

    /// Allow-list for the `iss` claim
    #[must_use]
    pub fn allowed_iss<I, M>(self, matchers: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<ClaimMatcher>,
    {
        self.allowed("iss", matchers)
    }

    /// Allow-list for the `sub` claim
    #[must_use]
    pub fn allowed_sub<I, M>(self, matchers: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<ClaimMatcher>,
    {
        self.allowed("sub", matchers)
    }

    /// Allow-list for the `nonce` claim
    #[must_use]
    pub fn allowed_nonce<I, M>(self, matchers: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<ClaimMatcher>,
    {
        self.allowed("nonce", matchers)
    }

    fn allowed<I, M>(mut self, claim: &'static str, matchers: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<ClaimMatcher>,
    {
        self.allowed
            .push((claim, matchers.into_iter().map(Into::into).collect()));
        self
    }

    /// Caches verification outcomes, bounded to `capacity` tokens
    #[must_use]
    pub fn cache(mut self, capacity: usize) -> Self {
        self.cache = Some(capacity);
        self
    }

    /// The clock used for time-based claim checks
    #[must_use]
    pub fn clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// The detection context used for the key-compatibility check
    #[must_use]
    pub fn detector(mut self, detector: Arc<DetectorContext>) -> Self {
        self.detector = detector;
        self
    }

    /// Offloads signature verification to a worker pool; every verify call
    /// then goes through [`Verifier::verify_async`]
    #[must_use]
    pub fn worker_pool(mut self, pool: Arc<CryptoPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Validates the configuration and builds the verifier.
    ///
    /// # Errors
    ///
    /// Returns an `invalidOption` error for a zero `max_age`.
    pub fn build(self) -> Result<Verifier, Error> {
        if self.max_age == Some(Duration::ZERO) {
            return Err(error::invalid_option("max_age must be positive"));
        }

        let tolerance_ms = self.clock_tolerance.as_millis() as i64;
        let mut checks = Vec::new();
        if !self.ignore_expiration {
            checks.push(ClaimCheck::Time {
                claim: "exp",
                modifier_ms: tolerance_ms,
                until: true,
            });
        }
        if !self.ignore_not_before {
            checks.push(ClaimCheck::Time {
                claim: "nbf",
                modifier_ms: -tolerance_ms,
                until: false,
            });
        }
        if let Some(max_age) = self.max_age {
            checks.push(ClaimCheck::Time {
                claim: "iat",
                modifier_ms: max_age.as_millis() as i64 + tolerance_ms,
                until: true,
            });
        }
        for (claim, matchers) in self.allowed {
            checks.push(ClaimCheck::AllowList {
                claim,
                matchers,
                array: claim == "aud",
            });
        }

        Ok(Verifier {
            key: self.key,
            algorithms: self.algorithms,
            ignore_expiration: self.ignore_expiration,
            ignore_not_before: self.ignore_not_before,
            max_age: self.max_age,
            tolerance_ms: self.clock_tolerance.as_millis() as u64,
            checks,
            decoder: Decoder::builder().build(),
            cache: self.cache.map(ResultCache::new),
            clock: self.clock,
            detector: self.detector,
            pool: self.pool,
        })
    }
}

/// Verifies signed tokens
pub struct Verifier {
    key: KeyProvider,
    algorithms: Option<Vec<Algorithm>>,
    ignore_expiration: bool,
    ignore_not_before: bool,
    max_age: Option<Duration>,
    tolerance_ms: u64,
    checks: Vec<ClaimCheck>,
    decoder: Decoder,
    cache: Option<ResultCache<Verified>>,
    clock: Arc<dyn Clock + Send + Sync>,
    detector: Arc<DetectorContext>,
    pool: Option<Arc<CryptoPool>>,
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("key", &self.key)
            .field("algorithms", &self.algorithms)
            .finish_non_exhaustive()
    }
}

impl Verifier {
    /// Starts building a verifier
    #[must_use]
    pub fn builder() -> VerifierBuilder {
        VerifierBuilder::default()
    }

    /// Verifies a token synchronously, returning its payload.
    ///
    /// # Errors
    ///
    /// Returns an `invalidOption` error when the verifier carries a key
    /// resolver or a worker pool, which both require
    /// [`Verifier::verify_async`]; otherwise errors come from the
    /// verification pipeline.
    pub fn verify(&self, token: &str) -> Result<Payload, Error> {
        Ok(self.verify_complete(token)?.payload)
    }

    /// Verifies a token synchronously, returning header, payload, and
    /// signature.
    ///
    /// # Errors
    ///
    /// See [`Verifier::verify`].
    pub fn verify_complete(&self, token: &str) -> Result<Verified, Error> {
        if !self.key.is_static() || self.pool.is_some() {
            return Err(error::invalid_option(
                "a verifier with a key resolver or worker pool must verify through verify_async",
            ));
        }
        // Both suspension points (key resolution, worker dispatch) are
        // ruled out above, so the future completes on its first poll
        futures::executor::block_on(self.verify_complete_async(token))
    }

    /// Verifies a token, resolving the key and offloading the cryptographic
    /// call to the worker pool when either is configured.
    ///
    /// # Errors
    ///
    /// Any failed pipeline step aborts the operation: `malformed`,
    /// `missingSecret`, `missingSignature`, `invalidAlgorithm`,
    /// `invalidSignature`, claim errors, or a wrapped resolver failure.
    pub async fn verify_async(&self, token: &str) -> Result<Payload, Error> {
        Ok(self.verify_complete_async(token).await?.payload)
    }

    /// Asynchronous counterpart of [`Verifier::verify_complete`].
    ///
    /// # Errors
    ///
    /// See [`Verifier::verify_async`].
    pub async fn verify_complete_async(&self, token: &str) -> Result<Verified, Error> {
        let now_ms = self.clock.now().as_millis();

        if let Some(cache) = &self.cache {
            if let Some(outcome) = cache.lookup(token, now_ms) {
                debug!("verify cache hit");
                return outcome;
            }
        }

        let (outcome, valid_from_ms, expires_at_ms) = self.run(token, now_ms).await;
        if let Some(cache) = &self.cache {
            cache.store(
                token,
                CachedOutcome {
                    outcome: outcome.clone(),
                    valid_from_ms,
                    expires_at_ms,
                },
            );
        }
        outcome
    }

    async fn run(&self, token: &str, now_ms: u64) -> (Result<Verified, Error>, u64, u64) {
        let decoded = match self.decoder.decode_complete(token) {
            Ok(decoded) => decoded,
            Err(err) => return (Err(err), 0, 0),
        };
        let (valid_from_ms, expires_at_ms) = self.validity_window(decoded.payload.claims());
        let outcome = self.check(decoded, now_ms).await;
        (outcome, valid_from_ms, expires_at_ms)
    }

    async fn check(&self, decoded: Decoded, now_ms: u64) -> Result<Verified, Error> {
        let key = self.key.resolve(Some(&decoded.header)).await?;
        let algorithm = self.algorithm_gate(&decoded, key.as_ref())?;

        if algorithm != Algorithm::None {
            let Some(key) = key else {
                return Err(error::missing_secret());
            };
            let verified = match &self.pool {
                Some(pool) => {
                    pool.verify(
                        algorithm,
                        key,
                        decoded.input.clone().into_bytes(),
                        decoded.signature.clone(),
                    )
                    .await?
                }
                None => jwa::verify(
                    algorithm,
                    &key,
                    decoded.input.as_bytes(),
                    &decoded.signature,
                )?,
            };
            if !verified {
                return Err(error::invalid_signature());
            }
        }

        if let Some(claims) = decoded.payload.claims() {
            for check in &self.checks {
                check.run(claims, now_ms)?;
            }
        }

        Ok(Verified {
            header: decoded.header,
            payload: decoded.payload,
            signature: decoded.signature,
        })
    }

    /// Parses the declared algorithm and checks it against the caller's
    /// allow-list and the set the key supports.
    fn algorithm_gate(&self, decoded: &Decoded, key: Option<&Key>) -> Result<Algorithm, Error> {
        let name = decoded
            .header
            .get("alg")
            .and_then(Value::as_str)
            .ok_or_else(|| error::malformed("the token header names no algorithm"))?;
        let algorithm: Algorithm = name.parse()?;

        if algorithm == Algorithm::None && !decoded.signature.is_empty() {
            return Err(error::invalid_algorithm(
                "unsecured tokens must not carry a signature",
            ));
        }
        if !decoded.signature.is_empty() && key.is_none() {
            return Err(error::missing_secret());
        }
        if key.is_some() && decoded.signature.is_empty() {
            return Err(error::missing_signature());
        }

        if let Some(allowed) = &self.algorithms {
            if !allowed.contains(&algorithm) {
                return Err(error::invalid_algorithm(format!(
                    "the {algorithm} algorithm is not allowed by this verifier"
                )));
            }
        }

        let supported = match key {
            Some(key) => self.detector.public_key_algorithms(key)?,
            None => vec![Algorithm::None],
        };
        if !supported.contains(&algorithm) {
            return Err(error::invalid_algorithm(format!(
                "the {algorithm} algorithm is not compatible with the verification key"
            )));
        }

        Ok(algorithm)
    }

    /// The wall-clock window inside which an outcome for these claims stays
    /// correct; 0 means "not applicable"
    fn validity_window(&self, claims: Option<&JsonMap>) -> (u64, u64) {
        let Some(claims) = claims else { return (0, 0) };
        let claim_ms = |name: &str| {
            claims
                .get(name)
                .and_then(Value::as_f64)
                .map(|secs| (secs * 1000.0) as u64)
        };

        let valid_from_ms = if self.ignore_not_before {
            0
        } else {
            claim_ms("nbf")
                .map(|nbf| nbf.saturating_sub(self.tolerance_ms))
                .unwrap_or(0)
        };

        let mut expires_at_ms = u64::MAX;
        if !self.ignore_expiration {
            if let Some(exp) = claim_ms("exp") {
                expires_at_ms = expires_at_ms.min(exp + self.tolerance_ms);
            }
        }
        if let Some(max_age) = self.max_age {
            if let Some(iat) = claim_ms("iat") {
                expires_at_ms =
                    expires_at_ms.min(iat + max_age.as_millis() as u64 + self.tolerance_ms);
            }
        }
        if expires_at_ms == u64::MAX {
            expires_at_ms = 0;
        }

        (valid_from_ms, expires_at_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::{TestClock, UnixTime},
        key::Key,
        sign::Signer,
        test,
    };
    use color_eyre::Result;
    use futures::executor::block_on;
    use serde_json::json;

    fn claims(value: Value) -> JsonMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("claims fixtures are objects"),
        }
    }

    #[test]
    fn round_trips_all_asymmetric_algorithms() -> Result<()> {
        let cases: &[(Option<Algorithm>, &str, &str)] = &[
            (None, test::rsa::PKCS8, test::rsa::PUBLIC),
            (Some(Algorithm::PS384), test::rsa::PKCS8, test::rsa::PUBLIC),
            (None, test::ec::P256_PKCS8, test::ec::P256_PUBLIC),
            (None, test::ec::P384_PKCS8, test::ec::P384_PUBLIC),
            (None, test::ec::P521_PKCS8, test::ec::P521_PUBLIC),
            (None, test::okp::ED25519, test::okp::ED25519_PUBLIC),
            (None, test::okp::ED448, test::okp::ED448_PUBLIC),
        ];

        for (algorithm, private, public) in cases {
            let mut builder = Signer::builder().key(*private);
            if let Some(algorithm) = algorithm {
                builder = builder.algorithm(*algorithm);
            }
            let token = builder.build()?.sign(claims(json!({"a": 1})))?;

            let verified = Verifier::builder().key(*public).build()?.verify(&token)?;
            assert_eq!(
                verified.claims().unwrap().get("a"),
                Some(&json!(1)),
                "round trip failed for {private}"
            );
        }
        Ok(())
    }

    #[test]
    fn hmac_round_trip_keeps_injected_claims() -> Result<()> {
        let signer = Signer::builder()
            .key("secretsecretsecret")
            .iss("issuer")
            .build()?;
        let token = signer.sign(claims(json!({"a": 1})))?;

        let verified = Verifier::builder()
            .key("secretsecretsecret")
            .allowed_iss(["issuer"])
            .build()?
            .verify_complete(&token)?;
        let payload = verified.payload.claims().unwrap();
        assert_eq!(payload.get("a"), Some(&json!(1)));
        assert_eq!(payload.get("iss"), Some(&json!("issuer")));
        assert!(payload.contains_key("iat"));
        Ok(())
    }

    #[test]
    fn tampered_signatures_are_rejected() -> Result<()> {
        let token = Signer::builder()
            .key("secretsecretsecret")
            .build()?
            .sign(claims(json!({"a": 1})))?;

        let mut tampered = token.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == 'A' { 'B' } else { 'A' });

        let verifier = Verifier::builder().key("secretsecretsecret").build()?;
        assert!(verifier.verify(&token).is_ok());
        assert_eq!(
            verifier.verify(&tampered).unwrap_err().code(),
            "invalidSignature"
        );
        Ok(())
    }

    #[test]
    fn algorithm_gate_enforces_key_compatibility() -> Result<()> {
        let token = Signer::builder()
            .key(test::rsa::PKCS8)
            .build()?
            .sign(claims(json!({"a": 1})))?;

        // An EC key cannot verify an RSA token
        let err = Verifier::builder()
            .key(test::ec::P256_PUBLIC)
            .build()?
            .verify(&token)
            .unwrap_err();
        assert_eq!(err.code(), "invalidAlgorithm");

        // The right key, but an allow-list excluding RS256
        let err = Verifier::builder()
            .key(test::rsa::PUBLIC)
            .algorithms([Algorithm::PS256])
            .build()?
            .verify(&token)
            .unwrap_err();
        assert_eq!(err.code(), "invalidAlgorithm");
        Ok(())
    }

    #[test]
    fn missing_secret_and_missing_signature() -> Result<()> {
        let token = Signer::builder()
            .key("secret")
            .build()?
            .sign(claims(json!({"a": 1})))?;
        let err = Verifier::builder().build()?.verify(&token).unwrap_err();
        assert_eq!(err.code(), "missingSecret");

        let unsigned = Signer::builder()
            .algorithm(Algorithm::None)
            .build()?
            .sign(claims(json!({"a": 1})))?;
        let err = Verifier::builder()
            .key("secret")
            .build()?
            .verify(&unsigned)
            .unwrap_err();
        assert_eq!(err.code(), "missingSignature");
        Ok(())
    }

    #[test]
    fn unsecured_tokens_verify_without_a_key() -> Result<()> {
        let token = Signer::builder()
            .algorithm(Algorithm::None)
            .build()?
            .sign(claims(json!({"a": 1})))?;
        let verified = Verifier::builder().build()?.verify_complete(&token)?;
        assert!(verified.signature.is_empty());

        // An unsecured token must not smuggle a signature segment
        let forged = format!("{}AAAA", token);
        let err = Verifier::builder().build()?.verify(&forged).unwrap_err();
        assert_eq!(err.code(), "invalidAlgorithm");
        Ok(())
    }

    #[test]
    fn expiration_is_enforced_with_tolerance() -> Result<()> {
        let clock = TestClock::new(UnixTime(1_000));
        let token = Signer::builder()
            .key("secret")
            .expires_in(Duration::from_secs(100))
            .clock(clock.clone())
            .build()?
            .sign(claims(json!({"a": 1})))?;

        let verifier = Verifier::builder()
            .key("secret")
            .clock(clock.clone())
            .build()?;
        clock.set(UnixTime(1_099));
        assert!(verifier.verify(&token).is_ok());
        clock.set(UnixTime(1_100));
        assert_eq!(verifier.verify(&token).unwrap_err().code(), "expired");

        let tolerant = Verifier::builder()
            .key("secret")
            .clock_tolerance(Duration::from_secs(10))
            .clock(clock.clone())
            .build()?;
        clock.set(UnixTime(1_105));
        assert!(tolerant.verify(&token).is_ok());
        clock.set(UnixTime(1_110));
        assert_eq!(tolerant.verify(&token).unwrap_err().code(), "expired");

        let ignoring = Verifier::builder()
            .key("secret")
            .ignore_expiration()
            .clock(clock.clone())
            .build()?;
        clock.set(UnixTime(9_999));
        assert!(ignoring.verify(&token).is_ok());
        Ok(())
    }

    #[test]
    fn not_before_is_enforced() -> Result<()> {
        let clock = TestClock::new(UnixTime(1_000));
        let token = Signer::builder()
            .key("secret")
            .not_before(Duration::from_secs(50))
            .clock(clock.clone())
            .build()?
            .sign(claims(json!({"a": 1})))?;

        let verifier = Verifier::builder()
            .key("secret")
            .clock(clock.clone())
            .build()?;
        clock.set(UnixTime(1_049));
        let err = verifier.verify(&token).unwrap_err();
        assert_eq!(err.code(), "inactive");
        clock.set(UnixTime(1_050));
        assert!(verifier.verify(&token).is_ok());
        Ok(())
    }

    #[test]
    fn max_age_checks_iat_independently_of_exp() -> Result<()> {
        let clock = TestClock::new(UnixTime(1_000));
        let token = Signer::builder()
            .key("secret")
            .clock(clock.clone())
            .build()?
            .sign(claims(json!({"a": 1})))?;

        let verifier = Verifier::builder()
            .key("secret")
            .max_age(Duration::from_secs(60))
            .clock(clock.clone())
            .build()?;
        clock.set(UnixTime(1_059));
        assert!(verifier.verify(&token).is_ok());
        clock.set(UnixTime(1_060));
        assert_eq!(verifier.verify(&token).unwrap_err().code(), "expired");
        Ok(())
    }

    #[test]
    fn allow_lists_match_exactly_or_by_pattern() -> Result<()> {
        let token = Signer::builder()
            .key("secret")
            .iss("https://issuer.example")
            .aud_many(["alpha", "beta"])
            .sub("user-42")
            .build()?
            .sign(claims(json!({"a": 1})))?;

        let verifier = Verifier::builder()
            .key("secret")
            .allowed_iss([ClaimMatcher::from(
                Regex::new(r"^https://issuer\.").unwrap(),
            )])
            .allowed_aud(["beta"])
            .allowed_sub([ClaimMatcher::from(Regex::new(r"^user-\d+$").unwrap())])
            .build()?;
        assert!(verifier.verify(&token).is_ok());

        let err = Verifier::builder()
            .key("secret")
            .allowed_aud(["gamma"])
            .build()?
            .verify(&token)
            .unwrap_err();
        assert_eq!(err.code(), "invalidClaimValue");
        Ok(())
    }

    #[test]
    fn wrong_claim_types_are_rejected() -> Result<()> {
        let token = Signer::builder()
            .key("secret")
            .no_timestamp()
            .build()?
            .sign(claims(json!({"exp": "soon", "sub": 42})))?;

        let verifier = Verifier::builder().key("secret").build()?;
        assert_eq!(
            verifier.verify(&token).unwrap_err().code(),
            "invalidClaimType"
        );

        let verifier = Verifier::builder()
            .key("secret")
            .ignore_expiration()
            .allowed_sub(["42"])
            .build()?;
        assert_eq!(
            verifier.verify(&token).unwrap_err().code(),
            "invalidClaimType"
        );
        Ok(())
    }

    #[test]
    fn cached_successes_self_invalidate_at_expiry() -> Result<()> {
        let clock = TestClock::new(UnixTime(1_000));
        let token = Signer::builder()
            .key("secret")
            .expires_in(Duration::from_secs(100))
            .clock(clock.clone())
            .build()?
            .sign(claims(json!({"a": 1})))?;

        let verifier = Verifier::builder()
            .key("secret")
            .cache(16)
            .clock(clock.clone())
            .build()?;
        assert!(verifier.verify(&token).is_ok());
        assert!(verifier.verify(&token).is_ok());

        clock.set(UnixTime(1_100));
        assert_eq!(verifier.verify(&token).unwrap_err().code(), "expired");
        Ok(())
    }

    #[test]
    fn cached_inactive_failures_recover_once_active() -> Result<()> {
        let clock = TestClock::new(UnixTime(1_000));
        let token = Signer::builder()
            .key("secret")
            .not_before(Duration::from_secs(50))
            .clock(clock.clone())
            .build()?
            .sign(claims(json!({"a": 1})))?;

        let verifier = Verifier::builder()
            .key("secret")
            .cache(16)
            .clock(clock.clone())
            .build()?;
        assert_eq!(verifier.verify(&token).unwrap_err().code(), "inactive");
        assert_eq!(verifier.verify(&token).unwrap_err().code(), "inactive");

        clock.set(UnixTime(1_050));
        assert!(verifier.verify(&token).is_ok());
        Ok(())
    }

    #[test]
    fn resolvers_receive_the_token_header() -> Result<()> {
        let token = Signer::builder()
            .key("right-secret")
            .kid("kid-1")
            .build()?
            .sign(claims(json!({"a": 1})))?;

        let verifier = Verifier::builder()
            .key(KeyProvider::resolver_fn(|header| {
                let kid = header
                    .and_then(|h| h.get("kid"))
                    .and_then(Value::as_str)
                    .ok_or("no kid in header")?;
                match kid {
                    "kid-1" => Ok(Some(Key::secret(b"right-secret".to_vec()))),
                    _ => Ok(None),
                }
            }))
            .build()?;

        assert_eq!(
            verifier.verify(&token).unwrap_err().code(),
            "invalidOption"
        );
        let verified = block_on(verifier.verify_async(&token))?;
        assert_eq!(verified.claims().unwrap().get("a"), Some(&json!(1)));
        Ok(())
    }

    #[test]
    fn worker_pool_verification_matches_inline() -> Result<()> {
        let pool = CryptoPool::new(2);
        let token = Signer::builder()
            .key(test::ec::P256_PKCS8)
            .build()?
            .sign(claims(json!({"a": 1})))?;

        let verifier = Verifier::builder()
            .key(test::ec::P256_PUBLIC)
            .worker_pool(pool.clone())
            .build()?;
        let verified = block_on(verifier.verify_async(&token))?;
        assert_eq!(verified.claims().unwrap().get("a"), Some(&json!(1)));
        pool.stop();
        Ok(())
    }
}
