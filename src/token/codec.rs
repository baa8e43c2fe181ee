//! JWT build/parse primitives (`spec.md` §4.1, "TokenCodec").
//!
//! `TokenCodec` knows nothing about key lifecycle — it is handed an
//! `EncodingKey`/`DecodingKey` by `SigningKeyManager` (or, for externally
//! issued tokens, by `OIDCResolver`) and only deals with claim shape,
//! standard-claim validation, and the private-claim namespacing contract.
//! Grounded on `auth/jwt.rs`'s `JwtValidator`/`generate_rs256_token`, with
//! the `exp`/`iat`/`nbf` error-kind mapping from the same file generalized
//! to three distinct normalized messages per `spec.md` §7/§8 property 10.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::error::{AuthError, Result};
use crate::token::claims::{RawClaims, TokenInput, VerifiedToken, PRIVATE_CLAIM_PREFIX};

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

fn base64_json<T: serde::Serialize>(value: &T) -> Result<String> {
    let bytes = serde_json::to_vec(value).map_err(|e| AuthError::internal(format!("failed to encode claim: {e}")))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Builds and parses JWTs for one configured issuer.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    issuer: String,
}

impl TokenCodec {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self { issuer: issuer.into() }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Builds a signed JWT from a `TokenInput`. Sets `nbf == iat == now`
    /// and `iss` to the configured issuer; prefixes every claim key with
    /// [`PRIVATE_CLAIM_PREFIX`].
    pub fn generate(
        &self,
        input: &TokenInput,
        header: &Header,
        encoding_key: &EncodingKey,
    ) -> Result<String> {
        let now = now();
        let mut extra = HashMap::with_capacity(input.claims.len());
        for (key, value) in &input.claims {
            extra.insert(format!("{PRIVATE_CLAIM_PREFIX}{key}"), serde_json::Value::String(value.clone()));
        }

        let raw = RawClaims {
            sub: input.subject.clone(),
            iss: self.issuer.clone(),
            aud: vec![input.audience.clone()],
            iat: now,
            nbf: now,
            exp: input.expiration,
            jwt_id: input.jwt_id.clone(),
            extra,
        };

        encode(header, &raw, encoding_key)
            .map_err(|e| AuthError::internal(format!("failed to sign token: {e}")))
    }

    /// Parses and fully verifies a JWT: signature, `exp`/`nbf`/`iat`, and
    /// issuer. Demangles the private-claim map, dropping non-string values
    /// and the namespace prefix.
    pub fn verify(
        &self,
        token: &str,
        decoding_key: &DecodingKey,
        algorithm: Algorithm,
        required_audience: Option<&str>,
    ) -> Result<VerifiedToken> {
        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[self.issuer.as_str()]);
        if let Some(aud) = required_audience {
            validation.set_audience(&[aud]);
        } else {
            validation.validate_aud = false;
        }

        let data = decode::<RawClaims>(token, decoding_key, &validation).map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::unauthorized("exp not satisfied"),
                ErrorKind::ImmatureSignature => AuthError::unauthorized("nbf not satisfied"),
                ErrorKind::InvalidIssuer => {
                    AuthError::unauthorized(format!("token issuer is not {}", self.issuer))
                },
                _ => AuthError::unauthorized(e.to_string()),
            }
        })?;

        // Redundant but explicit per spec's three-way iat/nbf/exp mapping;
        // jsonwebtoken validates exp/nbf itself but has no `iat` check, so
        // this re-checks exp for the shared message and adds iat.
        let claims = data.claims;
        let n = now();
        if let Some(exp) = claims.exp {
            if exp <= n {
                return Err(AuthError::unauthorized("exp not satisfied"));
            }
        }
        if claims.iat > n {
            return Err(AuthError::unauthorized("iat not satisfied"));
        }

        Ok(demangle(claims))
    }

    /// Builds the base64url `header.payload` signing input for `input`,
    /// without applying a signature. Used by `SigningKeyManager`, which
    /// delegates the actual signature to an external `Signer` plugin
    /// rather than a local `jsonwebtoken::EncodingKey`.
    pub fn build_signing_input(&self, input: &TokenInput, header: &Header) -> Result<String> {
        let now = now();
        let mut extra = HashMap::with_capacity(input.claims.len());
        for (key, value) in &input.claims {
            extra.insert(format!("{PRIVATE_CLAIM_PREFIX}{key}"), serde_json::Value::String(value.clone()));
        }
        let raw = RawClaims {
            sub: input.subject.clone(),
            iss: self.issuer.clone(),
            aud: vec![input.audience.clone()],
            iat: now,
            nbf: now,
            exp: input.expiration,
            jwt_id: input.jwt_id.clone(),
            extra,
        };

        let header_b64 = base64_json(header)?;
        let payload_b64 = base64_json(&raw)?;
        Ok(format!("{header_b64}.{payload_b64}"))
    }

    /// Appends a raw signature to a `header.payload` signing input,
    /// producing a complete compact JWT.
    pub fn finish_signed_token(signing_input: &str, signature: &[u8]) -> String {
        let sig_b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(signature);
        format!("{signing_input}.{sig_b64}")
    }

    /// Splits a compact JWT into its `header.payload` signing input and
    /// its signature, both still base64url-encoded.
    pub fn split_signed_token(token: &str) -> Result<(&str, Vec<u8>)> {
        let mut parts = token.splitn(3, '.');
        let header = parts.next().ok_or_else(|| AuthError::unauthorized("malformed token"))?;
        let payload = parts.next().ok_or_else(|| AuthError::unauthorized("malformed token"))?;
        let sig_b64 = parts.next().ok_or_else(|| AuthError::unauthorized("malformed token"))?;
        let signature = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| AuthError::unauthorized("malformed token signature"))?;
        let signing_input_len = header.len() + 1 + payload.len();
        Ok((&token[..signing_input_len], signature))
    }

    /// Validates standard claims (`exp`/`nbf`/`iss`/`aud`) from the
    /// `payload` half of a `header.payload` signing input already
    /// confirmed authentic by the `Signer` plugin, and demangles the
    /// private-claim map.
    pub fn verify_claims(&self, signing_input: &str, required_audience: Option<&str>) -> Result<VerifiedToken> {
        let payload_b64 =
            signing_input.split('.').nth(1).ok_or_else(|| AuthError::unauthorized("malformed token"))?;
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| AuthError::unauthorized("malformed token"))?;
        let claims: RawClaims =
            serde_json::from_slice(&bytes).map_err(|_| AuthError::unauthorized("malformed token claims"))?;

        if claims.iss != self.issuer {
            return Err(AuthError::unauthorized(format!("token issuer is not {}", self.issuer)));
        }
        let n = now();
        if let Some(exp) = claims.exp {
            if exp <= n {
                return Err(AuthError::unauthorized("exp not satisfied"));
            }
        }
        if claims.nbf > n {
            return Err(AuthError::unauthorized("nbf not satisfied"));
        }
        if claims.iat > n {
            return Err(AuthError::unauthorized("iat not satisfied"));
        }
        if let Some(aud) = required_audience {
            if !claims.aud.iter().any(|a| a == aud) {
                return Err(AuthError::unauthorized("aud not satisfied"));
            }
        }

        Ok(demangle(claims))
    }

    /// Parses the token's claims *without* verifying its signature —
    /// used only to read `iss` for dispatch (`spec.md` §4.4). Never trust
    /// the result for authorization decisions.
    pub fn peek_issuer(&self, token: &str) -> Result<String> {
        peek_issuer(token)
    }
}

/// Free-standing form of [`TokenCodec::peek_issuer`], used by the
/// `Authenticator` to pick a sub-authenticator before any particular
/// issuer's codec/resolver is known.
pub fn peek_issuer(token: &str) -> Result<String> {
    let payload = token.split('.').nth(1).ok_or_else(|| AuthError::unauthorized("malformed token"))?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| AuthError::unauthorized("malformed token"))?;
    let value: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|_| AuthError::unauthorized("malformed token"))?;
    value
        .get("iss")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| AuthError::unauthorized("missing issuer claim"))
}

fn demangle(claims: RawClaims) -> VerifiedToken {
    let mut private_claims = HashMap::with_capacity(claims.extra.len());
    for (key, value) in claims.extra {
        let Some(stripped) = key.strip_prefix(PRIVATE_CLAIM_PREFIX) else { continue };
        if let serde_json::Value::String(s) = value {
            private_claims.insert(stripped.to_string(), s);
        }
    }

    VerifiedToken {
        subject: claims.sub,
        issuer: claims.iss,
        audience: claims.aud,
        issued_at: claims.iat,
        not_before: claims.nbf,
        expiration: claims.exp,
        jwt_id: claims.jwt_id,
        private_claims,
    }
}
