//! JWT access token issuance and verification.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use super::{AuthConfig, AuthError, TokenError};
use crate::models::auth::AccessClaims;

/// The only algorithm accepted on either side.
const ALGORITHM: Algorithm = Algorithm::HS256;

/// Symmetric signing secret, supplied once at process start.
#[derive(Clone)]
pub struct SigningSecret(Vec<u8>);

impl SigningSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, AuthError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(AuthError::Validation("signing secret must not be empty".into()));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}

/// Issues and validates HS256 access tokens.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    ttl: Duration,
    leeway: Duration,
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSigner")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("ttl", &self.ttl)
            .field("leeway", &self.leeway)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(secret: &SigningSecret, config: &AuthConfig) -> Result<Self, AuthError> {
        config.validate()?;

        // Expiry and not-before are checked by hand so they can be reported
        // separately and evaluated against an explicit clock.
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_audience(&[config.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "aud", "sub"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            ttl: config.access_token_ttl,
            leeway: config.leeway,
        })
    }

    /// Access token lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Generate a signed access token for a user.
    pub fn issue(&self, user_id: Uuid, username: &str) -> Result<String, AuthError> {
        self.issue_at(user_id, username, Utc::now())
    }

    /// Generate a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        user_id: Uuid,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let iat = now.timestamp();
        let exp = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::Internal("access token expiry out of range".into()))?
            .timestamp();
        let claims = AccessClaims {
            sub: user_id.to_string(),
            user_id,
            username: username.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat,
            nbf: iat,
            exp,
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::new(ALGORITHM), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Verify a token, returning its claims.
    pub fn validate(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.validate_at(token, Utc::now())
    }

    /// Verify a token against an explicit clock.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, TokenError> {
        let claims = decode::<AccessClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| classify(e.kind()))?
            .claims;

        let now = now.timestamp();
        let leeway = self.leeway.num_seconds();
        if now > claims.exp + leeway {
            return Err(TokenError::Expired);
        }
        if now < claims.nbf - leeway {
            return Err(TokenError::NotYetValid);
        }
        Ok(claims)
    }
}

fn classify(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::InvalidSignature,
        ErrorKind::InvalidIssuer | ErrorKind::InvalidAudience | ErrorKind::InvalidSubject => {
            TokenError::InvalidClaims
        }
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::ImmatureSignature => TokenError::NotYetValid,
        _ => TokenError::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    use super::*;

    fn secret(s: &str) -> SigningSecret {
        SigningSecret::new(s.as_bytes()).unwrap()
    }

    fn signer() -> TokenSigner {
        TokenSigner::new(&secret("supersecret"), &AuthConfig::default()).unwrap()
    }

    #[test]
    fn issue_then_validate() {
        let m = signer();
        let uid = Uuid::new_v4();
        let token = m.issue(uid, "testusername").unwrap();
        assert!(!token.is_empty());

        let claims = m.validate(&token).unwrap();
        assert_eq!(claims.user_id, uid);
        assert_eq!(claims.sub, uid.to_string());
        assert_eq!(claims.username, "testusername");
        assert_eq!(claims.iss, "optio");
        assert_eq!(claims.aud, "optio-api");
        assert_eq!(claims.iat, claims.nbf);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn short_ttl_still_round_trips() {
        let config = AuthConfig {
            access_token_ttl: Duration::seconds(1),
            ..AuthConfig::default()
        };
        let m = TokenSigner::new(&secret("supersecret"), &config).unwrap();
        let uid = Uuid::new_v4();
        let claims = m.validate(&m.issue(uid, "u").unwrap()).unwrap();
        assert_eq!(claims.user_id, uid);
    }

    #[test]
    fn expiry_past_the_calendar_is_an_error() {
        let m = signer();
        assert!(matches!(
            m.issue_at(Uuid::new_v4(), "u", DateTime::<Utc>::MAX_UTC),
            Err(AuthError::Internal(_))
        ));
    }

    #[test]
    fn every_token_has_its_own_id() {
        let m = signer();
        let uid = Uuid::new_v4();
        let a = m.validate(&m.issue(uid, "u").unwrap()).unwrap();
        let b = m.validate(&m.issue(uid, "u").unwrap()).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn wrong_secret_is_invalid_signature() {
        let correct = signer();
        let wrong = TokenSigner::new(&secret("wrongsecret"), &AuthConfig::default()).unwrap();
        let token = correct.issue(Uuid::new_v4(), "username").unwrap();
        assert_eq!(wrong.validate(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn foreign_algorithm_is_rejected() {
        let m = signer();
        let now = Utc::now();
        let uid = Uuid::new_v4();
        let claims = AccessClaims {
            sub: uid.to_string(),
            user_id: uid,
            username: "username".into(),
            iss: "optio".into(),
            aud: "optio-api".into(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret(b"supersecret"),
        )
        .unwrap();
        assert_eq!(m.validate(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn unsigned_token_is_rejected() {
        let m = signer();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let uid = Uuid::new_v4();
        let now = Utc::now().timestamp();
        let payload = URL_SAFE_NO_PAD.encode(
            format!(
                r#"{{"sub":"{uid}","user_id":"{uid}","username":"x","iss":"optio","aud":"optio-api","iat":{now},"nbf":{now},"exp":{},"jti":"j"}}"#,
                now + 600
            )
            .as_bytes(),
        );
        let token = format!("{header}.{payload}.");
        assert!(m.validate(&token).is_err());
    }

    #[test]
    fn garbage_is_malformed() {
        let m = signer();
        assert_eq!(m.validate("not-a-token"), Err(TokenError::Malformed));
        assert_eq!(m.validate(""), Err(TokenError::Malformed));
    }

    #[test]
    fn other_audience_is_invalid_claims() {
        let m = signer();
        let other = TokenSigner::new(
            &secret("supersecret"),
            &AuthConfig {
                audience: "someone-else".into(),
                ..AuthConfig::default()
            },
        )
        .unwrap();
        let token = other.issue(Uuid::new_v4(), "u").unwrap();
        assert_eq!(m.validate(&token), Err(TokenError::InvalidClaims));
    }

    #[test]
    fn expired_past_leeway() {
        let m = signer();
        let issued = Utc::now() - Duration::hours(2);
        let token = m.issue_at(Uuid::new_v4(), "u", issued).unwrap();
        assert_eq!(m.validate(&token), Err(TokenError::Expired));
    }

    #[test]
    fn expiry_within_leeway_is_accepted() {
        let m = signer();
        let now = Utc::now();
        let token = m.issue_at(Uuid::new_v4(), "u", now).unwrap();
        let just_after = now + m.ttl() + Duration::seconds(30);
        assert!(m.validate_at(&token, just_after).is_ok());
        let well_after = now + m.ttl() + Duration::seconds(120);
        assert_eq!(m.validate_at(&token, well_after), Err(TokenError::Expired));
    }

    #[test]
    fn not_yet_valid_before_leeway() {
        let m = signer();
        let now = Utc::now();
        let token = m.issue_at(Uuid::new_v4(), "u", now + Duration::hours(1)).unwrap();
        assert_eq!(m.validate_at(&token, now), Err(TokenError::NotYetValid));

        let slightly_early = m.issue_at(Uuid::new_v4(), "u", now + Duration::seconds(30)).unwrap();
        assert!(m.validate_at(&slightly_early, now).is_ok());
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(
            SigningSecret::new(Vec::new()),
            Err(AuthError::Validation(_))
        ));
    }

    #[test]
    fn secret_is_redacted_in_debug() {
        let s = secret("supersecret");
        assert!(!format!("{s:?}").contains("supersecret"));
        assert!(!format!("{:?}", signer()).contains("supersecret"));
    }
}
