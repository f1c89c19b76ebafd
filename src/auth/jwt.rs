use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{config::JwtConfig, error::AppError, state::AppState};

/// Claims carried by a short-lived access token. Trusted without a database
/// round-trip on every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub name: String,
    pub roles: Vec<String>,
    pub iat: usize,
    pub exp: usize,
}

/// Minimal claims for the longer-lived refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub iat: usize,
    pub exp: usize,
}

pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Signing/verification material for both token kinds. Access and refresh
/// tokens use separate secrets, so one can never pass for the other.
#[derive(Clone)]
pub struct JwtKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::new(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            access_ttl: Duration::from_secs((config.access_ttl_minutes.max(0) as u64) * 60),
            refresh_ttl: Duration::from_secs((config.refresh_ttl_minutes.max(0) as u64) * 60),
        }
    }

    pub fn sign_access(
        &self,
        user_id: Uuid,
        name: &str,
        roles: &[String],
    ) -> Result<String, AppError> {
        let (iat, exp) = stamp(self.access_ttl);
        let claims = AccessClaims {
            sub: user_id,
            name: name.to_string(),
            roles: roles.to_vec(),
            iat,
            exp,
        };
        let token = encode(&Header::default(), &claims, &self.access_encoding)
            .map_err(|e| AppError::Internal(e.into()))?;
        debug!(user_id = %user_id, "access token signed");
        Ok(token)
    }

    pub fn sign_refresh(&self, user_id: Uuid) -> Result<String, AppError> {
        let (iat, exp) = stamp(self.refresh_ttl);
        let claims = RefreshClaims {
            sub: user_id,
            iat,
            exp,
        };
        let token = encode(&Header::default(), &claims, &self.refresh_encoding)
            .map_err(|e| AppError::Internal(e.into()))?;
        debug!(user_id = %user_id, "refresh token signed");
        Ok(token)
    }

    pub fn sign_pair(
        &self,
        user_id: Uuid,
        name: &str,
        roles: &[String],
    ) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access: self.sign_access(user_id, name, roles)?,
            refresh: self.sign_refresh(user_id)?,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, AppError> {
        decode::<AccessClaims>(token, &self.access_decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(map_decode_error)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, AppError> {
        decode::<RefreshClaims>(token, &self.refresh_decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(map_decode_error)
    }
}

fn stamp(ttl: Duration) -> (usize, usize) {
    let now = OffsetDateTime::now_utc();
    let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
    (now.unix_timestamp() as usize, exp.unix_timestamp() as usize)
}

fn map_decode_error(err: jsonwebtoken::errors::Error) -> AppError {
    match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::TokenInvalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            access_secret: "test-access-secret".into(),
            refresh_secret: "test-refresh-secret".into(),
            access_ttl_minutes: 15,
            refresh_ttl_minutes: 60,
        })
    }

    #[test]
    fn access_token_roundtrip_carries_identity_and_roles() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let roles = vec!["user".to_string()];
        let token = keys
            .sign_access(user_id, "Alice", &roles)
            .expect("sign access");
        let claims = keys.verify_access(&token).expect("verify access");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.name, "Alice");
        assert_eq!(claims.roles, roles);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn refresh_token_roundtrip_carries_only_the_id() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign_refresh(user_id).expect("sign refresh");
        let claims = keys.verify_refresh(&token).expect("verify refresh");
        assert_eq!(claims.sub, user_id);
    }

    #[test]
    fn refresh_token_never_passes_access_verification() {
        let keys = make_keys();
        let token = keys.sign_refresh(Uuid::new_v4()).expect("sign refresh");
        let err = keys.verify_access(&token).unwrap_err();
        assert!(matches!(err, AppError::TokenInvalid));
    }

    #[test]
    fn garbage_is_invalid_not_expired() {
        let keys = make_keys();
        let err = keys.verify_access("not.a.jwt").unwrap_err();
        assert!(matches!(err, AppError::TokenInvalid));
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let keys = make_keys();
        // Hand-encode claims whose exp is decades in the past.
        let claims = AccessClaims {
            sub: Uuid::new_v4(),
            name: "Alice".into(),
            roles: vec!["user".into()],
            iat: 1_000_000,
            exp: 1_000_900,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-access-secret"),
        )
        .expect("encode");
        let err = keys.verify_access(&token).unwrap_err();
        assert!(matches!(err, AppError::TokenExpired));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let keys = make_keys();
        let mut token = keys
            .sign_access(Uuid::new_v4(), "Alice", &["user".to_string()])
            .expect("sign access");
        token.pop();
        token.push('A');
        assert!(keys.verify_access(&token).is_err());
    }
}
