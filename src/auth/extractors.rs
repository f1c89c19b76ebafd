use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use super::jwt::{AccessClaims, JwtKeys};
use crate::auth::repo::ROLE_ADMIN;
use crate::error::AppError;

/// Bearer-token identity. Verifies the access token and carries its decoded
/// claims; no database round-trip on this path.
#[derive(Debug)]
pub struct AuthUser(pub AccessClaims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("please login".into()))?;

        // Browsers that stringify a missing token literally send "null".
        let token = header
            .strip_prefix("Bearer ")
            .filter(|t| !t.is_empty() && *t != "null")
            .ok_or_else(|| AppError::Unauthorized("please login".into()))?;

        let claims = keys.verify_access(token)?;
        Ok(AuthUser(claims))
    }
}

pub(crate) fn authorized(user_roles: &[String], allowed: &[&str]) -> bool {
    allowed
        .iter()
        .any(|role| user_roles.iter().any(|held| held == role))
}

/// Admin-only identity: `AuthUser` plus a role-intersection check.
#[derive(Debug)]
pub struct RequireAdmin(pub AccessClaims);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if !authorized(&claims.roles, &[ROLE_ADMIN]) {
            return Err(AppError::Forbidden);
        }
        Ok(RequireAdmin(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use axum::http::Request;
    use uuid::Uuid;

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/v1/users/profile");
        if let Some(value) = value {
            builder = builder.header("Authorization", value);
        }
        let (parts, ()) = builder.body(()).expect("request").into_parts();
        parts
    }

    fn signed_token(state: &AppState, roles: &[&str]) -> String {
        let roles: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
        JwtKeys::from_ref(state)
            .sign_access(Uuid::new_v4(), "Alice", &roles)
            .expect("sign")
    }

    #[tokio::test]
    async fn missing_header_asks_the_caller_to_login() {
        let state = AppState::fake();
        let mut parts = parts_with_auth(None);
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == "please login"));
    }

    #[tokio::test]
    async fn literal_null_token_is_treated_as_missing() {
        let state = AppState::fake();
        let mut parts = parts_with_auth(Some("Bearer null"));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == "please login"));
    }

    #[tokio::test]
    async fn wrong_scheme_is_rejected() {
        let state = AppState::fake();
        let mut parts = parts_with_auth(Some("Basic abc"));
        assert!(AuthUser::from_request_parts(&mut parts, &state)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn garbage_token_is_invalid() {
        let state = AppState::fake();
        let mut parts = parts_with_auth(Some("Bearer not.a.jwt"));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TokenInvalid));
    }

    #[tokio::test]
    async fn valid_token_attaches_claims() {
        let state = AppState::fake();
        let token = signed_token(&state, &["user"]);
        let mut parts = parts_with_auth(Some(&format!("Bearer {token}")));
        let AuthUser(claims) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("authenticated");
        assert_eq!(claims.name, "Alice");
        assert_eq!(claims.roles, vec!["user".to_string()]);
    }

    #[tokio::test]
    async fn non_admin_is_forbidden_not_unauthorized() {
        let state = AppState::fake();
        let token = signed_token(&state, &["user"]);
        let mut parts = parts_with_auth(Some(&format!("Bearer {token}")));
        let err = RequireAdmin::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[tokio::test]
    async fn admin_passes_the_role_check() {
        let state = AppState::fake();
        let token = signed_token(&state, &["user", "admin"]);
        let mut parts = parts_with_auth(Some(&format!("Bearer {token}")));
        assert!(RequireAdmin::from_request_parts(&mut parts, &state)
            .await
            .is_ok());
    }

    #[test]
    fn authorization_is_set_intersection() {
        let roles = vec!["user".to_string()];
        assert!(authorized(&roles, &["user", "admin"]));
        assert!(!authorized(&roles, &["admin"]));
        assert!(!authorized(&[], &["admin"]));
    }
}
