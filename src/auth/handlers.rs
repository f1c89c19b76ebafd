use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};

use super::{
    dto::{
        ForgotPasswordRequest, LoginRequest, RefreshRequest, RegisterRequest,
        ResetPasswordRequest, TokenResponse,
    },
    extractors::AuthUser,
    jwt::JwtKeys,
    password::{hash_password, verify_password},
    repo::{AccountKind, User, ROLE_ADMIN, ROLE_USER},
    tokens::{hash_token, OneTimeToken},
};
use crate::{
    config::AppConfig,
    error::AppError,
    mail::Email,
    response::MessageResponse,
    state::AppState,
};

pub const REFRESH_COOKIE: &str = "jwt";

pub(crate) fn refresh_cookie(value: String, config: &AppConfig) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, value))
        .http_only(true)
        .secure(config.in_production())
        .path("/")
        .max_age(Duration::minutes(config.jwt.refresh_ttl_minutes))
        .build()
}

fn expired_refresh_cookie(config: &AppConfig) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, ""))
        .http_only(true)
        .secure(config.in_production())
        .path("/")
        .build()
}

fn one_time_expiry(config: &AppConfig) -> OffsetDateTime {
    OffsetDateTime::now_utc() + Duration::minutes(config.one_time_token_ttl_minutes)
}

// The very first account in the system becomes the admin.
fn initial_roles(existing_users: i64) -> Vec<String> {
    if existing_users == 0 {
        vec![ROLE_ADMIN.to_string()]
    } else {
        vec![ROLE_USER.to_string()]
    }
}

#[derive(Debug, PartialEq, Eq)]
enum RotationOutcome {
    Rotate,
    ReuseDetected,
}

/// A signed, unexpired token that is no longer in the session list was
/// already rotated away; presenting it again is a replay.
fn rotation_outcome(sessions: &[String], presented: &str) -> RotationOutcome {
    if sessions.iter().any(|held| held == presented) {
        RotationOutcome::Rotate
    } else {
        RotationOutcome::ReuseDetected
    }
}

fn verification_email(to: &str, config: &AppConfig, token: &str) -> Email {
    let url = format!("{}/api/v1/auth/verify-email/{token}", config.public_url);
    Email {
        to: to.to_string(),
        subject: "email verification".into(),
        text: format!(
            "please click on the below link for email verification\n{url}\nlink will expire after {} minutes",
            config.one_time_token_ttl_minutes
        ),
    }
}

fn reset_email(to: &str, config: &AppConfig, token: &str) -> Email {
    let url = format!("{}/api/v1/auth/reset-password/{token}", config.public_url);
    Email {
        to: to.to_string(),
        subject: "password reset".into(),
        text: format!(
            "please click on the below link for reset password\n{url}\nlink will expire after {} minutes",
            config.one_time_token_ttl_minutes
        ),
    }
}

/// POST /api/v1/auth/register
#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let payload = payload.validate()?;

    let roles = initial_roles(User::count(&state.db).await?);

    let token = OneTimeToken::generate();
    let password_hash = hash_password(&payload.password)?;
    let user = User::create_credential(
        &state.db,
        &payload.name,
        &payload.email,
        &password_hash,
        &roles,
        &token.hashed,
        one_time_expiry(&state.config),
    )
    .await?;

    state
        .mailer
        .send(verification_email(&user.email, &state.config, &token.plain))
        .await?;

    info!(user_id = %user.id, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(
            "verification email has been sent to your mail address",
        )),
    ))
}

/// POST /api/v1/auth/resend-email-verification
#[instrument(skip(state))]
pub async fn resend_email_verification(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<MessageResponse>, AppError> {
    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| AppError::NotFound("user does not exist".into()))?;

    if user.is_verified {
        return Err(AppError::BadRequest("email already verified".into()));
    }

    let token = OneTimeToken::generate();
    User::set_verification_token(
        &state.db,
        user.id,
        &token.hashed,
        one_time_expiry(&state.config),
    )
    .await?;

    // The freshly persisted token stays valid even if the send fails.
    state
        .mailer
        .send(verification_email(&user.email, &state.config, &token.plain))
        .await
        .map_err(AppError::MailDispatch)?;

    Ok(Json(MessageResponse::new(
        "email has been sent to your mail address for email verification",
    )))
}

/// GET /api/v1/auth/verify-email/:token
#[instrument(skip(state, token))]
pub async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    // Unknown and expired tokens are indistinguishable to the caller.
    let user = User::find_by_verification_token(&state.db, &hash_token(&token))
        .await?
        .ok_or_else(|| {
            AppError::NotFound(
                "verification token is invalid or expire please request a new one".into(),
            )
        })?;

    User::mark_verified(&state.db, user.id).await?;
    info!(user_id = %user.id, "email verified");
    Ok(Json(MessageResponse::new("your email is verified now")))
}

/// POST /api/v1/auth/login
#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<TokenResponse>), AppError> {
    let payload = payload.validate()?;

    // Unknown email, OAuth-only account and wrong password all collapse into
    // the same response.
    let incorrect = || AppError::NotFound("incorrect email or password".into());

    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(incorrect)?;
    let password_hash = match user.account()? {
        AccountKind::Credential { password_hash } => password_hash,
        AccountKind::OAuth { .. } => return Err(incorrect()),
    };
    if !verify_password(&payload.password, password_hash)? {
        warn!(user_id = %user.id, "login password mismatch");
        return Err(incorrect());
    }

    let keys = JwtKeys::from_ref(&state);
    let pair = keys.sign_pair(user.id, &user.name, &user.roles)?;
    User::push_refresh_token(&state.db, user.id, &pair.refresh).await?;

    info!(user_id = %user.id, "user logged in");
    Ok((
        jar.add(refresh_cookie(pair.refresh, &state.config)),
        Json(TokenResponse::new(pair.access, Some("logged in successfully"))),
    ))
}

/// POST /api/v1/auth/logout
#[instrument(skip(state, jar))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>), AppError> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::Unauthorized("unauthorized request".into()))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| AppError::NotFound("user does not exist".into()))?;

    User::remove_refresh_token(&state.db, user.id, &token).await?;

    info!(user_id = %user.id, "user logged out");
    Ok((
        jar.remove(expired_refresh_cookie(&state.config)),
        Json(MessageResponse::new("logged out successfully")),
    ))
}

/// POST /api/v1/auth/refresh-token
///
/// Rotates the presented refresh token in place. A signed, unexpired token
/// that is no longer in the account's session list is treated as replayed:
/// every session is revoked.
#[instrument(skip(state, jar, payload))]
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Option<Json<RefreshRequest>>,
) -> Result<(CookieJar, Json<TokenResponse>), AppError> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| payload.and_then(|Json(body)| body.refresh_token))
        .ok_or_else(|| AppError::Unauthorized("unauthorized request".into()))?;

    let keys = JwtKeys::from_ref(&state);
    // Expired and invalid tokens look the same to the client here; the
    // distinction only reaches the log.
    let claims = keys.verify_refresh(&token).map_err(|err| {
        warn!(error = %err, "refresh token rejected");
        AppError::Unauthorized("unauthorized request".into())
    })?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("user does not exist".into()))?;

    if rotation_outcome(&user.refresh_tokens, &token) == RotationOutcome::ReuseDetected {
        // Replay of an already-rotated token: force a global logout.
        User::clear_refresh_tokens(&state.db, user.id).await?;
        warn!(user_id = %user.id, "refresh token reuse detected");
        return Err(AppError::Unauthorized(
            "access denied token reuse detected".into(),
        ));
    }

    let pair = keys.sign_pair(user.id, &user.name, &user.roles)?;
    User::replace_refresh_token(&state.db, user.id, &token, &pair.refresh).await?;

    Ok((
        jar.add(refresh_cookie(pair.refresh, &state.config)),
        Json(TokenResponse::new(pair.access, None)),
    ))
}

/// POST /api/v1/auth/forgot-password
#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let payload = payload.validate()?;

    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| AppError::NotFound("user does not exist".into()))?;

    if let AccountKind::OAuth { provider, .. } = user.account()? {
        return Err(AppError::BadRequest(format!(
            "you had signed up using {provider} please use continue with {provider} for login"
        )));
    }

    let token = OneTimeToken::generate();
    User::set_reset_token(
        &state.db,
        user.id,
        &token.hashed,
        one_time_expiry(&state.config),
    )
    .await?;

    state
        .mailer
        .send(reset_email(&user.email, &state.config, &token.plain))
        .await
        .map_err(AppError::MailDispatch)?;

    Ok(Json(MessageResponse::new(
        "email has been sent to your mail address for reset password",
    )))
}

/// POST /api/v1/auth/reset-password/:token
#[instrument(skip(state, token, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let payload = payload.validate()?;

    let user = User::find_by_reset_token(&state.db, &hash_token(&token))
        .await?
        .ok_or_else(|| {
            AppError::NotFound(
                "password reset token is invalid or expire please request a new one".into(),
            )
        })?;

    let password_hash = hash_password(&payload.password)?;
    User::reset_password(&state.db, user.id, &password_hash).await?;

    info!(user_id = %user.id, "password reset");
    Ok(Json(MessageResponse::new(
        "your password has been reset successfully",
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;

    #[tokio::test]
    async fn refresh_cookie_is_http_only_and_bounded() {
        let state = AppState::fake();
        let cookie = refresh_cookie("tok".into(), &state.config);
        assert_eq!(cookie.name(), "jwt");
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::minutes(60)));
        // Fake state is development: the secure flag follows the environment.
        assert_eq!(cookie.secure(), Some(false));
    }

    #[tokio::test]
    async fn verification_email_embeds_the_plaintext_token() {
        let state = AppState::fake();
        let email = verification_email("a@x.com", &state.config, "tok123");
        assert_eq!(email.to, "a@x.com");
        assert_eq!(email.subject, "email verification");
        assert!(email
            .text
            .contains("http://localhost:8080/api/v1/auth/verify-email/tok123"));
        assert!(email.text.contains("15 minutes"));
    }

    #[tokio::test]
    async fn reset_email_points_at_the_reset_route() {
        let state = AppState::fake();
        let email = reset_email("a@x.com", &state.config, "tok123");
        assert_eq!(email.subject, "password reset");
        assert!(email
            .text
            .contains("http://localhost:8080/api/v1/auth/reset-password/tok123"));
    }

    #[test]
    fn first_registrant_becomes_admin() {
        assert_eq!(initial_roles(0), vec![ROLE_ADMIN.to_string()]);
        assert_eq!(initial_roles(1), vec![ROLE_USER.to_string()]);
        assert_eq!(initial_roles(42), vec![ROLE_USER.to_string()]);
    }

    #[test]
    fn held_token_rotates() {
        let sessions = vec!["rt-1".to_string(), "rt-2".to_string()];
        assert_eq!(rotation_outcome(&sessions, "rt-2"), RotationOutcome::Rotate);
    }

    #[test]
    fn rotated_away_token_counts_as_reuse() {
        // The list holds the replacement; the old token was consumed.
        let sessions = vec!["rt-2".to_string()];
        assert_eq!(
            rotation_outcome(&sessions, "rt-1"),
            RotationOutcome::ReuseDetected
        );
    }

    #[test]
    fn empty_session_list_counts_as_reuse() {
        assert_eq!(
            rotation_outcome(&[], "rt-1"),
            RotationOutcome::ReuseDetected
        );
    }

    #[tokio::test]
    async fn one_time_expiry_is_in_the_future() {
        let state = AppState::fake();
        let expiry = one_time_expiry(&state.config);
        let lead = expiry - OffsetDateTime::now_utc();
        assert!(lead > Duration::minutes(14));
        assert!(lead <= Duration::minutes(15));
    }
}
