use axum::{
    extract::{FromRef, Query, State},
    response::Redirect,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use rand::RngCore;
use serde::Deserialize;
use sqlx::PgPool;
use time::Duration;
use tracing::{info, instrument};

use super::{
    handlers::refresh_cookie,
    jwt::JwtKeys,
    repo::{RegisterMethod, User},
};
use crate::{config::GoogleConfig, error::AppError, state::AppState};

const AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

const STATE_COOKIE: &str = "oauth_state";

/// Identity fields returned by Google's userinfo endpoint.
#[derive(Debug, Deserialize)]
pub struct GoogleProfile {
    pub sub: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub picture: Option<String>,
}

fn random_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn authorize_url(config: &GoogleConfig, state: &str) -> Result<url::Url, AppError> {
    url::Url::parse_with_params(
        AUTHORIZE_ENDPOINT,
        &[
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.redirect_url.as_str()),
            ("response_type", "code"),
            ("scope", "email profile"),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
        ],
    )
    .map_err(|e| AppError::Internal(e.into()))
}

fn google_config(state: &AppState) -> Result<&GoogleConfig, AppError> {
    state
        .config
        .google
        .as_ref()
        .ok_or_else(|| AppError::BadRequest("google login is not configured".into()))
}

/// GET /api/v1/auth/google
#[instrument(skip(state, jar))]
pub async fn google_redirect(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    let google = google_config(&state)?;
    let csrf = random_state();
    let url = authorize_url(google, &csrf)?;

    let cookie = Cookie::build((STATE_COOKIE, csrf))
        .http_only(true)
        .secure(state.config.in_production())
        .path("/")
        .max_age(Duration::minutes(10))
        .build();

    Ok((jar.add(cookie), Redirect::temporary(url.as_str())))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub state: String,
}

/// GET /api/v1/auth/google/callback
#[instrument(skip(state, jar, query))]
pub async fn google_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Result<(CookieJar, Redirect), AppError> {
    let google = google_config(&state)?;

    let expected = jar
        .get(STATE_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::Unauthorized("unauthorized request".into()))?;
    if expected != query.state {
        return Err(AppError::Unauthorized("unauthorized request".into()));
    }
    let jar = jar.remove(Cookie::build(STATE_COOKIE).path("/").build());

    let profile = fetch_profile(&state.http, google, &query.code).await?;
    let user = signup_or_login(&state.db, &profile).await?;

    let keys = JwtKeys::from_ref(&state);
    let pair = keys.sign_pair(user.id, &user.name, &user.roles)?;
    User::push_refresh_token(&state.db, user.id, &pair.refresh).await?;

    info!(user_id = %user.id, "google login");
    let target = format!(
        "{}/dashboard?accessToken={}",
        state.config.frontend_url, pair.access
    );
    Ok((
        jar.add(refresh_cookie(pair.refresh, &state.config)),
        Redirect::to(&target),
    ))
}

/// Exchange the authorization code, then fetch the userinfo profile.
async fn fetch_profile(
    http: &reqwest::Client,
    config: &GoogleConfig,
    code: &str,
) -> Result<GoogleProfile, AppError> {
    #[derive(Deserialize)]
    struct TokenExchange {
        access_token: String,
    }

    let exchange: TokenExchange = http
        .post(TOKEN_ENDPOINT)
        .form(&[
            ("code", code),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("redirect_uri", config.redirect_url.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| anyhow::anyhow!("google code exchange failed: {e}"))?
        .json()
        .await
        .map_err(|e| anyhow::anyhow!("google code exchange failed: {e}"))?;

    let profile = http
        .get(USERINFO_ENDPOINT)
        .bearer_auth(exchange.access_token)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| anyhow::anyhow!("google userinfo failed: {e}"))?
        .json::<GoogleProfile>()
        .await
        .map_err(|e| anyhow::anyhow!("google userinfo failed: {e}"))?;

    Ok(profile)
}

/// Match the provider identity to a local account, creating one on first
/// sign-in. A credential-registered email is a hard conflict; the flow stops
/// here rather than silently logging the caller in.
pub(crate) async fn signup_or_login(
    db: &PgPool,
    profile: &GoogleProfile,
) -> Result<User, AppError> {
    if let Some(user) = User::find_by_email(db, &profile.email).await? {
        if user.register_method == RegisterMethod::Credential.as_str() {
            return Err(AppError::Conflict(
                "you had signed up using email and password please use email & password for login"
                    .into(),
            ));
        }
        return Ok(user);
    }

    User::create_oauth(
        db,
        &profile.name,
        &profile.email,
        &profile.sub,
        profile.picture.as_deref(),
        profile.email_verified,
    )
    .await
}
