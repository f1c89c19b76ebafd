use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterMethod {
    Credential,
    Google,
}

impl RegisterMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Credential => "credential",
            Self::Google => "google",
        }
    }
}

impl std::fmt::Display for RegisterMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an account authenticates, as a tagged union: a credential account has
/// a password digest and nothing else, an OAuth account has an external id
/// and no password.
pub enum AccountKind<'a> {
    Credential { password_hash: &'a str },
    OAuth { provider: RegisterMethod, external_id: &'a str },
}

const USER_COLUMNS: &str = "id, name, email, password_hash, register_method, google_id, \
     profile_image, roles, is_verified, refresh_tokens, \
     email_verification_token, email_verification_expires_at, \
     password_reset_token, password_reset_expires_at, created_at, updated_at";

/// User record in the database. Secret material never serializes.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub register_method: String,
    #[serde(skip_serializing)]
    pub google_id: Option<String>,
    pub profile_image: Option<String>,
    pub roles: Vec<String>,
    pub is_verified: bool,
    #[serde(skip_serializing)]
    pub refresh_tokens: Vec<String>,
    #[serde(skip_serializing)]
    pub email_verification_token: Option<String>,
    #[serde(skip_serializing)]
    pub email_verification_expires_at: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    /// Classify the record by its registration method. A record that breaks
    /// the credential/OAuth exclusivity invariant is a server fault.
    pub fn account(&self) -> Result<AccountKind<'_>, AppError> {
        match (self.register_method.as_str(), &self.password_hash, &self.google_id) {
            ("credential", Some(hash), None) => Ok(AccountKind::Credential {
                password_hash: hash,
            }),
            ("google", None, Some(id)) => Ok(AccountKind::OAuth {
                provider: RegisterMethod::Google,
                external_id: id,
            }),
            _ => Err(AppError::Internal(anyhow::anyhow!(
                "user {} has an inconsistent registration method",
                self.id
            ))),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub async fn count(db: &PgPool) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(db)
            .await?;
        Ok(count)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<User>, AppError> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(db)
                .await?;
        Ok(user)
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a password-registered account with its initial verification
    /// token pair already in place. The unique index on email surfaces
    /// duplicates as a Conflict.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_credential(
        db: &PgPool,
        name: &str,
        email: &str,
        password_hash: &str,
        roles: &[String],
        verification_token: &str,
        verification_expires_at: OffsetDateTime,
    ) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users \
                 (name, email, password_hash, register_method, roles, \
                  email_verification_token, email_verification_expires_at) \
             VALUES ($1, $2, $3, 'credential', $4, $5, $6) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(roles)
        .bind(verification_token)
        .bind(verification_expires_at)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Create an account from an OAuth profile. Verified state comes from
    /// the provider's own email_verified flag.
    pub async fn create_oauth(
        db: &PgPool,
        name: &str,
        email: &str,
        google_id: &str,
        profile_image: Option<&str>,
        is_verified: bool,
    ) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users \
                 (name, email, register_method, google_id, profile_image, roles, is_verified) \
             VALUES ($1, $2, 'google', $3, $4, $5, $6) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(name)
        .bind(email)
        .bind(google_id)
        .bind(profile_image)
        .bind(vec![ROLE_USER.to_string()])
        .bind(is_verified)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    // Session store. Each mutation is a single atomic array update, so two
    // concurrent rotations on the same account cannot lose each other's
    // writes.

    pub async fn push_refresh_token(db: &PgPool, id: Uuid, token: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users \
             SET refresh_tokens = array_append(refresh_tokens, $2), updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(token)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn remove_refresh_token(db: &PgPool, id: Uuid, token: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users \
             SET refresh_tokens = array_remove(refresh_tokens, $2), updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(token)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Rotation: map every occurrence of the presented token to its
    /// replacement, leaving other sessions untouched.
    pub async fn replace_refresh_token(
        db: &PgPool,
        id: Uuid,
        old_token: &str,
        new_token: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users \
             SET refresh_tokens = array_replace(refresh_tokens, $2, $3), updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(old_token)
        .bind(new_token)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Reuse detected: revoke every session for the account.
    pub async fn clear_refresh_tokens(db: &PgPool, id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET refresh_tokens = '{}', updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    // One-time token lifecycle. Lookups match the stored digest AND compare
    // expiry against a single now() inside the query.

    pub async fn set_verification_token(
        db: &PgPool,
        id: Uuid,
        hashed_token: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users \
             SET email_verification_token = $2, email_verification_expires_at = $3, \
                 updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(hashed_token)
        .bind(expires_at)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn find_by_verification_token(
        db: &PgPool,
        hashed_token: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE email_verification_token = $1 AND email_verification_expires_at >= now()"
        ))
        .bind(hashed_token)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Consume the verification token: flag verified, clear the pair.
    pub async fn mark_verified(db: &PgPool, id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users \
             SET is_verified = TRUE, email_verification_token = NULL, \
                 email_verification_expires_at = NULL, updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn set_reset_token(
        db: &PgPool,
        id: Uuid,
        hashed_token: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users \
             SET password_reset_token = $2, password_reset_expires_at = $3, updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(hashed_token)
        .bind(expires_at)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn find_by_reset_token(
        db: &PgPool,
        hashed_token: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE password_reset_token = $1 AND password_reset_expires_at >= now()"
        ))
        .bind(hashed_token)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Consume the reset token: install the new digest, clear the pair.
    pub async fn reset_password(
        db: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users \
             SET password_hash = $2, password_reset_token = NULL, \
                 password_reset_expires_at = NULL, updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn list_non_admin(db: &PgPool) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE NOT ($1 = ANY(roles)) ORDER BY created_at"
        ))
        .bind(ROLE_ADMIN)
        .fetch_all(db)
        .await?;
        Ok(users)
    }

    pub async fn update_name(db: &PgPool, id: Uuid, name: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET name = $2, updated_at = now() WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn add_role(db: &PgPool, id: Uuid, role: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET roles = array_append(roles, $2), updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(role)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Alice".into(),
            email: "a@x.com".into(),
            password_hash: Some("$argon2id$fake".into()),
            register_method: "credential".into(),
            google_id: None,
            profile_image: None,
            roles: vec![ROLE_USER.into()],
            is_verified: false,
            refresh_tokens: vec![],
            email_verification_token: None,
            email_verification_expires_at: None,
            password_reset_token: None,
            password_reset_expires_at: None,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn credential_account_classifies_as_credential() {
        let user = sample_user();
        assert!(matches!(
            user.account(),
            Ok(AccountKind::Credential { .. })
        ));
    }

    #[test]
    fn oauth_account_classifies_with_its_external_id() {
        let mut user = sample_user();
        user.register_method = "google".into();
        user.password_hash = None;
        user.google_id = Some("g-123".into());
        match user.account() {
            Ok(AccountKind::OAuth {
                provider,
                external_id,
            }) => {
                assert_eq!(provider, RegisterMethod::Google);
                assert_eq!(external_id, "g-123");
            }
            _ => panic!("expected an OAuth account"),
        }
    }

    #[test]
    fn record_breaking_the_exclusivity_invariant_is_a_server_fault() {
        let mut user = sample_user();
        user.google_id = Some("g-123".into());
        assert!(user.account().is_err());
    }

    #[test]
    fn serialization_never_leaks_secret_material() {
        let mut user = sample_user();
        user.refresh_tokens = vec!["rt-1".into()];
        user.email_verification_token = Some("digest".into());
        let json = serde_json::to_string(&user).expect("serialize");
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("refresh_tokens"));
        assert!(!json.contains("rt-1"));
        assert!(!json.contains("digest"));
        assert!(json.contains("a@x.com"));
    }

    #[test]
    fn has_role_checks_membership() {
        let mut user = sample_user();
        assert!(user.has_role(ROLE_USER));
        assert!(!user.has_role(ROLE_ADMIN));
        user.roles.push(ROLE_ADMIN.into());
        assert!(user.has_role(ROLE_ADMIN));
    }
}
