use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value {
            "production" => Self::Production,
            _ => Self::Development,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database_url: String,
    /// Base URL this server is reachable at, used in emailed links.
    pub public_url: String,
    /// Where the OAuth callback redirects the browser after login.
    pub frontend_url: String,
    /// Lifetime of email-verification and password-reset tokens.
    pub one_time_token_ttl_minutes: i64,
    pub jwt: JwtConfig,
    pub smtp: SmtpConfig,
    pub google: Option<GoogleConfig>,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let public_url = env_or("PUBLIC_URL", "http://localhost:8080");

        let jwt = JwtConfig {
            access_secret: std::env::var("JWT_ACCESS_TOKEN_SECRET")?,
            refresh_secret: std::env::var("JWT_REFRESH_TOKEN_SECRET")?,
            access_ttl_minutes: env_parsed("JWT_ACCESS_TTL_MINUTES", 15),
            refresh_ttl_minutes: env_parsed("JWT_REFRESH_TTL_MINUTES", 60 * 24),
        };

        let smtp = SmtpConfig {
            host: env_or("SMTP_HOST", "localhost"),
            port: env_parsed("SMTP_PORT", 1025),
            username: env_or("SMTP_USERNAME", ""),
            password: env_or("SMTP_PASSWORD", ""),
            from: env_or("SMTP_FROM", "admin@authgate.local"),
        };

        // Google login stays disabled unless both halves of the client are set.
        let google = match (
            std::env::var("GOOGLE_CLIENT_ID"),
            std::env::var("GOOGLE_CLIENT_SECRET"),
        ) {
            (Ok(client_id), Ok(client_secret)) => Some(GoogleConfig {
                client_id,
                client_secret,
                redirect_url: env_or(
                    "GOOGLE_REDIRECT_URL",
                    &format!("{public_url}/api/v1/auth/google/callback"),
                ),
            }),
            _ => None,
        };

        Ok(Self {
            environment: Environment::parse(&env_or("APP_ENV", "development")),
            database_url,
            public_url,
            frontend_url: env_or("FRONTEND_URL", "http://localhost:5000"),
            one_time_token_ttl_minutes: env_parsed("ONE_TIME_TOKEN_TTL_MINUTES", 15),
            jwt,
            smtp,
            google,
        })
    }

    pub fn in_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_environment_falls_back_to_development() {
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse("staging"), Environment::Development);
        assert_eq!(Environment::parse(""), Environment::Development);
    }
}
