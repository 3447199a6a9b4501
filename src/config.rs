use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Superuser created at startup when both credentials are configured.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub page_size: i64,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "wardbook".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "wardbook-clients".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        let bootstrap_admin = match (
            std::env::var("BOOTSTRAP_ADMIN_USERNAME"),
            std::env::var("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) => Some(BootstrapAdmin {
                username,
                password,
                email: std::env::var("BOOTSTRAP_ADMIN_EMAIL").unwrap_or_default(),
            }),
            _ => None,
        };
        Ok(Self {
            database_url,
            jwt,
            page_size: env_or("PAGE_SIZE", 20),
            bootstrap_admin,
        })
    }
}
