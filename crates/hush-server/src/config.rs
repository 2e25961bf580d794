//! Server configuration, read from the environment (optionally seeded from
//! a `.env` file).

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    /// When unset, verification codes are logged instead of emailed.
    pub resend_api_key: Option<String>,
    pub mail_from: String,
    pub verify_code_ttl: chrono::Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("HUSH_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("HUSH_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let host = lookup("HUSH_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("HUSH_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("HUSH_PORT must be a port number")?;
        let listen_addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .context("HUSH_HOST must be an IP address")?;

        let db_path: PathBuf = lookup("HUSH_DB_PATH")
            .unwrap_or_else(|| "hush.db".into())
            .into();

        let resend_api_key = lookup("HUSH_RESEND_API_KEY").filter(|k| !k.trim().is_empty());
        let mail_from = lookup("HUSH_MAIL_FROM").unwrap_or_else(|| "onboarding@resend.dev".into());

        let ttl_minutes: i64 = match lookup("HUSH_VERIFY_CODE_TTL_MINUTES") {
            Some(v) => v
                .parse()
                .context("HUSH_VERIFY_CODE_TTL_MINUTES must be a whole number")?,
            None => 10,
        };
        if ttl_minutes <= 0 {
            bail!("HUSH_VERIFY_CODE_TTL_MINUTES must be positive");
        }

        Ok(Self {
            listen_addr,
            db_path,
            jwt_secret,
            resend_api_key,
            mail_from,
            verify_code_ttl: chrono::Duration::minutes(ttl_minutes),
        })
    }
}
