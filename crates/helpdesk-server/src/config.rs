use std::path::PathBuf;

use anyhow::{Context, bail};
use chrono::Duration;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

/// Longest accepted session lifetime, ten years.
const MAX_SESSION_TTL_HOURS: i64 = 87_600;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub session_ttl: Duration,
    /// Dashboard meta-refresh interval; `None` disables it.
    pub refresh_secs: Option<u64>,
    pub enforce_closed_chat: bool,
    /// Seed admin created at start-up when no admin account exists yet.
    pub bootstrap_admin: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = var("HELPDESK_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("HELPDESK_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let port: u16 = var("HELPDESK_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("HELPDESK_PORT must be a port number")?;
        let session_ttl_hours: i64 = var("HELPDESK_SESSION_TTL_HOURS")
            .unwrap_or_else(|| "720".into())
            .parse()
            .context("HELPDESK_SESSION_TTL_HOURS must be a whole number of hours")?;
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&session_ttl_hours) {
            bail!("HELPDESK_SESSION_TTL_HOURS must be between 1 and {}", MAX_SESSION_TTL_HOURS);
        }
        let Some(session_ttl) = Duration::try_hours(session_ttl_hours) else {
            bail!("HELPDESK_SESSION_TTL_HOURS is out of range");
        };
        let refresh_secs = var("HELPDESK_REFRESH_SECS")
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("HELPDESK_REFRESH_SECS must be a number of seconds")?;
        let enforce_closed_chat = var("HELPDESK_ENFORCE_CLOSED_CHAT")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);

        let bootstrap_admin = match (var("HELPDESK_ADMIN_LOGIN"), var("HELPDESK_ADMIN_PASSWORD")) {
            (Some(login), Some(password)) => Some((login, password)),
            (None, None) => None,
            _ => bail!("HELPDESK_ADMIN_LOGIN and HELPDESK_ADMIN_PASSWORD must be set together"),
        };

        Ok(Self {
            host: var("HELPDESK_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: var("HELPDESK_DB_PATH").unwrap_or_else(|| "helpdesk.db".into()).into(),
            jwt_secret,
            session_ttl,
            refresh_secs,
            enforce_closed_chat,
            bootstrap_admin,
        })
    }
}
