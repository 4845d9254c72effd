use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use rolegate_core::AppError;
use tracing_subscriber::EnvFilter;

const DEFAULT_EVALUATION_TIMEOUT_MS: u64 = 2_000;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub frontend_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub cookie_secure: bool,
    pub evaluation_timeout: Duration,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let database_url = required_env("DATABASE_URL")?;
        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());

        check_session_secret(&required_env("SESSION_SECRET")?)?;

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);
        let cookie_secure = env::var("SESSION_COOKIE_SECURE")
            .unwrap_or_else(|_| "false".to_owned())
            .eq_ignore_ascii_case("true");

        let evaluation_timeout = match env::var("AUTHZ_EVALUATION_TIMEOUT_MS") {
            Ok(value) => parse_timeout_ms(&value)?,
            Err(_) => Duration::from_millis(DEFAULT_EVALUATION_TIMEOUT_MS),
        };

        Ok(Self {
            migrate_only,
            database_url,
            frontend_url,
            api_host,
            api_port,
            cookie_secure,
            evaluation_timeout,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn parse_timeout_ms(value: &str) -> Result<Duration, AppError> {
    match value.trim().parse::<u64>() {
        Ok(milliseconds) if milliseconds > 0 => Ok(Duration::from_millis(milliseconds)),
        _ => Err(AppError::Validation(format!(
            "AUTHZ_EVALUATION_TIMEOUT_MS must be a positive integer, got '{value}'"
        ))),
    }
}

/// Rejects a SESSION_SECRET too short for the sign-in service that shares it.
///
/// The secret is not kept: session cookies are issued and signed by the
/// sign-in service, and this API only reads identities from the shared store.
fn check_session_secret(value: &str) -> Result<(), AppError> {
    if value.len() < 32 {
        return Err(AppError::Validation(
            "SESSION_SECRET must be at least 32 characters".to_owned(),
        ));
    }
    Ok(())
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}
