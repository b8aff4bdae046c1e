use chrono::Duration;
use std::env;

/// Development-only signing secret. Production refuses to start without `JWT_SECRET`.
const LOCAL_JWT_SECRET: &str = "local-development-jwt-secret";

/// AppConfig
///
/// The service's whole configuration, loaded once at startup and immutable after.
/// Handlers read it from the shared `AppState`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker; decides fail-fast strictness and log format.
    pub env: Env,
    // Postgres connection string. `None` (local only) runs on the in-memory store.
    pub db_url: Option<String>,
    pub db_max_connections: u32,
    // HS256 secret for issuing and verifying credential tokens.
    pub jwt_secret: String,
    // Lifetime of an issued token, in seconds.
    pub token_ttl_secs: i64,
    pub bind_addr: String,
}

/// Env
///
/// `Local` tolerates missing settings with development defaults; `Production`
/// panics on any missing secret.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Safe values for tests: local env, no database, a fixed secret.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            db_max_connections: 5,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            token_ttl_secs: 3600,
            bind_addr: "0.0.0.0:3005".to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from the environment (call `dotenv` first).
    ///
    /// # Panics
    /// In `Production`, when `JWT_SECRET` or `DATABASE_URL` is unset. Numeric
    /// settings that do not parse also panic, in every environment.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let (jwt_secret, db_url) = match env {
            Env::Production => (
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production."),
                Some(
                    env::var("DATABASE_URL")
                        .expect("FATAL: DATABASE_URL must be set in production."),
                ),
            ),
            Env::Local => (
                env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
                env::var("DATABASE_URL").ok(),
            ),
        };

        let token_ttl_secs = parse_var("JWT_TTL_SECONDS", 3600);
        let db_max_connections = parse_var("DATABASE_MAX_CONNECTIONS", 5);
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3005".to_string());

        Self {
            env,
            db_url,
            db_max_connections,
            jwt_secret,
            token_ttl_secs,
            bind_addr,
        }
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::seconds(self.token_ttl_secs)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("FATAL: {name} must be a number, got '{raw}'")),
        Err(_) => default,
    }
}
