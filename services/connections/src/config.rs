use std::time::Duration;

/// Connections service configuration loaded from environment variables.
#[derive(Debug)]
pub struct ConnectionsConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// TCP port to listen on (default 3114). Env var: `CONNECTIONS_PORT`.
    pub connections_port: u16,
    /// Bound on each store call (default 5000 ms). Env var: `STORE_TIMEOUT_MS`.
    pub store_timeout: Duration,
    /// Period of the lapsed-OTP sweep (default 60 s). Env var: `EXPIRY_SWEEP_INTERVAL_SECS`.
    pub expiry_sweep_interval: Duration,
}

impl ConnectionsConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").expect("DATABASE_URL"),
            connections_port: parse_env("CONNECTIONS_PORT").unwrap_or(3114),
            store_timeout: Duration::from_millis(parse_env("STORE_TIMEOUT_MS").unwrap_or(5_000)),
            expiry_sweep_interval: Duration::from_secs(
                parse_env::<u64>("EXPIRY_SWEEP_INTERVAL_SECS")
                    .unwrap_or(60)
                    .max(1),
            ),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
