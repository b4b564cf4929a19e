use modular_events::ConfigError;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for in-flight requests (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// SQLite database URL (default: `sqlite://modular_framework.db`).
    pub database_url: String,
    /// Connection pool size (default: `5`).
    pub database_max_connections: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            cors_origins: vec!["http://localhost:5173".into()],
            request_timeout_secs: 30,
            shutdown_timeout_secs: 30,
            database_url: "sqlite://modular_framework.db".into(),
            database_max_connections: 5,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                         |
    /// |----------------------------|---------------------------------|
    /// | `HOST`                     | `0.0.0.0`                       |
    /// | `PORT`                     | `3000`                          |
    /// | `CORS_ORIGINS`             | `http://localhost:5173`         |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                            |
    /// | `SHUTDOWN_TIMEOUT_SECS`    | `30`                            |
    /// | `DATABASE_URL`             | `sqlite://modular_framework.db` |
    /// | `DATABASE_MAX_CONNECTIONS` | `5`                             |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("HOST").unwrap_or(defaults.host);
        let port = parse_var(&lookup, "PORT", defaults.port)?;

        let cors_origins = match lookup("CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.cors_origins,
        };

        let request_timeout_secs =
            parse_var(&lookup, "REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?;
        let shutdown_timeout_secs =
            parse_var(&lookup, "SHUTDOWN_TIMEOUT_SECS", defaults.shutdown_timeout_secs)?;

        let database_url = lookup("DATABASE_URL").unwrap_or(defaults.database_url);
        let database_max_connections = parse_var(
            &lookup,
            "DATABASE_MAX_CONNECTIONS",
            defaults.database_max_connections,
        )?;

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            database_url,
            database_max_connections,
        })
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_env() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn cors_origins_are_split_and_trimmed() {
        let config = ServerConfig::from_lookup(|var| {
            (var == "CORS_ORIGINS").then(|| "https://a.example, ,https://b.example".to_string())
        })
        .unwrap();
        assert_eq!(
            config.cors_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn bad_port_is_reported() {
        let err =
            ServerConfig::from_lookup(|var| (var == "PORT").then(|| "70000".to_string()))
                .unwrap_err();
        assert_eq!(err.var, "PORT");
        assert_eq!(err.value, "70000");
    }
}
