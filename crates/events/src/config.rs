use std::time::Duration;

/// Tuning for the event bus, loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Maximum number of subscriber callbacks running at once (default: `5`).
    pub max_workers: usize,
    /// How long a dispatched event is remembered for duplicate detection
    /// (default: one hour).
    pub idempotency_window: Duration,
    /// Upper bound on remembered events; the oldest are evicted first
    /// (default: `100000`).
    pub idempotency_capacity: usize,
    /// Whether published events are written to the store (default: `true`).
    pub persistence_enabled: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_workers: 5,
            idempotency_window: Duration::from_secs(3600),
            idempotency_capacity: 100_000,
            persistence_enabled: true,
        }
    }
}

/// An environment variable held a value that could not be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{var} has invalid value '{value}': {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

impl BusConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                              | Default  |
    /// |--------------------------------------|----------|
    /// | `EVENT_BUS_MAX_WORKERS`              | `5`      |
    /// | `EVENT_BUS_IDEMPOTENCY_WINDOW_SECS`  | `3600`   |
    /// | `EVENT_BUS_IDEMPOTENCY_CAPACITY`     | `100000` |
    /// | `EVENT_PERSISTENCE_ENABLED`          | `true`   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_workers = parse_var(&lookup, "EVENT_BUS_MAX_WORKERS", defaults.max_workers)?;
        if max_workers == 0 {
            return Err(ConfigError {
                var: "EVENT_BUS_MAX_WORKERS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        let window_secs = parse_var(
            &lookup,
            "EVENT_BUS_IDEMPOTENCY_WINDOW_SECS",
            defaults.idempotency_window.as_secs(),
        )?;

        let idempotency_capacity = parse_var(
            &lookup,
            "EVENT_BUS_IDEMPOTENCY_CAPACITY",
            defaults.idempotency_capacity,
        )?;

        let persistence_enabled = match lookup("EVENT_PERSISTENCE_ENABLED") {
            None => defaults.persistence_enabled,
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError {
                var: "EVENT_PERSISTENCE_ENABLED",
                value: raw.clone(),
                reason: "expected true/false".into(),
            })?,
        };

        Ok(Self {
            max_workers,
            idempotency_window: Duration::from_secs(window_secs),
            idempotency_capacity,
            persistence_enabled,
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

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
