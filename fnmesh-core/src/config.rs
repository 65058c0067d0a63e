use std::env;

/// Error type for configuration resolution.
#[derive(Debug)]
pub enum ConfigError {
    /// A numeric env var failed to parse.
    Invalid { key: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid { key, value } => {
                write!(f, "invalid value for {key}: {value:?}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Process-wide configuration, captured once at startup (spec §9: "process-wide
/// configuration is captured into an immutable struct at startup; all
/// components receive it by reference").
///
/// Resolution order: `.env` (never overwrites an already-set process env var)
/// then `std::env::vars()`. Mirrors the env vars spec §6 recognizes, plus the
/// numeric defaults named elsewhere in the spec (§4.3, §4.4) made overridable.
#[derive(Debug, Clone)]
pub struct FnMeshConfig {
    pub log_level: String,
    pub mq_url: String,
    pub db_url: String,
    pub port: u16,
    pub api_url: String,
    pub reserve_timeout_secs: u64,
    pub hot_route_cache_size: usize,
}

impl Default for FnMeshConfig {
    fn default() -> Self {
        FnMeshConfig {
            log_level: "info".to_string(),
            mq_url: "memory://".to_string(),
            db_url: "memory://".to_string(),
            port: 8080,
            api_url: "http://127.0.0.1:8080".to_string(),
            reserve_timeout_secs: 2,
            hot_route_cache_size: 100,
        }
    }
}

impl FnMeshConfig {
    /// Load configuration from `.env` (if present) then the process environment,
    /// falling back to the documented defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let mut cfg = FnMeshConfig::default();

        if let Ok(v) = env::var("LOG_LEVEL") {
            cfg.log_level = v;
        }
        if let Ok(v) = env::var("MQ_URL") {
            cfg.mq_url = v;
        }
        if let Ok(v) = env::var("DB_URL") {
            cfg.db_url = v;
        }
        if let Ok(v) = env::var("API_URL") {
            cfg.api_url = v;
        }
        if let Ok(v) = env::var("PORT") {
            cfg.port = v.parse().map_err(|_| ConfigError::Invalid { key: "PORT", value: v })?;
        }
        if let Ok(v) = env::var("FNMESH_RESERVE_TIMEOUT_SECS") {
            cfg.reserve_timeout_secs = v
                .parse()
                .map_err(|_| ConfigError::Invalid { key: "FNMESH_RESERVE_TIMEOUT_SECS", value: v })?;
        }
        if let Ok(v) = env::var("FNMESH_HOT_ROUTE_CACHE_SIZE") {
            cfg.hot_route_cache_size = v
                .parse()
                .map_err(|_| ConfigError::Invalid { key: "FNMESH_HOT_ROUTE_CACHE_SIZE", value: v })?;
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // env::set_var mutates global process state; serialize tests that touch it.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        for key in ["LOG_LEVEL", "MQ_URL", "DB_URL", "PORT", "API_URL"] {
            env::remove_var(key);
        }
        let cfg = FnMeshConfig::from_env().unwrap();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.port, 8080);
    }

    #[test]
    fn env_overrides_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("PORT", "9090");
        let cfg = FnMeshConfig::from_env().unwrap();
        assert_eq!(cfg.port, 9090);
        env::remove_var("PORT");
    }

    #[test]
    fn invalid_port_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("PORT", "not-a-number");
        let err = FnMeshConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
        env::remove_var("PORT");
    }
}
