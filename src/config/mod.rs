// src/config/mod.rs
// All values come from the environment (with a .env file loaded first);
// every field has a working default so a bare `cargo run` starts a server.

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AnnaiConfig {
    // ── Gemini Configuration
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub upstream_timeout_secs: u64,

    // ── Session Configuration
    pub session_ttl_minutes: u64,

    // ── Itinerary Configuration
    pub journey_file: String,

    // ── Server Configuration
    pub host: String,
    pub port: u16,

    // ── Logging Configuration
    pub log_level: String,
}

/// Parse an environment variable, tolerating trailing comments and whitespace.
fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => {
            let clean_val = val.split('#').next().unwrap_or("").trim();
            match clean_val.parse::<T>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    eprintln!("Config: {} = '{}' (parse failed, using default)", key, val);
                    default
                }
            }
        }
        Err(_) => default,
    }
}

impl AnnaiConfig {
    pub fn from_env() -> Self {
        // Load .env first if present; plain environment variables still win.
        let _ = dotenvy::dotenv();

        Self {
            gemini_api_key: env_var_or("GEMINI_API_KEY", String::new()),
            gemini_base_url: env_var_or(
                "ANNAI_GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com".to_string(),
            ),
            gemini_model: env_var_or("ANNAI_GEMINI_MODEL", "gemini-2.5-flash".to_string()),
            upstream_timeout_secs: env_var_or("ANNAI_UPSTREAM_TIMEOUT", 120),
            session_ttl_minutes: env_var_or("ANNAI_SESSION_TTL_MINUTES", 30),
            journey_file: env_var_or("ANNAI_JOURNEY_FILE", "assets/journey.txt".to_string()),
            host: env_var_or("ANNAI_HOST", "0.0.0.0".to_string()),
            port: env_var_or("ANNAI_PORT", 3000),
            log_level: env_var_or("ANNAI_LOG_LEVEL", "info".to_string()),
        }
    }

    // --- Convenience Methods ---

    /// Get server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Session time-to-live as a Duration
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_minutes * 60)
    }

    /// Timeout for upstream Gemini requests
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    /// Whether an upstream API key has been configured
    pub fn has_api_key(&self) -> bool {
        !self.gemini_api_key.trim().is_empty()
    }
}

// Global config instance - loaded once at startup
pub static CONFIG: Lazy<AnnaiConfig> = Lazy::new(AnnaiConfig::from_env);
