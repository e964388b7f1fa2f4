// Configuration constants for the server

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub rate_limit_per_minute: u32,
    pub request_timeout_secs: u64,
    pub cors_allowed_origins: Option<Vec<String>>,
    /// Where generated WAV files are written and served from.
    pub audio_dir: PathBuf,
    /// Static frontend assets (index.html, styles, scripts).
    pub frontend_dir: PathBuf,
    /// JSON map of language code -> Piper model config.
    pub model_map: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8085,
            rate_limit_per_minute: 60,
            request_timeout_secs: 120,
            cors_allowed_origins: None,
            audio_dir: PathBuf::from("static/audio"),
            frontend_dir: PathBuf::from("frontend"),
            model_map: PathBuf::from("models/map.json"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            });

        Self {
            port: env_parse("PORT").unwrap_or(defaults.port),
            rate_limit_per_minute: env_parse("RATE_LIMIT_PER_MINUTE")
                .filter(|&r| r > 0)
                .unwrap_or(defaults.rate_limit_per_minute),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS")
                .unwrap_or(defaults.request_timeout_secs),
            cors_allowed_origins,
            audio_dir: env_path("AUDIO_OUTPUT_DIR").unwrap_or(defaults.audio_dir),
            frontend_dir: env_path("FRONTEND_DIR").unwrap_or(defaults.frontend_dir),
            model_map: env_path("PIPER_MODEL_MAP").unwrap_or(defaults.model_map),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8085);
        assert_eq!(config.audio_dir, PathBuf::from("static/audio"));
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
        assert!(config.cors_allowed_origins.is_none());
    }
}
