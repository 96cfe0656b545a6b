use std::net::SocketAddr;
use std::time::Duration;

use crate::media::DEFAULT_MAX_MEDIA_BYTES;
use crate::types::Timings;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; `None` means permissive
    pub cors_origins: Option<Vec<String>>,
    pub max_media_bytes: usize,
    pub timings: Timings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 10000,
            cors_origins: None,
            max_media_bytes: DEFAULT_MAX_MEDIA_BYTES,
            timings: Timings::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("HOST")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.host);
        let port = env_parse("PORT").unwrap_or(defaults.port);

        let cors_origins = std::env::var("CORS_ORIGINS").ok().and_then(|v| {
            let origins: Vec<String> = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            (!origins.is_empty()).then_some(origins)
        });

        let max_media_bytes = env_parse("MAX_MEDIA_BYTES").unwrap_or(defaults.max_media_bytes);
        let timings = timings_from_env();

        tracing::info!(
            host = %host,
            port,
            cors = ?cors_origins,
            max_media_bytes,
            "Server config loaded"
        );

        Self {
            host,
            port,
            cors_origins,
            max_media_bytes,
            timings,
        }
    }

    pub fn socket_addr(&self) -> Option<SocketAddr> {
        format!("{}:{}", self.host, self.port).parse().ok()
    }
}

/// Game pacing from `TURN_SECONDS`, `NIGHT_SECONDS`, `VOTE_SECONDS`,
/// `REVEAL_SECONDS` and `GAME_SPEEDUP`
pub fn timings_from_env() -> Timings {
    let mut timings = Timings::default();

    if let Some(secs) = env_parse::<u64>("TURN_SECONDS").filter(|s| *s > 0) {
        timings.speaking_turn = Duration::from_secs(secs);
    }
    if let Some(secs) = env_parse::<u64>("NIGHT_SECONDS").filter(|s| *s > 0) {
        timings.night_ceiling = Duration::from_secs(secs);
    }
    if let Some(secs) = env_parse::<u64>("VOTE_SECONDS").filter(|s| *s > 0) {
        timings.vote_ceiling = Duration::from_secs(secs);
    }
    if let Some(secs) = env_parse::<u64>("REVEAL_SECONDS") {
        timings.reveal_window = Duration::from_secs(secs);
    }

    match env_parse::<u32>("GAME_SPEEDUP") {
        Some(speedup) if speedup > 1 => {
            tracing::warn!("Game speed-up x{} enabled", speedup);
            timings.scaled(speedup)
        }
        _ => timings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "HOST",
        "PORT",
        "CORS_ORIGINS",
        "MAX_MEDIA_BYTES",
        "TURN_SECONDS",
        "NIGHT_SECONDS",
        "VOTE_SECONDS",
        "REVEAL_SECONDS",
        "GAME_SPEEDUP",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = ServerConfig::from_env();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 10000);
        assert!(config.cors_origins.is_none());
        assert_eq!(config.max_media_bytes, 10 * 1024 * 1024);
        assert_eq!(config.timings, Timings::default());
        assert_eq!(
            config.socket_addr(),
            Some(SocketAddr::from(([0, 0, 0, 0], 10000)))
        );
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear_env();
        std::env::set_var("PORT", "8080");
        std::env::set_var("CORS_ORIGINS", "https://a.example, https://b.example,");
        std::env::set_var("TURN_SECONDS", "45");
        std::env::set_var("VOTE_SECONDS", "20");

        let config = ServerConfig::from_env();
        assert_eq!(config.port, 8080);
        assert_eq!(
            config.cors_origins,
            Some(vec![
                "https://a.example".to_string(),
                "https://b.example".to_string()
            ])
        );
        assert_eq!(config.timings.speaking_turn, Duration::from_secs(45));
        assert_eq!(config.timings.vote_ceiling, Duration::from_secs(20));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_garbage_falls_back() {
        clear_env();
        std::env::set_var("PORT", "not-a-port");
        std::env::set_var("NIGHT_SECONDS", "-3");
        std::env::set_var("CORS_ORIGINS", " , ");

        let config = ServerConfig::from_env();
        assert_eq!(config.port, 10000);
        assert_eq!(config.timings.night_ceiling, Duration::from_secs(30));
        assert!(config.cors_origins.is_none());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_speedup_divides_everything() {
        clear_env();
        std::env::set_var("GAME_SPEEDUP", "10");
        let timings = timings_from_env();
        assert_eq!(timings.speaking_turn, Duration::from_secs(3));
        assert_eq!(timings.reveal_window, Duration::from_millis(600));
        clear_env();
    }
}
