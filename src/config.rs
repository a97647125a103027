use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Development fallbacks for the two signing keys. Production deployments
/// must override both via `ROADCALL_ACCESS_SECRET` / `ROADCALL_REFRESH_SECRET`.
const DEV_ACCESS_SECRET: &str = "roadcall-dev-access-secret-change-me";
const DEV_REFRESH_SECRET: &str = "roadcall-dev-refresh-secret-change-me";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub auth: AuthConfig,

    pub geo: GeoConfig,

    pub cleanup: CleanupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/roadcall.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5050,
            cors_allowed_origins: vec![
                "http://localhost:5050".to_string(),
                "http://127.0.0.1:5050".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Access token lifetime in minutes (default: 15).
    pub access_ttl_minutes: i64,

    /// Refresh token lifetime in days (default: 7).
    pub refresh_ttl_days: i64,

    /// OTP validity window in minutes (default: 5).
    pub otp_ttl_minutes: i64,

    /// When true, every OTP is the fixed demo code and the code is echoed
    /// in the send-otp response. Must be off in production, where codes
    /// are cryptographically random and delivered out of band.
    pub demo_otp: bool,

    /// OTP send throttling policy.
    pub otp_throttle: OtpThrottleConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_ttl_minutes: 15,
            refresh_ttl_days: 7,
            otp_ttl_minutes: 5,
            demo_otp: true,
            otp_throttle: OtpThrottleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OtpThrottleConfig {
    /// Max send-otp requests per phone in the window before 429.
    pub max_attempts: i32,

    /// Rolling window for counting sends.
    pub window_seconds: i64,
}

impl Default for OtpThrottleConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 5 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    /// Platform-wide default search radius in kilometers.
    pub default_radius_km: f64,

    /// Hard cap on the requested radius.
    pub max_radius_km: f64,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            default_radius_km: 15.0,
            max_radius_km: 200.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub enabled: bool,

    /// Seconds between expiry sweeps (default: 600).
    pub sweep_interval_seconds: u64,

    /// Optional cron schedule; overrides the interval when set.
    pub cron_expression: Option<String>,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval_seconds: 600,
            cron_expression: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            geo: GeoConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("roadcall").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".roadcall").join("config.toml"));
        }

        paths
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = PathBuf::from("config.toml");
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.access_ttl_minutes <= 0 || self.auth.refresh_ttl_days <= 0 {
            anyhow::bail!("Token lifetimes must be positive");
        }

        if self.auth.otp_ttl_minutes <= 0 {
            anyhow::bail!("OTP validity window must be positive");
        }

        if self.geo.default_radius_km <= 0.0 || self.geo.default_radius_km > self.geo.max_radius_km
        {
            anyhow::bail!("Default search radius must be within (0, max_radius_km]");
        }

        Ok(())
    }

    /// Access-token signing key: env override or the built-in dev default.
    #[must_use]
    pub fn access_secret() -> String {
        match std::env::var("ROADCALL_ACCESS_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => DEV_ACCESS_SECRET.to_string(),
        }
    }

    /// Refresh-token signing key, deliberately distinct from the access
    /// key so a leaked key cannot be used across token classes.
    #[must_use]
    pub fn refresh_secret() -> String {
        match std::env::var("ROADCALL_REFRESH_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => DEV_REFRESH_SECRET.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.auth.access_ttl_minutes, 15);
        assert_eq!(config.auth.refresh_ttl_days, 7);
        assert!(config.auth.demo_otp);
        assert!((config.geo.default_radius_km - 15.0).abs() < f64::EPSILON);
        assert_eq!(config.auth.otp_throttle.max_attempts, 5);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[auth]"));
        assert!(toml_str.contains("[geo]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [auth]
            access_ttl_minutes = 30
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.auth.access_ttl_minutes, 30);

        assert_eq!(config.auth.refresh_ttl_days, 7);
    }

    #[test]
    fn test_validate_rejects_bad_radius() {
        let mut config = Config::default();
        config.geo.default_radius_km = 0.0;
        assert!(config.validate().is_err());
    }
}
