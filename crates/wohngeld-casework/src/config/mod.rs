use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use crate::casework::{DeadlineKind, LifecycleConfig};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the casework service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub lifecycle: LifecycleConfig,
    pub drafting: DraftingConfig,
    /// JSON document with clients and deadlines loaded into the in-memory stores at start.
    pub seed_path: Option<PathBuf>,
}

const FOLLOW_UP_KEYS: [(&str, DeadlineKind); 3] = [
    (
        "APP_FOLLOW_UP_MONTHS_ERSTANTRAG",
        DeadlineKind::FirstApplication,
    ),
    (
        "APP_FOLLOW_UP_MONTHS_WEITERBEWILLIGUNG",
        DeadlineKind::Renewal,
    ),
    ("APP_FOLLOW_UP_MONTHS_ERHOEHUNG", DeadlineKind::Increase),
];

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidNumber { key, value: raw })
        }
        _ => Ok(default),
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let defaults = LifecycleConfig::default();
        let mut follow_up_months = defaults.follow_up_months.clone();
        for (key, kind) in FOLLOW_UP_KEYS {
            let fallback = follow_up_months.get(&kind).copied().unwrap_or_default();
            let months = parse_var(key, fallback)?;
            if months == 0 {
                return Err(ConfigError::InvalidFollowUpInterval { key });
            }
            follow_up_months.insert(kind, months);
        }

        let lifecycle = LifecycleConfig {
            follow_up_months,
            reminder_lead_days: parse_var("APP_REMINDER_LEAD_DAYS", defaults.reminder_lead_days)?,
            max_transition_retries: parse_var(
                "APP_MAX_TRANSITION_RETRIES",
                defaults.max_transition_retries,
            )?,
            sweep_interval_secs: parse_var(
                "APP_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval_secs,
            )?,
        };
        if lifecycle.sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidNumber {
                key: "APP_SWEEP_INTERVAL_SECS",
                value: "0".to_string(),
            });
        }

        let drafting = DraftingConfig {
            output_dir: env::var("APP_DRAFT_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("output")),
            template: env::var("APP_DRAFT_TEMPLATE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("templates/wohngeld-antrag.json")),
        };

        let seed_path = env::var("APP_SEED_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            lifecycle,
            drafting,
            seed_path,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where draft documents come from and where they are written.
#[derive(Debug, Clone)]
pub struct DraftingConfig {
    pub output_dir: PathBuf,
    pub template: PathBuf,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
    InvalidFollowUpInterval { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a positive number, got '{value}'")
            }
            ConfigError::InvalidFollowUpInterval { key } => {
                write!(f, "{key} must be at least one month")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_SWEEP_INTERVAL_SECS",
            "APP_MAX_TRANSITION_RETRIES",
            "APP_REMINDER_LEAD_DAYS",
            "APP_FOLLOW_UP_MONTHS_ERSTANTRAG",
            "APP_FOLLOW_UP_MONTHS_WEITERBEWILLIGUNG",
            "APP_FOLLOW_UP_MONTHS_ERHOEHUNG",
            "APP_DRAFT_OUTPUT_DIR",
            "APP_DRAFT_TEMPLATE",
            "APP_SEED_PATH",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.lifecycle, LifecycleConfig::default());
        assert_eq!(config.drafting.output_dir, PathBuf::from("output"));
        assert!(config.seed_path.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 8080));
        reset_env();
    }

    #[test]
    fn follow_up_interval_overrides_and_rejects_zero() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_FOLLOW_UP_MONTHS_ERHOEHUNG", "6");
        env::set_var("APP_MAX_TRANSITION_RETRIES", "5");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(
            config.lifecycle.follow_up_months.get(&DeadlineKind::Increase),
            Some(&6)
        );
        assert_eq!(config.lifecycle.max_transition_retries, 5);

        env::set_var("APP_FOLLOW_UP_MONTHS_WEITERBEWILLIGUNG", "0");
        let err = AppConfig::load().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidFollowUpInterval {
                key: "APP_FOLLOW_UP_MONTHS_WEITERBEWILLIGUNG"
            }
        ));

        env::set_var("APP_FOLLOW_UP_MONTHS_WEITERBEWILLIGUNG", "zwölf");
        assert!(matches!(
            AppConfig::load().unwrap_err(),
            ConfigError::InvalidNumber { .. }
        ));
        reset_env();
    }
}
