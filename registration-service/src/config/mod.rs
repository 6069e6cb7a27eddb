use secrecy::Secret;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::collections::BTreeSet;
use std::env;
use std::time::Duration;

/// Events that only members of the privileged institution may join, before
/// any faculty-only list is configured.
const DEFAULT_RESTRICTED_EVENTS: &str = "13,14,15,16,17,18,19,43,64,65,66";

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub service_name: String,
    pub database: DatabaseConfig,
    pub eligibility: EligibilityConfig,
    pub directory: DirectoryConfig,
    pub fcm: FcmConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Tier membership tables. The two event sets must not overlap.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct EligibilityConfig {
    pub faculty_only_events: BTreeSet<String>,
    pub restricted_affiliation_events: BTreeSet<String>,
    pub privileged_prefix: String,
    /// Value of the directory's affiliation-class attribute that marks faculty.
    pub faculty_class: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    pub lookup_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FcmConfig {
    pub enabled: bool,
    /// OAuth2 access token for the Instance ID API.
    pub access_token: Secret<String>,
    pub base_url: String,
    pub timeout_ms: u64,
}

impl RegistrationConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let mut common = common_config;
        if let Ok(level) = env::var("LOG_LEVEL") {
            common.log_level = level;
        }
        if let Ok(endpoint) = env::var("OTLP_ENDPOINT") {
            common.otlp_endpoint = Some(endpoint);
        }

        let config = RegistrationConfig {
            common,
            service_name: "registration-service".to_string(),
            database: DatabaseConfig {
                url: Secret::new(get_env("DATABASE_URL", None, is_prod)?),
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
            },
            eligibility: EligibilityConfig {
                faculty_only_events: parse_list(&get_env(
                    "FACULTY_ONLY_EVENTS",
                    Some(""),
                    is_prod,
                )?),
                restricted_affiliation_events: parse_list(&get_env(
                    "RESTRICTED_AFFILIATION_EVENTS",
                    Some(DEFAULT_RESTRICTED_EVENTS),
                    is_prod,
                )?),
                privileged_prefix: get_env("PRIVILEGED_PREFIX", Some("ay"), is_prod)?,
                faculty_class: get_env("FACULTY_CLASS", Some("faculty"), is_prod)?,
            },
            directory: DirectoryConfig {
                lookup_timeout_ms: parse_env("LOOKUP_TIMEOUT_MS", "5000", is_prod)?,
            },
            fcm: FcmConfig {
                enabled: parse_env("FCM_ENABLED", "false", is_prod)?,
                access_token: Secret::new(get_env("FCM_ACCESS_TOKEN", Some(""), is_prod)?),
                base_url: get_env("FCM_BASE_URL", Some("https://iid.googleapis.com"), is_prod)?,
                timeout_ms: parse_env("FCM_TIMEOUT_MS", "5000", is_prod)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the settings that would otherwise only fail at request time.
    pub fn validate(&self) -> Result<(), AppError> {
        self.eligibility.validate()?;

        if self.directory.lookup_timeout_ms == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "LOOKUP_TIMEOUT_MS must be greater than zero"
            )));
        }
        if self.fcm.timeout_ms == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "FCM_TIMEOUT_MS must be greater than zero"
            )));
        }

        Ok(())
    }
}

impl EligibilityConfig {
    /// Reject tables that would make an event belong to two tiers.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.privileged_prefix.trim().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PRIVILEGED_PREFIX must not be empty"
            )));
        }

        let overlap: Vec<&String> = self
            .faculty_only_events
            .intersection(&self.restricted_affiliation_events)
            .collect();
        if !overlap.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "events {:?} are listed as both faculty-only and restricted",
                overlap
            )));
        }

        Ok(())
    }
}

impl DirectoryConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

impl FcmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Split a comma separated list, dropping blanks.
pub fn parse_list(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{} is invalid: {}", key, e)))
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
