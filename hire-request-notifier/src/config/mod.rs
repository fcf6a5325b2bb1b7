use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub fcm: FcmConfig,
    pub trigger: TriggerConfig,
    /// OTLP collector for span export. Unset means local JSON logs only.
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub hire_requests_collection: String,
    pub users_collection: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FcmConfig {
    pub project_id: String,
    /// Service-account key JSON, or a path to a file holding it.
    pub service_account_key: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerConfig {
    /// Watch the hire-request collection. Off leaves only HTTP event delivery.
    pub change_stream_enabled: bool,
}

impl NotifierConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(NotifierConfig {
            common: common_config,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", None, is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("hire_db"), is_prod)?,
                hire_requests_collection: get_env(
                    "HIRE_REQUESTS_COLLECTION",
                    Some("hireRequests"),
                    is_prod,
                )?,
                users_collection: get_env("USERS_COLLECTION", Some("users"), is_prod)?,
            },
            fcm: FcmConfig {
                project_id: get_env("FCM_PROJECT_ID", Some(""), is_prod)?,
                service_account_key: get_env("FCM_SERVICE_ACCOUNT_KEY", Some(""), is_prod)?,
                enabled: push_gateway_flag("FCM_ENABLED", is_prod)?,
            },
            trigger: TriggerConfig {
                change_stream_enabled: parse_flag("CHANGE_STREAM_ENABLED", true, is_prod)?,
            },
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
        })
    }
}

fn parse_flag(key: &str, default: bool, is_prod: bool) -> Result<bool, AppError> {
    let raw = get_env(key, Some(if default { "true" } else { "false" }), is_prod)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(AppError::ConfigError(anyhow::anyhow!(
            "{} must be a boolean, got {:?}",
            key,
            raw
        ))),
    }
}

/// The mock provider delivers nothing, so production must talk to FCM.
fn push_gateway_flag(key: &str, is_prod: bool) -> Result<bool, AppError> {
    let enabled = parse_flag(key, false, is_prod)?;
    if is_prod && !enabled {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "{} must be true in production",
            key
        )));
    }
    Ok(enabled)
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
