//! Highway Healers configuration
//!
//! One `HealersConfig` is built at process start and passed by reference to
//! every component that needs credentials. Nothing below this module reads the
//! process environment.
//!
//! Config file: ~/.config/highway-healers/config.toml or /etc/highway-healers/config.toml
//! Credentials may also come from the environment (TWILIO_*, GOOGLE_MAPS_API_KEY).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::capability::Coordinates;
use crate::dispatch::Variant;

pub const ENV_TWILIO_ACCOUNT_SID: &str = "TWILIO_ACCOUNT_SID";
pub const ENV_TWILIO_AUTH_TOKEN: &str = "TWILIO_AUTH_TOKEN";
pub const ENV_TWILIO_PHONE_NUMBER: &str = "TWILIO_PHONE_NUMBER";
pub const ENV_GOOGLE_MAPS_API_KEY: &str = "GOOGLE_MAPS_API_KEY";
pub const ENV_FLOW_ENDPOINT: &str = "HEALERS_FLOW_ENDPOINT";
pub const ENV_FLOW_API_KEY: &str = "HEALERS_FLOW_API_KEY";

const APP_DIR: &str = "highway-healers";
const CONFIG_FILE: &str = "config.toml";

/// Configuration errors surfaced before any network attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} is not configured")]
    MissingCredential(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Flow runner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Base URL of the flow server; flows are posted to `<endpoint>/<flowName>`
    #[serde(default = "default_flow_endpoint")]
    pub endpoint: String,

    /// Bearer token, if the flow server requires one
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_flow_timeout")]
    pub timeout_secs: u64,
}

fn default_flow_endpoint() -> String {
    "http://localhost:3400".to_string()
}

fn default_flow_timeout() -> u64 {
    60
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            endpoint: default_flow_endpoint(),
            api_key: None,
            timeout_secs: default_flow_timeout(),
        }
    }
}

/// SMS provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsConfig {
    #[serde(default)]
    pub account_sid: Option<String>,

    #[serde(default)]
    pub auth_token: Option<String>,

    /// Sender number in E.164 format
    #[serde(default)]
    pub from_number: Option<String>,

    /// Require the account SID to carry the provider's `AC` prefix
    #[serde(default = "default_true")]
    pub strict: bool,

    #[serde(default = "default_sms_api_base")]
    pub api_base: String,

    #[serde(default = "default_sms_timeout")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_sms_api_base() -> String {
    "https://api.twilio.com".to_string()
}

fn default_sms_timeout() -> u64 {
    30
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            from_number: None,
            strict: true,
            api_base: default_sms_api_base(),
            timeout_secs: default_sms_timeout(),
        }
    }
}

/// Resolved provider credentials, all three present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsCredentials {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

impl SmsConfig {
    /// All three credentials, or the first one missing
    pub fn credentials(&self) -> Result<SmsCredentials, ConfigError> {
        let account_sid = non_empty(&self.account_sid)
            .ok_or(ConfigError::MissingCredential(ENV_TWILIO_ACCOUNT_SID))?;
        let auth_token = non_empty(&self.auth_token)
            .ok_or(ConfigError::MissingCredential(ENV_TWILIO_AUTH_TOKEN))?;
        let from_number = non_empty(&self.from_number)
            .ok_or(ConfigError::MissingCredential(ENV_TWILIO_PHONE_NUMBER))?;

        Ok(SmsCredentials {
            account_sid,
            auth_token,
            from_number,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.credentials().is_ok()
    }
}

/// Mapping provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapsConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    /// Map centre before the user shares a location
    #[serde(default = "default_map_center")]
    pub default_center: Coordinates,

    #[serde(default = "default_zoom")]
    pub zoom: u8,
}

fn default_map_center() -> Coordinates {
    // Centred on India
    Coordinates::new(20.5937, 78.9629)
}

fn default_zoom() -> u8 {
    7
}

impl Default for MapsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_center: default_map_center(),
            zoom: default_zoom(),
        }
    }
}

impl MapsConfig {
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingCredential(ENV_GOOGLE_MAPS_API_KEY))
    }
}

/// Emergency flow settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub variant: Variant,

    /// Pause between a location fix and the tracking screen
    #[serde(default = "default_auto_advance_ms")]
    pub auto_advance_ms: u64,

    /// Shortest situation description the shell will submit
    #[serde(default = "default_min_situation_chars")]
    pub min_situation_chars: usize,

    /// Shortest scenario description accepted by the resource allocator
    #[serde(default = "default_min_scenario_chars")]
    pub min_scenario_chars: usize,

    #[serde(default = "default_camera_device")]
    pub camera_device: PathBuf,

    /// Fixed position reported as the device location. A terminal has no GPS,
    /// so without this the location step fails with "unsupported".
    #[serde(default)]
    pub location: Option<Coordinates>,
}

fn default_auto_advance_ms() -> u64 {
    1500
}

fn default_min_situation_chars() -> usize {
    10
}

fn default_min_scenario_chars() -> usize {
    20
}

fn default_camera_device() -> PathBuf {
    PathBuf::from("/dev/video0")
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            variant: Variant::default(),
            auto_advance_ms: default_auto_advance_ms(),
            min_situation_chars: default_min_situation_chars(),
            min_scenario_chars: default_min_scenario_chars(),
            camera_device: default_camera_device(),
            location: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealersConfig {
    #[serde(default)]
    pub flow: FlowConfig,

    #[serde(default)]
    pub sms: SmsConfig,

    #[serde(default)]
    pub maps: MapsConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl HealersConfig {
    /// Default user config path: ~/.config/highway-healers/config.toml
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
    }

    /// System config path: /etc/highway-healers/config.toml
    pub fn system_config_path() -> PathBuf {
        Path::new("/etc").join(APP_DIR).join(CONFIG_FILE)
    }

    /// Load configuration once at startup
    ///
    /// Priority:
    /// 1. Explicit path (`--config`)
    /// 2. User config (~/.config/highway-healers/config.toml)
    /// 3. System config (/etc/highway-healers/config.toml)
    /// 4. Defaults
    ///
    /// Credentials from the environment override file values.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => Self::discover()?,
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn discover() -> Result<Self> {
        if let Some(user_path) = Self::user_config_path() {
            if user_path.exists() {
                return Self::from_file(&user_path);
            }
        }

        let system_path = Self::system_config_path();
        if system_path.exists() {
            return Self::from_file(&system_path);
        }

        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: HealersConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Overlay credentials from an environment lookup. Values that are set
    /// but empty are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_TWILIO_ACCOUNT_SID) {
            self.sms.account_sid = Some(v);
        }
        if let Some(v) = get(ENV_TWILIO_AUTH_TOKEN) {
            self.sms.auth_token = Some(v);
        }
        if let Some(v) = get(ENV_TWILIO_PHONE_NUMBER) {
            self.sms.from_number = Some(v);
        }
        if let Some(v) = get(ENV_GOOGLE_MAPS_API_KEY) {
            self.maps.api_key = Some(v);
        }
        if let Some(v) = get(ENV_FLOW_ENDPOINT) {
            self.flow.endpoint = v;
        }
        if let Some(v) = get(ENV_FLOW_API_KEY) {
            self.flow.api_key = Some(v);
        }
    }

    /// Reject values no component could work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.flow.endpoint.starts_with("http://") && !self.flow.endpoint.starts_with("https://") {
            return Err(ConfigError::Invalid {
                key: "flow.endpoint",
                reason: format!("'{}' is not an http(s) URL", self.flow.endpoint),
            });
        }
        if self.dispatch.min_situation_chars == 0 {
            return Err(ConfigError::Invalid {
                key: "dispatch.min_situation_chars",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.maps.zoom > 21 {
            return Err(ConfigError::Invalid {
                key: "maps.zoom",
                reason: format!("{} is outside 0-21", self.maps.zoom),
            });
        }
        Ok(())
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
