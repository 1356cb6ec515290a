use crate::api::Error;
use crate::normalize::{SensorPolicy, DEFAULT_IGNORED_MODELS, DEFAULT_IGNORED_SENSOR_TYPES};
use config::Config;

use std::fmt;
use std::time::Duration;

pub const API_URL: &str = "https://api.aroya.io/api/v1";
pub const ENV_PREFIX: &str = "AROYA";

#[derive(Clone, serde::Deserialize)]
pub struct Settings {
    pub api_url: String,
    pub api_key: String,
    /// Minimum seconds between two refresh cycles.
    pub interval: u64,
    /// Per-request timeout in seconds.
    pub timeout: u64,
    pub convert_temperature: bool,
    /// Comma separated.
    pub ignored_models: String,
    /// Comma separated.
    pub ignored_sensor_types: String,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field("convert_temperature", &self.convert_temperature)
            .field("ignored_models", &self.ignored_models)
            .field("ignored_sensor_types", &self.ignored_sensor_types)
            .finish()
    }
}

fn split_list(list: &str) -> impl Iterator<Item = String> + '_ {
    list.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
}

impl Settings {
    /// Fill in defaults and deserialize `settings`. Everything but `api_key` is optional.
    pub fn from_config(mut settings: Config) -> Result<Settings, Error> {
        settings
            .set_default("api_url", API_URL)
            .and_then(|s| s.set_default("interval", 300_i64))
            .and_then(|s| s.set_default("timeout", 15_i64))
            .and_then(|s| s.set_default("convert_temperature", true))
            .and_then(|s| s.set_default("ignored_models", DEFAULT_IGNORED_MODELS.join(",")))
            .and_then(|s| {
                s.set_default(
                    "ignored_sensor_types",
                    DEFAULT_IGNORED_SENSOR_TYPES.join(","),
                )
            })
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        settings
            .try_into::<Settings>()
            .map_err(|e| Error::ConfigError(e.to_string()))
    }

    /// Read settings from `AROYA_*` environment variables.
    pub fn from_env() -> Result<Settings, Error> {
        let mut settings = Config::default();
        settings
            .merge(config::Environment::with_prefix(ENV_PREFIX))
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        Settings::from_config(settings)
    }

    pub fn policy(&self) -> SensorPolicy {
        SensorPolicy {
            ignored_models: split_list(&self.ignored_models).collect(),
            ignored_sensor_types: split_list(&self.ignored_sensor_types).collect(),
            convert_temperature: self.convert_temperature,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}
