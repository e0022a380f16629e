//! ==============================================================================
//! config.rs - Station Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `station.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - PollingConfig: How often the station samples and uploads.
//!     - ProvisioningConfig: Network join attempts and fallback AP name.
//!     - SensorsConfig: DHT pin/model, light ADC channel, water probe pin.
//!     - StatusLedConfig: GPIO pin of the status LED.
//!     - ThingSpeakConfig: Channel, write key and endpoint of the sink.
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cycle::CycleConfig;
use crate::error::StationError;
use crate::hal::DhtModel;

/// ThingSpeak accepts at most one update every 15 seconds
pub const MIN_INTERVAL_SECONDS: u64 = 15;

/// env var that overrides `thingspeak.write_key`
pub const WRITE_KEY_ENV: &str = "STATION_WRITE_KEY";

/// Root configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct StationConfig {
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub provisioning: ProvisioningConfig,
    #[serde(default)]
    pub sensors: SensorsConfig,
    #[serde(default)]
    pub status_led: StatusLedConfig,
    #[serde(default)]
    pub thingspeak: ThingSpeakConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_seconds: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_seconds: 20 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProvisioningConfig {
    pub ap_name: String,
    pub attempts: u32,
    pub timeout_seconds: u64,
    pub retry_delay_seconds: u64,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            ap_name: "ASAA".to_string(),
            attempts: 3,
            timeout_seconds: 10,
            retry_delay_seconds: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SensorsConfig {
    #[serde(default)]
    pub dht: DhtConfig,
    #[serde(default)]
    pub light: LightConfig,
    #[serde(default)]
    pub water: WaterConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DhtConfig {
    pub gpio_pin: u8,
    pub model: DhtModel,
}

impl Default for DhtConfig {
    fn default() -> Self {
        Self { gpio_pin: 14, model: DhtModel::default() }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LightConfig {
    pub adc_channel: u8,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WaterConfig {
    pub gpio_pin: u8,
}

impl Default for WaterConfig {
    fn default() -> Self {
        Self { gpio_pin: 5 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StatusLedConfig {
    pub gpio_pin: u8,
}

impl Default for StatusLedConfig {
    fn default() -> Self {
        Self { gpio_pin: 2 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ThingSpeakConfig {
    pub url: String,
    pub channel_id: u64,
    pub write_key: String,
    pub timeout_seconds: u64,
}

impl Default for ThingSpeakConfig {
    fn default() -> Self {
        Self {
            url: "https://api.thingspeak.com".to_string(),
            channel_id: 0,
            write_key: String::new(),
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_sensor_data: true }
    }
}

/// how the configuration was found
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigNote {
    Loaded(PathBuf),
    Unreadable(PathBuf, String),
    Defaults,
}

impl ConfigNote {
    pub fn message(&self) -> String {
        match self {
            ConfigNote::Loaded(path) => format!("[CONFIG] Loaded from {}", path.display()),
            ConfigNote::Unreadable(path, e) => format!("[CONFIG] Failed to load {}: {}", path.display(), e),
            ConfigNote::Defaults => "[CONFIG] No config file found - using defaults".to_string(),
        }
    }

    pub fn is_warning(&self) -> bool {
        !matches!(self, ConfigNote::Loaded(_))
    }

    pub fn log(&self) {
        if self.is_warning() {
            tracing::warn!("{}", self.message());
        } else {
            tracing::info!("{}", self.message());
        }
    }
}

impl StationConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        let config: StationConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        Ok(config)
    }

    /// Load with default fallback
    ///
    /// runs before logging is set up, so what happened is handed back as
    /// notes for the caller to log later
    pub fn load_or_default() -> (Self, Vec<ConfigNote>) {
        let paths = [
            PathBuf::from("config").join("station.toml"),
            PathBuf::from("..").join("config").join("station.toml"),
        ];
        Self::search(&paths)
    }

    /// first path that exists and parses wins
    fn search(paths: &[PathBuf]) -> (Self, Vec<ConfigNote>) {
        let mut notes = Vec::new();

        for path in paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        notes.push(ConfigNote::Loaded(path.clone()));
                        return (config, notes);
                    }
                    Err(e) => notes.push(ConfigNote::Unreadable(path.clone(), e.to_string())),
                }
            }
        }

        notes.push(ConfigNote::Defaults);
        (Self::default(), notes)
    }

    /// an explicit path must load, otherwise search the default locations
    pub fn load_from(path: Option<&Path>) -> anyhow::Result<(Self, Vec<ConfigNote>)> {
        match path {
            Some(p) => {
                let config = Self::load(p)?;
                Ok((config, vec![ConfigNote::Loaded(p.to_path_buf())]))
            }
            None => Ok(Self::load_or_default()),
        }
    }

    /// overlay secrets from the environment
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(WRITE_KEY_ENV) {
            self.apply_write_key(key);
        }
    }

    fn apply_write_key(&mut self, key: String) {
        let key = key.trim();
        if !key.is_empty() {
            self.thingspeak.write_key = key.to_string();
        }
    }

    /// clamp values the remote side would reject, returns what was changed
    pub fn validate(&mut self) -> Vec<String> {
        let mut adjustments = Vec::new();

        if self.polling.interval_seconds < MIN_INTERVAL_SECONDS {
            adjustments.push(format!(
                "polling.interval_seconds raised from {} to {} (ThingSpeak rate limit)",
                self.polling.interval_seconds, MIN_INTERVAL_SECONDS
            ));
            self.polling.interval_seconds = MIN_INTERVAL_SECONDS;
        }

        if self.provisioning.attempts == 0 {
            adjustments.push("provisioning.attempts raised from 0 to 1".to_string());
            self.provisioning.attempts = 1;
        }

        if self.provisioning.timeout_seconds == 0 {
            adjustments.push("provisioning.timeout_seconds raised from 0 to 1".to_string());
            self.provisioning.timeout_seconds = 1;
        }

        if self.thingspeak.timeout_seconds == 0 {
            adjustments.push("thingspeak.timeout_seconds raised from 0 to 1".to_string());
            self.thingspeak.timeout_seconds = 1;
        }

        if self.sensors.light.adc_channel > 7 {
            adjustments.push(format!(
                "sensors.light.adc_channel {} out of range, using 0",
                self.sensors.light.adc_channel
            ));
            self.sensors.light.adc_channel = 0;
        }

        for msg in &adjustments {
            tracing::warn!("[CONFIG] {}", msg);
        }
        adjustments
    }

    /// the sink needs a channel and a write key before anything is uploaded
    pub fn check_sink(&self) -> Result<(), StationError> {
        if self.thingspeak.write_key.is_empty() {
            return Err(StationError::Config(format!(
                "thingspeak.write_key is empty (set it in station.toml or {})",
                WRITE_KEY_ENV
            )));
        }
        if reqwest::Url::parse(&self.thingspeak.url).is_err() {
            return Err(StationError::Config(format!("thingspeak.url {:?} is not a valid url", self.thingspeak.url)));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.polling.interval_seconds)
    }

    /// everything the cycle driver needs, detached from the file layout
    pub fn cycle_config(&self) -> CycleConfig {
        CycleConfig {
            period: self.interval(),
            channel_id: self.thingspeak.channel_id,
            write_key: self.thingspeak.write_key.clone(),
            light_channel: self.sensors.light.adc_channel,
            water_pin: self.sensors.water.gpio_pin,
            show_sensor_data: self.logging.show_sensor_data,
        }
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("┌─────────────────────────────────────────┐");
        println!("│          STATION CONFIGURATION          │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Channel: {}", self.thingspeak.channel_id);
        println!("│ Endpoint: {}", self.thingspeak.url);
        println!("│ Poll Interval: {}s", self.polling.interval_seconds);
        println!("│ Fallback AP: {}", self.provisioning.ap_name);
        println!("│ DHT: {:?} on GPIO {}", self.sensors.dht.model, self.sensors.dht.gpio_pin);
        println!("│ Light: ADC channel {}", self.sensors.light.adc_channel);
        println!("│ Water: GPIO {}", self.sensors.water.gpio_pin);
        println!("│ Status LED: GPIO {}", self.status_led.gpio_pin);
        println!("│ Log Level: {}", self.logging.level);
        println!("└─────────────────────────────────────────┘");
    }
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            polling: PollingConfig::default(),
            provisioning: ProvisioningConfig::default(),
            sensors: SensorsConfig::default(),
            status_led: StatusLedConfig::default(),
            thingspeak: ThingSpeakConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
