use crate::audio::{ModemConfig, WindowConfig};
use crate::defaults;
use crate::delivery::{DeliveryConfig, WebhookConfig};
use crate::dtmf::table::LOW_GROUP_HZ;
use crate::dtmf::{DebounceConfig, DetectorConfig};
use crate::error::{DialwatchError, Result};
use crate::trigger::TriggerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub modem: ModemSection,
    pub detector: DetectorSection,
    pub debounce: DebounceSection,
    pub trigger: TriggerSection,
    pub webhook: WebhookSection,
}

/// Sample stream and window geometry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub window_size: usize,
    pub hop_size: usize,
}

/// Voice modem connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModemSection {
    pub port: String,
    pub baud: u32,
    pub gain: u8,
}

/// Tone acceptance thresholds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorSection {
    pub noise_floor: f32,
    pub max_twist_db: f32,
    pub dominance_margin_db: f32,
    pub min_energy_ratio: f32,
}

/// Digit confirmation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebounceSection {
    pub min_tone_frames: u32,
    pub min_gap_frames: u32,
}

/// Alarm aggregation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TriggerSection {
    pub cooldown_secs: u64,
}

/// Notification destination and retry policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WebhookSection {
    pub url: Option<String>,
    pub credential: Option<String>,
    /// Label sent as `source` in every payload.
    pub source: String,
    pub retry_interval_secs: u64,
    pub retry_deadline_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            window_size: defaults::WINDOW_SIZE,
            hop_size: defaults::HOP_SIZE,
        }
    }
}

impl Default for ModemSection {
    fn default() -> Self {
        Self {
            port: defaults::MODEM_PORT.to_string(),
            baud: defaults::MODEM_BAUD,
            gain: defaults::MODEM_GAIN,
        }
    }
}

impl Default for DetectorSection {
    fn default() -> Self {
        Self {
            noise_floor: defaults::NOISE_FLOOR,
            max_twist_db: defaults::MAX_TWIST_DB,
            dominance_margin_db: defaults::DOMINANCE_MARGIN_DB,
            min_energy_ratio: defaults::MIN_ENERGY_RATIO,
        }
    }
}

impl Default for DebounceSection {
    fn default() -> Self {
        Self {
            min_tone_frames: defaults::MIN_TONE_FRAMES,
            min_gap_frames: defaults::MIN_GAP_FRAMES,
        }
    }
}

impl Default for TriggerSection {
    fn default() -> Self {
        Self {
            cooldown_secs: defaults::TRIGGER_COOLDOWN.as_secs(),
        }
    }
}

impl Default for WebhookSection {
    fn default() -> Self {
        Self {
            url: None,
            credential: None,
            source: "dialwatch".to_string(),
            retry_interval_secs: defaults::RETRY_INTERVAL.as_secs(),
            retry_deadline_secs: defaults::RETRY_DEADLINE.as_secs(),
            request_timeout_secs: defaults::REQUEST_TIMEOUT.as_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DialwatchError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                DialwatchError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Malformed files are an error, never silently replaced by defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(DialwatchError::ConfigFileNotFound { .. }) => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - DIALWATCH_MODEM_PORT → modem.port
    /// - DIALWATCH_MODEM_BAUD → modem.baud
    /// - DIALWATCH_WEBHOOK_URL → webhook.url
    /// - DIALWATCH_WEBHOOK_CREDENTIAL → webhook.credential
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(port) = non_empty_env("DIALWATCH_MODEM_PORT") {
            self.modem.port = port;
        }

        if let Some(baud) = non_empty_env("DIALWATCH_MODEM_BAUD") {
            match baud.parse() {
                Ok(baud) => self.modem.baud = baud,
                Err(_) => tracing::warn!(value = %baud, "ignoring unparsable DIALWATCH_MODEM_BAUD"),
            }
        }

        if let Some(url) = non_empty_env("DIALWATCH_WEBHOOK_URL") {
            self.webhook.url = Some(url);
        }

        if let Some(credential) = non_empty_env("DIALWATCH_WEBHOOK_CREDENTIAL") {
            self.webhook.credential = Some(credential);
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/dialwatch/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dialwatch")
            .join("config.toml")
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let audio = &self.audio;
        if audio.sample_rate == 0 {
            return Err(invalid("audio.sample_rate", "must be greater than zero"));
        }
        let min_window = (audio.sample_rate as f32 / LOW_GROUP_HZ[0]).ceil() as usize;
        if audio.window_size < min_window {
            return Err(invalid(
                "audio.window_size",
                &format!("must cover one period of {} Hz ({min_window} samples)", LOW_GROUP_HZ[0]),
            ));
        }
        if audio.window_size > audio.sample_rate as usize {
            return Err(invalid("audio.window_size", "must not exceed one second"));
        }
        if audio.hop_size == 0 || audio.hop_size > audio.window_size {
            return Err(invalid(
                "audio.hop_size",
                "must be between 1 and the window size",
            ));
        }

        let detector = &self.detector;
        let thresholds = [
            ("detector.noise_floor", detector.noise_floor),
            ("detector.max_twist_db", detector.max_twist_db),
            ("detector.dominance_margin_db", detector.dominance_margin_db),
            ("detector.min_energy_ratio", detector.min_energy_ratio),
        ];
        for (key, value) in thresholds {
            if value.is_nan() || value <= 0.0 {
                return Err(invalid(key, "must be positive"));
            }
        }
        if detector.min_energy_ratio > 1.0 {
            return Err(invalid("detector.min_energy_ratio", "must not exceed 1.0"));
        }

        if self.debounce.min_tone_frames == 0 {
            return Err(invalid("debounce.min_tone_frames", "must be at least 1"));
        }
        if self.debounce.min_gap_frames == 0 {
            return Err(invalid("debounce.min_gap_frames", "must be at least 1"));
        }

        let webhook = &self.webhook;
        if webhook.retry_interval_secs == 0 {
            return Err(invalid("webhook.retry_interval_secs", "must be greater than zero"));
        }
        if webhook.retry_deadline_secs < webhook.retry_interval_secs {
            return Err(invalid(
                "webhook.retry_deadline_secs",
                "must not be shorter than the retry interval",
            ));
        }
        if webhook.request_timeout_secs == 0 {
            return Err(invalid("webhook.request_timeout_secs", "must be greater than zero"));
        }
        if let Some(url) = &webhook.url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(invalid("webhook.url", "must be an http or https URL"));
        }

        Ok(())
    }

    pub fn window_config(&self) -> WindowConfig {
        WindowConfig {
            sample_rate: self.audio.sample_rate,
            window_size: self.audio.window_size,
            hop_size: self.audio.hop_size,
        }
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            sample_rate: self.audio.sample_rate,
            window_size: self.audio.window_size,
            noise_floor: self.detector.noise_floor,
            max_twist_db: self.detector.max_twist_db,
            dominance_margin_db: self.detector.dominance_margin_db,
            min_energy_ratio: self.detector.min_energy_ratio,
        }
    }

    pub fn debounce_config(&self) -> DebounceConfig {
        DebounceConfig {
            min_tone_frames: self.debounce.min_tone_frames,
            min_gap_frames: self.debounce.min_gap_frames,
        }
    }

    pub fn trigger_config(&self) -> TriggerConfig {
        TriggerConfig {
            cooldown: Duration::from_secs(self.trigger.cooldown_secs),
        }
    }

    pub fn delivery_config(&self) -> DeliveryConfig {
        DeliveryConfig {
            retry_interval: Duration::from_secs(self.webhook.retry_interval_secs),
            deadline: Duration::from_secs(self.webhook.retry_deadline_secs),
        }
    }

    pub fn modem_config(&self) -> ModemConfig {
        ModemConfig {
            port: self.modem.port.clone(),
            baud: self.modem.baud,
            gain: self.modem.gain,
            sample_rate: self.audio.sample_rate,
            io_timeout: defaults::MODEM_IO_TIMEOUT,
        }
    }

    /// Webhook destination. Fails when no URL is configured.
    pub fn webhook_config(&self) -> Result<WebhookConfig> {
        let url = self
            .webhook
            .url
            .clone()
            .ok_or_else(|| invalid("webhook.url", "required to deliver notifications"))?;
        Ok(WebhookConfig {
            url,
            credential: self.webhook.credential.clone(),
            timeout: Duration::from_secs(self.webhook.request_timeout_secs),
        })
    }

    /// Serialize to TOML, as printed by `dialwatch config show`.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DialwatchError::Other(format!("Failed to serialize config: {e}")))
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn invalid(key: &str, message: &str) -> DialwatchError {
    DialwatchError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
