//! Configuration management for hark.
//!
//! The configuration is a single toml document read once at startup and
//! treated as an immutable lookup afterwards.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::APP_NAME;

/// Whether queries are sent anonymously or with a signed-in account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageMode {
    #[default]
    Anonymous,
    Authenticated,
}

/// Where wake events come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WakeSource {
    /// Enter pressed on stdin
    #[default]
    Keyboard,
    /// Push button wired to a GPIO input
    Button,
}

/// Where status signal lines are driven.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalBackend {
    /// Only log signal changes
    #[default]
    Log,
    /// Drive Raspberry Pi GPIO outputs (`rpi` feature)
    Gpio,
}

/// Username/password pair for the Watson speech-to-text service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct WatsonCredentials {
    pub username: String,
    pub password: String,
}

/// Watson text-to-speech credentials and voice.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WatsonTtsConfig {
    pub username: String,
    pub password: String,
    #[serde(default = "default_watson_voice")]
    pub voice: String,
}

/// Account used when `usage_mode` is `authenticated`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

/// BCM pin numbers of the status outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Pins {
    pub capturing: u32,
    pub processing: u32,
    pub speaking: u32,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            capturing: 22,
            processing: 17,
            speaking: 27,
        }
    }
}

/// Configuration structure for the appliance.
///
/// Provider selections are kept as plain strings; they are resolved into
/// concrete backends once at startup, so an unknown name is only detected
/// there.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Speech-to-text provider: google, watson or bing
    #[serde(default = "default_stt")]
    pub default_stt: String,

    /// Text-to-speech provider: google, flite or watson
    #[serde(default = "default_tts")]
    pub default_tts: String,

    /// API key for the Google speech endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_stt_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bing_speech_api_key: Option<String>,

    /// Recognition and synthesis language (BCP 47)
    #[serde(default = "default_language")]
    pub language: String,

    /// Maximum length of one captured phrase, in seconds
    #[serde(default = "default_phrase_time_limit")]
    pub phrase_time_limit: f32,

    /// Level (dBFS) above which captured audio counts as speech
    #[serde(default = "default_energy_threshold")]
    pub energy_threshold: f32,

    /// Timeout for every backend request, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: f32,

    #[serde(default)]
    pub usage_mode: UsageMode,

    /// Override for the question-answering endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_endpoint: Option<String>,

    /// Look up the device location once at startup and attach it to queries
    #[serde(default = "default_true")]
    pub detect_location: bool,

    #[serde(default)]
    pub wake: WakeSource,

    /// GPIO input used when `wake` is `button`
    #[serde(default = "default_wake_button_pin")]
    pub wake_button_pin: u32,

    #[serde(default)]
    pub signals: SignalBackend,

    // Tables go last so the document serializes cleanly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watson_stt: Option<WatsonCredentials>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watson_tts: Option<WatsonTtsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<LoginCredentials>,

    #[serde(default)]
    pub pins: Pins,
}

fn default_stt() -> String {
    "google".to_string()
}

fn default_tts() -> String {
    "google".to_string()
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_watson_voice() -> String {
    "en-US_AllisonVoice".to_string()
}

fn default_phrase_time_limit() -> f32 {
    5.0
}

fn default_energy_threshold() -> f32 {
    -40.0
}

fn default_request_timeout() -> f32 {
    10.0
}

fn default_true() -> bool {
    true
}

fn default_wake_button_pin() -> u32 {
    24
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_stt: default_stt(),
            default_tts: default_tts(),
            google_stt_key: None,
            watson_stt: None,
            watson_tts: None,
            bing_speech_api_key: None,
            language: default_language(),
            phrase_time_limit: default_phrase_time_limit(),
            energy_threshold: default_energy_threshold(),
            request_timeout: default_request_timeout(),
            usage_mode: UsageMode::default(),
            login: None,
            query_endpoint: None,
            detect_location: true,
            wake: WakeSource::default(),
            wake_button_pin: default_wake_button_pin(),
            signals: SignalBackend::default(),
            pins: Pins::default(),
        }
    }
}

impl Config {
    /// Maximum phrase duration as a Duration
    pub fn phrase_time_limit(&self) -> Duration {
        Duration::from_secs_f32(self.phrase_time_limit.max(0.1))
    }

    /// Backend request timeout as a Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f32(self.request_timeout.max(0.1))
    }

    /// Login credentials, only when running in authenticated mode.
    pub fn login(&self) -> Option<&LoginCredentials> {
        match self.usage_mode {
            UsageMode::Authenticated => self.login.as_ref(),
            UsageMode::Anonymous => None,
        }
    }

    /// Log a warning for every selected backend that lacks credentials.
    ///
    /// Missing credentials are not fatal: the backend reports a request
    /// failure when it is used.
    pub fn warn_missing_credentials(&self) {
        match self.default_stt.as_str() {
            "google" if self.google_stt_key.is_none() => {
                warn!("google speech-to-text selected but `google_stt_key` is not set")
            }
            "watson" if self.watson_stt.is_none() => {
                warn!("watson speech-to-text selected but `watson_stt` credentials are not set")
            }
            "bing" if self.bing_speech_api_key.is_none() => {
                warn!("bing speech-to-text selected but `bing_speech_api_key` is not set")
            }
            _ => {}
        }

        if self.default_tts == "watson" && self.watson_tts.is_none() {
            warn!("watson text-to-speech selected but `watson_tts` is not set");
        }

        if self.usage_mode == UsageMode::Authenticated && self.login.is_none() {
            warn!("usage_mode is authenticated but no `login` is configured");
        }
    }
}

/// Manages loading and saving configuration files.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Creates a new ConfigManager with the default configuration path.
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Ok(Self { config_path })
    }

    /// Creates a ConfigManager for an explicit file path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// Creates a ConfigManager for `<dir>/hark.toml`.
    pub fn with_config_dir<P: AsRef<Path>>(dir: P) -> Self {
        let config_path = dir.as_ref().join(format!("{}.toml", APP_NAME));
        Self { config_path }
    }

    /// Returns the default path to the configuration file.
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to retrieve configuration directory")?;
        Ok(config_dir.join(APP_NAME).join(format!("{}.toml", APP_NAME)))
    }

    /// Loads the configuration from the config file or returns default.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let config_content = fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config file at {:?}", self.config_path))?;

        let config: Config = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file at {:?}", self.config_path))?;

        Ok(config)
    }

    /// Saves the configuration to the config file.
    pub fn save(&self, config: &Config) -> Result<()> {
        let config_dir = self
            .config_path
            .parent()
            .with_context(|| format!("Failed to get parent directory of {:?}", self.config_path))?;

        fs::create_dir_all(config_dir)
            .with_context(|| format!("Failed to create config directory at {:?}", config_dir))?;

        let serialized =
            toml::to_string_pretty(&config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, serialized)
            .with_context(|| format!("Failed to write config file at {:?}", self.config_path))?;

        Ok(())
    }

    /// Returns the path to the configuration file.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.default_stt, "google");
        assert_eq!(config.default_tts, "google");
        assert_eq!(config.phrase_time_limit(), Duration::from_secs(5));
        assert_eq!(config.pins.processing, 17);
        assert_eq!(config.pins.speaking, 27);
        assert_eq!(config.pins.capturing, 22);
        assert!(config.login().is_none());
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            default_stt = "watson"
            phrase_time_limit = 3.5

            [watson_stt]
            username = "user"
            password = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.default_stt, "watson");
        assert_eq!(config.default_tts, "google");
        assert_eq!(config.phrase_time_limit(), Duration::from_secs_f32(3.5));
        assert_eq!(config.watson_stt.unwrap().username, "user");
        assert_eq!(config.wake, WakeSource::Keyboard);
    }

    #[test]
    fn test_login_only_in_authenticated_mode() {
        let mut config = Config {
            login: Some(LoginCredentials {
                email: "a@b.c".to_string(),
                password: "pw".to_string(),
            }),
            ..Default::default()
        };
        assert!(config.login().is_none());

        config.usage_mode = UsageMode::Authenticated;
        assert_eq!(config.login().unwrap().email, "a@b.c");
    }

    #[test]
    fn test_config_manager_missing_file_is_default() {
        let temp_dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_config_dir(temp_dir.path());

        let config = manager.load().unwrap();
        assert_eq!(config.default_stt, "google");
    }

    #[test]
    fn test_config_manager_save_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_config_dir(temp_dir.path().join("nested"));

        let config = Config {
            default_tts: "flite".to_string(),
            bing_speech_api_key: Some("bing-key".to_string()),
            signals: SignalBackend::Gpio,
            ..Default::default()
        };

        manager.save(&config).unwrap();
        let loaded = manager.load().unwrap();

        assert_eq!(loaded.default_tts, "flite");
        assert_eq!(loaded.bing_speech_api_key.as_deref(), Some("bing-key"));
        assert_eq!(loaded.signals, SignalBackend::Gpio);
    }

    #[test]
    fn test_config_manager_rejects_malformed_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("broken.toml");
        fs::write(&path, "default_stt = [").unwrap();

        let manager = ConfigManager::from_path(&path);
        assert!(manager.load().is_err());
    }
}
