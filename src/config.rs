use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use serde_json::Value;

use crate::discovery::Channel;

const REQUIRED_FIELDS: [&str; 4] = ["id", "broker", "topics", "seconds"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("configuration is empty")]
    Empty,

    #[error("configuration is not valid JSON")]
    Syntax(#[source] serde_json::Error),

    #[error("no '{0}' field in configuration")]
    MissingField(&'static str),

    #[error("invalid configuration")]
    Invalid(#[source] serde_json::Error),

    #[error("'seconds' must be a positive integer")]
    InvalidInterval,

    #[error("encrypted client keys are not supported, clear 'keyfile_password'")]
    EncryptedKey,

    #[error("failed to read TLS file {path:?}")]
    TlsFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub id: String,

    pub broker: Broker,

    #[serde(default)]
    pub client: Option<ClientTls>,

    pub topics: Topics,

    #[serde(default)]
    pub device: DeviceInfo,

    pub seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Broker {
    pub host: String,

    pub port: u16,

    pub username: String,

    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientTls {
    pub certfile: String,

    pub keyfile: String,

    pub keyfile_password: String,

    pub ca_certs: String,
}

impl ClientTls {
    pub fn enabled(&self) -> bool {
        !self.certfile.is_empty()
    }
}

/// Topic fragments. Full topics are built by plain concatenation, e.g.
/// `humidity + state`.
#[derive(Debug, Clone, Deserialize)]
pub struct Topics {
    pub state: String,

    pub config: String,

    pub availability: String,

    pub humidity: String,

    pub pressure: String,

    pub temperature: String,

    pub temp_cpu: String,

    #[serde(default)]
    pub temp_avg: Option<String>,

    pub json: String,

    pub device: String,
}

impl Topics {
    pub fn channel(&self, channel: Channel) -> Option<&str> {
        match channel {
            Channel::Humidity => Some(&self.humidity),
            Channel::Pressure => Some(&self.pressure),
            Channel::Temperature => Some(&self.temperature),
            Channel::CpuTemperature => Some(&self.temp_cpu),
            Channel::CompensatedTemperature => self.temp_avg.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceInfo {
    pub identifiers: String,

    pub name: String,

    pub sw_version: String,

    pub model: String,

    pub manufacturer: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            identifiers: "sensehat01rpi".to_string(),
            name: "SenseHat".to_string(),
            sw_version: env!("CARGO_PKG_VERSION").to_string(),
            model: "Raspberry Pi 4 Model B+".to_string(),
            manufacturer: "Raspberry Pi Foundation".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Err(ConfigError::Empty);
        }

        let value: Value = serde_json::from_str(content).map_err(ConfigError::Syntax)?;
        for field in REQUIRED_FIELDS {
            if value.get(field).is_none() {
                return Err(ConfigError::MissingField(field));
            }
        }

        let config: Config = serde_json::from_value(value).map_err(ConfigError::Invalid)?;
        if config.seconds == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        if let Some(tls) = &config.client
            && tls.enabled()
            && !tls.keyfile_password.is_empty()
        {
            return Err(ConfigError::EncryptedKey);
        }

        Ok(config)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.seconds)
    }

    pub fn availability_topic(&self) -> String {
        format!("{}{}", self.id, self.topics.availability)
    }

    pub fn state_topic(&self, channel: Channel) -> Option<String> {
        self.topics
            .channel(channel)
            .map(|base| format!("{base}{}", self.topics.state))
    }

    pub fn config_topic(&self, channel: Channel) -> Option<String> {
        self.topics
            .channel(channel)
            .map(|base| format!("{base}{}", self.topics.config))
    }

    pub fn device_config_topic(&self) -> String {
        format!("{}{}", self.topics.device, self.topics.config)
    }

    /// Channels that have a topic configured, in publish order.
    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        Channel::ALL
            .into_iter()
            .filter(|c| self.topics.channel(*c).is_some())
    }
}
