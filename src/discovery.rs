use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{config::Config, metrics::Reading};

// Ref: https://www.home-assistant.io/integrations/mqtt/#mqtt-discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Humidity,
    Pressure,
    Temperature,
    CpuTemperature,
    CompensatedTemperature,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::Humidity,
        Channel::Pressure,
        Channel::Temperature,
        Channel::CpuTemperature,
        Channel::CompensatedTemperature,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Humidity => "humidity",
            Channel::Pressure => "pressure",
            Channel::Temperature => "temperature",
            Channel::CpuTemperature => "temp_cpu",
            Channel::CompensatedTemperature => "temp_avg",
        }
    }

    pub fn device_class(&self) -> &'static str {
        match self {
            Channel::Humidity => "humidity",
            Channel::Pressure => "pressure",
            Channel::Temperature | Channel::CpuTemperature | Channel::CompensatedTemperature => {
                "temperature"
            }
        }
    }

    pub fn unit_of_measurement(&self) -> &'static str {
        match self {
            Channel::Humidity => "%",
            Channel::Pressure => "hPa",
            Channel::Temperature | Channel::CpuTemperature | Channel::CompensatedTemperature => {
                "°C"
            }
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Channel::Humidity => "mdi:water-percent",
            Channel::Pressure => "mdi:gauge",
            Channel::Temperature | Channel::CompensatedTemperature => "mdi:thermometer",
            Channel::CpuTemperature => "mdi:cpu-64-bit",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Channel::Humidity => "Humidity",
            Channel::Pressure => "Pressure",
            Channel::Temperature => "Temperature",
            Channel::CpuTemperature => "CPU Temperature",
            Channel::CompensatedTemperature => "Compensated Temperature",
        }
    }

    pub fn decimals(&self) -> usize {
        match self {
            Channel::Pressure => 2,
            _ => 1,
        }
    }

    pub fn value(&self, reading: &Reading) -> f64 {
        match self {
            Channel::Humidity => reading.humidity,
            Channel::Pressure => reading.pressure,
            Channel::Temperature => reading.temp_room,
            Channel::CpuTemperature => reading.temp_cpu,
            Channel::CompensatedTemperature => reading.temp_avg,
        }
    }

    /// State payload: the value with the channel's fixed number of decimals.
    pub fn state(&self, reading: &Reading) -> String {
        format!("{:.*}", self.decimals(), self.value(reading))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub identifiers: String,

    pub name: String,

    pub sw_version: String,

    pub model: String,

    pub manufacturer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryMessage {
    pub device_class: String,

    pub availability_topic: String,

    pub state_topic: String,

    pub unit_of_measurement: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_class: Option<String>,

    pub icon: String,

    pub name: String,

    pub unique_id: String,

    pub device: DeviceDescriptor,
}

/// All discovery documents of one device bundled in a single payload.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSummary {
    pub device_name: String,

    pub device_id: String,

    pub availability_topic: String,

    pub model: String,

    pub manufacturer: String,

    #[serde(flatten)]
    pub sensors: BTreeMap<&'static str, DiscoveryMessage>,
}

/// A discovery document together with the topic it is published on.
#[derive(Debug, Clone)]
pub struct Announcement {
    pub channel: Channel,

    pub topic: String,

    pub message: DiscoveryMessage,
}

pub fn device_descriptor(config: &Config) -> DeviceDescriptor {
    DeviceDescriptor {
        identifiers: config.device.identifiers.clone(),
        name: config.device.name.clone(),
        sw_version: config.device.sw_version.clone(),
        model: config.device.model.clone(),
        manufacturer: config.device.manufacturer.clone(),
    }
}

pub fn discovery_message(config: &Config, channel: Channel) -> Option<DiscoveryMessage> {
    let state_topic = config.state_topic(channel)?;

    Some(DiscoveryMessage {
        device_class: channel.device_class().to_string(),
        availability_topic: config.availability_topic(),
        state_topic,
        unit_of_measurement: channel.unit_of_measurement().to_string(),
        state_class: Some("measurement".to_string()),
        icon: channel.icon().to_string(),
        name: channel.display_name().to_string(),
        unique_id: format!("{}_{}", config.device.identifiers, channel.as_str()),
        device: device_descriptor(config),
    })
}

pub fn announcements(config: &Config) -> Vec<Announcement> {
    config
        .channels()
        .filter_map(|channel| {
            Some(Announcement {
                channel,
                topic: config.config_topic(channel)?,
                message: discovery_message(config, channel)?,
            })
        })
        .collect()
}

pub fn device_summary(config: &Config) -> DeviceSummary {
    DeviceSummary {
        device_name: config.device.name.clone(),
        device_id: config.device.identifiers.clone(),
        availability_topic: config.availability_topic(),
        model: config.device.model.clone(),
        manufacturer: config.device.manufacturer.clone(),
        sensors: announcements(config)
            .into_iter()
            .map(|a| (a.channel.as_str(), a.message))
            .collect(),
    }
}
