use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::sensehat::{CpuThermometer, EnvironmentSensor, HardwareError};

/// Empirical divisor for the heat the CPU radiates onto the board's sensors.
// Ref: https://yaab-arduino.blogspot.com/2016/08/accurate-temperature-reading-sensehat.html
pub const DEFAULT_CPU_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub temp_room: f64,

    pub temp_cpu: f64,

    pub temp_avg: f64,

    pub humidity: f64,

    pub pressure: f64,

    pub timestamp: DateTime<FixedOffset>,
}

impl Reading {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Unrounded values as they come from the sensors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub temperature_from_pressure: f64,
    pub temperature_from_humidity: f64,
    pub cpu_temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregator {
    pub cpu_factor: f64,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self {
            cpu_factor: DEFAULT_CPU_FACTOR,
        }
    }
}

impl Aggregator {
    pub fn new(cpu_factor: f64) -> Self {
        Self { cpu_factor }
    }

    pub fn room_temperature(&self, from_pressure: f64, from_humidity: f64) -> f64 {
        round_to((from_pressure + from_humidity) / 2.0, 1)
    }

    pub fn compensated_temperature(&self, temp_room: f64, temp_cpu: f64) -> f64 {
        round_to(temp_room - (temp_cpu - temp_room) / self.cpu_factor, 1)
    }

    pub fn aggregate(&self, sample: RawSample, timestamp: DateTime<FixedOffset>) -> Reading {
        let temp_room = self.room_temperature(
            sample.temperature_from_pressure,
            sample.temperature_from_humidity,
        );
        let temp_cpu = round_to(sample.cpu_temperature, 1);

        Reading {
            temp_room,
            temp_cpu,
            temp_avg: self.compensated_temperature(temp_room, temp_cpu),
            humidity: round_to(sample.humidity, 1),
            pressure: round_to(sample.pressure, 2),
            timestamp,
        }
    }

    pub async fn read<S, C>(
        &self,
        sensor: &S,
        cpu: &C,
        timestamp: DateTime<FixedOffset>,
    ) -> Result<Reading, HardwareError>
    where
        S: EnvironmentSensor,
        C: CpuThermometer,
    {
        let cpu_temperature = cpu.temperature().await?;
        let sample = RawSample {
            temperature_from_pressure: sensor.temperature_from_pressure().await?,
            temperature_from_humidity: sensor.temperature_from_humidity().await?,
            cpu_temperature,
            humidity: sensor.humidity().await?,
            pressure: sensor.pressure().await?,
        };

        Ok(self.aggregate(sample, timestamp))
    }
}

/// Rounds to `decimals` places, exact ties going to the even neighbour.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}
