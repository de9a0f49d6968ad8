use std::{future::Future, path::Path};

use crate::sensehat::{HardwareError, IIO_ROOT, IioDevice};

const HUMIDITY_SENSOR_NAMES: [&str; 1] = ["hts221"];
const PRESSURE_SENSOR_NAMES: [&str; 2] = ["lps25h", "lps25h_press"];

/// Temperature, humidity and pressure in °C, %RH and hPa.
pub trait EnvironmentSensor {
    fn temperature_from_humidity(&self)
    -> impl Future<Output = Result<f64, HardwareError>> + Send;

    fn temperature_from_pressure(&self)
    -> impl Future<Output = Result<f64, HardwareError>> + Send;

    fn humidity(&self) -> impl Future<Output = Result<f64, HardwareError>> + Send;

    fn pressure(&self) -> impl Future<Output = Result<f64, HardwareError>> + Send;
}

/// The SenseHat's HTS221 and LPS25H through their kernel IIO drivers.
#[derive(Debug, Clone)]
pub struct IioEnvironment {
    humidity_sensor: IioDevice,
    pressure_sensor: IioDevice,
}

impl IioEnvironment {
    pub fn open() -> Result<Self, HardwareError> {
        Self::open_at(Path::new(IIO_ROOT))
    }

    pub fn open_at(root: &Path) -> Result<Self, HardwareError> {
        Ok(Self {
            humidity_sensor: IioDevice::find(root, &HUMIDITY_SENSOR_NAMES)?,
            pressure_sensor: IioDevice::find(root, &PRESSURE_SENSOR_NAMES)?,
        })
    }
}

impl EnvironmentSensor for IioEnvironment {
    async fn temperature_from_humidity(&self) -> Result<f64, HardwareError> {
        // millidegrees Celsius
        Ok(self.humidity_sensor.read_channel("temp").await? / 1000.0)
    }

    async fn temperature_from_pressure(&self) -> Result<f64, HardwareError> {
        Ok(self.pressure_sensor.read_channel("temp").await? / 1000.0)
    }

    async fn humidity(&self) -> Result<f64, HardwareError> {
        // milli percent
        Ok(self.humidity_sensor.read_channel("humidityrelative").await? / 1000.0)
    }

    async fn pressure(&self) -> Result<f64, HardwareError> {
        // kPa
        Ok(self.pressure_sensor.read_channel("pressure").await? * 10.0)
    }
}
