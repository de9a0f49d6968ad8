use std::{future::Future, path::PathBuf};

use tokio::process::Command;

use crate::sensehat::HardwareError;

const VCGENCMD: &str = "vcgencmd";
const THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

/// SoC temperature in °C.
pub trait CpuThermometer {
    fn temperature(&self) -> impl Future<Output = Result<f64, HardwareError>> + Send;
}

/// Runs `vcgencmd measure_temp`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Vcgencmd;

impl CpuThermometer for Vcgencmd {
    async fn temperature(&self) -> Result<f64, HardwareError> {
        let output = Command::new(VCGENCMD)
            .arg("measure_temp")
            .output()
            .await
            .map_err(|source| HardwareError::Command {
                command: VCGENCMD,
                source,
            })?;

        if !output.status.success() {
            return Err(HardwareError::CommandStatus {
                command: VCGENCMD,
                status: output.status,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_vcgencmd(&stdout).ok_or_else(|| HardwareError::CommandOutput {
            command: VCGENCMD,
            output: stdout.into_owned(),
        })
    }
}

/// Parses `temp=48.3'C`.
pub fn parse_vcgencmd(output: &str) -> Option<f64> {
    output
        .trim()
        .strip_prefix("temp=")?
        .strip_suffix("'C")?
        .parse()
        .ok()
}

/// Reads the kernel thermal zone, reported in millidegrees.
#[derive(Debug, Clone)]
pub struct ThermalZone {
    path: PathBuf,
}

impl ThermalZone {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ThermalZone {
    fn default() -> Self {
        Self::new(THERMAL_ZONE)
    }
}

impl CpuThermometer for ThermalZone {
    async fn temperature(&self) -> Result<f64, HardwareError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(HardwareError::io(&self.path))?;
        let value = content.trim();

        let millidegrees: f64 = value.parse().map_err(|_| HardwareError::Parse {
            path: self.path.clone(),
            value: value.to_string(),
        })?;

        Ok(millidegrees / 1000.0)
    }
}

/// Source picked at startup.
#[derive(Debug, Clone)]
pub enum CpuSource {
    Vcgencmd(Vcgencmd),
    ThermalZone(ThermalZone),
}

impl CpuSource {
    /// The thermal zone at `path` when given, `vcgencmd` otherwise.
    pub fn new(thermal_zone: Option<PathBuf>) -> Self {
        match thermal_zone {
            Some(path) => CpuSource::ThermalZone(ThermalZone::new(path)),
            None => CpuSource::Vcgencmd(Vcgencmd),
        }
    }
}

impl CpuThermometer for CpuSource {
    async fn temperature(&self) -> Result<f64, HardwareError> {
        match self {
            CpuSource::Vcgencmd(v) => v.temperature().await,
            CpuSource::ThermalZone(z) => z.temperature().await,
        }
    }
}
