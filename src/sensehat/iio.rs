use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::sensehat::HardwareError;

pub const IIO_ROOT: &str = "/sys/bus/iio/devices";

/// One Linux IIO device, read through sysfs.
#[derive(Debug, Clone)]
pub struct IioDevice {
    path: PathBuf,
    name: String,
}

impl IioDevice {
    /// Finds the first device under `root` whose `name` attribute matches one of `names`.
    pub fn find(root: &Path, names: &[&str]) -> Result<Self, HardwareError> {
        let entries = fs::read_dir(root).map_err(HardwareError::io(root))?;

        for entry in entries {
            let path = entry.map_err(HardwareError::io(root))?.path();
            let Ok(name) = fs::read_to_string(path.join("name")) else {
                continue;
            };
            let name = name.trim();

            if names.contains(&name) {
                return Ok(Self {
                    name: name.to_string(),
                    path,
                });
            }
        }

        Err(HardwareError::NotFound(format!(
            "IIO device {} under {root:?}",
            names.join(" or ")
        )))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads `channel` in IIO base units: `_input` when the driver provides
    /// it, otherwise `(raw + offset) * scale`. Offset and scale fall back to
    /// the channel type's shared attribute (`in_accel_scale` for `accel_x`).
    pub async fn read_channel(&self, channel: &str) -> Result<f64, HardwareError> {
        if let Some(value) = self.read_attr(&format!("in_{channel}_input")).await? {
            return Ok(value);
        }

        let raw_attr = format!("in_{channel}_raw");
        let raw = self.read_attr(&raw_attr).await?.ok_or_else(|| {
            HardwareError::NotFound(format!("{:?}", self.path.join(&raw_attr)))
        })?;
        let offset = self.read_shared_attr(channel, "offset").await?.unwrap_or(0.0);
        let scale = self.read_shared_attr(channel, "scale").await?.unwrap_or(1.0);

        Ok((raw + offset) * scale)
    }

    async fn read_shared_attr(
        &self,
        channel: &str,
        suffix: &str,
    ) -> Result<Option<f64>, HardwareError> {
        if let Some(value) = self.read_attr(&format!("in_{channel}_{suffix}")).await? {
            return Ok(Some(value));
        }

        match channel.split_once('_') {
            Some((kind, _)) => self.read_attr(&format!("in_{kind}_{suffix}")).await,
            None => Ok(None),
        }
    }

    async fn read_attr(&self, attr: &str) -> Result<Option<f64>, HardwareError> {
        let path = self.path.join(attr);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(HardwareError::Io { path, source: e }),
        };

        let value = content.trim();
        value
            .parse()
            .map(Some)
            .map_err(|_| HardwareError::Parse {
                value: value.to_string(),
                path,
            })
    }
}
