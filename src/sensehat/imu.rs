use std::{future::Future, path::Path};

use crate::sensehat::{HardwareError, IIO_ROOT, IioDevice};

const ACCELEROMETER_NAMES: [&str; 2] = ["lsm9ds1_accel", "lsm9ds1-accel"];
const MAGNETOMETER_NAMES: [&str; 2] = ["lsm9ds1_magn", "lsm9ds1-magn"];

const STANDARD_GRAVITY: f64 = 9.80665;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    /// True when any axis exceeds `threshold` in magnitude.
    pub fn exceeds(&self, threshold: f64) -> bool {
        self.x.abs() > threshold || self.y.abs() > threshold || self.z.abs() > threshold
    }
}

/// Degrees in `[0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    pub pitch: f64,
    pub roll: f64,
    pub yaw: f64,
}

impl Orientation {
    /// Tilt from gravity, heading from the magnetometer when one is present.
    pub fn from_vectors(acceleration: Vector3, magnetic: Option<Vector3>) -> Self {
        let Vector3 { x, y, z } = acceleration;
        let roll = y.atan2(z);
        let pitch = (-x).atan2((y * y + z * z).sqrt());

        let yaw = match magnetic {
            Some(m) => {
                let mx = m.x * pitch.cos() + m.z * pitch.sin();
                let my = m.x * roll.sin() * pitch.sin() + m.y * roll.cos()
                    - m.z * roll.sin() * pitch.cos();
                (-my).atan2(mx)
            }
            None => 0.0,
        };

        Self {
            pitch: normalize_degrees(pitch.to_degrees()),
            roll: normalize_degrees(roll.to_degrees()),
            yaw: normalize_degrees(yaw.to_degrees()),
        }
    }
}

fn normalize_degrees(degrees: f64) -> f64 {
    let d = degrees.rem_euclid(360.0);
    if d >= 360.0 { 0.0 } else { d }
}

pub trait MotionSensor {
    /// Acceleration in g.
    fn acceleration(&self) -> impl Future<Output = Result<Vector3, HardwareError>> + Send;

    fn orientation(&self) -> impl Future<Output = Result<Orientation, HardwareError>> + Send;
}

/// The SenseHat's LSM9DS1 accelerometer and magnetometer through IIO.
#[derive(Debug, Clone)]
pub struct IioImu {
    accelerometer: IioDevice,
    magnetometer: Option<IioDevice>,
}

impl IioImu {
    pub fn open() -> Result<Self, HardwareError> {
        Self::open_at(Path::new(IIO_ROOT))
    }

    pub fn open_at(root: &Path) -> Result<Self, HardwareError> {
        let accelerometer = IioDevice::find(root, &ACCELEROMETER_NAMES)?;
        let magnetometer = match IioDevice::find(root, &MAGNETOMETER_NAMES) {
            Ok(device) => Some(device),
            Err(HardwareError::NotFound(what)) => {
                tracing::debug!("no magnetometer, yaw fixed at 0: {what}");
                None
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            accelerometer,
            magnetometer,
        })
    }

    async fn read_vector(device: &IioDevice, kind: &str) -> Result<Vector3, HardwareError> {
        Ok(Vector3 {
            x: device.read_channel(&format!("{kind}_x")).await?,
            y: device.read_channel(&format!("{kind}_y")).await?,
            z: device.read_channel(&format!("{kind}_z")).await?,
        })
    }
}

impl MotionSensor for IioImu {
    async fn acceleration(&self) -> Result<Vector3, HardwareError> {
        // m/s^2
        let v = Self::read_vector(&self.accelerometer, "accel").await?;
        Ok(Vector3 {
            x: v.x / STANDARD_GRAVITY,
            y: v.y / STANDARD_GRAVITY,
            z: v.z / STANDARD_GRAVITY,
        })
    }

    async fn orientation(&self) -> Result<Orientation, HardwareError> {
        let acceleration = self.acceleration().await?;
        let magnetic = match &self.magnetometer {
            Some(m) => Some(Self::read_vector(m, "magn").await?),
            None => None,
        };

        Ok(Orientation::from_vectors(acceleration, magnetic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensehat::fake_sysfs;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn flat_board_is_level() {
        let o = Orientation::from_vectors(Vector3 { x: 0.0, y: 0.0, z: 1.0 }, None);

        assert!(approx(o.pitch, 0.0));
        assert!(approx(o.roll, 0.0));
        assert!(approx(o.yaw, 0.0));
    }

    #[test]
    fn tilted_board() {
        let o = Orientation::from_vectors(Vector3 { x: 0.0, y: 1.0, z: 0.0 }, None);
        assert!(approx(o.roll, 90.0));

        let o = Orientation::from_vectors(Vector3 { x: 1.0, y: 0.0, z: 0.0 }, None);
        assert!(approx(o.pitch, 270.0));
    }

    #[test]
    fn heading_from_magnetometer() {
        let level = Vector3 { x: 0.0, y: 0.0, z: 1.0 };

        let north = Orientation::from_vectors(level, Some(Vector3 { x: 1.0, y: 0.0, z: 0.0 }));
        assert!(approx(north.yaw, 0.0));

        let west = Orientation::from_vectors(level, Some(Vector3 { x: 0.0, y: 1.0, z: 0.0 }));
        assert!(approx(west.yaw, 270.0));
    }

    #[test]
    fn shake_threshold() {
        assert!(!Vector3 { x: 0.1, y: -0.2, z: 1.0 }.exceeds(2.0));
        assert!(Vector3 { x: -2.5, y: 0.0, z: 1.0 }.exceeds(2.0));
    }

    #[tokio::test]
    async fn reads_acceleration_in_g() {
        let root = fake_sysfs::root("imu");
        fake_sysfs::write(
            &root.join("iio:device2"),
            &[
                ("name", "lsm9ds1_accel"),
                ("in_accel_scale", "0.00980665"),
                ("in_accel_x_raw", "0"),
                ("in_accel_y_raw", "500"),
                ("in_accel_z_raw", "1000"),
            ],
        );

        let imu = IioImu::open_at(&root).unwrap();
        let a = imu.acceleration().await.unwrap();

        assert!(approx(a.x, 0.0));
        assert!(approx(a.y, 0.5));
        assert!(approx(a.z, 1.0));
        assert!(approx(imu.orientation().await.unwrap().yaw, 0.0));
    }
}
