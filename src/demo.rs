use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

use crate::{
    display::{Display, DisplayError, LedMatrix, MATRIX_SIZE, Rgb},
    joystick::Direction,
    sensehat::{EnvironmentSensor, HardwareError, MotionSensor, Orientation},
};

pub const DEMO_SCROLL_SPEED: Duration = Duration::from_millis(50);

/// Any accelerometer axis above this, in g, counts as a shake.
pub const SHAKE_THRESHOLD: f64 = 2.0;

const DISCO_PIXELS: usize = 64;
const DISCO_DELAY: Duration = Duration::from_millis(100);
const FLASHLIGHT_STEPS: usize = 10;
const FLASHLIGHT_DELAY: Duration = Duration::from_secs(1);
// Maps [0, 360) degrees onto a colour channel.
const DEGREES_PER_LEVEL: f64 = 1.42;

#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    #[error(transparent)]
    Hardware(#[from] HardwareError),

    #[error(transparent)]
    Display(#[from] DisplayError),
}

pub fn humidity_message(humidity: f64) -> String {
    format!("Humidity: {humidity:.1}%")
}

pub fn pressure_message(pressure: f64) -> String {
    format!("Pressure: {pressure:.2} Millibar")
}

pub fn temperature_message(temperature: f64) -> String {
    format!("{temperature:.1} Celsius")
}

pub fn flashlight_color(orientation: Orientation) -> Rgb {
    let level = |degrees: f64| (degrees / DEGREES_PER_LEVEL) as u8;
    Rgb::new(
        level(orientation.pitch),
        level(orientation.roll),
        level(orientation.yaw),
    )
}

/// Joystick and shake reactions on the LED matrix.
pub struct Demo<M: LedMatrix, S, I, R> {
    display: Display<M>,
    sensor: S,
    imu: I,
    rng: R,
}

impl<M, S, I, R> Demo<M, S, I, R>
where
    M: LedMatrix,
    S: EnvironmentSensor,
    I: MotionSensor,
    R: Rng,
{
    pub fn new(display: Display<M>, sensor: S, imu: I, rng: R) -> Self {
        Self {
            display,
            sensor,
            imu,
            rng,
        }
    }

    pub fn display(&self) -> &Display<M> {
        &self.display
    }

    pub async fn handle(&mut self, direction: Direction) -> Result<(), DemoError> {
        tracing::debug!(?direction, "joystick pressed");
        match direction {
            Direction::Up => self.humidity().await,
            Direction::Left => self.pressure().await,
            Direction::Down => self.disco().await,
            Direction::Right => self.flashlight().await,
            Direction::Middle => Ok(self.display.clear()?),
        }
    }

    pub async fn humidity(&mut self) -> Result<(), DemoError> {
        let text = humidity_message(self.sensor.humidity().await?);
        self.scroll(&text, Rgb::GREY).await
    }

    pub async fn pressure(&mut self) -> Result<(), DemoError> {
        let text = pressure_message(self.sensor.pressure().await?);
        self.scroll(&text, Rgb::RED).await
    }

    /// Random colours on random pixels, one every 100 ms.
    pub async fn disco(&mut self) -> Result<(), DemoError> {
        for _ in 0..DISCO_PIXELS {
            let x = self.rng.random_range(0..MATRIX_SIZE);
            let y = self.rng.random_range(0..MATRIX_SIZE);
            let color = Rgb::new(self.rng.random(), self.rng.random(), self.rng.random());

            self.display.set_pixel(x, y, color)?;
            sleep(DISCO_DELAY).await;
        }
        Ok(())
    }

    /// Fills the matrix with a colour derived from the board's orientation,
    /// once a second for ten seconds.
    pub async fn flashlight(&mut self) -> Result<(), DemoError> {
        for _ in 0..FLASHLIGHT_STEPS {
            let color = flashlight_color(self.imu.orientation().await?);
            self.display.fill(color)?;
            sleep(FLASHLIGHT_DELAY).await;
        }
        Ok(())
    }

    /// Scrolls the temperature twice when the board is being shaken.
    pub async fn check_shake(&mut self) -> Result<bool, DemoError> {
        if !self.imu.acceleration().await?.exceeds(SHAKE_THRESHOLD) {
            return Ok(false);
        }

        let text = temperature_message(self.sensor.temperature_from_humidity().await?);
        for _ in 0..2 {
            self.scroll(&text, Rgb::GREY).await?;
        }
        Ok(true)
    }

    async fn scroll(&mut self, text: &str, color: Rgb) -> Result<(), DemoError> {
        self.display
            .show_message(text, color, Rgb::OFF, DEMO_SCROLL_SPEED)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        display::{scroll_frames, tests::RecordingMatrix},
        sensehat::Vector3,
    };

    struct FixedSensor;

    impl EnvironmentSensor for FixedSensor {
        async fn temperature_from_humidity(&self) -> Result<f64, HardwareError> {
            Ok(23.46)
        }

        async fn temperature_from_pressure(&self) -> Result<f64, HardwareError> {
            Ok(23.1)
        }

        async fn humidity(&self) -> Result<f64, HardwareError> {
            Ok(41.26)
        }

        async fn pressure(&self) -> Result<f64, HardwareError> {
            Ok(1009.5)
        }
    }

    struct FakeImu {
        acceleration: Mutex<Vector3>,
    }

    impl FakeImu {
        fn at_rest() -> Self {
            Self {
                acceleration: Mutex::new(Vector3 {
                    x: 0.0,
                    y: 0.0,
                    z: 1.0,
                }),
            }
        }
    }

    impl MotionSensor for FakeImu {
        async fn acceleration(&self) -> Result<Vector3, HardwareError> {
            Ok(*self.acceleration.lock().unwrap())
        }

        async fn orientation(&self) -> Result<Orientation, HardwareError> {
            Ok(Orientation {
                pitch: 142.0,
                roll: 284.0,
                yaw: 359.9,
            })
        }
    }

    fn demo(matrix: &RecordingMatrix) -> Demo<RecordingMatrix, FixedSensor, FakeImu, StdRng> {
        Demo::new(
            Display::new(matrix.clone()),
            FixedSensor,
            FakeImu::at_rest(),
            StdRng::seed_from_u64(7),
        )
    }

    #[test]
    fn formats_messages() {
        assert_eq!(humidity_message(41.26), "Humidity: 41.3%");
        assert_eq!(pressure_message(1009.5), "Pressure: 1009.50 Millibar");
        assert_eq!(temperature_message(23.0), "23.0 Celsius");
    }

    #[test]
    fn orientation_maps_to_color() {
        let color = flashlight_color(Orientation {
            pitch: 142.0,
            roll: 284.0,
            yaw: 359.9,
        });

        assert_eq!(color, Rgb::new(100, 200, 253));
    }

    #[tokio::test(start_paused = true)]
    async fn up_scrolls_humidity() {
        let matrix = RecordingMatrix::default();
        let mut demo = demo(&matrix);

        demo.handle(Direction::Up).await.unwrap();

        let expected = scroll_frames("Humidity: 41.3%", Rgb::GREY, Rgb::OFF);
        assert_eq!(matrix.count(), expected.len());
        assert_eq!(matrix.frames.lock().unwrap()[..], expected[..]);
    }

    #[tokio::test(start_paused = true)]
    async fn down_sets_random_pixels() {
        let matrix = RecordingMatrix::default();
        let mut demo = demo(&matrix);

        demo.handle(Direction::Down).await.unwrap();

        assert_eq!(matrix.count(), DISCO_PIXELS);
        assert!(demo.display().pixels().iter().any(|p| *p != Rgb::OFF));
    }

    #[tokio::test(start_paused = true)]
    async fn right_fills_with_orientation_color() {
        let matrix = RecordingMatrix::default();
        let mut demo = demo(&matrix);

        demo.handle(Direction::Right).await.unwrap();

        assert_eq!(matrix.count(), FLASHLIGHT_STEPS);
        assert!(
            demo.display()
                .pixels()
                .iter()
                .all(|p| *p == Rgb::new(100, 200, 253))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shake_scrolls_temperature_twice() {
        let matrix = RecordingMatrix::default();
        let mut demo = demo(&matrix);

        assert!(!demo.check_shake().await.unwrap());
        assert_eq!(matrix.count(), 0);

        *demo.imu.acceleration.lock().unwrap() = Vector3 {
            x: 0.3,
            y: -2.4,
            z: 1.0,
        };
        assert!(demo.check_shake().await.unwrap());

        let frames = scroll_frames("23.5 Celsius", Rgb::GREY, Rgb::OFF).len();
        assert_eq!(matrix.count(), 2 * frames);
    }
}
