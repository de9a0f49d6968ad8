mod color;
mod font;
mod framebuffer;

use std::time::Duration;

use tokio::time::sleep;

use crate::sensehat::HardwareError;

pub use color::*;
pub use font::*;
pub use framebuffer::*;

pub const MATRIX_SIZE: usize = 8;

pub const DEFAULT_SCROLL_SPEED: Duration = Duration::from_millis(100);

/// Row-major pixels, `(0, 0)` top left.
pub type Frame = [Rgb; MATRIX_SIZE * MATRIX_SIZE];

pub trait LedMatrix {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), HardwareError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("pixel ({x}, {y}) is outside the 8x8 matrix")]
    OutOfRange { x: usize, y: usize },

    #[error(transparent)]
    Hardware(#[from] HardwareError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn from_degrees(degrees: u16) -> Option<Self> {
        match degrees {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    /// Physical index of logical pixel `(x, y)`, rotating clockwise.
    fn index(self, x: usize, y: usize) -> usize {
        let last = MATRIX_SIZE - 1;
        let (px, py) = match self {
            Rotation::Deg0 => (x, y),
            Rotation::Deg90 => (last - y, x),
            Rotation::Deg180 => (last - x, last - y),
            Rotation::Deg270 => (y, last - x),
        };
        py * MATRIX_SIZE + px
    }
}

/// Keeps the logical frame and pushes it to the matrix on every change.
/// The matrix is cleared when the display is dropped.
pub struct Display<M: LedMatrix> {
    matrix: M,
    frame: Frame,
    rotation: Rotation,
}

impl<M: LedMatrix> Display<M> {
    pub fn new(matrix: M) -> Self {
        Self {
            matrix,
            frame: [Rgb::OFF; MATRIX_SIZE * MATRIX_SIZE],
            rotation: Rotation::default(),
        }
    }

    pub fn matrix(&self) -> &M {
        &self.matrix
    }

    pub fn pixels(&self) -> Frame {
        self.frame
    }

    pub fn pixel(&self, x: usize, y: usize) -> Result<Rgb, DisplayError> {
        check_range(x, y)?;
        Ok(self.frame[y * MATRIX_SIZE + x])
    }

    pub fn set_rotation(&mut self, rotation: Rotation) -> Result<(), DisplayError> {
        self.rotation = rotation;
        self.flush()
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, color: Rgb) -> Result<(), DisplayError> {
        check_range(x, y)?;
        self.frame[y * MATRIX_SIZE + x] = color;
        self.flush()
    }

    pub fn set_pixels(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        self.frame = *frame;
        self.flush()
    }

    pub fn fill(&mut self, color: Rgb) -> Result<(), DisplayError> {
        self.set_pixels(&[color; MATRIX_SIZE * MATRIX_SIZE])
    }

    pub fn clear(&mut self) -> Result<(), DisplayError> {
        self.fill(Rgb::OFF)
    }

    pub fn show_letter(
        &mut self,
        c: char,
        foreground: Rgb,
        background: Rgb,
    ) -> Result<(), DisplayError> {
        self.set_pixels(&render_glyph(c, foreground, background))
    }

    pub async fn show_message(
        &mut self,
        text: &str,
        foreground: Rgb,
        background: Rgb,
        scroll_speed: Duration,
    ) -> Result<(), DisplayError> {
        for frame in scroll_frames(text, foreground, background) {
            self.set_pixels(&frame)?;
            sleep(scroll_speed).await;
        }

        Ok(())
    }

    fn flush(&mut self) -> Result<(), DisplayError> {
        let mut physical = [Rgb::OFF; MATRIX_SIZE * MATRIX_SIZE];
        for y in 0..MATRIX_SIZE {
            for x in 0..MATRIX_SIZE {
                physical[self.rotation.index(x, y)] = self.frame[y * MATRIX_SIZE + x];
            }
        }

        self.matrix.write_frame(&physical)?;
        Ok(())
    }
}

impl<M: LedMatrix> Drop for Display<M> {
    fn drop(&mut self) {
        if let Err(e) = self
            .matrix
            .write_frame(&[Rgb::OFF; MATRIX_SIZE * MATRIX_SIZE])
        {
            tracing::warn!("failed to clear LED matrix: {:#}", anyhow::Error::from(e));
        }
    }
}

fn check_range(x: usize, y: usize) -> Result<(), DisplayError> {
    if x >= MATRIX_SIZE || y >= MATRIX_SIZE {
        return Err(DisplayError::OutOfRange { x, y });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use super::*;

    /// Records every frame written; clones share the recording.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct RecordingMatrix {
        pub(crate) frames: Arc<Mutex<Vec<Frame>>>,
    }

    impl RecordingMatrix {
        pub(crate) fn last(&self) -> Option<Frame> {
            self.frames.lock().unwrap().last().copied()
        }

        pub(crate) fn count(&self) -> usize {
            self.frames.lock().unwrap().len()
        }
    }

    impl LedMatrix for RecordingMatrix {
        fn write_frame(&mut self, frame: &Frame) -> Result<(), HardwareError> {
            self.frames.lock().unwrap().push(*frame);
            Ok(())
        }
    }

    #[test]
    fn set_pixel_and_read_back() {
        let recording = RecordingMatrix::default();
        let mut display = Display::new(recording.clone());

        display.set_pixel(2, 5, Rgb::RED).unwrap();

        assert_eq!(display.pixel(2, 5).unwrap(), Rgb::RED);
        assert_eq!(recording.last().unwrap()[5 * 8 + 2], Rgb::RED);
        assert!(matches!(
            display.set_pixel(8, 0, Rgb::RED),
            Err(DisplayError::OutOfRange { x: 8, y: 0 })
        ));
    }

    #[test]
    fn rotation_maps_pixels() {
        let recording = RecordingMatrix::default();
        let mut display = Display::new(recording.clone());

        display.set_pixel(0, 0, Rgb::GREEN).unwrap();
        display.set_rotation(Rotation::Deg180).unwrap();
        assert_eq!(recording.last().unwrap()[63], Rgb::GREEN);

        display.set_rotation(Rotation::Deg90).unwrap();
        assert_eq!(recording.last().unwrap()[7], Rgb::GREEN);

        // Logical view is unaffected.
        assert_eq!(display.pixels()[0], Rgb::GREEN);
        assert_eq!(Rotation::from_degrees(45), None);
    }

    #[test]
    fn clears_on_drop() {
        let recording = RecordingMatrix::default();
        {
            let mut display = Display::new(recording.clone());
            display.fill(Rgb::WHITE).unwrap();
        }

        assert!(recording.last().unwrap().iter().all(|p| *p == Rgb::OFF));
    }

    #[tokio::test(start_paused = true)]
    async fn scrolls_message() {
        let recording = RecordingMatrix::default();
        let mut display = Display::new(recording.clone());

        display
            .show_message("7", Rgb::WHITE, Rgb::OFF, Duration::from_millis(50))
            .await
            .unwrap();

        assert_eq!(recording.count(), scroll_frames("7", Rgb::WHITE, Rgb::OFF).len());
        assert!(display.pixels().iter().all(|p| *p == Rgb::OFF));
    }
}
