use std::{future::Future, time::Duration};

use embedded_hal::digital::{InputPin, OutputPin};
use tokio::time::{MissedTickBehavior, interval};

use crate::{
    display::{DEFAULT_SCROLL_SPEED, Display, DisplayError, LedMatrix, Rgb},
    gpio::PinError,
};

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionState {
    #[default]
    Idle,
    Motion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Started { count: u64 },
    Stopped,
}

/// Two-state detector fed with one input level per tick.
#[derive(Debug, Default)]
pub struct MotionDetector {
    state: MotionState,
    count: u64,
}

impl MotionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sample(&mut self, high: bool) -> Option<Transition> {
        match (self.state, high) {
            (MotionState::Idle, true) => {
                self.state = MotionState::Motion;
                self.count += 1;
                Some(Transition::Started { count: self.count })
            }
            (MotionState::Motion, false) => {
                self.state = MotionState::Idle;
                Some(Transition::Stopped)
            }
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MotionError {
    #[error(transparent)]
    Pin(#[from] PinError),

    #[error(transparent)]
    Display(#[from] DisplayError),
}

/// Samples the sensor pin, drives the output pin and shows the motion count.
/// The output is driven low and the display cleared when dropped.
pub struct MotionMonitor<I, O, M>
where
    I: InputPin,
    O: OutputPin,
    M: LedMatrix,
{
    input: I,
    output: O,
    display: Display<M>,
    detector: MotionDetector,
    color: Rgb,
}

impl<I, O, M> MotionMonitor<I, O, M>
where
    I: InputPin,
    O: OutputPin,
    M: LedMatrix,
{
    pub fn new(input: I, output: O, display: Display<M>, color: Rgb) -> Self {
        Self {
            input,
            output,
            display,
            detector: MotionDetector::new(),
            color,
        }
    }

    pub fn detector(&self) -> &MotionDetector {
        &self.detector
    }

    pub fn display(&self) -> &Display<M> {
        &self.display
    }

    pub async fn tick(&mut self) -> Result<Option<Transition>, MotionError> {
        let high = self.input.is_high().map_err(PinError::from_debug)?;
        let transition = self.detector.sample(high);

        match transition {
            Some(Transition::Started { count }) => {
                tracing::info!(count, "motion detected");
                self.output.set_high().map_err(PinError::from_debug)?;
                self.show_count(count).await?;
            }
            Some(Transition::Stopped) => {
                tracing::info!("motion stopped");
                self.output.set_low().map_err(PinError::from_debug)?;
            }
            None => {}
        }

        Ok(transition)
    }

    /// Ticks every `period` until `shutdown` resolves.
    pub async fn run(
        &mut self,
        period: Duration,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), MotionError> {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await?;
                }
                _ = &mut shutdown => return Ok(()),
            }
        }
    }

    async fn show_count(&mut self, count: u64) -> Result<(), DisplayError> {
        let text = count.to_string();
        let mut chars = text.chars();

        match (chars.next(), chars.next()) {
            (Some(digit), None) => self.display.show_letter(digit, self.color, Rgb::OFF),
            _ => {
                self.display
                    .show_message(&text, self.color, Rgb::OFF, DEFAULT_SCROLL_SPEED)
                    .await
            }
        }
    }
}

impl<I, O, M> Drop for MotionMonitor<I, O, M>
where
    I: InputPin,
    O: OutputPin,
    M: LedMatrix,
{
    fn drop(&mut self) {
        if let Err(e) = self.output.set_low() {
            tracing::warn!("failed to drive output pin low: {e:?}");
        }
    }
}
