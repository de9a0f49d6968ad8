use std::{
    fs,
    path::{Path, PathBuf},
};

use tokio::{fs::File, io::AsyncReadExt as _};

use crate::sensehat::HardwareError;

const JOYSTICK_NAME: &str = "Raspberry Pi Sense HAT Joystick";
const INPUT_CLASS: &str = "/sys/class/input";
const INPUT_DEV_ROOT: &str = "/dev/input";

// Ref: linux/input-event-codes.h
const EV_KEY: u16 = 0x01;
const KEY_ENTER: u16 = 28;
const KEY_UP: u16 = 103;
const KEY_LEFT: u16 = 105;
const KEY_RIGHT: u16 = 106;
const KEY_DOWN: u16 = 108;

// struct input_event { struct timeval time; __u16 type; __u16 code; __s32 value; }
#[cfg(target_pointer_width = "64")]
const TIMEVAL_SIZE: usize = 16;
#[cfg(not(target_pointer_width = "64"))]
const TIMEVAL_SIZE: usize = 8;

pub const EVENT_SIZE: usize = TIMEVAL_SIZE + 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Released,
    Pressed,
    Held,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoystickEvent {
    pub direction: Direction,

    pub action: Action,
}

/// Decodes one raw `input_event`; anything that is not a joystick key is `None`.
pub fn decode_event(buf: &[u8; EVENT_SIZE]) -> Option<JoystickEvent> {
    let kind = u16::from_ne_bytes([buf[TIMEVAL_SIZE], buf[TIMEVAL_SIZE + 1]]);
    let code = u16::from_ne_bytes([buf[TIMEVAL_SIZE + 2], buf[TIMEVAL_SIZE + 3]]);
    let value = i32::from_ne_bytes([
        buf[TIMEVAL_SIZE + 4],
        buf[TIMEVAL_SIZE + 5],
        buf[TIMEVAL_SIZE + 6],
        buf[TIMEVAL_SIZE + 7],
    ]);

    if kind != EV_KEY {
        return None;
    }

    let direction = match code {
        KEY_UP => Direction::Up,
        KEY_DOWN => Direction::Down,
        KEY_LEFT => Direction::Left,
        KEY_RIGHT => Direction::Right,
        KEY_ENTER => Direction::Middle,
        _ => return None,
    };
    let action = match value {
        0 => Action::Released,
        1 => Action::Pressed,
        2 => Action::Held,
        _ => return None,
    };

    Some(JoystickEvent { direction, action })
}

#[derive(Debug)]
pub struct Joystick {
    file: File,
    path: PathBuf,
}

impl Joystick {
    pub async fn open() -> Result<Self, HardwareError> {
        Self::open_at(Path::new(INPUT_CLASS), Path::new(INPUT_DEV_ROOT)).await
    }

    pub async fn open_at(input_class: &Path, dev_root: &Path) -> Result<Self, HardwareError> {
        let path = find_device(input_class, dev_root)?;
        let file = File::open(&path).await.map_err(HardwareError::io(&path))?;

        tracing::debug!(path = %path.display(), "opened joystick");
        Ok(Self { file, path })
    }

    /// Waits for the next joystick key event.
    pub async fn next_event(&mut self) -> Result<JoystickEvent, HardwareError> {
        let mut buf = [0u8; EVENT_SIZE];
        loop {
            self.file
                .read_exact(&mut buf)
                .await
                .map_err(HardwareError::io(&self.path))?;

            if let Some(event) = decode_event(&buf) {
                return Ok(event);
            }
        }
    }
}

fn find_device(input_class: &Path, dev_root: &Path) -> Result<PathBuf, HardwareError> {
    let entries = fs::read_dir(input_class).map_err(HardwareError::io(input_class))?;

    for entry in entries {
        let entry = entry.map_err(HardwareError::io(input_class))?;
        let file_name = entry.file_name();
        if !file_name.to_string_lossy().starts_with("event") {
            continue;
        }

        let Ok(name) = fs::read_to_string(entry.path().join("device").join("name")) else {
            continue;
        };
        if name.trim() == JOYSTICK_NAME {
            return Ok(dev_root.join(file_name));
        }
    }

    Err(HardwareError::NotFound(format!(
        "input device {JOYSTICK_NAME:?} under {input_class:?}"
    )))
}
