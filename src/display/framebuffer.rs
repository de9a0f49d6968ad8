use std::{
    fs::{self, File, OpenOptions},
    io::{Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use crate::{
    display::{Frame, LedMatrix},
    sensehat::HardwareError,
};

const FRAMEBUFFER_NAME: &str = "RPi-Sense FB";
const GRAPHICS_CLASS: &str = "/sys/class/graphics";
const DEV_ROOT: &str = "/dev";

/// The LED matrix as exposed by the `rpisense-fb` kernel driver.
#[derive(Debug)]
pub struct SenseFramebuffer {
    file: File,
    path: PathBuf,
}

impl SenseFramebuffer {
    pub fn open() -> Result<Self, HardwareError> {
        Self::open_at(Path::new(GRAPHICS_CLASS), Path::new(DEV_ROOT))
    }

    pub fn open_at(graphics_class: &Path, dev_root: &Path) -> Result<Self, HardwareError> {
        let path = find_device(graphics_class, dev_root)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(HardwareError::io(&path))?;

        tracing::debug!(path = %path.display(), "opened LED matrix");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn find_device(graphics_class: &Path, dev_root: &Path) -> Result<PathBuf, HardwareError> {
    let entries = fs::read_dir(graphics_class).map_err(HardwareError::io(graphics_class))?;

    for entry in entries {
        let entry = entry.map_err(HardwareError::io(graphics_class))?;
        let Ok(name) = fs::read_to_string(entry.path().join("name")) else {
            continue;
        };

        if name.trim() == FRAMEBUFFER_NAME {
            return Ok(dev_root.join(entry.file_name()));
        }
    }

    Err(HardwareError::NotFound(format!(
        "framebuffer {FRAMEBUFFER_NAME:?} under {graphics_class:?}"
    )))
}

pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    frame
        .iter()
        .flat_map(|pixel| pixel.to_rgb565().to_le_bytes())
        .collect()
}

impl LedMatrix for SenseFramebuffer {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), HardwareError> {
        let bytes = encode_frame(frame);

        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.write_all(&bytes))
            .and_then(|_| self.file.flush())
            .map_err(HardwareError::io(&self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{display::Rgb, sensehat::fake_sysfs};

    #[test]
    fn writes_rgb565_little_endian() {
        let root = fake_sysfs::root("framebuffer");
        let class = root.join("class");
        let dev = root.join("dev");
        fake_sysfs::write(&class.join("fb0"), &[("name", "simple")]);
        fake_sysfs::write(&class.join("fb1"), &[("name", FRAMEBUFFER_NAME)]);
        fake_sysfs::write(&dev, &[("fb1", "")]);

        let mut fb = SenseFramebuffer::open_at(&class, &dev).unwrap();
        assert!(fb.path().ends_with("fb1"));

        let mut frame = [Rgb::OFF; 64];
        frame[0] = Rgb::new(255, 0, 0);
        frame[63] = Rgb::new(0, 0, 255);
        fb.write_frame(&frame).unwrap();

        let written = fs::read(dev.join("fb1")).unwrap();
        assert_eq!(written.len(), 128);
        assert_eq!(&written[0..2], &[0x00, 0xf8]);
        assert_eq!(&written[126..128], &[0x1f, 0x00]);
    }

    #[test]
    fn missing_framebuffer_is_not_found() {
        let root = fake_sysfs::root("framebuffer-missing");
        fake_sysfs::write(&root.join("fb0"), &[("name", "vc4drmfb")]);

        assert!(matches!(
            SenseFramebuffer::open_at(&root, &root),
            Err(HardwareError::NotFound(_))
        ));
    }
}
