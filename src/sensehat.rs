mod cpu;
mod environment;
mod iio;
mod imu;

use std::{io, path::PathBuf, process::ExitStatus};

pub use cpu::*;
pub use environment::*;
pub use iio::*;
pub use imu::*;

#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    #[error("failed to access {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unexpected value in {path:?}: {value:?}")]
    Parse { path: PathBuf, value: String },

    #[error("device not found: {0}")]
    NotFound(String),

    #[error("failed to run `{command}`")]
    Command {
        command: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` exited with {status}")]
    CommandStatus {
        command: &'static str,
        status: ExitStatus,
    },

    #[error("unexpected output from `{command}`: {output:?}")]
    CommandOutput {
        command: &'static str,
        output: String,
    },
}

impl HardwareError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| HardwareError::Io { path, source }
    }
}

/// Fake sysfs trees for driver tests.
#[cfg(test)]
pub(crate) mod fake_sysfs {
    use std::{
        fs,
        path::{Path, PathBuf},
    };

    pub(crate) fn root(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("sensehat-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();
        root
    }

    pub(crate) fn write(dir: &Path, attrs: &[(&str, &str)]) {
        fs::create_dir_all(dir).unwrap();
        for (attr, value) in attrs {
            fs::write(dir.join(attr), format!("{value}\n")).unwrap();
        }
    }
}
