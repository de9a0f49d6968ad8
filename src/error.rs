use rumqttc::{ConnectReturnCode, ConnectionError};

use crate::{config::ConfigError, sensehat::HardwareError};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What the caller should do with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Stop the program with a non-zero exit code.
    Fatal,
    /// Wait with backoff and reconnect.
    Retry,
    /// Log, abandon the current cycle, carry on with the next one.
    Skip,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("MQTT connection failed")]
    Connection(#[from] ConnectionError),

    #[error("failed to publish to {topic} after {attempts} attempts")]
    Publish {
        topic: String,
        attempts: u32,
        #[source]
        source: BoxError,
    },

    #[error("failed to subscribe to {topic}")]
    Subscribe {
        topic: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Hardware(#[from] HardwareError),

    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl Error {
    pub fn disposition(&self) -> Disposition {
        match self {
            Error::Configuration(_) | Error::Unknown(_) => Disposition::Fatal,
            Error::Connection(e) if is_refused_by_configuration(e) => Disposition::Fatal,
            Error::Connection(_) => Disposition::Retry,
            Error::Publish { .. } | Error::Subscribe { .. } | Error::Hardware(_) => {
                Disposition::Skip
            }
        }
    }
}

/// Refusals that no amount of reconnecting will fix.
fn is_refused_by_configuration(e: &ConnectionError) -> bool {
    matches!(
        e,
        ConnectionError::ConnectionRefused(
            ConnectReturnCode::BadUserNamePassword
                | ConnectReturnCode::NotAuthorized
                | ConnectReturnCode::BadClientId
                | ConnectReturnCode::RefusedProtocolVersion
        )
    )
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn classifies_errors() {
        assert_eq!(
            Error::from(ConfigError::MissingField("id")).disposition(),
            Disposition::Fatal
        );
        assert_eq!(
            Error::from(anyhow::anyhow!("boom")).disposition(),
            Disposition::Fatal
        );
        assert_eq!(
            Error::from(HardwareError::NotFound("hts221".into())).disposition(),
            Disposition::Skip
        );
        assert_eq!(
            Error::Publish {
                topic: "a/state".into(),
                attempts: 5,
                source: "queue full".into(),
            }
            .disposition(),
            Disposition::Skip
        );
    }

    #[test]
    fn renders_source_chain() {
        let error = Error::Publish {
            topic: "a/state".into(),
            attempts: 5,
            source: "queue full".into(),
        };

        assert_eq!(
            format!("{:#}", anyhow::Error::from(error)),
            "failed to publish to a/state after 5 attempts: queue full"
        );
    }

    #[test]
    fn classifies_connection_errors() {
        let reset = ConnectionError::Io(io::Error::from(io::ErrorKind::ConnectionReset));
        assert_eq!(Error::from(reset).disposition(), Disposition::Retry);

        let unavailable = ConnectionError::ConnectionRefused(ConnectReturnCode::ServiceUnavailable);
        assert_eq!(Error::from(unavailable).disposition(), Disposition::Retry);

        let denied = ConnectionError::ConnectionRefused(ConnectReturnCode::BadUserNamePassword);
        assert_eq!(Error::from(denied).disposition(), Disposition::Fatal);
    }
}
