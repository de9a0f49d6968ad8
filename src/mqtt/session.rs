use std::{fs, time::Duration};

use rumqttc::{
    AsyncClient, ConnectionError, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet, QoS,
    TlsConfiguration, Transport,
};
use tokio::{sync::mpsc, task::JoinHandle, time::sleep};

use super::OFFLINE;
use crate::{
    config::{ClientTls, Config, ConfigError},
    error::{Disposition, Error},
    retry::RetryPolicy,
};

const KEEP_ALIVE: Duration = Duration::from_secs(60);
const REQUEST_CAPACITY: usize = 10;
const EVENT_CAPACITY: usize = 32;

/// What the network loop reports to the coordinator.
#[derive(Debug)]
pub enum SessionEvent {
    Connected,
    Subscribed,
    Message { topic: String, payload: Vec<u8> },
    /// The connection dropped; the loop reconnects on its own after
    /// `retry_in`.
    Disconnected { error: Error, retry_in: Duration },
    /// The loop stopped and will not reconnect.
    Failed(Error),
}

pub fn mqtt_options(config: &Config) -> Result<MqttOptions, ConfigError> {
    let mut options = MqttOptions::new(&config.id, &config.broker.host, config.broker.port);
    options.set_keep_alive(KEEP_ALIVE);
    options.set_last_will(LastWill::new(
        config.availability_topic(),
        OFFLINE,
        QoS::AtLeastOnce,
        true,
    ));

    if !config.broker.username.is_empty() {
        options.set_credentials(&config.broker.username, &config.broker.password);
    }

    if let Some(tls) = &config.client
        && tls.enabled()
    {
        options.set_transport(Transport::tls_with_config(tls_configuration(tls)?));
    }

    Ok(options)
}

fn tls_configuration(tls: &ClientTls) -> Result<TlsConfiguration, ConfigError> {
    let read = |path: &str| {
        fs::read(path).map_err(|source| ConfigError::TlsFile {
            path: path.into(),
            source,
        })
    };

    Ok(TlsConfiguration::Simple {
        ca: read(&tls.ca_certs)?,
        alpn: None,
        client_auth: Some((read(&tls.certfile)?, read(&tls.keyfile)?)),
    })
}

/// A client handle plus the events of its network loop, which runs in a
/// spawned task.
pub struct Session {
    pub client: AsyncClient,

    pub events: mpsc::Receiver<SessionEvent>,

    pub task: JoinHandle<()>,
}

impl Session {
    pub fn start(options: MqttOptions) -> Self {
        Self::with_policy(options, RetryPolicy::reconnect())
    }

    /// Like [`Session::start`], reconnecting according to `policy`.
    pub fn with_policy(options: MqttOptions, policy: RetryPolicy) -> Self {
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let (tx, events) = mpsc::channel(EVENT_CAPACITY);
        let task = tokio::spawn(drive(eventloop, tx, policy));

        Self {
            client,
            events,
            task,
        }
    }

    /// Waits for the network loop to flush the final disconnect.
    pub async fn join(self, timeout: Duration) {
        drop(self.events);
        match tokio::time::timeout(timeout, self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("MQTT event loop task failed: {e}"),
            Err(_) => tracing::warn!(?timeout, "MQTT event loop did not stop in time"),
        }
    }
}

async fn drive(
    mut eventloop: EventLoop,
    events: mpsc::Sender<SessionEvent>,
    policy: RetryPolicy,
) {
    let mut backoff = policy.backoff();

    loop {
        let event = match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                tracing::info!(session_present = ack.session_present, "connected to broker");
                backoff.reset();
                SessionEvent::Connected
            }
            Ok(Event::Incoming(Packet::SubAck(_))) => SessionEvent::Subscribed,
            Ok(Event::Incoming(Packet::Publish(publish))) => SessionEvent::Message {
                topic: publish.topic,
                payload: publish.payload.to_vec(),
            },
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                tracing::debug!("disconnect sent, stopping event loop");
                return;
            }
            Ok(_) => continue,
            Err(ConnectionError::RequestsDone) => {
                tracing::debug!("all client handles dropped, stopping event loop");
                return;
            }
            Err(e) => {
                let error = Error::from(e);
                if error.disposition() != Disposition::Retry {
                    tracing::debug!(
                        error = &error as &dyn std::error::Error,
                        "MQTT connection failed permanently"
                    );
                    // Nothing left to do if the receiver is gone.
                    let _ = events.send(SessionEvent::Failed(error)).await;
                    return;
                }

                let retry_in = backoff.next_delay().unwrap_or(policy.max_delay);
                tracing::warn!(
                    ?retry_in,
                    failures = backoff.failures(),
                    error = &error as &dyn std::error::Error,
                    "MQTT connection lost, reconnecting"
                );
                let event = SessionEvent::Disconnected { error, retry_in };
                if events.send(event).await.is_err() {
                    return;
                }
                sleep(retry_in).await;
                continue;
            }
        };

        if events.send(event).await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use rumqttc::ConnectReturnCode;
    use tokio::{
        io::{AsyncReadExt as _, AsyncWriteExt as _},
        net::TcpListener,
        time::timeout,
    };

    use super::*;
    use crate::config::tests::SAMPLE;

    /// How the fake broker answers one incoming connection.
    #[derive(Debug, Clone, Copy)]
    enum Reply {
        Refuse(ConnectReturnCode),
        AcceptThenClose,
        AcceptAndHold,
    }

    fn return_code(code: ConnectReturnCode) -> u8 {
        match code {
            ConnectReturnCode::Success => 0,
            ConnectReturnCode::RefusedProtocolVersion => 1,
            ConnectReturnCode::BadClientId => 2,
            ConnectReturnCode::ServiceUnavailable => 3,
            ConnectReturnCode::BadUserNamePassword => 4,
            ConnectReturnCode::NotAuthorized => 5,
        }
    }

    /// Accepts one connection per reply, answering each CONNECT with a
    /// CONNACK. Returns the port it listens on.
    async fn fake_broker(replies: Vec<Reply>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            for reply in replies {
                let (mut stream, _) = listener.accept().await.unwrap();
                // CONNECT
                let _ = stream.read(&mut buf).await;

                let code = match reply {
                    Reply::Refuse(code) => return_code(code),
                    Reply::AcceptThenClose | Reply::AcceptAndHold => 0,
                };
                stream.write_all(&[0x20, 0x02, 0x00, code]).await.unwrap();

                if let Reply::AcceptAndHold = reply {
                    while matches!(stream.read(&mut buf).await, Ok(n) if n > 0) {}
                }
            }
        });

        port
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: None,
            initial_delay: Duration::from_millis(10),
            multiplier: 2,
            max_delay: Duration::from_millis(40),
        }
    }

    async fn next(session: &mut Session) -> Option<SessionEvent> {
        timeout(Duration::from_secs(5), session.events.recv())
            .await
            .unwrap()
    }

    fn expect_disconnected(event: Option<SessionEvent>) -> (Error, Duration) {
        match event {
            Some(SessionEvent::Disconnected { error, retry_in }) => (error, retry_in),
            other => panic!("expected a disconnect, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn refusal_by_configuration_stops_the_loop() {
        let port = fake_broker(vec![Reply::Refuse(ConnectReturnCode::BadUserNamePassword)]).await;
        let mut session =
            Session::with_policy(MqttOptions::new("sensehat-test", "127.0.0.1", port), fast_policy());

        match next(&mut session).await {
            Some(SessionEvent::Failed(error)) => {
                assert!(matches!(
                    error,
                    Error::Connection(ConnectionError::ConnectionRefused(
                        ConnectReturnCode::BadUserNamePassword
                    ))
                ));
                assert_eq!(error.disposition(), Disposition::Fatal);
            }
            other => panic!("expected a failure, got {other:?}"),
        }
        assert!(next(&mut session).await.is_none());
    }

    #[tokio::test]
    async fn transient_refusals_back_off_and_reset_on_connect() {
        let unavailable = Reply::Refuse(ConnectReturnCode::ServiceUnavailable);
        let port = fake_broker(vec![
            unavailable,
            unavailable,
            unavailable,
            Reply::AcceptThenClose,
            Reply::AcceptAndHold,
        ])
        .await;
        let mut session =
            Session::with_policy(MqttOptions::new("sensehat-test", "127.0.0.1", port), fast_policy());

        let mut delays = Vec::new();
        for _ in 0..3 {
            let (error, retry_in) = expect_disconnected(next(&mut session).await);
            assert!(matches!(
                error,
                Error::Connection(ConnectionError::ConnectionRefused(
                    ConnectReturnCode::ServiceUnavailable
                ))
            ));
            assert_eq!(error.disposition(), Disposition::Retry);
            delays.push(retry_in.as_millis());
        }
        assert_eq!(delays, [10, 20, 40]);

        assert!(matches!(next(&mut session).await, Some(SessionEvent::Connected)));

        // The broker hung up; the backoff starts over.
        let (_, retry_in) = expect_disconnected(next(&mut session).await);
        assert_eq!(retry_in, Duration::from_millis(10));

        assert!(matches!(next(&mut session).await, Some(SessionEvent::Connected)));

        session.client.disconnect().await.unwrap();
        assert!(next(&mut session).await.is_none());
        timeout(Duration::from_secs(5), session.task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn dropping_the_client_stops_the_loop() {
        let port = fake_broker(vec![Reply::AcceptAndHold]).await;
        let mut session = Session::start(MqttOptions::new("sensehat-test", "127.0.0.1", port));

        assert!(matches!(next(&mut session).await, Some(SessionEvent::Connected)));

        let Session {
            client,
            mut events,
            task,
        } = session;
        drop(client);

        let closed = timeout(Duration::from_secs(5), events.recv()).await.unwrap();
        assert!(closed.is_none());
        timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    }

    #[test]
    fn options_carry_last_will_and_keep_alive() {
        let config = Config::parse(SAMPLE).unwrap();
        let options = mqtt_options(&config).unwrap();

        let will = options.last_will().unwrap();
        assert_eq!(will.topic, "sensehat/availability");
        assert_eq!(&will.message[..], b"offline");
        assert!(will.retain);
        assert_eq!(options.keep_alive(), KEEP_ALIVE);
        assert_eq!(options.client_id(), "sensehat");
        assert_eq!(options.broker_address(), ("192.168.1.101".to_string(), 1883));
        assert_eq!(options.credentials(), None);
    }

    #[test]
    fn credentials_only_with_username() {
        let config = Config::parse(&SAMPLE.replace(
            r#""username": """#,
            r#""username": "hass""#,
        ))
        .unwrap();
        let options = mqtt_options(&config).unwrap();

        assert_eq!(
            options.credentials(),
            Some(("hass".to_string(), String::new()))
        );
    }

    #[test]
    fn missing_tls_files_are_configuration_errors() {
        let mut config = Config::parse(SAMPLE).unwrap();
        config.client = Some(ClientTls {
            certfile: "/nonexistent/client.crt".into(),
            keyfile: "/nonexistent/client.key".into(),
            keyfile_password: String::new(),
            ca_certs: "/nonexistent/ca.crt".into(),
        });

        assert!(matches!(
            mqtt_options(&config),
            Err(ConfigError::TlsFile { .. })
        ));
    }
}
