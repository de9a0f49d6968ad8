use std::{future::Future, time::Duration};

use chrono::Utc;
use chrono_tz::Tz;
use rumqttc::QoS;
use tokio::time::{MissedTickBehavior, interval};

use super::{
    HOME_ASSISTANT_STATUS_TOPIC, Message, MqttClient, OFFLINE, ONLINE, SessionEvent,
    publish_with_retry,
};
use crate::{
    config::Config,
    discovery::{announcements, device_summary},
    error::{Disposition, Error},
    metrics::{Aggregator, Reading},
    retry::RetryPolicy,
    sensehat::{CpuThermometer, EnvironmentSensor},
};

/// Reactions to what happens on the MQTT session.
pub trait SessionHandler {
    fn on_connect(&mut self) -> impl Future<Output = Result<(), Error>>;

    fn on_subscribe(&mut self) -> impl Future<Output = Result<(), Error>>;

    fn on_message(&mut self, topic: &str, payload: &[u8])
    -> impl Future<Output = Result<(), Error>>;
}

/// Owns the client, the sensors and the session flags. Every publish goes
/// through here, so connection callbacks never race the poll loop.
pub struct Coordinator<C, S, T> {
    config: Config,
    client: C,
    sensor: S,
    cpu: T,
    aggregator: Aggregator,
    timezone: Tz,
    policy: RetryPolicy,
    connected: bool,
    announced: bool,
    subscribed: bool,
}

impl<C, S, T> Coordinator<C, S, T>
where
    C: MqttClient,
    S: EnvironmentSensor,
    T: CpuThermometer,
{
    pub fn new(config: Config, client: C, sensor: S, cpu: T, timezone: Tz) -> Self {
        Self {
            config,
            client,
            sensor,
            cpu,
            aggregator: Aggregator::default(),
            timezone,
            policy: RetryPolicy::publish(),
            connected: false,
            announced: false,
            subscribed: false,
        }
    }

    pub fn with_aggregator(mut self, aggregator: Aggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_announced(&self) -> bool {
        self.announced
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Publishes every discovery document and the device summary, retained.
    pub async fn announce(&mut self) -> Result<(), Error> {
        self.announced = false;

        for announcement in announcements(&self.config) {
            let payload = serde_json::to_vec(&announcement.message)
                .map_err(|e| anyhow::Error::new(e).context("failed to encode discovery"))?;
            self.publish(Message::new(announcement.topic, payload).retained())
                .await?;
        }

        let summary = serde_json::to_vec(&device_summary(&self.config))
            .map_err(|e| anyhow::Error::new(e).context("failed to encode device summary"))?;
        self.publish(Message::new(self.config.device_config_topic(), summary).retained())
            .await?;

        tracing::info!("published discovery configuration");
        self.announced = true;
        Ok(())
    }

    /// Reads the sensors and publishes the aggregate and every state topic.
    /// Returns `None` without touching the sensors while disconnected.
    pub async fn poll(&mut self) -> Result<Option<Reading>, Error> {
        if !self.connected {
            tracing::debug!("not connected, skipping cycle");
            return Ok(None);
        }
        if !self.announced {
            self.announce().await?;
        }
        if !self.subscribed {
            self.subscribe().await?;
        }

        let now = Utc::now().with_timezone(&self.timezone).fixed_offset();
        let reading = self.aggregator.read(&self.sensor, &self.cpu, now).await?;
        let json = reading
            .to_json()
            .map_err(|e| anyhow::Error::new(e).context("failed to encode reading"))?;
        tracing::info!(reading = %json, "read sensors");

        self.publish(Message::new(self.config.topics.json.clone(), json))
            .await?;

        let states: Vec<_> = self
            .config
            .channels()
            .filter_map(|channel| Some((self.config.state_topic(channel)?, channel.state(&reading))))
            .collect();
        for (topic, state) in states {
            self.publish(Message::new(topic, state)).await?;
        }

        Ok(Some(reading))
    }

    pub async fn dispatch(&mut self, event: SessionEvent) -> Result<(), Error> {
        match event {
            SessionEvent::Connected => self.on_connect().await,
            SessionEvent::Subscribed => self.on_subscribe().await,
            SessionEvent::Message { topic, payload } => self.on_message(&topic, &payload).await,
            SessionEvent::Disconnected { error, retry_in } => {
                tracing::debug!(
                    ?retry_in,
                    error = &error as &dyn std::error::Error,
                    "session disconnected"
                );
                self.connected = false;
                self.announced = false;
                self.subscribed = false;
                Ok(())
            }
            SessionEvent::Failed(e) => {
                self.connected = false;
                Err(e)
            }
        }
    }

    /// Marks the device offline and closes the connection. Single attempt:
    /// the broker's last will covers a failure here.
    pub async fn shutdown(&mut self) {
        let offline = Message::new(self.config.availability_topic(), OFFLINE)
            .with_qos(QoS::AtLeastOnce)
            .retained();
        if let Err(e) = self.client.publish(&offline).await {
            tracing::warn!("failed to publish offline status: {e}");
        }
        if let Err(e) = self.client.disconnect().await {
            tracing::warn!("failed to disconnect: {e}");
        }
        self.connected = false;
    }

    /// Subscribes to the Home Assistant birth topic. Retried on the next
    /// poll when it fails.
    async fn subscribe(&mut self) -> Result<(), Error> {
        self.client
            .subscribe(HOME_ASSISTANT_STATUS_TOPIC, QoS::AtLeastOnce)
            .await
            .map_err(|e| Error::Subscribe {
                topic: HOME_ASSISTANT_STATUS_TOPIC.to_string(),
                source: Box::new(e),
            })?;
        self.subscribed = true;
        Ok(())
    }

    async fn publish(&self, message: Message) -> Result<(), Error> {
        publish_with_retry(&self.client, &message, &self.policy).await
    }
}

impl<C, S, T> SessionHandler for Coordinator<C, S, T>
where
    C: MqttClient,
    S: EnvironmentSensor,
    T: CpuThermometer,
{
    async fn on_connect(&mut self) -> Result<(), Error> {
        self.connected = true;
        self.subscribed = false;

        let online = Message::new(self.config.availability_topic(), ONLINE)
            .with_qos(QoS::AtLeastOnce)
            .retained();
        self.publish(online).await?;

        // A reconnect may have lost retained discovery on some brokers.
        self.announce().await?;
        self.subscribe().await
    }

    async fn on_subscribe(&mut self) -> Result<(), Error> {
        tracing::debug!(topic = HOME_ASSISTANT_STATUS_TOPIC, "subscribed");
        Ok(())
    }

    async fn on_message(&mut self, topic: &str, payload: &[u8]) -> Result<(), Error> {
        if topic == HOME_ASSISTANT_STATUS_TOPIC && payload == ONLINE.as_bytes() {
            tracing::info!("Home Assistant came online, republishing discovery");
            return self.announce().await;
        }

        tracing::debug!(topic, "ignoring message");
        Ok(())
    }
}

/// Drives the coordinator until `shutdown` resolves or a fatal error occurs.
/// Polls every `period`, immediately after each (re)connect as well.
pub async fn run<C, S, T>(
    coordinator: &mut Coordinator<C, S, T>,
    events: &mut tokio::sync::mpsc::Receiver<SessionEvent>,
    period: Duration,
    shutdown: impl Future<Output = ()>,
) -> Result<(), Error>
where
    C: MqttClient,
    S: EnvironmentSensor,
    T: CpuThermometer,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = coordinator.poll().await {
                    if let Err(e) = skip_or_stop(e) {
                        break Err(e);
                    }
                }
            }
            event = events.recv() => {
                let Some(event) = event else {
                    break Err(Error::from(anyhow::anyhow!(
                        "MQTT event loop stopped unexpectedly"
                    )));
                };
                let connected = matches!(event, SessionEvent::Connected);
                if let Err(e) = coordinator.dispatch(event).await {
                    if let Err(e) = skip_or_stop(e) {
                        break Err(e);
                    }
                }
                if connected {
                    ticker.reset_immediately();
                }
            }
            _ = &mut shutdown => {
                tracing::info!("shutting down");
                break Ok(());
            }
        }
    };

    coordinator.shutdown().await;
    result
}

fn skip_or_stop(error: Error) -> Result<(), Error> {
    match error.disposition() {
        Disposition::Skip => {
            tracing::warn!(error = &error as &dyn std::error::Error, "skipping cycle");
            Ok(())
        }
        Disposition::Retry => {
            tracing::warn!(error = &error as &dyn std::error::Error, "connection problem");
            Ok(())
        }
        Disposition::Fatal => {
            tracing::error!(error = &error as &dyn std::error::Error, "stopping");
            Err(error)
        }
    }
}
