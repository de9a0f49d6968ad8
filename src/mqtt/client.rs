use std::future::Future;

use rumqttc::{AsyncClient, ClientError, QoS};

use crate::{
    error::Error,
    retry::{RetryPolicy, retry},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub topic: String,

    pub payload: Vec<u8>,

    pub qos: QoS,

    pub retain: bool,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtMostOnce,
            retain: false,
        }
    }

    pub fn retained(mut self) -> Self {
        self.retain = true;
        self
    }

    pub fn with_qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }

    pub fn payload_str(&self) -> &str {
        std::str::from_utf8(&self.payload).unwrap_or("<binary>")
    }
}

/// The slice of an MQTT client the coordinator needs.
pub trait MqttClient {
    type Error: std::error::Error + Send + Sync + 'static;

    fn publish(&self, message: &Message) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn subscribe(&self, topic: &str, qos: QoS)
    -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn disconnect(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

impl MqttClient for AsyncClient {
    type Error = ClientError;

    /// Fails instead of waiting when the request queue is full, so a stalled
    /// connection surfaces as a publish error.
    async fn publish(&self, message: &Message) -> Result<(), ClientError> {
        self.try_publish(
            message.topic.as_str(),
            message.qos,
            message.retain,
            message.payload.clone(),
        )
    }

    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), ClientError> {
        AsyncClient::subscribe(self, topic, qos).await
    }

    async fn disconnect(&self) -> Result<(), ClientError> {
        AsyncClient::disconnect(self).await
    }
}

pub async fn publish_with_retry<C: MqttClient>(
    client: &C,
    message: &Message,
    policy: &RetryPolicy,
) -> Result<(), Error> {
    retry(policy, |_| client.publish(message))
        .await
        .map_err(|e| Error::Publish {
            topic: message.topic.clone(),
            attempts: e.attempts,
            source: Box::new(e.last),
        })?;

    tracing::debug!(
        topic = %message.topic,
        retain = message.retain,
        "published {}",
        message.payload_str()
    );
    Ok(())
}
