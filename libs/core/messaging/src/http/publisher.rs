use super::MarshalMessage;
use crate::error::{ConfigError, PublishError};
use crate::message::Message;
use crate::metrics::PubSubMetrics;
use crate::pubsub::Publisher;
use async_trait::async_trait;
use reqwest::{Client, Response};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone, Default)]
pub struct HttpPublisherConfig {
    pub marshaler: Option<Arc<dyn MarshalMessage>>,

    pub client: Client,

    /// Skip logging the response body of 4xx/5xx responses
    pub do_not_log_response_body_on_server_error: bool,
}

impl HttpPublisherConfig {
    pub fn new(marshaler: Arc<dyn MarshalMessage>) -> Self {
        Self {
            marshaler: Some(marshaler),
            ..Default::default()
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn without_response_body_logging(mut self) -> Self {
        self.do_not_log_response_body_on_server_error = true;
        self
    }
}

impl fmt::Debug for HttpPublisherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpPublisherConfig")
            .field("marshaler", &self.marshaler.is_some())
            .field(
                "do_not_log_response_body_on_server_error",
                &self.do_not_log_response_body_on_server_error,
            )
            .finish()
    }
}

/// Publishes each message as one HTTP request. Status >= 400 is a failure.
pub struct HttpPublisher {
    marshaler: Arc<dyn MarshalMessage>,
    client: Client,
    log_error_body: bool,
    closed: AtomicBool,
}

impl HttpPublisher {
    pub fn new(config: HttpPublisherConfig) -> Result<Self, ConfigError> {
        let marshaler = config.marshaler.ok_or(ConfigError::MissingMarshaler)?;
        Ok(Self {
            marshaler,
            client: config.client,
            log_error_body: !config.do_not_log_response_body_on_server_error,
            closed: AtomicBool::new(false),
        })
    }

    async fn handle_response(&self, response: Response, msg: &Message) -> Result<(), PublishError> {
        let status = response.status();
        if status.as_u16() < 400 {
            return Ok(());
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(msg_uuid = %msg.uuid(), error = %e, "Could not read response body");
                String::new()
            }
        };

        if self.log_error_body {
            info!(
                msg_uuid = %msg.uuid(),
                http_status = status.as_u16(),
                response = %body,
                "Server responded with error"
            );
        }

        Err(PublishError::ErrorResponse {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn publish(&self, topic: &str, messages: Vec<Message>) -> Result<(), PublishError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PublishError::PublisherClosed);
        }

        let metrics = PubSubMetrics::new("http", topic);

        for msg in &messages {
            let request = self.marshaler.marshal(&self.client, topic, msg)?;
            let url = request.url().to_string();
            debug!(msg_uuid = %msg.uuid(), url = %url, "Publishing message");

            let response = match self.client.execute(request).await {
                Ok(response) => response,
                Err(e) => {
                    metrics.publish_failed();
                    return Err(PublishError::transport(e));
                }
            };

            if let Err(e) = self.handle_response(response, msg).await {
                metrics.publish_failed();
                return Err(e);
            }

            metrics.message_published();
            debug!(msg_uuid = %msg.uuid(), url = %url, "Message published");
        }

        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
