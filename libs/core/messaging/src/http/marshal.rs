use crate::error::PublishError;
use crate::message::{Message, HEADER_METADATA, HEADER_UUID};
use reqwest::{Client, Request};

/// Turns a message into an outbound request.
pub trait MarshalMessage: Send + Sync {
    fn marshal(&self, client: &Client, topic: &str, msg: &Message) -> Result<Request, PublishError>;
}

/// `POST {address}/{topic}` with the uuid and JSON metadata as headers and
/// the payload as body.
#[derive(Debug, Clone)]
pub struct DefaultMarshaler {
    address: String,
}

impl DefaultMarshaler {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    pub fn url_for(&self, topic: &str) -> String {
        format!("{}/{}", self.address.trim_end_matches('/'), topic)
    }
}

impl MarshalMessage for DefaultMarshaler {
    fn marshal(&self, client: &Client, topic: &str, msg: &Message) -> Result<Request, PublishError> {
        let marshal_error = |reason: String| PublishError::Marshal {
            uuid: msg.uuid().to_string(),
            reason,
        };

        let metadata =
            serde_json::to_string(msg.metadata()).map_err(|e| marshal_error(e.to_string()))?;

        client
            .post(self.url_for(topic))
            .header(HEADER_UUID, msg.uuid())
            .header(HEADER_METADATA, metadata)
            .body(msg.payload().to_vec())
            .build()
            .map_err(|e| marshal_error(e.to_string()))
    }
}
