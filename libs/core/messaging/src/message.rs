//! Message envelope and the per-attempt acknowledgment protocol.
//!
//! A [`Message`] carries an immutable identity (uuid, payload, metadata) and
//! the state of one delivery attempt. The attempt resolves exactly once,
//! either acked or nacked. Redelivery never reuses an attempt: [`Message::copy`]
//! produces a new envelope with fresh signals and a fresh context.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Header carrying the message uuid on header-capable transports.
pub const HEADER_UUID: &str = "UUID";
/// Header carrying the JSON-encoded metadata on header-capable transports.
pub const HEADER_METADATA: &str = "Metadata";

/// Ordered string-to-string metadata attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// State of a single delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckState {
    Pending,
    Acked,
    Nacked,
}

/// How a delivery attempt was resolved by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Acked,
    Nacked,
}

/// A message plus the state of its current delivery attempt.
///
/// Cloning shares the attempt: acking any clone acks all of them.
#[derive(Debug, Clone)]
pub struct Message {
    uuid: String,
    payload: Vec<u8>,
    metadata: Metadata,
    attempt: Arc<watch::Sender<AckState>>,
    ctx: CancellationToken,
}

impl Message {
    pub fn new(uuid: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self::with_metadata(uuid, payload, Metadata::new())
    }

    pub fn with_metadata(
        uuid: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        metadata: Metadata,
    ) -> Self {
        let (attempt, _) = watch::channel(AckState::Pending);
        Self {
            uuid: uuid.into(),
            payload: payload.into(),
            metadata,
            attempt: Arc::new(attempt),
            ctx: CancellationToken::new(),
        }
    }

    /// Create a message with a random v4 uuid.
    pub fn with_new_uuid(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(new_uuid(), payload)
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    /// Mark this attempt as successfully handled.
    ///
    /// Returns `false` only if the attempt was already nacked. Never blocks.
    pub fn ack(&self) -> bool {
        self.resolve(AckState::Acked)
    }

    /// Mark this attempt as failed so that a fresh copy is redelivered.
    ///
    /// Returns `false` only if the attempt was already acked. Never blocks.
    pub fn nack(&self) -> bool {
        self.resolve(AckState::Nacked)
    }

    fn resolve(&self, to: AckState) -> bool {
        let mut accepted = false;
        self.attempt.send_if_modified(|state| match *state {
            AckState::Pending => {
                *state = to;
                accepted = true;
                true
            }
            current => {
                accepted = current == to;
                false
            }
        });
        accepted
    }

    pub fn state(&self) -> AckState {
        *self.attempt.borrow()
    }

    pub fn is_acked(&self) -> bool {
        self.state() == AckState::Acked
    }

    pub fn is_nacked(&self) -> bool {
        self.state() == AckState::Nacked
    }

    /// Wait until the attempt is resolved either way.
    pub async fn outcome(&self) -> Outcome {
        let mut rx = self.attempt.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            match state {
                AckState::Acked => return Outcome::Acked,
                AckState::Nacked => return Outcome::Nacked,
                AckState::Pending => {}
            }
            // The sender lives as long as `self`, so this only fails if it never resolves.
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }

    /// Completes once the attempt is acked; never completes if it is nacked.
    pub async fn acked(&self) {
        if self.outcome().await == Outcome::Nacked {
            std::future::pending::<()>().await;
        }
    }

    /// Completes once the attempt is nacked; never completes if it is acked.
    pub async fn nacked(&self) {
        if self.outcome().await == Outcome::Acked {
            std::future::pending::<()>().await;
        }
    }

    /// A new attempt of the same logical message.
    pub fn copy(&self) -> Self {
        Self::with_metadata(self.uuid.clone(), self.payload.clone(), self.metadata.clone())
    }

    /// Cancellation scope of the current delivery attempt.
    pub fn context(&self) -> &CancellationToken {
        &self.ctx
    }

    pub fn set_context(&mut self, ctx: CancellationToken) {
        self.ctx = ctx;
    }
}

/// Generate a random message uuid.
pub fn new_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn message() -> Message {
        let metadata: Metadata = [("source", "test")].into_iter().collect();
        Message::with_metadata("uuid-1", b"payload".to_vec(), metadata)
    }

    #[test]
    fn test_ack_is_idempotent() {
        let msg = message();
        assert!(msg.ack());
        assert!(msg.ack());
        assert!(msg.is_acked());
        assert!(!msg.nack());
        assert!(msg.is_acked());
    }

    #[test]
    fn test_nack_is_idempotent() {
        let msg = message();
        assert!(msg.nack());
        assert!(msg.nack());
        assert!(!msg.ack());
        assert_eq!(msg.state(), AckState::Nacked);
    }

    #[test]
    fn test_clone_shares_attempt() {
        let msg = message();
        let clone = msg.clone();
        clone.ack();
        assert!(msg.is_acked());
    }

    #[test]
    fn test_copy_has_independent_signals() {
        let msg = message();
        msg.nack();

        let copy = msg.copy();
        assert_eq!(copy.uuid(), msg.uuid());
        assert_eq!(copy.payload(), msg.payload());
        assert_eq!(copy.metadata(), msg.metadata());
        assert_eq!(copy.state(), AckState::Pending);

        copy.ack();
        assert!(copy.is_acked());
        assert!(msg.is_nacked());
    }

    #[test]
    fn test_copy_has_fresh_context() {
        let msg = message();
        msg.context().cancel();
        let copy = msg.copy();
        assert!(!copy.context().is_cancelled());
    }

    #[tokio::test]
    async fn test_outcome_waits_for_ack() {
        let msg = message();
        let handle = msg.clone();
        let waiter = tokio::spawn(async move { handle.outcome().await });

        tokio::task::yield_now().await;
        msg.ack();

        let outcome = timeout(Duration::from_secs(1), waiter)
            .await
            .expect("outcome should resolve")
            .unwrap();
        assert_eq!(outcome, Outcome::Acked);
    }

    #[tokio::test]
    async fn test_outcome_after_resolution_returns_immediately() {
        let msg = message();
        msg.nack();
        let outcome = timeout(Duration::from_millis(100), msg.outcome())
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Nacked);
    }

    #[tokio::test]
    async fn test_acked_never_fires_after_nack() {
        let msg = message();
        msg.nack();
        assert!(timeout(Duration::from_millis(50), msg.acked()).await.is_err());
        assert!(timeout(Duration::from_millis(50), msg.nacked()).await.is_ok());
    }

    #[test]
    fn test_metadata_serializes_as_flat_object() {
        let mut metadata = Metadata::new();
        metadata.set("b", "2");
        metadata.set("a", "1");
        let json = serde_json::to_string(&metadata).unwrap();
        assert_eq!(json, r#"{"a":"1","b":"2"}"#);

        let parsed: Metadata = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, metadata);
        assert_eq!(parsed.get("a"), Some("1"));
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_new_uuid_is_unique() {
        let a = Message::with_new_uuid(Vec::new());
        let b = Message::with_new_uuid(Vec::new());
        assert_ne!(a.uuid(), b.uuid());
        assert_eq!(a.uuid().len(), 36);
    }
}
