//! Error types shared by every transport.

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Invalid configuration passed to a publisher or subscriber constructor.
///
/// Construction fails permanently; nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("poll interval must be a positive duration")]
    NonPositivePollInterval,

    #[error("resend interval must be a positive duration")]
    NonPositiveResendInterval,

    #[error("acker is nil")]
    MissingAcker,

    #[error("selecter is nil")]
    MissingSelecter,

    #[error("inserter is nil")]
    MissingInserter,

    #[error("marshaler is nil")]
    MissingMarshaler,
}

/// Error returned by [`Subscriber::subscribe`](crate::Subscriber::subscribe).
#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("subscriber is closed")]
    SubscriberClosed,

    #[error("failed to set up subscription: {0}")]
    Transport(#[source] BoxError),
}

#[cfg(feature = "nats")]
impl SubscribeError {
    pub(crate) fn transport(err: impl Into<BoxError>) -> Self {
        Self::Transport(err.into())
    }
}

/// Error returned by [`Publisher::publish`](crate::Publisher::publish).
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publisher is closed")]
    PublisherClosed,

    #[error("cannot marshal message {uuid}: {reason}")]
    Marshal { uuid: String, reason: String },

    #[error("server responded with error status {status}")]
    ErrorResponse { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
}

impl PublishError {
    pub(crate) fn transport(err: impl Into<BoxError>) -> Self {
        Self::Transport(err.into())
    }

    /// Whether retrying the same publish can succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::PublisherClosed | Self::Marshal { .. })
    }
}
