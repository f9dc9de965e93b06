//! HTTP webhook binding: every message becomes one POST request.

mod marshal;
mod publisher;

pub use marshal::{DefaultMarshaler, MarshalMessage};
pub use publisher::{HttpPublisher, HttpPublisherConfig};
