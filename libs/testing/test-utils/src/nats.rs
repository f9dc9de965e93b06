//! Disposable JetStream-enabled NATS server.

use async_nats::jetstream::{self, stream, Context};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::nats::Nats;

const CLIENT_PORT: u16 = 4222;

/// A NATS server started with `-js`, removed when dropped.
///
/// ```no_run
/// use test_utils::TestNats;
///
/// # async fn example() {
/// let nats = TestNats::new().await;
/// nats.create_stream("ORDERS", &["orders.>"]).await;
/// let publisher_ctx = nats.jetstream();
/// # }
/// ```
pub struct TestNats {
    _container: ContainerAsync<Nats>,
    jetstream: Context,
    pub url: String,
}

impl TestNats {
    pub async fn new() -> Self {
        let container = Nats::default()
            .with_tag("latest")
            .with_cmd(["-js"])
            .start()
            .await
            .expect("NATS container did not start");
        let port = container
            .get_host_port_ipv4(CLIENT_PORT)
            .await
            .expect("NATS client port is not mapped");

        let url = format!("nats://127.0.0.1:{port}");
        let client = async_nats::connect(&url)
            .await
            .expect("cannot connect to test NATS");
        tracing::info!(%url, "JetStream test server up");

        Self {
            _container: container,
            jetstream: jetstream::new(client),
            url,
        }
    }

    /// JetStream context sharing this fixture's connection.
    pub fn jetstream(&self) -> Context {
        self.jetstream.clone()
    }

    pub async fn create_stream(&self, name: &str, subjects: &[&str]) {
        let config = stream::Config {
            name: name.to_owned(),
            subjects: subjects.iter().map(|s| (*s).to_owned()).collect(),
            ..Default::default()
        };
        self.jetstream
            .create_stream(config)
            .await
            .unwrap_or_else(|e| panic!("cannot create stream {name}: {e}"));
    }

    /// Number of messages currently stored in `name`.
    pub async fn stream_messages(&self, name: &str) -> u64 {
        let mut stream = self
            .jetstream
            .get_stream(name)
            .await
            .unwrap_or_else(|e| panic!("no stream {name}: {e}"));
        let info = stream
            .info()
            .await
            .unwrap_or_else(|e| panic!("cannot read info of stream {name}: {e}"));
        info.state.messages
    }
}
