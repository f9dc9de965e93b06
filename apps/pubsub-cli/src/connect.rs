//! Builds publishers and subscribers from environment configuration.

use async_nats::jetstream::{self, stream};
use core_config::nats::NatsConfig as NatsEnv;
use core_config::pubsub::PubSubConfig;
use core_config::FromEnv;
use eyre::{Result, WrapErr};
use messaging::http::{DefaultMarshaler, HttpPublisher, HttpPublisherConfig};
use messaging::nats::{NatsConfig, NatsPublisher, NatsSubscriber};
use messaging::sql::{
    initialize_schema, PostgresSchema, SqlPublisher, SqlPublisherConfig, SqlSubscriber,
    SqlSubscriberConfig,
};
use messaging::{ConstantName, ConsumerName};
use sea_orm::{Database, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

async fn connect_database(config: &PubSubConfig, init_schema: bool) -> Result<DatabaseConnection> {
    info!("Connecting to database...");
    let db = Database::connect(&config.database_url)
        .await
        .wrap_err("Database connection failed")?;

    if init_schema {
        initialize_schema(
            &db,
            &PostgresSchema,
            &config.messages_table,
            &config.offsets_table,
        )
        .await
        .wrap_err("Failed to initialize schema")?;
    }

    Ok(db)
}

pub async fn sql_subscriber(group: Option<String>, init_schema: bool) -> Result<SqlSubscriber> {
    let config = PubSubConfig::from_env()?;
    let db = connect_database(&config, init_schema).await?;

    let subscriber_config =
        SqlSubscriberConfig::postgres(group.unwrap_or_else(|| config.consumer_group.clone()))
            .with_tables(&config.messages_table, &config.offsets_table)
            .with_poll_interval(config.poll_interval)
            .with_resend_interval(config.resend_interval);

    Ok(SqlSubscriber::new(db, subscriber_config)?)
}

pub async fn sql_publisher(init_schema: bool) -> Result<SqlPublisher> {
    let config = PubSubConfig::from_env()?;
    let db = connect_database(&config, init_schema).await?;

    Ok(SqlPublisher::new(
        db,
        SqlPublisherConfig::postgres().with_messages_table(&config.messages_table),
    )?)
}

pub fn http_publisher(address: &str, quiet_errors: bool) -> Result<HttpPublisher> {
    let mut config = HttpPublisherConfig::new(Arc::new(DefaultMarshaler::new(address)));
    if quiet_errors {
        config = config.without_response_body_logging();
    }
    Ok(HttpPublisher::new(config)?)
}

/// Connect to NATS, optionally creating a stream that captures `topic`.
async fn connect_jetstream(
    env: &NatsEnv,
    topic: &str,
    create_stream: bool,
) -> Result<jetstream::Context> {
    info!(url = %env.url, "Connecting to NATS...");
    let client = async_nats::connect(&env.url)
        .await
        .wrap_err("NATS connection failed")?;
    let context = jetstream::new(client);

    if create_stream {
        context
            .get_or_create_stream(stream::Config {
                name: env.stream.clone(),
                subjects: vec![topic.to_string()],
                ..Default::default()
            })
            .await
            .wrap_err_with(|| format!("Failed to create stream {}", env.stream))?;
    }

    Ok(context)
}

fn nats_config(env: &NatsEnv, resend_interval: Duration) -> NatsConfig {
    NatsConfig::new()
        .with_stream(ConstantName::new(env.stream.clone()))
        .with_consumer(ConsumerName::new(env.consumer.clone()))
        .with_ack_wait(env.ack_wait)
        .with_resend_interval(resend_interval)
}

pub async fn nats_subscriber(topic: &str, create_stream: bool) -> Result<NatsSubscriber> {
    let env = NatsEnv::from_env()?;
    let context = connect_jetstream(&env, topic, create_stream).await?;
    let resend_interval = core_config::env_millis_or_default(
        "PUBSUB_RESEND_INTERVAL_MS",
        Duration::from_secs(1),
    )?;
    Ok(NatsSubscriber::new(context, nats_config(&env, resend_interval)))
}

pub async fn nats_publisher(topic: &str, create_stream: bool) -> Result<NatsPublisher> {
    let env = NatsEnv::from_env()?;
    let context = connect_jetstream(&env, topic, create_stream).await?;
    Ok(NatsPublisher::new(
        context,
        nats_config(&env, Duration::from_secs(1)),
    ))
}
