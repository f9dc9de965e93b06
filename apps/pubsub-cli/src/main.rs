//! Pub/Sub CLI
//!
//! Publishes messages to, and consumes messages from, the SQL, HTTP and
//! NATS bindings of the `messaging` crate. Connection settings come from
//! the environment (see `core_config::pubsub` and `core_config::nats`).

use clap::{Args, Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::Environment;
use eyre::Result;

mod connect;
mod consume;
mod produce;

#[derive(Parser)]
#[command(name = "pubsub")]
#[command(about = "Produce and consume messages over SQL, HTTP and NATS")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume a topic, printing each message as a JSON line and acking it
    Consume {
        #[command(subcommand)]
        transport: ConsumeTransport,
    },

    /// Publish messages to a topic
    Produce {
        #[command(subcommand)]
        transport: ProduceTransport,
    },
}

#[derive(Subcommand)]
enum ConsumeTransport {
    /// Poll the SQL messages table (requires DATABASE_URL)
    Sql {
        #[command(flatten)]
        args: ConsumeArgs,

        /// Consumer group, overriding PUBSUB_CONSUMER_GROUP
        #[arg(short, long)]
        group: Option<String>,

        /// Create the messages and offsets tables first
        #[arg(long)]
        init_schema: bool,
    },

    /// Pull from a durable JetStream consumer
    Nats {
        #[command(flatten)]
        args: ConsumeArgs,

        /// Create the stream for the topic if it does not exist
        #[arg(long)]
        create_stream: bool,
    },
}

#[derive(Subcommand)]
enum ProduceTransport {
    /// Insert into the SQL messages table (requires DATABASE_URL)
    Sql {
        #[command(flatten)]
        args: ProduceArgs,

        /// Create the messages and offsets tables first
        #[arg(long)]
        init_schema: bool,
    },

    /// POST each message to `{address}/{topic}`
    Http {
        #[command(flatten)]
        args: ProduceArgs,

        /// Base address of the receiving server
        #[arg(short, long, env = "PUBSUB_HTTP_ADDRESS")]
        address: String,

        /// Do not log response bodies of failed requests
        #[arg(long)]
        quiet_errors: bool,
    },

    /// Publish to JetStream
    Nats {
        #[command(flatten)]
        args: ProduceArgs,

        /// Create the stream for the topic if it does not exist
        #[arg(long)]
        create_stream: bool,
    },
}

#[derive(Args)]
pub struct ConsumeArgs {
    /// Topic to consume
    pub topic: String,

    /// Exit after this many acked messages
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

#[derive(Args)]
pub struct ProduceArgs {
    /// Topic to publish to
    pub topic: String,

    /// Message payloads, one message per value (default: one per stdin line)
    pub payloads: Vec<String>,

    /// Metadata added to every message, as key=value
    #[arg(short, long, value_parser = parse_key_value)]
    pub metadata: Vec<(String, String)>,

    /// Retry each message this many times on transient failures
    #[arg(long, default_value_t = 0)]
    pub retries: u32,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let environment = Environment::from_env();
    init_tracing(&environment);

    let cli = Cli::parse();

    match cli.command {
        Commands::Consume { transport } => match transport {
            ConsumeTransport::Sql {
                args,
                group,
                init_schema,
            } => {
                let subscriber = connect::sql_subscriber(group, init_schema).await?;
                consume::run(subscriber, &args).await?;
            }
            ConsumeTransport::Nats {
                args,
                create_stream,
            } => {
                let subscriber = connect::nats_subscriber(&args.topic, create_stream).await?;
                consume::run(subscriber, &args).await?;
            }
        },

        Commands::Produce { transport } => match transport {
            ProduceTransport::Sql { args, init_schema } => {
                let publisher = connect::sql_publisher(init_schema).await?;
                produce::run(publisher, &args).await?;
            }
            ProduceTransport::Http {
                args,
                address,
                quiet_errors,
            } => {
                let publisher = connect::http_publisher(&address, quiet_errors)?;
                produce::run(publisher, &args).await?;
            }
            ProduceTransport::Nats {
                args,
                create_stream,
            } => {
                let publisher = connect::nats_publisher(&args.topic, create_stream).await?;
                produce::run(publisher, &args).await?;
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("trace_id=a=b"),
            Ok(("trace_id".to_string(), "a=b".to_string()))
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=value").is_err());
    }

    #[test]
    fn test_produce_http_args() {
        let cli = Cli::try_parse_from([
            "pubsub",
            "produce",
            "http",
            "orders",
            "one",
            "two",
            "--address",
            "http://localhost:8080",
            "-m",
            "trace_id=t-1",
            "--retries",
            "3",
        ])
        .unwrap();

        match cli.command {
            Commands::Produce {
                transport:
                    ProduceTransport::Http {
                        args,
                        address,
                        quiet_errors,
                    },
            } => {
                assert_eq!(args.topic, "orders");
                assert_eq!(args.payloads, vec!["one", "two"]);
                assert_eq!(
                    args.metadata,
                    vec![("trace_id".to_string(), "t-1".to_string())]
                );
                assert_eq!(args.retries, 3);
                assert_eq!(address, "http://localhost:8080");
                assert!(!quiet_errors);
            }
            _ => panic!("expected produce http"),
        }
    }

    #[test]
    fn test_consume_sql_args() {
        let cli = Cli::try_parse_from([
            "pubsub",
            "consume",
            "sql",
            "orders",
            "-n",
            "5",
            "--group",
            "billing",
            "--init-schema",
        ])
        .unwrap();

        match cli.command {
            Commands::Consume {
                transport:
                    ConsumeTransport::Sql {
                        args,
                        group,
                        init_schema,
                    },
            } => {
                assert_eq!(args.topic, "orders");
                assert_eq!(args.limit, Some(5));
                assert_eq!(group.as_deref(), Some("billing"));
                assert!(init_schema);
            }
            _ => panic!("expected consume sql"),
        }
    }

    #[test]
    fn test_produce_requires_topic() {
        assert!(Cli::try_parse_from(["pubsub", "produce", "nats"]).is_err());
        assert!(Cli::try_parse_from(["pubsub", "produce", "nats", "orders"]).is_ok());
    }
}
