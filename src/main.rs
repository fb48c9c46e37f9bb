//! AMQP producer CLI
//!
//! `produce` publishes a rate-limited batch and reports throughput;
//! `listen` dumps everything delivered to a queue.

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use zentinel_amqp_producer::broker::{AmqpBroker, MemoryBroker};
use zentinel_amqp_producer::clock::SystemClock;
use zentinel_amqp_producer::config::ConnectionConfig;
use zentinel_amqp_producer::error::{exit_status, ListenError};
use zentinel_amqp_producer::{EmissionDriver, ProducerConfig, RunError};

/// Rate-controlled AMQP producer
#[derive(Parser, Debug)]
#[command(name = "zentinel-amqp-producer")]
#[command(author = "Zentinel Contributors")]
#[command(version)]
#[command(about = "Publish a rate-limited batch of messages to an AMQP broker", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Enable JSON log format
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish MESSAGE_COUNT messages at no more than RATE_LIMIT per second
    Produce(ProduceArgs),
    /// Print every message delivered to QUEUE
    Listen(ListenArgs),
}

#[derive(ClapArgs, Debug)]
struct BrokerArgs {
    /// Broker host
    host: String,

    /// Broker port
    port: u16,

    /// Username
    user: String,

    /// Password
    password: String,

    /// Virtual host
    #[arg(long)]
    vhost: Option<String>,
}

impl BrokerArgs {
    fn apply(&self, connection: &mut ConnectionConfig) {
        connection.host = self.host.clone();
        connection.port = self.port;
        connection.username = self.user.clone();
        connection.password = self.password.clone();
        if let Some(vhost) = &self.vhost {
            connection.vhost = vhost.clone();
        }
    }
}

/// Positionals are optional so a `--config` file can supply them; any
/// that are given override the file.
#[derive(ClapArgs, Debug)]
struct ProduceArgs {
    /// Broker host
    host: Option<String>,

    /// Broker port
    port: Option<u16>,

    /// Username
    user: Option<String>,

    /// Password
    password: Option<String>,

    /// Exchange to publish to
    exchange: Option<String>,

    /// Routing key for every message
    routing_key: Option<String>,

    /// Average messages per second over the whole run
    #[arg(allow_negative_numbers = true)]
    rate_limit: Option<f64>,

    /// Number of messages to publish
    message_count: Option<u64>,

    /// Virtual host
    #[arg(long)]
    vhost: Option<String>,

    /// Configuration file path (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Message body size in bytes
    #[arg(long)]
    body_size: Option<usize>,

    /// Throughput report interval in milliseconds
    #[arg(long)]
    report_interval_ms: Option<u64>,

    /// Publish into an in-process broker instead of connecting
    #[arg(long)]
    dry_run: bool,
}

impl ProduceArgs {
    /// Layer the command line over `config`.
    fn apply(&self, config: &mut ProducerConfig) {
        let connection = &mut config.connection;
        if let Some(host) = &self.host {
            connection.host = host.clone();
        }
        if let Some(port) = self.port {
            connection.port = port;
        }
        if let Some(user) = &self.user {
            connection.username = user.clone();
        }
        if let Some(password) = &self.password {
            connection.password = password.clone();
        }
        if let Some(vhost) = &self.vhost {
            connection.vhost = vhost.clone();
        }

        let run = &mut config.run;
        if let Some(exchange) = &self.exchange {
            run.exchange = exchange.clone();
        }
        if let Some(routing_key) = &self.routing_key {
            run.routing_key = routing_key.clone();
        }
        if let Some(rate_limit) = self.rate_limit {
            run.rate_limit = rate_limit;
        }
        if let Some(message_count) = self.message_count {
            run.message_count = message_count;
        }
        if let Some(body_size) = self.body_size {
            run.body_size = body_size;
        }
        if let Some(interval) = self.report_interval_ms {
            run.report_interval_ms = interval;
        }
    }

    fn resolve(&self) -> Result<ProducerConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ProducerConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }
}

#[derive(ClapArgs, Debug)]
struct ListenArgs {
    #[command(flatten)]
    broker: BrokerArgs,

    /// Queue to consume from
    queue: String,
}

fn main() {
    let args = Args::parse();

    // Initialize logging; stdout carries reports and dumps
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(io::stderr)
            .init();
    }

    let result = match args.command {
        Command::Produce(produce) => run_produce(produce),
        Command::Listen(listen) => run_listen(listen),
    };

    if let Err(err) = result {
        let code = exit_status(&err);
        let message = format!("{err:#}");
        error!(error = %message, exit_code = code, "Exiting");
        std::process::exit(code);
    }
}

fn load_config(path: &Path) -> Result<ProducerConfig> {
    info!(path = %path.display(), "Loading configuration from file");
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config = serde_json::from_str(&content)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}

fn run_produce(args: ProduceArgs) -> Result<()> {
    let config = args.resolve()?;
    let mut driver = EmissionDriver::new(&config.run, SystemClock).map_err(RunError::from)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.dry_run {
        let mut broker = MemoryBroker::new();
        driver.run(&mut broker, &mut out)?;
        info!(
            published = broker.published(),
            unroutable = broker.unroutable(),
            "Dry run complete"
        );
        return Ok(());
    }

    let mut broker = AmqpBroker::connect(&config.connection)
        .with_context(|| format!("connecting to {}", config.connection.redacted_url()))?;
    driver.run(&mut broker, &mut out)?;
    broker.close().context("closing broker connection")?;
    Ok(())
}

fn run_listen(args: ListenArgs) -> Result<()> {
    let mut connection = ConnectionConfig::default();
    args.broker.apply(&mut connection);

    let broker = AmqpBroker::connect(&connection)
        .map_err(ListenError::Connection)
        .with_context(|| format!("connecting to {}", connection.redacted_url()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let delivered = broker.listen(&args.queue, &mut out)?;

    info!(delivered, "Listener finished");
    broker
        .close()
        .map_err(ListenError::Connection)
        .context("closing broker connection")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn produce_args(argv: &[&str]) -> ProduceArgs {
        let args = Args::try_parse_from(argv).expect("arguments should parse");
        match args.command {
            Command::Produce(produce) => produce,
            other => panic!("expected produce, got {other:?}"),
        }
    }

    #[test]
    fn test_positionals_in_documented_order() {
        let args = produce_args(&[
            "zentinel-amqp-producer",
            "produce",
            "rabbit",
            "5673",
            "ops",
            "secret",
            "amq.direct",
            "load",
            "250.5",
            "1000",
        ]);
        let config = args.resolve().unwrap();
        assert_eq!(config.connection.host, "rabbit");
        assert_eq!(config.connection.port, 5673);
        assert_eq!(config.connection.username, "ops");
        assert_eq!(config.connection.password, "secret");
        assert_eq!(config.run.exchange, "amq.direct");
        assert_eq!(config.run.routing_key, "load");
        assert_eq!(config.run.rate_limit, 250.5);
        assert_eq!(config.run.message_count, 1000);
    }

    #[test]
    fn test_config_file_supplies_what_the_command_line_omits() {
        let path = std::env::temp_dir().join(format!(
            "zentinel-amqp-producer-{}.json",
            std::process::id()
        ));
        fs::write(
            &path,
            r#"{
                "connection": {
                    "host": "rabbit.internal",
                    "port": 5671,
                    "username": "producer",
                    "password": "from-file",
                    "vhost": "perf"
                },
                "run": {
                    "exchange": "amq.topic",
                    "routing-key": "file.key",
                    "rate-limit": 50,
                    "message-count": 10,
                    "body-size": 64
                }
            }"#,
        )
        .unwrap();
        let config_path = path.to_string_lossy().into_owned();

        // Only the config file
        let config = produce_args(&["zentinel-amqp-producer", "produce", "-c", &config_path])
            .resolve()
            .unwrap();
        assert_eq!(config.connection.host, "rabbit.internal");
        assert_eq!(config.connection.port, 5671);
        assert_eq!(config.connection.password, "from-file");
        assert_eq!(config.connection.vhost, "perf");
        assert_eq!(config.run.exchange, "amq.topic");
        assert_eq!(config.run.routing_key, "file.key");
        assert_eq!(config.run.rate_limit, 50.0);
        assert_eq!(config.run.message_count, 10);
        assert_eq!(config.run.body_size, 64);

        // Leading positionals win, the rest still come from the file
        let config = produce_args(&[
            "zentinel-amqp-producer",
            "produce",
            "localhost",
            "5672",
            "-c",
            &config_path,
            "--body-size",
            "128",
        ])
        .resolve()
        .unwrap();
        assert_eq!(config.connection.host, "localhost");
        assert_eq!(config.connection.port, 5672);
        assert_eq!(config.connection.username, "producer");
        assert_eq!(config.run.exchange, "amq.topic");
        assert_eq!(config.run.rate_limit, 50.0);
        assert_eq!(config.run.body_size, 128);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let args = produce_args(&[
            "zentinel-amqp-producer",
            "produce",
            "--config",
            "/nonexistent/zentinel-amqp-producer.json",
        ]);
        assert!(args.resolve().is_err());
    }
}
