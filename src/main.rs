//! CLI for CerealBus
//!
//! Subcommands:
//! - `server`: run the broker
//! - `publish`, `subscribe`, `topics`: small clients for smoke tests

use clap::{Args, Parser, ValueEnum};
use tracing::{error, info};

use cerealbus::broker::{Broker, shared};
use cerealbus::client::{Queue, QueueKind};
use cerealbus::config::{Settings, load_config};
use cerealbus::protocol::Format;
use cerealbus::transport::start_server;
use cerealbus::utils::logging;

#[derive(Parser)]
#[command(name = "cerealbus")]
enum Command {
    /// Start the broker
    Server,
    /// Publish one value on a topic
    Publish {
        #[arg(long)]
        topic: String,
        #[arg(long)]
        value: String,
        #[command(flatten)]
        conn: ConnectionArgs,
    },
    /// Print every value delivered on a topic until the broker goes away
    Subscribe {
        #[arg(long)]
        topic: String,
        #[command(flatten)]
        conn: ConnectionArgs,
    },
    /// Print the topics that hold a value
    Topics {
        #[command(flatten)]
        conn: ConnectionArgs,
    },
}

#[derive(Args)]
struct ConnectionArgs {
    /// Broker address (defaults to the configured server address)
    #[arg(long, env = "CEREALBUS_ADDR")]
    addr: Option<String>,
    /// Payload format used on this connection
    #[arg(long, value_enum, default_value_t = FormatArg::Json)]
    format: FormatArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Json,
    Xml,
    Binary,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => Format::Json,
            FormatArg::Xml => Format::Xml,
            FormatArg::Binary => Format::Binary,
        }
    }
}

impl ConnectionArgs {
    fn address(&self, settings: &Settings) -> String {
        self.addr.clone().unwrap_or_else(|| settings.address())
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cmd = Command::parse();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    logging::init(&settings.log.level);

    let result = match cmd {
        Command::Server => run_server(settings).await,
        Command::Publish { topic, value, conn } => run_publish(&settings, conn, topic, value).await,
        Command::Subscribe { topic, conn } => run_subscribe(&settings, conn, topic).await,
        Command::Topics { conn } => run_topics(&settings, conn).await,
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run_server(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let broker = shared(Broker::new());

    tokio::select! {
        result = start_server(&settings, broker) => {
            result?;
            error!("Server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

async fn run_publish(
    settings: &Settings,
    conn: ConnectionArgs,
    topic: String,
    value: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = conn.address(settings);
    let mut queue = Queue::connect(addr, topic, QueueKind::Producer, conn.format.into()).await?;
    queue.push(value).await?;
    queue.close().await?;
    Ok(())
}

async fn run_subscribe(
    settings: &Settings,
    conn: ConnectionArgs,
    topic: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = conn.address(settings);
    let mut queue = Queue::connect(addr, topic, QueueKind::Consumer, conn.format.into()).await?;

    while let Some((topic, value)) = queue.pull().await? {
        println!("{topic}: {value}");
    }
    info!("Broker closed the connection");
    Ok(())
}

async fn run_topics(
    settings: &Settings,
    conn: ConnectionArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = conn.address(settings);
    // The queue's own topic is unused; producers never subscribe on connect
    let mut queue = Queue::connect(addr, "", QueueKind::Producer, conn.format.into()).await?;

    for topic in queue.list_topics().await? {
        println!("{topic}");
    }
    queue.close().await?;
    Ok(())
}
