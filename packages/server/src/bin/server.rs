//! Hibiki fan-out server.
//!
//! Accepts authenticated WebSocket connections, persists and relays inbound events, and
//! delivers relayed events to the recipients connected to this instance.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin hibiki-server
//! cargo run --bin hibiki-server -- --port 3000 \
//!     --membership '{"7":[1,2,3]}' --tokens '{"alice-token":1,"bob-token":2}'
//! ```

use std::{collections::HashMap, sync::Arc};

use clap::Parser;
use hibiki_server::{
    Collaborators, Instance, ServerConfig,
    config::DEFAULT_RELAY_CHANNEL,
    domain::{Authenticator, ProjectId, UserId},
    infrastructure::{
        auth::{AllowAllAuthenticator, StaticTokenAuthenticator},
        relay::InMemoryRelay,
        repository::{InMemoryMembershipStore, InMemoryMessageStore},
    },
    ui::Server,
};
use hibiki_shared::{logger::setup_logger, time::SystemClock};

#[derive(Parser, Debug)]
#[command(name = "hibiki-server")]
#[command(about = "Real-time event fan-out server", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "HIBIKI_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "HIBIKI_PORT", default_value = "8080")]
    port: u16,

    /// Relay channel shared by every instance
    #[arg(long, env = "HIBIKI_CHANNEL", default_value = DEFAULT_RELAY_CHANNEL)]
    channel: String,

    /// Capacity of the persistence and relay-publish queues
    #[arg(long, env = "HIBIKI_QUEUE_CAPACITY", default_value = "100")]
    queue_capacity: usize,

    /// Frames buffered per connection
    #[arg(long, env = "HIBIKI_OUTBOUND_BUFFER", default_value = "64")]
    outbound_buffer: usize,

    /// Project membership seed, e.g. '{"7":[1,2]}'
    #[arg(long, env = "HIBIKI_MEMBERSHIP")]
    membership: Option<String>,

    /// Bearer token to user id map, e.g. '{"alice-token":1}'
    #[arg(long, env = "HIBIKI_TOKENS")]
    tokens: Option<String>,
}

impl Args {
    fn config(&self) -> ServerConfig {
        ServerConfig {
            relay_channel: self.channel.clone(),
            persistence_queue_capacity: self.queue_capacity,
            publish_queue_capacity: self.queue_capacity,
            outbound_buffer: self.outbound_buffer,
            ..ServerConfig::default()
        }
    }
}

fn membership_store(
    seed: Option<&str>,
) -> Result<InMemoryMembershipStore, Box<dyn std::error::Error>> {
    let Some(seed) = seed else {
        return Ok(InMemoryMembershipStore::new());
    };
    let raw: HashMap<String, Vec<u64>> = serde_json::from_str(seed)?;
    let mut projects = Vec::with_capacity(raw.len());
    for (project, members) in raw {
        let project = ProjectId::new(project.parse()?);
        projects.push((project, members.into_iter().map(UserId::new).collect::<Vec<_>>()));
    }
    Ok(InMemoryMembershipStore::with_projects(projects))
}

fn authenticator(
    tokens: Option<&str>,
) -> Result<Arc<dyn Authenticator>, Box<dyn std::error::Error>> {
    match tokens {
        Some(tokens) => {
            let raw: HashMap<String, u64> = serde_json::from_str(tokens)?;
            let tokens = raw
                .into_iter()
                .map(|(token, user_id)| (token, UserId::new(user_id)))
                .collect();
            Ok(Arc::new(StaticTokenAuthenticator::new(tokens)))
        }
        None => {
            tracing::warn!(
                "No tokens configured, accepting the user id as token (development only)"
            );
            Ok(Arc::new(AllowAllAuthenticator))
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.config();

    // In-process collaborators
    let collaborators = Collaborators {
        store: Arc::new(InMemoryMessageStore::new()),
        relay: Arc::new(InMemoryRelay::default()),
        resolver: Arc::new(membership_store(args.membership.as_deref())?),
        authenticator: authenticator(args.tokens.as_deref())?,
        clock: Arc::new(SystemClock),
    };

    let instance = Instance::start(&config, collaborators);
    tracing::info!("Serving as instance {}", instance.id());
    let result = Server::new(instance.state()).run(args.host, args.port).await;
    instance.shutdown();
    result
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    if let Err(e) = run(args).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
