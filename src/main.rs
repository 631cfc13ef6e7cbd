mod accept_stream;
mod client;
mod config;
mod error;
mod handlers;
mod liveness;
mod membership;
mod peers;
mod probe;
mod select_stream_or_shutdown;
mod server_loop;
mod store;
mod sweep;
#[cfg(test)]
mod testing;

use clap::{Parser, Subcommand};
use client::HttpFetcher;
use config::Config;
use handlers::DiscoveryService;
use membership::ServiceRegistrar;
use std::path::PathBuf;
use std::sync::Arc;
use store::MembershipStore;
use sweep::{SweepReport, Sweeper};
use tokio::{net::TcpListener, signal, sync::Notify};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Local subnet peer discovery")]
struct Args {
    #[arg(
        long,
        env = "DINO_CONFIG",
        default_value = "config.toml",
        help = "Path to the node configuration file"
    )]
    config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Initialize the network: ask every host on the local /24 to join
    Init,

    /// Remove a peer from the membership
    Leave {
        /// Peer address as ip:port
        address: String,
    },

    /// List known peers
    List,

    /// Run the discovery service that answers joins and listings
    Serve,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    config::install(Config::load(&args.config)?);
    let config = config::current().ok_or("configuration was not installed")?;
    let local = config.base_address()?;

    let shutdown_notify = Arc::new(Notify::new());
    tokio::spawn({
        let interrupt_handle = shutdown_notify.clone();
        async move {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                return;
            }
            interrupt_handle.notify_one();
        }
    });

    let fetcher = Arc::new(HttpFetcher::new(config.timeout()));

    match args.command {
        Command::Init => {
            // The running service owns the store; accepted peers are registered through it.
            let registrar = Arc::new(ServiceRegistrar::new(fetcher.clone(), local.to_string()));
            let sweeper = Sweeper::new(fetcher, registrar, local, config.concurrency());

            match sweeper.sweep(&shutdown_notify).await {
                SweepReport::ServiceDown => {
                    println!("Dino server is not running currently.");
                    println!("Start the server and retry.");
                }
                SweepReport::Finished(summary) => {
                    for peer in &summary.accepted {
                        println!("{}", peer);
                    }
                    if summary.cancelled {
                        println!("Sweep interrupted after {} probes.", summary.probed);
                    }
                    info!("{} new peers registered", summary.registered);
                }
            }
        }
        Command::Leave { address } => {
            let outcome =
                match membership::leave(fetcher.as_ref(), &local.to_string(), &address).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        // Service is down, so nothing else holds the store.
                        warn!("{}; updating the store directly", e);
                        let store = MembershipStore::open(&config.database.db)?;
                        let outcome = store.leave(&address, &[]);
                        store.flush()?;
                        outcome
                    }
                };
            println!("{}", outcome);
        }
        Command::List => match membership::fetch_listing(fetcher.as_ref(), &local.to_string()).await
        {
            Ok(listing) => {
                for address in listing {
                    println!("{}", address);
                }
            }
            Err(e) => {
                warn!("{}; reading the store directly", e);
                let store = MembershipStore::open(&config.database.db)?;
                if store.is_empty() {
                    println!("No peers.");
                }
                for peer in store.list()? {
                    match peer.joined() {
                        Some(joined) => {
                            println!("{}\tjoined {}", peer.address, joined.to_rfc3339())
                        }
                        None => println!("{}", peer.address),
                    }
                }
            }
        },
        Command::Serve => {
            let store = MembershipStore::open(&config.database.db)?;
            let listener = TcpListener::bind(local).await?;
            info!("Listening on http://{} with {} known peers", local, store.len());

            let service = DiscoveryService {
                store: store.clone(),
                port: local.port(),
            };
            server_loop::serve(listener, service, shutdown_notify.clone()).await;
            store.flush()?;
        }
    }

    Ok(())
}
