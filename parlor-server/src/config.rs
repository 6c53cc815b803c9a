use clap::Parser;
use std::net::SocketAddr;

/// Process configuration for the rooms server.
#[derive(Debug, Parser)]
#[command(name = "parlor-server", about = "Live room session server")]
pub struct Config {
    /// Address the HTTP and WebSocket surface binds to.
    #[arg(long, default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Pick the new admin deterministically (lowest user id) instead of
    /// arbitrary membership order.
    #[arg(long, default_value_t = false)]
    pub deterministic_election: bool,
}
