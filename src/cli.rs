use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the echo server, accepting TCP connections.
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Socket address the server should bind to. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "127.0.0.1:6767")]
    pub listen: SocketAddr,

    /// Announce each join to every connected client.
    #[arg(long)]
    pub announce_joins: bool,

    /// Report every read/write completion (bytes transferred and outcome).
    #[arg(short, long)]
    pub verbose: bool,
}
