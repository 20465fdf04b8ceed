use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use echo_arena::{
    cli::{Cli, Command, ServeArgs},
    server::{Server, ServerConfig},
};

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let default_filter = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(args).await,
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    init_tracing(args.verbose);

    let config = ServerConfig {
        announce_joins: args.announce_joins,
    };
    let server = Server::bind(args.listen, config).await?;
    info!("listening on {}", server.local_addr());

    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(?error, "failed to install ctrl-c handler");
    }

    // Active sessions would keep echoing here; the process exit takes them
    // down along with the runtime.
    server.stop();
    Ok(())
}
