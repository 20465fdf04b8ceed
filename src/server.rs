use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use tokio::{net::TcpListener, select, sync::Notify};
use tracing::{info, warn};

use crate::{registry::Registry, session::Session};

#[derive(Debug, Clone, Copy, Default)]
pub struct ServerConfig {
    /// Broadcast `player #<n> has entered the game` to every live session
    /// when a client connects, `<n>` being the registration ordinal.
    pub announce_joins: bool,
}

/// Accepts TCP connections and hands each one to a [`Session`].
///
/// The accept loop starts at construction and runs until [`Server::stop`] is
/// called or accepting fails. Stopping closes the listening socket only;
/// sessions accepted earlier keep echoing until their own I/O ends.
pub struct Server {
    local_addr: SocketAddr,
    registry: Arc<Registry>,
    shutdown: Arc<Notify>,
}

impl Server {
    /// Binds `addr` and starts accepting.
    pub async fn bind(addr: SocketAddr, config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        Self::start(listener, config)
    }

    /// Starts accepting on a pre-bound listener. Binding is left to the
    /// caller so tests can use an ephemeral port.
    pub fn start(listener: TcpListener, config: ServerConfig) -> Result<Self> {
        let local_addr = listener
            .local_addr()
            .context("listener has no local address")?;
        let registry = Arc::new(Registry::new());
        let shutdown = Arc::new(Notify::new());

        tokio::spawn(accept_loop(
            listener,
            Arc::clone(&registry),
            Arc::clone(&shutdown),
            config,
        ));

        Ok(Self {
            local_addr,
            registry,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Sends `message` to every currently connected client and returns the
    /// number of clients it reached. Infallible; zero live sessions is just
    /// a count of zero.
    pub fn broadcast(&self, message: &str) -> usize {
        self.registry.broadcast(message)
    }

    /// Stops accepting new connections and closes the listening socket.
    /// Already-accepted sessions are unaffected. Idempotent.
    pub fn stop(&self) {
        self.shutdown.notify_one();
    }
}

async fn accept_loop(
    listener: TcpListener,
    registry: Arc<Registry>,
    shutdown: Arc<Notify>,
    config: ServerConfig,
) {
    loop {
        select! {
            _ = shutdown.notified() => {
                info!("stopped accepting connections");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let session = Session::new(stream, peer);
                    let ordinal = registry.register(&session);
                    session.start();
                    info!(%peer, ordinal, "accepted connection");
                    if config.announce_joins {
                        registry.broadcast(&format!("player #{ordinal} has entered the game\n"));
                    }
                }
                // Acceptor-level errors are not recoverable; stop admitting
                // new sessions and leave existing ones running.
                Err(error) => {
                    warn!(%error, "accept failed");
                    break;
                }
            },
        }
    }
    // The listener drops here, closing the listening socket.
}
