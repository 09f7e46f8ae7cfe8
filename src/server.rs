//! Listener / dispatcher
//!
//! Binds the listening socket and spawns one handler task per accepted
//! connection, all sharing a single room registry.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpSocket};
use tracing::{error, info};

use crate::error::AppError;
use crate::handler::handle_connection;
use crate::registry::RoomRegistry;

/// Pending-connection queue length passed to `listen`
const LISTEN_BACKLOG: u32 = 128;

/// The chat server: a bound listener plus the room registry
pub struct ChatServer {
    listener: TcpListener,
    registry: Arc<RoomRegistry>,
}

impl ChatServer {
    /// Bind `addr` with `SO_REUSEADDR` set so a restart can rebind at once
    pub async fn bind(addr: SocketAddr) -> Result<Self, AppError> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(LISTEN_BACKLOG)?;

        Ok(Self {
            listener,
            registry: Arc::new(RoomRegistry::new()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, AppError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> Arc<RoomRegistry> {
        self.registry.clone()
    }

    /// Accept connections until an accept error occurs
    pub async fn run(self) -> Result<(), AppError> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Accept connections until `shutdown` resolves
    ///
    /// Sessions already running are left to end on their own.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), AppError>
    where
        F: Future,
    {
        info!("Chat server listening on {}", self.local_addr()?);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down server...");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, addr) = accepted.map_err(|e| {
                        error!("Failed to accept connection: {}", e);
                        e
                    })?;
                    info!("New connection from {}", addr);

                    let registry = self.registry.clone();
                    // Spawn handler task for each connection
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, registry).await {
                            error!("Error handling client {}: {}", addr, e);
                        }
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let server = ChatServer::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert!(server.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_bind_conflict_fails() {
        let first = ChatServer::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = first.local_addr().unwrap();

        // A live listener still blocks the port even with SO_REUSEADDR
        let second = ChatServer::bind(addr).await;
        assert!(matches!(second, Err(AppError::Io(_))));
    }

    #[tokio::test]
    async fn test_run_until_stops_on_shutdown() {
        let server = ChatServer::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let result = server.run_until(async {}).await;
        assert!(result.is_ok());
    }
}
