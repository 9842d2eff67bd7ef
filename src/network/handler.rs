//! Replay server accept loop

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::replay::ReplayEngine;
use crate::Result;

use super::connection_pool::ConnectionPool;
use super::{HttpHandler, SHUTDOWN_TIMEOUT_MS};

/// Serves a frozen replay engine over HTTP
pub struct NetworkHandler {
    http: HttpHandler,
    port: u16,
    connection_pool: ConnectionPool,
    shutdown_tx: broadcast::Sender<()>,
}

impl NetworkHandler {
    /// Create a new network handler
    #[must_use]
    pub fn new(engine: Arc<ReplayEngine>, port: u16, max_connections: usize) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            http: HttpHandler::new(engine),
            port,
            connection_pool: ConnectionPool::new(max_connections),
            shutdown_tx,
        }
    }

    /// Sender that stops the server when a value is sent
    #[must_use]
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Bind the configured port on all interfaces and serve until shutdown
    ///
    /// # Errors
    ///
    /// Returns error if the port cannot be bound
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from `listener` until Ctrl-C or a shutdown signal
    ///
    /// Each connection runs on its own task. After shutdown, in-flight
    /// connections get a grace period before being aborted.
    ///
    /// # Errors
    ///
    /// Returns error if the listener address cannot be read
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        info!("Listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let Some(guard) = self.connection_pool.try_acquire() else {
                                warn!(
                                    "Connection limit reached ({} active), rejecting {}",
                                    self.connection_pool.active_connections(),
                                    peer_addr
                                );
                                drop(stream);
                                continue;
                            };

                            let http = self.http.clone();
                            connections.spawn(async move {
                                let _guard = guard;
                                serve_connection(stream, peer_addr, http).await;
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                Some(result) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = result {
                        warn!("Connection task failed: {}", e);
                    }
                }
                _ = &mut ctrl_c => {
                    info!("Received SIGINT, shutting down");
                    break;
                }
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        drop(listener);

        let shutdown_timeout = Duration::from_millis(SHUTDOWN_TIMEOUT_MS);
        let drained = tokio::time::timeout(shutdown_timeout, async {
            while let Some(result) = connections.join_next().await {
                if let Err(e) = result {
                    warn!("Task cleanup error: {}", e);
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                "Aborting {} connections after shutdown timeout",
                connections.len()
            );
            connections.abort_all();
        }

        info!("Shutdown complete");
        Ok(())
    }
}

async fn serve_connection(stream: TcpStream, peer_addr: SocketAddr, http: HttpHandler) {
    let service = service_fn(move |request: Request<Incoming>| {
        let http = http.clone();
        async move { Ok::<_, Infallible>(http.handle(request).await) }
    });

    if let Err(e) = http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        debug!("Connection error from {}: {}", peer_addr, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::RouteTable;
    use std::path::PathBuf;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn empty_engine() -> Arc<ReplayEngine> {
        Arc::new(ReplayEngine::from_table(
            PathBuf::from("/tmp"),
            RouteTable::default(),
        ))
    }

    #[test]
    fn test_network_handler_creation() {
        let handler = NetworkHandler::new(empty_engine(), 8080, 10);

        assert_eq!(handler.connection_pool.max_connections(), 10);
        assert_eq!(handler.port, 8080);
    }

    #[tokio::test]
    async fn test_shutdown_signal() {
        let handler = NetworkHandler::new(empty_engine(), 0, 10);
        let shutdown = handler.shutdown_handle();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let handle = tokio::spawn(async move { handler.serve(listener).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.send(()).ok();

        let result = tokio::time::timeout(Duration::from_secs(2), handle).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_serves_not_found_over_tcp() {
        let handler = NetworkHandler::new(empty_engine(), 0, 10);
        let shutdown = handler.shutdown_handle();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move { handler.serve(listener).await });

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /missing HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 404"));

        shutdown.send(()).ok();
        server.await.unwrap().unwrap();
    }
}
