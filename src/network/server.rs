//! TCP server for handling incoming peer requests.

use crate::config::DEFAULT_MAX_FRAME_SIZE;
use crate::error::{NetworkError, Result};
use crate::network::rpc::{read_message, write_message, ErrorResponse, Message};
use crate::network::service::{dispatch, PeerService, ServiceRegistrar};
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

type ServiceSlot = Arc<RwLock<Option<Arc<dyn PeerService>>>>;

/// Cloneable handle used to attach a `PeerService` to a server, before or
/// after it starts running.
#[derive(Clone, Default)]
pub struct ServerRegistrar {
    slot: ServiceSlot,
}

impl ServerRegistrar {
    fn current(&self) -> Option<Arc<dyn PeerService>> {
        self.slot.read().clone()
    }

    pub fn is_registered(&self) -> bool {
        self.slot.read().is_some()
    }
}

impl ServiceRegistrar for ServerRegistrar {
    fn register_peer_service(&self, service: Arc<dyn PeerService>) {
        let replaced = self.slot.write().replace(service).is_some();
        if replaced {
            warn!("Peer service replaced on server");
        }
    }
}

/// TCP server for peer-to-peer requests.
pub struct NetworkServer {
    /// Address to bind to.
    bind_addr: SocketAddr,

    /// Listener bound ahead of `run`, if any.
    listener: Option<TcpListener>,

    /// Where the peer pool registers its handlers.
    registrar: ServerRegistrar,

    max_frame_size: usize,

    /// Shutdown signal receiver.
    shutdown_rx: mpsc::Receiver<()>,
}

impl NetworkServer {
    /// Create a new network server. The socket is bound in `run`.
    pub fn new(bind_addr: SocketAddr) -> (Self, mpsc::Sender<()>) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let server = Self {
            bind_addr,
            listener: None,
            registrar: ServerRegistrar::default(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            shutdown_rx,
        };

        (server, shutdown_tx)
    }

    /// Create a server and bind its socket immediately, so the real address
    /// is known (useful with port 0).
    pub async fn bind(bind_addr: SocketAddr) -> Result<(Self, mpsc::Sender<()>)> {
        let listener = TcpListener::bind(bind_addr).await.map_err(NetworkError::Io)?;
        let local_addr = listener.local_addr().map_err(NetworkError::Io)?;

        let (mut server, shutdown_tx) = Self::new(local_addr);
        server.listener = Some(listener);
        Ok((server, shutdown_tx))
    }

    /// Set the largest request frame accepted.
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// The address the server listens on.
    pub fn local_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Handle for registering the peer service.
    pub fn registrar(&self) -> ServerRegistrar {
        self.registrar.clone()
    }

    /// Run the server until a shutdown signal arrives.
    pub async fn run(mut self) -> Result<()> {
        let listener = match self.listener.take() {
            Some(listener) => listener,
            None => TcpListener::bind(self.bind_addr)
                .await
                .map_err(NetworkError::Io)?,
        };

        info!(addr = %self.bind_addr, "Peer server listening");

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            debug!(peer = %peer_addr, "Accepted connection");
                            let registrar = self.registrar.clone();
                            let limit = self.max_frame_size;
                            tokio::spawn(async move {
                                let served = Self::handle_connection(stream, registrar, limit);
                                if let Err(e) = served.await {
                                    debug!(peer = %peer_addr, error = %e, "Connection dropped");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    info!(addr = %self.bind_addr, "Peer server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_connection(
        mut stream: TcpStream,
        registrar: ServerRegistrar,
        max_frame_size: usize,
    ) -> Result<()> {
        let _ = stream.set_nodelay(true);

        while let Some(request) = read_message(&mut stream, max_frame_size).await? {
            let response = match registrar.current() {
                Some(service) => dispatch(service.as_ref(), request).await,
                None => Message::Error(ErrorResponse::new("peer service not registered")),
            };
            write_message(&mut stream, &response).await?;
        }

        // Connection closed
        Ok(())
    }
}

impl ServiceRegistrar for NetworkServer {
    fn register_peer_service(&self, service: Arc<dyn PeerService>) {
        self.registrar.register_peer_service(service);
    }
}
