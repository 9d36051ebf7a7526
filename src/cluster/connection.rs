//! Outbound connection to a single peer.

use crate::cluster::picker::PeerGetter;
use crate::config::DialOptions;
use crate::error::{Error, NetworkError, Result};
use crate::network::rpc::{read_message, write_message, KeyRequest, Message, Peers};
use crate::types::CallContext;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// One outbound channel to a remote member.
///
/// Requests on a connection are serialised: each call writes one frame and
/// reads one reply while holding the channel. A broken or cancelled exchange
/// drops the stream and the next call redials.
#[derive(Debug)]
pub struct PeerConnection {
    address: String,
    dial: DialOptions,
    channel: Mutex<Option<TcpStream>>,
    closed: AtomicBool,
}

impl PeerConnection {
    /// Connect to `address`.
    ///
    /// Success means the TCP handshake completed; the peer may still go away
    /// at any later point.
    pub async fn open(address: impl Into<String>, dial: &DialOptions) -> Result<Arc<Self>> {
        let address = address.into();
        let stream = Self::connect(&address, dial).await?;
        debug!(peer = %address, "Opened peer connection");

        Ok(Arc::new(Self {
            address,
            dial: dial.clone(),
            channel: Mutex::new(Some(stream)),
            closed: AtomicBool::new(false),
        }))
    }

    /// The remote member's address.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Release the channel. Idempotent.
    ///
    /// A call in flight finishes, but its stream is not kept afterwards.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.release_idle_stream();
        debug!(peer = %self.address, "Closed peer connection");
    }

    /// Drop the stream unless a call holds the channel. That call checks the
    /// closed flag after releasing the channel and drops it itself.
    fn release_idle_stream(&self) {
        if let Ok(mut channel) = self.channel.try_lock() {
            channel.take();
        }
    }

    /// Fetch `key` from `group` on the peer.
    pub async fn get(&self, ctx: CallContext, group: &str, key: &str) -> Result<Bytes> {
        let request = Message::Retrieve(KeyRequest::new(group, key, ctx.budget_ms()));
        match self.call(ctx, request).await {
            Ok(Message::RetrieveResponse(resp)) => Ok(Bytes::from(resp.value)),
            Ok(reply) => Err(self.reply_error(key, reply)),
            Err(Error::Timeout) => Err(Error::Timeout),
            Err(e) => Err(Error::remote(&self.address, key, e)),
        }
    }

    /// Invalidate `key` in `group` on the peer.
    pub async fn remove(&self, ctx: CallContext, group: &str, key: &str) -> Result<()> {
        let request = Message::Delete(KeyRequest::new(group, key, ctx.budget_ms()));
        self.expect_ack(ctx, request, key).await
    }

    /// Ask the peer to add members to its pool.
    pub async fn add_peers(&self, ctx: CallContext, addrs: &[String]) -> Result<()> {
        let request = Message::AddPeers(Peers::new(addrs.iter().cloned()));
        self.expect_ack(ctx, request, "add_peers").await
    }

    /// Ask the peer to remove members from its pool.
    pub async fn remove_peers(&self, ctx: CallContext, addrs: &[String]) -> Result<()> {
        let request = Message::RemovePeers(Peers::new(addrs.iter().cloned()));
        self.expect_ack(ctx, request, "remove_peers").await
    }

    /// Ask the peer to replace its membership.
    pub async fn set_peers(&self, ctx: CallContext, addrs: &[String]) -> Result<()> {
        let request = Message::SetPeers(Peers::new(addrs.iter().cloned()));
        self.expect_ack(ctx, request, "set_peers").await
    }

    async fn expect_ack(&self, ctx: CallContext, request: Message, subject: &str) -> Result<()> {
        match self.call(ctx, request).await {
            Ok(Message::Ack) => Ok(()),
            Ok(reply) => Err(self.reply_error(subject, reply)),
            Err(Error::Timeout) => Err(Error::Timeout),
            Err(e) => Err(Error::remote(&self.address, subject, e)),
        }
    }

    fn reply_error(&self, subject: &str, reply: Message) -> Error {
        match reply {
            Message::Error(err) => Error::remote(&self.address, subject, err.message),
            other => Error::remote(
                &self.address,
                subject,
                NetworkError::UnexpectedResponse(other.kind().to_string()),
            ),
        }
    }

    async fn call(&self, ctx: CallContext, request: Message) -> Result<Message> {
        if self.is_closed() {
            return Err(NetworkError::ConnectionClosed.into());
        }

        ctx.run(async {
            let mut channel = self.channel.lock().await;
            if self.is_closed() {
                channel.take();
                return Err(NetworkError::ConnectionClosed.into());
            }

            // The stream lives on this future's stack until the exchange
            // completes, so a cancelled call never leaves a half-read reply
            // behind for the next caller.
            let mut stream = match channel.take() {
                Some(stream) => stream,
                None => {
                    trace!(peer = %self.address, "Redialing peer");
                    Self::connect(&self.address, &self.dial).await?
                }
            };

            write_message(&mut stream, &request).await?;
            let reply = read_message(&mut stream, self.dial.max_frame_size)
                .await?
                .ok_or_else(|| {
                    NetworkError::ReceiveFailed("connection closed by peer".to_string())
                })?;

            *channel = Some(stream);
            drop(channel);
            if self.is_closed() {
                self.release_idle_stream();
            }
            Ok::<Message, Error>(reply)
        })
        .await
    }

    async fn connect(address: &str, dial: &DialOptions) -> Result<TcpStream> {
        let stream = tokio::time::timeout(dial.connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| NetworkError::ConnectionFailed {
                addr: address.to_string(),
                reason: "connect timeout".to_string(),
            })?
            .map_err(|e| NetworkError::ConnectionFailed {
                addr: address.to_string(),
                reason: e.to_string(),
            })?;

        if dial.nodelay {
            let _ = stream.set_nodelay(true);
        }
        Ok(stream)
    }
}

#[async_trait]
impl PeerGetter for PeerConnection {
    fn address(&self) -> &str {
        &self.address
    }

    async fn get(&self, ctx: CallContext, group: &str, key: &str) -> Result<Bytes> {
        PeerConnection::get(self, ctx, group, key).await
    }

    async fn remove(&self, ctx: CallContext, group: &str, key: &str) -> Result<()> {
        PeerConnection::remove(self, ctx, group, key).await
    }
}
