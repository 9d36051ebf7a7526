//! The remote-operations surface every member exposes to its peers.

use crate::error::Result;
use crate::network::rpc::{ErrorResponse, Message, RetrieveResponse};
use crate::types::CallContext;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, trace};

/// Handlers for inbound peer requests.
///
/// Membership operations are best-effort and always acknowledge.
#[async_trait]
pub trait PeerService: Send + Sync + 'static {
    /// Fetch `key` from the local group `group`.
    async fn retrieve(&self, ctx: CallContext, group: &str, key: &str) -> Result<Bytes>;

    /// Remove `key` from the local group `group` without fanning out.
    async fn delete(&self, ctx: CallContext, group: &str, key: &str) -> Result<()>;

    async fn add_peers(&self, addrs: Vec<String>);

    async fn remove_peers(&self, addrs: Vec<String>);

    async fn set_peers(&self, addrs: Vec<String>);
}

/// Something a `PeerService` can be attached to, usually a network server.
pub trait ServiceRegistrar {
    fn register_peer_service(&self, service: Arc<dyn PeerService>);
}

/// Route one request message to the matching handler and build the reply.
pub async fn dispatch(service: &dyn PeerService, msg: Message) -> Message {
    trace!(kind = msg.kind(), "Dispatching peer request");

    match msg {
        Message::Retrieve(req) => {
            let ctx = CallContext::from_budget_ms(req.budget_ms);
            match ctx.run(service.retrieve(ctx, &req.group, &req.key)).await {
                Ok(value) => Message::RetrieveResponse(RetrieveResponse {
                    value: value.to_vec(),
                }),
                Err(e) => {
                    debug!(group = %req.group, key = %req.key, error = %e, "Retrieve failed");
                    Message::Error(ErrorResponse::new(format!(
                        "failed to retrieve [{}/{}]: {}",
                        req.group, req.key, e
                    )))
                }
            }
        }
        Message::Delete(req) => {
            let ctx = CallContext::from_budget_ms(req.budget_ms);
            match ctx.run(service.delete(ctx, &req.group, &req.key)).await {
                Ok(()) => Message::Ack,
                Err(e) => Message::Error(ErrorResponse::new(e)),
            }
        }
        Message::AddPeers(peers) => {
            service.add_peers(peers.addrs).await;
            Message::Ack
        }
        Message::RemovePeers(peers) => {
            service.remove_peers(peers.addrs).await;
            Message::Ack
        }
        Message::SetPeers(peers) => {
            service.set_peers(peers.addrs).await;
            Message::Ack
        }
        other => Message::Error(ErrorResponse::new(format!(
            "unexpected request: {}",
            other.kind()
        ))),
    }
}
