//! Transport abstraction for grant requests.
//!
//! A content process holds a [`RemoteCoordinatorChannel`]; the privileged
//! process answers with a [`GrantRequestHandler`]. Neither side imposes a
//! timeout: a request whose peer never answers stays pending, and callers
//! apply their own cancellation.

use async_trait::async_trait;

use storage_access_core::{AllowMode, Principal};

use crate::error::Result;
use crate::messages::{GrantReply, GrantRequest, ReplyStatus};

/// Content-side handle to the privileged coordinator.
#[async_trait]
pub trait RemoteCoordinatorChannel: Send + Sync {
    /// Send one grant request and wait for its reply.
    ///
    /// Resolves exactly once. A closed channel or a dropped reply is
    /// [`IpcError::ChannelClosed`](crate::IpcError::ChannelClosed).
    async fn send_grant_request(
        &self,
        top_level_principal: Option<Principal>,
        tracking_principal: Option<Principal>,
        tracking_origin: String,
        allow_mode: AllowMode,
    ) -> Result<GrantReply>;
}

/// Privileged-side handler for incoming grant requests.
#[async_trait]
pub trait GrantRequestHandler: Send + Sync {
    async fn handle_grant_request(&self, request: GrantRequest) -> ReplyStatus;
}

/// An in-memory transport for a single process hosting both sides.
///
/// Frames are still CBOR-encoded on the way through, so the codec is
/// exercised exactly as it would be across a real process boundary.
pub mod memory {
    use super::*;
    use std::sync::Arc;

    use bytes::Bytes;
    use tokio::sync::{mpsc, oneshot};

    use crate::error::IpcError;
    use crate::messages::{IpcMessage, RequestId};

    /// A request frame plus the slot its reply frame goes into.
    struct Envelope {
        frame: Bytes,
        reply: oneshot::Sender<Bytes>,
    }

    /// Create a connected content channel and coordinator endpoint.
    pub fn channel_pair(capacity: usize) -> (MemoryChannel, CoordinatorEndpoint) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            MemoryChannel { sender: tx },
            CoordinatorEndpoint { receiver: rx },
        )
    }

    /// Content-process side of an in-memory channel.
    #[derive(Clone)]
    pub struct MemoryChannel {
        sender: mpsc::Sender<Envelope>,
    }

    #[async_trait]
    impl RemoteCoordinatorChannel for MemoryChannel {
        async fn send_grant_request(
            &self,
            top_level_principal: Option<Principal>,
            tracking_principal: Option<Principal>,
            tracking_origin: String,
            allow_mode: AllowMode,
        ) -> Result<GrantReply> {
            let request = GrantRequest::new(
                top_level_principal,
                tracking_principal,
                tracking_origin,
                allow_mode,
            );
            let expected = request.request_id;
            let frame = IpcMessage::GrantRequest(request).to_bytes()?;

            let (reply_tx, reply_rx) = oneshot::channel();
            self.sender
                .send(Envelope {
                    frame,
                    reply: reply_tx,
                })
                .await
                .map_err(|_| IpcError::ChannelClosed)?;

            let reply_frame = reply_rx.await.map_err(|_| IpcError::ChannelClosed)?;
            let reply = IpcMessage::from_bytes(&reply_frame)?.into_reply()?;
            if reply.request_id != expected {
                return Err(IpcError::RequestMismatch {
                    expected,
                    actual: reply.request_id,
                });
            }
            Ok(reply)
        }
    }

    /// Privileged-process side of an in-memory channel.
    pub struct CoordinatorEndpoint {
        receiver: mpsc::Receiver<Envelope>,
    }

    impl CoordinatorEndpoint {
        /// Answer requests with `handler` until every channel is dropped.
        ///
        /// Returns how many requests were answered.
        pub async fn serve(mut self, handler: Arc<dyn GrantRequestHandler>) -> usize {
            let mut served = 0;
            while let Some(envelope) = self.receiver.recv().await {
                let (request_id, status) = match IpcMessage::from_bytes(&envelope.frame)
                    .and_then(IpcMessage::into_request)
                {
                    Ok(request) => {
                        let id = request.request_id;
                        (id, handler.handle_grant_request(request).await)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "malformed grant request");
                        (RequestId(0), ReplyStatus::InvalidRequest)
                    }
                };

                match IpcMessage::GrantReply(GrantReply { request_id, status }).to_bytes() {
                    Ok(frame) => {
                        // The requester may have given up; nothing to do then.
                        let _ = envelope.reply.send(frame);
                    }
                    Err(e) => tracing::warn!(error = %e, "failed to encode grant reply"),
                }
                served += 1;
            }
            tracing::debug!(served, "all grant channels closed");
            served
        }

        /// Take the next request without answering it.
        ///
        /// Dropping the returned [`PendingRequest`] drops the reply slot, which
        /// the requester observes as a closed channel.
        pub async fn next_request(&mut self) -> Option<PendingRequest> {
            let envelope = self.receiver.recv().await?;
            Some(PendingRequest {
                request: IpcMessage::from_bytes(&envelope.frame)
                    .and_then(IpcMessage::into_request),
                reply: envelope.reply,
            })
        }
    }

    /// A received request whose reply has not been sent yet.
    pub struct PendingRequest {
        pub request: Result<GrantRequest>,
        reply: oneshot::Sender<Bytes>,
    }

    impl PendingRequest {
        /// Answer the request.
        pub fn respond(self, status: ReplyStatus) -> Result<()> {
            let request_id = match &self.request {
                Ok(request) => request.request_id,
                Err(_) => RequestId(0),
            };
            let frame = IpcMessage::GrantReply(GrantReply { request_id, status }).to_bytes()?;
            self.reply.send(frame).map_err(|_| IpcError::ChannelClosed)
        }
    }
}
