//! # Storage Access IPC
//!
//! The one cross-process message of the storage-access engine: a content
//! process asking the privileged coordinator to durably record a grant.
//!
//! ## Message Flow
//!
//! ```text
//! Content process                      Privileged coordinator
//!   |-------- GrantRequest ------------->|
//!   |                                    |  write permission
//!   |<------- GrantReply ----------------|
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use storage_access_ipc::{memory::channel_pair, GrantRequestHandler};
//!
//! async fn example(handler: Arc<dyn GrantRequestHandler>) {
//!     let (channel, endpoint) = channel_pair(16);
//!     tokio::spawn(endpoint.serve(handler));
//!     // hand `channel` to the content-side coordinator
//!     # drop(channel);
//! }
//! ```

pub mod error;
pub mod messages;
pub mod transport;

pub use error::{IpcError, Result};
pub use messages::{
    GrantReply, GrantRequest, IpcMessage, ReplyStatus, RequestId, PROTOCOL_VERSION,
};
pub use transport::{memory, GrantRequestHandler, RemoteCoordinatorChannel};
