//! Record protocol surface.
//!
//! The message envelope, the action space with its stable wire codes, the
//! dot/bracket record path grammar, and the outbound delivery capability
//! through which the core talks back to clients and peers.

pub mod message;
pub mod path;

use serde_json::Value;
use std::sync::Arc;

pub use message::{RecordAction, RecordMessage, Topic};
pub use path::RecordPath;

/// Outbound delivery capability of a connected client or peer.
///
/// The transport layer owns the socket; the core only ever pushes finished
/// messages through this surface and reads the connection's identity
/// attributes when permissioning.
pub trait MessageSink: Send + Sync {
    /// Stable identity of this connection, used for subscription bookkeeping.
    fn id(&self) -> u64;

    /// Authenticated user name.
    fn user(&self) -> &str;

    /// Auth data attached at login, handed to the permission evaluator.
    fn auth_data(&self) -> &Value;

    /// Whether this sink represents the peer message bus rather than a
    /// client socket.
    fn is_remote(&self) -> bool {
        false
    }

    /// Deliver an outbound message.
    fn send(&self, message: RecordMessage);
}

/// Shared handle to a message sink.
pub type Sender = Arc<dyn MessageSink>;
