//! Tideway - record core of a realtime data-sync server.
//!
//! Tideway arbitrates concurrent writes to named, versioned JSON records,
//! orders them into a gapless version sequence per record, persists them
//! through a two-tier storage stack, and fans committed values out to local
//! subscribers. Permissioning gates every operation and may itself read the
//! record it is gating.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Clients / Peer Bus                          │
//! │        (wire framing and transport live outside this crate)    │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Record Handler                            │
//! │   dispatch │ permission probes │ transition table ownership    │
//! └─────────────────────────────────────────────────────────────────┘
//!                  │                          │
//! ┌────────────────────────────┐ ┌────────────────────────────────┐
//! │         Read Path          │ │          Write Path            │
//! │ Coalescer │ Stability Gate │ │ Transition │ Hot-Path │ Delete │
//! └────────────────────────────┘ └────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Storage Facade                             │
//! │        Cache tier │ Durable tier │ Exclusion prefixes           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! ## Core
//! - [`core::config`] - Configuration parsing and validation
//! - [`core::error`] - Error types
//!
//! ## Protocol
//! - [`protocol::message`] - Message envelope and action space
//! - [`protocol::path`] - Dot/bracket record paths for partial writes
//!
//! ## Record Core
//! - [`record::handler`] - Message dispatch and permission driving
//! - [`record::transition`] - Per-record write serialization
//! - [`record::coalescer`] - Deduplicated cache-first reads
//! - [`record::stability`] - FIFO barrier for permission reads
//! - [`record::hot_path`] - Force-write bypass
//! - [`record::deletion`] - Deletion coordination
//!
//! ## Storage
//! - [`storage::facade`] - Uniform two-tier access
//! - [`storage::memory`] - In-memory reference store
//!
//! ## Collaborators
//! - [`registry::subscription`] - Subscription registry capability
//! - [`registry::listener`] - Pattern-listener capability
//! - [`registry::permission`] - Permission evaluator capability
//!
//! ## CLI
//! - [`cli::commands`] - CLI command implementations
//!
//! # Key Invariants
//!
//! - **Version linearity**: persisted versions per record are gapless and
//!   strictly increasing
//! - **Single transition**: at most one transition exists per record name
//! - **Broadcast after cache ack**: version V is never announced before the
//!   cache acknowledged it, and always before V's write-ack
//! - **Durable off-path**: durable-tier writes never block broadcasts
//! - **Gate FIFO**: stability-gate waiters release strictly in enqueue order

// Core infrastructure
pub mod core;

// Protocol surface
pub mod protocol;

// Record core
pub mod record;

// Storage layer
pub mod storage;

// External collaborator capabilities
pub mod registry;

// CLI
pub mod cli;

// Re-exports for convenience
pub use self::core::{config, error};
pub use protocol::{message, path};
pub use record::{coalescer, deletion, fanout, handler, hot_path, stability, transition};
pub use registry::{listener, permission, subscription};
pub use storage::{facade, memory};
