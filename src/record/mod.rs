//! Record core.
//!
//! Everything between an inbound record message and its effects: the
//! dispatcher, the per-record write serializer, the coalesced read path, the
//! stability gate for permission reads, the hot-path bypass, and deletion
//! coordination.
//!
//! # Modules
//!
//! - [`handler`] - Message dispatch and permission driving
//! - [`transition`] - Per-record write serialization
//! - [`coalescer`] - Cache-first loads with in-flight deduplication
//! - [`stability`] - FIFO barrier for reads issued by permission rules
//! - [`hot_path`] - Force-write bypass for configured name prefixes
//! - [`deletion`] - Record deletion across tiers, transitions, and followers
//! - [`fanout`] - Broadcast seam towards the subscription registry

pub mod coalescer;
pub mod deletion;
pub mod fanout;
pub mod handler;
pub mod hot_path;
pub mod stability;
pub mod transition;

pub use coalescer::{GatedRecordReader, RecordCoalescer};
pub use deletion::DeletionCoordinator;
pub use fanout::RecordFanout;
pub use handler::RecordHandler;
pub use hot_path::HotPathWriter;
pub use stability::{StabilityGate, StabilityPermit};
pub use transition::{AddOutcome, RecordTransition, TransitionTable};
