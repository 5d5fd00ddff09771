//! Message broker subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline (required publish, awaited) ─┐
//!                                       ├→ TopicPublisher::publish(topic, payload)
//! Audit relay worker (fire-and-forget) ─┘      → nats.rs (JetStream, acked)
//!                                              → memory.rs (in-process)
//! ```
//!
//! # Design Decisions
//! - At-least-once: a publish returns only after the broker acknowledges
//! - One shared client per process, safe for concurrent use
//! - No retries here; callers decide how to treat a failure

pub mod memory;
pub mod nats;
pub mod publisher;

pub use memory::{MemoryPublisher, PublishedMessage};
pub use nats::NatsTopicPublisher;
pub use publisher::{PublishError, TopicPublisher};
