//! # MQTT Broker Link
//!
//! Owns the single connection to the external MQTT broker for the process
//! lifetime. The link subscribes to the fixed topic list, feeds every
//! inbound message through the state store, and exposes a thread-safe
//! publish path for the outbound device commands.
//!
//! ## Module layout
//!
//! ```text
//! broker/
//! ├── command.rs - outbound command topics and payload encodings
//! └── link.rs    - connection worker, status, publish path
//! ```
//!
//! ## Execution model
//!
//! All network I/O runs on one spawned worker task that polls the rumqttc
//! event loop. The worker's only job on an inbound message is to decode the
//! payload and hand it to [`state::StateStore::ingest`] plus
//! [`bus::ChangeBus::publish`]; everything else (rendering, command
//! handling) lives on other tasks and reaches the broker only through
//! [`BrokerLink`].
//!
//! A lost connection is retried forever with a capped exponential backoff.
//! While the link is down, publishes fail fast and reads keep serving the
//! last known state.
//!
//! [`state::StateStore::ingest`]: crate::state::StateStore::ingest
//! [`bus::ChangeBus::publish`]: crate::bus::ChangeBus::publish

pub mod command;
pub mod link;

pub use link::{BrokerLink, ConnectionState, LinkError, LinkStatus};
