//! Latest-known-state tracking for the telemetry feed.
//!
//! [`StateStore`] is the single source of truth for the most recent value
//! per topic. Most topics are stored verbatim; two composite encodings are
//! decomposed at ingestion time:
//!
//! - `innen` carries a dash-delimited indoor reading that expands into
//!   `indoor/temperature`, `indoor/humidity` and `indoor/pressure`
//! - `send_settings` carries a JSON object of device settings that expands
//!   into one `setting_<name>` entry per key
//!
//! Decomposition is atomic with respect to snapshot readers and always falls
//! back to verbatim storage when a payload does not match its expected
//! shape. An inbound message is never discarded for being malformed.

pub mod decode;
pub mod store;

pub use store::StateStore;
