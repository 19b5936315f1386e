//! # OpenDash
//!
//! Bridges an MQTT telemetry feed from an embedded device to web clients.
//!
//! The bridge keeps one persistent connection to the broker, tracks the
//! latest known value per topic, decomposes a few composite payloads into
//! their logical fields, and fans state changes out to any number of
//! independent server-push consumers. A thin HTTP gateway renders the state
//! table and forwards configuration commands back to the device.
//!
//! ```text
//! Broker ──► broker::BrokerLink ──► state::StateStore ──► bus::ChangeBus
//!                    ▲                      │                    │
//!                    └── publish ── gateway (HTTP/SSE) ◄─────────┘
//! ```

pub mod broker;
pub mod bus;
pub mod config;
pub mod gateway;
pub mod state;
