//! The shared topic/value table.

use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::decode;
use crate::bus::ChangeEvent;

/// Thread-safe mapping from topic to the last seen value.
///
/// All mutation for one inbound message happens inside a single write-lock
/// scope, so a snapshot reader never observes a partially-decomposed
/// composite. The lock only guards in-memory work; no I/O and no rendering
/// happen while it is held.
#[derive(Debug, Default)]
pub struct StateStore {
    entries: RwLock<HashMap<String, String>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an inbound message and returns the change event to broadcast.
    ///
    /// `innen` and `send_settings` payloads are decomposed per the device's
    /// composite encodings; anything that does not match its expected shape
    /// is stored verbatim under the original topic instead of being dropped.
    pub async fn ingest(&self, topic: &str, raw: &str) -> ChangeEvent {
        let mut entries = self.entries.write().await;
        match topic {
            decode::TOPIC_INDOOR => match decode::split_indoor(raw) {
                Some(reading) => {
                    entries.insert(
                        decode::KEY_INDOOR_TEMPERATURE.to_string(),
                        reading.temperature,
                    );
                    entries.insert(decode::KEY_INDOOR_HUMIDITY.to_string(), reading.humidity);
                    entries.insert(decode::KEY_INDOOR_PRESSURE.to_string(), reading.pressure);
                    // The composite key is superseded by its derived fields.
                    entries.remove(decode::TOPIC_INDOOR);
                    debug!(payload = raw, "decomposed indoor reading");
                    ChangeEvent::update(topic, raw)
                }
                None => {
                    warn!(
                        payload = raw,
                        "indoor payload did not split into three fields, storing verbatim"
                    );
                    entries.insert(topic.to_string(), raw.to_string());
                    ChangeEvent::update(topic, raw)
                }
            },
            decode::TOPIC_SETTINGS => {
                // The raw blob is always retained for audit visibility, even
                // when decomposition succeeds.
                entries.insert(decode::KEY_SETTINGS_RAW.to_string(), raw.to_string());
                match decode::parse_settings(raw) {
                    Some(pairs) => {
                        let count = pairs.len();
                        for (key, value) in pairs {
                            entries.insert(key, value);
                        }
                        debug!(count, "decomposed settings payload");
                        ChangeEvent::update(topic, decode::SETTINGS_UPDATED_MARKER)
                    }
                    None => {
                        warn!(
                            payload = raw,
                            "settings payload is not a JSON object, storing verbatim"
                        );
                        entries.insert(topic.to_string(), raw.to_string());
                        ChangeEvent::update(topic, raw)
                    }
                }
            }
            _ => {
                entries.insert(topic.to_string(), raw.to_string());
                ChangeEvent::update(topic, raw)
            }
        }
    }

    /// Point-in-time copy of the whole table, safe to iterate without any
    /// lock held.
    pub async fn snapshot(&self) -> HashMap<String, String> {
        self.entries.read().await.clone()
    }
}
