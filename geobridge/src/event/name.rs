//! Outbound event names and payloads.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Payload key carrying the triggering region identifier.
pub const IDENTIFIER_KEY: &str = "identifier";

/// Names of the events emitted to the runtime's event bus.
///
/// The string forms are a stable wire contract with the application layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    #[serde(rename = "ENTER_GEOFENCE")]
    EnterGeofence,
    #[serde(rename = "EXIT_GEOFENCE")]
    ExitGeofence,
    #[serde(rename = "DEVICE_BOOT_COMPLETED")]
    DeviceBootCompleted,
}

impl EventName {
    /// All event names, in export order.
    pub const ALL: [EventName; 3] = [
        EventName::EnterGeofence,
        EventName::ExitGeofence,
        EventName::DeviceBootCompleted,
    ];

    /// Wire name of the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::EnterGeofence => "ENTER_GEOFENCE",
            EventName::ExitGeofence => "EXIT_GEOFENCE",
            EventName::DeviceBootCompleted => "DEVICE_BOOT_COMPLETED",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Constant table exported to the application layer so it can subscribe by
/// name without hard-coding the wire strings.
pub fn constants() -> BTreeMap<&'static str, &'static str> {
    EventName::ALL
        .iter()
        .map(|name| (name.as_str(), name.as_str()))
        .collect()
}

/// String map attached to an emitted event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventPayload(BTreeMap<String, String>);

impl EventPayload {
    /// Payload for a transition event: `{"identifier": <id>}`.
    pub fn identifier(identifier: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(IDENTIFIER_KEY.to_string(), identifier.into());
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An event as it left the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmittedEvent {
    #[serde(rename = "eventName")]
    pub name: EventName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<EventPayload>,
}

impl EmittedEvent {
    pub fn new(name: EventName, payload: Option<EventPayload>) -> Self {
        Self { name, payload }
    }

    /// The region identifier carried by a transition event.
    pub fn identifier(&self) -> Option<&str> {
        self.payload.as_ref().and_then(|p| p.get(IDENTIFIER_KEY))
    }
}
