//! Watch wire types shared with the orchestrator's event stream.

use serde::{Deserialize, Serialize};

/// Watch event type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WatchEventType {
    Added,
    Modified,
    Deleted,
    Bookmark,
    Error,
}

/// A single event from a watch stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchEvent<T> {
    #[serde(rename = "type")]
    pub event_type: WatchEventType,
    pub object: T,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_wire_format() {
        let json = serde_json::to_string(&WatchEventType::Added).unwrap();
        assert_eq!(json, "\"ADDED\"");

        let parsed: WatchEventType = serde_json::from_str("\"MODIFIED\"").unwrap();
        assert_eq!(parsed, WatchEventType::Modified);
    }

    #[test]
    fn test_watch_event_roundtrip() {
        let raw = r#"{"type":"ERROR","object":{"code":410,"reason":"Expired"}}"#;
        let event: WatchEvent<serde_json::Value> = serde_json::from_str(raw).unwrap();
        assert_eq!(event.event_type, WatchEventType::Error);
        assert_eq!(event.object["code"], 410);
    }
}
