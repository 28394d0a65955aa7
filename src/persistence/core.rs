use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::ids::IdentifierSet;

const SEEN_KEY: &str = "seenNotifications";
const DISMISSED_KEY: &str = "dismissedNotifications";
const ACTIVE_CALL_ROOMS_KEY: &str = "activeCallRooms";
const BLINKING_ROOMS_KEY: &str = "blinkingRooms";

/// The parts of a session that survive a reload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DurableState {
    pub seen_notifications: IdentifierSet,
    pub dismissed_notifications: IdentifierSet,
    pub active_call_rooms: IdentifierSet,
    pub blinking_rooms: IdentifierSet,
}

/// On-disk envelope: `{ "version": n, "state": { .. } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub version: u32,
    pub state: PersistedState,
}

/// Persisted state. The live collections (`roomPresence`, `myPresence`,
/// `pendingInvitations`) are always written empty so a reload never resumes
/// stale presence, calls or rings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub seen_notifications: IdentifierSet,
    pub dismissed_notifications: IdentifierSet,
    pub active_call_rooms: IdentifierSet,
    pub blinking_rooms: IdentifierSet,
    pub room_presence: Map<String, Value>,
    pub my_presence: Map<String, Value>,
    pub pending_invitations: Vec<Value>,
}

impl PersistedSession {
    pub fn capture(version: u32, durable: &DurableState) -> Self {
        Self {
            version,
            state: PersistedState {
                seen_notifications: durable.seen_notifications.clone(),
                dismissed_notifications: durable.dismissed_notifications.clone(),
                active_call_rooms: durable.active_call_rooms.clone(),
                blinking_rooms: durable.blinking_rooms.clone(),
                ..PersistedState::default()
            },
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Outcome of reading a persisted blob.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rehydration {
    pub state: DurableState,
    pub version: Option<u32>,
    /// Human-readable notes about values that were coerced to defaults.
    pub issues: Vec<String>,
}

/// Rebuilds durable state from a stored blob without ever failing.
///
/// Unparsable JSON, a missing `state` object or a key holding something other
/// than an array all degrade to empty sets. A flat blob without the `state`
/// wrapper is read as the state object itself.
pub fn rehydrate(raw: &str) -> Rehydration {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => rehydrate_value(&value),
        Err(err) => Rehydration {
            issues: vec![format!("unparsable snapshot: {err}")],
            ..Rehydration::default()
        },
    }
}

pub fn rehydrate_value(value: &Value) -> Rehydration {
    let mut issues = Vec::new();
    let Some(root) = value.as_object() else {
        return Rehydration {
            issues: vec!["snapshot is not an object".to_string()],
            ..Rehydration::default()
        };
    };

    let version = root
        .get("version")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok());

    let state = match root.get("state") {
        Some(Value::Object(state)) => state,
        Some(_) => {
            issues.push("`state` is not an object".to_string());
            return Rehydration {
                version,
                issues,
                ..Rehydration::default()
            };
        }
        None => root,
    };

    let mut read_set = |key: &str| {
        let raw = state.get(key);
        match raw {
            None | Some(Value::Array(_)) => {}
            Some(_) => issues.push(format!("`{key}` is not an array")),
        }
        IdentifierSet::from_json_lenient(raw)
    };

    let durable = DurableState {
        seen_notifications: read_set(SEEN_KEY),
        dismissed_notifications: read_set(DISMISSED_KEY),
        active_call_rooms: read_set(ACTIVE_CALL_ROOMS_KEY),
        blinking_rooms: read_set(BLINKING_ROOMS_KEY),
    };

    Rehydration {
        state: durable,
        version,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn durable() -> DurableState {
        DurableState {
            seen_notifications: ["i1", "i2"].into_iter().collect(),
            dismissed_notifications: ["i3"].into_iter().collect(),
            active_call_rooms: ["r1"].into_iter().collect(),
            blinking_rooms: ["r2"].into_iter().collect(),
        }
    }

    #[test]
    fn snapshot_matches_schema_with_empty_live_collections() {
        let blob = PersistedSession::capture(1, &durable()).to_json().unwrap();
        let value: Value = serde_json::from_str(&blob).unwrap();
        assert_eq!(
            value,
            json!({
                "version": 1,
                "state": {
                    "seenNotifications": ["i1", "i2"],
                    "dismissedNotifications": ["i3"],
                    "activeCallRooms": ["r1"],
                    "blinkingRooms": ["r2"],
                    "roomPresence": {},
                    "myPresence": {},
                    "pendingInvitations": []
                }
            })
        );
    }

    #[test]
    fn rehydrate_restores_sets() {
        let blob = PersistedSession::capture(1, &durable()).to_json().unwrap();
        let restored = rehydrate(&blob);
        assert_eq!(restored.state, durable());
        assert_eq!(restored.version, Some(1));
        assert!(restored.issues.is_empty());
    }

    #[test]
    fn missing_keys_default_to_empty() {
        let restored = rehydrate(r#"{"version":1,"state":{"dismissedNotifications":["i9"]}}"#);
        assert!(restored.state.seen_notifications.is_empty());
        assert!(!restored.state.seen_notifications.contains("i9"));
        assert!(restored.state.dismissed_notifications.contains("i9"));
        assert!(restored.issues.is_empty());
    }

    #[test]
    fn wrong_shapes_are_coerced_and_reported() {
        let restored = rehydrate_value(&json!({
            "version": 3,
            "state": {
                "seenNotifications": {"i1": true},
                "blinkingRooms": "r1",
                "activeCallRooms": ["r1", 5]
            }
        }));
        assert!(restored.state.seen_notifications.is_empty());
        assert!(restored.state.blinking_rooms.is_empty());
        assert_eq!(restored.state.active_call_rooms.to_vec(), vec!["r1".to_string()]);
        assert_eq!(restored.version, Some(3));
        assert_eq!(restored.issues.len(), 2);
    }

    #[test]
    fn live_collections_in_blob_are_ignored() {
        let restored = rehydrate_value(&json!({
            "version": 1,
            "state": {
                "roomPresence": {"r1": [{"userId": "u1"}]},
                "pendingInvitations": [{"id": "i1"}]
            }
        }));
        assert_eq!(restored.state, DurableState::default());
    }

    #[test]
    fn garbage_never_fails() {
        assert_eq!(rehydrate("not json").state, DurableState::default());
        assert_eq!(rehydrate("[1,2]").state, DurableState::default());
        assert_eq!(rehydrate(r#"{"state": 7}"#).state, DurableState::default());
        assert!(!rehydrate("").issues.is_empty());
    }

    #[test]
    fn legacy_flat_blob_is_accepted() {
        let restored = rehydrate(r#"{"seenNotifications":["old"]}"#);
        assert!(restored.state.seen_notifications.contains("old"));
        assert_eq!(restored.version, None);
    }
}
