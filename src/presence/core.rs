use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::time::{Timestamp, duration_ms, elapsed_ms};

pub type RoomId = String;
pub type UserId = String;

/// Evidence that a user is connected to a room, refreshed by heartbeats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPresence {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub joined_at: Timestamp,
    pub last_heartbeat: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_in_call: Option<bool>,
}

impl RoomPresence {
    pub fn new(room_id: impl Into<RoomId>, user_id: impl Into<UserId>, now: Timestamp) -> Self {
        Self {
            room_id: room_id.into(),
            user_id: user_id.into(),
            joined_at: now,
            last_heartbeat: now,
            is_in_call: None,
        }
    }

    pub fn with_in_call(mut self, in_call: bool) -> Self {
        self.is_in_call = Some(in_call);
        self
    }

    pub fn is_stale(&self, now: Timestamp, timeout: Duration) -> bool {
        elapsed_ms(now, self.last_heartbeat) >= duration_ms(timeout)
    }
}

/// Per-room presence lists plus the local client's own presence.
///
/// Each room holds at most one record per user; list order is join order and
/// survives upserts of existing users.
#[derive(Debug, Default, Clone)]
pub struct PresenceLedger {
    rooms: HashMap<RoomId, Vec<RoomPresence>>,
    mine: HashMap<RoomId, RoomPresence>,
}

impl PresenceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole list for a room. Later duplicates overwrite earlier
    /// ones in place.
    pub fn set_room_presence(&mut self, room_id: &str, list: Vec<RoomPresence>) -> bool {
        let mut deduped: Vec<RoomPresence> = Vec::with_capacity(list.len());
        for mut record in list {
            record.room_id = room_id.to_string();
            match deduped.iter_mut().find(|r| r.user_id == record.user_id) {
                Some(slot) => *slot = record,
                None => deduped.push(record),
            }
        }

        let current = self.rooms.get(room_id).map(Vec::as_slice).unwrap_or(&[]);
        if current == deduped.as_slice() {
            return false;
        }
        if deduped.is_empty() {
            self.rooms.remove(room_id);
        } else {
            self.rooms.insert(room_id.to_string(), deduped);
        }
        true
    }

    pub fn upsert_presence(&mut self, room_id: &str, mut record: RoomPresence) -> bool {
        record.room_id = room_id.to_string();
        let list = self.rooms.entry(room_id.to_string()).or_default();
        match list.iter_mut().find(|r| r.user_id == record.user_id) {
            Some(existing) if *existing == record => false,
            Some(existing) => {
                *existing = record;
                true
            }
            None => {
                list.push(record);
                true
            }
        }
    }

    /// Refreshes a user's heartbeat, inserting a fresh record on first sight.
    pub fn heartbeat(
        &mut self,
        room_id: &str,
        user_id: &str,
        now: Timestamp,
        is_in_call: Option<bool>,
    ) -> bool {
        let existing = self
            .rooms
            .get(room_id)
            .and_then(|list| list.iter().find(|r| r.user_id == user_id));

        let record = match existing {
            Some(current) => RoomPresence {
                last_heartbeat: now.max(current.last_heartbeat),
                is_in_call: is_in_call.or(current.is_in_call),
                ..current.clone()
            },
            None => RoomPresence {
                is_in_call,
                ..RoomPresence::new(room_id, user_id, now)
            },
        };
        self.upsert_presence(room_id, record)
    }

    pub fn remove_presence(&mut self, room_id: &str, user_id: &str) -> bool {
        let Some(list) = self.rooms.get_mut(room_id) else {
            return false;
        };
        let before = list.len();
        list.retain(|r| r.user_id != user_id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.rooms.remove(room_id);
        }
        removed
    }

    /// Drops every record whose last heartbeat is at least `timeout` old.
    ///
    /// Returns the number of records pruned. Running it twice in a row is
    /// harmless: the second pass finds nothing.
    pub fn sweep_expired(&mut self, now: Timestamp, timeout: Duration) -> usize {
        let mut pruned = 0;
        for list in self.rooms.values_mut() {
            let before = list.len();
            list.retain(|r| !r.is_stale(now, timeout));
            pruned += before - list.len();
        }
        self.rooms.retain(|_, list| !list.is_empty());
        pruned
    }

    pub fn presence(&self, room_id: &str) -> &[RoomPresence] {
        self.rooms.get(room_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count_present(&self, room_id: &str) -> usize {
        self.presence(room_id).len()
    }

    pub fn is_active(&self, room_id: &str) -> bool {
        self.count_present(room_id) > 0
    }

    pub fn participants_in_call(&self, room_id: &str) -> Vec<&str> {
        self.presence(room_id)
            .iter()
            .filter(|r| r.is_in_call == Some(true))
            .map(|r| r.user_id.as_str())
            .collect()
    }

    pub fn active_rooms(&self) -> impl Iterator<Item = &str> {
        self.rooms.keys().map(String::as_str)
    }

    pub fn set_my_presence(&mut self, record: RoomPresence) -> bool {
        if self.mine.get(&record.room_id) == Some(&record) {
            return false;
        }
        self.mine.insert(record.room_id.clone(), record);
        true
    }

    pub fn clear_my_presence(&mut self, room_id: &str) -> bool {
        self.mine.remove(room_id).is_some()
    }

    pub fn my_presence(&self, room_id: &str) -> Option<&RoomPresence> {
        self.mine.get(room_id)
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty() && self.mine.is_empty()
    }

    pub fn clear(&mut self) {
        self.rooms.clear();
        self.mine.clear();
    }
}
