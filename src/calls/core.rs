use std::collections::{HashMap, HashSet};

use blake3::Hash;
use serde::Serialize;

use crate::error::{CommandOutcome, Result, SessionError};
use crate::logging::{LogLevel, Logger, emit, json_str};
use crate::presence::{RoomId, UserId};
use crate::time::Timestamp;

use super::links::{LinkBuilder, fallback_join_url};

const TARGET: &str = "room_session::calls";

/// Live call metadata for one room, as seen by the local client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCall {
    pub room_id: RoomId,
    pub started_at: Timestamp,
    participants: Vec<UserId>,
    pub is_minimized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shareable_link: Option<String>,
    #[serde(skip)]
    roster_hash: Hash,
}

impl ActiveCall {
    fn new(room_id: &str, participants: Vec<UserId>, started_at: Timestamp) -> Self {
        Self {
            room_id: room_id.to_string(),
            started_at,
            roster_hash: roster_fingerprint(&participants),
            participants,
            is_minimized: false,
            shareable_link: None,
        }
    }

    pub fn participants(&self) -> &[UserId] {
        &self.participants
    }

    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    /// Replaces the roster unless it is the same set in another order.
    fn replace_participants(&mut self, participants: Vec<UserId>) -> bool {
        let next_hash = roster_fingerprint(&participants);
        if next_hash == self.roster_hash {
            return false;
        }
        self.participants = participants;
        self.roster_hash = next_hash;
        true
    }
}

/// Order-independent digest of a roster.
fn roster_fingerprint(participants: &[UserId]) -> Hash {
    let mut sorted: Vec<&str> = participants.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let mut hasher = blake3::Hasher::new();
    for id in sorted {
        hasher.update(&(id.len() as u64).to_le_bytes());
        hasher.update(id.as_bytes());
    }
    hasher.finalize()
}

fn validate_room(room_id: &str) -> Result<()> {
    if room_id.trim().is_empty() {
        return Err(SessionError::InvalidRoomId);
    }
    Ok(())
}

fn validate_roster(room_id: &str, participants: &[UserId]) -> Result<()> {
    let mut seen = HashSet::with_capacity(participants.len());
    for user_id in participants {
        if user_id.trim().is_empty() {
            return Err(SessionError::InvalidUserId);
        }
        if !seen.insert(user_id.as_str()) {
            return Err(SessionError::DuplicateParticipant {
                room_id: room_id.to_string(),
                user_id: user_id.clone(),
            });
        }
    }
    Ok(())
}

/// At most one [`ActiveCall`] per room plus the foreground-call pointer.
///
/// Commands validate before touching anything, so an `Err` always leaves the
/// registry exactly as it was.
pub struct CallRegistry {
    calls: HashMap<RoomId, ActiveCall>,
    current: Option<RoomId>,
    links: Box<dyn LinkBuilder>,
    fallback_base: String,
    logger: Option<Logger>,
}

impl CallRegistry {
    pub fn new<L>(links: L, fallback_base: impl Into<String>) -> Self
    where
        L: LinkBuilder + 'static,
    {
        Self {
            calls: HashMap::new(),
            current: None,
            links: Box::new(links),
            fallback_base: fallback_base.into(),
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: Option<Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Swaps the link collaborator. Calls and their cached links are kept.
    pub fn replace_links<L>(&mut self, links: L)
    where
        L: LinkBuilder + 'static,
    {
        self.links = Box::new(links);
    }

    /// Creates the call and makes it current. A second start for the same room
    /// changes nothing, `started_at` included.
    pub fn start_call(
        &mut self,
        room_id: &str,
        participants: &[UserId],
        now: Timestamp,
    ) -> Result<CommandOutcome> {
        validate_room(room_id)?;
        if self.calls.contains_key(room_id) {
            return Ok(CommandOutcome::Unchanged);
        }
        validate_roster(room_id, participants)?;

        self.calls.insert(
            room_id.to_string(),
            ActiveCall::new(room_id, participants.to_vec(), now),
        );
        self.current = Some(room_id.to_string());
        Ok(CommandOutcome::Applied)
    }

    pub fn end_call(&mut self, room_id: &str) -> Result<CommandOutcome> {
        if self.calls.remove(room_id).is_none() {
            return Ok(CommandOutcome::Unchanged);
        }
        if self.current.as_deref() == Some(room_id) {
            self.current = None;
        }
        Ok(CommandOutcome::Applied)
    }

    pub fn update_participants(
        &mut self,
        room_id: &str,
        participants: &[UserId],
    ) -> Result<CommandOutcome> {
        if !self.calls.contains_key(room_id) {
            return Ok(CommandOutcome::Unchanged);
        }
        validate_roster(room_id, participants)?;
        let changed = self
            .calls
            .get_mut(room_id)
            .map(|call| call.replace_participants(participants.to_vec()))
            .unwrap_or(false);
        Ok(CommandOutcome::from_changed(changed))
    }

    pub fn add_participant(&mut self, room_id: &str, user_id: &str) -> Result<CommandOutcome> {
        let Some(call) = self.calls.get(room_id) else {
            return Ok(CommandOutcome::Unchanged);
        };
        if call.has_participant(user_id) {
            return Ok(CommandOutcome::Unchanged);
        }
        let mut roster = call.participants.clone();
        roster.push(user_id.to_string());
        self.update_participants(room_id, &roster)
    }

    pub fn remove_participant(&mut self, room_id: &str, user_id: &str) -> Result<CommandOutcome> {
        let Some(call) = self.calls.get(room_id) else {
            return Ok(CommandOutcome::Unchanged);
        };
        let roster: Vec<UserId> = call
            .participants
            .iter()
            .filter(|p| *p != user_id)
            .cloned()
            .collect();
        self.update_participants(room_id, &roster)
    }

    pub fn set_minimized(&mut self, room_id: &str, minimized: bool) -> Result<CommandOutcome> {
        match self.calls.get_mut(room_id) {
            Some(call) if call.is_minimized != minimized => {
                call.is_minimized = minimized;
                Ok(CommandOutcome::Applied)
            }
            _ => Ok(CommandOutcome::Unchanged),
        }
    }

    /// Moves the foreground pointer without checking that the room has a call.
    /// [`CallRegistry::current`] yields `None` for a dangling pointer.
    pub fn set_current(&mut self, room_id: Option<&str>) -> CommandOutcome {
        if self.current.as_deref() == room_id {
            return CommandOutcome::Unchanged;
        }
        self.current = room_id.map(str::to_string);
        CommandOutcome::Applied
    }

    pub fn current(&self) -> Option<&ActiveCall> {
        self.current.as_deref().and_then(|room| self.calls.get(room))
    }

    pub fn current_room_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Builds the join link and caches it on the call when one exists.
    ///
    /// A failing builder is logged and replaced by a locally constructed link,
    /// so this always returns something shareable.
    pub fn generate_shareable_link(&mut self, room_id: &str) -> String {
        let link = match self.links.build_join_call_url(room_id) {
            Ok(link) => link,
            Err(err) => {
                emit(
                    self.logger.as_ref(),
                    LogLevel::Warn,
                    TARGET,
                    "link_builder_failed",
                    [json_str("room_id", room_id), json_str("error", err.to_string())],
                );
                fallback_join_url(&self.fallback_base, room_id)
            }
        };
        if let Some(call) = self.calls.get_mut(room_id) {
            call.shareable_link = Some(link.clone());
        }
        link
    }

    pub fn get(&self, room_id: &str) -> Option<&ActiveCall> {
        self.calls.get(room_id)
    }

    pub fn has_call(&self, room_id: &str) -> bool {
        self.calls.contains_key(room_id)
    }

    pub fn calls(&self) -> impl Iterator<Item = &ActiveCall> {
        self.calls.values()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calls::BaseUrlLinkBuilder;
    use crate::logging::MemorySink;

    fn registry() -> CallRegistry {
        CallRegistry::new(BaseUrlLinkBuilder::new("https://chat.example/join"), "https://fallback")
    }

    fn roster(ids: &[&str]) -> Vec<UserId> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn start_is_idempotent() {
        let mut calls = registry();
        assert_eq!(
            calls.start_call("r1", &roster(&["u1"]), 1_000).unwrap(),
            CommandOutcome::Applied
        );
        assert_eq!(
            calls.start_call("r1", &roster(&["u1", "u2"]), 9_000).unwrap(),
            CommandOutcome::Unchanged
        );
        assert_eq!(calls.len(), 1);
        let call = calls.current().unwrap();
        assert_eq!(call.started_at, 1_000);
        assert_eq!(call.participants(), roster(&["u1"]).as_slice());
        assert!(!call.is_minimized);
    }

    #[test]
    fn end_clears_current_pointer() {
        let mut calls = registry();
        calls.start_call("r1", &roster(&["u1"]), 0).unwrap();
        calls.start_call("r2", &roster(&["u1"]), 0).unwrap();
        assert_eq!(calls.current_room_id(), Some("r2"));

        calls.end_call("r1").unwrap();
        assert_eq!(calls.current_room_id(), Some("r2"));
        calls.end_call("r2").unwrap();
        assert!(calls.current().is_none());
        assert_eq!(calls.end_call("r2").unwrap(), CommandOutcome::Unchanged);
    }

    #[test]
    fn permuted_roster_is_not_an_update() {
        let mut calls = registry();
        calls.start_call("r1", &roster(&["u1"]), 0).unwrap();
        assert!(calls.update_participants("r1", &roster(&["u1", "u2"])).unwrap().is_applied());
        let before = calls.get("r1").cloned();
        assert_eq!(
            calls.update_participants("r1", &roster(&["u2", "u1"])).unwrap(),
            CommandOutcome::Unchanged
        );
        assert_eq!(calls.get("r1").cloned(), before);
    }

    #[test]
    fn update_for_unknown_room_is_noop() {
        let mut calls = registry();
        assert_eq!(
            calls.update_participants("nowhere", &roster(&["u1"])).unwrap(),
            CommandOutcome::Unchanged
        );
        assert_eq!(calls.set_minimized("nowhere", true).unwrap(), CommandOutcome::Unchanged);
    }

    #[test]
    fn invalid_rosters_leave_state_untouched() {
        let mut calls = registry();
        assert!(matches!(
            calls.start_call("", &roster(&["u1"]), 0),
            Err(SessionError::InvalidRoomId)
        ));
        assert!(matches!(
            calls.start_call("r1", &roster(&["u1", "u1"]), 0),
            Err(SessionError::DuplicateParticipant { .. })
        ));
        assert!(calls.is_empty());
        assert!(calls.current().is_none());

        calls.start_call("r1", &roster(&["u1"]), 0).unwrap();
        assert!(calls.update_participants("r1", &roster(&["u2", "u2"])).is_err());
        assert!(calls.update_participants("r1", &roster(&["u2", " "])).is_err());
        assert_eq!(calls.get("r1").unwrap().participants(), roster(&["u1"]).as_slice());
    }

    #[test]
    fn join_and_leave_helpers() {
        let mut calls = registry();
        calls.start_call("r1", &roster(&["u1"]), 0).unwrap();
        assert!(calls.add_participant("r1", "u2").unwrap().is_applied());
        assert!(!calls.add_participant("r1", "u2").unwrap().is_applied());
        assert!(calls.remove_participant("r1", "u1").unwrap().is_applied());
        assert_eq!(calls.get("r1").unwrap().participants(), roster(&["u2"]).as_slice());
        assert!(!calls.remove_participant("r1", "ghost").unwrap().is_applied());
    }

    #[test]
    fn minimize_toggles() {
        let mut calls = registry();
        calls.start_call("r1", &[], 0).unwrap();
        assert!(calls.set_minimized("r1", true).unwrap().is_applied());
        assert!(!calls.set_minimized("r1", true).unwrap().is_applied());
        assert!(calls.current().unwrap().is_minimized);
        assert!(calls.set_minimized("r1", false).unwrap().is_applied());
    }

    #[test]
    fn dangling_current_degrades_to_none() {
        let mut calls = registry();
        assert!(calls.set_current(Some("ghost")).is_applied());
        assert_eq!(calls.current_room_id(), Some("ghost"));
        assert!(calls.current().is_none());
        assert!(!calls.set_current(Some("ghost")).is_applied());
    }

    #[test]
    fn shareable_link_is_cached_on_existing_call() {
        let mut calls = registry();
        let early = calls.generate_shareable_link("r1");
        assert_eq!(early, "https://chat.example/join/r1?call=1");

        calls.start_call("r1", &roster(&["u1"]), 0).unwrap();
        let link = calls.generate_shareable_link("r1");
        assert_eq!(calls.get("r1").unwrap().shareable_link.as_deref(), Some(link.as_str()));
    }

    #[test]
    fn failing_builder_falls_back_and_logs() {
        let sink = MemorySink::new();
        let failing = |_: &str| -> Result<String> { Err(SessionError::LinkBuilder("offline".into())) };
        let mut calls = CallRegistry::new(failing, "https://fallback/join")
            .with_logger(Some(Logger::new(sink.clone())));
        calls.start_call("r 1", &roster(&["u1"]), 0).unwrap();

        let link = calls.generate_shareable_link("r 1");
        assert_eq!(link, "https://fallback/join/r%201");
        assert_eq!(calls.get("r 1").unwrap().shareable_link.as_deref(), Some(link.as_str()));
        assert_eq!(sink.messages(), vec!["link_builder_failed".to_string()]);
    }

    #[test]
    fn serializes_without_internal_fingerprint() {
        let mut calls = registry();
        calls.start_call("r1", &roster(&["u1"]), 7).unwrap();
        let value = serde_json::to_value(calls.get("r1").unwrap()).unwrap();
        assert_eq!(value["roomId"], "r1");
        assert_eq!(value["startedAt"], 7);
        assert_eq!(value["participants"][0], "u1");
        assert!(value.get("rosterHash").is_none());
    }
}
