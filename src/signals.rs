//! Inbound events from the messaging layer.
//!
//! The messaging transport decodes peer traffic into [`SignalEvent`]s and hands
//! them to [`crate::SessionStore::handle_signal`]. Delivery is best effort; the
//! store tolerates duplicates and events about things it already forgot.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::invitations::CallInvitation;
use crate::presence::{RoomId, UserId};
use crate::time::Timestamp;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum SignalEvent {
    /// A peer is ringing us.
    Ring {
        id: String,
        room_id: RoomId,
        from_user_id: UserId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_user_name: Option<String>,
        created_at: Timestamp,
    },
    /// The invitation was accepted on another device or by the callee.
    Accepted { id: String },
    Rejected { id: String },
    /// Presence heartbeat. `at` defaults to the local receive time.
    Heartbeat {
        room_id: RoomId,
        user_id: UserId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        at: Option<Timestamp>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_in_call: Option<bool>,
    },
    /// A user disconnected from a room.
    Left { room_id: RoomId, user_id: UserId },
    /// Authoritative participant list for a room's call.
    Roster {
        room_id: RoomId,
        participants: Vec<UserId>,
    },
}

impl SignalEvent {
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SignalEvent::Ring { .. } => "ring",
            SignalEvent::Accepted { .. } => "accepted",
            SignalEvent::Rejected { .. } => "rejected",
            SignalEvent::Heartbeat { .. } => "heartbeat",
            SignalEvent::Left { .. } => "left",
            SignalEvent::Roster { .. } => "roster",
        }
    }

    /// Builds the invitation a `ring` stands for.
    pub fn invitation(&self) -> Option<CallInvitation> {
        match self {
            SignalEvent::Ring {
                id,
                room_id,
                from_user_id,
                from_user_name,
                created_at,
            } => {
                let mut invitation =
                    CallInvitation::new(id.clone(), room_id.clone(), from_user_id.clone(), *created_at);
                invitation.from_user_name = from_user_name.clone();
                Some(invitation)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionError;

    #[test]
    fn parses_ring_payload() {
        let event = SignalEvent::parse(
            r#"{"type":"ring","id":"i1","roomId":"r1","fromUserId":"u1","createdAt":5}"#,
        )
        .unwrap();
        assert_eq!(event.kind(), "ring");
        let invitation = event.invitation().unwrap();
        assert_eq!(invitation.room_id, "r1");
        assert_eq!(invitation.from_user_name, None);
        assert_eq!(invitation.created_at, 5);
    }

    #[test]
    fn parses_heartbeat_with_optional_fields() {
        let event =
            SignalEvent::parse(r#"{"type":"heartbeat","roomId":"r1","userId":"u2","isInCall":true}"#)
                .unwrap();
        assert_eq!(
            event,
            SignalEvent::Heartbeat {
                room_id: "r1".into(),
                user_id: "u2".into(),
                at: None,
                is_in_call: Some(true),
            }
        );
        assert!(event.invitation().is_none());
    }

    #[test]
    fn unknown_type_is_a_serde_error() {
        let err = SignalEvent::parse(r#"{"type":"offer","sdp":"..."}"#).unwrap_err();
        assert!(matches!(err, SessionError::Serde(_)));
    }
}
