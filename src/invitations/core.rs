use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ids::IdentifierSet;
use crate::time::{Timestamp, duration_ms, elapsed_ms};

pub type InvitationId = String;

/// Invitations ring for this long before any consumer treats them as expired.
pub const DEFAULT_INVITATION_TTL: Duration = Duration::from_secs(45);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
    Expired,
}

impl InvitationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, InvitationStatus::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallInvitation {
    pub id: InvitationId,
    pub room_id: String,
    pub from_user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_user_name: Option<String>,
    pub created_at: Timestamp,
    #[serde(default)]
    pub status: InvitationStatus,
    #[serde(default)]
    pub seen: bool,
    #[serde(default)]
    pub dismissed: bool,
}

impl CallInvitation {
    pub fn new(
        id: impl Into<InvitationId>,
        room_id: impl Into<String>,
        from_user_id: impl Into<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            room_id: room_id.into(),
            from_user_id: from_user_id.into(),
            from_user_name: None,
            created_at,
            status: InvitationStatus::Pending,
            seen: false,
            dismissed: false,
        }
    }

    pub fn with_from_user_name(mut self, name: impl Into<String>) -> Self {
        self.from_user_name = Some(name.into());
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == InvitationStatus::Pending
    }

    /// A pending invitation is expired once `ttl` has elapsed since creation,
    /// whether or not a sweep has removed it yet.
    pub fn is_expired(&self, now: Timestamp, ttl: Duration) -> bool {
        self.is_pending() && elapsed_ms(now, self.created_at) >= duration_ms(ttl)
    }

    pub fn effective_status(&self, now: Timestamp, ttl: Duration) -> InvitationStatus {
        if self.is_expired(now, ttl) {
            InvitationStatus::Expired
        } else {
            self.status
        }
    }
}

/// Partial update merged by [`InvitationManager::update_invitation`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvitationPatch {
    pub status: Option<InvitationStatus>,
    pub from_user_name: Option<String>,
    pub seen: Option<bool>,
    pub dismissed: Option<bool>,
}

impl InvitationPatch {
    pub fn status(status: InvitationStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Outstanding call invitations plus seen/dismissed bookkeeping.
///
/// Every mutator tolerates unknown ids: a remote reject that lands after the
/// local sweep already dropped the invitation simply changes nothing.
#[derive(Debug, Default, Clone)]
pub struct InvitationManager {
    invitations: Vec<CallInvitation>,
    seen: IdentifierSet,
    dismissed: IdentifierSet,
}

impl InvitationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a ring as `pending`. Re-delivery of a known id is ignored.
    pub fn add_invitation(&mut self, mut invitation: CallInvitation) -> bool {
        if self.get(&invitation.id).is_some() {
            return false;
        }
        invitation.status = InvitationStatus::Pending;
        invitation.seen = self.seen.contains(&invitation.id);
        invitation.dismissed = self.dismissed.contains(&invitation.id);
        self.invitations.push(invitation);
        true
    }

    pub fn update_invitation(&mut self, id: &str, patch: InvitationPatch) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let mut changed = false;

        {
            let invitation = &mut self.invitations[index];
            if let Some(status) = patch.status {
                if !invitation.status.is_terminal() && status != invitation.status {
                    invitation.status = status;
                    changed = true;
                }
            }
            if let Some(name) = patch.from_user_name {
                if invitation.from_user_name.as_deref() != Some(name.as_str()) {
                    invitation.from_user_name = Some(name);
                    changed = true;
                }
            }
        }

        if patch.seen == Some(true) {
            changed |= self.mark_seen(id);
        }
        if patch.dismissed == Some(true) {
            changed |= self.mark_dismissed(id);
        }
        changed
    }

    pub fn accept(&mut self, id: &str) -> bool {
        self.update_invitation(id, InvitationPatch::status(InvitationStatus::Accepted))
    }

    pub fn reject(&mut self, id: &str) -> bool {
        self.update_invitation(id, InvitationPatch::status(InvitationStatus::Rejected))
    }

    pub fn remove_invitation(&mut self, id: &str) -> Option<CallInvitation> {
        self.position(id).map(|index| self.invitations.remove(index))
    }

    /// Removes an invitation only once it reached a terminal status.
    pub fn acknowledge(&mut self, id: &str) -> Option<CallInvitation> {
        match self.get(id) {
            Some(invitation) if invitation.status.is_terminal() => self.remove_invitation(id),
            _ => None,
        }
    }

    /// Drops pending invitations older than `ttl` and returns them.
    pub fn sweep_expired(&mut self, now: Timestamp, ttl: Duration) -> Vec<CallInvitation> {
        let (expired, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.invitations)
            .into_iter()
            .partition(|invitation| invitation.is_expired(now, ttl));
        self.invitations = kept;
        expired
    }

    /// Acknowledges every answered invitation created at least `ttl` ago.
    ///
    /// Pending ones are left to [`InvitationManager::sweep_expired`].
    pub fn collect_answered(&mut self, now: Timestamp, ttl: Duration) -> Vec<CallInvitation> {
        let limit = duration_ms(ttl);
        let (answered, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.invitations)
            .into_iter()
            .partition(|invitation| {
                invitation.status.is_terminal() && elapsed_ms(now, invitation.created_at) >= limit
            });
        self.invitations = kept;
        answered
    }

    pub fn mark_seen(&mut self, id: &str) -> bool {
        let mut changed = self.seen.insert(id);
        if let Some(index) = self.position(id) {
            let invitation = &mut self.invitations[index];
            changed |= !invitation.seen;
            invitation.seen = true;
        }
        changed
    }

    pub fn mark_dismissed(&mut self, id: &str) -> bool {
        let mut changed = self.dismissed.insert(id);
        if let Some(index) = self.position(id) {
            let invitation = &mut self.invitations[index];
            changed |= !invitation.dismissed;
            invitation.dismissed = true;
        }
        changed
    }

    pub fn is_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn is_dismissed(&self, id: &str) -> bool {
        self.dismissed.contains(id)
    }

    /// Pending invitations neither seen nor dismissed, newest first.
    ///
    /// Equal `created_at` values put the later arrival first.
    pub fn unseen_pending(&self) -> Vec<&CallInvitation> {
        let mut unseen: Vec<&CallInvitation> = self
            .invitations
            .iter()
            .rev()
            .filter(|i| i.is_pending() && !self.is_seen(&i.id) && !self.is_dismissed(&i.id))
            .collect();
        unseen.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        unseen
    }

    /// The invitation a ringing notification should show right now.
    pub fn current_invitation(&self, now: Timestamp, ttl: Duration) -> Option<&CallInvitation> {
        self.unseen_pending()
            .into_iter()
            .find(|invitation| !invitation.is_expired(now, ttl))
    }

    pub fn has_unseen_pending_in(&self, room_id: &str) -> bool {
        self.unseen_pending()
            .iter()
            .any(|invitation| invitation.room_id == room_id)
    }

    /// Bulk reset of seen/dismissed history, including the per-record flags.
    pub fn clear_seen_state(&mut self) -> bool {
        let mut changed = !self.seen.is_empty() || !self.dismissed.is_empty();
        self.seen.clear();
        self.dismissed.clear();
        for invitation in &mut self.invitations {
            changed |= invitation.seen || invitation.dismissed;
            invitation.seen = false;
            invitation.dismissed = false;
        }
        changed
    }

    pub(crate) fn restore_seen_state(&mut self, seen: IdentifierSet, dismissed: IdentifierSet) {
        self.seen = seen;
        self.dismissed = dismissed;
        for invitation in &mut self.invitations {
            invitation.seen = self.seen.contains(&invitation.id);
            invitation.dismissed = self.dismissed.contains(&invitation.id);
        }
    }

    pub fn get(&self, id: &str) -> Option<&CallInvitation> {
        self.invitations.iter().find(|invitation| invitation.id == id)
    }

    pub fn invitations(&self) -> &[CallInvitation] {
        &self.invitations
    }

    pub fn seen_ids(&self) -> &IdentifierSet {
        &self.seen
    }

    pub fn dismissed_ids(&self) -> &IdentifierSet {
        &self.dismissed
    }

    pub fn len(&self) -> usize {
        self.invitations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invitations.is_empty()
    }

    /// Forgets every live invitation but keeps seen/dismissed history.
    pub fn clear_invitations(&mut self) {
        self.invitations.clear();
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.invitations.iter().position(|invitation| invitation.id == id)
    }
}
