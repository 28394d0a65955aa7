use std::time::Duration;

use serde_json::{Value, json};

use crate::calls::{ActiveCall, BaseUrlLinkBuilder, CallRegistry, LinkBuilder};
use crate::config::SessionConfig;
use crate::error::{CommandOutcome, Result};
use crate::geometry::Size;
use crate::ids::IdentifierSet;
use crate::invitations::{
    CallInvitation, InvitationId, InvitationManager, InvitationPatch, InvitationStatus,
};
use crate::layout::AdaptiveGrid;
use crate::logging::{LogLevel, emit, json_kv, json_str};
use crate::metrics::{MetricSnapshot, SessionMetrics};
use crate::persistence::{DurableState, PersistedSession, SessionStorage, rehydrate};
use crate::presence::{PresenceLedger, RoomPresence, UserId};
use crate::signals::SignalEvent;
use crate::time::{Timestamp, elapsed_ms, now_ms};

use super::diagnostics::MetricsReporter;
use super::events::{SessionChange, SessionEventBuilder, SessionObserver, SubscriptionId};

const TARGET: &str = "room_session::session";
const PERSIST_TARGET: &str = "room_session::persistence";
const PRESENCE_TARGET: &str = "room_session::presence";
const INVITATIONS_TARGET: &str = "room_session::invitations";

type Details = Vec<(String, Value)>;

/// What one `tick` pruned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub presence_pruned: usize,
    pub invitations_expired: Vec<InvitationId>,
    /// Answered invitations acknowledged once they aged past the TTL.
    pub invitations_collected: Vec<InvitationId>,
}

/// Owned session state: presence, invitations, calls and durable bookkeeping.
///
/// All mutation goes through the command methods. Each applied command
/// notifies observers and writes a durable snapshot to the attached storage.
/// Nothing here panics or propagates collaborator failures; those are logged
/// and the previous state is kept.
pub struct SessionStore {
    config: SessionConfig,
    presence: PresenceLedger,
    invitations: InvitationManager,
    calls: CallRegistry,
    blinking_rooms: IdentifierSet,
    active_call_rooms: IdentifierSet,
    observers: Vec<(SubscriptionId, Box<dyn SessionObserver>)>,
    next_subscription: u64,
    storage: Option<Box<dyn SessionStorage>>,
    reporter: Option<MetricsReporter>,
    started_at: Timestamp,
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        let links = BaseUrlLinkBuilder::new(config.join_base_url.clone());
        let calls = CallRegistry::new(links, config.join_base_url.clone())
            .with_logger(config.logger.clone());
        let started_at = now_ms();
        let reporter = match (&config.logger, config.metrics_handle()) {
            (Some(logger), Some(metrics)) => Some(
                MetricsReporter::new(logger.clone(), metrics, started_at)
                    .with_interval(config.metrics_interval)
                    .with_target(config.metrics_target.clone()),
            ),
            _ => None,
        };

        Self {
            config,
            presence: PresenceLedger::new(),
            invitations: InvitationManager::new(),
            calls,
            blinking_rooms: IdentifierSet::new(),
            active_call_rooms: IdentifierSet::new(),
            observers: Vec::new(),
            next_subscription: 0,
            storage: None,
            reporter,
            started_at,
        }
    }

    /// Builds a store and restores durable state from `storage`.
    ///
    /// Missing, unreadable or malformed snapshots produce a fresh session.
    pub fn load<S>(config: SessionConfig, storage: S) -> Self
    where
        S: SessionStorage + 'static,
    {
        let mut store = Self::new(config);
        match storage.load() {
            Ok(Some(blob)) => {
                let restored = rehydrate(&blob);
                for issue in &restored.issues {
                    store.log(
                        LogLevel::Warn,
                        PERSIST_TARGET,
                        "snapshot_coerced",
                        vec![json_str("issue", issue.as_str())],
                    );
                }
                store.apply_durable(restored.state);
                store.log(
                    LogLevel::Info,
                    PERSIST_TARGET,
                    "session_restored",
                    vec![json_kv("version", json!(restored.version))],
                );
            }
            Ok(None) => {}
            Err(err) => store.log(
                LogLevel::Warn,
                PERSIST_TARGET,
                "snapshot_load_failed",
                vec![json_str("error", err.to_string())],
            ),
        }
        store.storage = Some(Box::new(storage));
        store
    }

    /// Attaches storage without reading from it.
    pub fn with_storage<S>(mut self, storage: S) -> Self
    where
        S: SessionStorage + 'static,
    {
        self.storage = Some(Box::new(storage));
        self
    }

    /// Swaps the join-link collaborator. Existing calls are kept.
    pub fn with_link_builder<L>(mut self, links: L) -> Self
    where
        L: LinkBuilder + 'static,
    {
        self.calls.replace_links(links);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // Subscriptions
    // ---------------------------------------------------------------------

    pub fn subscribe<O>(&mut self, observer: O) -> SubscriptionId
    where
        O: SessionObserver + 'static,
    {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    // ---------------------------------------------------------------------
    // Presence
    // ---------------------------------------------------------------------

    pub fn set_room_presence(&mut self, room_id: &str, list: Vec<RoomPresence>) -> CommandOutcome {
        let changed = self.presence.set_room_presence(room_id, list);
        self.settle(changed, SessionChange::PresenceChanged, || {
            vec![json_str("room_id", room_id)]
        })
    }

    pub fn upsert_presence(&mut self, room_id: &str, record: RoomPresence) -> CommandOutcome {
        let user_id = record.user_id.clone();
        let changed = self.presence.upsert_presence(room_id, record);
        self.settle(changed, SessionChange::PresenceChanged, || {
            vec![json_str("room_id", room_id), json_str("user_id", user_id)]
        })
    }

    pub fn heartbeat(
        &mut self,
        room_id: &str,
        user_id: &str,
        now: Timestamp,
        is_in_call: Option<bool>,
    ) -> CommandOutcome {
        let changed = self.presence.heartbeat(room_id, user_id, now, is_in_call);
        self.settle(changed, SessionChange::PresenceChanged, || {
            vec![json_str("room_id", room_id), json_str("user_id", user_id)]
        })
    }

    pub fn remove_presence(&mut self, room_id: &str, user_id: &str) -> CommandOutcome {
        let changed = self.presence.remove_presence(room_id, user_id);
        self.settle(changed, SessionChange::PresenceChanged, || {
            vec![json_str("room_id", room_id), json_str("user_id", user_id)]
        })
    }

    pub fn sweep_presence(&mut self, now: Timestamp, timeout: Duration) -> usize {
        let pruned = self.presence.sweep_expired(now, timeout);
        if pruned > 0 {
            self.with_metrics(|m| m.record_presence_pruned(pruned));
            self.log(
                LogLevel::Debug,
                PRESENCE_TARGET,
                "presence_pruned",
                vec![json_kv("pruned", pruned), json_kv("now", now)],
            );
        }
        self.settle(pruned > 0, SessionChange::PresenceExpired, || {
            vec![json_kv("pruned", pruned)]
        });
        pruned
    }

    pub fn set_my_presence(&mut self, record: RoomPresence) -> CommandOutcome {
        let room_id = record.room_id.clone();
        let changed = self.presence.set_my_presence(record);
        self.settle(changed, SessionChange::MyPresenceChanged, || {
            vec![json_str("room_id", room_id)]
        })
    }

    pub fn clear_my_presence(&mut self, room_id: &str) -> CommandOutcome {
        let changed = self.presence.clear_my_presence(room_id);
        self.settle(changed, SessionChange::MyPresenceChanged, || {
            vec![json_str("room_id", room_id)]
        })
    }

    pub fn presence(&self) -> &PresenceLedger {
        &self.presence
    }

    pub fn count_present(&self, room_id: &str) -> usize {
        self.presence.count_present(room_id)
    }

    pub fn is_active(&self, room_id: &str) -> bool {
        self.presence.is_active(room_id)
    }

    // ---------------------------------------------------------------------
    // Invitations
    // ---------------------------------------------------------------------

    /// Records an inbound ring and starts the room's alarm blinking.
    pub fn add_invitation(&mut self, invitation: CallInvitation) -> CommandOutcome {
        let id = invitation.id.clone();
        let room_id = invitation.room_id.clone();
        if !self.invitations.add_invitation(invitation) {
            return CommandOutcome::Unchanged;
        }
        self.with_metrics(SessionMetrics::record_invitation);
        self.commit(
            SessionChange::InvitationAdded,
            vec![json_str("id", id.as_str()), json_str("room_id", room_id.as_str())],
        );
        if self.invitations.has_unseen_pending_in(&room_id) && self.blinking_rooms.insert(&room_id) {
            self.commit(
                SessionChange::BlinkingRoomsChanged,
                vec![json_str("room_id", room_id), json_kv("blinking", true)],
            );
        }
        CommandOutcome::Applied
    }

    pub fn update_invitation(&mut self, id: &str, patch: InvitationPatch) -> CommandOutcome {
        let status = patch.status;
        let changed = self.invitations.update_invitation(id, patch);
        let outcome = self.settle(changed, SessionChange::InvitationUpdated, || {
            let mut details = vec![json_str("id", id)];
            if let Some(status) = status {
                details.push(json_kv("status", json!(status)));
            }
            details
        });
        self.refresh_blinking_for(id);
        outcome
    }

    pub fn accept_invitation(&mut self, id: &str) -> CommandOutcome {
        self.update_invitation(id, InvitationPatch::status(InvitationStatus::Accepted))
    }

    pub fn reject_invitation(&mut self, id: &str) -> CommandOutcome {
        self.update_invitation(id, InvitationPatch::status(InvitationStatus::Rejected))
    }

    pub fn remove_invitation(&mut self, id: &str) -> CommandOutcome {
        let removed = self.invitations.remove_invitation(id);
        let room_id = removed.as_ref().map(|i| i.room_id.clone());
        let outcome = self.settle(removed.is_some(), SessionChange::InvitationRemoved, || {
            vec![json_str("id", id)]
        });
        if let Some(room_id) = room_id {
            self.refresh_blinking(&room_id);
        }
        outcome
    }

    /// Drops an answered invitation. Pending ones stay.
    pub fn acknowledge_invitation(&mut self, id: &str) -> CommandOutcome {
        let removed = self.invitations.acknowledge(id);
        self.settle(removed.is_some(), SessionChange::InvitationRemoved, || {
            vec![json_str("id", id)]
        })
    }

    pub fn sweep_invitations(&mut self, now: Timestamp, ttl: Duration) -> Vec<CallInvitation> {
        let expired = self.invitations.sweep_expired(now, ttl);
        if expired.is_empty() {
            return expired;
        }
        self.with_metrics(|m| m.record_expired_invitations(expired.len()));
        let ids: Vec<&str> = expired.iter().map(|i| i.id.as_str()).collect();
        self.log(
            LogLevel::Info,
            INVITATIONS_TARGET,
            "invitations_expired",
            vec![json_kv("ids", json!(ids))],
        );
        self.commit(
            SessionChange::InvitationsExpired,
            vec![json_kv("ids", json!(ids))],
        );
        for invitation in &expired {
            self.refresh_blinking(&invitation.room_id);
        }
        expired
    }

    /// Drops accepted or rejected invitations created at least `ttl` ago.
    ///
    /// Seen and dismissed history is kept, so a late redelivery of the same
    /// ring stays quiet.
    pub fn collect_answered_invitations(
        &mut self,
        now: Timestamp,
        ttl: Duration,
    ) -> Vec<CallInvitation> {
        let collected = self.invitations.collect_answered(now, ttl);
        if collected.is_empty() {
            return collected;
        }
        let ids: Vec<&str> = collected.iter().map(|i| i.id.as_str()).collect();
        self.log(
            LogLevel::Debug,
            INVITATIONS_TARGET,
            "answered_invitations_collected",
            vec![json_kv("ids", json!(ids))],
        );
        self.commit(
            SessionChange::InvitationRemoved,
            vec![json_kv("ids", json!(ids))],
        );
        collected
    }

    pub fn mark_seen(&mut self, id: &str) -> CommandOutcome {
        let changed = self.invitations.mark_seen(id);
        let outcome = self.settle(changed, SessionChange::SeenStateChanged, || {
            vec![json_str("id", id), json_kv("seen", true)]
        });
        self.refresh_blinking_for(id);
        outcome
    }

    pub fn mark_dismissed(&mut self, id: &str) -> CommandOutcome {
        let changed = self.invitations.mark_dismissed(id);
        let outcome = self.settle(changed, SessionChange::SeenStateChanged, || {
            vec![json_str("id", id), json_kv("dismissed", true)]
        });
        self.refresh_blinking_for(id);
        outcome
    }

    pub fn clear_seen_state(&mut self) -> CommandOutcome {
        let changed = self.invitations.clear_seen_state();
        let outcome = self.settle(changed, SessionChange::SeenStateChanged, || {
            vec![json_kv("cleared", true)]
        });
        self.rearm_blinking();
        outcome
    }

    pub fn is_seen(&self, id: &str) -> bool {
        self.invitations.is_seen(id)
    }

    pub fn is_dismissed(&self, id: &str) -> bool {
        self.invitations.is_dismissed(id)
    }

    pub fn unseen_pending(&self) -> Vec<&CallInvitation> {
        self.invitations.unseen_pending()
    }

    /// Newest unseen ring still inside the configured TTL.
    pub fn current_invitation(&self, now: Timestamp) -> Option<&CallInvitation> {
        self.invitations
            .current_invitation(now, self.config.invitation_ttl)
    }

    pub fn invitations(&self) -> &InvitationManager {
        &self.invitations
    }

    // ---------------------------------------------------------------------
    // Blinking alarms and rooms with ongoing calls
    // ---------------------------------------------------------------------

    pub fn set_room_blinking(&mut self, room_id: &str, blinking: bool) -> CommandOutcome {
        let changed = if blinking {
            self.blinking_rooms.insert(room_id)
        } else {
            self.blinking_rooms.remove(room_id)
        };
        self.settle(changed, SessionChange::BlinkingRoomsChanged, || {
            vec![json_str("room_id", room_id), json_kv("blinking", blinking)]
        })
    }

    pub fn is_blinking(&self, room_id: &str) -> bool {
        self.blinking_rooms.contains(room_id)
    }

    pub fn blinking_rooms(&self) -> &IdentifierSet {
        &self.blinking_rooms
    }

    pub fn set_room_call_active(&mut self, room_id: &str, active: bool) -> CommandOutcome {
        let changed = if active {
            self.active_call_rooms.insert(room_id)
        } else {
            self.active_call_rooms.remove(room_id)
        };
        self.settle(changed, SessionChange::ActiveCallRoomsChanged, || {
            vec![json_str("room_id", room_id), json_kv("active", active)]
        })
    }

    pub fn has_active_call_in(&self, room_id: &str) -> bool {
        self.active_call_rooms.contains(room_id)
    }

    pub fn active_call_rooms(&self) -> &IdentifierSet {
        &self.active_call_rooms
    }

    // ---------------------------------------------------------------------
    // Calls
    // ---------------------------------------------------------------------

    pub fn start_call(&mut self, room_id: &str, participants: &[UserId]) -> Result<CommandOutcome> {
        self.start_call_at(room_id, participants, now_ms())
    }

    pub fn start_call_at(
        &mut self,
        room_id: &str,
        participants: &[UserId],
        now: Timestamp,
    ) -> Result<CommandOutcome> {
        let result = self.calls.start_call(room_id, participants, now);
        let outcome = self.settle_result(
            "start_call",
            room_id,
            result,
            SessionChange::CallStarted,
            || {
                vec![
                    json_str("room_id", room_id),
                    json_kv("participants", participants.len()),
                    json_kv("started_at", now),
                ]
            },
        )?;
        if outcome.is_applied() {
            self.with_metrics(SessionMetrics::record_call_started);
            self.set_room_call_active(room_id, true);
        }
        Ok(outcome)
    }

    pub fn end_call(&mut self, room_id: &str) -> Result<CommandOutcome> {
        let result = self.calls.end_call(room_id);
        let outcome = self.settle_result(
            "end_call",
            room_id,
            result,
            SessionChange::CallEnded,
            || vec![json_str("room_id", room_id)],
        )?;
        if outcome.is_applied() {
            self.with_metrics(SessionMetrics::record_call_ended);
            self.set_room_call_active(room_id, false);
        }
        Ok(outcome)
    }

    pub fn update_participants(
        &mut self,
        room_id: &str,
        participants: &[UserId],
    ) -> Result<CommandOutcome> {
        let result = self.calls.update_participants(room_id, participants);
        self.settle_result(
            "update_participants",
            room_id,
            result,
            SessionChange::ParticipantsChanged,
            || {
                vec![
                    json_str("room_id", room_id),
                    json_kv("participants", participants.len()),
                ]
            },
        )
    }

    pub fn add_participant(&mut self, room_id: &str, user_id: &str) -> Result<CommandOutcome> {
        let result = self.calls.add_participant(room_id, user_id);
        self.settle_result(
            "add_participant",
            room_id,
            result,
            SessionChange::ParticipantsChanged,
            || vec![json_str("room_id", room_id), json_str("joined", user_id)],
        )
    }

    pub fn remove_participant(&mut self, room_id: &str, user_id: &str) -> Result<CommandOutcome> {
        let result = self.calls.remove_participant(room_id, user_id);
        self.settle_result(
            "remove_participant",
            room_id,
            result,
            SessionChange::ParticipantsChanged,
            || vec![json_str("room_id", room_id), json_str("left", user_id)],
        )
    }

    pub fn set_minimized(&mut self, room_id: &str, minimized: bool) -> Result<CommandOutcome> {
        let result = self.calls.set_minimized(room_id, minimized);
        self.settle_result(
            "set_minimized",
            room_id,
            result,
            SessionChange::CallMinimized,
            || vec![json_str("room_id", room_id), json_kv("minimized", minimized)],
        )
    }

    pub fn set_current(&mut self, room_id: Option<&str>) -> CommandOutcome {
        let changed = self.calls.set_current(room_id).is_applied();
        self.settle(changed, SessionChange::CurrentCallChanged, || {
            vec![json_kv("room_id", json!(room_id))]
        })
    }

    pub fn current_call(&self) -> Option<&ActiveCall> {
        self.calls.current()
    }

    pub fn calls(&self) -> &CallRegistry {
        &self.calls
    }

    /// Conference grid for the call view, counted in this session's metrics.
    pub fn adaptive_grid(&self, container: Size) -> AdaptiveGrid {
        AdaptiveGrid::new(container).with_metrics(self.config.metrics_handle())
    }

    /// Always returns a link; see [`CallRegistry::generate_shareable_link`].
    pub fn generate_shareable_link(&mut self, room_id: &str) -> String {
        let previous = self
            .calls
            .get(room_id)
            .and_then(|call| call.shareable_link.clone());
        let link = self.calls.generate_shareable_link(room_id);
        let cached = self.calls.has_call(room_id) && previous.as_deref() != Some(link.as_str());
        self.settle(cached, SessionChange::ShareableLinkGenerated, || {
            vec![json_str("room_id", room_id), json_str("link", link.as_str())]
        });
        link
    }

    // ---------------------------------------------------------------------
    // Inbound signals and timers
    // ---------------------------------------------------------------------

    /// Applies an event delivered by the messaging layer.
    pub fn handle_signal(&mut self, event: SignalEvent, now: Timestamp) -> Result<CommandOutcome> {
        if let Some(invitation) = event.invitation() {
            return Ok(self.add_invitation(invitation));
        }
        match event {
            SignalEvent::Accepted { id } => Ok(self.accept_invitation(&id)),
            SignalEvent::Rejected { id } => Ok(self.reject_invitation(&id)),
            SignalEvent::Heartbeat {
                room_id,
                user_id,
                at,
                is_in_call,
            } => Ok(self.heartbeat(&room_id, &user_id, at.unwrap_or(now), is_in_call)),
            SignalEvent::Left { room_id, user_id } => Ok(self.remove_presence(&room_id, &user_id)),
            SignalEvent::Roster {
                room_id,
                participants,
            } => self.update_participants(&room_id, &participants),
            SignalEvent::Ring { .. } => Ok(CommandOutcome::Unchanged),
        }
    }

    /// Runs both expiry sweeps with the configured windows.
    ///
    /// Meant to be driven by the caller's recurring timer; calling it twice in
    /// a row is harmless.
    pub fn tick(&mut self, now: Timestamp) -> TickReport {
        let presence_pruned = self.sweep_presence(now, self.config.presence_timeout);
        let invitations_expired = self
            .sweep_invitations(now, self.config.invitation_ttl)
            .into_iter()
            .map(|invitation| invitation.id)
            .collect();
        let invitations_collected = self
            .collect_answered_invitations(now, self.config.invitation_ttl)
            .into_iter()
            .map(|invitation| invitation.id)
            .collect();
        if let Some(reporter) = self.reporter.as_mut() {
            reporter.maybe_emit(now);
        }
        TickReport {
            presence_pruned,
            invitations_expired,
            invitations_collected,
        }
    }

    /// Forgets everything, durable history included.
    pub fn logout(&mut self) -> CommandOutcome {
        let had_state = !self.presence.is_empty()
            || !self.invitations.is_empty()
            || !self.calls.is_empty()
            || self.calls.current_room_id().is_some()
            || !self.blinking_rooms.is_empty()
            || !self.active_call_rooms.is_empty()
            || !self.invitations.seen_ids().is_empty()
            || !self.invitations.dismissed_ids().is_empty();

        self.presence.clear();
        self.invitations.clear_invitations();
        self.invitations.clear_seen_state();
        self.calls.clear();
        self.blinking_rooms.clear();
        self.active_call_rooms.clear();

        self.settle(had_state, SessionChange::SessionReset, Vec::new)
    }

    // ---------------------------------------------------------------------
    // Persistence and metrics
    // ---------------------------------------------------------------------

    pub fn durable_state(&self) -> DurableState {
        DurableState {
            seen_notifications: self.invitations.seen_ids().clone(),
            dismissed_notifications: self.invitations.dismissed_ids().clone(),
            active_call_rooms: self.active_call_rooms.clone(),
            blinking_rooms: self.blinking_rooms.clone(),
        }
    }

    pub fn snapshot(&self) -> PersistedSession {
        PersistedSession::capture(self.config.persist_version, &self.durable_state())
    }

    /// Writes the snapshot now and reports the outcome instead of logging it.
    pub fn persist_now(&self) -> Result<()> {
        let Some(storage) = self.storage.as_ref() else {
            return Ok(());
        };
        let result = self.snapshot().to_json().and_then(|blob| storage.save(&blob));
        let ok = result.is_ok();
        self.with_metrics(|m| m.record_persist(ok));
        result
    }

    pub fn metrics_snapshot(&self, now: Timestamp) -> Option<MetricSnapshot> {
        let metrics = self.config.metrics.as_ref()?;
        let guard = metrics.lock().ok()?;
        Some(guard.snapshot(Duration::from_millis(elapsed_ms(now, self.started_at))))
    }

    fn apply_durable(&mut self, durable: DurableState) {
        self.invitations
            .restore_seen_state(durable.seen_notifications, durable.dismissed_notifications);
        self.active_call_rooms = durable.active_call_rooms;
        self.blinking_rooms = durable.blinking_rooms;
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn refresh_blinking_for(&mut self, invitation_id: &str) {
        let room_id = self
            .invitations
            .get(invitation_id)
            .map(|invitation| invitation.room_id.clone());
        if let Some(room_id) = room_id {
            self.refresh_blinking(&room_id);
        }
    }

    /// Starts the alarm again in every room that has an unseen ring.
    fn rearm_blinking(&mut self) {
        let rooms: Vec<String> = self
            .invitations
            .unseen_pending()
            .into_iter()
            .map(|invitation| invitation.room_id.clone())
            .collect();
        for room_id in rooms {
            if self.blinking_rooms.insert(&room_id) {
                self.commit(
                    SessionChange::BlinkingRoomsChanged,
                    vec![json_str("room_id", room_id), json_kv("blinking", true)],
                );
            }
        }
    }

    /// Stops a room's alarm once nothing unseen is ringing there.
    fn refresh_blinking(&mut self, room_id: &str) {
        if self.invitations.has_unseen_pending_in(room_id) {
            return;
        }
        if self.blinking_rooms.remove(room_id) {
            self.commit(
                SessionChange::BlinkingRoomsChanged,
                vec![json_str("room_id", room_id), json_kv("blinking", false)],
            );
        }
    }

    fn settle<F>(&mut self, changed: bool, change: SessionChange, details: F) -> CommandOutcome
    where
        F: FnOnce() -> Details,
    {
        if changed {
            self.commit(change, details());
        }
        CommandOutcome::from_changed(changed)
    }

    fn settle_result<F>(
        &mut self,
        command: &str,
        room_id: &str,
        result: Result<CommandOutcome>,
        change: SessionChange,
        details: F,
    ) -> Result<CommandOutcome>
    where
        F: FnOnce() -> Details,
    {
        match result {
            Ok(outcome) => Ok(self.settle(outcome.is_applied(), change, details)),
            Err(err) => {
                self.with_metrics(SessionMetrics::record_command_failure);
                self.log(
                    LogLevel::Warn,
                    TARGET,
                    "command_failed",
                    vec![
                        json_str("command", command),
                        json_str("room_id", room_id),
                        json_str("error", err.to_string()),
                    ],
                );
                Err(err)
            }
        }
    }

    fn commit(&mut self, change: SessionChange, details: Details) {
        self.with_metrics(SessionMetrics::record_command);

        let mut builder = SessionEventBuilder::new(change);
        builder.details(details);
        let event = builder.finish();
        for (_, observer) in &self.observers {
            observer.record(&event);
        }

        // Presence is never part of the snapshot.
        if !change.is_presence() {
            self.persist();
        }
    }

    fn persist(&mut self) {
        if let Err(err) = self.persist_now() {
            self.log(
                LogLevel::Warn,
                PERSIST_TARGET,
                "persist_failed",
                vec![json_str("error", err.to_string())],
            );
        }
    }

    fn with_metrics(&self, update: impl FnOnce(&mut SessionMetrics)) {
        if let Some(metrics) = self.config.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                update(&mut *guard);
            }
        }
    }

    fn log(&self, level: LogLevel, target: &str, message: &str, fields: Details) {
        emit(self.config.logger.as_ref(), level, target, message, fields);
    }
}
