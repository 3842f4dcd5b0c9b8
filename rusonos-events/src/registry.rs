//! The process-wide directory of live subscriptions.

use dashmap::DashMap;
use rusonos_model::Player;

use crate::subscription::{Subscription, UnsubscribeOutcome};

/// Directory mapping device-assigned SIDs to live [`Subscription`]s.
///
/// Entries are added and removed only by a subscription's own
/// subscribe/unsubscribe transitions; everything else gets read-only
/// lookups. Owned by the [`EventSystem`](crate::EventSystem) and shared
/// with the event server, which uses it to route inbound notifications.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    subscriptions: DashMap<String, Subscription>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly subscribed subscription under its SID.
    ///
    /// SIDs are unique among live subscriptions; seeing a duplicate means a
    /// rebooted device re-issued an id while a stale local entry still held
    /// it. The stale entry loses.
    pub(crate) fn register(&self, sid: &str, subscription: Subscription) {
        if self
            .subscriptions
            .insert(sid.to_string(), subscription)
            .is_some()
        {
            tracing::warn!(sid, "subscription id reused; replacing stale registration");
        }
    }

    /// Drop the entry for `sid`, if any.
    pub(crate) fn unregister(&self, sid: &str) -> Option<Subscription> {
        self.subscriptions.remove(sid).map(|(_, sub)| sub)
    }

    /// Find the live subscription for a SID.
    ///
    /// Absence is a normal condition (notifications can arrive after an
    /// unsubscribe), so this never errors.
    pub fn lookup(&self, sid: &str) -> Option<Subscription> {
        self.subscriptions.get(sid).map(|entry| entry.value().clone())
    }

    /// All live subscriptions for one player.
    pub fn list_for_player(&self, player: &Player) -> Vec<Subscription> {
        self.subscriptions
            .iter()
            .filter(|entry| entry.value().player() == player)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Unsubscribe every live subscription, best-effort.
    ///
    /// Iterates over a snapshot, since every `unsubscribe` call mutates the
    /// registry being iterated. A failed attempt tears its subscription
    /// down locally and does not stop the rest of the teardown.
    pub async fn unsubscribe_all(&self) -> Vec<UnsubscribeOutcome> {
        let snapshot: Vec<Subscription> = self
            .subscriptions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        tracing::info!(count = snapshot.len(), "unsubscribing all subscriptions");
        let mut outcomes = Vec::with_capacity(snapshot.len());
        for subscription in snapshot {
            outcomes.push(subscription.unsubscribe().await);
        }
        outcomes
    }
}
