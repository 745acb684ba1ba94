// ── Subscription table ──
//
// Topic → subscriber fan-out owned by the engine. Each topic is one
// (device, kind, index) triple. A topic entry exists only while it has
// subscribers; every new entry gets a fresh epoch so a poll loop can tell
// whether the topic it was started for is still the live one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use tracing::debug;

use crate::model::{EntityKind, EntityStatus, InUse, PoeMode, RelayState};

/// Unique identifier for a subscription, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// One watched entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    pub device_id: String,
    pub kind: EntityKind,
    pub index: u32,
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.device_id, self.kind, self.index)
    }
}

/// Subscriber callback.
pub type Handler = Arc<dyn Fn(&EntityStatus) + Send + Sync>;

struct TopicState {
    epoch: u64,
    subscribers: HashMap<SubscriptionId, Handler>,
}

/// Thread-safe topic table.
#[derive(Default)]
pub struct SubscriptionTable {
    next_id: AtomicU64,
    next_epoch: AtomicU64,
    topics: DashMap<Topic, TopicState>,
    owners: DashMap<SubscriptionId, Topic>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` on `topic`.
    ///
    /// Returns the new id, plus the topic's epoch when this subscription
    /// created the topic (the caller must then start its poll loop).
    pub fn subscribe(&self, topic: Topic, handler: Handler) -> (SubscriptionId, Option<u64>) {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut started = None;

        self.topics
            .entry(topic.clone())
            .or_insert_with(|| {
                let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
                started = Some(epoch);
                TopicState {
                    epoch,
                    subscribers: HashMap::new(),
                }
            })
            .subscribers
            .insert(id, handler);
        self.owners.insert(id, topic);

        (id, started)
    }

    /// Remove one subscription. The topic entry goes with its last subscriber.
    /// Returns `false` for an unknown (or already cleared) id.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let Some((_, topic)) = self.owners.remove(&id) else {
            return false;
        };
        let emptied = self
            .topics
            .remove_if_mut(&topic, |_, state| {
                state.subscribers.remove(&id);
                state.subscribers.is_empty()
            })
            .is_some();
        if emptied {
            debug!(%topic, "last subscriber left");
        }
        true
    }

    /// Whether a loop started for `topic` at `epoch` should keep running.
    pub fn is_live(&self, topic: &Topic, epoch: u64) -> bool {
        self.topics
            .get(topic)
            .is_some_and(|state| state.epoch == epoch && !state.subscribers.is_empty())
    }

    /// Deliver `status` to every current subscriber of `topic`.
    ///
    /// Handlers run outside the table's locks so they may subscribe or
    /// unsubscribe themselves.
    pub fn publish(&self, topic: &Topic, status: &EntityStatus) -> usize {
        let handlers: Vec<Handler> = self
            .topics
            .get(topic)
            .map(|state| state.subscribers.values().cloned().collect())
            .unwrap_or_default();
        for handler in &handlers {
            handler(status);
        }
        handlers.len()
    }

    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.topics
            .get(topic)
            .map_or(0, |state| state.subscribers.len())
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Drop every topic and subscriber.
    pub fn clear(&self) {
        self.owners.clear();
        self.topics.clear();
    }
}

// ── Change detection ─────────────────────────────────────────────────

/// Relay state or PoE mode, whichever applies to the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Relay(RelayState),
    Poe(PoeMode),
}

impl PowerState {
    fn of(status: &EntityStatus) -> Option<Self> {
        match status {
            EntityStatus::Outlet(o) if o.relay_state != RelayState::Unknown => {
                Some(Self::Relay(o.relay_state))
            }
            EntityStatus::Port(p) if p.poe_mode != PoeMode::Unknown => Some(Self::Poe(p.poe_mode)),
            EntityStatus::Outlet(_) | EntityStatus::Port(_) => None,
        }
    }
}

/// Fields that differ from what the subscriber saw last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Change {
    pub state: Option<PowerState>,
    pub in_use: Option<InUse>,
}

#[derive(Default)]
struct LastSeen {
    state: Option<PowerState>,
    in_use: Option<InUse>,
}

/// Last known state of one watched entity.
///
/// Clones share state, so a tracker can outlive the subscription it was
/// first handed to and carry its history into a new one.
#[derive(Clone, Default)]
pub struct ChangeTracker {
    last: Arc<Mutex<LastSeen>>,
}

impl ChangeTracker {
    /// Record `status`; returns the fields that changed, if any.
    /// `Unknown` observations are ignored and never replace a known value.
    pub fn observe(&self, status: &EntityStatus) -> Option<Change> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let mut change = Change::default();

        if let Some(state) = PowerState::of(status) {
            if last.state != Some(state) {
                last.state = Some(state);
                change.state = Some(state);
            }
        }
        let in_use = status.in_use();
        if in_use != InUse::Unknown && last.in_use != Some(in_use) {
            last.in_use = Some(in_use);
            change.in_use = Some(in_use);
        }
        (change != Change::default()).then_some(change)
    }

    /// Wrap `handler` so it only fires on a real change.
    pub fn filter<F>(self, handler: F) -> impl Fn(&EntityStatus) + Send + Sync + 'static
    where
        F: Fn(&EntityStatus, &Change) + Send + Sync + 'static,
    {
        move |status: &EntityStatus| {
            if let Some(change) = self.observe(status) {
                handler(status, &change);
            }
        }
    }
}

/// Wrap `handler` so it only fires when the power state or in-use flag
/// actually changes, starting from no history.
pub fn on_change<F>(handler: F) -> impl Fn(&EntityStatus) + Send + Sync + 'static
where
    F: Fn(&EntityStatus, &Change) + Send + Sync + 'static,
{
    ChangeTracker::default().filter(handler)
}
