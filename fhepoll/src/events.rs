use crate::*;

use ethers::contract::LogMeta;
use ethers::providers::Middleware;
use ethers::types::{Address, H256};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Which contract event a subscription covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PollCreated,
    VoteCast,
    ResultsRequested,
    ResultsDecrypted,
    PollEnded,
}

/// A decoded, typed event payload. Handlers never see raw log bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    PollCreated {
        poll_id: u64,
        title: String,
        creator: Address,
    },
    VoteCast {
        poll_id: u64,
        voter: Address,
    },
    ResultsRequested {
        poll_id: u64,
        request_id: u64,
    },
    ResultsDecrypted {
        poll_id: u64,
        request_id: u64,
        counts: Vec<u64>,
    },
    PollEnded {
        poll_id: u64,
    },
}

impl PollEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PollEvent::PollCreated { .. } => EventKind::PollCreated,
            PollEvent::VoteCast { .. } => EventKind::VoteCast,
            PollEvent::ResultsRequested { .. } => EventKind::ResultsRequested,
            PollEvent::ResultsDecrypted { .. } => EventKind::ResultsDecrypted,
            PollEvent::PollEnded { .. } => EventKind::PollEnded,
        }
    }

    pub fn poll_id(&self) -> u64 {
        match self {
            PollEvent::PollCreated { poll_id, .. }
            | PollEvent::VoteCast { poll_id, .. }
            | PollEvent::ResultsRequested { poll_id, .. }
            | PollEvent::ResultsDecrypted { poll_id, .. }
            | PollEvent::PollEnded { poll_id } => *poll_id,
        }
    }
}

impl From<PrivatePollsEvents> for PollEvent {
    fn from(ev: PrivatePollsEvents) -> Self {
        match ev {
            PrivatePollsEvents::PollCreatedFilter(ev) => PollEvent::PollCreated {
                poll_id: ev.poll_id.low_u64(),
                title: ev.title,
                creator: ev.creator,
            },
            PrivatePollsEvents::VoteCastFilter(ev) => PollEvent::VoteCast {
                poll_id: ev.poll_id.low_u64(),
                voter: ev.voter,
            },
            PrivatePollsEvents::ResultsRequestedFilter(ev) => PollEvent::ResultsRequested {
                poll_id: ev.poll_id.low_u64(),
                request_id: ev.request_id.low_u64(),
            },
            PrivatePollsEvents::ResultsDecryptedFilter(ev) => PollEvent::ResultsDecrypted {
                poll_id: ev.poll_id.low_u64(),
                request_id: ev.request_id.low_u64(),
                counts: ev.counts.iter().map(|c| c.low_u64()).collect(),
            },
            PrivatePollsEvents::PollEndedFilter(ev) => PollEvent::PollEnded {
                poll_id: ev.poll_id.low_u64(),
            },
        }
    }
}

pub type EventHandler = Arc<dyn Fn(&PollEvent) + Send + Sync>;

/// Opaque handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(Uuid);

/// Handler registry: event kind → ordered list of (token, handler).
///
/// Multiple independent observers per event kind are supported. Dispatch
/// order within a kind is subscription order.
#[derive(Default)]
pub struct EventRegistry {
    handlers: Mutex<IndexMap<EventKind, Vec<(SubscriptionToken, EventHandler)>>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        EventRegistry::default()
    }

    pub fn subscribe(&self, kind: EventKind, handler: EventHandler) -> SubscriptionToken {
        let token = SubscriptionToken(Uuid::new_v4());
        self.handlers
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push((token, handler));
        token
    }

    /// Subscribe after dropping any existing handlers for `kind`, for
    /// callers that want exactly one active handler per event.
    pub fn subscribe_replacing(&self, kind: EventKind, handler: EventHandler) -> SubscriptionToken {
        let token = SubscriptionToken(Uuid::new_v4());
        let mut handlers = self.handlers.lock().unwrap();
        let slot = handlers.entry(kind).or_default();
        slot.clear();
        slot.push((token, handler));
        token
    }

    /// Remove one subscription without affecting others. Returns false for
    /// an unknown token.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut handlers = self.handlers.lock().unwrap();
        for (_, slot) in handlers.iter_mut() {
            if let Some(pos) = slot.iter().position(|(t, _)| *t == token) {
                slot.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn unsubscribe_all(&self) {
        self.handlers.lock().unwrap().clear();
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers
            .lock()
            .unwrap()
            .get(&kind)
            .map_or(0, |slot| slot.len())
    }

    /// Invoke every handler registered for the event's kind.
    ///
    /// Handlers run synchronously on the dispatching task and must not
    /// block, or they starve delivery of subsequent events. Handlers are
    /// cloned out of the lock first, so a handler may itself subscribe or
    /// unsubscribe without deadlocking.
    pub fn dispatch(&self, event: &PollEvent) {
        let targets: Vec<EventHandler> = {
            let handlers = self.handlers.lock().unwrap();
            handlers
                .get(&event.kind())
                .map(|slot| slot.iter().map(|(_, h)| h.clone()).collect())
                .unwrap_or_default()
        };
        for handler in targets {
            handler(event);
        }
    }
}

/// Polls the chain for new contract logs and dispatches them.
///
/// Logs may arrive duplicated or out of order across polls; the watcher
/// deduplicates by (transaction hash, log index) and dispatches in
/// (block, log index) order. Tracker transitions are applied before handler
/// dispatch, so a handler reading tracker state sees the post-event view.
pub struct EventWatcher {
    contract: PollContract,
    registry: Arc<EventRegistry>,
    tracker: Arc<DecryptionTracker>,
    next_block: u64,
    seen: HashSet<(H256, u64)>,
}

impl EventWatcher {
    pub fn new(
        contract: PollContract,
        registry: Arc<EventRegistry>,
        tracker: Arc<DecryptionTracker>,
        from_block: u64,
    ) -> Self {
        EventWatcher {
            contract,
            registry,
            tracker,
            next_block: from_block,
            seen: HashSet::new(),
        }
    }

    /// Fetch and dispatch logs mined since the last poll. Returns the number
    /// of events dispatched.
    pub async fn poll_once(&mut self) -> Result<usize, Error> {
        let latest = self
            .contract
            .client()
            .get_block_number()
            .await
            .map_err(|e| Error::NetworkError(e.to_string()))?
            .as_u64();
        if latest < self.next_block {
            return Ok(0);
        }

        let entries = self
            .contract
            .events()
            .from_block(self.next_block)
            .to_block(latest)
            .query_with_meta()
            .await
            .map_err(|e| Error::NetworkError(e.to_string()))?;

        let fresh = sift_new(&mut self.seen, entries);
        let dispatched = fresh.len();
        for event in fresh {
            apply_to_tracker(&self.tracker, &event);
            self.registry.dispatch(&event);
        }

        self.next_block = latest + 1;
        Ok(dispatched)
    }

    /// Poll forever on a fixed interval, logging failures and carrying on.
    pub async fn run(mut self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match self.poll_once().await {
                Ok(0) => {}
                Ok(n) => debug!(n, "dispatched events"),
                Err(err) => warn!(%err, "event poll failed"),
            }
        }
    }
}

/// Order by (block, log index) and drop anything already seen.
pub(crate) fn sift_new(
    seen: &mut HashSet<(H256, u64)>,
    mut entries: Vec<(PrivatePollsEvents, LogMeta)>,
) -> Vec<PollEvent> {
    entries.sort_by_key(|(_, meta)| (meta.block_number.as_u64(), meta.log_index.low_u64()));
    entries
        .into_iter()
        .filter(|(_, meta)| seen.insert((meta.transaction_hash, meta.log_index.low_u64())))
        .map(|(decoded, _)| PollEvent::from(decoded))
        .collect()
}

fn apply_to_tracker(tracker: &DecryptionTracker, event: &PollEvent) {
    match event {
        PollEvent::ResultsRequested {
            poll_id,
            request_id,
        } => tracker.note_requested(*poll_id, *request_id),
        PollEvent::ResultsDecrypted {
            poll_id,
            request_id,
            counts,
        } => {
            tracker.note_decrypted(*poll_id, *request_id, counts.clone());
        }
        _ => {}
    }
}
