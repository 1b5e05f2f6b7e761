use crate::*;

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Progress of one poll's result decryption.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptStatus {
    Requested,
    Fulfilled,
}

/// The latest decryption request known for a poll.
#[derive(Serialize, Debug, Clone)]
pub struct DecryptionRequest {
    pub poll_id: u64,
    /// Contract-assigned id, decoded from the `ResultsRequested` log.
    pub request_id: u64,
    pub status: DecryptStatus,
    /// One count per option. Empty until fulfilled.
    pub counts: Vec<u64>,
}

impl DecryptionRequest {
    pub fn pending(&self) -> bool {
        self.status == DecryptStatus::Requested
    }
}

/// Per-poll decryption state machine.
///
/// Idle (no entry) → Requested → Fulfilled, with a new request superseding a
/// fulfilled or still-pending one. This state is derived from observed logs;
/// the contract's `getPollStatus` is authoritative, and
/// [`reconcile`](DecryptionTracker::reconcile) realigns with it after a
/// restart or a missed event.
#[derive(Default)]
pub struct DecryptionTracker {
    polls: Mutex<HashMap<u64, DecryptionRequest>>,
}

impl DecryptionTracker {
    pub fn new() -> Self {
        DecryptionTracker::default()
    }

    /// A `requestResults` call confirmed with this request id. Supersedes
    /// any prior request for the poll.
    pub fn note_requested(&self, poll_id: u64, request_id: u64) {
        let mut polls = self.polls.lock().unwrap();
        polls.insert(
            poll_id,
            DecryptionRequest {
                poll_id,
                request_id,
                status: DecryptStatus::Requested,
                counts: Vec::new(),
            },
        );
    }

    /// A `ResultsDecrypted` event was observed.
    ///
    /// Applies when it matches the latest known request, or when no request
    /// is known locally (ours may have been confirmed before a restart, or
    /// another session issued it). A fulfillment for a superseded request id
    /// is ignored. Returns whether the event was applied.
    pub fn note_decrypted(&self, poll_id: u64, request_id: u64, counts: Vec<u64>) -> bool {
        let mut polls = self.polls.lock().unwrap();
        match polls.get(&poll_id) {
            Some(existing) if existing.request_id != request_id => {
                debug!(
                    poll_id,
                    request_id,
                    latest = existing.request_id,
                    "ignoring stale decryption result"
                );
                false
            }
            _ => {
                polls.insert(
                    poll_id,
                    DecryptionRequest {
                        poll_id,
                        request_id,
                        status: DecryptStatus::Fulfilled,
                        counts,
                    },
                );
                true
            }
        }
    }

    /// Latest known request for the poll. `None` is Idle.
    pub fn status(&self, poll_id: u64) -> Option<DecryptionRequest> {
        self.polls.lock().unwrap().get(&poll_id).cloned()
    }

    /// True iff the latest request for the poll has not been fulfilled.
    pub fn pending_decrypt(&self, poll_id: u64) -> bool {
        self.polls
            .lock()
            .unwrap()
            .get(&poll_id)
            .map_or(false, DecryptionRequest::pending)
    }

    /// Realign local state with the contract.
    ///
    /// `getPollStatus` reports (pendingDecrypt, latestRequestId). When the
    /// chain says pending, the local entry becomes Requested for that id.
    /// When the chain says not pending but a request exists, the fulfillment
    /// was missed and the counts are back-filled from the historical
    /// `ResultsDecrypted` log. Returns the reconciled status.
    pub async fn reconcile(
        &self,
        contract: &PollContract,
        poll_id: u64,
    ) -> Option<DecryptionRequest> {
        let (pending, latest) = match contract.get_poll_status(poll_id.into()).call().await {
            Ok(status) => status,
            Err(err) => {
                debug!(poll_id, %err, "getPollStatus failed");
                return self.status(poll_id);
            }
        };
        let latest = latest.low_u64();

        if pending {
            self.note_requested(poll_id, latest);
        } else if latest != 0 || self.pending_decrypt(poll_id) {
            let query = contract
                .results_decrypted_filter()
                .from_block(0u64)
                .topic1(poll_id_topic(poll_id));
            match query.query().await {
                Ok(events) => {
                    let fulfilled = events
                        .into_iter()
                        .rev()
                        .find(|ev| ev.request_id.low_u64() == latest);
                    if let Some(ev) = fulfilled {
                        let counts = ev.counts.iter().map(|c| c.low_u64()).collect();
                        self.note_decrypted(poll_id, latest, counts);
                    }
                }
                Err(err) => debug!(poll_id, %err, "ResultsDecrypted history unavailable"),
            }
        }

        self.status(poll_id)
    }
}
