use crate::*;

use ethers::types::Address;
use tracing::{debug, warn};

/// Read-side access to poll state.
///
/// All methods degrade on failure rather than propagate: an empty or zero
/// result is ambiguous between "truly empty" and "fetch failed", and callers
/// must not treat it as confirmed zero state.
pub struct PollRegistry {
    contract: PollContract,
}

impl PollRegistry {
    pub fn new(contract: PollContract) -> Self {
        PollRegistry { contract }
    }

    /// Fetch one poll. `None` for a missing id or any read error, so a
    /// malformed poll never aborts a batch listing.
    pub async fn get_poll(&self, poll_id: u64) -> Option<Poll> {
        let info = match self.contract.get_poll_info(poll_id.into()).call().await {
            Ok(info) => info,
            Err(err) => {
                debug!(poll_id, %err, "getPollInfo failed");
                return None;
            }
        };
        let (title, description, options, end_time, is_active, creator) = info;
        let total_votes = self.total_votes(poll_id).await;

        Some(Poll {
            id: poll_id,
            title,
            description,
            options,
            end_time: end_time.low_u64(),
            is_active,
            creator,
            total_votes,
        })
    }

    /// List every poll, newest first.
    ///
    /// Reads the scalar poll count, then fetches ids `0..count` one by one.
    /// An id that fails to fetch is skipped rather than aborting the listing;
    /// only a failure to read the count itself degrades the whole result to
    /// empty.
    pub async fn get_all_polls(&self) -> Vec<Poll> {
        let count = match self.contract.poll_count().call().await {
            Ok(count) => count.low_u64(),
            Err(err) => {
                warn!(%err, "pollCount failed");
                return Vec::new();
            }
        };

        let mut polls = Vec::with_capacity(count as usize);
        for id in 0..count {
            match self.get_poll(id).await {
                Some(poll) => polls.push(poll),
                None => debug!(id, "skipping unreadable poll"),
            }
        }
        newest_first(polls)
    }

    /// Proxy vote count: the number of historical `VoteCast` logs for the
    /// poll. Degrades to 0.
    pub async fn total_votes(&self, poll_id: u64) -> u64 {
        let query = self
            .contract
            .vote_cast_filter()
            .from_block(0u64)
            .topic1(poll_id_topic(poll_id));
        match query.query().await {
            Ok(events) => events.len() as u64,
            Err(err) => {
                debug!(poll_id, %err, "VoteCast history unavailable");
                0
            }
        }
    }

    /// Whether `voter` has a `VoteCast` log on this poll. Degrades to false.
    /// The contract's own has-voted record is encrypted and not
    /// client-decodable, so the log history is the only usable signal.
    pub async fn has_voted(&self, poll_id: u64, voter: Address) -> bool {
        let query = self
            .contract
            .vote_cast_filter()
            .from_block(0u64)
            .topic1(poll_id_topic(poll_id));
        match query.query().await {
            Ok(events) => events.iter().any(|ev| ev.voter == voter),
            Err(err) => {
                debug!(poll_id, %err, "VoteCast history unavailable");
                false
            }
        }
    }

    /// Raw `getPollStatus` read: (pendingDecrypt, latestRequestId).
    pub async fn get_poll_status(&self, poll_id: u64) -> Option<(bool, u64)> {
        match self.contract.get_poll_status(poll_id.into()).call().await {
            Ok((pending, request_id)) => Some((pending, request_id.low_u64())),
            Err(err) => {
                debug!(poll_id, %err, "getPollStatus failed");
                None
            }
        }
    }
}

/// Highest id first, so the newest poll sorts to the top.
pub(crate) fn newest_first(mut polls: Vec<Poll>) -> Vec<Poll> {
    polls.sort_by(|a, b| b.id.cmp(&a.id));
    polls
}
