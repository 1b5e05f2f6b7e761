use ethers::types::Address;
use serde::{Deserialize, Serialize};

/// A denormalized client-side view of one poll, assembled from `getPollInfo`
/// plus the `VoteCast` history.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Poll {
    /// Contract-assigned, monotonically increasing, never reused.
    pub id: u64,
    pub title: String,
    pub description: String,
    /// Fixed at creation, always at least 2.
    pub options: Vec<String>,
    /// Unix seconds. Voting closes at this time even while `is_active`.
    pub end_time: u64,
    /// True until the creator ends the poll. Irreversible once false.
    pub is_active: bool,
    pub creator: Address,
    /// Proxy count of observed `VoteCast` events. The true per-option tally
    /// is encrypted on-chain and not knowable client-side.
    pub total_votes: u64,
}

impl Poll {
    pub fn is_votable(&self, now: u64) -> bool {
        self.is_active && now < self.end_time
    }

    /// Human-readable time remaining for listings.
    pub fn time_remaining(&self, now: u64) -> String {
        if now >= self.end_time {
            return "Ended".to_string();
        }
        let remaining = self.end_time - now;
        let days = remaining / 86_400;
        let hours = (remaining % 86_400) / 3_600;
        let minutes = (remaining % 3_600) / 60;
        if days > 0 {
            format!("{}d {}h remaining", days, hours)
        } else if hours > 0 {
            format!("{}h {}m remaining", hours, minutes)
        } else {
            format!("{}m remaining", minutes)
        }
    }
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poll_ending_at(end_time: u64) -> Poll {
        Poll {
            id: 0,
            title: "t".to_string(),
            description: String::new(),
            options: vec!["A".to_string(), "B".to_string()],
            end_time,
            is_active: true,
            creator: Address::zero(),
            total_votes: 0,
        }
    }

    #[test]
    fn votable_requires_active_and_open() {
        let now = 1_000;
        let mut poll = poll_ending_at(now + 86_400);
        assert!(poll.is_votable(now));
        assert!(!poll.is_votable(now + 86_400));

        poll.is_active = false;
        assert!(!poll.is_votable(now));
    }

    #[test]
    fn time_remaining_formats() {
        let now = 1_000;
        assert_eq!(poll_ending_at(now + 86_400).time_remaining(now), "1d 0h remaining");
        assert_eq!(poll_ending_at(now + 3_700).time_remaining(now), "1h 1m remaining");
        assert_eq!(poll_ending_at(now + 120).time_remaining(now), "2m remaining");
        assert_eq!(poll_ending_at(now).time_remaining(now), "Ended");
    }
}
