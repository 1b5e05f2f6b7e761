use crate::*;

use ethers::types::H256;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// Session-scoped orchestration facade.
///
/// Owns the session handle, ballot encoder, handler registry, and decryption
/// tracker. One client is one (wallet, contract) pair; construct a second
/// client for a second session. Nothing here persists across restarts, so
/// poll state is re-fetched from chain and decryption state reconciled via
/// [`refresh_decrypt_status`](PollClient::refresh_decrypt_status).
pub struct PollClient {
    config: SessionConfig,
    session: Option<PollSession>,
    encoder: BallotEncoder,
    events: Arc<EventRegistry>,
    tracker: Arc<DecryptionTracker>,
}

impl PollClient {
    pub fn new(config: SessionConfig, engine: Arc<dyn EncryptionEngine>) -> Self {
        PollClient {
            config,
            session: None,
            encoder: BallotEncoder::new(engine),
            events: Arc::new(EventRegistry::new()),
            tracker: Arc::new(DecryptionTracker::new()),
        }
    }

    /// Connect provider, signer, and contract.
    ///
    /// Returns false on failure with the cause logged; callers check the
    /// result before invoking operations. Taking `&mut self` means two tasks
    /// cannot race to initialize one client, and a second call on a
    /// connected client is a no-op.
    pub async fn connect(&mut self) -> bool {
        if self.session.is_some() {
            return true;
        }
        match PollSession::connect(&self.config).await {
            Ok(session) => {
                self.session = Some(session);
                true
            }
            Err(err) => {
                error!(%err, "session connect failed");
                false
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Result<&PollSession, Error> {
        self.session.as_ref().ok_or(Error::NotInitialized)
    }

    fn registry(&self) -> Result<PollRegistry, Error> {
        Ok(PollRegistry::new(self.session()?.contract().clone()))
    }

    /// Create a poll and return its contract-assigned id.
    ///
    /// The id only exists in the mined `PollCreated` log; a confirmed
    /// transaction without that log is an [`Error::EventNotFound`] failure.
    pub async fn create_poll(
        &self,
        title: &str,
        description: &str,
        options: Vec<String>,
        duration_secs: u64,
    ) -> Result<u64, Error> {
        if title.trim().is_empty() {
            return Err(Error::InvalidArgument("title must not be empty".into()));
        }
        if options.len() < 2 {
            return Err(Error::InvalidArgument(
                "a poll needs at least 2 options".into(),
            ));
        }
        if duration_secs == 0 {
            return Err(Error::InvalidArgument("duration must be positive".into()));
        }

        let session = self.session()?;
        let call = session.contract().create_poll(
            title.to_string(),
            description.to_string(),
            options,
            duration_secs.into(),
        );
        let receipt = send_and_confirm(call).await?;
        let created: PollCreatedFilter =
            decode_expected_event(&receipt, session.contract_address())
                .ok_or(Error::EventNotFound("PollCreated"))?;
        Ok(created.poll_id.low_u64())
    }

    /// Cast an encrypted vote for `choice` on `poll_id`.
    ///
    /// The choice is bounds-checked against the poll's options before the
    /// encryption engine is invoked, so nothing is encrypted or submitted
    /// for an invalid choice. A fresh ballot is generated on every call and
    /// dropped after submission.
    pub async fn vote(&self, poll_id: u64, choice: u32) -> Result<H256, Error> {
        let session = self.session()?;
        let poll = self
            .registry()?
            .get_poll(poll_id)
            .await
            .ok_or_else(|| Error::InvalidArgument(format!("poll {} not found", poll_id)))?;
        if !poll.is_votable(unix_now()) {
            return Err(Error::InvalidArgument(format!("poll {} is closed", poll_id)));
        }

        let ballot = self
            .encoder
            .encode_for_poll(&poll, session.contract_address(), session.address(), choice)
            .await?;
        let call = session
            .contract()
            .vote(poll_id.into(), ballot.handle, ballot.input_proof);
        let receipt = send_and_confirm(call).await?;
        Ok(receipt.transaction_hash)
    }

    /// Irreversibly end a poll. Only meaningful for the poll's creator.
    pub async fn end_poll(&self, poll_id: u64) -> Result<(), Error> {
        let session = self.session()?;
        let receipt = send_and_confirm(session.contract().end_poll(poll_id.into())).await?;
        if decode_expected_event::<PollEndedFilter>(&receipt, session.contract_address()).is_none()
        {
            return Err(Error::EventNotFound("PollEnded"));
        }
        Ok(())
    }

    /// Ask the contract to hand the encrypted tallies to the decryption
    /// oracle. Returns the contract-assigned request id; the plaintext
    /// counts arrive later through a `ResultsDecrypted` event.
    pub async fn request_results(&self, poll_id: u64) -> Result<u64, Error> {
        let session = self.session()?;
        let receipt =
            send_and_confirm(session.contract().request_results(poll_id.into())).await?;
        let requested: ResultsRequestedFilter =
            decode_expected_event(&receipt, session.contract_address())
                .ok_or(Error::EventNotFound("ResultsRequested"))?;
        let request_id = requested.request_id.low_u64();
        self.tracker.note_requested(poll_id, request_id);
        Ok(request_id)
    }

    /// Degrading read; `None` is ambiguous between missing and unreadable.
    pub async fn get_poll(&self, poll_id: u64) -> Option<Poll> {
        match self.registry() {
            Ok(registry) => registry.get_poll(poll_id).await,
            Err(_) => {
                warn!("get_poll called before connect");
                None
            }
        }
    }

    /// Degrading read; empty is ambiguous between no polls and a failed
    /// fetch.
    pub async fn get_all_polls(&self) -> Vec<Poll> {
        match self.registry() {
            Ok(registry) => registry.get_all_polls().await,
            Err(_) => {
                warn!("get_all_polls called before connect");
                Vec::new()
            }
        }
    }

    /// Whether the session wallet has a recorded `VoteCast` on this poll.
    pub async fn has_voted(&self, poll_id: u64) -> bool {
        match (self.registry(), self.session()) {
            (Ok(registry), Ok(session)) => registry.has_voted(poll_id, session.address()).await,
            _ => false,
        }
    }

    /// Locally known decryption state. `None` is Idle.
    pub fn decrypt_status(&self, poll_id: u64) -> Option<DecryptionRequest> {
        self.tracker.status(poll_id)
    }

    pub fn pending_decrypt(&self, poll_id: u64) -> bool {
        self.tracker.pending_decrypt(poll_id)
    }

    /// Reconcile local decryption state against the contract's
    /// `getPollStatus`, then return it.
    pub async fn refresh_decrypt_status(&self, poll_id: u64) -> Option<DecryptionRequest> {
        match self.session() {
            Ok(session) => self.tracker.reconcile(session.contract(), poll_id).await,
            Err(_) => {
                warn!("refresh_decrypt_status called before connect");
                self.tracker.status(poll_id)
            }
        }
    }

    pub fn subscribe(&self, kind: EventKind, handler: EventHandler) -> SubscriptionToken {
        self.events.subscribe(kind, handler)
    }

    pub fn subscribe_replacing(
        &self,
        kind: EventKind,
        handler: EventHandler,
    ) -> SubscriptionToken {
        self.events.subscribe_replacing(kind, handler)
    }

    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        self.events.unsubscribe(token)
    }

    pub fn unsubscribe_all(&self) {
        self.events.unsubscribe_all()
    }

    /// Build a watcher over this session's contract that dispatches to this
    /// client's subscriptions and tracker, starting at `from_block`.
    pub fn event_watcher(&self, from_block: u64) -> Result<EventWatcher, Error> {
        let session = self.session()?;
        Ok(EventWatcher::new(
            session.contract().clone(),
            self.events.clone(),
            self.tracker.clone(),
            from_block,
        ))
    }

    /// Spawn a background watcher polling every `interval`.
    pub fn spawn_watcher(
        &self,
        from_block: u64,
        interval: Duration,
    ) -> Result<JoinHandle<()>, Error> {
        let watcher = self.event_watcher(from_block)?;
        Ok(tokio::spawn(watcher.run(interval)))
    }
}
