use crate::*;

use ethers::types::{Address, Bytes};
use std::sync::Arc;

/// A single-use encrypted ballot: ciphertext handle plus input proof, both
/// scoped to one (contract, voter, choice) triple.
///
/// Ballots are never cached or replayed. Every submission regenerates one,
/// since the proof binds the ciphertext to the contract and sender it was
/// produced for.
#[derive(Debug, Clone)]
pub struct EncryptedBallot {
    pub handle: [u8; 32],
    pub input_proof: Bytes,
}

/// Wraps the external encryption engine to produce ballots.
pub struct BallotEncoder {
    engine: Arc<dyn EncryptionEngine>,
}

impl BallotEncoder {
    pub fn new(engine: Arc<dyn EncryptionEngine>) -> Self {
        BallotEncoder { engine }
    }

    /// Encrypt `choice` for the given contract and voter.
    ///
    /// The caller validates `choice` against the poll's option count first;
    /// the encoder itself has no notion of a poll. Engine failures propagate
    /// as [`Error::EncryptionFailure`]; there is no plaintext fallback.
    pub async fn encode(
        &self,
        contract: Address,
        voter: Address,
        choice: u32,
    ) -> Result<EncryptedBallot, Error> {
        self.engine.encrypt_u32(contract, voter, choice).await
    }

    /// Bounds-check `choice` against `poll`, then encode.
    ///
    /// The check runs before any engine call, so an out-of-range choice never
    /// reaches the asynchronous path.
    pub async fn encode_for_poll(
        &self,
        poll: &Poll,
        contract: Address,
        voter: Address,
        choice: u32,
    ) -> Result<EncryptedBallot, Error> {
        if choice as usize >= poll.options.len() {
            return Err(Error::InvalidArgument(format!(
                "choice {} out of range for poll {} with {} options",
                choice,
                poll.id,
                poll.options.len()
            )));
        }
        self.encode(contract, voter, choice).await
    }
}
