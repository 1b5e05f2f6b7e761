use crate::*;

use ethers::abi::{Detokenize, RawLog};
use ethers::contract::{abigen, ContractCall, ContractError, EthLogDecode};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Provider};
use ethers::signers::LocalWallet;
use ethers::types::{Address, TransactionReceipt, H256, U256, U64};

abigen!(
    PrivatePolls,
    r#"[
        event PollCreated(uint256 indexed pollId, string title, address creator)
        event VoteCast(uint256 indexed pollId, address voter)
        event ResultsRequested(uint256 indexed pollId, uint256 requestId)
        event ResultsDecrypted(uint256 indexed pollId, uint256 requestId, uint256[] counts)
        event PollEnded(uint256 indexed pollId)
        function createPoll(string title, string description, string[] options, uint256 duration) returns (uint256)
        function vote(uint256 pollId, bytes32 encryptedChoice, bytes inputProof)
        function endPoll(uint256 pollId)
        function getPollInfo(uint256 pollId) view returns (string, string, string[], uint256, bool, address)
        function pollCount() view returns (uint256)
        function requestResults(uint256 pollId) returns (uint256)
        function getPollStatus(uint256 pollId) view returns (bool, uint256)
        function callbackResults(uint256 requestId, uint256[] counts, bytes[] signatures)
    ]"#
);

/// Provider + signer stack shared by every operation in a session.
pub type ChainClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// The bound poll contract instance.
pub type PollContract = PrivatePolls<ChainClient>;

/// Send a contract call and suspend until it is mined.
///
/// Block inclusion is confirmation; there is no additional depth wait. The
/// call is submitted at most once: retry policy belongs to the caller, and a
/// broadcast transaction cannot be canceled from here. Reverts and provider
/// errors surface as [`Error::TransactionFailure`], a declined signing
/// request as [`Error::WalletRejected`].
pub async fn send_and_confirm<D: Detokenize>(
    call: ContractCall<ChainClient, D>,
) -> Result<TransactionReceipt, Error> {
    let pending = call.send().await.map_err(classify_contract_error)?;
    let receipt = pending
        .await
        .map_err(|e| Error::NetworkError(e.to_string()))?
        .ok_or_else(|| Error::TransactionFailure("transaction dropped from the mempool".into()))?;
    if receipt.status == Some(U64::zero()) {
        return Err(Error::TransactionFailure(format!(
            "transaction {:#x} reverted",
            receipt.transaction_hash
        )));
    }
    Ok(receipt)
}

fn classify_contract_error(err: ContractError<ChainClient>) -> Error {
    if err.is_revert() {
        return Error::TransactionFailure(err.to_string());
    }
    Error::from_provider(err.to_string())
}

/// Scan a confirmed receipt for the expected event emitted by `contract`.
///
/// Calls here "return" contract-assigned identifiers only through logs,
/// never through return values, so every create/request operation pairs
/// [`send_and_confirm`] with this decode step. Returns `None` when no
/// matching log is present; absence may mean the event name changed or the
/// log came from an unrelated contract, and callers treat it as a hard
/// failure of the logical operation even though the transaction itself
/// succeeded.
pub fn decode_expected_event<E: EthLogDecode>(
    receipt: &TransactionReceipt,
    contract: Address,
) -> Option<E> {
    receipt
        .logs
        .iter()
        .filter(|log| log.address == contract)
        .find_map(|log| E::decode_log(&RawLog::from(log.clone())).ok())
}

/// Topic encoding for an indexed uint256 poll id.
pub fn poll_id_topic(poll_id: u64) -> H256 {
    let mut buf = [0u8; 32];
    U256::from(poll_id).to_big_endian(&mut buf);
    H256::from(buf)
}
