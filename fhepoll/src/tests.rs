use super::*;

use ethers::abi::Token;
use ethers::contract::{EthEvent, LogMeta};
use ethers::types::{Address, Log, TransactionReceipt, H256, U256};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn addr(byte: u8) -> Address {
    Address::from([byte; 20])
}

fn sample_poll(id: u64, options: usize) -> Poll {
    Poll {
        id,
        title: format!("poll {}", id),
        description: "a poll".to_string(),
        options: (0..options).map(|i| format!("option {}", i)).collect(),
        end_time: unix_now() + 86_400,
        is_active: true,
        creator: addr(0xaa),
        total_votes: 0,
    }
}

#[tokio::test]
async fn ballots_are_never_identical() {
    let engine = MockEngine::new();
    let a = engine.encrypt_u32(addr(1), addr(2), 1).await.unwrap();
    let b = engine.encrypt_u32(addr(1), addr(2), 1).await.unwrap();

    // Same (contract, voter, choice) triple, distinct ballots: a ballot can
    // never be reused or replayed.
    assert_ne!(a.handle, b.handle);
    assert_ne!(a.input_proof, b.input_proof);
}

#[tokio::test]
async fn proof_is_bound_to_contract_and_voter() {
    let engine = MockEngine::new();
    let ballot = engine.encrypt_u32(addr(1), addr(2), 0).await.unwrap();

    assert!(MockEngine::proof_binds(&ballot.input_proof, addr(1), addr(2)));
    // A ballot generated for one contract must not verify against another.
    assert!(!MockEngine::proof_binds(&ballot.input_proof, addr(3), addr(2)));
    assert!(!MockEngine::proof_binds(&ballot.input_proof, addr(1), addr(4)));
}

#[tokio::test]
async fn out_of_range_choice_never_reaches_the_engine() {
    let engine = Arc::new(MockEngine::new());
    let encoder = BallotEncoder::new(engine.clone());
    let poll = sample_poll(0, 2);

    let err = encoder
        .encode_for_poll(&poll, addr(1), addr(2), 2)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert_eq!(engine.calls(), 0);

    // The highest valid index encodes fine.
    encoder
        .encode_for_poll(&poll, addr(1), addr(2), 1)
        .await
        .unwrap();
    assert_eq!(engine.calls(), 1);
}

#[test]
fn decryption_request_lifecycle() {
    let tracker = DecryptionTracker::new();
    assert!(tracker.status(7).is_none());
    assert!(!tracker.pending_decrypt(7));

    tracker.note_requested(7, 42);
    let status = tracker.status(7).unwrap();
    assert_eq!(status.request_id, 42);
    assert_eq!(status.status, DecryptStatus::Requested);
    assert!(status.counts.is_empty());
    assert!(tracker.pending_decrypt(7));

    // A fulfillment for a superseded request id changes nothing.
    assert!(!tracker.note_decrypted(7, 41, vec![1, 2]));
    assert!(tracker.pending_decrypt(7));

    assert!(tracker.note_decrypted(7, 42, vec![3, 4]));
    let status = tracker.status(7).unwrap();
    assert_eq!(status.status, DecryptStatus::Fulfilled);
    assert_eq!(status.counts, vec![3, 4]);
    assert!(!tracker.pending_decrypt(7));

    // Duplicate delivery of the same fulfillment is idempotent.
    assert!(tracker.note_decrypted(7, 42, vec![3, 4]));
    assert_eq!(tracker.status(7).unwrap().counts, vec![3, 4]);

    // A new request supersedes the fulfilled result.
    tracker.note_requested(7, 43);
    assert!(tracker.pending_decrypt(7));
    assert!(tracker.status(7).unwrap().counts.is_empty());
}

#[test]
fn fulfillment_without_a_local_request_is_accepted() {
    // The request may have been confirmed before a restart, or issued by
    // another session; the observed result still counts.
    let tracker = DecryptionTracker::new();
    assert!(tracker.note_decrypted(3, 9, vec![5, 6]));
    let status = tracker.status(3).unwrap();
    assert_eq!(status.status, DecryptStatus::Fulfilled);
    assert_eq!(status.request_id, 9);
}

#[test]
fn independent_subscribers_each_receive_dispatch() {
    let registry = EventRegistry::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = hits.clone();
    registry.subscribe(
        EventKind::PollCreated,
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );
    let counter = hits.clone();
    let token = registry.subscribe(
        EventKind::PollCreated,
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );
    assert_eq!(registry.handler_count(EventKind::PollCreated), 2);

    let event = PollEvent::PollCreated {
        poll_id: 0,
        title: "t".to_string(),
        creator: addr(1),
    };
    registry.dispatch(&event);
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    // Removing one subscription leaves the other untouched.
    assert!(registry.unsubscribe(token));
    registry.dispatch(&event);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert!(!registry.unsubscribe(token));
}

#[test]
fn subscribe_replacing_keeps_exactly_one_handler() {
    let registry = EventRegistry::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = hits.clone();
    registry.subscribe_replacing(
        EventKind::VoteCast,
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );
    let counter = hits.clone();
    registry.subscribe_replacing(
        EventKind::VoteCast,
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );
    assert_eq!(registry.handler_count(EventKind::VoteCast), 1);

    let event = PollEvent::VoteCast {
        poll_id: 1,
        voter: addr(2),
    };
    registry.dispatch(&event);
    // Only the replacement fired; the stale handler saw nothing.
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn unsubscribe_all_silences_dispatch() {
    let registry = EventRegistry::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = hits.clone();
    registry.subscribe(
        EventKind::PollEnded,
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );
    registry.unsubscribe_all();
    registry.dispatch(&PollEvent::PollEnded { poll_id: 0 });
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(registry.handler_count(EventKind::PollEnded), 0);
}

fn meta(block: u64, tx: u8, index: u64) -> LogMeta {
    LogMeta {
        address: addr(9),
        block_number: block.into(),
        block_hash: H256::from([tx; 32]),
        transaction_hash: H256::from([tx; 32]),
        transaction_index: 0u64.into(),
        log_index: index.into(),
    }
}

#[test]
fn duplicated_logs_dispatch_once_in_block_order() {
    let vote = |id: u64| {
        PrivatePollsEvents::VoteCastFilter(VoteCastFilter {
            poll_id: id.into(),
            voter: addr(3),
        })
    };
    let mut seen = HashSet::new();

    // Out of order and with a duplicate inside one batch.
    let batch = vec![
        (vote(2), meta(5, 2, 0)),
        (vote(1), meta(4, 1, 0)),
        (vote(1), meta(4, 1, 0)),
    ];
    let fresh = sift_new(&mut seen, batch);
    assert_eq!(fresh.len(), 2);
    assert_eq!(fresh[0].poll_id(), 1);
    assert_eq!(fresh[1].poll_id(), 2);

    // A replay in a later batch is also dropped.
    let fresh = sift_new(&mut seen, vec![(vote(2), meta(5, 2, 0))]);
    assert!(fresh.is_empty());
}

fn poll_created_log(contract: Address, poll_id: u64, title: &str, creator: Address) -> Log {
    Log {
        address: contract,
        topics: vec![PollCreatedFilter::signature(), poll_id_topic(poll_id)],
        data: ethers::abi::encode(&[Token::String(title.to_string()), Token::Address(creator)])
            .into(),
        ..Default::default()
    }
}

#[test]
fn expected_event_is_found_among_foreign_logs() {
    let contract = addr(8);
    let mut receipt = TransactionReceipt::default();
    // Same event shape from an unrelated contract must not match.
    receipt.logs.push(poll_created_log(addr(9), 5, "other", addr(1)));
    receipt.logs.push(poll_created_log(contract, 3, "mine", addr(2)));

    let created: PollCreatedFilter = decode_expected_event(&receipt, contract).unwrap();
    assert_eq!(created.poll_id, U256::from(3));
    assert_eq!(created.title, "mine");
    assert_eq!(created.creator, addr(2));

    // The receipt confirmed, but the log we need is absent.
    let missing: Option<ResultsRequestedFilter> = decode_expected_event(&receipt, contract);
    assert!(missing.is_none());
}

#[test]
fn listing_orders_newest_first() {
    let polls = vec![sample_poll(0, 2), sample_poll(2, 2), sample_poll(1, 2)];
    let ids: Vec<u64> = newest_first(polls).iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![2, 1, 0]);
}

#[test]
fn new_poll_shape() {
    let poll = sample_poll(0, 2);
    let now = unix_now();
    assert_eq!(poll.options.len(), 2);
    assert!(poll.is_active);
    assert!(poll.end_time >= now + 86_399 && poll.end_time <= now + 86_401);
    assert!(poll.is_votable(now));
}

#[test]
fn typed_events_decode_from_generated_filters() {
    let decoded = PollEvent::from(PrivatePollsEvents::ResultsDecryptedFilter(
        ResultsDecryptedFilter {
            poll_id: 4u64.into(),
            request_id: 11u64.into(),
            counts: vec![7u64.into(), 9u64.into()],
        },
    ));
    assert_eq!(
        decoded,
        PollEvent::ResultsDecrypted {
            poll_id: 4,
            request_id: 11,
            counts: vec![7, 9],
        }
    );
    assert_eq!(decoded.kind(), EventKind::ResultsDecrypted);
}

#[test]
fn provider_errors_classify_into_the_taxonomy() {
    assert!(matches!(
        Error::from_provider("user rejected transaction (code: 4001)"),
        Error::WalletRejected(_)
    ));
    assert!(matches!(
        Error::from_provider("error trying to connect: tcp connect error"),
        Error::NetworkError(_)
    ));
    assert!(matches!(
        Error::from_provider("execution reverted: poll already ended"),
        Error::TransactionFailure(_)
    ));
}
