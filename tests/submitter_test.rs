mod common;

use std::sync::Arc;

use common::*;
use oracle_bridge::crypto::Signer;
use oracle_bridge::rpc::LedgerClient;
use oracle_bridge::types::{Address, U256};
use oracle_bridge::{FulfillmentTx, SubmitOutcome, Submitter};

const REQUESTS: [u8; 20] = [0xdd; 20];

fn submitter(ledger: &Arc<MockLedger>) -> Submitter {
    let client: Arc<dyn LedgerClient> = ledger.clone();
    Submitter::new(
        client,
        Signer::random(),
        oracle(),
        Address::from_bytes(REQUESTS),
        submitter_settings(),
    )
}

#[tokio::test]
async fn test_confirmed_result_read_from_request_contract() {
    let ledger = MockLedger::new(110);
    ledger.with(|s| s.fulfilled_emitter = Some(Address::from_bytes(REQUESTS)));
    let mut submitter = submitter(&ledger);

    let outcome = submitter
        .submit(&FulfillmentTx::new(request_id(1), 0.924, 92.4))
        .await
        .unwrap();

    match outcome {
        SubmitOutcome::Fulfilled {
            gas_used,
            confirmed_result,
            ..
        } => {
            assert_eq!(gas_used, U256::from(48_000));
            assert_eq!(confirmed_result, Some(U256::from(924)));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_event_from_other_contract_not_confirmed() {
    let ledger = MockLedger::new(110);
    // the oracle is not the request contract here
    ledger.with(|s| s.fulfilled_emitter = Some(oracle()));
    let mut submitter = submitter(&ledger);

    let outcome = submitter
        .submit(&FulfillmentTx::new(request_id(1), 0.924, 92.4))
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        SubmitOutcome::Fulfilled {
            confirmed_result: None,
            ..
        }
    ));
}

#[tokio::test]
async fn test_missing_status_reported_as_unknown() {
    let ledger = MockLedger::new(110);
    ledger.with(|s| {
        s.receipt_status = None;
        s.fulfilled_emitter = Some(Address::from_bytes(REQUESTS));
    });
    let mut submitter = submitter(&ledger);

    let outcome = submitter
        .submit(&FulfillmentTx::new(request_id(1), 0.2, 80.0))
        .await
        .unwrap();

    assert!(matches!(outcome, SubmitOutcome::StatusUnknown { .. }));
}

#[tokio::test]
async fn test_submissions_take_consecutive_nonces() {
    let ledger = MockLedger::new(110);
    ledger.with(|s| s.nonce = 7);
    let mut submitter = submitter(&ledger);

    for id in 1..=3 {
        submitter
            .submit(&FulfillmentTx::new(request_id(id), 0.6, 60.0))
            .await
            .unwrap();
    }

    let nonces: Vec<u64> = ledger.sent().iter().map(|raw| raw_nonce(raw)).collect();
    assert_eq!(nonces, vec![7, 8, 9]);
    for (raw, id) in ledger.sent().iter().zip(1u8..) {
        let (sent_id, scaled) = fulfill_args(raw).unwrap();
        assert_eq!(sent_id, request_id(id));
        assert_eq!(scaled, U256::from(600));
    }
}
