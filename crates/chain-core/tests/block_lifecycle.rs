use chain_core::{
    hash::{from_display_hex, to_display_hex},
    Block, BlockError, Clock, MerkleProof, MiningLimits, MiningOutcome, OutPoint, SystemClock,
    Transaction, TxIn, TxOut, target_with_leading_zero_bits, verify_merkle_path,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn payment(seed: u8, segwit: bool) -> Transaction {
    let mut input = TxIn::new(OutPoint::new([seed; 32], seed as u32), vec![0x51, seed], 0xffff_ffff);
    if segwit {
        input = input.with_witness(vec![vec![0x30, seed], vec![0x02; 33]]);
    }
    Transaction::new(
        2,
        vec![input],
        vec![
            TxOut::new(50_000 + seed as u64, vec![0x00, 0x14, seed]),
            TxOut::new(1_000, vec![0x6a]),
        ],
        0,
    )
}

fn sample_block() -> Block {
    let txs = (0..5u8).map(|seed| payment(seed, seed % 2 == 1)).collect();
    Block::assemble([0xab; 32], 1_700_000_000, target_with_leading_zero_bits(8), txs)
}

#[test]
fn mined_block_carries_valid_proof_of_work() {
    init_tracing();
    let mut block = sample_block();
    assert!(block.has_valid_merkle_root());

    let outcome = block.mine(&MiningLimits::default(), &SystemClock::new());

    let mined = *outcome.mined().expect("eight zero bits is found quickly");
    assert_eq!(block.header, mined.header);
    assert!(block.check_proof_of_work());
    assert_eq!(block.header.hash(), mined.hash);
    assert_eq!(mined.hash[0], 0);
}

#[test]
fn failed_mining_leaves_block_untouched() {
    init_tracing();
    let mut block = sample_block();
    block.header.target = [0u8; 32];
    let before = block.clone();

    let limits = MiningLimits::default().with_nonce_limit(2_000).with_batch_size(500);
    let outcome = block.mine(&limits, &SystemClock::new());

    assert!(matches!(outcome, MiningOutcome::NonceExhausted { attempts: 2_001, last_nonce: 2_000 }));
    assert_eq!(block, before);
}

#[test]
fn changing_transactions_invalidates_proof_of_work() {
    init_tracing();
    let mut block = sample_block();
    assert!(block.mine(&MiningLimits::default(), &SystemClock::new()).is_found());

    block.push_transaction(payment(42, false));
    assert!(!block.has_valid_merkle_root());

    block.update_merkle_root();
    assert!(block.has_valid_merkle_root());
    assert_eq!(block.header.nonce, 0);
}

#[test]
fn light_client_verifies_inclusion_from_header_alone() {
    init_tracing();
    let mut block = sample_block();
    block.mine(&MiningLimits::default(), &SystemClock::new());

    let target = payment(3, true).txid();
    let proof = block.merkle_proof(&target).unwrap();
    assert_eq!(proof.index, 3);

    // what a light client receives: the header and a serialized proof
    let header_json = serde_json::to_string(&block.header).unwrap();
    let proof_json = serde_json::to_string(&proof).unwrap();
    drop(block);

    let header: chain_core::BlockHeader = serde_json::from_str(&header_json).unwrap();
    let proof: MerkleProof = serde_json::from_str(&proof_json).unwrap();

    assert!(header.meets_target());
    assert!(proof.verify_against(&header.merkle_root));
    assert!(verify_merkle_path(&target, &proof.path, &header.merkle_root));

    let forged = payment(9, false).txid();
    assert!(!verify_merkle_path(&forged, &proof.path, &header.merkle_root));
}

#[test]
fn unknown_transaction_is_a_typed_error() {
    let block = sample_block();
    let unknown = payment(200, false).txid();

    match block.verify_transaction(&unknown) {
        Err(BlockError::TransactionNotFound(id)) => {
            assert_eq!(from_display_hex(&id), Some(unknown));
            assert_eq!(id, to_display_hex(&unknown));
        }
        other => panic!("expected TransactionNotFound, got {:?}", other),
    }
}

#[test]
fn limits_from_json_drive_the_miner() {
    init_tracing();
    let limits = MiningLimits::from_json(r#"{ "time_limit_ms": 0, "batch_size": 1000 }"#).unwrap();

    let mut block = sample_block();
    block.header.target = [0u8; 32];

    let clock = SystemClock::new();
    let outcome = block.mine(&limits, &clock);

    match outcome {
        MiningOutcome::TimedOut { attempts, last_nonce, .. } => {
            assert_eq!(attempts, 1000);
            assert_eq!(last_nonce, 999);
        }
        other => panic!("expected a time-out after one batch, got {:?}", other),
    }
    assert!(clock.now() < std::time::Duration::from_secs(60));
}

#[test]
fn block_serialization_starts_with_header() {
    let block = sample_block();
    let bytes = block.serialize();

    assert_eq!(&bytes[..108], &block.header.serialize()[..]);
    assert_eq!(bytes[108], 5);
    assert_eq!(&bytes[109..109 + 4], &2u32.to_le_bytes());
}
