//! Block header construction, serialization and Merkle bookkeeping.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::{ByteSink, Encodable};
use crate::config::MiningLimits;
use crate::consts::{BLOCK_HEADER_SIZE, BLOCK_VERSION, NONCE_OFFSET};
use crate::difficulty::hash_meets_target;
use crate::error::BlockError;
use crate::hash::{double_sha256, to_display_hex, Hash256};
use crate::merkle::{compute_merkle_root, MerklePathItem, MerkleProof, MerkleTree};
use crate::mining::{mine_header, Clock, MiningOutcome};
use crate::transaction::{Transaction, Txid};

/// A block header (108 bytes serialized).
///
/// The target is carried in full rather than in compact form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: u32,
    /// Hash of the previous block (internal byte order).
    #[serde(with = "hex::serde")]
    pub prev_block_hash: Hash256,
    /// Merkle root of all transactions.
    #[serde(with = "hex::serde")]
    pub merkle_root: Hash256,
    /// Block timestamp (Unix time).
    pub timestamp: u32,
    /// The header hash must be strictly below this value.
    #[serde(with = "hex::serde")]
    pub target: Hash256,
    /// Nonce for proof of work.
    pub nonce: u32,
}

impl BlockHeader {
    /// Create a new block header with nonce zero.
    pub fn new(prev_block_hash: Hash256, merkle_root: Hash256, timestamp: u32, target: Hash256) -> Self {
        BlockHeader {
            version: BLOCK_VERSION,
            prev_block_hash,
            merkle_root,
            timestamp,
            target,
            nonce: 0,
        }
    }

    /// Serialize the block header to 108 bytes.
    pub fn serialize(&self) -> [u8; BLOCK_HEADER_SIZE] {
        let mut header = [0u8; BLOCK_HEADER_SIZE];
        header[..NONCE_OFFSET].copy_from_slice(&self.serialize_without_nonce());
        header[NONCE_OFFSET..].copy_from_slice(&self.nonce.to_le_bytes());
        header
    }

    /// Serialize everything but the nonce (104 bytes).
    ///
    /// The miner hashes this prefix with each candidate nonce appended.
    pub fn serialize_without_nonce(&self) -> [u8; NONCE_OFFSET] {
        let mut header = [0u8; NONCE_OFFSET];

        header[0..4].copy_from_slice(&self.version.to_le_bytes());
        header[4..36].copy_from_slice(&self.prev_block_hash);
        header[36..68].copy_from_slice(&self.merkle_root);
        header[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        header[72..104].copy_from_slice(&self.target);
        header
    }

    /// Compute the block hash (double SHA256).
    pub fn hash(&self) -> Hash256 {
        double_sha256(&self.serialize())
    }

    /// True if the header hash is strictly below the target.
    pub fn meets_target(&self) -> bool {
        hash_meets_target(&self.hash(), &self.target)
    }
}

impl Encodable for BlockHeader {
    fn encode_to<S: ByteSink + ?Sized>(&self, sink: &mut S) {
        sink.put_slice(&self.serialize());
    }
}

/// A block: header plus the ordered transactions its Merkle root commits to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Wrap a header and transactions as they are. The Merkle root is not touched.
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Block { header, transactions }
    }

    /// Build a block whose header commits to `transactions`.
    pub fn assemble(
        prev_block_hash: Hash256,
        timestamp: u32,
        target: Hash256,
        transactions: Vec<Transaction>,
    ) -> Self {
        let merkle_root = compute_merkle_root(&txids_of(&transactions));
        Block {
            header: BlockHeader::new(prev_block_hash, merkle_root, timestamp, target),
            transactions,
        }
    }

    /// Append a transaction.
    ///
    /// The header is stale until [`Block::update_merkle_root`] is called.
    pub fn push_transaction(&mut self, tx: Transaction) {
        self.transactions.push(tx);
    }

    /// Ids of all transactions, in block order.
    pub fn txids(&self) -> Vec<Txid> {
        txids_of(&self.transactions)
    }

    pub fn merkle_tree(&self) -> MerkleTree {
        MerkleTree::new(&self.txids())
    }

    pub fn compute_merkle_root(&self) -> Hash256 {
        compute_merkle_root(&self.txids())
    }

    /// Recompute the Merkle root and store it in the header.
    ///
    /// Resets the nonce: an earlier proof of work no longer applies.
    pub fn update_merkle_root(&mut self) {
        let root = self.compute_merkle_root();
        if root != self.header.merkle_root {
            self.header.nonce = 0;
        }
        self.header.merkle_root = root;
        debug!(
            transactions = self.transactions.len(),
            merkle_root = %to_display_hex(&root),
            "updated merkle root"
        );
    }

    /// True if the header's Merkle root matches the current transactions.
    pub fn has_valid_merkle_root(&self) -> bool {
        self.header.merkle_root == self.compute_merkle_root()
    }

    /// True if the header hash satisfies the header target.
    pub fn check_proof_of_work(&self) -> bool {
        self.header.meets_target()
    }

    /// Position of a transaction in the block.
    pub fn tx_index(&self, txid: &Txid) -> Result<usize, BlockError> {
        self.txids()
            .iter()
            .position(|id| id == txid)
            .ok_or_else(|| BlockError::TransactionNotFound(to_display_hex(txid)))
    }

    /// Inclusion path for the transaction at `index`.
    pub fn merkle_path(&self, index: usize) -> Result<Vec<MerklePathItem>, BlockError> {
        Ok(self.merkle_tree().path(index)?)
    }

    /// Inclusion proof for a transaction id.
    pub fn merkle_proof(&self, txid: &Txid) -> Result<MerkleProof, BlockError> {
        let tree = self.merkle_tree();
        let index = tree
            .leaves()
            .iter()
            .position(|id| id == txid)
            .ok_or_else(|| BlockError::TransactionNotFound(to_display_hex(txid)))?;
        Ok(tree.proof(index)?)
    }

    /// Check that `txid` is committed to by the header's Merkle root.
    ///
    /// `Ok(false)` means the transaction is present but the header is stale.
    pub fn verify_transaction(&self, txid: &Txid) -> Result<bool, BlockError> {
        let proof = self.merkle_proof(txid)?;
        Ok(proof.verify_against(&self.header.merkle_root))
    }

    /// Search for a nonce satisfying the target.
    ///
    /// The header is only replaced when a nonce is found; on any other outcome
    /// the block is left exactly as it was.
    pub fn mine<C: Clock + ?Sized>(&mut self, limits: &MiningLimits, clock: &C) -> MiningOutcome {
        let outcome = mine_header(self.header, limits, clock);
        if let MiningOutcome::Found(mined) = &outcome {
            self.header = mined.header;
        }
        outcome
    }

    /// Header, compact-size transaction count, then each transaction.
    pub fn serialize(&self) -> Vec<u8> {
        self.encoded()
    }
}

impl Encodable for Block {
    fn encode_to<S: ByteSink + ?Sized>(&self, sink: &mut S) {
        self.header.encode_to(sink);
        sink.put_compact_size(self.transactions.len() as u64);
        for tx in &self.transactions {
            tx.encode_to(sink);
        }
    }
}

fn txids_of(transactions: &[Transaction]) -> Vec<Txid> {
    transactions.iter().map(Transaction::txid).collect()
}
