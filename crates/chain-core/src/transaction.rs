//! Transactions and their canonical serialization.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! version:u32 [marker:0x00 flag:0x01]
//! input_count:compact  { outpoint_txid:32 outpoint_index:u32 script_sig:var_bytes sequence:u32 }*
//! output_count:compact { value:u64 script_pubkey:var_bytes }*
//! [ per input: item_count:compact { item:var_bytes }* ]
//! lock_time:u32
//! ```
//!
//! The bracketed parts appear only when some input carries witness data.
//! The transaction id is the double SHA256 of this full encoding.

use serde::{Deserialize, Serialize};

use crate::codec::{ByteSink, Encodable};
use crate::consts::{SEGWIT_FLAG, SEGWIT_MARKER};
use crate::error::TransactionError;
use crate::hash::{double_sha256, Hash256};

/// Identifier of a transaction: the double SHA256 of its canonical encoding.
pub type Txid = Hash256;

/// Witness stack of one input.
pub type Witness = Vec<Vec<u8>>;

/// Reference to an output of an earlier transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct OutPoint {
    /// Transaction holding the output being spent.
    #[serde(with = "hex::serde")]
    pub txid: Txid,
    /// Index of that output.
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: Txid, vout: u32) -> Self {
        OutPoint { txid, vout }
    }
}

/// A transaction input.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TxIn {
    pub previous_output: OutPoint,
    /// Unlocking script. Opaque to this crate.
    #[serde(with = "hex::serde")]
    pub script_sig: Vec<u8>,
    pub sequence: u32,
    /// Witness stack; empty for legacy inputs.
    #[serde(default, with = "witness_hex")]
    pub witness: Witness,
}

impl TxIn {
    /// A legacy input with the given unlocking script.
    pub fn new(previous_output: OutPoint, script_sig: Vec<u8>, sequence: u32) -> Self {
        TxIn {
            previous_output,
            script_sig,
            sequence,
            witness: Vec::new(),
        }
    }

    /// Attach a witness stack.
    pub fn with_witness(mut self, witness: Witness) -> Self {
        self.witness = witness;
        self
    }

    pub fn has_witness(&self) -> bool {
        !self.witness.is_empty()
    }
}

impl Encodable for TxIn {
    fn encode_to<S: ByteSink + ?Sized>(&self, sink: &mut S) {
        sink.put_slice(&self.previous_output.txid);
        sink.put_u32_le(self.previous_output.vout);
        sink.put_var_bytes(&self.script_sig);
        sink.put_u32_le(self.sequence);
    }
}

/// A transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TxOut {
    /// Amount in base units.
    pub value: u64,
    /// Locking script. Opaque to this crate.
    #[serde(with = "hex::serde")]
    pub script_pubkey: Vec<u8>,
}

impl TxOut {
    pub fn new(value: u64, script_pubkey: Vec<u8>) -> Self {
        TxOut { value, script_pubkey }
    }
}

impl Encodable for TxOut {
    fn encode_to<S: ByteSink + ?Sized>(&self, sink: &mut S) {
        sink.put_u64_le(self.value);
        sink.put_var_bytes(&self.script_pubkey);
    }
}

/// A transaction.
///
/// `marker` and `flag` must be `0x00`/`0x01` when any input carries witness
/// data and `0x00`/`0x00` otherwise. [`Transaction::new`] sets them for you.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    #[serde(default)]
    pub marker: u8,
    #[serde(default)]
    pub flag: u8,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    /// Build a transaction, deriving marker and flag from the inputs.
    pub fn new(version: u32, inputs: Vec<TxIn>, outputs: Vec<TxOut>, lock_time: u32) -> Self {
        let mut tx = Transaction {
            version,
            marker: 0,
            flag: 0,
            inputs,
            outputs,
            lock_time,
        };
        tx.sync_segwit_flags();
        tx
    }

    /// True if any input carries a non-empty witness stack.
    pub fn is_segwit(&self) -> bool {
        self.inputs.iter().any(TxIn::has_witness)
    }

    /// Reset marker and flag to match the current witness data.
    ///
    /// Call after editing witnesses on an existing transaction.
    pub fn sync_segwit_flags(&mut self) {
        self.marker = SEGWIT_MARKER;
        self.flag = if self.is_segwit() { SEGWIT_FLAG } else { 0 };
    }

    /// Check that marker and flag agree with the witness data.
    pub fn check_segwit_flags(&self) -> Result<(), TransactionError> {
        let segwit = self.is_segwit();
        let expected_flag = if segwit { SEGWIT_FLAG } else { 0 };
        if self.marker != SEGWIT_MARKER || self.flag != expected_flag {
            return Err(TransactionError::InconsistentSegwitFlags {
                segwit,
                marker: self.marker,
                flag: self.flag,
            });
        }
        Ok(())
    }

    /// Canonical encoding, or the flag inconsistency that prevents it.
    pub fn try_serialize(&self) -> Result<Vec<u8>, TransactionError> {
        self.check_segwit_flags()?;
        let mut buf = Vec::with_capacity(self.size_hint());
        self.encode_unchecked(&mut buf);
        Ok(buf)
    }

    /// Canonical encoding.
    ///
    /// # Panics
    ///
    /// If `marker`/`flag` disagree with the witness data. That is a bug in
    /// whoever built the transaction, not a property of untrusted input.
    pub fn serialize(&self) -> Vec<u8> {
        self.encoded()
    }

    /// The transaction id: double SHA256 of [`Transaction::serialize`].
    ///
    /// # Panics
    ///
    /// Same conditions as [`Transaction::serialize`].
    pub fn txid(&self) -> Txid {
        double_sha256(&self.serialize())
    }

    /// Sum of all output values, `None` on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |total, out| total.checked_add(out.value))
    }

    fn size_hint(&self) -> usize {
        let inputs: usize = self.inputs.iter().map(|i| 41 + i.script_sig.len()).sum();
        let outputs: usize = self.outputs.iter().map(|o| 9 + o.script_pubkey.len()).sum();
        10 + inputs + outputs
    }

    fn encode_unchecked<S: ByteSink + ?Sized>(&self, sink: &mut S) {
        let segwit = self.is_segwit();

        sink.put_u32_le(self.version);

        if segwit {
            sink.put_u8(self.marker);
            sink.put_u8(self.flag);
        }

        sink.put_compact_size(self.inputs.len() as u64);
        for input in &self.inputs {
            input.encode_to(sink);
        }

        sink.put_compact_size(self.outputs.len() as u64);
        for output in &self.outputs {
            output.encode_to(sink);
        }

        if segwit {
            for input in &self.inputs {
                sink.put_compact_size(input.witness.len() as u64);
                for item in &input.witness {
                    sink.put_var_bytes(item);
                }
            }
        }

        sink.put_u32_le(self.lock_time);
    }
}

impl Encodable for Transaction {
    fn encode_to<S: ByteSink + ?Sized>(&self, sink: &mut S) {
        if let Err(err) = self.check_segwit_flags() {
            panic!("{}", err);
        }
        self.encode_unchecked(sink);
    }
}

/// Witness stacks as a list of hex strings.
mod witness_hex {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    use super::Witness;

    pub fn serialize<S: Serializer>(witness: &Witness, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(witness.iter().map(hex::encode))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Witness, D::Error> {
        let items = Vec::<String>::deserialize(deserializer)?;
        items
            .iter()
            .map(|item| hex::decode(item).map_err(D::Error::custom))
            .collect()
    }
}
