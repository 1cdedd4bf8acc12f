use crate::error::ChainError;
use crate::transaction::TransactionRecord;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io;

/// Every mined block's hash must start with this many zero hex digits.
pub const DIFFICULTY_PREFIX: &str = "00";

/// `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// A block of file transactions.
///
/// The serde shape of this struct is exactly one element of the `/chain`
/// listing, so peer chains deserialise straight into `Vec<Block>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub transactions: Vec<TransactionRecord>,
    pub nonce: u64,
    pub hash: String,
    pub previous_hash: String,
    /// Seconds since the Unix epoch, fixed at construction.
    pub timestamp: f64,
}

impl Block {
    /// Builds a candidate block with `nonce = 0`, capturing the timestamp once.
    pub fn new(index: u64, transactions: Vec<TransactionRecord>, previous_hash: String) -> Self {
        Self::with_timestamp(index, transactions, previous_hash, current_timestamp())
    }

    pub fn with_timestamp(
        index: u64,
        transactions: Vec<TransactionRecord>,
        previous_hash: String,
        timestamp: f64,
    ) -> Self {
        let mut block = Block {
            index,
            transactions,
            nonce: 0,
            hash: String::new(),
            previous_hash,
            timestamp,
        };
        block.hash = block.compute_hash();
        block
    }

    pub fn genesis() -> Self {
        Self::new(0, Vec::new(), GENESIS_PREVIOUS_HASH.to_string())
    }

    /// Recomputes the digest from the block's own fields. Does not touch
    /// `self.hash`.
    pub fn compute_hash(&self) -> String {
        let payload = HashPayload {
            index: self.index,
            nonce: self.nonce,
            previous_hash: &self.previous_hash,
            timestamp: self.timestamp,
            transactions: self.transactions.iter().map(CanonicalRecord::from).collect(),
        };
        // Writing into a Vec cannot fail and the payload holds no maps or
        // non-finite floats; an error here means a broken invariant.
        let encoded = canonical_json(&payload).unwrap_or_default();
        hex::encode(Sha256::digest(&encoded))
    }

    /// Sets a new nonce and rehashes in one step so the hash invariant is
    /// never observable as broken.
    pub fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
        self.hash = self.compute_hash();
    }

    pub fn has_valid_hash(&self) -> bool {
        self.hash == self.compute_hash()
    }

    pub fn meets_difficulty(&self) -> bool {
        self.hash.starts_with(DIFFICULTY_PREFIX)
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash == GENESIS_PREVIOUS_HASH
    }
}

/// Current time as float seconds with microsecond resolution.
pub fn current_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

// Field declaration order below is the sorted key order of the digest
// encoding; do not reorder.
#[derive(Serialize)]
struct HashPayload<'a> {
    index: u64,
    nonce: u64,
    previous_hash: &'a str,
    timestamp: f64,
    transactions: Vec<CanonicalRecord<'a>>,
}

#[derive(Serialize)]
struct CanonicalRecord<'a> {
    file_data: &'a str,
    file_size: u64,
    user: &'a str,
    v_file: &'a str,
}

impl<'a> From<&'a TransactionRecord> for CanonicalRecord<'a> {
    fn from(tx: &'a TransactionRecord) -> Self {
        CanonicalRecord {
            file_data: &tx.file_data,
            file_size: tx.file_size,
            user: &tx.user,
            v_file: &tx.v_file,
        }
    }
}

/// Serialises `value` with the digest text encoding: `", "` and `": "`
/// separators, non-ASCII escaped as `\uXXXX`.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, ChainError> {
    let mut out = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut out, CanonicalFormatter);
    value.serialize(&mut ser)?;
    Ok(out)
}

struct CanonicalFormatter;

impl serde_json::ser::Formatter for CanonicalFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        // DEL is escaped along with everything outside printable ASCII.
        if fragment.bytes().all(|b| b < 0x7f) {
            return writer.write_all(fragment.as_bytes());
        }
        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if ch < '\u{7f}' {
                writer.write_all(&[ch as u8])?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    writer.write_all(format!("\\u{:04x}", unit).as_bytes())?;
                }
            }
        }
        Ok(())
    }
}
