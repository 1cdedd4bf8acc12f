//! Transaction types for FileChain
use serde::{Deserialize, Serialize};

/// Field names every submission must carry, in the order they are reported
/// when missing.
pub const REQUIRED_FIELDS: [&str; 4] = ["user", "v_file", "file_data", "file_size"];

/// A file-transaction record as submitted by the storage front end.
///
/// `file_data` is the hex encoding of the file bytes. Ownership is tracked
/// only through the opaque `user` string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub user: String,
    pub v_file: String,
    pub file_data: String,
    pub file_size: u64,
}

impl TransactionRecord {
    pub fn new(
        user: impl Into<String>,
        v_file: impl Into<String>,
        file_data: impl Into<String>,
        file_size: u64,
    ) -> Self {
        TransactionRecord {
            user: user.into(),
            v_file: v_file.into(),
            file_data: file_data.into(),
            file_size,
        }
    }

    /// Builds a record from raw file bytes.
    pub fn from_bytes(user: impl Into<String>, v_file: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(user, v_file, hex::encode(bytes), bytes.len() as u64)
    }

    /// Decoded file contents.
    pub fn file_bytes(&self) -> Result<Vec<u8>, hex::FromHexError> {
        hex::decode(&self.file_data)
    }

    pub fn summary(&self) -> TransactionSummary {
        TransactionSummary::from(self)
    }
}

/// The stripped view of a record (no `file_data`) returned by `/mine`,
/// `/pending_tx` and the `/new_transaction` echo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub user: String,
    pub v_file: String,
    pub file_size: u64,
}

impl From<&TransactionRecord> for TransactionSummary {
    fn from(record: &TransactionRecord) -> Self {
        TransactionSummary {
            user: record.user.clone(),
            v_file: record.v_file.clone(),
            file_size: record.file_size,
        }
    }
}
