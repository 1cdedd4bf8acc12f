//! Validation of raw submissions, separated from type definitions
use serde_json::{Map, Value};

use crate::error::ChainError;
use crate::transaction::types::{TransactionRecord, REQUIRED_FIELDS};

impl TransactionRecord {
    /// Validates a raw JSON submission and builds a record from it.
    ///
    /// Checks run in a fixed order so the first offending field is the one
    /// reported: presence of all four fields, string-typed `user`/`v_file`,
    /// hex `file_data`, then a non-negative integer `file_size`.
    pub fn from_json(value: &Value) -> Result<Self, ChainError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ChainError::validation("Transaction must be a JSON object"))?;

        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| !obj.contains_key(*field))
            .collect();
        if !missing.is_empty() {
            return Err(ChainError::validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let user = string_field(obj, "user")?;
        let v_file = string_field(obj, "v_file")?;

        let file_data = obj["file_data"]
            .as_str()
            .ok_or_else(|| ChainError::validation("file_data must be a string (hex encoded)"))?;
        validate_hex(file_data)?;

        let file_size = obj["file_size"]
            .as_u64()
            .ok_or_else(|| ChainError::validation("file_size must be a non-negative integer"))?;

        Ok(TransactionRecord::new(user, v_file, file_data, file_size))
    }

    /// Re-checks an already-typed record (used for records built in-process).
    pub fn validate(&self) -> Result<(), ChainError> {
        validate_hex(&self.file_data)
    }
}

fn string_field(obj: &Map<String, Value>, field: &str) -> Result<String, ChainError> {
    obj[field]
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| ChainError::validation(format!("{} must be a string", field)))
}

fn validate_hex(file_data: &str) -> Result<(), ChainError> {
    hex::decode(file_data)
        .map(|_| ())
        .map_err(|_| ChainError::validation("file_data must be valid hex string"))
}
