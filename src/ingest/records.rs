use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::security::crypto::FieldEncryptor;

/// Field replaced by its ciphertext before ingestion.
pub const ENCRYPTED_FIELD: &str = "log";

pub type LogRecord = Map<String, Value>;

/// A batch of log records sent as one JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LogBatch {
    records: Vec<LogRecord>,
}

impl LogBatch {
    pub fn load(path: &Path) -> anyhow::Result<LogBatch> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}!", path.display()))?;
        LogBatch::from_json(&data)
            .with_context(|| format!("Failed to parse fixture {}!", path.display()))
    }

    pub fn from_json(data: &str) -> anyhow::Result<LogBatch> {
        let value: Value = serde_json::from_str(data)?;
        let Value::Array(items) = value else {
            bail!("Expected a JSON array of records!");
        };

        let records = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(record) => Ok(record),
                other => bail!("Record {index} is not a JSON object: {other}"),
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(LogBatch { records })
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Replaces `field` with its ciphertext in every record where it is present and not
    /// null. Returns how many records were encrypted.
    pub fn encrypt_field(&mut self, field: &str, encryptor: &FieldEncryptor) -> anyhow::Result<usize> {
        let mut encrypted = 0;

        for (index, record) in self.records.iter_mut().enumerate() {
            match record.get_mut(field) {
                None | Some(Value::Null) => {}
                Some(Value::String(plain_text)) => {
                    *plain_text = encryptor.encrypt_field(plain_text)?;
                    encrypted += 1;
                }
                Some(other) => bail!(
                    "Record {index} has a non-string {field:?} field: {other}"
                ),
            }
        }

        Ok(encrypted)
    }
}
