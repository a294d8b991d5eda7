use anyhow::Context;
use data_encoding::BASE64;
use prost::Message;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const AES_SIV_TYPE_URL: &str = "type.googleapis.com/google.crypto.tink.AesSivKey";

/// AES-SIV keys are always 512 bits: two 256-bit halves for S2V and CTR.
pub const AES_SIV_KEY_LEN: usize = 64;

/// Keyset shared with the service under test. For `simple` keys the service is
/// configured with the raw key material, but the keyset is still the source of it.
pub const DEFAULT_KEYSET_JSON: &str = r#"{"primaryKeyId":2939429116,"key":[{"keyData":{"typeUrl":"type.googleapis.com/google.crypto.tink.AesSivKey","value":"EkDqH9D86ii0QPF8EBhcZI1PkBKKdDGMPDS2wFITqqfjQ77RQbDROhhAXI8m5qUcYNbflns8Xo//BORbgtX0msbf","keyMaterialType":"SYMMETRIC"},"status":"ENABLED","keyId":2939429116,"outputPrefixType":"TINK"}]}"#;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeysetError {
    #[error("keyset has no keys")]
    Empty,
    #[error("primary key {0} is not present in the keyset")]
    MissingPrimary(u32),
    #[error("primary key {0} is not enabled")]
    PrimaryNotEnabled(u32),
    #[error("key {key_id} has unsupported type {type_url}")]
    UnsupportedType { key_id: u32, type_url: String },
    #[error("key {key_id} has unsupported version {version}")]
    UnsupportedVersion { key_id: u32, version: u32 },
    #[error("key {key_id} has {len} bytes of key material, expected {}", AES_SIV_KEY_LEN)]
    InvalidKeyLength { key_id: u32, len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyStatus {
    Enabled,
    Disabled,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutputPrefixType {
    Tink,
    Legacy,
    Raw,
    Crunchy,
}

impl OutputPrefixType {
    /// Bytes prepended to every ciphertext produced under a key with this prefix type.
    pub fn prefix(&self, key_id: u32) -> Vec<u8> {
        let version = match self {
            OutputPrefixType::Raw => return Vec::new(),
            OutputPrefixType::Tink => 0x01,
            OutputPrefixType::Legacy | OutputPrefixType::Crunchy => 0x00,
        };

        let mut prefix = Vec::with_capacity(5);
        prefix.push(version);
        prefix.extend_from_slice(&key_id.to_be_bytes());
        prefix
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyData {
    pub type_url: String,
    pub value: String,
    pub key_material_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeysetKey {
    pub key_data: KeyData,
    pub status: KeyStatus,
    pub key_id: u32,
    pub output_prefix_type: OutputPrefixType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keyset {
    pub primary_key_id: u32,
    pub key: Vec<KeysetKey>,
}

/// Wire form of `google.crypto.tink.AesSivKey`.
#[derive(Clone, PartialEq, Message)]
pub struct AesSivKeyProto {
    #[prost(uint32, tag = "1")]
    pub version: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub key_value: Vec<u8>,
}

impl Keyset {
    pub fn from_json(json: &str) -> anyhow::Result<Keyset> {
        let keyset: Keyset = serde_json::from_str(json).context("Failed to parse keyset JSON!")?;
        if keyset.key.is_empty() {
            return Err(KeysetError::Empty.into());
        }
        Ok(keyset)
    }

    pub fn embedded() -> anyhow::Result<Keyset> {
        Keyset::from_json(DEFAULT_KEYSET_JSON)
    }

    pub fn primary(&self) -> Result<&KeysetKey, KeysetError> {
        let primary = self
            .key
            .iter()
            .find(|key| key.key_id == self.primary_key_id)
            .ok_or(KeysetError::MissingPrimary(self.primary_key_id))?;

        if primary.status != KeyStatus::Enabled {
            return Err(KeysetError::PrimaryNotEnabled(primary.key_id));
        }

        Ok(primary)
    }

    pub fn enabled_keys(&self) -> impl Iterator<Item = &KeysetKey> {
        self.key.iter().filter(|key| key.status == KeyStatus::Enabled)
    }
}

impl KeysetKey {
    pub fn prefix(&self) -> Vec<u8> {
        self.output_prefix_type.prefix(self.key_id)
    }

    /// Decodes the serialized `AesSivKey` and returns its raw key material.
    pub fn aes_siv_key(&self) -> anyhow::Result<Vec<u8>> {
        if self.key_data.type_url != AES_SIV_TYPE_URL {
            return Err(KeysetError::UnsupportedType {
                key_id: self.key_id,
                type_url: self.key_data.type_url.clone(),
            }
            .into());
        }

        let serialized = BASE64
            .decode(self.key_data.value.as_bytes())
            .with_context(|| format!("Key {} value is not valid base64!", self.key_id))?;

        let key = AesSivKeyProto::decode(serialized.as_slice())
            .with_context(|| format!("Key {} value is not a valid AesSivKey!", self.key_id))?;

        if key.version != 0 {
            return Err(KeysetError::UnsupportedVersion {
                key_id: self.key_id,
                version: key.version,
            }
            .into());
        }

        if key.key_value.len() != AES_SIV_KEY_LEN {
            return Err(KeysetError::InvalidKeyLength {
                key_id: self.key_id,
                len: key.key_value.len(),
            }
            .into());
        }

        Ok(key.key_value)
    }
}
