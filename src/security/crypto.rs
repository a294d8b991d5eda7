use std::fmt;
use std::str::FromStr;

use aes_siv::siv::Aes256Siv;
use aes_siv::KeyInit;
use anyhow::{anyhow, bail, Error};
use data_encoding::BASE64;

use crate::security::keyset::Keyset;

/// Length of the Tink output prefix: one version byte plus a big-endian key id.
pub const OUTPUT_PREFIX_LEN: usize = 5;

/// How an encrypted field is laid out on the wire.
///
/// `Tink` keeps the key-identifying output prefix; `Simple` drops it and sends the bare
/// SIV output, which is what the service expects for keys registered as raw key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CipherVariant {
    #[default]
    Tink,
    Simple,
}

impl FromStr for CipherVariant {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tink" => Ok(CipherVariant::Tink),
            "simple" => Ok(CipherVariant::Simple),
            other => bail!("Unknown cipher variant {other:?}, expected \"tink\" or \"simple\"!"),
        }
    }
}

impl fmt::Display for CipherVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherVariant::Tink => f.write_str("tink"),
            CipherVariant::Simple => f.write_str("simple"),
        }
    }
}

#[derive(Clone)]
struct SivKey {
    key_id: u32,
    prefix: Vec<u8>,
    material: Vec<u8>,
}

impl SivKey {
    fn cipher(&self) -> anyhow::Result<Aes256Siv> {
        Aes256Siv::new_from_slice(&self.material)
            .map_err(|_| anyhow!("Failed to create AES-SIV cipher for key {}!", self.key_id))
    }
}

/// Deterministic AEAD over the AES-SIV keys of a Tink keyset.
#[derive(Clone)]
pub struct DeterministicCipher {
    primary: SivKey,
    keys: Vec<SivKey>,
}

impl fmt::Debug for DeterministicCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeterministicCipher")
            .field("primary_key_id", &self.primary.key_id)
            .field("keys", &self.keys.len())
            .finish()
    }
}

impl DeterministicCipher {
    pub fn new(keyset: &Keyset) -> anyhow::Result<DeterministicCipher> {
        let primary = keyset.primary()?;

        let keys = keyset
            .enabled_keys()
            .map(|key| {
                Ok(SivKey {
                    key_id: key.key_id,
                    prefix: key.prefix(),
                    material: key.aes_siv_key()?,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let primary = keys
            .iter()
            .find(|key| key.key_id == primary.key_id)
            .cloned()
            .ok_or_else(|| anyhow!("Primary key {} was not loaded!", primary.key_id))?;

        Ok(DeterministicCipher { primary, keys })
    }

    pub fn primary_prefix(&self) -> &[u8] {
        &self.primary.prefix
    }

    /// Returns `prefix || SIV || ciphertext` under the primary key.
    pub fn encrypt_deterministically(
        &self,
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> anyhow::Result<Vec<u8>> {
        let sealed = self
            .primary
            .cipher()?
            .encrypt([associated_data], plaintext)
            .map_err(|_| anyhow!("Failed to encrypt!"))?;

        let mut result = Vec::with_capacity(self.primary.prefix.len() + sealed.len());
        result.extend_from_slice(&self.primary.prefix);
        result.extend_from_slice(&sealed);
        Ok(result)
    }

    /// Picks the key by output prefix first, then tries every raw key.
    pub fn decrypt_deterministically(
        &self,
        ciphertext: &[u8],
        associated_data: &[u8],
    ) -> anyhow::Result<Vec<u8>> {
        if ciphertext.len() > OUTPUT_PREFIX_LEN {
            let (prefix, sealed) = ciphertext.split_at(OUTPUT_PREFIX_LEN);
            for key in self.keys.iter().filter(|key| key.prefix == prefix) {
                if let Ok(plaintext) = key.cipher()?.decrypt([associated_data], sealed) {
                    return Ok(plaintext);
                }
            }
        }

        for key in self.keys.iter().filter(|key| key.prefix.is_empty()) {
            if let Ok(plaintext) = key.cipher()?.decrypt([associated_data], ciphertext) {
                return Ok(plaintext);
            }
        }

        bail!("Failed to decrypt!")
    }

    /// Decrypts output that was stripped of its prefix, using the primary key only.
    pub fn decrypt_unprefixed(
        &self,
        sealed: &[u8],
        associated_data: &[u8],
    ) -> anyhow::Result<Vec<u8>> {
        self.primary
            .cipher()?
            .decrypt([associated_data], sealed)
            .map_err(|_| anyhow!("Failed to decrypt!"))
    }
}

/// Encrypts individual record fields into the base64 text the ingestion endpoint expects.
#[derive(Debug, Clone)]
pub struct FieldEncryptor {
    cipher: DeterministicCipher,
    variant: CipherVariant,
}

impl FieldEncryptor {
    pub fn new(keyset: &Keyset, variant: CipherVariant) -> anyhow::Result<FieldEncryptor> {
        let cipher = DeterministicCipher::new(keyset)?;

        if variant == CipherVariant::Simple
            && cipher.primary_prefix().len() != OUTPUT_PREFIX_LEN
        {
            bail!("The simple variant needs a prefixed primary key, but the primary key is RAW!");
        }

        Ok(FieldEncryptor { cipher, variant })
    }

    pub fn variant(&self) -> CipherVariant {
        self.variant
    }

    pub fn encrypt_field(&self, plain_text: &str) -> anyhow::Result<String> {
        let cipher_text = self
            .cipher
            .encrypt_deterministically(plain_text.as_bytes(), b"")?;

        let wire = match self.variant {
            CipherVariant::Tink => &cipher_text[..],
            CipherVariant::Simple => &cipher_text[OUTPUT_PREFIX_LEN..],
        };

        Ok(BASE64.encode(wire))
    }

    pub fn decrypt_field(&self, encrypted_text: &str) -> anyhow::Result<String> {
        let data = BASE64.decode(encrypted_text.as_bytes())?;

        let plain_text = match self.variant {
            CipherVariant::Tink => self.cipher.decrypt_deterministically(&data, b"")?,
            CipherVariant::Simple => self.cipher.decrypt_unprefixed(&data, b"")?,
        };

        Ok(String::from_utf8(plain_text)?)
    }
}

