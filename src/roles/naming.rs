use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::anyhow;
use data_encoding::HEXLOWER;
use ring::rand::{self, SecureRandom};
use serde::Serialize;

pub const ROLE_NAME_PREFIX: &str = "role_";

static NEXT_ROLE: AtomicU64 = AtomicU64::new(1);

/// Name of a role within an org.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RoleName(String);

impl RoleName {
    pub fn new(name: impl Into<String>) -> RoleName {
        RoleName(name.into())
    }

    /// A name no other call in this process, and almost surely no other process, hands out:
    /// `role_<pid>_<counter>_<random>`.
    pub fn unique() -> anyhow::Result<RoleName> {
        let rng = rand::SystemRandom::new();
        let mut token = [0u8; 4];
        rng.fill(&mut token)
            .map_err(|_| anyhow!("Failed to generate a role name token!"))?;

        Ok(RoleName(format!(
            "{}{}_{}_{}",
            ROLE_NAME_PREFIX,
            std::process::id(),
            NEXT_ROLE.fetch_add(1, Ordering::Relaxed),
            HEXLOWER.encode(&token)
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RoleName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
