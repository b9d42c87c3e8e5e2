use std::{fmt, str::FromStr};

use alloy_primitives::{keccak256, B256};
use serde::{Deserialize, Serialize};

use crate::structs::HexDigest;

pub fn hash(data: impl AsRef<[u8]>) -> B256 {
    keccak256(data)
}

/// Nullifier from a message identifier, surrounding whitespace ignored.
pub fn compute_nullifier(message_id: &str) -> B256 {
    hash(message_id.trim())
}

/// Nullifier from the raw message concatenated with the rendered account salt.
pub fn compute_nullifier_alt(raw_email: &str, account_salt: &HexDigest) -> B256 {
    hash(format!("{raw_email}{account_salt}"))
}

pub fn compute_template_id(index: u32) -> B256 {
    hash(format!("acceptance_template_{index}"))
}

/// How `emailNullifier` is derived. The two schemes give different values
/// for the same email; a deployment uses exactly one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NullifierScheme {
    /// `keccak256(trim(Message-ID))`.
    #[default]
    MessageId,
    /// `keccak256(raw message ++ accountSalt)`.
    HeaderSalt,
}

impl fmt::Display for NullifierScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NullifierScheme::MessageId => f.write_str("message-id"),
            NullifierScheme::HeaderSalt => f.write_str("header-salt"),
        }
    }
}

impl FromStr for NullifierScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message-id" => Ok(NullifierScheme::MessageId),
            "header-salt" => Ok(NullifierScheme::HeaderSalt),
            other => Err(format!(
                "unknown nullifier scheme {other:?} (expected message-id or header-salt)"
            )),
        }
    }
}
