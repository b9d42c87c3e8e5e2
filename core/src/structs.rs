use std::{fmt, str::FromStr};

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Placeholder written for any hex field whose value is unavailable.
pub const SENTINEL: &str = "0x";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DkimMetadata {
    pub domain: String,
    pub selector: String,
}

impl DkimMetadata {
    pub fn new(domain: impl Into<String>, selector: impl Into<String>) -> Option<Self> {
        let domain = domain.into();
        let selector = selector.into();
        if domain.is_empty() || selector.is_empty() {
            return None;
        }
        Some(Self { domain, selector })
    }
}

/// A 32-byte value that may be absent. Absence renders as [`SENTINEL`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HexDigest {
    #[default]
    Absent,
    Present(B256),
}

/// Keccak-256 of the DKIM public key bytes, or absent when DNS failed.
pub type PublicKeyHash = HexDigest;

impl HexDigest {
    pub fn is_absent(&self) -> bool {
        matches!(self, HexDigest::Absent)
    }
}

impl From<B256> for HexDigest {
    fn from(value: B256) -> Self {
        HexDigest::Present(value)
    }
}

impl From<Option<B256>> for HexDigest {
    fn from(value: Option<B256>) -> Self {
        value.map_or(HexDigest::Absent, HexDigest::Present)
    }
}

impl fmt::Display for HexDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HexDigest::Absent => f.write_str(SENTINEL),
            HexDigest::Present(value) => write!(f, "{value}"),
        }
    }
}

impl FromStr for HexDigest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == SENTINEL {
            return Ok(HexDigest::Absent);
        }
        B256::from_str(s)
            .map(HexDigest::Present)
            .map_err(|e| format!("invalid 32-byte hex value {s:?}: {e}"))
    }
}

impl Serialize for HexDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HexDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Per-guardian secret salt. Supplied by configuration, never derived.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GuardianSalt(B256);

impl fmt::Debug for GuardianSalt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GuardianSalt(..)")
    }
}

impl FromStr for GuardianSalt {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        B256::from_str(s.trim())
            .map(Self)
            .map_err(|e| format!("salt must be 32 bytes of hex: {e}"))
    }
}

impl From<Option<GuardianSalt>> for HexDigest {
    fn from(value: Option<GuardianSalt>) -> Self {
        value.map(|salt| salt.0).into()
    }
}

/// A guardian identified by lowercase email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailIdentity(String);

impl EmailIdentity {
    /// Normalises to lowercase; rejects strings without a local part and domain.
    pub fn new(address: &str) -> Option<Self> {
        let address = address.trim().to_lowercase();
        let (local, domain) = address.split_once('@')?;
        if local.is_empty() || domain.is_empty() || address.contains(char::is_whitespace) {
            return None;
        }
        Some(Self(address))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for EmailIdentity {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value).ok_or_else(|| format!("not an email address: {value:?}"))
    }
}

impl From<EmailIdentity> for String {
    fn from(value: EmailIdentity) -> Self {
        value.0
    }
}

/// A guardian identified by its on-chain email-auth contract address.
///
/// Not interchangeable with [`EmailIdentity`]; the two are related only
/// through a guardian registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AuthenticatorAddress(Address);

impl fmt::Display for AuthenticatorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl FromStr for AuthenticatorAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_str(s.trim())
            .map(Self)
            .map_err(|e| format!("invalid address {s:?}: {e}"))
    }
}

impl Serialize for AuthenticatorAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AuthenticatorAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Canonical per-email proof record, field names as consumed on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailProof {
    pub domain_name: String,
    pub public_key_hash: PublicKeyHash,
    pub timestamp: u64,
    pub masked_command: String,
    pub email_nullifier: B256,
    pub account_salt: HexDigest,
    pub is_code_exist: bool,
    /// Encoded Groth16 proof; empty means no proof yet and renders as `0x`.
    pub proof: Bytes,
}

impl EmailProof {
    /// A record carrying any sentinel cannot be accepted by the verifier.
    pub fn is_submittable(&self) -> bool {
        !self.public_key_hash.is_absent()
            && !self.account_salt.is_absent()
            && !self.proof.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAuthMsg {
    pub template_id: B256,
    pub command_params: Vec<String>,
    pub skipped_command_prefix: u64,
    pub proof: EmailProof,
}

/// A BN254 field element in transport form: decimal or `0x`-hex text.
///
/// Parsed into a 256-bit integer only when encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldElement(pub String);

impl FieldElement {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<U256> for FieldElement {
    fn from(value: U256) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Groth16Proof {
    pub pi_a: [FieldElement; 2],
    pub pi_b: [[FieldElement; 2]; 2],
    pub pi_c: [FieldElement; 2],
    #[serde(rename = "publicSignals", default)]
    pub public_signals: Vec<FieldElement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitInput {
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "maxLength")]
    pub max_length: usize,
}

impl CircuitInput {
    pub fn new(name: &str, value: impl Into<String>, kind: &str, max_length: usize) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
            kind: kind.to_string(),
            max_length,
        }
    }
}

/// Context written next to an [`EmailAuthMsg`] for whoever submits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofMetadata {
    pub email: EmailIdentity,
    pub email_auth: AuthenticatorAddress,
    pub wallet_address: String,
    pub dkim_registry: String,
    pub verifier: String,
    /// Generation time, milliseconds since the epoch.
    pub timestamp: i64,
    pub status: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofPackage {
    pub email_auth_msg: EmailAuthMsg,
    pub metadata: ProofMetadata,
}
