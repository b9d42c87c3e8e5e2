use std::sync::LazyLock;

use async_trait::async_trait;
use base64::{
    alphabet,
    engine::{general_purpose::GeneralPurpose, DecodePaddingMode, GeneralPurposeConfig},
    Engine as _,
};
use log::{debug, warn};
use regex::Regex;

use crate::{
    digest::hash,
    error::ResolveError,
    structs::{DkimMetadata, PublicKeyHash},
};

/// Standard alphabet; `=` padding optional on decode.
const KEY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

static P_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"p=([A-Za-z0-9/+]+=*)").expect("static regex"));

/// A TXT record as its ordered character-strings.
pub type TxtRecord = Vec<Vec<u8>>;

/// Capability: resolve TXT records for a DNS name.
#[async_trait]
pub trait TxtLookup: Send + Sync {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<TxtRecord>, ResolveError>;
}

pub fn join_txt_records(records: &[TxtRecord]) -> String {
    records
        .iter()
        .flatten()
        .map(|chunk| String::from_utf8_lossy(chunk))
        .collect()
}

/// Decodes the `p=` tag of a joined DKIM TXT record.
pub fn parse_public_key(txt: &str) -> Result<Vec<u8>, ResolveError> {
    let b64 = P_TAG
        .captures(txt)
        .and_then(|caps| caps.get(1))
        .ok_or(ResolveError::MissingPublicKey)?;
    KEY_ENGINE
        .decode(b64.as_str())
        .map_err(|e| ResolveError::InvalidBase64(e.to_string()))
}

pub async fn retrieve_public_key(
    lookup: &dyn TxtLookup,
    selector: &str,
    domain: &str,
) -> Result<Vec<u8>, ResolveError> {
    let name = format!("{selector}._domainkey.{domain}");
    debug!("Resolving TXT {}", name);
    let records = lookup.lookup_txt(&name).await?;
    parse_public_key(&join_txt_records(&records))
}

/// Keccak-256 of the signer's public key, or the sentinel when anything
/// about the lookup fails. Never retried.
pub async fn resolve_public_key_hash(
    lookup: &dyn TxtLookup,
    selector: &str,
    domain: &str,
) -> PublicKeyHash {
    match retrieve_public_key(lookup, selector, domain).await {
        Ok(key) => PublicKeyHash::Present(hash(&key)),
        Err(e) => {
            warn!("DNS {}._domainkey.{}: {}", selector, domain, e);
            PublicKeyHash::Absent
        }
    }
}

pub async fn resolve_for(lookup: &dyn TxtLookup, dkim: &DkimMetadata) -> PublicKeyHash {
    resolve_public_key_hash(lookup, &dkim.selector, &dkim.domain).await
}
