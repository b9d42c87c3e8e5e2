//! Turns parsed emails into [`EmailProof`] records and [`ProofPackage`]s.
//!
//! Emails are processed one at a time, DNS and proving included. Failures
//! are contained per email: header problems and prover errors skip the
//! email, DNS failures and missing salts degrade fields to the sentinel.

use std::{collections::BTreeMap, fmt};

use alloy_primitives::{Address, Bytes, B256};
use log::{info, warn};
use serde::Serialize;

use crate::{
    digest::{compute_nullifier, compute_nullifier_alt, compute_template_id, NullifierScheme},
    dkim::{resolve_for, TxtLookup},
    encoding::encode_groth16,
    error::AssemblyError,
    guardian::{AddressBook, GuardianRegistry, SaltStore, DKIM_REGISTRY, GROTH16_VERIFIER},
    header::RawEmail,
    prover::Prover,
    structs::{
        AuthenticatorAddress, CircuitInput, EmailAuthMsg, EmailIdentity, EmailProof,
        GuardianSalt, HexDigest, ProofMetadata, ProofPackage,
    },
    template::{default_templates, CommandTemplate},
};

/// Unix seconds.
pub type Clock = fn() -> u64;

fn system_clock() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

/// Deployment-wide assembly parameters. Read-only for a run.
#[derive(Debug, Clone)]
pub struct AssemblySettings {
    /// Wallet whose recovery the guardians approve.
    pub account: Address,
    pub template_index: u32,
    pub template: CommandTemplate,
    pub nullifier_scheme: NullifierScheme,
    pub addresses: AddressBook,
    pub clock: Clock,
}

impl AssemblySettings {
    /// Acceptance template, message-id nullifiers, system clock.
    pub fn new(account: Address) -> Self {
        let template = default_templates()
            .remove("0")
            .unwrap_or_else(|| CommandTemplate::new(&[], ""));
        Self {
            account,
            template_index: 0,
            template,
            nullifier_scheme: NullifierScheme::default(),
            addresses: AddressBook::new(),
            clock: system_clock,
        }
    }

    /// The command the on-chain template expects, independent of the email.
    pub fn masked_command(&self) -> String {
        self.template.render(&self.account)
    }

    pub fn template_id(&self) -> B256 {
        compute_template_id(self.template_index)
    }
}

/// Output keyed by guardian identity. A later email for the same key
/// replaces the earlier one.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct ProofSet<K: Ord, V> {
    entries: BTreeMap<K, V>,
}

impl<K: Ord, V> Default for ProofSet<K, V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<K: Ord + fmt::Display, V> ProofSet<K, V> {
    pub fn insert(&mut self, source: &str, key: K, value: V) {
        if self.entries.contains_key(&key) {
            warn!("{}: replaces earlier entry for {}", source, key);
        }
        self.entries.insert(key, value);
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }
}

/// Combines header metadata, DNS, salts and the prover.
pub struct ProofAssembler<'a> {
    lookup: &'a dyn TxtLookup,
    prover: &'a dyn Prover,
    settings: AssemblySettings,
}

impl<'a> ProofAssembler<'a> {
    pub fn new(
        lookup: &'a dyn TxtLookup,
        prover: &'a dyn Prover,
        settings: AssemblySettings,
    ) -> Self {
        Self {
            lookup,
            prover,
            settings,
        }
    }

    /// ARC-Seal `t=`, else `Date:`, else now.
    pub fn timestamp(&self, email: &RawEmail) -> u64 {
        email
            .arc_timestamp()
            .or_else(|| email.date())
            .unwrap_or_else(self.settings.clock)
    }

    fn nullifier(
        &self,
        email: &RawEmail,
        sender: &EmailIdentity,
        timestamp: u64,
        salt: &HexDigest,
    ) -> B256 {
        match self.settings.nullifier_scheme {
            NullifierScheme::MessageId => match email.message_id() {
                Some(id) => compute_nullifier(id),
                None => compute_nullifier(&format!("{sender}{timestamp}")),
            },
            NullifierScheme::HeaderSalt => compute_nullifier_alt(email.as_str(), salt),
        }
    }

    /// Builds the record for one email with `proof` left as the sentinel.
    pub async fn assemble(
        &self,
        source: &str,
        email: &RawEmail,
        salt: Option<GuardianSalt>,
    ) -> Result<EmailProof, AssemblyError> {
        let sender = email.sender().ok_or(AssemblyError::MissingSender)?;
        let dkim = email.dkim_metadata()?;
        info!("  Domain: {}, Selector: {}", dkim.domain, dkim.selector);

        let public_key_hash = resolve_for(self.lookup, &dkim).await;
        if public_key_hash.is_absent() {
            warn!("{}: public key hash unavailable, recording 0x", source);
        }

        let timestamp = self.timestamp(email);
        if salt.is_none() {
            warn!("{}: no salt for {}, recording 0x", source, sender);
        }
        let account_salt = HexDigest::from(salt);
        let email_nullifier = self.nullifier(email, sender, timestamp, &account_salt);

        Ok(EmailProof {
            domain_name: dkim.domain,
            public_key_hash,
            timestamp,
            masked_command: self.settings.masked_command(),
            email_nullifier,
            account_salt,
            is_code_exist: true,
            proof: Bytes::new(),
        })
    }

    /// Email-keyed record without a proof.
    pub async fn email_proof(
        &self,
        source: &str,
        email: &RawEmail,
        salts: &SaltStore<EmailIdentity>,
    ) -> Result<(EmailIdentity, EmailProof), AssemblyError> {
        let sender = email.sender().ok_or(AssemblyError::MissingSender)?.clone();
        let record = self.assemble(source, email, salts.get(&sender)).await?;
        Ok((sender, record))
    }

    /// Circuit inputs for one guardian.
    pub fn circuit_inputs(&self, account_salt: &HexDigest) -> Vec<CircuitInput> {
        vec![
            CircuitInput::new("ethAddr", format!("{:#x}", self.settings.account), "bytes20", 20),
            CircuitInput::new("accountSalt", account_salt.to_string(), "bytes32", 32),
        ]
    }

    /// Authenticator-keyed submission package with an encoded proof.
    pub async fn auth_package(
        &self,
        source: &str,
        email: &RawEmail,
        registry: &GuardianRegistry,
        salts: &SaltStore<AuthenticatorAddress>,
    ) -> Result<(AuthenticatorAddress, ProofPackage), AssemblyError> {
        let sender = email.sender().ok_or(AssemblyError::MissingSender)?.clone();
        let authenticator = registry
            .authenticator_for(&sender)
            .ok_or_else(|| AssemblyError::UnknownGuardian(sender.to_string()))?;
        info!("  Guardian: {} -> {}", sender, authenticator);

        let mut record = self.assemble(source, email, salts.get(&authenticator)).await?;
        let inputs = self.circuit_inputs(&record.account_salt);
        let proof = self.prover.prove(email.as_str(), &inputs).await?;
        record.proof = encode_groth16(&proof)?;

        let (status, note) = if record.is_submittable() {
            ("generated", "ZK Email proof package ready for on-chain submission")
        } else {
            ("degraded", "Contains sentinel values; not submittable on-chain")
        };
        let settings = &self.settings;
        let package = ProofPackage {
            email_auth_msg: EmailAuthMsg {
                template_id: settings.template_id(),
                command_params: settings.template.command_params(&settings.account),
                skipped_command_prefix: 0,
                proof: record,
            },
            metadata: ProofMetadata {
                email: sender,
                email_auth: authenticator,
                wallet_address: settings.account.to_checksum(None),
                dkim_registry: settings.addresses.get(DKIM_REGISTRY).cloned().unwrap_or_default(),
                verifier: settings.addresses.get(GROTH16_VERIFIER).cloned().unwrap_or_default(),
                timestamp: i64::try_from((settings.clock)().saturating_mul(1000))
                    .unwrap_or(i64::MAX),
                status: status.to_string(),
                note: note.to_string(),
            },
        };
        Ok((authenticator, package))
    }

    /// Runs the email-keyed stage over `emails` in the order given.
    pub async fn collect_email_proofs<I>(
        &self,
        emails: I,
        salts: &SaltStore<EmailIdentity>,
    ) -> ProofSet<EmailIdentity, EmailProof>
    where
        I: IntoIterator<Item = (String, RawEmail)>,
    {
        let mut out = ProofSet::default();
        for (source, email) in emails {
            info!("Processing {}...", source);
            match self.email_proof(&source, &email, salts).await {
                Ok((key, record)) => {
                    info!("✓ extracted {}", key);
                    out.insert(&source, key, record);
                }
                Err(e) => warn!("{}: {}", source, e),
            }
        }
        out
    }

    /// Runs the authenticator-keyed stage over `emails` in the order given.
    pub async fn collect_auth_packages<I>(
        &self,
        emails: I,
        registry: &GuardianRegistry,
        salts: &SaltStore<AuthenticatorAddress>,
    ) -> ProofSet<AuthenticatorAddress, ProofPackage>
    where
        I: IntoIterator<Item = (String, RawEmail)>,
    {
        let mut out = ProofSet::default();
        for (source, email) in emails {
            info!("Processing {}...", source);
            match self.auth_package(&source, &email, registry, salts).await {
                Ok((key, package)) => {
                    info!("✓ proof package for {}", key);
                    out.insert(&source, key, package);
                }
                Err(e) => warn!("{}: {}", source, e),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        digest::hash,
        dkim::testing::StaticZone,
        encoding::ENCODED_PROOF_SIZE,
        error::{ParseError, ProverError},
        prover::NullProver,
        structs::Groth16Proof,
    };

    const SALT: &str = "0xdeadbeef00000000000000000000000000000000000000000000000000000001";
    const AUTH: &str = "0xad7a5f378eb92435b9ce18ddcc0ca5ebc396af21";

    fn alice_email() -> RawEmail {
        RawEmail::new(
            "From: Alice <alice@example.com>\r\n\
Subject: whatever the user typed\r\n\
Message-ID: <m1@example.com>\r\n\
Date: Tue, 14 May 2024 10:00:00 +0000\r\n\
DKIM-Signature: v=1; a=rsa-sha256; d=example.com;\r\n s=sel1; b=xyz\r\n\
\r\n\
hello\r\n",
        )
    }

    fn zone() -> StaticZone {
        StaticZone::default().with("sel1._domainkey.example.com", &["v=DKIM1; k=rsa; p=AAAA"])
    }

    fn settings() -> AssemblySettings {
        let account = Address::from_str("0x5615dEB798BB3E4dFa0139dFa1b3D433Cc23b72f").unwrap();
        let mut settings = AssemblySettings::new(account);
        settings.clock = || 1_800_000_000;
        settings
    }

    fn alice() -> EmailIdentity {
        EmailIdentity::new("alice@example.com").unwrap()
    }

    fn email_salts() -> SaltStore<EmailIdentity> {
        [(alice(), GuardianSalt::from_str(SALT).unwrap())].into_iter().collect()
    }

    struct FailingProver;

    #[async_trait]
    impl Prover for FailingProver {
        async fn prove(
            &self,
            _raw: &str,
            _inputs: &[CircuitInput],
        ) -> Result<Groth16Proof, ProverError> {
            Err(ProverError::Network("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn resolved_email_yields_full_record() {
        let zone = zone();
        let assembler = ProofAssembler::new(&zone, &NullProver, settings());
        let (key, record) = assembler
            .email_proof("alice.eml", &alice_email(), &email_salts())
            .await
            .unwrap();

        assert_eq!(key, alice());
        assert_eq!(record.domain_name, "example.com");
        assert_eq!(record.public_key_hash, HexDigest::Present(hash([0u8, 0, 0])));
        assert_eq!(record.account_salt.to_string(), SALT);
        assert_eq!(record.timestamp, 1_715_680_800);
        assert_eq!(record.email_nullifier, hash("<m1@example.com>"));
        assert_eq!(
            record.masked_command,
            "Accept guardian request for 0x5615deb798bb3e4dfa0139dfa1b3d433cc23b72f"
        );
        assert!(record.is_code_exist);
        assert_eq!(record.proof.to_string(), "0x");
    }

    #[tokio::test]
    async fn dns_failure_degrades_instead_of_skipping() {
        let zone = StaticZone::default();
        let assembler = ProofAssembler::new(&zone, &NullProver, settings());
        let (_, record) = assembler
            .email_proof("alice.eml", &alice_email(), &email_salts())
            .await
            .unwrap();
        assert!(record.public_key_hash.is_absent());
        assert!(record.is_code_exist);
    }

    #[tokio::test]
    async fn missing_salt_degrades() {
        let zone = zone();
        let assembler = ProofAssembler::new(&zone, &NullProver, settings());
        let (_, record) = assembler
            .email_proof("alice.eml", &alice_email(), &SaltStore::new())
            .await
            .unwrap();
        assert_eq!(serde_json::to_value(&record).unwrap()["accountSalt"], "0x");
    }

    #[tokio::test]
    async fn missing_sender_or_dkim_skips() {
        let zone = zone();
        let assembler = ProofAssembler::new(&zone, &NullProver, settings());
        let no_from = RawEmail::new("DKIM-Signature: d=example.com; s=sel1\r\n\r\nhi");
        assert_eq!(
            assembler.email_proof("a.eml", &no_from, &email_salts()).await.unwrap_err(),
            AssemblyError::MissingSender
        );
        let no_dkim = RawEmail::new("From: alice@example.com\r\n\r\nhi");
        assert!(matches!(
            assembler.email_proof("b.eml", &no_dkim, &email_salts()).await,
            Err(AssemblyError::Dkim(ParseError::MissingHeader { .. }))
        ));
    }

    #[tokio::test]
    async fn timestamp_falls_back_to_clock() {
        let zone = zone();
        let assembler = ProofAssembler::new(&zone, &NullProver, settings());
        let undated = RawEmail::new(
            "From: alice@example.com\r\n\
DKIM-Signature: d=example.com; s=sel1\r\n\r\n",
        );
        assert_eq!(assembler.timestamp(&undated), 1_800_000_000);
        let (_, record) = assembler.email_proof("u.eml", &undated, &email_salts()).await.unwrap();
        assert_eq!(record.email_nullifier, hash("alice@example.com1800000000"));
    }

    #[tokio::test]
    async fn header_salt_scheme_hashes_whole_message() {
        let zone = zone();
        let mut settings = settings();
        settings.nullifier_scheme = NullifierScheme::HeaderSalt;
        let assembler = ProofAssembler::new(&zone, &NullProver, settings);
        let email = alice_email();
        let (_, record) = assembler.email_proof("a.eml", &email, &email_salts()).await.unwrap();
        assert_eq!(record.email_nullifier, hash(format!("{}{}", email.as_str(), SALT)));
        assert_ne!(record.email_nullifier, hash(format!("{}{}", &email.as_str()[..60], SALT)));
    }

    #[tokio::test]
    async fn later_email_for_same_guardian_wins() {
        let zone = zone();
        let assembler = ProofAssembler::new(&zone, &NullProver, settings());
        let second = RawEmail::new(alice_email().as_str().replace("<m1@", "<m2@"));
        let emails = vec![
            ("1.eml".to_string(), alice_email()),
            ("2.eml".to_string(), RawEmail::new("Subject: no sender\r\n\r\n")),
            ("3.eml".to_string(), second),
        ];
        let out = assembler.collect_email_proofs(emails, &email_salts()).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out.get(&alice()).unwrap().email_nullifier, hash("<m2@example.com>"));
    }

    #[tokio::test]
    async fn auth_package_wraps_encoded_proof() {
        let zone = zone();
        let mut settings = settings();
        settings.addresses.insert(DKIM_REGISTRY.into(), "0x01".into());
        let assembler = ProofAssembler::new(&zone, &NullProver, settings);
        let auth = AuthenticatorAddress::from_str(AUTH).unwrap();
        let registry: GuardianRegistry = [(alice(), auth)].into_iter().collect();
        let salts: SaltStore<AuthenticatorAddress> =
            [(auth, GuardianSalt::from_str(SALT).unwrap())].into_iter().collect();

        let (key, package) = assembler
            .auth_package("alice.eml", &alice_email(), &registry, &salts)
            .await
            .unwrap();
        assert_eq!(key, auth);
        let msg = &package.email_auth_msg;
        assert_eq!(msg.template_id, compute_template_id(0));
        assert_eq!(
            msg.command_params,
            vec!["0x5615dEB798BB3E4dFa0139dFa1b3D433Cc23b72f".to_string()]
        );
        assert_eq!(msg.skipped_command_prefix, 0);
        assert_eq!(msg.proof.proof.len(), ENCODED_PROOF_SIZE);
        assert_eq!(package.metadata.dkim_registry, "0x01");
        assert_eq!(package.metadata.status, "generated");
        assert_eq!(package.metadata.timestamp, 1_800_000_000_000);
    }

    #[tokio::test]
    async fn auth_stage_skips_unknown_guardians_and_prover_failures() {
        let zone = zone();
        let assembler = ProofAssembler::new(&zone, &NullProver, settings());
        let empty = GuardianRegistry::new();
        assert!(matches!(
            assembler.auth_package("a.eml", &alice_email(), &empty, &SaltStore::new()).await,
            Err(AssemblyError::UnknownGuardian(_))
        ));

        let failing = ProofAssembler::new(&zone, &FailingProver, settings());
        let auth = AuthenticatorAddress::from_str(AUTH).unwrap();
        let registry: GuardianRegistry = [(alice(), auth)].into_iter().collect();
        let emails = vec![("a.eml".to_string(), alice_email())];
        let out = failing
            .collect_auth_packages(emails, &registry, &SaltStore::new())
            .await;
        assert!(out.is_empty());
    }
}
