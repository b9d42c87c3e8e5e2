use std::{
    collections::HashMap,
    fs,
    path::Path,
    str::FromStr,
    sync::{Mutex, Once},
};

use alloy_primitives::Address;
use async_trait::async_trait;
use guardian_email_core::{
    AssemblySettings, EmailIdentity, NullProver, ProofAssembler, ResolveError, TxtLookup,
    TxtRecord,
};
use guardian_email_helpers::{
    config::{self, GUARDIANS_FILE, GUARDIAN_SALTS_FILE, SALTS_FILE},
    list_email_files, load_emails, write_json_pretty,
};
use log::{Level, LevelFilter, Log, Metadata, Record};
use serde_json::Value;

const SALT: &str = "0xdeadbeef00000000000000000000000000000000000000000000000000000000";
const AUTH: &str = "0xad7a5f378eb92435b9ce18ddcc0ca5ebc396af21";

/// Keeps every record emitted by the process. Tests run concurrently, so
/// assertions look for their own file names rather than exact sequences.
struct CapturedLogs(Mutex<Vec<(Level, String)>>);

static LOGS: CapturedLogs = CapturedLogs(Mutex::new(Vec::new()));
static INSTALL: Once = Once::new();

impl Log for CapturedLogs {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if let Ok(mut logs) = self.0.lock() {
            logs.push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

fn capture_logs() {
    INSTALL.call_once(|| {
        log::set_logger(&LOGS).unwrap();
        log::set_max_level(LevelFilter::Trace);
    });
}

fn warned(needle: &str) -> bool {
    LOGS.0
        .lock()
        .unwrap()
        .iter()
        .any(|(level, message)| *level == Level::Warn && message.contains(needle))
}

#[derive(Default)]
struct FakeDns(HashMap<String, Vec<TxtRecord>>);

impl FakeDns {
    fn with_key(mut self, name: &str, txt: &str) -> Self {
        self.0
            .insert(name.to_string(), vec![vec![txt.as_bytes().to_vec()]]);
        self
    }
}

#[async_trait]
impl TxtLookup for FakeDns {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<TxtRecord>, ResolveError> {
        self.0
            .get(name)
            .cloned()
            .ok_or_else(|| ResolveError::Dns(format!("NXDOMAIN {name}")))
    }
}

fn account() -> Address {
    Address::from_str("0x5615dEB798BB3E4dFa0139dFa1b3D433Cc23b72f").unwrap()
}

fn write_email(dir: &Path, name: &str, from: Option<&str>) {
    let mut raw = String::new();
    if let Some(from) = from {
        raw.push_str(&format!("From: {from}\r\n"));
    }
    raw.push_str(&format!("Message-ID: <{name}@example.com>\r\n"));
    raw.push_str("Date: Tue, 14 May 2024 10:00:00 +0000\r\n");
    raw.push_str("DKIM-Signature: v=1; a=rsa-sha256; d=example.com;\r\n");
    raw.push_str("\ts=sel1; bh=x; b=y\r\n");
    raw.push_str("\r\nAccept\r\n");
    fs::write(dir.join(name), raw).unwrap();
}

struct Fixture {
    _root: tempfile::TempDir,
    emails: std::path::PathBuf,
    config: std::path::PathBuf,
}

fn fixture() -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let emails = root.path().join("emails");
    let config = root.path().join("data");
    fs::create_dir_all(&emails).unwrap();
    fs::create_dir_all(&config).unwrap();

    write_email(&emails, "alice.eml", Some("Alice <Alice@Example.com>"));
    write_email(&emails, "anonymous.eml", None);
    write_email(&emails, "carol.eml", Some("carol@example.com"));

    write_json_pretty(
        &config.join(GUARDIAN_SALTS_FILE),
        &HashMap::from([("alice@example.com", SALT)]),
    )
    .unwrap();
    write_json_pretty(&config.join(SALTS_FILE), &HashMap::from([(AUTH, SALT)])).unwrap();
    write_json_pretty(
        &config.join(GUARDIANS_FILE),
        &HashMap::from([("alice@example.com", AUTH)]),
    )
    .unwrap();

    Fixture {
        _root: root,
        emails,
        config,
    }
}

async fn run_build_proofs(fx: &Fixture, dns: &FakeDns) -> Value {
    let salts = config::load_email_salts(&fx.config.join(GUARDIAN_SALTS_FILE));
    let assembler = ProofAssembler::new(dns, &NullProver, AssemblySettings::new(account()));
    let files = list_email_files(&fx.emails).unwrap();
    let proofs = assembler.collect_email_proofs(load_emails(files), &salts).await;

    let out = fx.config.join("EmailProofs.json");
    write_json_pretty(&out, &proofs).unwrap();
    serde_json::from_str(&fs::read_to_string(out).unwrap()).unwrap()
}

#[tokio::test]
async fn resolved_key_and_salt_produce_full_entry() {
    let fx = fixture();
    let dns =
        FakeDns::default().with_key("sel1._domainkey.example.com", "v=DKIM1; k=rsa; p=AAAA");
    let out = run_build_proofs(&fx, &dns).await;

    let alice = &out["alice@example.com"];
    assert_eq!(alice["domainName"], "example.com");
    assert_ne!(alice["publicKeyHash"], "0x");
    assert_eq!(alice["accountSalt"], SALT);
    assert_eq!(alice["isCodeExist"], true);
    assert_eq!(alice["proof"], "0x");
    assert_eq!(alice["timestamp"], 1_715_680_800u64);
}

#[tokio::test]
async fn nxdomain_still_emits_entry_with_sentinel() {
    capture_logs();
    let fx = fixture();
    let out = run_build_proofs(&fx, &FakeDns::default()).await;

    let alice = &out["alice@example.com"];
    assert_eq!(alice["publicKeyHash"], "0x");
    assert_eq!(alice["isCodeExist"], true);
    assert_eq!(alice["accountSalt"], SALT);
    assert!(warned("alice.eml: public key hash unavailable"));
}

#[tokio::test]
async fn email_without_sender_is_skipped_and_others_continue() {
    capture_logs();
    let fx = fixture();
    let dns = FakeDns::default().with_key("sel1._domainkey.example.com", "p=AAAA");
    let out = run_build_proofs(&fx, &dns).await;

    let entries = out.as_object().unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.contains_key("alice@example.com"));
    assert_eq!(out["carol@example.com"]["accountSalt"], "0x");
    assert!(warned("anonymous.eml"));
    assert!(warned("carol.eml: no salt for carol@example.com"));
}

#[tokio::test]
async fn auth_stage_writes_one_package_per_guardian() {
    let fx = fixture();
    let dns = FakeDns::default().with_key("sel1._domainkey.example.com", "p=AAAA");
    let registry = config::load_guardians(&fx.config.join(GUARDIANS_FILE));
    let salts = config::load_authenticator_salts(&fx.config.join(SALTS_FILE));
    let assembler = ProofAssembler::new(&dns, &NullProver, AssemblySettings::new(account()));

    let files = list_email_files(&fx.emails).unwrap();
    let packages = assembler
        .collect_auth_packages(load_emails(files), &registry, &salts)
        .await;
    assert_eq!(packages.len(), 1);

    let (auth, package) = packages.iter().next().unwrap();
    assert_eq!(auth.to_string(), AUTH);
    assert_eq!(package.metadata.email, EmailIdentity::new("alice@example.com").unwrap());

    let value = serde_json::to_value(package).unwrap();
    let proof = value["emailAuthMsg"]["proof"]["proof"].as_str().unwrap();
    assert_eq!(proof.len(), 2 + 512);
    assert_eq!(value["emailAuthMsg"]["skippedCommandPrefix"], 0);
}
