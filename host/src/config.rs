use std::{
    collections::BTreeMap,
    fs,
    hash::Hash,
    io,
    path::{Path, PathBuf},
    str::FromStr,
};

use guardian_email_core::{
    template::default_templates, AddressBook, AuthenticatorAddress, EmailIdentity,
    GuardianRegistry, GuardianSalt, SaltStore, TemplateBook,
};
use log::{info, warn};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::utils::write_json_pretty;

/// Email-keyed salts.
pub const GUARDIAN_SALTS_FILE: &str = "guardians_salt.json";
/// Authenticator-keyed salts.
pub const SALTS_FILE: &str = "salts.json";
pub const GUARDIANS_FILE: &str = "guardians.json";
pub const ADDRESSES_FILE: &str = "addresses.json";
pub const TEMPLATES_FILE: &str = "templates.json";

/// Written by [`ensure_configuration`] when `salts.json` is absent.
const DEFAULT_SALTS: [(&str, &str); 3] = [
    (
        "0xad7a5f378eb92435b9ce18ddcc0ca5ebc396af21",
        "0x640645bc9636eea08e5929ab8bae56644c5d96a1cc4e5286bc53f74b725ddb59",
    ),
    (
        "0xe52b7bb269f5a8c1838979b118fca3e26f996862",
        "0xbdf864bae7d17b6feab37538a640b12061359ebbb27a8ebb0747708ab7926b1d",
    ),
    (
        "0xfebda0a3b197bd7abc0a15d4f600a19de5deeab8",
        "0x5e092568b6ae5fac176e4c54f1c7d472acb23129ae89bfac76b41832c12a4ad0",
    ),
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {path}: {message}")]
    Write { path: PathBuf, message: String },
}

/// Parses a JSON document, failing on any I/O or syntax problem.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// [`read_json`], degrading to `T::default()` with a warning.
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match read_json(path) {
        Ok(value) => value,
        Err(e) => {
            warn!("{}, using empty configuration", e);
            T::default()
        }
    }
}

fn parse_salts<K, F>(path: &Path, raw: BTreeMap<String, String>, parse_key: F) -> SaltStore<K>
where
    K: Eq + Hash,
    F: Fn(&str) -> Option<K>,
{
    raw.into_iter()
        .filter_map(|(key, value)| {
            let Some(id) = parse_key(&key) else {
                warn!("{}: ignoring salt with unusable key {:?}", path.display(), key);
                return None;
            };
            match GuardianSalt::from_str(&value) {
                Ok(salt) => Some((id, salt)),
                Err(e) => {
                    warn!("{}: ignoring salt for {}: {}", path.display(), key, e);
                    None
                }
            }
        })
        .collect()
}

/// `{ email -> salt }`.
pub fn load_email_salts(path: &Path) -> SaltStore<EmailIdentity> {
    let raw = read_json_or_default(path);
    parse_salts(path, raw, EmailIdentity::new)
}

/// `{ authenticator address -> salt }`.
pub fn load_authenticator_salts(path: &Path) -> SaltStore<AuthenticatorAddress> {
    let raw = read_json_or_default(path);
    parse_salts(path, raw, |key| key.parse().ok())
}

/// `{ email -> authenticator address }`.
pub fn load_guardians(path: &Path) -> GuardianRegistry {
    let raw: BTreeMap<String, String> = read_json_or_default(path);
    raw.into_iter()
        .filter_map(|(email, address)| {
            let Some(identity) = EmailIdentity::new(&email) else {
                warn!("{}: ignoring guardian {:?}", path.display(), email);
                return None;
            };
            match address.parse::<AuthenticatorAddress>() {
                Ok(authenticator) => Some((identity, authenticator)),
                Err(e) => {
                    warn!("{}: ignoring guardian {}: {}", path.display(), email, e);
                    None
                }
            }
        })
        .collect()
}

pub fn load_addresses(path: &Path) -> AddressBook {
    read_json_or_default(path)
}

pub fn load_templates(path: &Path) -> TemplateBook {
    read_json_or_default(path)
}

/// Creates `salts.json` and `templates.json` under `dir` with their default
/// payloads if they do not exist. Existing files are left untouched.
/// Returns the files that were written.
pub fn ensure_configuration(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let mut created = Vec::new();

    let salts = dir.join(SALTS_FILE);
    if !salts.exists() {
        let payload: BTreeMap<&str, &str> = DEFAULT_SALTS.into_iter().collect();
        write_default(&salts, &payload)?;
        created.push(salts);
    }

    let templates = dir.join(TEMPLATES_FILE);
    if !templates.exists() {
        write_default(&templates, &default_templates())?;
        created.push(templates);
    }

    Ok(created)
}

fn write_default<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    write_json_pretty(path, value).map_err(|e| ConfigError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    info!("✓ Created {} with default payload", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let salts = load_email_salts(&dir.path().join(GUARDIAN_SALTS_FILE));
        assert!(salts.is_empty());
        assert!(load_addresses(&dir.path().join(ADDRESSES_FILE)).is_empty());
    }

    #[test]
    fn malformed_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(GUARDIANS_FILE);
        fs::write(&path, "{ not json").unwrap();
        assert!(load_guardians(&path).is_empty());
        assert!(matches!(read_json::<AddressBook>(&path), Err(ConfigError::Json { .. })));
    }

    #[test]
    fn email_salts_normalise_keys_and_drop_bad_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(GUARDIAN_SALTS_FILE);
        fs::write(
            &path,
            r#"{
                "Alice@Example.com": "0x640645bc9636eea08e5929ab8bae56644c5d96a1cc4e5286bc53f74b725ddb59",
                "bob@example.com": "0x1234",
                "not-an-email": "0x640645bc9636eea08e5929ab8bae56644c5d96a1cc4e5286bc53f74b725ddb59"
            }"#,
        )
        .unwrap();

        let salts = load_email_salts(&path);
        assert_eq!(salts.len(), 1);
        assert!(salts.get(&EmailIdentity::new("alice@example.com").unwrap()).is_some());
    }

    #[test]
    fn guardians_map_email_to_authenticator() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(GUARDIANS_FILE);
        fs::write(
            &path,
            r#"{ "alice@example.com": "0xAD7A5F378EB92435B9CE18DDCC0CA5EBC396AF21" }"#,
        )
        .unwrap();
        let registry = load_guardians(&path);
        let auth = registry
            .authenticator_for(&EmailIdentity::new("alice@example.com").unwrap())
            .unwrap();
        assert_eq!(auth.to_string(), "0xad7a5f378eb92435b9ce18ddcc0ca5ebc396af21");
    }

    #[test]
    fn ensure_configuration_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let first = ensure_configuration(dir.path()).unwrap();
        assert_eq!(first.len(), 2);

        let salts = load_authenticator_salts(&dir.path().join(SALTS_FILE));
        assert_eq!(salts.len(), DEFAULT_SALTS.len());
        let templates = load_templates(&dir.path().join(TEMPLATES_FILE));
        assert_eq!(templates, default_templates());

        fs::write(dir.path().join(SALTS_FILE), "{}").unwrap();
        let second = ensure_configuration(dir.path()).unwrap();
        assert!(second.is_empty());
        assert!(load_authenticator_salts(&dir.path().join(SALTS_FILE)).is_empty());
    }
}
