use std::{
    collections::{BTreeMap, HashMap},
    hash::Hash,
};

use crate::structs::{AuthenticatorAddress, EmailIdentity, GuardianSalt};

/// Address-book key of the DKIM registry contract.
pub const DKIM_REGISTRY: &str = "UserOverrideableDKIMRegistry";
/// Address-book key of the Groth16 verifier contract.
pub const GROTH16_VERIFIER: &str = "Groth16Verifier";

/// Deployed contract identifiers by name. Annotation only.
pub type AddressBook = BTreeMap<String, String>;

/// Salts keyed by one guardian key space. `SaltStore<EmailIdentity>` and
/// `SaltStore<AuthenticatorAddress>` are distinct types on purpose.
#[derive(Debug, Clone)]
pub struct SaltStore<K> {
    salts: HashMap<K, GuardianSalt>,
}

impl<K> Default for SaltStore<K> {
    fn default() -> Self {
        Self {
            salts: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash> SaltStore<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: K, salt: GuardianSalt) -> Option<GuardianSalt> {
        self.salts.insert(key, salt)
    }

    pub fn get(&self, key: &K) -> Option<GuardianSalt> {
        self.salts.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.salts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.salts.is_empty()
    }
}

impl<K: Eq + Hash> FromIterator<(K, GuardianSalt)> for SaltStore<K> {
    fn from_iter<T: IntoIterator<Item = (K, GuardianSalt)>>(iter: T) -> Self {
        Self {
            salts: iter.into_iter().collect(),
        }
    }
}

/// Which authenticator contract belongs to which guardian email.
#[derive(Debug, Clone, Default)]
pub struct GuardianRegistry {
    guardians: BTreeMap<EmailIdentity, AuthenticatorAddress>,
}

impl GuardianRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, email: EmailIdentity, authenticator: AuthenticatorAddress) {
        self.guardians.insert(email, authenticator);
    }

    /// The only sanctioned way from an email identity to an authenticator.
    pub fn authenticator_for(&self, email: &EmailIdentity) -> Option<AuthenticatorAddress> {
        self.guardians.get(email).copied()
    }

    pub fn len(&self) -> usize {
        self.guardians.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guardians.is_empty()
    }
}

impl FromIterator<(EmailIdentity, AuthenticatorAddress)> for GuardianRegistry {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = (EmailIdentity, AuthenticatorAddress)>,
    {
        Self {
            guardians: iter.into_iter().collect(),
        }
    }
}
