//! Credential verification and the credential store port.
//!
//! Passwords are stored as PBKDF2-HMAC-SHA256 (1000 rounds, 64-byte key,
//! hex) over a random hex salt. The verifier is a pure function of
//! `(hash, salt, password)`; the store only persists records.

use crate::domain::UserId;
use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

const PBKDF2_ROUNDS: u32 = 1000;
const KEY_LEN: usize = 64;
const SALT_LEN: usize = 16;

/// Hash `password` with `salt`, hex encoded
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), PBKDF2_ROUNDS, &mut key);
    hex::encode(key)
}

/// Fresh random salt, hex encoded
pub fn generate_salt() -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    hex::encode(salt)
}

/// Check `password` against a stored hash/salt pair
pub fn verify_password(hash: &str, salt: &str, password: &str) -> bool {
    constant_time_compare(&hash_password(password, salt), hash)
}

/// Constant-time string comparison
///
/// Takes the same time regardless of how many leading bytes match. Inputs
/// of different length compare unequal without short-circuiting.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;

    let max_len = std::cmp::max(a.len(), b.len());

    // Different pad bytes so a length mismatch can never compare equal
    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];
    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);
    (lengths_equal & contents_equal).into()
}

/// Stored account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub id: UserId,
    pub username: String,
    pub hash: String,
    pub salt: String,
}

impl CredentialRecord {
    /// New record with a fresh salt
    pub fn new(username: impl Into<String>, password: &str) -> Self {
        let salt = generate_salt();
        Self {
            id: UserId::new(),
            username: username.into(),
            hash: hash_password(password, &salt),
            salt,
        }
    }

    /// Replace the password, re-salting
    pub fn set_password(&mut self, password: &str) {
        self.salt = generate_salt();
        self.hash = hash_password(password, &self.salt);
    }

    pub fn verify(&self, password: &str) -> bool {
        verify_password(&self.hash, &self.salt, password)
    }

    /// Client-facing view; never carries hash or salt
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            username: self.username.clone(),
        }
    }
}

/// Public projection of a [`CredentialRecord`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub username: String,
}

/// Result of checking a username/password pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialOutcome {
    Valid(CredentialRecord),
    UnknownUser,
    WrongPassword,
}

impl CredentialOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, CredentialOutcome::Valid(_))
    }
}

/// Credential store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("username already taken: {0}")]
    DuplicateUsername(String),
    #[error("user not found: {0}")]
    NotFound(UserId),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Persistence port for credential records.
///
/// Implementations must enforce username uniqueness atomically.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn insert(&self, record: CredentialRecord) -> Result<CredentialRecord, StoreError>;

    async fn find_by_username(&self, username: &str)
        -> Result<Option<CredentialRecord>, StoreError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<CredentialRecord>, StoreError>;

    async fn list(&self) -> Result<Vec<CredentialRecord>, StoreError>;

    /// Replace an existing record (matched by id)
    async fn update(&self, record: CredentialRecord) -> Result<CredentialRecord, StoreError>;

    /// Remove a record, returning it if it existed
    async fn delete(&self, id: UserId) -> Result<Option<CredentialRecord>, StoreError>;
}

/// Look up `username` and check `password` against the stored pair
pub async fn verify_credentials(
    store: &dyn CredentialStore,
    username: &str,
    password: &str,
) -> Result<CredentialOutcome, StoreError> {
    let Some(record) = store.find_by_username(username).await? else {
        return Ok(CredentialOutcome::UnknownUser);
    };

    if record.verify(password) {
        Ok(CredentialOutcome::Valid(record))
    } else {
        Ok(CredentialOutcome::WrongPassword)
    }
}

/// In-process credential store
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    records: DashMap<UserId, CredentialRecord>,
    usernames: DashMap<String, UserId>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Claim `username` for `id`. The index lock is released before returning.
    fn claim_username(&self, username: &str, id: UserId) -> Result<(), StoreError> {
        match self.usernames.entry(username.to_string()) {
            Entry::Occupied(existing) if *existing.get() != id => {
                Err(StoreError::DuplicateUsername(username.to_string()))
            }
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(id);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn insert(&self, record: CredentialRecord) -> Result<CredentialRecord, StoreError> {
        self.claim_username(&record.username, record.id)?;
        self.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        let Some(id) = self.usernames.get(username).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.records.get(&id).map(|r| r.clone()))
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self.records.get(&id).map(|r| r.clone()))
    }

    async fn list(&self) -> Result<Vec<CredentialRecord>, StoreError> {
        let mut records: Vec<_> = self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    async fn update(&self, record: CredentialRecord) -> Result<CredentialRecord, StoreError> {
        let mut current = self
            .records
            .get_mut(&record.id)
            .ok_or(StoreError::NotFound(record.id))?;

        if current.username != record.username {
            self.claim_username(&record.username, record.id)?;
            self.usernames.remove(&current.username);
        }
        *current = record.clone();
        Ok(record)
    }

    async fn delete(&self, id: UserId) -> Result<Option<CredentialRecord>, StoreError> {
        let removed = self.records.remove(&id).map(|(_, record)| record);
        if let Some(record) = &removed {
            self.usernames.remove(&record.username);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("secret", "secret"));
        assert!(!constant_time_compare("secret", "Secret"));
        assert!(!constant_time_compare("secret", "secre"));
        assert!(!constant_time_compare("secret", "secrets"));
    }

    #[test]
    fn test_hash_shape() {
        let hash = hash_password("secret123", "abcdef0123456789");
        assert_eq!(hash.len(), KEY_LEN * 2);
        assert_eq!(hash, hash_password("secret123", "abcdef0123456789"));
        assert_eq!(generate_salt().len(), SALT_LEN * 2);
    }

    #[test]
    fn test_record_verify() {
        let mut record = CredentialRecord::new("alice", "secret123");
        assert!(record.verify("secret123"));
        assert!(!record.verify("secret124"));

        record.set_password("hunter2");
        assert!(record.verify("hunter2"));
        assert!(!record.verify("secret123"));
    }

    #[test]
    fn test_view_hides_secrets() {
        let record = CredentialRecord::new("alice", "secret123");
        let json = serde_json::to_value(record.view()).unwrap();
        assert_eq!(json["username"], "alice");
        assert!(json.get("_id").is_some());
        assert!(json.get("hash").is_none());
        assert!(json.get("salt").is_none());
    }

    #[tokio::test]
    async fn test_username_unique() {
        let store = InMemoryCredentialStore::new();
        store.insert(CredentialRecord::new("alice", "a")).await.unwrap();
        let err = store
            .insert(CredentialRecord::new("alice", "b"))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::DuplicateUsername("alice".into()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_verify_credentials_outcomes() {
        let store = InMemoryCredentialStore::new();
        store
            .insert(CredentialRecord::new("alice", "secret123"))
            .await
            .unwrap();

        let ok = verify_credentials(&store, "alice", "secret123").await.unwrap();
        assert!(ok.is_valid());
        assert_eq!(
            verify_credentials(&store, "alice", "nope").await.unwrap(),
            CredentialOutcome::WrongPassword
        );
        assert_eq!(
            verify_credentials(&store, "bob", "secret123").await.unwrap(),
            CredentialOutcome::UnknownUser
        );
    }

    #[tokio::test]
    async fn test_update_rename_and_delete() {
        let store = InMemoryCredentialStore::new();
        let alice = store.insert(CredentialRecord::new("alice", "a")).await.unwrap();
        store.insert(CredentialRecord::new("bob", "b")).await.unwrap();

        let mut renamed = alice.clone();
        renamed.username = "bob".into();
        assert!(matches!(
            store.update(renamed.clone()).await,
            Err(StoreError::DuplicateUsername(_))
        ));

        renamed.username = "carol".into();
        store.update(renamed).await.unwrap();
        assert!(store.find_by_username("alice").await.unwrap().is_none());
        assert!(store.find_by_username("carol").await.unwrap().is_some());

        let removed = store.delete(alice.id).await.unwrap();
        assert_eq!(removed.map(|r| r.username), Some("carol".to_string()));
        assert!(store.delete(alice.id).await.unwrap().is_none());
        assert!(store.find_by_username("carol").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let store = InMemoryCredentialStore::new();
        let ghost = CredentialRecord::new("ghost", "x");
        assert_eq!(
            store.update(ghost.clone()).await.unwrap_err(),
            StoreError::NotFound(ghost.id)
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_verify_matches_only_original(
            salt in "[0-9a-f]{8,64}",
            password in "[ -~]{1,32}",
            other in "[ -~]{1,32}",
        ) {
            let hash = hash_password(&password, &salt);
            prop_assert!(verify_password(&hash, &salt, &password));
            if other != password {
                prop_assert!(!verify_password(&hash, &salt, &other));
            }
        }
    }
}
