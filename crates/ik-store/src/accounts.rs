//! Local email/password identity provider.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use uuid::Uuid;

use ik_core::{CoreError, CoreResult, IdentityProvider, MIN_PASSWORD_LEN};

/// PBKDF2 rounds applied to newly registered passwords.
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 200_000;

fn default_pbkdf2_iterations() -> u32 {
    DEFAULT_PBKDF2_ITERATIONS
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct AccountRecord {
    salt: String,
    password_hash: String,
    #[serde(default = "default_pbkdf2_iterations")]
    iterations: u32,
    created_at: DateTime<Utc>,
}

/// Accounts kept in a YAML file, passwords stored as PBKDF2-HMAC-SHA256 keys.
#[derive(Debug, Clone)]
pub struct AccountStore {
    path: PathBuf,
    iterations: u32,
}

impl AccountStore {
    /// Create a provider backed by the given accounts file.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            iterations: DEFAULT_PBKDF2_ITERATIONS,
        }
    }

    /// Override the rounds used for new registrations. Existing accounts keep their own count.
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations.max(1);
        self
    }

    fn load(&self) -> CoreResult<BTreeMap<String, AccountRecord>> {
        let accounts = ik_utils::read_yaml(&self.path)
            .map_err(|err| CoreError::Storage(err.to_string()))?;
        Ok(accounts.unwrap_or_default())
    }

    fn save(&self, accounts: &BTreeMap<String, AccountRecord>) -> CoreResult<()> {
        ik_utils::write_yaml(&self.path, accounts).map_err(|err| CoreError::Storage(err.to_string()))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(salt: &str, password: &str, iterations: u32) -> String {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut key);
    key.iter().map(|byte| format!("{byte:02x}")).collect()
}

impl IdentityProvider for AccountStore {
    fn sign_in(&self, email: &str, password: &str) -> CoreResult<String> {
        let email = normalize_email(email);
        let accounts = self.load()?;
        let Some(record) = accounts.get(&email) else {
            return Err(CoreError::Auth("unknown account".into()));
        };
        if hash_password(&record.salt, password, record.iterations) != record.password_hash {
            return Err(CoreError::Auth("invalid credentials".into()));
        }
        tracing::debug!(%email, "credentials accepted");
        Ok(email)
    }

    fn register(&self, email: &str, password: &str) -> CoreResult<String> {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(CoreError::Validation("invalid email".into()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CoreError::Validation("password is too weak".into()));
        }
        let mut accounts = self.load()?;
        if accounts.contains_key(&email) {
            return Err(CoreError::Duplicate(format!("account {email}")));
        }
        let salt = Uuid::new_v4().to_string();
        accounts.insert(
            email.clone(),
            AccountRecord {
                password_hash: hash_password(&salt, password, self.iterations),
                salt,
                iterations: self.iterations,
                created_at: Utc::now(),
            },
        );
        self.save(&accounts)?;
        tracing::debug!(%email, "account registered");
        Ok(email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(path: PathBuf) -> AccountStore {
        AccountStore::new(path).with_iterations(1_000)
    }

    #[test]
    fn register_then_sign_in() {
        let temp = TempDir::new().expect("temp dir");
        let accounts = store(temp.path().join("accounts.yaml"));
        let email = accounts.register(" A@B.com ", "secret1").expect("register");
        assert_eq!(email, "a@b.com");
        assert_eq!(accounts.sign_in("a@b.com", "secret1").expect("sign in"), "a@b.com");
        assert!(matches!(
            accounts.sign_in("a@b.com", "wrong12"),
            Err(CoreError::Auth(_))
        ));
        assert!(matches!(
            accounts.sign_in("nobody@b.com", "secret1"),
            Err(CoreError::Auth(_))
        ));
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let temp = TempDir::new().expect("temp dir");
        let accounts = store(temp.path().join("accounts.yaml"));
        accounts.register("a@b.com", "secret1").expect("register");
        assert!(matches!(
            accounts.register("a@b.com", "other12"),
            Err(CoreError::Duplicate(_))
        ));
    }

    #[test]
    fn passwords_are_not_stored_in_clear() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("accounts.yaml");
        store(path.clone())
            .register("a@b.com", "secret1")
            .expect("register");
        let contents = std::fs::read_to_string(path).expect("read");
        assert!(!contents.contains("secret1"));
    }

    #[test]
    fn weak_password_and_bad_email_are_rejected() {
        let temp = TempDir::new().expect("temp dir");
        let accounts = store(temp.path().join("accounts.yaml"));
        assert!(matches!(
            accounts.register("a@b.com", "123"),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            accounts.register("not-an-email", "secret1"),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn stored_key_records_its_iteration_count() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("accounts.yaml");
        store(path.clone()).register("a@b.com", "secret1").expect("register");

        let records: BTreeMap<String, AccountRecord> =
            ik_utils::read_yaml(&path).expect("read").expect("accounts");
        let record = &records["a@b.com"];
        assert_eq!(record.iterations, 1_000);
        assert_eq!(record.password_hash.len(), 64);
        assert_eq!(record.password_hash, hash_password(&record.salt, "secret1", 1_000));
        assert_ne!(record.password_hash, hash_password(&record.salt, "secret1", 1_001));

        // Sign-in honours the stored count even when the store's default differs.
        let accounts = AccountStore::new(path).with_iterations(5);
        assert_eq!(accounts.sign_in("a@b.com", "secret1").expect("sign in"), "a@b.com");
        assert!(matches!(
            accounts.sign_in("a@b.com", "wrong12"),
            Err(CoreError::Auth(_))
        ));
    }
}
