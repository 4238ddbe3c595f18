//! Auth-code lifecycle: generation, format validation, expiry, and the
//! SQLite-backed store.
//!
//! An auth code is the device's long-lived bearer credential: 32
//! cryptographically random bytes rendered as 64 lowercase hex characters.
//! The code value itself is the primary lookup key — whoever holds it can
//! refresh session tokens for the device it was minted for, so it is never
//! logged in full anywhere in the system (only the 8-character prefix, for
//! audit correlation).

use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

/// Default credential lifetime in days.
pub const DEFAULT_TTL_DAYS: i64 = 365;

/// Auth codes are 32 random bytes...
const CODE_BYTES: usize = 32;

/// ...rendered as 64 lowercase hex characters.
pub const CODE_LEN: usize = 64;

/// Length of the loggable code prefix.
pub const PREFIX_LEN: usize = 8;

// ═══════════════════════════════════════════════════════════════════════
//  Pure helpers
// ═══════════════════════════════════════════════════════════════════════

/// Generate a fresh auth code from the system CSPRNG.
///
/// # Errors
///
/// Returns [`StoreError::RngUnavailable`] if the CSPRNG fails.
pub fn generate_code() -> StoreResult<String> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; CODE_BYTES];
    rng.fill(&mut bytes).map_err(|_| StoreError::RngUnavailable)?;
    Ok(hex::encode(bytes))
}

/// Unix timestamp `days` days from now.
pub fn expiry_after_days(days: i64) -> i64 {
    chrono::Utc::now().timestamp() + days * 86_400
}

/// Whether `expires_at` has passed. Strict: a code expiring exactly now is
/// still valid.
pub fn is_expired(expires_at: i64) -> bool {
    expires_at < chrono::Utc::now().timestamp()
}

/// Whether `code` is exactly 64 characters of `[0-9a-f]`.
///
/// This is a strict format check, not a normalization point: uppercase hex,
/// wrong lengths, and empty strings are all invalid and stay invalid.
pub fn is_valid_format(code: &str) -> bool {
    code.len() == CODE_LEN
        && code
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// The loggable prefix of a code — the first 8 hex characters.
///
/// Enough to correlate audit records without exposing the bearer secret.
pub fn code_prefix(code: &str) -> &str {
    &code[..PREFIX_LEN.min(code.len())]
}

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// A persisted auth-code record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthCode {
    /// The credential value (64 lowercase hex). Primary key.
    pub code: String,
    /// The owning account.
    pub user_id: String,
    /// The device this code was minted for.
    pub device_id: String,
    /// Display name of the device at mint time.
    pub device_name: String,
    /// Unix timestamp of creation.
    pub created_at: i64,
    /// Unix timestamp after which the code is rejected.
    pub expires_at: i64,
    /// Unix timestamp of the most recent successful refresh, if any.
    pub last_used: Option<i64>,
}

/// The identity a validated code resolves to.
#[derive(Debug, Clone)]
pub struct ValidatedCode {
    /// The owning account.
    pub user_id: String,
    /// The device's display name.
    pub device_name: String,
}

// ═══════════════════════════════════════════════════════════════════════
//  AuthCodeStore
// ═══════════════════════════════════════════════════════════════════════

/// CRUD and validation over the `auth_codes` table.
#[derive(Clone)]
pub struct AuthCodeStore {
    db: Database,
}

impl AuthCodeStore {
    /// Create a new store backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Mint and persist a fresh auth code for `(user, device)`.
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        user_id: &str,
        device_id: &str,
        device_name: &str,
        ttl_days: i64,
    ) -> StoreResult<AuthCode> {
        let code = generate_code()?;
        let now = chrono::Utc::now().timestamp();

        let record = AuthCode {
            code: code.clone(),
            user_id: user_id.to_string(),
            device_id: device_id.to_string(),
            device_name: device_name.to_string(),
            created_at: now,
            expires_at: expiry_after_days(ttl_days),
            last_used: None,
        };

        let insert = record.clone();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO auth_codes (code, user_id, device_id, device_name, created_at, expires_at, last_used) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)",
                    rusqlite::params![
                        insert.code,
                        insert.user_id,
                        insert.device_id,
                        insert.device_name,
                        insert.created_at,
                        insert.expires_at
                    ],
                )?;
                Ok(())
            })
            .await?;

        debug!(
            device_id = %record.device_id,
            code_prefix = code_prefix(&record.code),
            "auth code created"
        );
        Ok(record)
    }

    /// Fetch a code record, returning `None` if absent.
    pub async fn get(&self, code: &str) -> StoreResult<Option<AuthCode>> {
        let code = code.to_string();
        self.db
            .execute(move |conn| {
                let result = conn.query_row(
                    "SELECT code, user_id, device_id, device_name, created_at, expires_at, last_used \
                     FROM auth_codes WHERE code = ?1",
                    rusqlite::params![code],
                    |row| {
                        Ok(AuthCode {
                            code: row.get(0)?,
                            user_id: row.get(1)?,
                            device_id: row.get(2)?,
                            device_name: row.get(3)?,
                            created_at: row.get(4)?,
                            expires_at: row.get(5)?,
                            last_used: row.get(6)?,
                        })
                    },
                );
                match result {
                    Ok(record) => Ok(Some(record)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(StoreError::Sqlite(e)),
                }
            })
            .await
    }

    /// Validate a presented code against a claimed device id.
    ///
    /// All three checks run against one consistent read of the record. The
    /// failure reasons are distinct so server logs can tell a guessed code
    /// from an expired one from a replayed one — the HTTP boundary
    /// collapses them for unauthenticated callers.
    ///
    /// # Errors
    ///
    /// - [`StoreError::CodeNotFound`] — no record for the value.
    /// - [`StoreError::CodeExpired`] — the record's expiry has passed.
    /// - [`StoreError::DeviceMismatch`] — the record belongs to a different
    ///   device (a stolen code replayed under another device identity).
    #[instrument(skip(self, code))]
    pub async fn validate(&self, code: &str, device_id: &str) -> StoreResult<ValidatedCode> {
        let record = self.get(code).await?.ok_or(StoreError::CodeNotFound)?;

        if is_expired(record.expires_at) {
            return Err(StoreError::CodeExpired);
        }

        if record.device_id != device_id {
            return Err(StoreError::DeviceMismatch);
        }

        Ok(ValidatedCode {
            user_id: record.user_id,
            device_name: record.device_name,
        })
    }

    /// Stamp `last_used = now`. Advisory telemetry — callers fire this off
    /// the response path and drop failures.
    pub async fn mark_used(&self, code: &str) -> StoreResult<()> {
        let code = code.to_string();
        let now = chrono::Utc::now().timestamp();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "UPDATE auth_codes SET last_used = ?2 WHERE code = ?1",
                    rusqlite::params![code, now],
                )?;
                Ok(())
            })
            .await
    }

    /// Delete a code. Idempotent — revoking a nonexistent code is not an
    /// error.
    #[instrument(skip(self, code))]
    pub async fn revoke(&self, code: &str) -> StoreResult<()> {
        let prefix = code_prefix(code).to_string();
        let code = code.to_string();
        let deleted = self
            .db
            .execute(move |conn| {
                let n = conn.execute(
                    "DELETE FROM auth_codes WHERE code = ?1",
                    rusqlite::params![code],
                )?;
                Ok(n)
            })
            .await?;

        if deleted > 0 {
            debug!(code_prefix = %prefix, "auth code revoked");
        }
        Ok(())
    }

    /// Delete every code minted for a device, returning how many were
    /// removed. Enforces the one-active-code-per-device invariant on
    /// re-authentication even if a registration's back-reference was lost.
    pub async fn revoke_for_device(&self, device_id: &str) -> StoreResult<usize> {
        let device_id = device_id.to_string();
        self.db
            .execute(move |conn| {
                let n = conn.execute(
                    "DELETE FROM auth_codes WHERE device_id = ?1",
                    rusqlite::params![device_id],
                )?;
                Ok(n)
            })
            .await
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_store() -> AuthCodeStore {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        AuthCodeStore::new(db)
    }

    // -- pure helpers -------------------------------------------------------

    #[test]
    fn generated_codes_are_64_lowercase_hex() {
        let code = generate_code().unwrap();
        assert_eq!(code.len(), 64);
        assert!(is_valid_format(&code));
    }

    #[test]
    fn generated_codes_do_not_collide() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(generate_code().unwrap()), "duplicate auth code");
        }
    }

    #[test]
    fn format_accepts_exactly_64_lowercase_hex() {
        assert!(is_valid_format(&"a".repeat(64)));
        assert!(is_valid_format(&"0123456789abcdef".repeat(4)));
    }

    #[test]
    fn format_rejects_wrong_lengths() {
        assert!(!is_valid_format(&"a".repeat(63)));
        assert!(!is_valid_format(&"a".repeat(65)));
        assert!(!is_valid_format(""));
    }

    #[test]
    fn format_rejects_uppercase_and_non_hex() {
        let mut code = "a".repeat(64);
        code.replace_range(0..1, "A");
        assert!(!is_valid_format(&code));

        let mut code = "a".repeat(64);
        code.replace_range(10..11, "g");
        assert!(!is_valid_format(&code));

        let mut code = "a".repeat(64);
        code.replace_range(63..64, "-");
        assert!(!is_valid_format(&code));
    }

    #[test]
    fn prefix_is_first_eight_chars() {
        let code = generate_code().unwrap();
        assert_eq!(code_prefix(&code), &code[0..8]);
        assert_eq!(code_prefix(&code).len(), 8);
    }

    #[test]
    fn expiry_lands_near_expected_timestamp() {
        for days in [1_i64, 7, 30, 365] {
            let expected = chrono::Utc::now().timestamp() + days * 86_400;
            let actual = expiry_after_days(days);
            assert!(
                (actual - expected).abs() <= 1,
                "expiry for {days}d off by {}s",
                actual - expected
            );
        }
    }

    #[test]
    fn is_expired_is_strict() {
        let now = chrono::Utc::now().timestamp();
        assert!(is_expired(now - 1));
        assert!(!is_expired(now + 10));
    }

    // -- store --------------------------------------------------------------

    #[tokio::test]
    async fn create_and_get() {
        let store = setup_store().await;

        let record = store
            .create("user-1", "dev-1", "Kitchen Pi", DEFAULT_TTL_DAYS)
            .await
            .unwrap();

        assert!(is_valid_format(&record.code));
        assert_eq!(record.user_id, "user-1");
        assert_eq!(record.device_id, "dev-1");
        assert_eq!(record.device_name, "Kitchen Pi");
        assert!(record.last_used.is_none());
        assert!(record.expires_at > record.created_at);

        let fetched = store.get(&record.code).await.unwrap().unwrap();
        assert_eq!(fetched.user_id, "user-1");
        assert_eq!(fetched.expires_at, record.expires_at);
    }

    #[tokio::test]
    async fn validate_happy_path() {
        let store = setup_store().await;
        let record = store
            .create("user-1", "dev-1", "Kitchen Pi", DEFAULT_TTL_DAYS)
            .await
            .unwrap();

        let validated = store.validate(&record.code, "dev-1").await.unwrap();
        assert_eq!(validated.user_id, "user-1");
        assert_eq!(validated.device_name, "Kitchen Pi");
    }

    #[tokio::test]
    async fn validate_unknown_code_is_not_found() {
        let store = setup_store().await;
        let result = store.validate(&"0".repeat(64), "dev-1").await;
        assert!(matches!(result, Err(StoreError::CodeNotFound)));
    }

    #[tokio::test]
    async fn validate_wrong_device_is_mismatch() {
        let store = setup_store().await;
        let record = store
            .create("user-1", "dev-a", "Device A", DEFAULT_TTL_DAYS)
            .await
            .unwrap();

        let result = store.validate(&record.code, "dev-b").await;
        assert!(matches!(result, Err(StoreError::DeviceMismatch)));
    }

    #[tokio::test]
    async fn validate_expired_code_is_rejected() {
        let store = setup_store().await;
        // TTL of -1 day puts the expiry firmly in the past while the format
        // and device id stay correct.
        let record = store.create("user-1", "dev-1", "Old", -1).await.unwrap();

        let result = store.validate(&record.code, "dev-1").await;
        assert!(matches!(result, Err(StoreError::CodeExpired)));
    }

    #[tokio::test]
    async fn mark_used_stamps_timestamp() {
        let store = setup_store().await;
        let record = store
            .create("user-1", "dev-1", "Kitchen Pi", DEFAULT_TTL_DAYS)
            .await
            .unwrap();

        store.mark_used(&record.code).await.unwrap();

        let fetched = store.get(&record.code).await.unwrap().unwrap();
        let stamped = fetched.last_used.expect("last_used should be set");
        assert!(stamped >= record.created_at);
    }

    #[tokio::test]
    async fn revoke_deletes_and_is_idempotent() {
        let store = setup_store().await;
        let record = store
            .create("user-1", "dev-1", "Kitchen Pi", DEFAULT_TTL_DAYS)
            .await
            .unwrap();

        store.revoke(&record.code).await.unwrap();
        assert!(store.get(&record.code).await.unwrap().is_none());

        // Revoking again (or revoking garbage) is not an error.
        store.revoke(&record.code).await.unwrap();
        store.revoke("not-a-real-code").await.unwrap();
    }

    #[tokio::test]
    async fn revoke_for_device_removes_every_code() {
        let store = setup_store().await;
        let a = store
            .create("user-1", "dev-1", "Kitchen Pi", DEFAULT_TTL_DAYS)
            .await
            .unwrap();
        let b = store
            .create("user-1", "dev-1", "Kitchen Pi", DEFAULT_TTL_DAYS)
            .await
            .unwrap();
        let other = store
            .create("user-1", "dev-2", "Garage Pi", DEFAULT_TTL_DAYS)
            .await
            .unwrap();

        let removed = store.revoke_for_device("dev-1").await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.get(&a.code).await.unwrap().is_none());
        assert!(store.get(&b.code).await.unwrap().is_none());
        assert!(store.get(&other.code).await.unwrap().is_some());
    }
}
