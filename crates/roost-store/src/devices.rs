//! Device registrations: one record per `(user, device)` pair.
//!
//! `registered_at` is written once, at first creation, and never again —
//! re-authentication only touches `name`, `last_setup`, and the active
//! auth-code back-reference. Deleting a registration cascades to revoking
//! the device's auth codes.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

/// Marker recorded on every registration written by the OAuth setup flow.
pub const SETUP_METHOD: &str = "oauth_pkce";

/// A persisted device registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRegistration {
    /// The owning account. Registrations are exclusively owned.
    pub user_id: String,
    /// The device's UUID.
    pub device_id: String,
    /// Display name (1–50 characters, validated at the API boundary).
    pub name: String,
    /// Unix timestamp of first registration. Immutable.
    pub registered_at: i64,
    /// Unix timestamp of the most recent successful setup.
    pub last_setup: i64,
    /// How the device was registered. Always [`SETUP_METHOD`] here.
    pub setup_method: String,
    /// The currently active auth code, kept for revocation lookup.
    pub auth_code: Option<String>,
}

/// CRUD over the `devices` table.
#[derive(Clone)]
pub struct DeviceStore {
    db: Database,
}

impl DeviceStore {
    /// Create a new store backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record a successful setup for `(user, device)`.
    ///
    /// Creates the registration on first setup; on re-authentication the
    /// existing row keeps its `registered_at` and gets a fresh `name`,
    /// `last_setup`, and `auth_code`.
    #[instrument(skip(self, auth_code))]
    pub async fn record_setup(
        &self,
        user_id: &str,
        device_id: &str,
        name: &str,
        auth_code: &str,
    ) -> StoreResult<DeviceRegistration> {
        let user_id = user_id.to_string();
        let device_id = device_id.to_string();
        let name = name.to_string();
        let auth_code = auth_code.to_string();
        let now = chrono::Utc::now().timestamp();

        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO devices (user_id, device_id, name, registered_at, last_setup, setup_method, auth_code) \
                     VALUES (?1, ?2, ?3, ?4, ?4, ?5, ?6) \
                     ON CONFLICT(user_id, device_id) DO UPDATE SET \
                         name = excluded.name, \
                         last_setup = excluded.last_setup, \
                         auth_code = excluded.auth_code",
                    rusqlite::params![user_id, device_id, name, now, SETUP_METHOD, auth_code],
                )?;

                let registration = conn.query_row(
                    "SELECT user_id, device_id, name, registered_at, last_setup, setup_method, auth_code \
                     FROM devices WHERE user_id = ?1 AND device_id = ?2",
                    rusqlite::params![user_id, device_id],
                    row_to_registration,
                )?;
                Ok(registration)
            })
            .await
    }

    /// Fetch the registration for `(user, device)`, if any.
    ///
    /// Lookups are always scoped by the owning user — one account can never
    /// observe another account's devices, even with a known device id.
    pub async fn get(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> StoreResult<Option<DeviceRegistration>> {
        let user_id = user_id.to_string();
        let device_id = device_id.to_string();
        self.db
            .execute(move |conn| {
                let result = conn.query_row(
                    "SELECT user_id, device_id, name, registered_at, last_setup, setup_method, auth_code \
                     FROM devices WHERE user_id = ?1 AND device_id = ?2",
                    rusqlite::params![user_id, device_id],
                    row_to_registration,
                );
                match result {
                    Ok(registration) => Ok(Some(registration)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(StoreError::Sqlite(e)),
                }
            })
            .await
    }

    /// Delete a registration and revoke the device's auth codes in one
    /// transaction.
    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: &str, device_id: &str) -> StoreResult<()> {
        let user_id = user_id.to_string();
        let device_id = device_id.to_string();

        self.db
            .execute_mut(move |conn| {
                let tx = conn.transaction()?;

                let deleted = tx.execute(
                    "DELETE FROM devices WHERE user_id = ?1 AND device_id = ?2",
                    rusqlite::params![user_id, device_id],
                )?;
                if deleted == 0 {
                    return Err(StoreError::NotFound {
                        entity: "device",
                        id: device_id,
                    });
                }

                tx.execute(
                    "DELETE FROM auth_codes WHERE device_id = ?1",
                    rusqlite::params![device_id],
                )?;

                tx.commit()?;
                Ok(())
            })
            .await?;

        debug!("device registration deleted");
        Ok(())
    }
}

/// Map a full `devices` row.
fn row_to_registration(row: &rusqlite::Row<'_>) -> rusqlite::Result<DeviceRegistration> {
    Ok(DeviceRegistration {
        user_id: row.get(0)?,
        device_id: row.get(1)?,
        name: row.get(2)?,
        registered_at: row.get(3)?,
        last_setup: row.get(4)?,
        setup_method: row.get(5)?,
        auth_code: row.get(6)?,
    })
}

// ── tests ────────────────────────────────────────────────────────────
