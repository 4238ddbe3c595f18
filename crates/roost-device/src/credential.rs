//! The local credential file.
//!
//! One JSON record mirrors the device's currently active auth code:
//! `{deviceId, deviceName, authCode}`. The file is overwritten wholesale on
//! every successful setup, written with owner-only permissions, and read
//! without locking at boot — a concurrent overwrite on a single-operator
//! device is a rare, acceptable race.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, Result};

/// The persisted mirror of the device's active credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    /// The device's UUID, assigned by the backend at first setup.
    pub device_id: String,
    /// The device's display name.
    pub device_name: String,
    /// The long-lived auth code (64 lowercase hex).
    pub auth_code: String,
}

/// Persistence for the device credential.
pub trait CredentialStore {
    /// Overwrite the stored credential wholesale.
    fn save(&self, record: &CredentialRecord) -> Result<()>;
    /// Load the stored credential, `None` if the device is unprovisioned.
    fn load(&self) -> Result<Option<CredentialRecord>>;
    /// Remove the stored credential. Idempotent.
    fn clear(&self) -> Result<()>;
}

/// File-backed credential store.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Create a store over an explicit path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The conventional per-installation path:
    /// `~/.roost/credentials.json`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::NoHomeDir`] when the home directory cannot be
    /// determined.
    pub fn default_path() -> Result<PathBuf> {
        let home = std::env::var_os("HOME").ok_or(DeviceError::NoHomeDir)?;
        Ok(PathBuf::from(home).join(".roost").join("credentials.json"))
    }

    /// The path this store reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn save(&self, record: &CredentialRecord) -> Result<()> {
        let data = serde_json::to_string_pretty(record)?;

        if let Some(parent) = self.path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }

        let mut options = OpenOptions::new();
        options.create(true).write(true).truncate(true);

        // Owner read/write only — the auth code is a bearer credential.
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&self.path)?;
        file.write_all(data.as_bytes())?;

        tracing::debug!(path = %self.path.display(), "credential file written");
        Ok(())
    }

    fn load(&self) -> Result<Option<CredentialRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let data = fs::read_to_string(&self.path)?;
        let record: CredentialRecord = serde_json::from_str(&data)?;
        Ok(Some(record))
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
            tracing::debug!(path = %self.path.display(), "credential file removed");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
