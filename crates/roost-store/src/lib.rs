//! # roost-store
//!
//! Backend persistence for Roost device provisioning.
//!
//! Provides SQLite-backed storage (WAL mode, versioned transactional
//! migrations) for the two durable entities of the provisioning protocol:
//!
//! - **Auth codes** — long-lived revocable device credentials, keyed by the
//!   code value itself (the code is a bearer credential, not merely an
//!   identifier).
//! - **Device registrations** — one per `(user, device)` pair, carrying a
//!   back-reference to the currently active auth code.
//!
//! All access goes through [`Database`], which dispatches closures onto the
//! blocking thread pool so async handlers never block on SQLite.

pub mod auth_codes;
pub mod db;
pub mod devices;
pub mod error;
pub mod migration;

// ── re-exports ───────────────────────────────────────────────────────

pub use auth_codes::{AuthCode, AuthCodeStore, ValidatedCode};
pub use db::Database;
pub use devices::{DeviceRegistration, DeviceStore};
pub use error::{StoreError, StoreResult};
