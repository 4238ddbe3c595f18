//! # roost-device
//!
//! Device-side runtime pieces for Roost.
//!
//! A provisioned device holds exactly one durable secret: the long-lived
//! auth code written by `roost setup` into a 0o600 credential file. At
//! every boot the runtime constructs a [`DeviceSession`] from that file and
//! exchanges the code for a short-lived session token via the backend's
//! refresh endpoint — the only call a device ever makes without an
//! interactive login.
//!
//! There is deliberately no global credential state: the session is built
//! once at process start and passed to whatever needs it, and the file is
//! never implicitly reloaded.

pub mod collaborators;
pub mod credential;
pub mod error;
pub mod session;

// Re-export key types at the crate root for convenience.
pub use collaborators::{CommandHandler, TelemetrySink};
pub use credential::{CredentialRecord, CredentialStore, FileCredentialStore};
pub use error::{DeviceError, Result};
pub use session::DeviceSession;
