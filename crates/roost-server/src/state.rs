//! Shared application state for the backend.
//!
//! [`AppState`] is wrapped in an `Arc` and shared across all request
//! handlers. The identity verifier sits behind a trait object so tests can
//! substitute the provider.

use std::sync::Arc;

use roost_store::{AuthCodeStore, Database, DeviceStore};

use crate::config::ServerConfig;
use crate::identity::IdentityVerifier;
use crate::registrar::Registrar;
use crate::token::SessionTokenService;

/// Shared state accessible from every handler.
pub struct AppState {
    /// The device registrar.
    pub registrar: Registrar,
    /// Auth-code store, used directly by the refresh endpoint.
    pub auth_codes: AuthCodeStore,
    /// Session-token mint/verify service.
    pub tokens: SessionTokenService,
    /// Identity-provider verification seam.
    pub identity: Arc<dyn IdentityVerifier>,
}

impl AppState {
    /// Assemble application state over an opened database.
    pub fn new(config: &ServerConfig, db: Database, identity: Arc<dyn IdentityVerifier>) -> Self {
        let auth_codes = AuthCodeStore::new(db.clone());
        let devices = DeviceStore::new(db);
        let registrar = Registrar::new(
            auth_codes.clone(),
            devices,
            config.auth_code_ttl_days,
        );

        Self {
            registrar,
            auth_codes,
            tokens: SessionTokenService::new(&config.token_secret),
            identity,
        }
    }
}
