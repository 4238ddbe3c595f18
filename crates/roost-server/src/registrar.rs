//! The device registrar: mints and rotates device credentials.
//!
//! One entry point, [`Registrar::setup_device`], called only with a
//! verified identity. New devices get a fresh UUID and a fresh
//! registration; re-authentication requires the registration to already
//! exist under the calling account and revokes the prior credential before
//! the new one becomes active, so no window exists in which two live
//! credentials name the same device.

use tracing::{info, instrument};
use uuid::Uuid;

use roost_store::{AuthCodeStore, DeviceStore};

use crate::error::{ApiError, ApiResult};
use crate::identity::Identity;

/// Bounds on the device display name.
const NAME_MAX_CHARS: usize = 50;

/// The outcome of a successful setup call.
#[derive(Debug, Clone)]
pub struct ProvisionedDevice {
    /// The device's UUID — caller-supplied on re-auth, freshly minted
    /// otherwise.
    pub device_id: String,
    /// The new long-lived credential. Returned exactly once, here.
    pub auth_code: String,
}

/// Orchestrates device registration over the two stores.
#[derive(Clone)]
pub struct Registrar {
    codes: AuthCodeStore,
    devices: DeviceStore,
    ttl_days: i64,
}

impl Registrar {
    /// Create a registrar minting codes with the given TTL.
    pub fn new(codes: AuthCodeStore, devices: DeviceStore, ttl_days: i64) -> Self {
        Self {
            codes,
            devices,
            ttl_days,
        }
    }

    /// Register a device (or rotate an existing one's credential).
    ///
    /// # Errors
    ///
    /// - [`ApiError::InvalidArgument`] — name out of bounds, or
    ///   `existing_device_id` is not a UUID.
    /// - [`ApiError::NotFound`] — re-auth for a device this account does
    ///   not own. A client-supplied id is never silently registered.
    /// - [`ApiError::Internal`] — storage failures; detail stays in the
    ///   server log together with the caller's user id.
    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn setup_device(
        &self,
        identity: &Identity,
        device_name: &str,
        existing_device_id: Option<&str>,
    ) -> ApiResult<ProvisionedDevice> {
        let name_chars = device_name.chars().count();
        if name_chars == 0 || name_chars > NAME_MAX_CHARS {
            return Err(ApiError::InvalidArgument(format!(
                "deviceName must be 1-{NAME_MAX_CHARS} characters"
            )));
        }

        let device_id = match existing_device_id {
            // Re-authentication of a device this account already owns.
            Some(id) => {
                if Uuid::parse_str(id).is_err() {
                    return Err(ApiError::InvalidArgument(
                        "deviceId must be a valid UUID".into(),
                    ));
                }

                let registration = self
                    .devices
                    .get(&identity.user_id, id)
                    .await?
                    .ok_or_else(|| ApiError::NotFound(format!("device {id}")))?;

                // Close the two-live-credentials window before minting: the
                // back-referenced code and any stragglers for this device
                // all go.
                let revoked = self.codes.revoke_for_device(&registration.device_id).await?;
                if revoked > 0 {
                    info!(
                        device_id = %registration.device_id,
                        revoked,
                        "revoked prior credentials for re-authentication"
                    );
                }

                registration.device_id
            }
            // Brand-new device.
            None => Uuid::new_v4().to_string(),
        };

        let code = self
            .codes
            .create(&identity.user_id, &device_id, device_name, self.ttl_days)
            .await?;

        self.devices
            .record_setup(&identity.user_id, &device_id, device_name, &code.code)
            .await?;

        info!(
            device_id = %device_id,
            code_prefix = roost_store::auth_codes::code_prefix(&code.code),
            "device provisioned"
        );

        Ok(ProvisionedDevice {
            device_id,
            auth_code: code.code,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use roost_store::Database;

    async fn setup() -> (Registrar, AuthCodeStore, DeviceStore) {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        let codes = AuthCodeStore::new(db.clone());
        let devices = DeviceStore::new(db);
        (
            Registrar::new(codes.clone(), devices.clone(), 365),
            codes,
            devices,
        )
    }

    fn identity(user_id: &str) -> Identity {
        Identity {
            user_id: user_id.to_string(),
            email: None,
        }
    }

    #[tokio::test]
    async fn new_device_gets_uuid_and_code() {
        let (registrar, codes, devices) = setup().await;

        let provisioned = registrar
            .setup_device(&identity("user-1"), "Kitchen Pi", None)
            .await
            .unwrap();

        assert!(Uuid::parse_str(&provisioned.device_id).is_ok());
        assert!(roost_store::auth_codes::is_valid_format(&provisioned.auth_code));

        let validated = codes
            .validate(&provisioned.auth_code, &provisioned.device_id)
            .await
            .unwrap();
        assert_eq!(validated.user_id, "user-1");
        assert_eq!(validated.device_name, "Kitchen Pi");

        let registration = devices
            .get("user-1", &provisioned.device_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(registration.auth_code.as_deref(), Some(provisioned.auth_code.as_str()));
    }

    #[tokio::test]
    async fn reauth_revokes_prior_code() {
        let (registrar, codes, _devices) = setup().await;
        let user = identity("user-1");

        let first = registrar
            .setup_device(&user, "Kitchen Pi", None)
            .await
            .unwrap();
        let second = registrar
            .setup_device(&user, "Kitchen Pi", Some(&first.device_id))
            .await
            .unwrap();

        assert_eq!(second.device_id, first.device_id);
        assert_ne!(second.auth_code, first.auth_code);

        // The old credential is dead, the new one lives.
        let old = codes.validate(&first.auth_code, &first.device_id).await;
        assert!(matches!(old, Err(roost_store::StoreError::CodeNotFound)));
        codes
            .validate(&second.auth_code, &second.device_id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reauth_preserves_registered_at() {
        let (registrar, _codes, devices) = setup().await;
        let user = identity("user-1");

        let provisioned = registrar
            .setup_device(&user, "Kitchen Pi", None)
            .await
            .unwrap();
        let before = devices
            .get("user-1", &provisioned.device_id)
            .await
            .unwrap()
            .unwrap();

        registrar
            .setup_device(&user, "Kitchen Pi", Some(&provisioned.device_id))
            .await
            .unwrap();
        let after = devices
            .get("user-1", &provisioned.device_id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(after.registered_at, before.registered_at);
    }

    #[tokio::test]
    async fn reauth_unknown_device_is_not_found() {
        let (registrar, _codes, _devices) = setup().await;

        let ghost = Uuid::new_v4().to_string();
        let result = registrar
            .setup_device(&identity("user-1"), "Kitchen Pi", Some(&ghost))
            .await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn reauth_under_wrong_account_is_not_found() {
        let (registrar, _codes, _devices) = setup().await;

        let provisioned = registrar
            .setup_device(&identity("user-1"), "Kitchen Pi", None)
            .await
            .unwrap();

        // A different account may not rotate this device's credential.
        let result = registrar
            .setup_device(&identity("user-2"), "Kitchen Pi", Some(&provisioned.device_id))
            .await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn name_bounds_are_enforced() {
        let (registrar, _codes, _devices) = setup().await;
        let user = identity("user-1");

        let empty = registrar.setup_device(&user, "", None).await;
        assert!(matches!(empty, Err(ApiError::InvalidArgument(_))));

        let long = "x".repeat(51);
        let too_long = registrar.setup_device(&user, &long, None).await;
        assert!(matches!(too_long, Err(ApiError::InvalidArgument(_))));

        // 50 characters exactly is fine.
        let max = "x".repeat(50);
        registrar.setup_device(&user, &max, None).await.unwrap();
    }

    #[tokio::test]
    async fn malformed_device_id_is_invalid_argument() {
        let (registrar, _codes, _devices) = setup().await;

        let result = registrar
            .setup_device(&identity("user-1"), "Kitchen Pi", Some("not-a-uuid"))
            .await;
        assert!(matches!(result, Err(ApiError::InvalidArgument(_))));
    }
}
