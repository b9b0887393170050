use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::identity::{IdentityError, IdentityProvider, NewAccount};
use crate::profile::{ProfileError, ProfileStore};

/// The caller of a provisioning operation, as established by the session
/// layer. The service never trusts the client beyond this: authorization is
/// decided here, server-side, before anything else happens.
#[derive(Debug, Clone, Copy)]
pub enum Caller {
    Anonymous,
    Authenticated { account_id: Uuid, admin: bool },
}

/// Canonical request schema for vendor creation. Call sites historically
/// disagreed on `name` vs `vendorName`; `name` is canonical and anything
/// unrecognized is rejected rather than dropped.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateVendorRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetAdminClaimRequest {
    pub uid: String,
}

#[derive(Debug, Clone)]
pub struct Provisioned {
    pub account_id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("caller is not authenticated")]
    Unauthenticated,
    #[error("admin access required")]
    PermissionDenied,
    #[error("{0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
}

/// Privileged account provisioning. Two operations, both admin-only, both
/// stateless per call; handles are injected at construction.
pub struct ProvisioningService {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
}

impl ProvisioningService {
    pub fn new(identity: Arc<dyn IdentityProvider>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self { identity, profiles }
    }

    /// Checks 1 and 2, shared by both operations. First failure wins and no
    /// side effect happens beforehand.
    fn require_admin(caller: &Caller) -> Result<Uuid, ProvisionError> {
        match caller {
            Caller::Anonymous => Err(ProvisionError::Unauthenticated),
            Caller::Authenticated { admin: false, .. } => Err(ProvisionError::PermissionDenied),
            Caller::Authenticated { account_id, admin: true } => Ok(*account_id),
        }
    }

    fn parse<T: serde::de::DeserializeOwned>(input: Value) -> Result<T, ProvisionError> {
        serde_json::from_value(input)
            .map_err(|e| ProvisionError::InvalidArgument(format!("invalid request: {e}")))
    }

    /// Create a vendor account plus its profile document.
    ///
    /// The two writes are sequential and non-transactional: a provider
    /// failure leaves nothing behind, while a profile-store failure after
    /// the account exists leaves an orphan, which is logged for the manual
    /// sweep (`perksctl sweep-orphans`). No rollback is attempted.
    pub async fn create_vendor_account(
        &self,
        caller: &Caller,
        input: Value,
    ) -> Result<Provisioned, ProvisionError> {
        let admin_id = Self::require_admin(caller)?;

        let req: CreateVendorRequest = Self::parse(input)?;
        if req.name.is_empty() || req.email.is_empty() || req.password.is_empty() {
            return Err(ProvisionError::InvalidArgument(
                "name, email, and password are required".to_string(),
            ));
        }

        let account = self
            .identity
            .create_account(NewAccount {
                email: req.email.clone(),
                password: req.password,
                display_name: req.name.clone(),
                // Vendors are onboarded manually, so verification mail is skipped
                email_verified: true,
            })
            .await?;

        if let Err(e) = self.profiles.put(account.id, &req.name, &req.email).await {
            tracing::warn!(
                target: "audit",
                account_id = %account.id,
                error = %e,
                "vendor profile write failed; account is orphaned pending manual sweep"
            );
            return Err(e.into());
        }

        tracing::info!(
            target: "audit",
            account_id = %account.id,
            granted_by = %admin_id,
            "vendor account provisioned"
        );

        Ok(Provisioned { account_id: account.id })
    }

    /// Grant the admin claim to an existing account.
    ///
    /// The grant is merged into the claim map and is idempotent. Sessions
    /// already in flight keep their pre-grant snapshot; the target must
    /// re-authenticate before the claim is honored.
    pub async fn set_admin_claim(
        &self,
        caller: &Caller,
        input: Value,
    ) -> Result<Provisioned, ProvisionError> {
        let admin_id = Self::require_admin(caller)?;

        let req: SetAdminClaimRequest = Self::parse(input)?;
        let uid = req.uid.trim();
        if uid.is_empty() {
            return Err(ProvisionError::InvalidArgument("uid is required".to_string()));
        }
        let target: Uuid = uid
            .parse()
            .map_err(|_| ProvisionError::InvalidArgument("uid is not a valid account id".to_string()))?;

        self.identity.set_claim(target, "admin", true).await?;

        tracing::info!(
            target: "audit",
            account_id = %target,
            granted_by = %admin_id,
            "admin claim granted"
        );

        Ok(Provisioned { account_id: target })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::memory::MemoryIdentityProvider;
    use crate::identity::Account;
    use crate::profile::memory::MemoryProfileStore;
    use async_trait::async_trait;
    use serde_json::json;

    fn service() -> (Arc<MemoryIdentityProvider>, Arc<MemoryProfileStore>, ProvisioningService) {
        let identity = Arc::new(MemoryIdentityProvider::new(6));
        let profiles = Arc::new(MemoryProfileStore::new());
        let svc = ProvisioningService::new(identity.clone(), profiles.clone());
        (identity, profiles, svc)
    }

    fn admin() -> Caller {
        Caller::Authenticated { account_id: Uuid::new_v4(), admin: true }
    }

    fn non_admin() -> Caller {
        Caller::Authenticated { account_id: Uuid::new_v4(), admin: false }
    }

    fn vendor_input() -> Value {
        json!({"name": "Tim Hortons", "email": "t@x.com", "password": "pw123456"})
    }

    /// Backends that must never be reached. Any call fails the test.
    struct Unreachable;

    #[async_trait]
    impl IdentityProvider for Unreachable {
        async fn create_account(&self, _: NewAccount) -> Result<Account, IdentityError> {
            panic!("identity provider called before authorization passed")
        }
        async fn account(&self, _: Uuid) -> Result<Account, IdentityError> {
            panic!("identity provider called before authorization passed")
        }
        async fn account_by_email(&self, _: &str) -> Result<Account, IdentityError> {
            panic!("identity provider called before authorization passed")
        }
        async fn set_claim(&self, _: Uuid, _: &str, _: bool) -> Result<(), IdentityError> {
            panic!("identity provider called before authorization passed")
        }
        async fn verify_password(&self, _: &str, _: &str) -> Result<Account, IdentityError> {
            panic!("identity provider called before authorization passed")
        }
        async fn list_account_ids(&self) -> Result<Vec<Uuid>, IdentityError> {
            panic!("identity provider called before authorization passed")
        }
    }

    #[async_trait]
    impl ProfileStore for Unreachable {
        async fn put(&self, _: Uuid, _: &str, _: &str) -> Result<crate::profile::VendorProfile, ProfileError> {
            panic!("profile store called before authorization passed")
        }
        async fn get(&self, _: Uuid) -> Result<crate::profile::VendorProfile, ProfileError> {
            panic!("profile store called before authorization passed")
        }
        async fn list_ids(&self) -> Result<Vec<Uuid>, ProfileError> {
            panic!("profile store called before authorization passed")
        }
    }

    /// A profile store whose writes always fail, for the orphan path.
    struct BrokenProfileStore;

    #[async_trait]
    impl ProfileStore for BrokenProfileStore {
        async fn put(&self, _: Uuid, _: &str, _: &str) -> Result<crate::profile::VendorProfile, ProfileError> {
            Err(ProfileError::Backend("disk on fire".to_string()))
        }
        async fn get(&self, id: Uuid) -> Result<crate::profile::VendorProfile, ProfileError> {
            Err(ProfileError::NotFound(id))
        }
        async fn list_ids(&self) -> Result<Vec<Uuid>, ProfileError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn unauthenticated_caller_reaches_no_backend() {
        let svc = ProvisioningService::new(Arc::new(Unreachable), Arc::new(Unreachable));

        let err = svc
            .create_vendor_account(&Caller::Anonymous, vendor_input())
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Unauthenticated));

        let err = svc
            .set_admin_claim(&Caller::Anonymous, json!({"uid": Uuid::new_v4().to_string()}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Unauthenticated));
    }

    #[tokio::test]
    async fn permission_check_precedes_field_validation() {
        // Non-admin caller AND empty fields: the claim check must win
        let svc = ProvisioningService::new(Arc::new(Unreachable), Arc::new(Unreachable));

        let err = svc
            .create_vendor_account(
                &non_admin(),
                json!({"name": "", "email": "", "password": ""}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::PermissionDenied));

        let err = svc.set_admin_claim(&non_admin(), json!({"uid": ""})).await.unwrap_err();
        assert!(matches!(err, ProvisionError::PermissionDenied));
    }

    #[tokio::test]
    async fn empty_fields_are_invalid_for_admin_callers() {
        let (_, _, svc) = service();

        let err = svc
            .create_vendor_account(
                &admin(),
                json!({"name": "Tim Hortons", "email": "", "password": "pw123456"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidArgument(_)));

        let err = svc.set_admin_claim(&admin(), json!({"uid": "  "})).await.unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn unknown_fields_are_rejected_not_dropped() {
        let (_, _, svc) = service();

        // A stale call site still sending vendorName must fail loudly
        let err = svc
            .create_vendor_account(
                &admin(),
                json!({"vendorName": "Tim Hortons", "email": "t@x.com", "password": "pw123456"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn create_writes_account_then_profile() {
        let (identity, profiles, svc) = service();

        let out = svc.create_vendor_account(&admin(), vendor_input()).await.unwrap();

        let account = identity.account(out.account_id).await.unwrap();
        assert_eq!(account.display_name, "Tim Hortons");
        assert!(account.email_verified);
        assert!(!account.is_admin());

        let profile = profiles.get(out.account_id).await.unwrap();
        assert_eq!(profile.name, "Tim Hortons");
        // Case-preserving, no normalization
        assert_eq!(profile.email, "t@x.com");
    }

    #[tokio::test]
    async fn duplicate_email_fails_second_call_and_leaves_one_profile() {
        let (_, profiles, svc) = service();

        svc.create_vendor_account(&admin(), vendor_input()).await.unwrap();
        let err = svc.create_vendor_account(&admin(), vendor_input()).await.unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::Identity(IdentityError::EmailExists(_))
        ));
        assert_eq!(profiles.list_ids().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn profile_write_failure_orphans_the_account() {
        let identity = Arc::new(MemoryIdentityProvider::new(6));
        let svc = ProvisioningService::new(identity.clone(), Arc::new(BrokenProfileStore));

        let err = svc.create_vendor_account(&admin(), vendor_input()).await.unwrap_err();
        assert!(matches!(err, ProvisionError::Profile(ProfileError::Backend(_))));

        // The account exists with no profile document: an orphan, no rollback
        assert_eq!(identity.list_account_ids().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn admin_claim_grant_is_idempotent_and_merges() {
        let (identity, _, svc) = service();

        let out = svc.create_vendor_account(&admin(), vendor_input()).await.unwrap();
        identity.set_claim(out.account_id, "beta", true).await.unwrap();

        let uid = out.account_id.to_string();
        svc.set_admin_claim(&admin(), json!({"uid": &uid})).await.unwrap();
        svc.set_admin_claim(&admin(), json!({"uid": &uid})).await.unwrap();

        let account = identity.account(out.account_id).await.unwrap();
        assert!(account.is_admin());
        assert_eq!(account.claims.get("beta"), Some(&true));
    }

    #[tokio::test]
    async fn non_admin_grant_leaves_claims_unchanged() {
        let (identity, _, svc) = service();

        let out = svc.create_vendor_account(&admin(), vendor_input()).await.unwrap();

        let err = svc
            .set_admin_claim(&non_admin(), json!({"uid": out.account_id.to_string()}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::PermissionDenied));

        let account = identity.account(out.account_id).await.unwrap();
        assert!(!account.is_admin());
    }

    #[tokio::test]
    async fn granting_to_unknown_account_is_passthrough_not_found() {
        let (_, _, svc) = service();

        let err = svc
            .set_admin_claim(&admin(), json!({"uid": Uuid::new_v4().to_string()}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Identity(IdentityError::NotFound(_))));
    }
}
