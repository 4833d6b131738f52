//! First-sign-in provisioning for externally authenticated users

use std::sync::Arc;

use tracing::{error, info};

use crate::{
    error::AuthError,
    models::{NewUser, UserRecord},
    oauth::ExternalIdentity,
    repositories::UserStore,
};

/// Outcome of consulting the gate after a successful provider handshake
#[derive(Debug, Clone)]
pub enum ProvisioningDecision {
    /// Known user; session issuance may continue
    Proceed(UserRecord),
    /// User was just created and must finish onboarding before getting a session
    CompleteProfile {
        user: UserRecord,
        redirect_to: String,
    },
}

/// Decides between "existing user" and "just created" on external sign-in
#[derive(Clone)]
pub struct ProvisioningGate {
    users: Arc<dyn UserStore>,
    completion_route: String,
}

impl ProvisioningGate {
    pub fn new(users: Arc<dyn UserStore>, completion_route: impl Into<String>) -> Self {
        Self {
            users,
            completion_route: completion_route.into(),
        }
    }

    /// Look up the identity's email and create a pending user when missing
    ///
    /// Any store failure aborts the sign-in; a session is never issued
    /// without a durable user record behind it.
    pub async fn provision_or_proceed(
        &self,
        identity: &ExternalIdentity,
    ) -> Result<ProvisioningDecision, AuthError> {
        if let Some(user) = self.find(&identity.email).await? {
            return Ok(ProvisioningDecision::Proceed(user));
        }

        let new_user = NewUser {
            google_id: Some(identity.provider_id.clone()),
            refresh_token: identity.tokens.refresh_token.clone(),
            ..NewUser::pending_alumni(&identity.email, &identity.first_name, &identity.last_name)
        };

        let created = self.users.create(&new_user).await.map_err(|e| {
            error!("Failed to create user record: {}", e);
            AuthError::ProvisioningFailed(e.to_string())
        })?;

        match created {
            Some(user) => {
                info!("Provisioned user {} from external sign-in", user.id);
                Ok(ProvisioningDecision::CompleteProfile {
                    user,
                    redirect_to: self.completion_route.clone(),
                })
            }
            // A concurrent callback for the same email won the insert
            None => self
                .find(&identity.email)
                .await?
                .map(ProvisioningDecision::Proceed)
                .ok_or_else(|| {
                    AuthError::ProvisioningFailed(
                        "user record vanished after an email conflict".to_string(),
                    )
                }),
        }
    }

    async fn find(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        self.users.find_by_email(email).await.map_err(|e| {
            error!("Failed to look up user record: {}", e);
            AuthError::ProvisioningFailed(e.to_string())
        })
    }
}
