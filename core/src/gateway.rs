//! Collaborator traits consumed by the onboarding controllers.
//!
//! - [`RemoteAccountGateway`]: the remote auth + document service
//! - [`FederatedIdentityProvider`]: a third-party sign-in (e.g. Google)
//! - [`FeedbackSink`]: cosmetic shake/highlight pulses on form inputs
//!
//! The controllers hold these behind `Arc<dyn ...>`, so implementations must
//! be `Send + Sync`.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{GatewayError, ProviderError};
use crate::types::{
    AccountRecord, FederatedCredential, FederatedSession, FormField, NewAccount, ProfileUpdate,
};

/// Remote account service.
///
/// Inputs are validated by the caller before they reach the gateway.
/// Availability checks compare usernames case-insensitively.
#[async_trait]
pub trait RemoteAccountGateway: Send + Sync {
    /// Returns `true` if no account uses `username`, ignoring case.
    async fn check_username_availability(&self, username: &str) -> Result<bool, GatewayError>;

    /// Returns `true` if no account uses `email`.
    async fn check_email_availability(&self, email: &str) -> Result<bool, GatewayError>;

    /// Creates the auth user and its account document.
    async fn create_account(&self, account: &NewAccount) -> Result<AccountRecord, GatewayError>;

    /// Signs in with email and password and loads the account document.
    async fn sign_in(&self, email: &str, password: &str) -> Result<AccountRecord, GatewayError>;

    /// Exchanges a federated credential for a session.
    async fn sign_in_with_credential(
        &self,
        credential: &FederatedCredential,
    ) -> Result<FederatedSession, GatewayError>;

    /// Ends the current session. Must succeed when no session is active.
    async fn sign_out(&self) -> Result<(), GatewayError>;

    /// Writes username, password and names for the signed-in user, stamping
    /// the document with a server-assigned creation time.
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), GatewayError>;
}

/// Third-party identity provider.
#[async_trait]
pub trait FederatedIdentityProvider: Send + Sync {
    /// Runs the provider's sign-in flow.
    async fn present_sign_in(&self) -> Result<FederatedCredential, ProviderError>;

    /// Forgets the provider session.
    async fn sign_out(&self);
}

/// Receiver of cosmetic error feedback.
///
/// A pulse is fire-and-forget: the sink animates `field` for `duration` and the
/// controller's flags are cleared with
/// [`RegistrationFormController::clear_feedback`](crate::form::RegistrationFormController::clear_feedback).
pub trait FeedbackSink: Send + Sync {
    fn pulse(&self, field: FormField, duration: Duration);
}

/// A [`FeedbackSink`] that ignores every pulse.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFeedback;

impl FeedbackSink for NoopFeedback {
    fn pulse(&self, _field: FormField, _duration: Duration) {}
}
