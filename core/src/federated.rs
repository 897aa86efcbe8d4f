//! Federated (Google) sign-in.
//!
//! [`AlternateSignInController`] runs the identity provider's sign-in flow,
//! exchanges the resulting credential with the remote account service, and
//! reports whether the identity already has an account. New identities must
//! pick a username and password before they are fully registered, either in
//! one call via [`AlternateSignInController::complete_registration`] or
//! through the reduced form returned by
//! [`AlternateSignInController::completion_form`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{GatewayError, RegistrationError, Result, ValidationRule};
use crate::form::{finish_profile, FormMode, RegistrationFormController, SubmissionOutcome};
use crate::gateway::{FederatedIdentityProvider, FeedbackSink, NoopFeedback, RemoteAccountGateway};
use crate::types::{AccountRecord, FormField, SignInOutcome};
use crate::validation::{is_valid_completion_username, is_valid_password, strip_whitespace};

/// Where a federated sign-in session stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    SignedOut,

    /// Signed in with the provider, but no account document exists yet.
    AwaitingCompletion {
        first_name: String,
        last_name: String,
    },

    /// Fully signed in. `account` is `None` right after registration
    /// completion, before the document has been read back.
    SignedIn { account: Option<AccountRecord> },
}

/// Controller for federated sign-in and registration completion.
pub struct AlternateSignInController {
    gateway: Arc<dyn RemoteAccountGateway>,
    provider: Arc<dyn FederatedIdentityProvider>,
    feedback: Arc<dyn FeedbackSink>,
    state: SessionState,
}

impl AlternateSignInController {
    pub fn new(
        gateway: Arc<dyn RemoteAccountGateway>,
        provider: Arc<dyn FederatedIdentityProvider>,
    ) -> Self {
        Self {
            gateway,
            provider,
            feedback: Arc::new(NoopFeedback),
            state: SessionState::SignedOut,
        }
    }

    /// Feedback sink handed to completion forms.
    #[must_use]
    pub fn with_feedback(mut self, feedback: Arc<dyn FeedbackSink>) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(self.state, SessionState::SignedIn { .. })
    }

    /// Signs in through the identity provider.
    ///
    /// Failures are reported as [`SignInOutcome::Failed`] with the provider's
    /// or gateway's message unchanged; the session state is left as it was.
    pub async fn sign_in(&mut self) -> SignInOutcome {
        let credential = match self.provider.present_sign_in().await {
            Ok(credential) => credential,
            Err(err) => {
                warn!(error = %err, "Identity provider sign-in failed");
                return SignInOutcome::Failed(err.to_string());
            }
        };

        let session = match self.gateway.sign_in_with_credential(&credential).await {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "Credential exchange failed");
                return SignInOutcome::Failed(err.message);
            }
        };

        match session.account {
            Some(record) => {
                info!(uid = %session.uid, "Federated sign-in for existing account");
                self.state = SessionState::SignedIn {
                    account: Some(record.clone()),
                };
                SignInOutcome::SignedIn(record)
            }
            None => {
                info!(uid = %session.uid, "Federated sign-in needs registration completion");
                self.state = SessionState::AwaitingCompletion {
                    first_name: credential.given_name.clone(),
                    last_name: credential.family_name.clone(),
                };
                SignInOutcome::NeedsRegistrationCompletion {
                    first_name: credential.given_name.clone(),
                    last_name: credential.family_name.clone(),
                }
            }
        }
    }

    /// Completes a pending registration with a chosen username and password.
    ///
    /// Whitespace is stripped from the username. The username must be 3-20
    /// word characters and the password must pass the password rule; if
    /// either fails no gateway call is made. The username is stored lowercase.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::NotAwaitingCompletion`] without a pending sign-in
    /// - [`RegistrationError::Validation`] for a rejected username or password
    /// - [`RegistrationError::UsernameTaken`]
    /// - [`RegistrationError::Gateway`] with the provider's message
    pub async fn complete_registration(&mut self, username: &str, password: &str) -> Result<()> {
        let (first_name, last_name) = self.pending_names()?;

        let username = strip_whitespace(username);
        if !is_valid_completion_username(&username) {
            return Err(RegistrationError::validation(
                FormField::Username,
                ValidationRule::CompletionUsername,
            ));
        }
        if !is_valid_password(password) {
            return Err(RegistrationError::validation(
                FormField::Password,
                ValidationRule::Password,
            ));
        }

        let username = finish_profile(
            self.gateway.as_ref(),
            &first_name,
            &last_name,
            &username,
            password,
        )
        .await?;

        info!(username = %username, "Registration completed");
        self.state = SessionState::SignedIn { account: None };
        Ok(())
    }

    /// Builds the reduced registration form for the pending identity.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::NotAwaitingCompletion`] without a pending sign-in.
    pub fn completion_form(&self) -> Result<RegistrationFormController> {
        let (first_name, last_name) = self.pending_names()?;
        Ok(
            RegistrationFormController::for_completion(
                first_name,
                last_name,
                Arc::clone(&self.gateway),
            )
            .with_feedback(Arc::clone(&self.feedback)),
        )
    }

    /// Submits a completion form and marks the session signed in on success.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::NotAwaitingCompletion`] without a pending sign-in
    /// or when `form` is a full registration form; otherwise whatever
    /// [`RegistrationFormController::submit`] reports.
    pub async fn submit_completion_form(
        &mut self,
        form: &mut RegistrationFormController,
    ) -> Result<SubmissionOutcome> {
        self.pending_names()?;
        if form.mode() != FormMode::CompleteProfile {
            return Err(RegistrationError::NotAwaitingCompletion);
        }

        let outcome = form.submit().await?;
        self.state = SessionState::SignedIn { account: None };
        Ok(outcome)
    }

    /// Signs out of the remote service and the identity provider.
    ///
    /// Idempotent: signing out while signed out succeeds and leaves the
    /// controller signed out.
    pub async fn sign_out(&mut self) -> std::result::Result<(), GatewayError> {
        self.gateway.sign_out().await?;
        self.provider.sign_out().await;
        debug!(previous = ?self.state, "Signed out");
        self.state = SessionState::SignedOut;
        Ok(())
    }

    fn pending_names(&self) -> Result<(String, String)> {
        match &self.state {
            SessionState::AwaitingCompletion {
                first_name,
                last_name,
            } => Ok((first_name.clone(), last_name.clone())),
            _ => Err(RegistrationError::NotAwaitingCompletion),
        }
    }
}

impl std::fmt::Debug for AlternateSignInController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlternateSignInController")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
