//! Progressive-disclosure registration form.
//!
//! [`RegistrationFormController`] reveals the registration inputs one at a
//! time. A field is committed (the user presses return), validated, and only
//! then is the next field shown. Editing a field clears and hides every field
//! after it so a stale downstream value (a confirmation typed against an old
//! password, say) can never be submitted.
//!
//! # Sequences
//!
//! | Mode | Fields |
//! |------|--------|
//! | [`FormMode::CreateAccount`] | first name, last name, username, email, password, confirm |
//! | [`FormMode::CompleteProfile`] | username, password, confirm |
//!
//! The completion sequence is used after a federated sign-in for a new
//! identity: names come from the identity provider and the username must be
//! 3-20 characters.
//!
//! # Observing the form
//!
//! Rendering layers read [`RegistrationFormController::snapshot`] and listen to
//! the [`FormEvent`] stream from [`RegistrationFormController::subscribe`].
//! Shake/highlight feedback is requested through a [`FeedbackSink`] for
//! [`FEEDBACK_PULSE`]; the sink calls
//! [`RegistrationFormController::clear_feedback`] when the pulse ends.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut form = RegistrationFormController::new(gateway);
//! form.on_field_changed(FormField::FirstName, "Jo");
//! assert_eq!(form.commit(FormField::FirstName)?, Advance::Focus(FormField::LastName));
//! // ... fill in the remaining fields ...
//! let outcome = form.submit().await?;
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, Receiver, Sender};
use tracing::{debug, info, trace, warn};
use zeroize::Zeroize;

use crate::error::{RegistrationError, Result, ValidationRule};
use crate::gateway::{FeedbackSink, NoopFeedback, RemoteAccountGateway};
use crate::types::{AccountRecord, FieldState, FormField, FormStatus, NewAccount, ProfileUpdate};
use crate::validation::{
    is_valid_completion_username, is_valid_email, is_valid_name, is_valid_password,
    is_valid_username, password_requirements, password_strength, strip_whitespace,
    PasswordRequirements, PasswordStrength,
};

/// How long a shake/highlight pulse lasts.
pub const FEEDBACK_PULSE: Duration = Duration::from_millis(600);

/// Capacity of the form event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

const REGISTRATION_SEQUENCE: &[FormField] = &FormField::ALL;

const COMPLETION_SEQUENCE: &[FormField] = &[
    FormField::Username,
    FormField::Password,
    FormField::ConfirmPassword,
];

/// Which flow a form session drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    /// Full sign-up: creates a new account.
    CreateAccount,

    /// Reduced sign-up after federated sign-in: updates the signed-in profile.
    CompleteProfile,
}

impl FormMode {
    /// Fields of this mode, in reveal order.
    pub fn sequence(self) -> &'static [FormField] {
        match self {
            Self::CreateAccount => REGISTRATION_SEQUENCE,
            Self::CompleteProfile => COMPLETION_SEQUENCE,
        }
    }
}

/// Fields cleared and hidden when `field` is edited: everything after it in
/// `sequence`.
fn cascade_targets(sequence: &'static [FormField], field: FormField) -> &'static [FormField] {
    match sequence.iter().position(|f| *f == field) {
        Some(index) => &sequence[index + 1..],
        None => &[],
    }
}

/// What a successful commit leads to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The given field was revealed and should receive focus.
    Focus(FormField),

    /// Every field is valid and the passwords match.
    ReadyForSubmission,
}

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// A new account was created.
    AccountCreated(AccountRecord),

    /// The federated user's profile was completed with this (lowercase) username.
    ProfileCompleted { username: String },
}

/// Notifications published to form subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
    FieldRevealed(FormField),
    FieldsReset {
        after: FormField,
        cleared: Vec<FormField>,
    },
    FeedbackPulse {
        field: FormField,
        duration: Duration,
    },
    ValidationFailed {
        field: FormField,
        rule: ValidationRule,
    },
    PasswordMismatch,
    ReadyForSubmission,
    SubmissionStarted,
    SubmissionFailed(RegistrationError),
    AccountCreated(AccountRecord),
    ProfileCompleted { username: String },
}

/// Point-in-time view of a form, for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSnapshot {
    pub mode: FormMode,
    pub status: FormStatus,

    /// States of the fields in this mode's sequence, in order.
    pub fields: Vec<(FormField, FieldState)>,
}

impl FormSnapshot {
    /// State of `field`, if it belongs to this form.
    pub fn field(&self, field: FormField) -> Option<&FieldState> {
        self.fields
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, state)| state)
    }
}

/// Controller for one registration form session.
///
/// Each session owns its draft; nothing is shared between controllers. All
/// state-changing operations take `&mut self`, so a controller never has more
/// than one gateway call in flight. Dropping the controller (or the `submit`
/// future) abandons any pending call.
pub struct RegistrationFormController {
    mode: FormMode,
    fields: [FieldState; 6],
    status: FormStatus,
    gateway: Arc<dyn RemoteAccountGateway>,
    feedback: Arc<dyn FeedbackSink>,
    events: Sender<FormEvent>,
}

impl RegistrationFormController {
    /// Starts a full registration form with only the first name visible.
    pub fn new(gateway: Arc<dyn RemoteAccountGateway>) -> Self {
        Self::with_mode(FormMode::CreateAccount, gateway)
    }

    /// Starts a completion form for a federated identity.
    ///
    /// The names are kept as submitted by the identity provider; only the
    /// username is visible initially.
    pub fn for_completion(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        gateway: Arc<dyn RemoteAccountGateway>,
    ) -> Self {
        let mut form = Self::with_mode(FormMode::CompleteProfile, gateway);
        form.fields[FormField::FirstName.slot()].value = first_name.into();
        form.fields[FormField::LastName.slot()].value = last_name.into();
        form
    }

    fn with_mode(mode: FormMode, gateway: Arc<dyn RemoteAccountGateway>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let mut fields: [FieldState; 6] = Default::default();
        fields[mode.sequence()[0].slot()].visible = true;

        Self {
            mode,
            fields,
            status: FormStatus::Editing,
            gateway,
            feedback: Arc::new(NoopFeedback),
            events,
        }
    }

    /// Routes shake/highlight pulses to `feedback`.
    #[must_use]
    pub fn with_feedback(mut self, feedback: Arc<dyn FeedbackSink>) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn status(&self) -> FormStatus {
        self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status == FormStatus::ReadyForSubmission
    }

    /// Current state of `field`.
    pub fn field(&self, field: FormField) -> &FieldState {
        &self.fields[field.slot()]
    }

    /// Current value of `field`.
    pub fn value(&self, field: FormField) -> &str {
        &self.fields[field.slot()].value
    }

    /// The last visible field of the sequence, where input focus belongs.
    pub fn focus(&self) -> FormField {
        let sequence = self.mode.sequence();
        sequence
            .iter()
            .rev()
            .copied()
            .find(|f| self.fields[f.slot()].visible)
            .unwrap_or(sequence[0])
    }

    /// Requirement checklist for the current password.
    pub fn password_requirements(&self) -> PasswordRequirements {
        password_requirements(self.value(FormField::Password))
    }

    /// Strength meter for the current password.
    pub fn password_strength(&self) -> PasswordStrength {
        password_strength(self.value(FormField::Password))
    }

    /// Returns a copy of every field in this mode's sequence.
    pub fn snapshot(&self) -> FormSnapshot {
        FormSnapshot {
            mode: self.mode,
            status: self.status,
            fields: self
                .mode
                .sequence()
                .iter()
                .map(|f| (*f, self.fields[f.slot()].clone()))
                .collect(),
        }
    }

    /// Subscribes to form events published from now on.
    pub fn subscribe(&self) -> Receiver<FormEvent> {
        self.events.subscribe()
    }

    /// Stores a new value for `field` and resets everything after it.
    ///
    /// Whitespace is stripped before storing. Every field after `field` in the
    /// sequence is emptied and hidden and the form leaves
    /// `ReadyForSubmission`. Fields outside the mode's sequence (the captured
    /// names of a completion form) are read-only and edits to them are ignored.
    pub fn on_field_changed(&mut self, field: FormField, new_value: &str) {
        if !self.mode.sequence().contains(&field) {
            debug!(field = %field, mode = ?self.mode, "Ignoring edit to a field outside the form");
            return;
        }

        let slot = &mut self.fields[field.slot()];
        slot.value.zeroize();
        slot.value = strip_whitespace(new_value);

        let mut cleared = Vec::new();
        for target in cascade_targets(self.mode.sequence(), field) {
            let state = &mut self.fields[target.slot()];
            if state.visible || !state.value.is_empty() {
                cleared.push(*target);
            }
            state.value.zeroize();
            state.visible = false;
            state.shaking = false;
            state.highlighted = false;
        }
        self.status = FormStatus::Editing;

        if !cleared.is_empty() {
            trace!(field = %field, cleared = cleared.len(), "Reset downstream fields");
            self.publish(FormEvent::FieldsReset {
                after: field,
                cleared,
            });
        }
    }

    /// Validates `field` and, on success, reveals the next one.
    ///
    /// Committing the confirmation field compares the two passwords and, if
    /// they match, moves the form to `ReadyForSubmission`.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::Validation`] if the value fails its validator
    ///   (the field pulses) or the field is not visible (no pulse)
    /// - [`RegistrationError::Mismatch`] if the confirmation differs from the
    ///   password (the confirmation pulses)
    pub fn commit(&mut self, field: FormField) -> Result<Advance> {
        let sequence = self.mode.sequence();
        let position = sequence.iter().position(|f| *f == field);

        let index = match position {
            Some(index) if self.fields[field.slot()].visible => index,
            _ => {
                debug!(field = %field, "Commit on a hidden field");
                return Err(self.reject(field, ValidationRule::NotVisible));
            }
        };

        if let Some(rule) = self.violated_rule(field) {
            self.pulse(field);
            return Err(self.reject(field, rule));
        }

        match sequence.get(index + 1) {
            Some(&next) => {
                self.fields[next.slot()].visible = true;
                debug!(committed = %field, revealed = %next, "Field committed");
                self.publish(FormEvent::FieldRevealed(next));
                Ok(Advance::Focus(next))
            }
            None => self.confirm_passwords(),
        }
    }

    /// Ends the shake/highlight pulse on `field`.
    pub fn clear_feedback(&mut self, field: FormField) {
        let state = &mut self.fields[field.slot()];
        state.shaking = false;
        state.highlighted = false;
    }

    /// Submits the form.
    ///
    /// For [`FormMode::CreateAccount`] this checks username availability, then
    /// email availability, then creates the account. For
    /// [`FormMode::CompleteProfile`] it checks username availability, then
    /// updates the signed-in profile. Usernames are lowercased first.
    ///
    /// On failure the draft is left untouched and the form returns to
    /// `ReadyForSubmission` so the user can retry.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::NotReady`] unless the form is ready
    /// - [`RegistrationError::UsernameTaken`] / [`RegistrationError::EmailTaken`]
    /// - [`RegistrationError::Gateway`] with the provider's message
    pub async fn submit(&mut self) -> Result<SubmissionOutcome> {
        if self.status != FormStatus::ReadyForSubmission {
            return Err(RegistrationError::NotReady);
        }

        self.status = FormStatus::Submitting;
        self.publish(FormEvent::SubmissionStarted);

        let result = match self.mode {
            FormMode::CreateAccount => self.create_account().await,
            FormMode::CompleteProfile => self.complete_profile().await,
        };

        match result {
            Ok(outcome) => {
                self.status = FormStatus::Submitted;
                self.discard_draft();
                let event = match &outcome {
                    SubmissionOutcome::AccountCreated(record) => {
                        info!(uid = %record.uid, username = %record.username, "Account created");
                        FormEvent::AccountCreated(record.clone())
                    }
                    SubmissionOutcome::ProfileCompleted { username } => {
                        info!(username = %username, "Profile completed");
                        FormEvent::ProfileCompleted {
                            username: username.clone(),
                        }
                    }
                };
                self.publish(event);
                Ok(outcome)
            }
            Err(err) => {
                self.status = FormStatus::ReadyForSubmission;
                warn!(error = %err, "Submission failed");
                if let Some(field) = err.field() {
                    self.pulse(field);
                }
                self.publish(FormEvent::SubmissionFailed(err.clone()));
                Err(err)
            }
        }
    }

    async fn create_account(&self) -> Result<SubmissionOutcome> {
        let username = self.value(FormField::Username).to_lowercase();

        if !self.gateway.check_username_availability(&username).await? {
            return Err(RegistrationError::UsernameTaken);
        }

        let email = self.value(FormField::Email);
        if !self.gateway.check_email_availability(email).await? {
            return Err(RegistrationError::EmailTaken);
        }

        let account = NewAccount {
            first_name: self.value(FormField::FirstName).to_string(),
            last_name: self.value(FormField::LastName).to_string(),
            username,
            email: email.to_string(),
            password: self.value(FormField::Password).to_string(),
        };

        let record = self.gateway.create_account(&account).await?;
        Ok(SubmissionOutcome::AccountCreated(record))
    }

    async fn complete_profile(&self) -> Result<SubmissionOutcome> {
        let username = finish_profile(
            self.gateway.as_ref(),
            self.value(FormField::FirstName),
            self.value(FormField::LastName),
            self.value(FormField::Username),
            self.value(FormField::Password),
        )
        .await?;
        Ok(SubmissionOutcome::ProfileCompleted { username })
    }

    fn violated_rule(&self, field: FormField) -> Option<ValidationRule> {
        let value = self.value(field);
        let (valid, rule) = match field {
            FormField::FirstName | FormField::LastName => (is_valid_name(value), ValidationRule::Name),
            FormField::Username => match self.mode {
                FormMode::CreateAccount => (is_valid_username(value), ValidationRule::Username),
                FormMode::CompleteProfile => (
                    is_valid_completion_username(value),
                    ValidationRule::CompletionUsername,
                ),
            },
            FormField::Email => (is_valid_email(value), ValidationRule::Email),
            FormField::Password | FormField::ConfirmPassword => {
                (is_valid_password(value), ValidationRule::Password)
            }
        };
        (!valid).then_some(rule)
    }

    fn confirm_passwords(&mut self) -> Result<Advance> {
        if self.value(FormField::Password) == self.value(FormField::ConfirmPassword) {
            self.status = FormStatus::ReadyForSubmission;
            debug!("Passwords match, form ready for submission");
            self.publish(FormEvent::ReadyForSubmission);
            Ok(Advance::ReadyForSubmission)
        } else {
            self.status = FormStatus::Editing;
            self.pulse(FormField::ConfirmPassword);
            self.publish(FormEvent::PasswordMismatch);
            Err(RegistrationError::Mismatch)
        }
    }

    fn reject(&self, field: FormField, rule: ValidationRule) -> RegistrationError {
        debug!(field = %field, rule = ?rule, "Field rejected");
        self.publish(FormEvent::ValidationFailed { field, rule });
        RegistrationError::validation(field, rule)
    }

    fn pulse(&mut self, field: FormField) {
        let state = &mut self.fields[field.slot()];
        state.shaking = true;
        state.highlighted = true;
        self.feedback.pulse(field, FEEDBACK_PULSE);
        self.publish(FormEvent::FeedbackPulse {
            field,
            duration: FEEDBACK_PULSE,
        });
    }

    fn discard_draft(&mut self) {
        for state in &mut self.fields {
            state.value.zeroize();
        }
    }

    fn publish(&self, event: FormEvent) {
        match self.events.send(event) {
            Ok(receivers) => trace!(receivers, "Form event published"),
            Err(_) => trace!("No subscribers for form event"),
        }
    }
}

impl Drop for RegistrationFormController {
    fn drop(&mut self) {
        self.fields[FormField::Password.slot()].value.zeroize();
        self.fields[FormField::ConfirmPassword.slot()].value.zeroize();
    }
}

impl fmt::Debug for RegistrationFormController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationFormController")
            .field("mode", &self.mode)
            .field("status", &self.status)
            .field("focus", &self.focus())
            .finish_non_exhaustive()
    }
}

/// Checks availability of `username` (lowercased) and writes the completed
/// profile. Returns the stored username.
pub(crate) async fn finish_profile(
    gateway: &dyn RemoteAccountGateway,
    first_name: &str,
    last_name: &str,
    username: &str,
    password: &str,
) -> Result<String> {
    let username = username.to_lowercase();

    if !gateway.check_username_availability(&username).await? {
        return Err(RegistrationError::UsernameTaken);
    }

    let update = ProfileUpdate {
        username: username.clone(),
        password: password.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
    };
    gateway.update_profile(&update).await?;

    Ok(username)
}
