//! Shared data types for Guuber onboarding.
//!
//! Account records mirror the documents of the remote `users` collection and
//! serialize with the same camelCase field names.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// An input of the registration form.
///
/// The declaration order is the order fields are revealed in the full
/// registration form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormField {
    FirstName,
    LastName,
    Username,
    Email,
    Password,
    ConfirmPassword,
}

impl FormField {
    /// Every field, in declaration order.
    pub const ALL: [FormField; 6] = [
        FormField::FirstName,
        FormField::LastName,
        FormField::Username,
        FormField::Email,
        FormField::Password,
        FormField::ConfirmPassword,
    ];

    /// Human-readable label, as shown in the input placeholder.
    pub fn label(self) -> &'static str {
        match self {
            Self::FirstName => "First Name",
            Self::LastName => "Last Name",
            Self::Username => "Username",
            Self::Email => "Email",
            Self::Password => "Password",
            Self::ConfirmPassword => "Re-Enter Password",
        }
    }

    /// Returns `true` for inputs whose value must never be echoed or logged.
    pub fn is_secret(self) -> bool {
        matches!(self, Self::Password | Self::ConfirmPassword)
    }

    pub(crate) fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Render state of a single form input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldState {
    /// Current value, whitespace already stripped.
    pub value: String,

    /// Whether the input is shown.
    pub visible: bool,

    /// Whether the shake animation is running.
    pub shaking: bool,

    /// Whether the error highlight is shown.
    pub highlighted: bool,
}

/// Lifecycle of a form session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormStatus {
    /// Fields are being filled in.
    #[default]
    Editing,

    /// Every field validated and the passwords match.
    ReadyForSubmission,

    /// A submission is awaiting the remote service.
    Submitting,

    /// The submission succeeded; the draft has been discarded.
    Submitted,
}

/// A user account as stored by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub first_name: String,
    pub last_name: String,

    /// Always lowercase.
    pub username: String,
    pub email: String,

    /// Opaque identifier issued by the remote service.
    pub uid: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating an account.
#[derive(Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAccount")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Drop for NewAccount {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

/// Input for the profile update that completes a federated registration.
#[derive(Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

impl fmt::Debug for ProfileUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileUpdate")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish()
    }
}

impl Drop for ProfileUpdate {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

/// Tokens and profile data returned by a federated identity provider.
#[derive(Clone, PartialEq, Eq)]
pub struct FederatedCredential {
    pub id_token: String,
    pub access_token: Option<String>,
    pub given_name: String,
    pub family_name: String,
    pub email: String,
}

impl fmt::Debug for FederatedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FederatedCredential")
            .field("id_token", &"<redacted>")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("given_name", &self.given_name)
            .field("family_name", &self.family_name)
            .field("email", &self.email)
            .finish()
    }
}

/// Session obtained by exchanging a federated credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedSession {
    pub uid: String,
    pub email: String,

    /// `None` when no account document exists for this identity yet.
    pub account: Option<AccountRecord>,
}

/// Result of a federated sign-in attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    /// An account already exists for this identity.
    SignedIn(AccountRecord),

    /// The identity is new; the user still has to pick a username and password.
    NeedsRegistrationCompletion {
        first_name: String,
        last_name: String,
    },

    /// The provider or the remote service failed; the reason is verbatim.
    Failed(String),
}
