//! Error types for Guuber onboarding.
//!
//! # Error Types
//!
//! - [`ValidationRule`] - The rule a field value broke
//! - [`GatewayError`] - A failure reported by the remote account service
//! - [`ProviderError`] - A failure reported by the federated identity provider
//! - [`RegistrationError`] - Top-level error returned by the controllers
//!
//! Gateway and provider messages are carried verbatim so they can be shown to
//! the user exactly as the remote service phrased them.
//!
//! # Example
//!
//! ```rust
//! use guuber_core::error::{RegistrationError, ValidationRule};
//! use guuber_core::types::FormField;
//!
//! let err = RegistrationError::validation(FormField::Username, ValidationRule::Username);
//! assert!(err.is_recoverable_locally());
//! assert_eq!(err.field(), Some(FormField::Username));
//! ```

use std::fmt;

use thiserror::Error;

use crate::types::FormField;

/// The validation rule a field value failed.
///
/// The [`fmt::Display`] output is the user-facing explanation of the rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationRule {
    /// Names must be non-empty and alphabetic.
    Name,

    /// Usernames must be non-empty and use only letters, digits and `_`.
    Username,

    /// Usernames chosen after federated sign-in must also be 3-20 characters.
    CompletionUsername,

    /// Emails must look like `local@domain.tld`.
    Email,

    /// Passwords must meet the length and character-class requirements.
    Password,

    /// The field has not been revealed yet.
    NotVisible,
}

impl fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::Name => "Names can only contain letters",
            Self::Username => "Usernames can only contain letters, numbers, and underscores",
            Self::CompletionUsername => {
                "Username must be 3-20 characters and can only contain letters, numbers, and underscores"
            }
            Self::Email => "Please enter a valid email address",
            Self::Password => {
                "Password must be at least 8 characters long and contain at least one letter, one number, and one special character"
            }
            Self::NotVisible => "This field is not available yet",
        };
        f.write_str(message)
    }
}

/// A failure reported by the remote account service.
///
/// The message is the provider's own text, shown to the user unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct GatewayError {
    /// Provider-supplied message.
    pub message: String,
}

impl GatewayError {
    /// Creates a new gateway error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use guuber_core::error::GatewayError;
    ///
    /// let err = GatewayError::new("EMAIL_EXISTS");
    /// assert_eq!(err.to_string(), "EMAIL_EXISTS");
    /// ```
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A failure reported by the federated identity provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ProviderError(pub String);

impl ProviderError {
    /// Creates a new provider error.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Top-level error type for the onboarding controllers.
///
/// # Error Categories
///
/// - **Local errors**: [`Validation`](Self::Validation) and
///   [`Mismatch`](Self::Mismatch) are recovered on the spot; the user fixes the
///   field and commits again.
/// - **Availability errors**: [`UsernameTaken`](Self::UsernameTaken) and
///   [`EmailTaken`](Self::EmailTaken) come from remote checks during submission.
/// - **Remote errors**: [`Gateway`](Self::Gateway) carries the provider's
///   message verbatim.
/// - **Misuse**: [`NotReady`](Self::NotReady) and
///   [`NotAwaitingCompletion`](Self::NotAwaitingCompletion) flag operations
///   invoked out of order.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// A field value failed its validator.
    #[error("{rule}")]
    Validation {
        /// The offending field.
        field: FormField,
        /// The rule that failed.
        rule: ValidationRule,
    },

    /// The username is already registered (case-insensitive).
    #[error("Username is already taken")]
    UsernameTaken,

    /// The email address is already registered.
    #[error("Email is already in use")]
    EmailTaken,

    /// The remote account service rejected the request.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Password and confirmation differ.
    #[error("Passwords do not match")]
    Mismatch,

    /// `submit` was called before the form reached `ReadyForSubmission`.
    #[error("form is not ready for submission")]
    NotReady,

    /// Registration completion was requested without a pending federated sign-in.
    #[error("no federated sign-in is awaiting registration completion")]
    NotAwaitingCompletion,
}

impl RegistrationError {
    /// Creates a new validation error.
    pub fn validation(field: FormField, rule: ValidationRule) -> Self {
        Self::Validation { field, rule }
    }

    /// Creates a new gateway error from a provider message.
    ///
    /// # Example
    ///
    /// ```rust
    /// use guuber_core::error::RegistrationError;
    ///
    /// let err = RegistrationError::gateway("WEAK_PASSWORD");
    /// assert_eq!(err.to_string(), "WEAK_PASSWORD");
    /// ```
    pub fn gateway(message: impl Into<String>) -> Self {
        Self::Gateway(GatewayError::new(message))
    }

    /// Returns `true` if the user can fix this error by editing the current field.
    pub fn is_recoverable_locally(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::Mismatch)
    }

    /// Returns the field this error should be highlighted on, if any.
    pub fn field(&self) -> Option<FormField> {
        match self {
            Self::Validation { field, .. } => Some(*field),
            Self::UsernameTaken => Some(FormField::Username),
            Self::EmailTaken => Some(FormField::Email),
            Self::Mismatch => Some(FormField::ConfirmPassword),
            Self::Gateway(_) | Self::NotReady | Self::NotAwaitingCompletion => None,
        }
    }
}

/// A specialized Result type for onboarding operations.
pub type Result<T> = std::result::Result<T, RegistrationError>;
