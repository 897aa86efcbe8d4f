//! Guuber core - account onboarding controllers.
//!
//! This crate holds the headless part of the Guuber onboarding flow:
//!
//! - Validating names, usernames, emails and passwords
//! - Driving the progressive-disclosure registration form
//! - Driving federated (Google) sign-in and its registration-completion step
//!
//! # Architecture
//!
//! Controllers own their state and talk to the outside world only through the
//! traits in [`gateway`]: the remote account service, the federated identity
//! provider and a cosmetic feedback sink. Rendering layers observe a
//! controller through [`form::RegistrationFormController::snapshot`] and the
//! event stream returned by [`form::RegistrationFormController::subscribe`].
//!
//! # Modules
//!
//! - [`validation`]: Pure string validators and password metrics
//! - [`types`]: Form fields, account records and sign-in outcomes
//! - [`error`]: Error taxonomy shared by every controller
//! - [`gateway`]: Collaborator traits
//! - [`form`]: Registration form controller
//! - [`federated`]: Federated sign-in controller

pub mod error;
pub mod federated;
pub mod form;
pub mod gateway;
pub mod types;
pub mod validation;

pub use error::{GatewayError, ProviderError, RegistrationError, Result, ValidationRule};
pub use federated::{AlternateSignInController, SessionState};
pub use form::{
    Advance, FormEvent, FormMode, FormSnapshot, RegistrationFormController, SubmissionOutcome,
    FEEDBACK_PULSE,
};
pub use gateway::{FederatedIdentityProvider, FeedbackSink, NoopFeedback, RemoteAccountGateway};
pub use types::{
    AccountRecord, FederatedCredential, FederatedSession, FieldState, FormField, FormStatus,
    NewAccount, ProfileUpdate, SignInOutcome,
};
pub use validation::{
    is_valid_completion_username, is_valid_email, is_valid_name, is_valid_password,
    is_valid_username, password_requirements, password_strength, PasswordRequirements,
    PasswordStrength,
};
