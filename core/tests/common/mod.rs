//! Shared fakes for the onboarding integration tests.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use guuber_core::{
    AccountRecord, FederatedCredential, FederatedIdentityProvider, FederatedSession, GatewayError,
    NewAccount, ProfileUpdate, ProviderError, RemoteAccountGateway,
};

/// A gateway call, recorded in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CheckUsername(String),
    CheckEmail(String),
    CreateAccount { username: String, email: String },
    SignIn(String),
    SignInWithCredential(String),
    SignOut,
    UpdateProfile { username: String, first_name: String },
}

/// In-memory account service.
#[derive(Default)]
pub struct MockGateway {
    taken_usernames: Vec<String>,
    taken_emails: Vec<String>,
    failure: Option<String>,
    federated_account: Option<AccountRecord>,
    calls: Mutex<Vec<Call>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_taken_username(mut self, username: &str) -> Self {
        self.taken_usernames.push(username.to_string());
        self
    }

    pub fn with_taken_email(mut self, email: &str) -> Self {
        self.taken_emails.push(email.to_string());
        self
    }

    /// Makes account creation and profile updates fail with `message`.
    pub fn failing_with(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Makes credential sign-in find an existing account.
    pub fn with_federated_account(mut self, record: AccountRecord) -> Self {
        self.federated_account = Some(record);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn fail_if_configured(&self) -> Result<(), GatewayError> {
        match &self.failure {
            Some(message) => Err(GatewayError::new(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteAccountGateway for MockGateway {
    async fn check_username_availability(&self, username: &str) -> Result<bool, GatewayError> {
        self.record(Call::CheckUsername(username.to_string()));
        Ok(!self
            .taken_usernames
            .iter()
            .any(|taken| taken.eq_ignore_ascii_case(username)))
    }

    async fn check_email_availability(&self, email: &str) -> Result<bool, GatewayError> {
        self.record(Call::CheckEmail(email.to_string()));
        Ok(!self.taken_emails.iter().any(|taken| taken == email))
    }

    async fn create_account(&self, account: &NewAccount) -> Result<AccountRecord, GatewayError> {
        self.record(Call::CreateAccount {
            username: account.username.clone(),
            email: account.email.clone(),
        });
        self.fail_if_configured()?;
        Ok(AccountRecord {
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            username: account.username.clone(),
            email: account.email.clone(),
            uid: "uid-new".to_string(),
            created_at: fixed_time(),
        })
    }

    async fn sign_in(&self, email: &str, _password: &str) -> Result<AccountRecord, GatewayError> {
        self.record(Call::SignIn(email.to_string()));
        Err(GatewayError::new("EMAIL_NOT_FOUND"))
    }

    async fn sign_in_with_credential(
        &self,
        credential: &FederatedCredential,
    ) -> Result<FederatedSession, GatewayError> {
        self.record(Call::SignInWithCredential(credential.email.clone()));
        Ok(FederatedSession {
            uid: "uid-google".to_string(),
            email: credential.email.clone(),
            account: self.federated_account.clone(),
        })
    }

    async fn sign_out(&self) -> Result<(), GatewayError> {
        self.record(Call::SignOut);
        Ok(())
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), GatewayError> {
        self.record(Call::UpdateProfile {
            username: update.username.clone(),
            first_name: update.first_name.clone(),
        });
        self.fail_if_configured()
    }
}

/// Identity provider returning a fixed credential, or a fixed error.
pub struct MockProvider {
    result: Result<FederatedCredential, ProviderError>,
    sign_outs: Mutex<usize>,
}

impl MockProvider {
    pub fn returning(given_name: &str, family_name: &str, email: &str) -> Self {
        Self {
            result: Ok(FederatedCredential {
                id_token: "id-token".to_string(),
                access_token: Some("access-token".to_string()),
                given_name: given_name.to_string(),
                family_name: family_name.to_string(),
                email: email.to_string(),
            }),
            sign_outs: Mutex::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(ProviderError::new(message)),
            sign_outs: Mutex::new(0),
        }
    }

    pub fn sign_outs(&self) -> usize {
        *self.sign_outs.lock().unwrap()
    }
}

#[async_trait]
impl FederatedIdentityProvider for MockProvider {
    async fn present_sign_in(&self) -> Result<FederatedCredential, ProviderError> {
        self.result.clone()
    }

    async fn sign_out(&self) {
        *self.sign_outs.lock().unwrap() += 1;
    }
}

pub fn fixed_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 5, 12, 0, 0).unwrap()
}

pub fn existing_account(username: &str) -> AccountRecord {
    AccountRecord {
        first_name: "Jo".to_string(),
        last_name: "Lee".to_string(),
        username: username.to_string(),
        email: "jo@x.com".to_string(),
        uid: "uid-google".to_string(),
        created_at: fixed_time(),
    }
}
