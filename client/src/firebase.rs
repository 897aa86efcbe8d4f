//! Firebase client module implementing the remote account gateway.
//!
//! [`FirebaseGateway`] speaks two REST APIs:
//! - Identity Toolkit (`/v1/accounts:*`) for sign-up, sign-in and password changes
//! - Cloud Firestore (`/v1/projects/{p}/databases/(default)/documents`) for the
//!   `users` collection
//!
//! # Architecture
//!
//! The gateway is shared behind an `Arc` and keeps the signed-in user's ID
//! token in a [`RwLock`]. Document reads and writes are authorized with that
//! token; availability queries go out with the API key only. Provider error
//! bodies (`{"error": {"message": ...}}`) are surfaced verbatim through
//! [`FirebaseError::Rejected`].
//!
//! # Example
//!
//! ```rust,ignore
//! use guuber_client::{config::Config, firebase::FirebaseGateway};
//!
//! let gateway = FirebaseGateway::from_config(&Config::from_env()?)?;
//! let available = gateway.username_available("jo_lee1").await?;
//! ```

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::form_urlencoded;

use guuber_core::{
    AccountRecord, FederatedCredential, FederatedSession, GatewayError, NewAccount,
    ProfileUpdate, RemoteAccountGateway,
};

use crate::config::Config;
use crate::firestore::{self, Document, QueryResult, USERS_COLLECTION};

/// Request URI reported to `signInWithIdp`; the REST API requires one.
const IDP_REQUEST_URI: &str = "http://localhost";

/// Federated provider ID for Google.
const GOOGLE_PROVIDER_ID: &str = "google.com";

/// Errors that can occur when talking to Firebase.
#[derive(Debug, Error)]
pub enum FirebaseError {
    /// The ID token was rejected.
    #[error("unauthorized: invalid or expired ID token")]
    Unauthorized,

    /// The request timed out.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Firebase is unreachable.
    #[error("firebase unavailable: {0}")]
    Unavailable(String),

    /// Firebase answered with an error message, kept verbatim.
    #[error("{0}")]
    Rejected(String),

    /// The response could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Client configuration error.
    #[error("client configuration error: {0}")]
    Configuration(String),

    /// An operation needed a signed-in user.
    #[error("no user is signed in")]
    NoActiveSession,
}

impl From<FirebaseError> for GatewayError {
    fn from(err: FirebaseError) -> Self {
        GatewayError::new(err.to_string())
    }
}

/// The signed-in user.
#[derive(Clone)]
struct AuthSession {
    uid: String,
    email: String,
    id_token: String,
}

/// Common shape of Identity Toolkit sign-in responses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    id_token: String,
    local_id: String,
    #[serde(default)]
    email: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdpRequest {
    post_body: String,
    request_uri: &'static str,
    return_secure_token: bool,
    return_idp_credential: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordUpdateRequest<'a> {
    id_token: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    id_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordUpdateResponse {
    id_token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Gateway to Firebase Authentication and Cloud Firestore.
pub struct FirebaseGateway {
    http_client: Client,
    api_key: String,
    project_id: String,
    auth_url: String,
    firestore_url: String,
    timeout: Duration,
    session: RwLock<Option<AuthSession>>,
}

impl FirebaseGateway {
    /// Creates a gateway from explicit endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`FirebaseError::Configuration`] if the HTTP client cannot be created.
    pub fn new(
        api_key: impl Into<String>,
        project_id: impl Into<String>,
        auth_url: impl Into<String>,
        firestore_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FirebaseError> {
        let http_client = Client::builder().timeout(timeout).build().map_err(|e| {
            FirebaseError::Configuration(format!("failed to create HTTP client: {e}"))
        })?;

        Ok(Self {
            http_client,
            api_key: api_key.into(),
            project_id: project_id.into(),
            auth_url: auth_url.into().trim_end_matches('/').to_string(),
            firestore_url: firestore_url.into().trim_end_matches('/').to_string(),
            timeout,
            session: RwLock::new(None),
        })
    }

    /// Creates a gateway from the client configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FirebaseError::Configuration`] if the HTTP client cannot be created.
    pub fn from_config(config: &Config) -> Result<Self, FirebaseError> {
        Self::new(
            &config.api_key,
            &config.project_id,
            &config.auth_url,
            &config.firestore_url,
            config.request_timeout,
        )
    }

    /// Returns the uid of the signed-in user, if any.
    pub fn current_uid(&self) -> Option<String> {
        self.session_snapshot().map(|session| session.uid)
    }

    /// Returns `true` if no `users` document has `username` (compared lowercase).
    ///
    /// # Errors
    ///
    /// Any transport or provider failure.
    pub async fn username_available(&self, username: &str) -> Result<bool, FirebaseError> {
        self.field_unused("username", &username.to_lowercase())
            .await
    }

    /// Returns `true` if no `users` document has `email`.
    ///
    /// # Errors
    ///
    /// Any transport or provider failure.
    pub async fn email_available(&self, email: &str) -> Result<bool, FirebaseError> {
        self.field_unused("email", email).await
    }

    /// Creates the auth user, then its account document.
    ///
    /// # Errors
    ///
    /// [`FirebaseError::Rejected`] with the provider message (e.g. `EMAIL_EXISTS`).
    pub async fn register(&self, account: &NewAccount) -> Result<AccountRecord, FirebaseError> {
        let auth: AuthResponse = self
            .identity_call(
                "accounts:signUp",
                &PasswordRequest {
                    email: &account.email,
                    password: &account.password,
                    return_secure_token: true,
                },
            )
            .await?;

        info!(uid = %auth.local_id, "Auth user created");
        self.store_session(&auth, &account.email);

        let fields = firestore::account_fields(
            &account.first_name,
            &account.last_name,
            &account.username,
            &account.email,
            &auth.local_id,
            Some(Utc::now()),
        );
        let request = self
            .http_client
            .patch(self.user_document_url(&auth.local_id))
            .bearer_auth(&auth.id_token)
            .json(&serde_json::json!({ "fields": fields }));
        let document: Document = match self.send_json(request).await {
            Ok(document) => document,
            Err(err) => {
                warn!(uid = %auth.local_id, error = %err, "Account document write failed");
                self.discard_auth_user(&auth).await;
                return Err(err);
            }
        };

        firestore::decode_account(&document)
    }

    /// Deletes an auth user whose account document was never written, so the
    /// same email can sign up again, and forgets its session.
    async fn discard_auth_user(&self, auth: &AuthResponse) {
        let deleted: Result<Value, FirebaseError> = self
            .identity_call(
                "accounts:delete",
                &DeleteRequest {
                    id_token: &auth.id_token,
                },
            )
            .await;
        match deleted {
            Ok(_) => info!(uid = %auth.local_id, "Auth user rolled back"),
            Err(err) => warn!(uid = %auth.local_id, error = %err, "Failed to roll back auth user"),
        }
        self.clear_session();
    }

    /// Signs in with email and password and loads the account document.
    ///
    /// # Errors
    ///
    /// [`FirebaseError::Rejected`] for bad credentials, or
    /// [`FirebaseError::InvalidResponse`] if the user has no account document.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AccountRecord, FirebaseError> {
        let auth: AuthResponse = self
            .identity_call(
                "accounts:signInWithPassword",
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;

        self.store_session(&auth, email);
        debug!(uid = %auth.local_id, "Signed in with password");

        match self.fetch_account(&auth.local_id, &auth.id_token).await? {
            Some(record) => Ok(record),
            None => Err(FirebaseError::InvalidResponse(format!(
                "no account document for {}",
                auth.local_id
            ))),
        }
    }

    /// Exchanges a federated credential and looks up its account document.
    ///
    /// # Errors
    ///
    /// Any transport or provider failure.
    pub async fn sign_in_with_idp(
        &self,
        credential: &FederatedCredential,
    ) -> Result<FederatedSession, FirebaseError> {
        let post_body = {
            let mut form = form_urlencoded::Serializer::new(String::new());
            form.append_pair("id_token", &credential.id_token)
                .append_pair("providerId", GOOGLE_PROVIDER_ID);
            if let Some(access_token) = &credential.access_token {
                form.append_pair("access_token", access_token);
            }
            form.finish()
        };

        let auth: AuthResponse = self
            .identity_call(
                "accounts:signInWithIdp",
                &IdpRequest {
                    post_body,
                    request_uri: IDP_REQUEST_URI,
                    return_secure_token: true,
                    return_idp_credential: true,
                },
            )
            .await?;

        let email = if auth.email.is_empty() {
            credential.email.clone()
        } else {
            auth.email.clone()
        };
        self.store_session(&auth, &email);

        let account = self.fetch_account(&auth.local_id, &auth.id_token).await?;
        debug!(
            uid = %auth.local_id,
            has_account = account.is_some(),
            "Signed in with federated credential"
        );

        Ok(FederatedSession {
            uid: auth.local_id,
            email,
            account,
        })
    }

    /// Sets the password of the signed-in user and writes their profile
    /// document with a server-assigned `createdAt`.
    ///
    /// # Errors
    ///
    /// [`FirebaseError::NoActiveSession`] when nobody is signed in.
    pub async fn complete_profile(&self, update: &ProfileUpdate) -> Result<(), FirebaseError> {
        let session = self
            .session_snapshot()
            .ok_or(FirebaseError::NoActiveSession)?;

        let response: PasswordUpdateResponse = self
            .identity_call(
                "accounts:update",
                &PasswordUpdateRequest {
                    id_token: &session.id_token,
                    password: &update.password,
                    return_secure_token: true,
                },
            )
            .await?;

        // Changing the password revokes the old token.
        let id_token = match response.id_token {
            Some(token) => {
                self.replace_token(&token);
                token
            }
            None => session.id_token.clone(),
        };

        let fields = firestore::account_fields(
            &update.first_name,
            &update.last_name,
            &update.username,
            &session.email,
            &session.uid,
            None,
        );
        let body = firestore::profile_commit(&self.user_document_name(&session.uid), fields);
        let request = self
            .http_client
            .post(format!("{}:commit", self.documents_url()))
            .bearer_auth(&id_token)
            .json(&body);
        let _: Value = self.send_json(request).await?;

        info!(uid = %session.uid, username = %update.username, "Profile written");
        Ok(())
    }

    /// Forgets the signed-in user. Succeeds when nobody is signed in.
    pub fn clear_session(&self) {
        let previous = self
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(session) = previous {
            debug!(uid = %session.uid, "Session cleared");
        }
    }

    async fn field_unused(&self, field: &str, value: &str) -> Result<bool, FirebaseError> {
        let mut request = self
            .http_client
            .post(format!("{}:runQuery", self.documents_url()))
            .query(&[("key", self.api_key.as_str())])
            .json(&firestore::equality_query(field, value));
        if let Some(session) = self.session_snapshot() {
            request = request.bearer_auth(session.id_token);
        }

        let results: Vec<QueryResult> = self.send_json(request).await?;
        let unused = results.iter().all(|result| result.document.is_none());
        debug!(field, unused, "Availability query finished");
        Ok(unused)
    }

    async fn fetch_account(
        &self,
        uid: &str,
        id_token: &str,
    ) -> Result<Option<AccountRecord>, FirebaseError> {
        let response = self
            .send(
                self.http_client
                    .get(self.user_document_url(uid))
                    .bearer_auth(id_token),
            )
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let document: Document = Self::parse(response).await?;
        firestore::decode_account(&document).map(Some)
    }

    async fn identity_call<B, T>(&self, method: &str, body: &B) -> Result<T, FirebaseError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/v1/{method}", self.auth_url);
        debug!(url = %url, "Calling Identity Toolkit");
        let request = self
            .http_client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(body);
        self.send_json(request).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, FirebaseError> {
        let response = self.send(request).await?;
        Self::parse(response).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, FirebaseError> {
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                FirebaseError::Timeout(self.timeout)
            } else if e.is_connect() {
                FirebaseError::Unavailable(format!("connection failed: {e}"))
            } else {
                FirebaseError::Unavailable(format!("request failed: {e}"))
            }
        })
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, FirebaseError> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) {
                warn!(status = %status, message = %envelope.error.message, "Firebase rejected request");
                return Err(FirebaseError::Rejected(envelope.error.message));
            }
            if status == StatusCode::UNAUTHORIZED {
                return Err(FirebaseError::Unauthorized);
            }
            return Err(FirebaseError::InvalidResponse(format!(
                "unexpected status {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| FirebaseError::InvalidResponse(format!("failed to parse response: {e}")))
    }

    fn documents_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/databases/(default)/documents",
            self.firestore_url, self.project_id
        )
    }

    fn user_document_name(&self, uid: &str) -> String {
        format!(
            "projects/{}/databases/(default)/documents/{USERS_COLLECTION}/{uid}",
            self.project_id
        )
    }

    fn user_document_url(&self, uid: &str) -> String {
        format!("{}/{USERS_COLLECTION}/{uid}", self.documents_url())
    }

    fn session_snapshot(&self) -> Option<AuthSession> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store_session(&self, auth: &AuthResponse, email: &str) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(AuthSession {
            uid: auth.local_id.clone(),
            email: email.to_string(),
            id_token: auth.id_token.clone(),
        });
    }

    fn replace_token(&self, id_token: &str) {
        if let Some(session) = self
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            session.id_token = id_token.to_string();
        }
    }
}

impl std::fmt::Debug for FirebaseGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseGateway")
            .field("project_id", &self.project_id)
            .field("auth_url", &self.auth_url)
            .field("firestore_url", &self.firestore_url)
            .field("signed_in", &self.current_uid().is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RemoteAccountGateway for FirebaseGateway {
    async fn check_username_availability(&self, username: &str) -> Result<bool, GatewayError> {
        Ok(self.username_available(username).await?)
    }

    async fn check_email_availability(&self, email: &str) -> Result<bool, GatewayError> {
        Ok(self.email_available(email).await?)
    }

    async fn create_account(&self, account: &NewAccount) -> Result<AccountRecord, GatewayError> {
        Ok(self.register(account).await?)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AccountRecord, GatewayError> {
        Ok(self.sign_in_with_password(email, password).await?)
    }

    async fn sign_in_with_credential(
        &self,
        credential: &FederatedCredential,
    ) -> Result<FederatedSession, GatewayError> {
        Ok(self.sign_in_with_idp(credential).await?)
    }

    async fn sign_out(&self) -> Result<(), GatewayError> {
        self.clear_session();
        Ok(())
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), GatewayError> {
        Ok(self.complete_profile(update).await?)
    }
}
