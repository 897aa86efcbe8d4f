//! Integration tests for the terminal front-end against a mocked Firebase.
//!
//! Each test scripts the user's keystrokes, runs the form driver over a
//! [`FirebaseGateway`] pointed at a wiremock server and checks both the
//! printed transcript and the requests Firebase received.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use guuber_client::firebase::FirebaseGateway;
use guuber_client::identity::IdTokenProvider;
use guuber_client::terminal::{self, FormRun, ScriptedInput};
use guuber_core::{
    AlternateSignInController, RegistrationFormController, SignInOutcome, SubmissionOutcome,
};

// ============================================================================
// Test Helpers
// ============================================================================

const DOCS: &str = "/v1/projects/guuber-test/databases/(default)/documents";

fn gateway(server: &MockServer) -> Arc<FirebaseGateway> {
    Arc::new(
        FirebaseGateway::new(
            "test-key",
            "guuber-test",
            server.uri(),
            server.uri(),
            Duration::from_secs(5),
        )
        .expect("should create gateway"),
    )
}

fn script(lines: &[&str]) -> ScriptedInput<Cursor<Vec<u8>>> {
    let mut text = lines.join("\n");
    text.push('\n');
    ScriptedInput(Cursor::new(text.into_bytes()))
}

fn account_document(uid: &str, username: &str) -> Value {
    json!({
        "name": format!("projects/guuber-test/databases/(default)/documents/users/{uid}"),
        "fields": {
            "firstName": { "stringValue": "Jo" },
            "lastName": { "stringValue": "Lee" },
            "username": { "stringValue": username },
            "email": { "stringValue": "jo@x.com" },
            "uid": { "stringValue": uid },
            "createdAt": { "timestampValue": "2025-03-05T12:00:00Z" }
        }
    })
}

async fn mount_empty_queries(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("{DOCS}:runQuery")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "readTime": "2025-03-05T12:00:00Z" }])),
        )
        .mount(server)
        .await;
}

async fn mount_sign_up(server: &MockServer, username: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signUp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "idToken": "tok-1",
            "localId": "uid-1",
            "email": "jo@x.com"
        })))
        .mount(server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("{DOCS}/users/uid-1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(account_document("uid-1", username)))
        .mount(server)
        .await;
}

async fn run_register(server: &MockServer, lines: &[&str]) -> (FormRun, String) {
    let mut form = RegistrationFormController::new(gateway(server));
    let mut input = script(lines);
    let mut output = Vec::new();

    let run = terminal::drive_form(&mut form, &mut input, &mut output)
        .await
        .expect("terminal I/O should not fail");

    (run, String::from_utf8(output).expect("utf-8 transcript"))
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn register_recovers_from_each_local_mistake() {
    let server = MockServer::start().await;
    mount_empty_queries(&server).await;
    mount_sign_up(&server, "jo_lee1").await;

    let (run, transcript) = run_register(
        &server,
        &[
            "Jo2", "Jo", "Lee", "jo_lee1", "jo@x.com", "Abcd1234", "Abcd123!", "Abcd124!",
            "Abcd123!",
        ],
    )
    .await;

    let FormRun::Completed(SubmissionOutcome::AccountCreated(record)) = run else {
        panic!("expected a created account, got {run:?}\n{transcript}");
    };
    assert_eq!(record.username, "jo_lee1");
    assert!(transcript.contains("Names can only contain letters"));
    assert!(transcript.contains("[ ] At least one special character"));
    assert!(transcript.contains("[x] At least 8 characters"));
    assert!(transcript.contains("Passwords do not match"));
    assert!(transcript.contains("Welcome, Jo! Your account @jo_lee1 is ready."));
}

#[tokio::test]
async fn taken_username_is_asked_again() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{DOCS}:runQuery")))
        .and(body_partial_json(json!({
            "structuredQuery": { "where": { "fieldFilter": {
                "value": { "stringValue": "alice" }
            }}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "document": account_document("uid-0", "alice")
        }])))
        .with_priority(1)
        .mount(&server)
        .await;
    mount_empty_queries(&server).await;
    mount_sign_up(&server, "alice2").await;

    let (run, transcript) = run_register(
        &server,
        &[
            "Jo", "Lee", "Alice", "jo@x.com", "Abcd123!", "Abcd123!", // rejected on submit
            "alice2", "jo@x.com", "Abcd123!", "Abcd123!",
        ],
    )
    .await;

    assert!(
        matches!(run, FormRun::Completed(SubmissionOutcome::AccountCreated(_))),
        "{transcript}"
    );
    assert!(transcript.contains("Username is already taken"));
    assert_eq!(transcript.matches("Username: ").count(), 2);
}

#[tokio::test]
async fn provider_rejection_offers_retry_and_quit() {
    let server = MockServer::start().await;
    mount_empty_queries(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signUp"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "EMAIL_EXISTS" }
        })))
        .expect(2)
        .mount(&server)
        .await;

    let (run, transcript) = run_register(
        &server,
        &[
            "Jo", "Lee", "jo_lee1", "jo@x.com", "Abcd123!", "Abcd123!", "", // retry
            "q",
        ],
    )
    .await;

    assert_eq!(run, FormRun::Abandoned);
    assert_eq!(transcript.matches("EMAIL_EXISTS").count(), 2);
}

#[tokio::test]
async fn failed_document_write_can_be_retried() {
    let server = MockServer::start().await;
    mount_empty_queries(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signUp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "idToken": "tok-1",
            "localId": "uid-1",
            "email": "jo@x.com"
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("{DOCS}/users/uid-1")))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": { "code": 503, "message": "The service is currently unavailable." }
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("{DOCS}/users/uid-1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(account_document("uid-1", "jo_lee1")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:delete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let (run, transcript) = run_register(
        &server,
        &[
            "Jo", "Lee", "jo_lee1", "jo@x.com", "Abcd123!", "Abcd123!", "", // retry
        ],
    )
    .await;

    assert!(
        matches!(run, FormRun::Completed(SubmissionOutcome::AccountCreated(_))),
        "{transcript}"
    );
    assert!(transcript.contains("The service is currently unavailable."));
    assert!(!transcript.contains("EMAIL_EXISTS"));
}

#[tokio::test]
async fn end_of_input_abandons_form() {
    let server = MockServer::start().await;
    let (run, transcript) = run_register(&server, &["Jo", "Lee"]).await;

    assert_eq!(run, FormRun::Abandoned);
    assert!(transcript.ends_with("Username: "));
}

// ============================================================================
// Google sign-in completion
// ============================================================================

#[tokio::test]
async fn google_sign_in_completes_registration() {
    use base64::prelude::*;

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithIdp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "idToken": "tok-g",
            "localId": "uid-g",
            "email": "jo@x.com"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{DOCS}/users/uid-g")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_empty_queries(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:update"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "idToken": "tok-g2" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{DOCS}:commit")))
        .and(body_partial_json(json!({
            "writes": [{ "update": { "fields": {
                "username": { "stringValue": "jo_lee" },
                "firstName": { "stringValue": "Jo" },
                "uid": { "stringValue": "uid-g" }
            }}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "writeResults": [{}] })))
        .expect(1)
        .mount(&server)
        .await;

    let claims = json!({ "email": "jo@x.com", "given_name": "Jo", "family_name": "Lee" });
    let id_token = format!(
        "{}.{}.sig",
        BASE64_URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#),
        BASE64_URL_SAFE_NO_PAD.encode(claims.to_string())
    );
    let provider = Arc::new(IdTokenProvider::new(id_token, None));
    let mut controller = AlternateSignInController::new(gateway(&server), provider);

    assert_eq!(
        controller.sign_in().await,
        SignInOutcome::NeedsRegistrationCompletion {
            first_name: "Jo".to_string(),
            last_name: "Lee".to_string(),
        }
    );

    let mut form = controller.completion_form().expect("completion pending");
    let mut input = script(&["ab", "Jo_Lee", "Abcd123!", "Abcd123!"]);
    let mut output = Vec::new();

    let run = terminal::drive_form_with(&mut form, &mut controller, &mut input, &mut output)
        .await
        .expect("terminal I/O should not fail");

    assert_eq!(
        run,
        FormRun::Completed(SubmissionOutcome::ProfileCompleted {
            username: "jo_lee".to_string()
        })
    );
    assert!(controller.is_signed_in());
    let transcript = String::from_utf8(output).unwrap();
    assert!(transcript.starts_with("Welcome Jo Lee!"));
    assert!(transcript.contains("Username must be 3-20 characters"));
    assert!(transcript.contains("All set, @jo_lee."));
}
