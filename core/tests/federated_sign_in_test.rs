//! Tests for federated sign-in and registration completion.

mod common;

use std::sync::Arc;

use common::{existing_account, Call, MockGateway, MockProvider};
use guuber_core::{
    AlternateSignInController, FormField, RegistrationError, SessionState, SignInOutcome,
    SubmissionOutcome, ValidationRule,
};

fn controller(
    gateway: Arc<MockGateway>,
    provider: Arc<MockProvider>,
) -> AlternateSignInController {
    AlternateSignInController::new(gateway, provider)
}

async fn awaiting_completion(gateway: Arc<MockGateway>) -> AlternateSignInController {
    let provider = Arc::new(MockProvider::returning("Jo", "Lee", "jo@x.com"));
    let mut controller = controller(gateway, provider);
    let outcome = controller.sign_in().await;
    assert!(matches!(
        outcome,
        SignInOutcome::NeedsRegistrationCompletion { .. }
    ));
    controller
}

// ============================================================================
// sign_in
// ============================================================================

#[tokio::test]
async fn existing_identity_signs_in() {
    let gateway = Arc::new(MockGateway::new().with_federated_account(existing_account("jo_lee")));
    let provider = Arc::new(MockProvider::returning("Jo", "Lee", "jo@x.com"));
    let mut controller = controller(gateway.clone(), provider);

    let outcome = controller.sign_in().await;

    assert_eq!(outcome, SignInOutcome::SignedIn(existing_account("jo_lee")));
    assert!(controller.is_signed_in());
    assert_eq!(
        gateway.calls(),
        vec![Call::SignInWithCredential("jo@x.com".to_string())]
    );
}

#[tokio::test]
async fn new_identity_needs_completion_with_provider_names() {
    let provider = Arc::new(MockProvider::returning("Jo", "Lee", "jo@x.com"));
    let mut controller = controller(Arc::new(MockGateway::new()), provider);

    let outcome = controller.sign_in().await;

    assert_eq!(
        outcome,
        SignInOutcome::NeedsRegistrationCompletion {
            first_name: "Jo".to_string(),
            last_name: "Lee".to_string(),
        }
    );
    assert_eq!(
        *controller.state(),
        SessionState::AwaitingCompletion {
            first_name: "Jo".to_string(),
            last_name: "Lee".to_string(),
        }
    );
}

#[tokio::test]
async fn provider_failure_never_reaches_gateway() {
    let gateway = Arc::new(MockGateway::new());
    let provider = Arc::new(MockProvider::failing("No ID token found"));
    let mut controller = controller(gateway.clone(), provider);

    assert_eq!(
        controller.sign_in().await,
        SignInOutcome::Failed("No ID token found".to_string())
    );
    assert!(gateway.calls().is_empty());
    assert_eq!(*controller.state(), SessionState::SignedOut);
}

// ============================================================================
// complete_registration
// ============================================================================

#[tokio::test]
async fn short_username_is_rejected_without_gateway_call() {
    let gateway = Arc::new(MockGateway::new());
    let mut controller = awaiting_completion(gateway.clone()).await;

    let err = controller
        .complete_registration("ab", "Abcd123!")
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RegistrationError::validation(FormField::Username, ValidationRule::CompletionUsername)
    );
    assert_eq!(gateway.calls().len(), 1);
}

#[tokio::test]
async fn completion_updates_profile_with_lowercase_username() {
    let gateway = Arc::new(MockGateway::new());
    let mut controller = awaiting_completion(gateway.clone()).await;

    controller
        .complete_registration("Jo_Lee", "Abcd123!")
        .await
        .unwrap();

    assert!(controller.is_signed_in());
    assert_eq!(
        gateway.calls()[1..].to_vec(),
        vec![
            Call::CheckUsername("jo_lee".to_string()),
            Call::UpdateProfile {
                username: "jo_lee".to_string(),
                first_name: "Jo".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn taken_username_keeps_completion_pending() {
    let gateway = Arc::new(MockGateway::new().with_taken_username("jo_lee"));
    let mut controller = awaiting_completion(gateway.clone()).await;

    assert_eq!(
        controller.complete_registration("JO_LEE", "Abcd123!").await,
        Err(RegistrationError::UsernameTaken)
    );
    assert!(matches!(
        controller.state(),
        SessionState::AwaitingCompletion { .. }
    ));
}

#[tokio::test]
async fn profile_update_failure_is_verbatim() {
    let gateway = Arc::new(MockGateway::new().failing_with("PERMISSION_DENIED"));
    let mut controller = awaiting_completion(gateway).await;

    let err = controller
        .complete_registration("jo_lee", "Abcd123!")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "PERMISSION_DENIED");
}

#[tokio::test]
async fn completion_without_pending_sign_in_is_rejected() {
    let gateway = Arc::new(MockGateway::new());
    let provider = Arc::new(MockProvider::returning("Jo", "Lee", "jo@x.com"));
    let mut controller = controller(gateway.clone(), provider);

    assert_eq!(
        controller.complete_registration("jo_lee", "Abcd123!").await,
        Err(RegistrationError::NotAwaitingCompletion)
    );
    assert!(gateway.calls().is_empty());
}

// ============================================================================
// completion form
// ============================================================================

#[tokio::test]
async fn completion_form_flow_signs_in() {
    let gateway = Arc::new(MockGateway::new());
    let mut controller = awaiting_completion(gateway.clone()).await;
    let mut form = controller.completion_form().unwrap();

    for (field, value) in [
        (FormField::Username, "jo_lee"),
        (FormField::Password, "Abcd123!"),
        (FormField::ConfirmPassword, "Abcd123!"),
    ] {
        form.on_field_changed(field, value);
        form.commit(field).unwrap();
    }
    assert!(form.is_ready());

    let outcome = controller.submit_completion_form(&mut form).await.unwrap();

    assert_eq!(
        outcome,
        SubmissionOutcome::ProfileCompleted {
            username: "jo_lee".to_string()
        }
    );
    assert!(controller.is_signed_in());
    assert!(gateway.calls().contains(&Call::UpdateProfile {
        username: "jo_lee".to_string(),
        first_name: "Jo".to_string(),
    }));
}

// ============================================================================
// sign_out
// ============================================================================

#[tokio::test]
async fn sign_out_is_idempotent() {
    let gateway = Arc::new(MockGateway::new().with_federated_account(existing_account("jo_lee")));
    let provider = Arc::new(MockProvider::returning("Jo", "Lee", "jo@x.com"));
    let mut controller = controller(gateway.clone(), provider.clone());
    controller.sign_in().await;

    controller.sign_out().await.unwrap();
    controller.sign_out().await.unwrap();

    assert_eq!(*controller.state(), SessionState::SignedOut);
    assert_eq!(provider.sign_outs(), 2);
    assert_eq!(
        gateway
            .calls()
            .iter()
            .filter(|call| **call == Call::SignOut)
            .count(),
        2
    );
}
