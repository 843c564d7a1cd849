//! Signup, signin and password reset through the GraphQL API.

use serde_json::json;
use trackytronics_api::db::Store;
use trackytronics_api::services::session::Identity;
use trackytronics_core::Email;
use trackytronics_integration_tests::{TestApp, data, error_code};

const SIGNUP: &str = r"
    mutation($email: String!, $name: String!, $password: String!) {
        signup(email: $email, name: $name, password: $password) { id email permissions }
    }
";
const SIGNIN: &str = r"
    mutation($email: String!, $password: String!) {
        signin(email: $email, password: $password) { id }
    }
";
const RESET_PASSWORD: &str = r"
    mutation($token: String!, $password: String!, $confirm: String!) {
        resetPassword(resetToken: $token, password: $password, confirmPassword: $confirm) { email }
    }
";

async fn stored_reset_token(app: &TestApp, email: &str) -> String {
    app.store
        .user_by_email(&Email::parse(email).unwrap())
        .await
        .unwrap()
        .unwrap()
        .reset
        .unwrap()
        .token
}

// =============================================================================
// Signup / signin
// =============================================================================

#[tokio::test]
async fn test_signup_normalizes_email_and_grants_user() {
    let app = TestApp::new();

    let response = app
        .execute_with(
            Identity::anonymous(),
            SIGNUP,
            json!({ "email": "Ann@Example.COM", "name": "Ann", "password": "hunter2hunter2" }),
        )
        .await;

    let user = data(response)["signup"].clone();
    assert_eq!(user["email"], "ann@example.com");
    assert_eq!(user["permissions"], json!(["USER"]));
}

#[tokio::test]
async fn test_signup_conflict_is_case_insensitive() {
    let app = TestApp::new();
    app.user("a@x.com", &[]).await;

    let response = app
        .execute_with(
            Identity::anonymous(),
            SIGNUP,
            json!({ "email": "A@X.com", "name": "Other", "password": "hunter2hunter2" }),
        )
        .await;

    assert_eq!(error_code(&response).as_deref(), Some("CONFLICT"));
    assert_eq!(app.store.list_users().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_signin_failures_look_the_same() {
    let app = TestApp::new();
    app.user("a@x.com", &[]).await;

    let unknown = app
        .execute_with(
            Identity::anonymous(),
            SIGNIN,
            json!({ "email": "nobody@x.com", "password": "password123" }),
        )
        .await;
    let wrong = app
        .execute_with(
            Identity::anonymous(),
            SIGNIN,
            json!({ "email": "a@x.com", "password": "password124" }),
        )
        .await;

    assert_eq!(error_code(&unknown).as_deref(), Some("INVALID_CREDENTIALS"));
    assert_eq!(error_code(&wrong).as_deref(), Some("INVALID_CREDENTIALS"));
    assert_eq!(unknown.errors[0].message, wrong.errors[0].message);
}

#[tokio::test]
async fn test_signin_sets_session_cookie() {
    let app = TestApp::new();
    app.user("a@x.com", &[]).await;

    let response = app
        .execute_with(
            Identity::anonymous(),
            SIGNIN,
            json!({ "email": "a@x.com", "password": "password123" }),
        )
        .await;

    let cookie = response.http_headers.get("set-cookie").unwrap().to_str().unwrap();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_me_is_null_without_session() {
    let app = TestApp::new();

    let response = app.execute(Identity::anonymous(), "{ me { id } }").await;

    assert_eq!(data(response), json!({ "me": null }));
}

#[tokio::test]
async fn test_users_never_expose_secrets() {
    let app = TestApp::new();
    app.user("a@x.com", &[]).await;

    let response = app
        .execute(Identity::anonymous(), "{ users { password } }")
        .await;

    assert!(!response.errors.is_empty());
}

// =============================================================================
// Password reset
// =============================================================================

#[tokio::test]
async fn test_request_reset_mails_link() {
    let app = TestApp::new();
    app.user("a@x.com", &[]).await;

    let response = app
        .execute(Identity::anonymous(), r#"mutation { requestReset(email: "A@x.com") { message } }"#)
        .await;

    assert_eq!(data(response)["requestReset"]["message"], "Thanks!");
    let token = stored_reset_token(&app, "a@x.com").await;
    let sent = app.outbox.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Password Reset Request");
    assert!(
        sent[0]
            .html
            .contains(&format!("http://localhost:7777/reset?resetToken={token}"))
    );
}

#[tokio::test]
async fn test_request_reset_unknown_email() {
    let app = TestApp::new();

    let response = app
        .execute(Identity::anonymous(), r#"mutation { requestReset(email: "x@x.com") { message } }"#)
        .await;

    assert_eq!(error_code(&response).as_deref(), Some("NOT_FOUND"));
    assert!(app.outbox.sent().is_empty());
}

#[tokio::test]
async fn test_reset_token_is_single_use() {
    let app = TestApp::new();
    app.user("a@x.com", &[]).await;
    data(
        app.execute(Identity::anonymous(), r#"mutation { requestReset(email: "a@x.com") { message } }"#)
            .await,
    );
    let token = stored_reset_token(&app, "a@x.com").await;
    let vars = json!({ "token": token, "password": "brand new pass", "confirm": "brand new pass" });

    let first = app.execute_with(Identity::anonymous(), RESET_PASSWORD, vars.clone()).await;
    assert!(first.http_headers.get("set-cookie").is_some());
    assert_eq!(data(first)["resetPassword"]["email"], "a@x.com");

    let second = app.execute_with(Identity::anonymous(), RESET_PASSWORD, vars).await;
    assert_eq!(error_code(&second).as_deref(), Some("INVALID_OR_EXPIRED_TOKEN"));

    let signin = app
        .execute_with(
            Identity::anonymous(),
            SIGNIN,
            json!({ "email": "a@x.com", "password": "brand new pass" }),
        )
        .await;
    data(signin);
}

#[tokio::test]
async fn test_reset_mismatch_is_validation_error() {
    let app = TestApp::new();

    let response = app
        .execute_with(
            Identity::anonymous(),
            RESET_PASSWORD,
            json!({ "token": "whatever", "password": "aaaaaaaa", "confirm": "bbbbbbbb" }),
        )
        .await;

    assert_eq!(error_code(&response).as_deref(), Some("VALIDATION_ERROR"));
}

// =============================================================================
// Contact form
// =============================================================================

#[tokio::test]
async fn test_contact_request_goes_to_support_with_reply_to() {
    let app = TestApp::new();

    let response = app
        .execute(
            Identity::anonymous(),
            r#"mutation {
                contactUsRequest(email: "cust@x.com", message: "Where is my tracker?", phone: "555-0100") {
                    message
                }
            }"#,
        )
        .await;

    assert_eq!(
        data(response)["contactUsRequest"]["message"],
        "Your request has been sent! Our team will contact you shortly."
    );
    let sent = app.outbox.sent();
    assert_eq!(sent[0].to, "support@trackytronics.test");
    assert_eq!(sent[0].reply_to.as_deref(), Some("cust@x.com"));
    assert_eq!(sent[0].subject, "Customer Contacted");
    assert!(sent[0].text.contains("555-0100"));
}
