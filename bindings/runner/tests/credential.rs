use std::collections::HashMap;
use std::sync::Arc;

use http_gust_runner::prelude::{
    issue_credential, CredentialSource, HttpClient, Reporter, RunConfig, ScenarioDefaults,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{any, body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const AUTH: ScenarioDefaults = ScenarioDefaults {
    service_name: "auth-service",
    use_login_token: true,
    test_id_label: Some("auth"),
};

fn config(server: &MockServer, extra: &[(&str, &str)]) -> RunConfig {
    let mut env = HashMap::from([("AUTH_BASE_URL".to_string(), server.uri())]);
    env.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    RunConfig::from_lookup(&env, &AUTH)
}

fn client() -> HttpClient {
    HttpClient::new(Arc::new(Reporter::noop())).unwrap()
}

fn credentials() -> serde_json::Value {
    json!({"email": "perftest@example.com", "password": "Passw0rd!"})
}

#[tokio::test]
async fn override_token_skips_login() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = config(&server, &[("JWT_OVERRIDE", "fixed-token")]);
    let issued = issue_credential(&client(), &config.identity).await.unwrap();

    assert_eq!("fixed-token", issued.credential.token);
    assert_eq!(CredentialSource::Override, issued.credential.source);
    assert_eq!(0, issued.login_status);
}

#[tokio::test]
async fn login_token_is_used() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .and(body_json(credentials()))
        .respond_with(ResponseTemplate::new(409).set_body_string("already registered"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(credentials()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "live-token", "token_type": "bearer"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = config(&server, &[]);
    let issued = issue_credential(&client(), &config.identity).await.unwrap();

    assert_eq!("live-token", issued.credential.token);
    assert_eq!(CredentialSource::Login, issued.credential.source);
    assert_eq!(200, issued.login_status);
    assert_eq!("Bearer live-token", issued.credential.authorization());
}

#[tokio::test]
async fn rejected_login_falls_back_to_signing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid credentials"))
        .expect(3)
        .mount(&server)
        .await;

    let config = config(&server, &[]);
    let issued = issue_credential(&client(), &config.identity).await.unwrap();

    assert_eq!(CredentialSource::Signed, issued.credential.source);
    assert_eq!(401, issued.login_status);
    assert_eq!(3, issued.credential.token.split('.').count());
}

#[tokio::test]
async fn login_without_token_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"detail": "ok"})))
        .expect(3)
        .mount(&server)
        .await;

    let config = config(&server, &[]);
    let issued = issue_credential(&client(), &config.identity).await.unwrap();

    assert_eq!(CredentialSource::Signed, issued.credential.source);
    assert_eq!(200, issued.login_status);
}

#[tokio::test]
async fn login_disabled_signs_locally() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = config(&server, &[("USE_LOGIN_TOKEN_FOR_API", "false")]);
    let issued = issue_credential(&client(), &config.identity).await.unwrap();

    assert_eq!(CredentialSource::Signed, issued.credential.source);
    assert_eq!(0, issued.login_status);
    assert_eq!(
        Some(issued.credential.issued_at + 900),
        issued.credential.expires_at
    );
}
