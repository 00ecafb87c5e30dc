#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Contract tests for the HTTP translation client.

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use seren::config::TranslationConfig;
use seren::error::CompanionError;
use seren::translate::TranslationClient;
use seren::translate::http::HttpTranslationClient;

fn config_for(server: &MockServer) -> TranslationConfig {
    TranslationConfig {
        enabled: true,
        base_url: server.uri(),
        api_key: None,
        source_lang: "auto".to_owned(),
        target_lang: "ja".to_owned(),
    }
}

#[tokio::test]
async fn success_returns_translated_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/translate"))
        .and(body_partial_json(json!({
            "q": "good morning",
            "source": "auto",
            "target": "ja",
            "format": "text"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "translatedText": "おはよう"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpTranslationClient::new(&config_for(&server)).expect("build client");
    let translated = client.translate("good morning").await.expect("translate");
    assert_eq!(translated, "おはよう");
}

#[tokio::test]
async fn api_key_is_sent_when_configured() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/translate"))
        .and(body_partial_json(json!({"api_key": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "translatedText": "ok"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = TranslationConfig {
        api_key: Some("secret".to_owned()),
        ..config_for(&server)
    };
    let client = HttpTranslationClient::new(&config).expect("build client");
    client.translate("anything").await.expect("translate");
}

#[tokio::test]
async fn forbidden_maps_to_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/translate"))
        .respond_with(ResponseTemplate::new(403).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let client = HttpTranslationClient::new(&config_for(&server)).expect("build client");
    let err = client.translate("text").await.expect_err("should fail");
    assert!(matches!(err, CompanionError::Auth(_)));
}

#[tokio::test]
async fn server_error_maps_to_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/translate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("engine crashed"))
        .mount(&server)
        .await;

    let client = HttpTranslationClient::new(&config_for(&server)).expect("build client");
    let err = client.translate("text").await.expect_err("should fail");

    match err {
        CompanionError::Provider { message, code, .. } => {
            assert!(message.contains("engine crashed"));
            assert_eq!(code.as_deref(), Some("500"));
        }
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_endpoint_maps_to_transport_error() {
    let config = TranslationConfig {
        enabled: true,
        base_url: "http://127.0.0.1:1".to_owned(),
        api_key: None,
        source_lang: "auto".to_owned(),
        target_lang: "ja".to_owned(),
    };
    let client = HttpTranslationClient::new(&config).expect("build client");
    let err = client.translate("text").await.expect_err("should fail");
    assert!(matches!(err, CompanionError::Transport(_)));
}
