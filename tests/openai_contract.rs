#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Contract tests for the OpenAI-compatible completion client.

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use seren::completion::openai::OpenAiChatClient;
use seren::completion::{ChatCompletionClient, ChatRole, CompletionRequest, HistoryEntry};
use seren::config::ChatConfig;
use seren::error::CompanionError;

fn config_for(server: &MockServer) -> ChatConfig {
    ChatConfig {
        api_key: Some("sk-test".to_owned()),
        base_url: server.uri(),
        ..ChatConfig::default()
    }
}

fn request() -> CompletionRequest {
    CompletionRequest {
        system_prompt: Some("You are Hiyori.".to_owned()),
        history: vec![
            HistoryEntry {
                role: ChatRole::Assistant,
                text: "newest reply".to_owned(),
            },
            HistoryEntry {
                role: ChatRole::User,
                text: "older question".to_owned(),
            },
        ],
        user_message: "hello".to_owned(),
    }
}

#[tokio::test]
async fn success_parses_text_and_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_json(json!({
            "model": "gpt-3.5-turbo",
            "temperature": 1.0,
            "max_tokens": 1000,
            "messages": [
                {"role": "system", "content": "You are Hiyori."},
                {"role": "assistant", "content": "newest reply"},
                {"role": "user", "content": "older question"},
                {"role": "user", "content": "hello"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "御機嫌よう"}, "finish_reason": "stop"}
            ],
            "usage": {"prompt_tokens": 58, "completion_tokens": 21, "total_tokens": 79}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiChatClient::new(&config_for(&server)).expect("build client");
    let reply = client.complete(request()).await.expect("complete");

    assert_eq!(reply.text, "御機嫌よう");
    assert_eq!(reply.completion_tokens, Some(21));
    assert_eq!(reply.prompt_tokens, Some(58));
}

#[tokio::test]
async fn missing_usage_yields_none_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "hi"}, "finish_reason": "stop"}
            ]
        })))
        .mount(&server)
        .await;

    let client = OpenAiChatClient::new(&config_for(&server)).expect("build client");
    let reply = client.complete(request()).await.expect("complete");

    assert_eq!(reply.text, "hi");
    assert_eq!(reply.completion_tokens, None);
    assert_eq!(reply.prompt_tokens, None);
}

#[tokio::test]
async fn unauthorized_maps_to_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })))
        .mount(&server)
        .await;

    let client = OpenAiChatClient::new(&config_for(&server)).expect("build client");
    let err = client.complete(request()).await.expect_err("should fail");

    match err {
        CompanionError::Auth(message) => assert!(message.contains("Incorrect API key")),
        other => panic!("expected auth error, got {other:?}"),
    }
}

#[tokio::test]
async fn structured_error_body_maps_to_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "message": "This model's maximum context length is 4096 tokens",
                "type": "invalid_request_error",
                "code": "context_length_exceeded"
            }
        })))
        .mount(&server)
        .await;

    let client = OpenAiChatClient::new(&config_for(&server)).expect("build client");
    let err = client.complete(request()).await.expect_err("should fail");

    match err {
        CompanionError::Provider {
            message,
            kind,
            code,
        } => {
            assert!(message.contains("maximum context length"));
            assert_eq!(kind.as_deref(), Some("invalid_request_error"));
            assert_eq!(code.as_deref(), Some("context_length_exceeded"));
        }
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_endpoint_maps_to_transport_error() {
    let config = ChatConfig {
        api_key: Some("sk-test".to_owned()),
        base_url: "http://127.0.0.1:1".to_owned(),
        ..ChatConfig::default()
    };
    let client = OpenAiChatClient::new(&config).expect("build client");
    let err = client.complete(request()).await.expect_err("should fail");

    assert!(matches!(err, CompanionError::Transport(_)));
}
