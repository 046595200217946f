//! Integration tests for the invocation engine

use super::*;
use serde_json::json;
use vk_client::errors::NetworkError;
use vk_client::fixtures;
use vk_client::{ErrorKind, ParameterBag, VkError};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_users_get_over_http() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/method/users.get"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("access_token=test-token"))
        .and(body_string_contains("user_ids=1%2C2"))
        .and(body_string_contains("v=5.199"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(fixtures::users_get_body(1, "Pavel", "Durov")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(config_for(&mock_server));
    let users = client
        .call("users.get", ParameterBag::new().with("user_ids", vec![1, 2]))
        .await
        .unwrap();

    assert_eq!(users[0]["last_name"], "Durov");
}

#[tokio::test]
async fn test_rate_limit_then_success_over_http() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/method/wall.get"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(fixtures::error_body(6, "Too many requests per second")),
        )
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/method/wall.get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": {"count": 0, "items": []}})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(config_for(&mock_server));
    let wall = client.call("wall.get", ParameterBag::new()).await.unwrap();

    assert_eq!(wall["count"], 0);
    assert_eq!(client.metrics().retries(), 2);
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(fixtures::success_body("1")))
        .mount(&mock_server)
        .await;

    let client = client_for(config_for(&mock_server));
    let result = client.call("account.getInfo", ParameterBag::new()).await.unwrap();

    assert_eq!(result, json!(1));
}

#[tokio::test]
async fn test_remote_error_surfaces_verbatim() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(fixtures::error_body(15, "Access denied: user hid his wall")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(config_for(&mock_server));
    let err = client.call("wall.get", ParameterBag::new()).await.unwrap_err();

    let remote = err.remote().unwrap();
    assert_eq!(remote.kind, ErrorKind::AccessDenied);
    assert_eq!(remote.code, 15);
    assert_eq!(remote.message, "Access denied: user hid his wall");
    assert!(remote
        .request_params
        .contains(&("method".to_string(), "users.get".to_string())));
}

#[tokio::test]
async fn test_captcha_without_handler_over_http() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(fixtures::captcha_body(
            "https://api.vk.com/captcha.php?sid=123",
            "123",
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(config_for(&mock_server));
    let err = client.call("wall.post", ParameterBag::new()).await.unwrap_err();

    let captcha = err.remote().and_then(|r| r.captcha.clone()).unwrap();
    assert_eq!(captcha.session_id, "123");
    assert_eq!(captcha.image_url, "https://api.vk.com/captcha.php?sid=123");
}

#[tokio::test]
async fn test_transport_timeout_is_a_network_error() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(fixtures::success_body("1"))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(
        config_for(&mock_server)
            .timeout(Duration::from_millis(50))
            .max_network_retries(0),
    );
    let err = client.call("users.get", ParameterBag::new()).await.unwrap_err();

    assert!(matches!(err, VkError::Network(NetworkError::Timeout)));
}

#[tokio::test]
async fn test_call_deadline_over_http() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(fixtures::success_body("1"))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(config_for(&mock_server));
    let err = client
        .call_with_deadline("users.get", ParameterBag::new(), Duration::from_millis(30))
        .await
        .unwrap_err();

    assert!(matches!(err, VkError::Timeout { .. }));
}

#[tokio::test]
async fn test_malformed_body_is_a_decode_error() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>bad gateway</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(config_for(&mock_server));
    let err = client.call("users.get", ParameterBag::new()).await.unwrap_err();

    assert!(matches!(err, VkError::Decode(_)));
}
