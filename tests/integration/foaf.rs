//! Integration tests for FOAF fetching

use super::*;
use vk_client::fixtures;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_fetch_person_windows_1251() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/foaf.php"))
        .and(query_param("id", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/xml; charset=windows-1251")
                .set_body_bytes(fixtures::foaf_person_xml()),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(config_for(&mock_server));
    let person = client
        .foaf()
        .with_base_url(format!("{}/foaf.php", mock_server.uri()))
        .fetch_person(1)
        .await
        .unwrap();

    assert_eq!(person.first_name.as_deref(), Some("Павел"));
    assert_eq!(
        person.location.and_then(|l| l.city).as_deref(),
        Some("Санкт-Петербург")
    );
}

#[tokio::test]
async fn test_fetch_group() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/foaf.php"))
        .and(query_param("id", "-1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(fixtures::foaf_group_xml()))
        .mount(&mock_server)
        .await;

    let client = client_for(config_for(&mock_server));
    let group = client
        .foaf()
        .with_base_url(format!("{}/foaf.php", mock_server.uri()))
        .fetch_group(1)
        .await
        .unwrap();

    assert_eq!(group.nick.as_deref(), Some("team"));
}

#[tokio::test]
async fn test_fetch_error_is_not_retried() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(config_for(&mock_server));
    let result = client
        .foaf()
        .fetch(&format!("{}/foaf.php?id=1", mock_server.uri()))
        .await;

    assert!(result.is_err());
}
