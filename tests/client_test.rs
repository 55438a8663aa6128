//! Client behavior against a mock directory service
//!
//! Covers the wire encoding, the per-session memoization, and the
//! fail-fast breaker that keeps a down directory from stalling a whole
//! catalog compilation.

use std::time::Duration;

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use relnodes::service::{ClientConfig, DirectoryClient, QuerySession};

fn yaml_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "application/x-yaml")
}

fn client_for(server: &MockServer) -> DirectoryClient {
    DirectoryClient::new(&ClientConfig::new(server.uri()).with_timeout(Duration::from_secs(2)))
        .unwrap()
}

#[tokio::test]
async fn hosts_query_decodes_the_yaml_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("resource", "Package[nginx]"))
        .respond_with(yaml_response("- a\n- b\n"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let hosts = client.hosts("Package[nginx]").await.unwrap();
    assert_eq!(hosts, vec!["a".to_string(), "b".to_string()]);
}

#[tokio::test]
async fn parameters_query_sends_the_flag_and_decodes_the_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("resource", "Package[nginx]"))
        .and(query_param("parameters", "1"))
        .respond_with(yaml_response("nginx:\n  ensure: latest\n"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mapping = client.parameters("Package[nginx]").await.unwrap();
    assert_eq!(mapping.len(), 1);
    assert_eq!(
        mapping["nginx"]["ensure"],
        serde_yaml_ng::Value::String("latest".to_string())
    );
}

#[tokio::test]
async fn push_and_remove_expect_no_content() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/web01"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/web01"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client
        .put_catalog("web01", b"resources: []\n".to_vec())
        .await
        .unwrap();
    client.delete_catalog("web01").await.unwrap();
}

#[tokio::test]
async fn unexpected_status_is_reported_with_the_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/ghost"))
        .respond_with(
            ResponseTemplate::new(404).set_body_string("error: no catalog stored for host\n"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.delete_catalog("ghost").await.unwrap_err();
    assert!(!err.is_connection());
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn session_memoizes_repeated_questions() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("resource", "File[/etc/motd]"))
        .respond_with(yaml_response("- a\n"))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = QuerySession::new(client_for(&server));
    assert_eq!(session.hosts("File[/etc/motd]").await, vec!["a".to_string()]);
    assert_eq!(session.hosts("File[/etc/motd]").await, vec!["a".to_string()]);
    // mock expectation of one request is verified when the server drops
}

#[tokio::test]
async fn memoization_keys_include_the_parameters_flag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("resource", "Package[vim]"))
        .and(query_param("parameters", "1"))
        .respond_with(yaml_response("vim: {}\n"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("resource", "Package[vim]"))
        .respond_with(yaml_response("- a\n"))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = QuerySession::new(client_for(&server));
    // same resource string, different question, both answered and cached
    assert_eq!(session.hosts("Package[vim]").await, vec!["a".to_string()]);
    assert_eq!(session.parameters("Package[vim]").await.len(), 1);
    assert_eq!(session.hosts("Package[vim]").await, vec!["a".to_string()]);
    assert_eq!(session.parameters("Package[vim]").await.len(), 1);
}

#[tokio::test]
async fn connection_failure_degrades_the_session() {
    // nothing listens on port 1
    let client = DirectoryClient::new(
        &ClientConfig::new("http://127.0.0.1:1").with_timeout(Duration::from_millis(500)),
    )
    .unwrap();
    let mut session = QuerySession::new(client);

    assert!(session.hosts("Package[nginx]").await.is_empty());
    assert!(session.is_degraded());

    // every later question short-circuits to the safe default
    assert!(session.parameters("Package[nginx]").await.is_empty());
    assert!(session.hosts("File[/etc/motd]").await.is_empty());
}

#[tokio::test]
async fn http_errors_do_not_trip_the_breaker() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(400).set_body_string("error: invalid resource query\n"))
        .expect(2)
        .mount(&server)
        .await;

    let mut session = QuerySession::new(client_for(&server));
    assert!(session.hosts("Package[nginx]").await.is_empty());
    assert!(!session.is_degraded());
    // failures are not cached, the next call asks again
    assert!(session.hosts("Package[nginx]").await.is_empty());
}

#[tokio::test]
async fn undecodable_answer_degrades_to_the_safe_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(yaml_response("{ this is: [ not a list"))
        .mount(&server)
        .await;

    let mut session = QuerySession::new(client_for(&server));
    assert!(session.hosts("Package[nginx]").await.is_empty());
    assert!(!session.is_degraded());
}
