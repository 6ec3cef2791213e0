//! HTTP transport tests against a mock update server.

use std::time::Duration;

use updatectl_common::{MachineId, SessionId};
use updatectl_omaha::{
    encode_response, AppRequest, Event, HttpTransport, InstallSource, ProtocolError, Request,
    Response, Transport, UpdateStatus,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn check_request() -> Request {
    let app = AppRequest::new(
        "e96281a6-d1af-4bde-9a0a-97b76e56dc57",
        "0.0.0",
        "alpha",
        "fakeclient",
        &MachineId::new("deadbeef0123456789abcdef01234567"),
        &SessionId::new(),
    )
    .with_update_check()
    .with_event(Event::COMPLETED);

    Request::new(InstallSource::Scheduler, app)
}

async fn transport_for(server: &MockServer) -> HttpTransport {
    HttpTransport::new(&server.uri(), Duration::from_secs(5), true).unwrap()
}

#[tokio::test]
async fn test_posts_xml_to_update_endpoint() {
    let server = MockServer::start().await;
    let body = encode_response(&Response::update_available(
        "e96281a6-d1af-4bde-9a0a-97b76e56dc57",
        "9.9.9",
        "update.gz",
    ))
    .unwrap();

    Mock::given(method("POST"))
        .and(path("/v1/update/"))
        .and(header("content-type", "text/xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport_for(&server).await;
    let response = transport.send(&check_request()).await.unwrap();

    let uc = response.update_check().unwrap();
    assert_eq!(uc.status(), UpdateStatus::Ok);
    assert_eq!(uc.manifest_version(), Some("9.9.9"));

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let sent = String::from_utf8(received[0].body.clone()).unwrap();
    assert!(sent.contains("machineid=\"deadbeef0123456789abcdef01234567\""));
    assert!(sent.contains("<updatecheck"));
    assert!(sent.contains("eventtype=\"3\""));
    assert!(sent.contains("eventresult=\"2\""));
}

#[tokio::test]
async fn test_non_success_status_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/update/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let transport = transport_for(&server).await;
    let err = transport.send(&check_request()).await.unwrap_err();

    match err {
        ProtocolError::UnexpectedStatus { status, url } => {
            assert_eq!(status, 503);
            assert!(url.ends_with("/v1/update/"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/update/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<response><app></response>"))
        .mount(&server)
        .await;

    let transport = transport_for(&server).await;
    let err = transport.send(&check_request()).await.unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidMessage(_)));
}

#[tokio::test]
async fn test_error_status_with_body_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/update/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .expect(1)
        .mount(&server)
        .await;

    // Verbose transport reads the error body before failing
    let transport = transport_for(&server).await;
    let err = transport.send(&check_request()).await.unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::UnexpectedStatus { status: 500, .. }
    ));
}

#[tokio::test]
async fn test_unreachable_server_is_connection_failure() {
    // Reserve a free port, then close it so nothing is listening
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport =
        HttpTransport::new(&format!("http://{addr}"), Duration::from_secs(2), true).unwrap();
    let err = transport.send(&check_request()).await.unwrap_err();
    assert!(matches!(err, ProtocolError::ConnectionFailed(_)));
}
