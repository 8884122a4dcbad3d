use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;

use httpmock::prelude::*;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use swaggerhub_upload::api::{self, CLIENT_ID};
use swaggerhub_upload::task::{self, Completion};
use swaggerhub_upload::{
    ClientConfig, DefinitionFormat, Protocol, UploadClient, UploadError, UploadOutcome,
    UploadRequest, UploadSettings,
};

const DEFINITION: &str =
    r#"{"openapi":"3.0.0","info":{"title":"Orders","version":"1.0.0"},"paths":{}}"#;

fn settings_for(server: &MockServer, input_file: &Path, skip_on_error: bool) -> UploadSettings {
    UploadSettings {
        owner: "acme".into(),
        api: "orders".into(),
        version: "1.0.0".into(),
        token: "secret-token".into(),
        input_file: input_file.to_path_buf(),
        skip_on_error,
        host: server.host(),
        port: server.port(),
        protocol: Protocol::Http,
        ..UploadSettings::default()
    }
}

fn write_definition(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("openapi.json");
    std::fs::write(&path, DEFINITION).unwrap();
    path
}

fn request() -> UploadRequest {
    UploadRequest {
        api: "orders".into(),
        owner: "acme".into(),
        version: "1.0.0".into(),
        content: DEFINITION.into(),
        private: true,
    }
}

#[test]
fn created_response_completes_upload() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/apis/acme/orders");
        then.status(201).body("created");
    });

    let dir = TempDir::new().unwrap();
    let input = write_definition(&dir);
    let http = api::http_client().unwrap();

    let completion = task::run(&http, &settings_for(&server, &input, false)).unwrap();
    assert_eq!(completion, Completion::Uploaded);
    mock.assert();
}

#[test]
fn request_carries_query_headers_and_raw_body() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/apis/acme/orders")
            .query_param("version", "1.0.0")
            .query_param("isPrivate", "false")
            .header("content-type", "application/json")
            .header("authorization", "secret-token")
            .header("user-agent", CLIENT_ID)
            .body(DEFINITION);
        then.status(200);
    });

    let dir = TempDir::new().unwrap();
    let input = write_definition(&dir);
    let mut settings = settings_for(&server, &input, false);
    settings.private = false;
    let http = api::http_client().unwrap();

    assert_eq!(task::run(&http, &settings).unwrap(), Completion::Uploaded);
    mock.assert();
}

#[test]
fn yaml_format_sets_yaml_content_type() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/apis/acme/orders")
            .header("content-type", "application/yaml");
        then.status(201);
    });

    let config = ClientConfig {
        host: server.host(),
        port: server.port(),
        protocol: Protocol::Http,
        auth_token: "secret-token".into(),
        format: DefinitionFormat::Yaml,
        timeout: None,
    };
    let http = api::http_client().unwrap();
    let outcome = UploadClient::new(&http, &config).upload(&request());

    assert!(outcome.is_success(), "{:?}", outcome.reason());
    mock.assert();
}

#[test]
fn success_status_wins_over_error_looking_body() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/apis/acme/orders");
        then.status(200).body(r#"{"code":500,"message":"not really"}"#);
    });

    let config = ClientConfig {
        host: server.host(),
        port: server.port(),
        protocol: Protocol::Http,
        ..ClientConfig::default()
    };
    let http = api::http_client().unwrap();
    let outcome = UploadClient::new(&http, &config).upload(&request());
    assert!(outcome.is_success());
}

#[test]
fn unauthorized_without_skip_is_fatal() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/apis/acme/orders");
        then.status(401).body("Invalid API key");
    });

    let dir = TempDir::new().unwrap();
    let input = write_definition(&dir);
    let http = api::http_client().unwrap();

    let err = task::run(&http, &settings_for(&server, &input, false)).unwrap_err();
    assert!(matches!(err, UploadError::Rejected { status: 401, .. }), "{err:?}");
    let message = err.to_string();
    assert!(message.contains("401"), "{message}");
    assert!(message.contains("Invalid API key"), "{message}");
}

#[test]
fn rejection_is_recoverable_failure() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/apis/acme/orders");
        then.status(409);
    });

    let config = ClientConfig {
        host: server.host(),
        port: server.port(),
        protocol: Protocol::Http,
        ..ClientConfig::default()
    };
    let http = api::http_client().unwrap();
    match UploadClient::new(&http, &config).upload(&request()) {
        UploadOutcome::Failure { error, recoverable } => {
            assert!(recoverable);
            assert_eq!(error.to_string(), "failed to upload definition: HTTP 409: Conflict");
        }
        UploadOutcome::Success => panic!("409 must not be a success"),
    }
}

#[test]
fn server_error_with_skip_completes() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/apis/acme/orders");
        then.status(500).body("registry exploded");
    });

    let dir = TempDir::new().unwrap();
    let input = write_definition(&dir);
    let http = api::http_client().unwrap();
    let config = settings_for(&server, &input, true);

    let request = config.upload_request(DEFINITION.into());
    let completion = task::upload(&http, &config.client_config(), &request, true).unwrap();
    match completion {
        Completion::Skipped { reason } => {
            assert!(reason.contains("registry exploded"), "{reason}")
        }
        Completion::Uploaded => panic!("500 must not be reported as uploaded"),
    }
    mock.assert_calls(1);
}

#[test]
fn missing_file_with_skip_completes_without_request() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST);
        then.status(201);
    });

    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.json");
    let http = api::http_client().unwrap();

    let completion = task::run(&http, &settings_for(&server, &missing, true)).unwrap();
    match completion {
        Completion::Skipped { reason } => assert!(reason.contains("missing.json"), "{reason}"),
        Completion::Uploaded => panic!("nothing was uploaded"),
    }
    mock.assert_calls(0);
}

#[test]
fn missing_file_without_skip_names_the_path() {
    let server = MockServer::start();
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.json");
    let http = api::http_client().unwrap();

    let err = task::run(&http, &settings_for(&server, &missing, false)).unwrap_err();
    assert!(matches!(err, UploadError::LocalFile { .. }), "{err:?}");
    assert!(err.to_string().contains(&missing.display().to_string()));
}

#[test]
fn refused_connection_is_transport_failure() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = ClientConfig {
        host: "127.0.0.1".into(),
        port,
        protocol: Protocol::Http,
        ..ClientConfig::default()
    };
    let http = api::http_client().unwrap();

    match UploadClient::new(&http, &config).upload(&request()) {
        UploadOutcome::Failure { error, recoverable } => {
            assert!(recoverable);
            assert!(matches!(error, UploadError::Transport(_)), "{error:?}");
        }
        UploadOutcome::Success => panic!("nothing is listening"),
    }
}

#[test]
fn slow_registry_times_out_as_transport_failure() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/apis/acme/orders");
        then.status(201).delay(Duration::from_secs(3));
    });

    let config = ClientConfig {
        host: server.host(),
        port: server.port(),
        protocol: Protocol::Http,
        timeout: Some(Duration::from_millis(200)),
        ..ClientConfig::default()
    };
    let http = api::http_client().unwrap();

    match UploadClient::new(&http, &config).upload(&request()) {
        UploadOutcome::Failure { error, recoverable } => {
            assert!(recoverable);
            match error {
                UploadError::Transport(source) => assert!(source.is_timeout(), "{source:?}"),
                other => panic!("expected a transport failure, got {other:?}"),
            }
        }
        UploadOutcome::Success => panic!("the request should have timed out"),
    }

    let completion = task::upload(&http, &config, &request(), true).unwrap();
    assert!(matches!(completion, Completion::Skipped { .. }), "{completion:?}");
}

#[test]
fn marker_written_when_failure_is_skipped() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST);
        then.status(503);
    });

    let dir = TempDir::new().unwrap();
    let input = write_definition(&dir);
    let marker = dir.path().join("target/tmp/swaggerhub/uploadPlugin");
    let mut settings = settings_for(&server, &input, true);
    settings.marker_file = Some(marker.clone());
    let http = api::http_client().unwrap();

    task::run(&http, &settings).unwrap();
    assert!(marker.exists());
}

#[test]
fn marker_not_written_when_run_aborts() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST);
        then.status(503);
    });

    let dir = TempDir::new().unwrap();
    let input = write_definition(&dir);
    let marker = dir.path().join("target/tmp/swaggerhub/uploadPlugin");
    let mut settings = settings_for(&server, &input, false);
    settings.marker_file = Some(marker.clone());
    let http = api::http_client().unwrap();

    assert!(task::run(&http, &settings).is_err());
    assert!(!marker.exists());
}
