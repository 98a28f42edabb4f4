//! Flow and SMS clients behind their fakes

use healers_common::config::{ConfigError, SmsConfig, ENV_TWILIO_ACCOUNT_SID};
use healers_common::config::FlowConfig;
use healers_common::error::{
    HealersError, EXIT_CONFIG, EXIT_INVALID_RESPONSE, EXIT_REMOTE_UNAVAILABLE, EXIT_VALIDATION,
};
use healers_common::flow_client::{AiFlowClient, FakeFlowRunner, FlowError, FlowRunner, HttpFlowRunner};
use healers_common::flows::{ResourceCounts, FIRST_AID_FLOW, RESOURCE_ALLOCATION_FLOW};
use healers_common::sms::{NotificationClient, NotifyError, RecordingTransport, SmsOutcome};
use healers_common::ErrorKind;
use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn sms_config() -> SmsConfig {
    SmsConfig {
        account_sid: Some("AC0123456789abcdef".to_string()),
        auth_token: Some("secret".to_string()),
        from_number: Some("+15005550006".to_string()),
        ..SmsConfig::default()
    }
}

#[tokio::test]
async fn test_prediction_passes_counts_and_returns_output_unchanged() {
    let runner = Arc::new(FakeFlowRunner::always_valid(json!({
        "predictedAmbulanceNeed": 2,
        "predictedDroneNeed": 3.5,
        "predictedDoctorNeed": 1,
        "justification": "Two vehicles, one trapped occupant."
    })));
    let client = AiFlowClient::new(runner.clone());

    let output = client
        .predict_resource_allocation(
            "Two-car collision on NH48 at 14:00, one occupant trapped",
            ResourceCounts::default(),
        )
        .await
        .unwrap();

    assert_eq!(output.predicted_ambulance_need, 2.0);
    assert_eq!(output.predicted_drone_need, 3.5);
    assert_eq!(output.predicted_doctor_need, 1.0);
    assert_eq!(output.justification, "Two vehicles, one trapped occupant.");

    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, RESOURCE_ALLOCATION_FLOW);
    assert_eq!(calls[0].1["availableAmbulances"], 5);
    assert_eq!(calls[0].1["availableDrones"], 10);
    assert_eq!(calls[0].1["availableDoctors"], 8);
}

#[tokio::test]
async fn test_malformed_prediction_is_invalid_response() {
    let client = AiFlowClient::new(Arc::new(FakeFlowRunner::always_valid(json!({
        "predictedAmbulanceNeed": "two"
    }))));

    let err = client
        .predict_resource_allocation("Bus overturned near toll plaza", ResourceCounts::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Schema(_)));
    assert_eq!(HealersError::from(err).exit_code(), EXIT_INVALID_RESPONSE);
}

#[tokio::test]
async fn test_first_aid_sends_situation_once() {
    let runner = Arc::new(FakeFlowRunner::always_valid(json!({
        "firstAidInstructions": "Keep the airway clear."
    })));
    let client = AiFlowClient::new(runner.clone());

    let text = client
        .get_first_aid_instructions("Pedestrian hit, not breathing well")
        .await
        .unwrap();
    assert_eq!(text, "Keep the airway clear.");
    assert_eq!(runner.calls()[0].0, FIRST_AID_FLOW);
    assert_eq!(
        runner.calls()[0].1,
        json!({ "situationDescription": "Pedestrian hit, not breathing well" })
    );
}

#[tokio::test]
async fn test_sms_bad_recipient_never_reaches_provider() {
    let client = NotificationClient::new(&sms_config(), RecordingTransport::accepting("SM1"));

    let err = client.send_sms("123", "Help is on the way").await.unwrap_err();
    assert_eq!(err, NotifyError::InvalidRecipient("123".to_string()));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(HealersError::from(err).exit_code(), EXIT_VALIDATION);
    assert_eq!(client.transport().attempts(), 0);
}

#[tokio::test]
async fn test_sms_missing_credentials_is_configuration_error() {
    let client = NotificationClient::new(&SmsConfig::default(), RecordingTransport::accepting("SM1"));

    let err = client
        .send_sms("+919876543210", "Help is on the way")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        NotifyError::Configuration(ConfigError::MissingCredential(ENV_TWILIO_ACCOUNT_SID))
    );
    assert_eq!(HealersError::from(err).exit_code(), EXIT_CONFIG);
    assert_eq!(client.transport().attempts(), 0);
}

#[tokio::test]
async fn test_sms_success_reports_provider_id() {
    let client = NotificationClient::new(&sms_config(), RecordingTransport::accepting("SM42"));

    let receipt = client
        .send_sms("+919876543210", "Accident reported at KM 120")
        .await
        .unwrap();
    let outcome = SmsOutcome::from(receipt);
    assert!(outcome.success);
    assert_eq!(outcome.message_id.as_deref(), Some("SM42"));
    assert_eq!(
        client.transport().sent(),
        vec![(
            "+919876543210".to_string(),
            "Accident reported at KM 120".to_string()
        )]
    );
}

#[tokio::test]
async fn test_sms_provider_failure_is_remote_error() {
    let client = NotificationClient::new(&sms_config(), RecordingTransport::failing("queue full"));

    let err = client.send_sms("+919876543210", "hello").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteCall);
    assert_eq!(client.transport().attempts(), 1);
}

/// Answer one HTTP request with a canned status line and body
async fn serve_once(status: &'static str, content_type: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&request);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if request.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            content_type,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
    });

    format!("http://{}", addr)
}

fn http_runner(endpoint: String) -> HttpFlowRunner {
    HttpFlowRunner::new(&FlowConfig {
        endpoint,
        timeout_secs: 5,
        ..FlowConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_flow_server_outage_page_is_remote_unavailable() {
    let endpoint = serve_once(
        "503 Service Unavailable",
        "text/html",
        "<html>Service Unavailable</html>",
    )
    .await;

    let err = http_runner(endpoint)
        .run_flow(FIRST_AID_FLOW, json!({"situationDescription": "Cut on the forearm"}))
        .await
        .unwrap_err();

    assert_eq!(err, FlowError::HttpError("HTTP 503 from flow server".to_string()));
    assert_eq!(HealersError::from(err).exit_code(), EXIT_REMOTE_UNAVAILABLE);
}

#[tokio::test]
async fn test_flow_server_error_body_is_reported() {
    let endpoint = serve_once(
        "500 Internal Server Error",
        "application/json",
        r#"{"error":{"status":"INTERNAL","message":"model overloaded"}}"#,
    )
    .await;

    let err = http_runner(endpoint)
        .run_flow(FIRST_AID_FLOW, json!({"situationDescription": "Cut on the forearm"}))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        FlowError::FlowFailed {
            flow: FIRST_AID_FLOW.to_string(),
            message: "model overloaded".to_string(),
        }
    );
}

#[tokio::test]
async fn test_flow_server_result_is_unwrapped() {
    let endpoint = serve_once(
        "200 OK",
        "application/json",
        r#"{"result":{"firstAidInstructions":"1. Apply pressure."}}"#,
    )
    .await;

    let output = http_runner(endpoint)
        .run_flow(FIRST_AID_FLOW, json!({"situationDescription": "Cut on the forearm"}))
        .await
        .unwrap();

    assert_eq!(output["firstAidInstructions"], "1. Apply pressure.");
}
