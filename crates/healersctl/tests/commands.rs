//! One-shot commands against fake clients

use healers_common::capability::{CapabilityAcquirer, Coordinates, FakeCapabilities};
use healers_common::config::{MapsConfig, SmsConfig};
use healers_common::error::{EXIT_CONFIG, EXIT_REMOTE_UNAVAILABLE, EXIT_VALIDATION};
use healers_common::flow_client::{AiFlowClient, FakeFlowRunner, FlowError};
use healers_common::flows::ResourceCounts;
use healers_common::sms::{NotificationClient, RecordingTransport};
use healersctl::commands;
use healersctl::errors::exit_code_for;
use healersctl::output::DISCLAIMER;
use serde_json::json;
use std::sync::Arc;

fn flows(runner: FakeFlowRunner) -> (AiFlowClient, Arc<FakeFlowRunner>) {
    let runner = Arc::new(runner);
    (AiFlowClient::new(runner.clone()), runner)
}

#[tokio::test]
async fn test_first_aid_rejects_short_description_before_calling() {
    let (client, runner) = flows(FakeFlowRunner::always_valid(json!({
        "firstAidInstructions": "x"
    })));
    let mut out: Vec<u8> = Vec::new();

    let err = commands::first_aid(&client, 10, "  cut  ", &mut out)
        .await
        .unwrap_err();
    assert_eq!(exit_code_for(&err), EXIT_VALIDATION);
    assert!(err.to_string().contains("at least 10 characters"));
    assert_eq!(runner.call_count(), 0);
}

#[tokio::test]
async fn test_first_aid_prints_instructions_and_disclaimer() {
    let (client, _) = flows(FakeFlowRunner::always_valid(json!({
        "firstAidInstructions": "1. Rinse the burn with cool water.\n2. Cover loosely."
    })));
    let mut out: Vec<u8> = Vec::new();

    commands::first_aid(&client, 10, "Burn on the hand from the engine", &mut out)
        .await
        .unwrap();

    let text = String::from_utf8_lossy(&out);
    assert!(text.contains("  1. Rinse the burn with cool water."));
    assert!(text.contains(DISCLAIMER));
}

#[tokio::test]
async fn test_first_aid_failure_is_surfaced() {
    let (client, _) = flows(FakeFlowRunner::always_error(FlowError::Timeout(60)));
    let mut out: Vec<u8> = Vec::new();

    let err = commands::first_aid(&client, 10, "Driver has chest pain", &mut out)
        .await
        .unwrap_err();
    assert_eq!(exit_code_for(&err), EXIT_REMOTE_UNAVAILABLE);
    assert!(String::from_utf8_lossy(&out).contains("Error getting instructions"));
}

#[tokio::test]
async fn test_predict_validates_then_reports_failure() {
    let (client, runner) = flows(FakeFlowRunner::always_error(FlowError::HttpError(
        "connection refused".to_string(),
    )));
    let mut out: Vec<u8> = Vec::new();

    let err = commands::predict(&client, 20, "Crash on NH48", ResourceCounts::default(), &mut out)
        .await
        .unwrap_err();
    assert_eq!(exit_code_for(&err), EXIT_VALIDATION);
    assert_eq!(runner.call_count(), 0);

    let err = commands::predict(
        &client,
        20,
        "Three-car pile-up on NH48 near KM 120 at dusk",
        ResourceCounts::default(),
        &mut out,
    )
    .await
    .unwrap_err();
    assert_eq!(exit_code_for(&err), EXIT_REMOTE_UNAVAILABLE);
    assert!(String::from_utf8_lossy(&out).contains("Prediction Failed"));
    assert_eq!(runner.call_count(), 1);
}

#[tokio::test]
async fn test_predict_prints_needs() {
    let (client, _) = flows(FakeFlowRunner::always_valid(json!({
        "predictedAmbulanceNeed": 3,
        "predictedDroneNeed": 2,
        "predictedDoctorNeed": 4,
        "justification": "Multiple vehicles involved."
    })));
    let mut out: Vec<u8> = Vec::new();

    commands::predict(
        &client,
        20,
        "Three-car pile-up on NH48 near KM 120 at dusk",
        ResourceCounts::default(),
        &mut out,
    )
    .await
    .unwrap();

    let text = String::from_utf8_lossy(&out);
    assert!(text.contains("Ambulances: 3"));
    assert!(text.contains("Multiple vehicles involved."));
}

#[tokio::test]
async fn test_sms_command_maps_errors_to_exit_codes() {
    let client = NotificationClient::new(&SmsConfig::default(), RecordingTransport::accepting("SM1"));
    let mut out: Vec<u8> = Vec::new();

    let err = commands::sms(&client, "+919876543210", "hello", &mut out)
        .await
        .unwrap_err();
    assert_eq!(exit_code_for(&err), EXIT_CONFIG);
    assert_eq!(client.transport().attempts(), 0);
}

#[test]
fn test_medicine_search_and_preorder() {
    let mut out: Vec<u8> = Vec::new();
    commands::medicine(Some("bandages"), None, |_| unreachable!(), &mut out).unwrap();
    let text = String::from_utf8_lossy(&out);
    assert!(text.contains("Toll Plaza KM 120"));
    assert!(!text.contains("NHAI Highway Stop"));

    let mut out: Vec<u8> = Vec::new();
    let mut asked = String::new();
    commands::medicine(
        None,
        Some("nhai highway stop"),
        |prompt| {
            asked = prompt.to_string();
            false
        },
        &mut out,
    )
    .unwrap();
    assert!(asked.contains("NHAI Highway Stop"));
    assert!(String::from_utf8_lossy(&out).contains("Pre-order cancelled."));

    let err = commands::medicine(None, Some("Hospital"), |_| true, &mut Vec::<u8>::new()).unwrap_err();
    assert_eq!(exit_code_for(&err), EXIT_VALIDATION);
}

#[tokio::test]
async fn test_map_requires_key() {
    let mut out: Vec<u8> = Vec::new();
    let err = commands::map(&MapsConfig::default(), None, &mut out)
        .await
        .unwrap_err();
    assert_eq!(exit_code_for(&err), EXIT_CONFIG);
    assert!(String::from_utf8_lossy(&out).contains("Google Maps API Key is missing."));
}

#[tokio::test]
async fn test_map_recenters_on_device_location() {
    let config = MapsConfig {
        api_key: Some("maps-key".to_string()),
        ..MapsConfig::default()
    };
    let caps = FakeCapabilities::granted(Coordinates::new(12.9716, 77.5946));
    let mut out: Vec<u8> = Vec::new();

    commands::map(&config, Some(&caps as &dyn CapabilityAcquirer), &mut out).await.unwrap();

    let text = String::from_utf8_lossy(&out);
    assert!(text.contains("Centre: 12.9716, 77.5946"));
    assert!(text.contains("maps.googleapis.com"));
    // Every pickup point is drawn on the map
    assert!(text.contains("NHAI Highway Stop (28.4089, 77.0430)"));
    assert_eq!(text.matches("color%3Ared").count(), 3);
}
