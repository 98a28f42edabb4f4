//! AI Flow Client
//!
//! Calls the hosted prompt flows with typed inputs and schema-checked outputs.
//! `FlowRunner` is the transport seam: `HttpFlowRunner` talks to the flow
//! server, `FakeFlowRunner` replays scripted responses for tests.
//!
//! Every call is a single attempt. There is no retry and no backoff.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::config::FlowConfig;
use crate::error::ErrorKind;
use crate::flows::{
    schema_description, FirstAidInput, FirstAidOutput, ResourceAllocationInput,
    ResourceAllocationOutput, ResourceCounts, FIRST_AID_FLOW, RESOURCE_ALLOCATION_FLOW,
};

/// Flow call errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Invalid JSON response: {0}")]
    InvalidJson(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Flow returned empty response")]
    EmptyResponse,

    #[error("Flow {flow} failed: {message}")]
    FlowFailed { flow: String, message: String },

    #[error("Response does not match schema: {0}")]
    Schema(String),

    #[error("{0}")]
    Validation(String),
}

impl FlowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlowError::Validation(_) => ErrorKind::Validation,
            _ => ErrorKind::RemoteCall,
        }
    }
}

/// Transport for named flows
#[async_trait]
pub trait FlowRunner: Send + Sync {
    /// Run `flow` with a JSON input and return its JSON output
    async fn run_flow(
        &self,
        flow: &str,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, FlowError>;
}

/// Flow server client over HTTP
///
/// Posts `{"data": input}` to `<endpoint>/<flow>` and expects `{"result": output}`.
pub struct HttpFlowRunner {
    config: FlowConfig,
    client: reqwest::Client,
}

impl HttpFlowRunner {
    pub fn new(config: &FlowConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    fn flow_url(&self, flow: &str) -> String {
        format!("{}/{}", self.config.endpoint.trim_end_matches('/'), flow)
    }
}

#[async_trait]
impl FlowRunner for HttpFlowRunner {
    async fn run_flow(
        &self,
        flow: &str,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, FlowError> {
        let url = self.flow_url(flow);
        debug!("Running flow {} at {}", flow, url);

        let mut request = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "data": input }));

        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FlowError::Timeout(self.config.timeout_secs)
            } else {
                FlowError::HttpError(format!("Request failed: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            // Proxies answer with HTML; only a JSON body can carry a flow error
            let text = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(body) if body.get("error").is_some() => flow_failure(flow, &body["error"]),
                _ => FlowError::HttpError(format!("HTTP {} from flow server", status.as_u16())),
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FlowError::InvalidJson(format!("Failed to parse response: {}", e)))?;

        unwrap_flow_body(flow, status.as_u16(), body)
    }
}

fn flow_failure(flow: &str, error: &serde_json::Value) -> FlowError {
    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());
    FlowError::FlowFailed {
        flow: flow.to_string(),
        message,
    }
}

/// Pull the flow output out of a flow server response body
fn unwrap_flow_body(
    flow: &str,
    status: u16,
    body: serde_json::Value,
) -> Result<serde_json::Value, FlowError> {
    if let Some(error) = body.get("error") {
        return Err(flow_failure(flow, error));
    }

    if !(200..300).contains(&status) {
        return Err(FlowError::HttpError(format!("HTTP {} from flow server", status)));
    }

    match body.get("result") {
        Some(serde_json::Value::Null) | None => Err(FlowError::EmptyResponse),
        Some(result) => Ok(result.clone()),
    }
}

/// Typed client for the product's flows
#[derive(Clone)]
pub struct AiFlowClient {
    runner: Arc<dyn FlowRunner>,
}

impl AiFlowClient {
    pub fn new(runner: Arc<dyn FlowRunner>) -> Self {
        Self { runner }
    }

    pub fn from_config(config: &FlowConfig) -> anyhow::Result<Self> {
        Ok(Self::new(Arc::new(HttpFlowRunner::new(config)?)))
    }

    pub async fn get_first_aid_instructions(&self, situation: &str) -> Result<String, FlowError> {
        if situation.trim().is_empty() {
            return Err(FlowError::Validation(
                "Situation description is empty".to_string(),
            ));
        }

        let input = FirstAidInput {
            situation_description: situation.to_string(),
        };
        let output: FirstAidOutput = self.call(FIRST_AID_FLOW, &input).await?;
        Ok(output.first_aid_instructions)
    }

    pub async fn predict_resource_allocation(
        &self,
        scenario: &str,
        counts: ResourceCounts,
    ) -> Result<ResourceAllocationOutput, FlowError> {
        if scenario.trim().is_empty() {
            return Err(FlowError::Validation(
                "Scenario description is empty".to_string(),
            ));
        }

        let input = ResourceAllocationInput::new(scenario, counts);
        let output: ResourceAllocationOutput = self.call(RESOURCE_ALLOCATION_FLOW, &input).await?;

        let needs = [
            output.predicted_ambulance_need,
            output.predicted_drone_need,
            output.predicted_doctor_need,
        ];
        if needs.iter().any(|n| !n.is_finite() || *n < 0.0) {
            return Err(FlowError::Schema(format!(
                "predicted needs must be non-negative numbers, got {:?}",
                needs
            )));
        }

        Ok(output)
    }

    async fn call<I, O>(&self, flow: &str, input: &I) -> Result<O, FlowError>
    where
        I: Serialize + Sync,
        O: DeserializeOwned,
    {
        let input = serde_json::to_value(input)
            .map_err(|e| FlowError::Validation(format!("Cannot encode input: {}", e)))?;

        let raw = match self.runner.run_flow(flow, input).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Flow {} failed: {}", flow, e);
                return Err(e);
            }
        };

        let output = serde_json::from_value(raw).map_err(|e| {
            warn!("Flow {} returned malformed output: {}", flow, e);
            FlowError::Schema(format!("{} (expected {})", e, schema_description(flow)))
        })?;

        info!("Flow {} succeeded", flow);
        Ok(output)
    }
}

/// Fake flow runner for testing
pub struct FakeFlowRunner {
    responses: Mutex<Vec<Result<serde_json::Value, FlowError>>>,
    calls: Mutex<Vec<(String, serde_json::Value)>>,
    gate: Option<Arc<Notify>>,
}

impl FakeFlowRunner {
    /// Create a fake runner with pre-defined responses
    pub fn new(responses: Vec<Result<serde_json::Value, FlowError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Create a fake runner that always returns the same output
    pub fn always_valid(json: serde_json::Value) -> Self {
        Self::new(vec![Ok(json)])
    }

    /// Create a fake runner that always fails
    pub fn always_error(error: FlowError) -> Self {
        Self::new(vec![Err(error)])
    }

    /// Hold every call until the gate is notified
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Flow names and inputs received so far
    pub fn calls(&self) -> Vec<(String, serde_json::Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FlowRunner for FakeFlowRunner {
    async fn run_flow(
        &self,
        flow: &str,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, FlowError> {
        self.calls.lock().unwrap().push((flow.to_string(), input));

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(FlowError::EmptyResponse);
        }

        if responses.len() == 1 {
            // Keep returning the same response
            responses[0].clone()
        } else {
            responses.remove(0)
        }
    }
}
