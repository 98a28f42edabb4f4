//! Request and response shapes of the hosted prompt flows.
//!
//! Field names follow the flow server's camelCase schemas. Responses are
//! deserialized with every field required, so a missing or mistyped field is
//! a schema failure rather than a default value.

use serde::{Deserialize, Serialize};

pub const FIRST_AID_FLOW: &str = "firstAidInstructionsFlow";
pub const RESOURCE_ALLOCATION_FLOW: &str = "predictResourceAllocationFlow";

/// Shown in place of instructions when the first-aid flow fails
pub const FIRST_AID_FALLBACK: &str =
    "Could not retrieve instructions. Please describe the situation to the operator.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirstAidInput {
    /// A detailed description of the emergency situation
    pub situation_description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirstAidOutput {
    /// Step-by-step first-aid instructions
    pub first_aid_instructions: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAllocationInput {
    /// Location, time and nature of the emergency
    pub scenario_description: String,
    pub available_ambulances: u32,
    pub available_drones: u32,
    pub available_doctors: u32,
}

impl ResourceAllocationInput {
    pub fn new(scenario: impl Into<String>, counts: ResourceCounts) -> Self {
        Self {
            scenario_description: scenario.into(),
            available_ambulances: counts.ambulances,
            available_drones: counts.drones,
            available_doctors: counts.doctors,
        }
    }
}

/// Resources currently on hand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceCounts {
    pub ambulances: u32,
    pub drones: u32,
    pub doctors: u32,
}

impl Default for ResourceCounts {
    fn default() -> Self {
        Self {
            ambulances: 5,
            drones: 10,
            doctors: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAllocationOutput {
    pub predicted_ambulance_need: f64,
    pub predicted_drone_need: f64,
    pub predicted_doctor_need: f64,
    /// Reasoning behind the numbers
    pub justification: String,
}

/// Prompt-format description of an output schema, sent alongside the input
pub fn schema_description(flow: &str) -> &'static str {
    match flow {
        FIRST_AID_FLOW => r#"{"firstAidInstructions": string}"#,
        RESOURCE_ALLOCATION_FLOW => {
            r#"{"predictedAmbulanceNeed": number, "predictedDroneNeed": number, "predictedDoctorNeed": number, "justification": string}"#
        }
        _ => "{}",
    }
}
