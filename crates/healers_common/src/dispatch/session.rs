//! Per-flow session data and the guarded step machine.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::step::{next_step, Step, Trigger, Variant};
use super::DispatchError;
use crate::capability::{CameraStream, Coordinates};

/// First-aid request progress inside the guidance step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuidanceStatus {
    #[default]
    Idle,
    Loading,
    Success,
}

/// Where the stored instructions came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionSource {
    Flow,
    /// The flow failed and the fixed fallback text was stored instead
    Fallback,
}

/// Simulated arrival estimate in minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eta {
    pub ambulance_min: u32,
    pub drone_min: u32,
}

impl Default for Eta {
    fn default() -> Self {
        Self {
            ambulance_min: 15,
            drone_min: 10,
        }
    }
}

impl Eta {
    /// One minute passes
    pub fn tick(&mut self) {
        self.ambulance_min = self.ambulance_min.saturating_sub(1);
        self.drone_min = self.drone_min.saturating_sub(1);
    }

    pub fn arrived(&self) -> bool {
        self.ambulance_min == 0 && self.drone_min == 0
    }
}

/// State of one emergency flow, from open to close
#[derive(Debug)]
pub struct DispatchSession {
    variant: Variant,
    step: Step,
    visited: Vec<Step>,
    pub(crate) location: Option<Coordinates>,
    pub(crate) location_error: Option<String>,
    pub(crate) camera: Option<CameraStream>,
    pub(crate) camera_error: Option<String>,
    pub(crate) situation_text: String,
    pub(crate) instructions: Option<String>,
    pub(crate) instruction_source: Option<InstructionSource>,
    pub(crate) guidance: GuidanceStatus,
    pub(crate) contact: Option<String>,
    pub(crate) eta: Eta,
}

impl DispatchSession {
    pub fn new(variant: Variant) -> Self {
        let step = variant.initial_step();
        Self {
            variant,
            step,
            visited: vec![step],
            location: None,
            location_error: None,
            camera: None,
            camera_error: None,
            situation_text: String::new(),
            instructions: None,
            instruction_source: None,
            guidance: GuidanceStatus::Idle,
            contact: None,
            eta: Eta::default(),
        }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn step(&self) -> Step {
        self.step
    }

    /// Steps entered so far, in order
    pub fn visited(&self) -> &[Step] {
        &self.visited
    }

    pub fn location(&self) -> Option<Coordinates> {
        self.location
    }

    pub fn location_error(&self) -> Option<&str> {
        self.location_error.as_deref()
    }

    pub fn camera(&self) -> Option<&CameraStream> {
        self.camera.as_ref()
    }

    pub fn camera_error(&self) -> Option<&str> {
        self.camera_error.as_deref()
    }

    pub fn situation_text(&self) -> &str {
        &self.situation_text
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn instruction_source(&self) -> Option<InstructionSource> {
        self.instruction_source
    }

    pub fn guidance(&self) -> GuidanceStatus {
        self.guidance
    }

    pub fn contact(&self) -> Option<&str> {
        self.contact.as_deref()
    }

    pub fn eta(&self) -> Eta {
        self.eta
    }

    /// Whether `trigger` would be accepted right now
    pub fn can_fire(&self, trigger: Trigger) -> bool {
        self.check(trigger).is_ok()
    }

    fn check(&self, trigger: Trigger) -> Result<Step, DispatchError> {
        let to = next_step(self.variant, self.step, trigger).ok_or(
            DispatchError::IllegalTransition {
                variant: self.variant,
                from: self.step,
                trigger,
            },
        )?;

        match (self.step, trigger) {
            (Step::Vitals, Trigger::Continue) if self.camera.is_none() => {
                Err(DispatchError::CameraRequired)
            }
            (Step::Guidance, _) if self.guidance == GuidanceStatus::Loading => {
                Err(DispatchError::GuidancePending)
            }
            (Step::Location, Trigger::LocationAcquired) if self.location.is_none() => {
                Err(DispatchError::LocationRequired)
            }
            _ => Ok(to),
        }
    }

    /// Apply `trigger`, or leave the session untouched and explain why not
    pub fn fire(&mut self, trigger: Trigger) -> Result<Step, DispatchError> {
        let to = self.check(trigger)?;
        debug!(
            "Dispatch {}: {} --{:?}--> {}",
            self.variant,
            self.step.as_str(),
            trigger,
            to.as_str()
        );
        self.step = to;
        self.visited.push(to);
        Ok(to)
    }

    /// Read-only copy for rendering
    pub fn view(&self) -> SessionView {
        SessionView {
            variant: self.variant,
            step: self.step,
            visited: self.visited.clone(),
            location: self.location,
            location_error: self.location_error.clone(),
            camera_live: self.camera.as_ref().is_some_and(CameraStream::is_live),
            camera_error: self.camera_error.clone(),
            situation_text: self.situation_text.clone(),
            instructions: self.instructions.clone(),
            instruction_source: self.instruction_source,
            guidance: self.guidance,
            contact: self.contact.clone(),
            eta: self.eta,
            can_continue: self.can_fire(Trigger::Continue),
            can_skip: self.can_fire(Trigger::Skip),
        }
    }
}

/// Snapshot of a session for the presentation shell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub variant: Variant,
    pub step: Step,
    pub visited: Vec<Step>,
    pub location: Option<Coordinates>,
    pub location_error: Option<String>,
    pub camera_live: bool,
    pub camera_error: Option<String>,
    pub situation_text: String,
    pub instructions: Option<String>,
    pub instruction_source: Option<InstructionSource>,
    pub guidance: GuidanceStatus,
    pub contact: Option<String>,
    pub eta: Eta,
    pub can_continue: bool,
    pub can_skip: bool,
}

impl SessionView {
    /// Instructions are the fallback text rather than flow output
    pub fn is_degraded(&self) -> bool {
        self.instruction_source == Some(InstructionSource::Fallback)
    }
}
