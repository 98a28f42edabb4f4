//! Steps, triggers and the transition table of the emergency flow.

use serde::{Deserialize, Serialize};

/// Product variant. Both share one shape: optional pre-steps, a capability
/// step, and a terminal tracking step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Contact -> Location -> Tracking
    #[default]
    Roadside,
    /// Vitals -> Guidance -> Tracking
    Vitals,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Roadside => "roadside",
            Variant::Vitals => "vitals",
        }
    }

    /// Steps in the order a session visits them
    pub fn steps(&self) -> &'static [Step] {
        match self {
            Variant::Roadside => &[Step::Contact, Step::Location, Step::Tracking],
            Variant::Vitals => &[Step::Vitals, Step::Guidance, Step::Tracking],
        }
    }

    pub fn initial_step(&self) -> Step {
        self.steps()[0]
    }

    /// Position of `step` in this variant's ordering
    pub fn position(&self, step: Step) -> Option<usize> {
        self.steps().iter().position(|s| *s == step)
    }
}

impl std::str::FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "roadside" => Ok(Variant::Roadside),
            "vitals" => Ok(Variant::Vitals),
            other => Err(format!(
                "Invalid variant: '{}'. Valid values: roadside, vitals",
                other
            )),
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device capability a step acquires on entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Location,
    Camera,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Optional emergency contact entry
    Contact,
    /// Mandatory geolocation; auto-advances on success
    Location,
    /// Optional camera check; continuing is gated on camera access
    Vitals,
    /// Free-text situation and AI first-aid instructions
    Guidance,
    /// Help dispatched, simulated ETA
    Tracking,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Contact => "contact",
            Step::Location => "location",
            Step::Vitals => "vitals",
            Step::Guidance => "guidance",
            Step::Tracking => "tracking",
        }
    }

    pub fn human_label(&self) -> &'static str {
        match self {
            Step::Contact => "Emergency contact",
            Step::Location => "Sharing your location",
            Step::Vitals => "Checking vitals",
            Step::Guidance => "Live guidance",
            Step::Tracking => "Live tracking",
        }
    }

    /// Capability acquired as the entry action of this step
    pub fn capability(&self) -> Option<CapabilityKind> {
        match self {
            Step::Location => Some(CapabilityKind::Location),
            Step::Vitals => Some(CapabilityKind::Camera),
            _ => None,
        }
    }

    /// Whether the user may skip this step
    pub fn is_optional(&self) -> bool {
        matches!(self, Step::Contact | Step::Vitals)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Step::Tracking)
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.human_label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// User confirms the current step
    Continue,
    /// User skips an optional step
    Skip,
    /// Location fix delivered and the pacing delay elapsed
    LocationAcquired,
}

impl Trigger {
    /// Triggers the user may fire directly
    pub fn is_user_action(&self) -> bool {
        matches!(self, Trigger::Continue | Trigger::Skip)
    }
}

/// One row of the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub variant: Variant,
    pub from: Step,
    pub trigger: Trigger,
    pub to: Step,
}

const fn row(variant: Variant, from: Step, trigger: Trigger, to: Step) -> Transition {
    Transition {
        variant,
        from,
        trigger,
        to,
    }
}

/// Every legal transition. Anything not listed is rejected.
pub const TRANSITIONS: &[Transition] = &[
    row(Variant::Roadside, Step::Contact, Trigger::Continue, Step::Location),
    row(Variant::Roadside, Step::Contact, Trigger::Skip, Step::Location),
    row(Variant::Roadside, Step::Location, Trigger::LocationAcquired, Step::Tracking),
    row(Variant::Vitals, Step::Vitals, Trigger::Continue, Step::Guidance),
    row(Variant::Vitals, Step::Vitals, Trigger::Skip, Step::Guidance),
    row(Variant::Vitals, Step::Guidance, Trigger::Continue, Step::Tracking),
];

/// Look up the target of `trigger` from `from`
pub fn next_step(variant: Variant, from: Step, trigger: Trigger) -> Option<Step> {
    TRANSITIONS
        .iter()
        .find(|t| t.variant == variant && t.from == from && t.trigger == trigger)
        .map(|t| t.to)
}
