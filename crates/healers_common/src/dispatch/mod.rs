//! Emergency dispatch state machine
//!
//! A session walks the fixed step ordering of its variant:
//! - roadside: Contact (optional) -> Location -> Tracking
//! - vitals:   Vitals (optional) -> Guidance -> Tracking
//!
//! `step` holds the transition table, `session` the per-flow data and guards,
//! `controller` the async entry actions and session lifetime.

pub mod controller;
pub mod session;
pub mod step;

pub use controller::DispatchController;
pub use session::{DispatchSession, Eta, GuidanceStatus, InstructionSource, SessionView};
pub use step::{next_step, CapabilityKind, Step, Transition, Trigger, Variant, TRANSITIONS};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("cannot {trigger:?} from {from:?} in the {variant} flow")]
    IllegalTransition {
        variant: Variant,
        from: Step,
        trigger: Trigger,
    },

    #[error("{0:?} is not a user action")]
    NotUserAction(Trigger),

    #[error("expected the {expected:?} step, session is at {actual:?}")]
    WrongStep { expected: Step, actual: Step },

    #[error("camera access is required to continue")]
    CameraRequired,

    #[error("location has not been acquired")]
    LocationRequired,

    #[error("instructions are already being generated")]
    GuidancePending,

    #[error("describe the situation first")]
    EmptySituation,

    #[error("contact '{0}' is not an E.164 phone number")]
    InvalidContact(String),

    #[error("no emergency flow is open")]
    NotOpen,

    #[error("the emergency flow was closed")]
    Closed,
}
