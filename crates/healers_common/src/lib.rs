//! Highway Healers Common - shared core for roadside emergency assistance
//!
//! The dispatch state machine, device capabilities, AI flow and SMS clients,
//! and the configuration they are built from. The CLI shell in `healersctl`
//! only renders what lives here.

pub mod capability;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod flow_client;
pub mod flows;
pub mod map;
pub mod pickup;
pub mod sms;

pub use capability::{CameraStream, CapabilityAcquirer, CapabilityError, Coordinates};
pub use config::HealersConfig;
pub use dispatch::{DispatchController, DispatchError, SessionView, Step, Trigger, Variant};
pub use error::{ErrorKind, HealersError};
pub use flow_client::{AiFlowClient, FlowError};
pub use sms::{NotificationClient, NotifyError};
