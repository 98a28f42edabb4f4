//! Error taxonomy for Highway Healers.
//!
//! Every component has its own error enum. They all fold into `HealersError`,
//! which carries one of four kinds the presentation shell knows how to show.

use thiserror::Error;

use crate::capability::CapabilityError;
use crate::config::ConfigError;
use crate::dispatch::DispatchError;
use crate::flow_client::FlowError;
use crate::sms::NotifyError;

/// Coarse error class shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Required credential or setting missing
    Configuration,
    /// Geolocation or camera denied/unsupported
    Permission,
    /// AI flow or SMS provider failed or returned malformed output
    RemoteCall,
    /// Input rejected before any remote call
    Validation,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Permission => "permission",
            ErrorKind::RemoteCall => "remote_call",
            ErrorKind::Validation => "validation",
        }
    }
}

#[derive(Error, Debug)]
pub enum HealersError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Permission error: {0}")]
    Permission(#[from] CapabilityError),

    #[error("Remote call failed: {0}")]
    Flow(#[from] FlowError),

    #[error("SMS failed: {0}")]
    Notify(#[from] NotifyError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl HealersError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HealersError::Configuration(_) => ErrorKind::Configuration,
            HealersError::Permission(_) => ErrorKind::Permission,
            HealersError::Flow(e) => e.kind(),
            HealersError::Notify(e) => e.kind(),
            HealersError::Dispatch(_) | HealersError::Validation(_) => ErrorKind::Validation,
        }
    }

    /// Process exit code for this error (sysexits-style)
    pub fn exit_code(&self) -> i32 {
        match self {
            HealersError::Flow(FlowError::InvalidJson(_))
            | HealersError::Flow(FlowError::Schema(_))
            | HealersError::Flow(FlowError::EmptyResponse) => EXIT_INVALID_RESPONSE,
            _ => match self.kind() {
                ErrorKind::Configuration => EXIT_CONFIG,
                ErrorKind::Permission => EXIT_GENERAL_ERROR,
                ErrorKind::RemoteCall => EXIT_REMOTE_UNAVAILABLE,
                ErrorKind::Validation => EXIT_VALIDATION,
            },
        }
    }
}

/// Exit code for success
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for general errors
pub const EXIT_GENERAL_ERROR: i32 = 1;

/// Exit code when user input was rejected
pub const EXIT_VALIDATION: i32 = 64;

/// Exit code when a remote service returned malformed output
pub const EXIT_INVALID_RESPONSE: i32 = 65;

/// Exit code when a remote service is unreachable or failed
pub const EXIT_REMOTE_UNAVAILABLE: i32 = 69;

/// Exit code when required configuration is missing
pub const EXIT_CONFIG: i32 = 78;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_map_to_exit_codes() {
        let err: HealersError = ConfigError::MissingCredential("TWILIO_AUTH_TOKEN").into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.exit_code(), EXIT_CONFIG);

        let err: HealersError = NotifyError::InvalidRecipient("123".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.exit_code(), EXIT_VALIDATION);

        let err: HealersError = FlowError::HttpError("connection refused".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::RemoteCall);
        assert_eq!(err.exit_code(), EXIT_REMOTE_UNAVAILABLE);

        let err: HealersError = FlowError::Schema("missing field".to_string()).into();
        assert_eq!(err.exit_code(), EXIT_INVALID_RESPONSE);
    }

    #[test]
    fn test_permission_error_message() {
        let err: HealersError = CapabilityError::Denied("Location access denied.".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Permission);
        assert!(err.to_string().contains("Location access denied"));
    }
}
