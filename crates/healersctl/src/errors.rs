//! Exit status for healersctl
//!
//! Domain failures travel as `HealersError` inside `anyhow::Error`; anything
//! else (I/O, client construction) is a general error.

use healers_common::error::{HealersError, EXIT_GENERAL_ERROR};

use crate::logging::ErrorDetails;

pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<HealersError>()
        .map(HealersError::exit_code)
        .unwrap_or(EXIT_GENERAL_ERROR)
}

pub fn error_details(err: &anyhow::Error) -> ErrorDetails {
    let code = err
        .downcast_ref::<HealersError>()
        .map(|e| e.kind().as_str())
        .unwrap_or("general");
    ErrorDetails {
        code: code.to_string(),
        message: format!("{:#}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healers_common::config::ConfigError;
    use healers_common::error::{EXIT_CONFIG, EXIT_VALIDATION};

    #[test]
    fn test_domain_errors_keep_their_exit_code() {
        let err: anyhow::Error = HealersError::Validation("too short".to_string()).into();
        assert_eq!(exit_code_for(&err), EXIT_VALIDATION);
        assert_eq!(error_details(&err).code, "validation");

        let err: anyhow::Error =
            HealersError::from(ConfigError::MissingCredential("GOOGLE_MAPS_API_KEY")).into();
        assert_eq!(exit_code_for(&err), EXIT_CONFIG);
    }

    #[test]
    fn test_other_errors_are_general() {
        let err = anyhow::anyhow!("broken pipe");
        assert_eq!(exit_code_for(&err), EXIT_GENERAL_ERROR);
        assert_eq!(error_details(&err).code, "general");
        assert_eq!(error_details(&err).message, "broken pipe");
    }
}
