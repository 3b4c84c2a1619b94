//! Error taxonomy for automation failures.
//!
//! Per-row failures are [`AutomationError`] values that the run coordinator
//! converts into outcome records. [`BrowserLaunchError`] is fatal and maps to
//! its own exit code. Mapping problems live in [`crate::core::rules::ConfigError`].

use std::time::Duration;

use thiserror::Error;

/// Failure raised by an automation surface while filling, submitting, or verifying a row.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AutomationError {
    #[error("no element matches selector '{selector}'")]
    ElementNotFound { selector: String },

    #[error("select '{selector}' has no option with value '{value}'")]
    NoSuchOption { selector: String, value: String },

    #[error("timed out after {timeout:?} waiting for {condition}")]
    Timeout { condition: String, timeout: Duration },

    /// The session (browser or driver) is gone; every later call would fail too.
    #[error("automation session lost: {0}")]
    SessionLost(String),

    #[error("{0}")]
    Unexpected(String),
}

impl AutomationError {
    /// Category name recorded for form and timeout errors.
    ///
    /// Returns `None` for errors that are reported verbatim.
    pub fn category(&self) -> Option<&'static str> {
        match self {
            AutomationError::ElementNotFound { .. } | AutomationError::NoSuchOption { .. } => {
                Some("ElementError")
            }
            AutomationError::Timeout { .. } => Some("SubmissionTimeout"),
            AutomationError::SessionLost(_) | AutomationError::Unexpected(_) => None,
        }
    }

    /// Message stored in the outcome log for a row that failed with this error.
    pub fn outcome_message(&self) -> String {
        match self.category() {
            Some(category) => format!("form error: {category}: {self}"),
            None => self.to_string(),
        }
    }

    pub fn is_session_lost(&self) -> bool {
        matches!(self, AutomationError::SessionLost(_))
    }
}

/// The automation surface failed to start.
#[derive(Debug, Error)]
#[error("failed to start {browser} automation session: {reason}")]
pub struct BrowserLaunchError {
    pub browser: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_errors_carry_category_in_message() {
        let err = AutomationError::ElementNotFound {
            selector: "#email".to_string(),
        };
        assert_eq!(
            err.outcome_message(),
            "form error: ElementError: no element matches selector '#email'"
        );

        let err = AutomationError::Timeout {
            condition: "'#msg' to be visible".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert!(
            err.outcome_message()
                .starts_with("form error: SubmissionTimeout: timed out after 5s")
        );
    }

    #[test]
    fn unexpected_errors_are_verbatim() {
        let err = AutomationError::Unexpected("stale element reference".to_string());
        assert_eq!(err.outcome_message(), "stale element reference");
        assert_eq!(err.category(), None);
    }

    #[test]
    fn missing_option_is_an_element_error() {
        let err = AutomationError::NoSuchOption {
            selector: "#country".to_string(),
            value: "MX".to_string(),
        };
        assert_eq!(err.category(), Some("ElementError"));
    }
}
