use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("unauthorized request: {0}")]
    Unauthorized(String),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("document append failed: {0}")]
    AppendFailure(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// Stable label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::MalformedPayload(_) => "malformed_payload",
            Self::AppendFailure(_) => "append_failure",
            Self::Configuration(_) => "configuration",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("unauthorized: {message}")]
    Unauthorized { message: String, correlation_id: String },
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthorized { .. } => 401,
            Self::BadRequest { .. } => 400,
            Self::Internal { .. } => 500,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "Request signature could not be verified.",
            Self::BadRequest { .. } => "The event payload could not be processed.",
            Self::Internal { .. } => "The message could not be archived. Please retry shortly.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Unauthorized { correlation_id, .. }
            | Self::BadRequest { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::Unauthorized { correlation_id: id, .. }
            | InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Unauthorized(message) => Self::Unauthorized { message, correlation_id },
            ApplicationError::MalformedPayload(message) => {
                Self::BadRequest { message, correlation_id }
            }
            ApplicationError::AppendFailure(message)
            | ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, InterfaceError};

    #[test]
    fn unauthorized_maps_to_401() {
        let interface =
            ApplicationError::Unauthorized("signature mismatch".to_owned()).into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::Unauthorized {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(interface.http_status(), 401);
    }

    #[test]
    fn malformed_payload_maps_to_bad_request_with_user_safe_message() {
        let interface = ApplicationError::MalformedPayload("expected value at line 1".to_owned())
            .into_interface("req-2");

        assert_eq!(interface.http_status(), 400);
        assert_eq!(interface.user_message(), "The event payload could not be processed.");
        assert_eq!(interface.correlation_id(), "req-2");
    }

    #[test]
    fn append_failure_maps_to_internal() {
        let interface =
            ApplicationError::AppendFailure("timed out".to_owned()).into_interface("req-3");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.http_status(), 500);
    }

    #[test]
    fn error_kinds_are_distinct() {
        let kinds = [
            ApplicationError::Unauthorized(String::new()).kind(),
            ApplicationError::MalformedPayload(String::new()).kind(),
            ApplicationError::AppendFailure(String::new()).kind(),
            ApplicationError::Configuration(String::new()).kind(),
        ];
        for (index, kind) in kinds.iter().enumerate() {
            assert!(!kinds[index + 1..].contains(kind), "duplicate kind `{kind}`");
        }
    }
}
