//! Failures talking to external collaborators (weather, prices, notebook
//! model servers, embedding server).

use thiserror::Error;

use super::CoreError;

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("{service} is not configured")]
    NotConfigured { service: &'static str },

    #[error("{service} timed out")]
    Timeout { service: &'static str },

    #[error("cannot connect to {service}: {reason}")]
    Connect {
        service: &'static str,
        reason: String,
    },

    #[error("{service} returned HTTP {status}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} returned an unexpected payload: {reason}")]
    Decode {
        service: &'static str,
        reason: String,
    },
}

impl UpstreamError {
    /// Classify a transport-level reqwest failure.
    pub fn from_reqwest(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout { service }
        } else if err.is_connect() || err.is_request() {
            UpstreamError::Connect {
                service,
                reason: err.to_string(),
            }
        } else if err.is_decode() {
            UpstreamError::Decode {
                service,
                reason: err.to_string(),
            }
        } else {
            UpstreamError::Connect {
                service,
                reason: err.to_string(),
            }
        }
    }

    pub fn service(&self) -> &'static str {
        match self {
            UpstreamError::NotConfigured { service }
            | UpstreamError::Timeout { service }
            | UpstreamError::Connect { service, .. }
            | UpstreamError::Status { service, .. }
            | UpstreamError::Decode { service, .. } => service,
        }
    }
}

impl From<UpstreamError> for CoreError {
    fn from(err: UpstreamError) -> Self {
        let service = err.service();
        let core = match &err {
            UpstreamError::NotConfigured { .. } => {
                CoreError::unavailable(format!("{} is not configured", service))
            }
            UpstreamError::Timeout { .. } => {
                CoreError::timeout(format!("{} timeout. Please try again.", service))
            }
            UpstreamError::Connect { .. } => CoreError::unavailable(format!(
                "Cannot connect to {}. Please ensure it is running and reachable.",
                service.to_lowercase()
            )),
            UpstreamError::Status { status, body, .. } => {
                CoreError::internal(format!("{} error: {}", service, status))
                    .with_field("details", body.clone())
            }
            UpstreamError::Decode { .. } => {
                CoreError::internal(format!("Unexpected response from {}", service))
            }
        };
        core.with_field("service", service).with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CoreErrorKind;

    #[test]
    fn timeout_maps_to_gateway_timeout() {
        let err: CoreError = UpstreamError::Timeout {
            service: "Model server",
        }
        .into();
        assert_eq!(err.kind(), CoreErrorKind::Timeout);
        assert_eq!(err.message(), "Model server timeout. Please try again.");
        assert_eq!(err.http_status_code(), 504);
    }

    #[test]
    fn status_error_keeps_details() {
        let err: CoreError = UpstreamError::Status {
            service: "Model server",
            status: 502,
            body: "bad gateway".into(),
        }
        .into();
        assert_eq!(err.message(), "Model server error: 502");
        assert_eq!(
            err.fields().unwrap().get("details").map(String::as_str),
            Some("bad gateway")
        );
    }

    #[test]
    fn connect_maps_to_unavailable() {
        let err: CoreError = UpstreamError::Connect {
            service: "Notebook server",
            reason: "refused".into(),
        }
        .into();
        assert_eq!(err.http_status_code(), 503);
        assert!(err.message().starts_with("Cannot connect to notebook server"));
    }
}
