//! Error taxonomy shared by the dispatcher, the build pipeline and the
//! outbound service adapters.
//!
//! Every variant ends up in an `error` call response carrying its `Display`
//! text; nothing here is fatal to the process.

use thiserror::Error;

/// Which external collaborator produced an upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    GitHub,
    CircleCi,
    Host,
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Service::GitHub => f.write_str("GitHub"),
            Service::CircleCi => f.write_str("CircleCI"),
            Service::Host => f.write_str("host"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    /// Inbound payload could not be decoded.
    #[error("error unmarshaling call request: {0}")]
    Decode(String),

    /// Caller-supplied input is malformed.
    #[error("{0}")]
    Validation(String),

    /// Non-2xx response from an external service.
    #[error("{service} API error ({status}): {message}")]
    Upstream {
        service: Service,
        status: u16,
        message: String,
    },

    #[error("{service} rate limited: {message}")]
    RateLimited { service: Service, message: String },

    /// Transport failure, including timeouts.
    #[error("{service} request failed: {message}")]
    Network { service: Service, message: String },

    /// The service answered but the expected record was absent.
    #[error("{0}")]
    NotFound(String),

    /// Host install/enable failure.
    #[error("{0}")]
    Host(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// A lower-level failure annotated with what was being attempted.
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    /// Prefix the message with what the caller was doing.
    pub(crate) fn context(self, context: impl Into<String>) -> Self {
        AppError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Map a reqwest transport error. Timeouts keep their own wording so the
    /// user can tell a hung service from a refused connection.
    pub(crate) fn network(service: Service, err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("timed out: {err}")
        } else {
            err.to_string()
        };
        AppError::Network { service, message }
    }
}

pub type AppResult<T> = Result<T, AppError>;
