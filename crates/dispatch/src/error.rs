use http::StatusCode;
use thiserror::Error;

/// Boxed error used at the body and connection boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while reading a request or rendering a response.
///
/// Rendering errors never reach the client as such; the chain logs them and moves on.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("request body error: {message}")]
    Body { message: String },

    #[error("request body has already been consumed")]
    BodyConsumed,

    #[error("json error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("invalid header: {source}")]
    InvalidHeader {
        #[from]
        source: http::Error,
    },

    #[error("invalid redirect location '{location}' with status {status}")]
    InvalidRedirect { location: String, status: StatusCode },
}

impl DispatchError {
    pub fn body<E: ToString>(error: E) -> Self {
        Self::Body { message: error.to_string() }
    }

    pub fn invalid_redirect<S: ToString>(location: S, status: StatusCode) -> Self {
        Self::InvalidRedirect { location: location.to_string(), status }
    }
}
