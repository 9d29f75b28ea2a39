use http::Method;
use thiserror::Error;

/// Errors raised while registering a route.
///
/// All of them are setup-time errors: a pattern that fails here never reaches the matcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("too many wildcards in pattern '{pattern}', at most one is allowed")]
    TooManyWildcards { pattern: String },

    #[error("wildcard must be the last segment of pattern '{pattern}'")]
    WildcardNotLast { pattern: String },

    #[error("unsupported http method: {method}")]
    UnsupportedMethod { method: Method },
}

impl RouteError {
    pub fn too_many_wildcards<S: ToString>(pattern: S) -> Self {
        Self::TooManyWildcards { pattern: pattern.to_string() }
    }

    pub fn wildcard_not_last<S: ToString>(pattern: S) -> Self {
        Self::WildcardNotLast { pattern: pattern.to_string() }
    }

    pub fn unsupported_method(method: &Method) -> Self {
        Self::UnsupportedMethod { method: method.clone() }
    }
}
