//! Response rendering.
//!
//! A [`Responder`] renders itself onto the request context: status, headers and body are
//! buffered there and turned into the outgoing `http::Response` once the chain is over.
//! Returning one from a middleware or handler (as [`Flow::Respond`](crate::Flow::Respond))
//! renders it exactly once and stops the chain.

use crate::context::RequestContext;
use crate::error::DispatchError;
use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::StatusCode;
use mime::Mime;
use serde::Serialize;

/// A value that can render itself as the response of a request.
pub trait Responder: Send {
    /// The status this response is written with.
    fn status(&self) -> StatusCode;

    fn write_to(&self, ctx: &mut RequestContext) -> Result<(), DispatchError>;
}

/// Plain text, `200 OK`.
impl Responder for &'static str {
    fn status(&self) -> StatusCode {
        StatusCode::OK
    }

    fn write_to(&self, ctx: &mut RequestContext) -> Result<(), DispatchError> {
        PlainResponse::write_parts(ctx, StatusCode::OK, &mime::TEXT_PLAIN_UTF_8, self.as_bytes())
    }
}

impl Responder for String {
    fn status(&self) -> StatusCode {
        StatusCode::OK
    }

    fn write_to(&self, ctx: &mut RequestContext) -> Result<(), DispatchError> {
        PlainResponse::write_parts(ctx, StatusCode::OK, &mime::TEXT_PLAIN_UTF_8, self.as_bytes())
    }
}

/// Binary body, `200 OK`.
impl Responder for Bytes {
    fn status(&self) -> StatusCode {
        StatusCode::OK
    }

    fn write_to(&self, ctx: &mut RequestContext) -> Result<(), DispatchError> {
        PlainResponse::write_parts(ctx, StatusCode::OK, &mime::APPLICATION_OCTET_STREAM, self)
    }
}

/// A bare status; error statuses get the JSON error envelope, others their reason phrase.
impl Responder for StatusCode {
    fn status(&self) -> StatusCode {
        *self
    }

    fn write_to(&self, ctx: &mut RequestContext) -> Result<(), DispatchError> {
        if self.is_client_error() || self.is_server_error() {
            return JsonResponse::error(*self).write_to(ctx);
        }

        if *self == StatusCode::NO_CONTENT || *self == StatusCode::NOT_MODIFIED {
            ctx.set_status(*self);
            return Ok(());
        }

        let reason = self.canonical_reason().unwrap_or_default();
        PlainResponse::write_parts(ctx, *self, &mime::TEXT_PLAIN_UTF_8, reason.as_bytes())
    }
}

/// Renders the inner responder with a different status.
impl<R: Responder> Responder for (StatusCode, R) {
    fn status(&self) -> StatusCode {
        self.0
    }

    fn write_to(&self, ctx: &mut RequestContext) -> Result<(), DispatchError> {
        self.1.write_to(ctx)?;
        ctx.set_status(self.0);
        Ok(())
    }
}

/// A response with an explicit content type.
#[derive(Debug, Clone)]
pub struct PlainResponse {
    status: StatusCode,
    content_type: Mime,
    body: Bytes,
}

impl PlainResponse {
    pub fn new(content_type: Mime, body: impl Into<Bytes>) -> Self {
        Self { status: StatusCode::OK, content_type, body: body.into() }
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    fn write_parts(ctx: &mut RequestContext, status: StatusCode, content_type: &Mime, body: &[u8]) -> Result<(), DispatchError> {
        ctx.set_content_type(content_type)?;
        ctx.set_status(status);
        ctx.write(body);
        Ok(())
    }
}

impl Responder for PlainResponse {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn write_to(&self, ctx: &mut RequestContext) -> Result<(), DispatchError> {
        Self::write_parts(ctx, self.status, &self.content_type, &self.body)
    }
}

/// One entry of the `errors` list of a [`JsonResponse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorMessage {
    pub message: String,
}

/// The standard JSON envelope: `{"data": .., "errors": [..], "code": 200, "success": true}`.
///
/// `success` is derived from the status when rendering; empty `data` and `errors` are omitted.
#[derive(Debug, Clone, Serialize)]
pub struct JsonResponse<T = serde_json::Value> {
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<ErrorMessage>,
    code: u16,
    success: bool,
}

impl<T: Serialize> JsonResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { data: Some(data), errors: Vec::new(), code: StatusCode::OK.as_u16(), success: true }
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.code = status.as_u16();
        self
    }
}

impl JsonResponse {
    /// An error envelope carrying the status reason phrase as its only message.
    pub fn error(status: StatusCode) -> Self {
        Self::error_with(status, [status.canonical_reason().unwrap_or("unknown error")])
    }

    pub fn error_with<I, S>(status: StatusCode, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        let errors = messages.into_iter().map(|message| ErrorMessage { message: message.to_string() }).collect();
        Self { data: None, errors, code: status.as_u16(), success: false }
    }
}

impl<T> JsonResponse<T> {
    pub fn errors(&self) -> &[ErrorMessage] {
        &self.errors
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl<T: Serialize + Send> Responder for JsonResponse<T> {
    fn status(&self) -> StatusCode {
        self.status_code()
    }

    fn write_to(&self, ctx: &mut RequestContext) -> Result<(), DispatchError> {
        let status = self.status_code();
        if status == StatusCode::NO_CONTENT {
            ctx.set_status(status);
            return Ok(());
        }

        let envelope = JsonResponse {
            data: self.data.as_ref(),
            errors: self.errors.clone(),
            code: self.code,
            success: status.is_success() || status.is_informational() || status.is_redirection(),
        };
        let body = serde_json::to_vec(&envelope)?;
        PlainResponse::write_parts(ctx, status, &mime::APPLICATION_JSON, &body)
    }
}

/// A redirect to `location`.
#[derive(Debug, Clone)]
pub struct Redirect {
    location: String,
    status: StatusCode,
}

impl Redirect {
    /// `302 Found`, or `301 Moved Permanently` when `permanent` is set.
    pub fn to(location: impl Into<String>, permanent: bool) -> Self {
        let status = if permanent { StatusCode::MOVED_PERMANENTLY } else { StatusCode::FOUND };
        Self::with_status(location, status)
    }

    pub fn with_status(location: impl Into<String>, status: StatusCode) -> Self {
        Self { location: location.into(), status }
    }
}

impl Responder for Redirect {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn write_to(&self, ctx: &mut RequestContext) -> Result<(), DispatchError> {
        if self.location.is_empty() || !self.status.is_redirection() {
            return Err(DispatchError::invalid_redirect(&self.location, self.status));
        }

        let location = HeaderValue::from_str(&self.location).map_err(http::Error::from)?;
        ctx.response_headers_mut().insert(header::LOCATION, location);
        ctx.set_status(self.status);
        ctx.mark_done();
        Ok(())
    }
}
