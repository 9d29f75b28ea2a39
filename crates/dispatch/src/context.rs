//! The per-request context handed to every middleware and handler.
//!
//! A context carries the request head and body, the matched route and its params, a user data
//! map, the buffered response, and the chain cursor. Contexts are pooled by the server: a released
//! context keeps its allocations (params buffer, data map, body buffer) and is reset in place.

use crate::body::ResponseBody;
use crate::chain::{Chain, ChainState, Flow};
use crate::error::{BoxError, DispatchError};
use crate::responder::Responder;
use bytes::{Bytes, BytesMut};
use futures::future::BoxFuture;
use http::header::{self, HeaderName, HeaderValue};
use http::request::Parts;
use http::{Extensions, HeaderMap, Method, Response, StatusCode, Uri, Version};
use http_body_util::BodyExt;
use http_body_util::combinators::UnsyncBoxBody;
use micro_router::{Lookup, Params, Recycle, Route, Router};
use serde::de::DeserializeOwned;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::error;

type RequestBody = UnsyncBoxBody<Bytes, BoxError>;

/// State of a single request while it travels through the chain.
#[derive(Default)]
pub struct RequestContext {
    // request
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    extensions: Extensions,
    body: Mutex<Option<RequestBody>>,
    remote_addr: Option<SocketAddr>,
    query: Vec<(String, String)>,

    // routing
    pub(crate) route: Option<Arc<Route<Chain>>>,
    pub(crate) params: Params,
    allowed: Vec<Method>,

    data: HashMap<String, Box<dyn Any + Send + Sync>>,

    // response
    status: Option<StatusCode>,
    response_headers: HeaderMap,
    response_body: BytesMut,
    bytes_written: usize,
    done: bool,

    pub(crate) chain: ChainState,
}

impl RequestContext {
    /// A context whose params buffer is sized for `max_params` captures.
    pub fn with_capacity(max_params: usize) -> Self {
        Self { params: Params::with_capacity(max_params), ..Self::default() }
    }

    /// Loads the request head and body into a recycled context.
    pub(crate) fn load(&mut self, parts: Parts, body: RequestBody, remote_addr: Option<SocketAddr>) {
        self.method = parts.method;
        self.uri = parts.uri;
        self.version = parts.version;
        self.headers = parts.headers;
        self.extensions = parts.extensions;
        *self.body.get_mut() = Some(body);
        self.remote_addr = remote_addr;

        if let Some(query) = self.uri.query() {
            self.query = serde_urlencoded::from_str(query).unwrap_or_default();
        }
    }

    /// Matches the loaded request against `router`, capturing params into this context.
    pub(crate) fn resolve<'r>(&mut self, router: &'r Router<Chain>) -> Lookup<&'r Arc<Route<Chain>>> {
        router.lookup_into(&self.method, self.uri.path(), &mut self.params)
    }

    pub(crate) fn set_allowed(&mut self, allowed: Vec<Method>) {
        self.allowed = allowed;
    }

    /// Returns the HTTP method of the request
    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the URI of the request
    #[inline]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns the path of the request URI, as sent
    #[inline]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the HTTP headers of the request
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[inline]
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    #[inline]
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    #[inline]
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// The client address, preferring `X-Real-Ip`, then the first `X-Forwarded-For` entry, then
    /// the peer address.
    pub fn client_ip(&self) -> Option<String> {
        let header_str = |name: &str| self.headers.get(name).and_then(|value| value.to_str().ok()).map(str::trim);

        if let Some(ip) = header_str("x-real-ip").filter(|ip| !ip.is_empty()) {
            return Some(ip.to_owned());
        }

        if let Some(forwarded) = header_str("x-forwarded-for") {
            let first = forwarded.split(',').next().map(str::trim).unwrap_or_default();
            if !first.is_empty() {
                return Some(first.to_owned());
            }
        }

        self.remote_addr.map(|addr| addr.ip().to_string())
    }

    /// The matched route, `None` inside the not-found and method-not-allowed handlers.
    #[inline]
    pub fn route(&self) -> Option<&Arc<Route<Chain>>> {
        self.route.as_ref()
    }

    /// The group label of the matched route.
    pub fn group(&self) -> Option<&str> {
        self.route.as_deref().map(Route::group)
    }

    #[inline]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Gets a path parameter by name.
    #[inline]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Methods that would have matched, filled for method-not-allowed requests.
    #[inline]
    pub fn allowed_methods(&self) -> &[Method] {
        &self.allowed
    }

    /// Gets the first query parameter named `name`.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn query_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.query(name).unwrap_or(default)
    }

    /// Stores a value in the request scoped data map, replacing any previous value under `key`.
    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.data.insert(key.into(), Box::new(value));
    }

    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.data.get(key).and_then(|value| value.downcast_ref())
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.data.get_mut(key).and_then(|value| value.downcast_mut())
    }

    pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
        let value = self.data.remove(key)?;
        value.downcast::<T>().ok().map(|value| *value)
    }

    /// Reads the whole request body. The body can only be read once.
    ///
    /// # Errors
    ///
    /// Fails when the body was already taken or the connection fails while reading it.
    pub async fn body_bytes(&mut self) -> Result<Bytes, DispatchError> {
        let body = self.body.get_mut().take().ok_or(DispatchError::BodyConsumed)?;
        let collected = body.collect().await.map_err(DispatchError::body)?;
        Ok(collected.to_bytes())
    }

    /// Reads the request body and deserializes it from JSON.
    ///
    /// # Errors
    ///
    /// See [`RequestContext::body_bytes`]; also fails when the body is not valid JSON for `T`.
    pub async fn body_json<T: DeserializeOwned>(&mut self) -> Result<T, DispatchError> {
        let bytes = self.body_bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Sets the response status. The last call wins.
    #[inline]
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    /// The response status, `200 OK` when none was set.
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    /// The response status if one was set explicitly.
    #[inline]
    pub fn written_status(&self) -> Option<StatusCode> {
        self.status
    }

    /// # Errors
    ///
    /// Fails when the mime type is not a valid header value.
    pub fn set_content_type(&mut self, content_type: &mime::Mime) -> Result<(), DispatchError> {
        self.set_header(header::CONTENT_TYPE, content_type.as_ref())
    }

    /// Sets a response header, replacing previous values.
    ///
    /// # Errors
    ///
    /// Fails when `value` is not a valid header value.
    pub fn set_header<V>(&mut self, name: HeaderName, value: V) -> Result<(), DispatchError>
    where
        V: TryInto<HeaderValue>,
        V::Error: Into<http::Error>,
    {
        let value: HeaderValue = value.try_into().map_err(Into::<http::Error>::into)?;
        self.response_headers.insert(name, value);
        Ok(())
    }

    #[inline]
    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    #[inline]
    pub fn response_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.response_headers
    }

    /// Appends to the response body and marks the context as done, so the rest of the chain is
    /// skipped.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        self.done = true;
        self.bytes_written += bytes.len();
        self.response_body.extend_from_slice(bytes);
        bytes.len()
    }

    pub fn write_str(&mut self, text: &str) -> usize {
        self.write(text.as_bytes())
    }

    /// The response body written so far.
    #[inline]
    pub fn response_body(&self) -> &[u8] {
        &self.response_body
    }

    #[inline]
    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    /// Whether a response has been written; once done, no further middleware or handler runs.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.done
    }

    #[inline]
    pub(crate) fn mark_done(&mut self) {
        self.done = true;
    }

    /// Runs the remaining middleware, then the remaining handlers.
    ///
    /// A middleware awaiting this runs the rest of the chain before continuing with its own code;
    /// the chain is not run a second time once it returns.
    pub fn next(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.next_middleware().await;
            self.next_handler().await;
        })
    }

    /// Runs the remaining middleware until one responds or breaks. A `Break` also skips every handler.
    pub fn next_middleware(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            while !self.done {
                let Some(middleware) = self.chain.next_middleware() else {
                    break;
                };

                match middleware.call(self).await {
                    Flow::Continue => {}
                    Flow::Respond(responder) => {
                        self.render(responder.as_ref());
                        break;
                    }
                    Flow::Break => {
                        self.chain.close_handlers();
                        break;
                    }
                }
            }
            self.chain.close_middleware();
        })
    }

    /// Runs the remaining handlers until one responds or breaks.
    pub fn next_handler(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            while !self.done {
                let Some(handler) = self.chain.next_handler() else {
                    break;
                };

                match handler.call(self).await {
                    Flow::Continue => {}
                    Flow::Respond(responder) => {
                        self.render(responder.as_ref());
                        break;
                    }
                    Flow::Break => break,
                }
            }
            self.chain.close_handlers();
        })
    }

    /// Renders `responder` and stops the chain.
    pub fn render(&mut self, responder: &dyn Responder) {
        if let Err(e) = responder.write_to(self) {
            error!(cause = %e, method = %self.method, path = self.uri.path(), "failed to render response");
        }
        self.done = true;
        self.chain.halt();
    }

    /// Stops the chain without touching the response.
    pub(crate) fn halt(&mut self) {
        self.chain.halt();
    }

    /// Drops any partial response.
    pub(crate) fn reset_response(&mut self) {
        self.status = None;
        self.response_headers.clear();
        self.response_body.clear();
        self.bytes_written = 0;
        self.done = false;
    }

    /// Moves the buffered response out, without a body when `strip_body` is set.
    pub(crate) fn take_response(&mut self, strip_body: bool) -> Response<ResponseBody> {
        let body = if strip_body {
            self.response_body.clear();
            ResponseBody::empty()
        } else {
            ResponseBody::once(self.response_body.split().freeze())
        };

        let mut response = Response::new(body);
        *response.status_mut() = self.status();
        *response.headers_mut() = mem::take(&mut self.response_headers);
        response
    }
}

impl Recycle for RequestContext {
    fn recycle(&mut self) {
        self.method = Method::default();
        self.uri = Uri::default();
        self.version = Version::default();
        self.headers.clear();
        self.extensions.clear();
        *self.body.get_mut() = None;
        self.remote_addr = None;
        self.query.clear();

        self.route = None;
        self.params.recycle();
        self.allowed.clear();

        // keep the map allocation
        self.data.clear();

        self.reset_response();
        self.chain = ChainState::default();
    }

    fn pool_key(&self) -> usize {
        self.params.sized_for()
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("params", &self.params)
            .field("status", &self.status())
            .field("bytes_written", &self.bytes_written)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
