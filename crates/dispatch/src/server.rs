//! The request entry point: groups and routes are registered here, and every request is matched,
//! given a pooled context and run through its chain.

use crate::body::ResponseBody;
use crate::chain::{BoxHandler, Chain, ChainState, Flow, Handler, IntoHandlers, sync_handler_fn};
use crate::context::RequestContext;
use crate::error::BoxError;
use crate::fault::{Fault, PanicHandler, default_panic_handler, install_panic_hook};
use crate::files::{AllowCors, FILE_PARAM, StaticDir, StaticFile};
use crate::group::{Group, join_path};
use bytes::Bytes;
use futures::FutureExt;
use http::header::{self, HeaderValue};
use http::{Method, Request, Response, StatusCode};
use http_body::Body as HttpBody;
use http_body_util::BodyExt;
use micro_router::{Lookup, Pool, Route, RouteError, Router, RouterOptions};
use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Instrument, Span, info_span, warn};

/// What the request-done callback is told about a finished request.
#[derive(Debug)]
pub struct RequestSummary<'a> {
    pub group: &'a str,
    pub method: &'a Method,
    pub path: &'a str,
    pub status: StatusCode,
    pub elapsed: Duration,
}

pub type RequestDone = Arc<dyn Fn(&RequestSummary<'_>) + Send + Sync>;

/// Server wide switches. Everything but the callback can be loaded with serde.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerOptions {
    pub router: RouterOptions,
    /// Catch panics raised by middleware and handlers and answer them with the panic handler.
    pub catch_panics: bool,
    /// Run every matched request inside a `request` span labelled with group, method and uri.
    pub profile_labels: bool,
    /// Called after every matched request.
    #[serde(skip)]
    pub on_request_done: Option<RequestDone>,
}

impl ServerOptions {
    #[must_use]
    pub fn router(mut self, router: RouterOptions) -> Self {
        self.router = router;
        self
    }

    #[must_use]
    pub fn catch_panics(mut self, enabled: bool) -> Self {
        self.catch_panics = enabled;
        self
    }

    #[must_use]
    pub fn profile_labels(mut self, enabled: bool) -> Self {
        self.profile_labels = enabled;
        self
    }

    #[must_use]
    pub fn on_request_done<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RequestSummary<'_>) + Send + Sync + 'static,
    {
        self.on_request_done = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for ServerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerOptions")
            .field("router", &self.router)
            .field("catch_panics", &self.catch_panics)
            .field("profile_labels", &self.profile_labels)
            .field("on_request_done", &self.on_request_done.is_some())
            .finish()
    }
}

/// Routes, fallback handlers and the context pool.
///
/// Registration needs `&mut self` and happens before serving; [`Server::handle`] only needs
/// `&self`, so a configured server is usually shared behind an `Arc`.
pub struct Server {
    router: Router<Chain>,
    options: ServerOptions,
    root: Group,
    not_found: BoxHandler,
    method_not_allowed: BoxHandler,
    panic_handler: PanicHandler,
    contexts: Pool<RequestContext>,
}

fn not_found(_ctx: &mut RequestContext) -> Flow {
    StatusCode::NOT_FOUND.into()
}

fn method_not_allowed(_ctx: &mut RequestContext) -> Flow {
    StatusCode::METHOD_NOT_ALLOWED.into()
}

impl Default for Server {
    fn default() -> Self {
        Self::new(ServerOptions::default())
    }
}

impl Server {
    pub fn new(options: ServerOptions) -> Self {
        if options.catch_panics {
            install_panic_hook();
        }

        Self {
            router: Router::new(options.router),
            options,
            root: Group::root(),
            not_found: Arc::new(sync_handler_fn(not_found)),
            method_not_allowed: Arc::new(sync_handler_fn(method_not_allowed)),
            panic_handler: Arc::new(default_panic_handler),
            contexts: Pool::new(0),
        }
    }

    #[inline]
    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    #[inline]
    pub fn router(&self) -> &Router<Chain> {
        &self.router
    }

    /// The root group: no name, no path prefix.
    #[inline]
    pub fn root(&self) -> &Group {
        &self.root
    }

    /// Adds a middleware to the root group.
    pub fn use_middleware<H: Handler + 'static>(&self, middleware: H) {
        self.root.use_middleware(middleware);
    }

    /// Creates a group under the root.
    pub fn sub_group(&self, name: &str, path: &str) -> Group {
        self.root.sub_group(name, path)
    }

    /// Starts registering routes on `group`.
    pub fn on(&mut self, group: &Group) -> Routes<'_> {
        Routes { server: self, group: group.clone() }
    }

    /// Iterates every registered route.
    pub fn routes(&self) -> impl Iterator<Item = &Arc<Route<Chain>>> {
        self.router.routes()
    }

    /// Disables or re-enables the route an absolute `path` resolves to.
    pub fn disable_route(&self, method: &Method, path: &str, disabled: bool) -> bool {
        self.router.disable_route(method, path, disabled)
    }

    /// Answers CORS preflight requests on `path` of the root group, allowing `methods`.
    ///
    /// # Errors
    ///
    /// See [`Routes::add_route`].
    pub fn allow_cors(&mut self, path: &str, methods: &[Method]) -> Result<Arc<Route<Chain>>, RouteError> {
        let root = self.root.clone();
        self.on(&root).allow_cors(path, methods)
    }

    /// Replaces the handler answering requests no route matches.
    pub fn not_found<H: Handler + 'static>(&mut self, handler: H) {
        self.not_found = Arc::new(handler);
    }

    /// Replaces the handler answering requests whose path only matches under other methods.
    /// The `Allow` header is already set when it runs.
    pub fn method_not_allowed<H: Handler + 'static>(&mut self, handler: H) {
        self.method_not_allowed = Arc::new(handler);
    }

    /// Replaces the handler for caught panics; only used when `catch_panics` is on.
    pub fn panic_handler<F>(&mut self, handler: F)
    where
        F: Fn(&mut RequestContext, &Fault) + Send + Sync + 'static,
    {
        self.panic_handler = Arc::new(handler);
    }

    fn add_route(&mut self, group: &Group, method: Method, path: &str, handlers: Vec<BoxHandler>) -> Result<Arc<Route<Chain>>, RouteError> {
        let pattern = group.join(path);
        let route = self.router.add_route(group.name(), method, &pattern, group.chain(handlers))?;
        self.contexts.set_key(self.router.max_params());
        Ok(route)
    }

    /// Runs one request through matching and its chain.
    ///
    /// Without `catch_panics` a panic raised by the chain propagates to the caller; the pooled
    /// context is released on the way out either way.
    pub async fn handle<B>(&self, request: Request<B>, remote_addr: Option<SocketAddr>) -> Response<ResponseBody>
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let start = Instant::now();
        let (parts, body) = request.into_parts();
        let strip_body = parts.method == Method::HEAD;

        let mut guard = self.contexts.acquire(RequestContext::with_capacity);
        let ctx = &mut *guard;
        ctx.load(parts, body.map_err(Into::into).boxed_unsync(), remote_addr);

        let group = match ctx.resolve(&self.router) {
            Lookup::Found(route) => {
                ctx.chain = route.value().state();
                ctx.route = Some(Arc::clone(route));
                Some(route.group())
            }
            Lookup::MethodNotAllowed { allowed } => {
                let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
                match HeaderValue::from_str(&allow) {
                    Ok(allow) => {
                        ctx.response_headers_mut().insert(header::ALLOW, allow);
                    }
                    Err(e) => warn!(cause = %e, "invalid allow header"),
                }
                ctx.set_allowed(allowed);
                ctx.chain = ChainState::single(&self.method_not_allowed);
                None
            }
            Lookup::NotFound => {
                ctx.chain = ChainState::single(&self.not_found);
                None
            }
        };

        let span = match group {
            Some(group) if self.options.profile_labels => {
                info_span!("request", group, method = %ctx.method(), uri = %ctx.uri())
            }
            _ => Span::none(),
        };
        self.dispatch(ctx).instrument(span).await;

        if let (Some(callback), Some(group)) = (&self.options.on_request_done, group) {
            callback(&RequestSummary {
                group,
                method: ctx.method(),
                path: ctx.params().path(),
                status: ctx.status(),
                elapsed: start.elapsed(),
            });
        }

        ctx.take_response(strip_body)
    }

    async fn dispatch(&self, ctx: &mut RequestContext) {
        if !self.options.catch_panics {
            ctx.next().await;
            return;
        }

        let outcome = AssertUnwindSafe(ctx.next()).catch_unwind().await;
        if let Err(payload) = outcome {
            let fault = Fault::from_panic(&*payload);
            ctx.halt();
            ctx.reset_response();
            (self.panic_handler)(ctx, &fault);
        }
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("router", &self.router)
            .field("options", &self.options)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

/// Route registration on one group, see [`Server::on`].
pub struct Routes<'s> {
    server: &'s mut Server,
    group: Group,
}

impl Routes<'_> {
    /// Registers `handlers` for `method` on the group's path joined with `path`.
    ///
    /// # Errors
    ///
    /// Fails when the pattern is invalid or the method is not supported.
    pub fn add_route(&mut self, method: Method, path: &str, handlers: impl IntoHandlers) -> Result<Arc<Route<Chain>>, RouteError> {
        self.server.add_route(&self.group, method, path, handlers.into_handlers())
    }

    /// # Errors
    ///
    /// See [`Routes::add_route`].
    pub fn get(&mut self, path: &str, handlers: impl IntoHandlers) -> Result<Arc<Route<Chain>>, RouteError> {
        self.add_route(Method::GET, path, handlers)
    }

    /// # Errors
    ///
    /// See [`Routes::add_route`].
    pub fn head(&mut self, path: &str, handlers: impl IntoHandlers) -> Result<Arc<Route<Chain>>, RouteError> {
        self.add_route(Method::HEAD, path, handlers)
    }

    /// # Errors
    ///
    /// See [`Routes::add_route`].
    pub fn post(&mut self, path: &str, handlers: impl IntoHandlers) -> Result<Arc<Route<Chain>>, RouteError> {
        self.add_route(Method::POST, path, handlers)
    }

    /// # Errors
    ///
    /// See [`Routes::add_route`].
    pub fn put(&mut self, path: &str, handlers: impl IntoHandlers) -> Result<Arc<Route<Chain>>, RouteError> {
        self.add_route(Method::PUT, path, handlers)
    }

    /// # Errors
    ///
    /// See [`Routes::add_route`].
    pub fn patch(&mut self, path: &str, handlers: impl IntoHandlers) -> Result<Arc<Route<Chain>>, RouteError> {
        self.add_route(Method::PATCH, path, handlers)
    }

    /// # Errors
    ///
    /// See [`Routes::add_route`].
    pub fn delete(&mut self, path: &str, handlers: impl IntoHandlers) -> Result<Arc<Route<Chain>>, RouteError> {
        self.add_route(Method::DELETE, path, handlers)
    }

    /// # Errors
    ///
    /// See [`Routes::add_route`].
    pub fn options(&mut self, path: &str, handlers: impl IntoHandlers) -> Result<Arc<Route<Chain>>, RouteError> {
        self.add_route(Method::OPTIONS, path, handlers)
    }

    /// # Errors
    ///
    /// See [`Routes::add_route`].
    pub fn connect(&mut self, path: &str, handlers: impl IntoHandlers) -> Result<Arc<Route<Chain>>, RouteError> {
        self.add_route(Method::CONNECT, path, handlers)
    }

    /// # Errors
    ///
    /// See [`Routes::add_route`].
    pub fn trace(&mut self, path: &str, handlers: impl IntoHandlers) -> Result<Arc<Route<Chain>>, RouteError> {
        self.add_route(Method::TRACE, path, handlers)
    }

    /// Serves the files below `dir` under `path`, through a `GET {path}/*fp` route. HEAD requests
    /// are answered by the same route when `head_to_get` is on; a directory serves its
    /// `index.html`.
    ///
    /// # Errors
    ///
    /// See [`Routes::add_route`].
    pub fn static_dir(&mut self, path: &str, dir: impl Into<PathBuf>) -> Result<Arc<Route<Chain>>, RouteError> {
        let pattern = join_path(path.trim_end_matches('/'), &format!("*{FILE_PARAM}"));
        self.add_route(Method::GET, &pattern, StaticDir::new(dir))
    }

    /// Serves a single file under `path`.
    ///
    /// # Errors
    ///
    /// See [`Routes::add_route`].
    pub fn static_file(&mut self, path: &str, file: impl Into<PathBuf>) -> Result<Arc<Route<Chain>>, RouteError> {
        self.add_route(Method::GET, path, StaticFile::new(file))
    }

    /// Answers CORS preflight requests on `path`, allowing `methods`.
    ///
    /// # Errors
    ///
    /// See [`Routes::add_route`].
    pub fn allow_cors(&mut self, path: &str, methods: &[Method]) -> Result<Arc<Route<Chain>>, RouteError> {
        self.add_route(Method::OPTIONS, path, AllowCors::new(methods))
    }

    /// Disables or re-enables the route `path` resolves to on this group.
    pub fn disable_route(&self, method: &Method, path: &str, disabled: bool) -> bool {
        self.server.router.disable_route(method, &self.group.join(path), disabled)
    }
}

impl fmt::Debug for Routes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Routes").field("group", &self.group).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{Server, ServerOptions};
    use crate::body::ResponseBody;
    use crate::chain::{BoxHandler, Flow, Handler, handler_fn, sync_handler_fn};
    use crate::context::RequestContext;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::FutureExt;
    use http::header::{ALLOW, CONTENT_TYPE};
    use http::{HeaderValue, Method, Request, Response, StatusCode};
    use http_body_util::{BodyExt, Full};
    use serde_json::json;
    use std::panic::AssertUnwindSafe;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct Count(Arc<AtomicUsize>);

    #[async_trait]
    impl Handler for Count {
        async fn call(&self, _ctx: &mut RequestContext) -> Flow {
            self.0.fetch_add(1, Ordering::SeqCst);
            Flow::Continue
        }
    }

    /// Appends `label` to the `x-trace` response header.
    struct Trace(&'static str);

    #[async_trait]
    impl Handler for Trace {
        async fn call(&self, ctx: &mut RequestContext) -> Flow {
            ctx.response_headers_mut().append("x-trace", HeaderValue::from_static(self.0));
            Flow::Continue
        }
    }

    async fn ok(_ctx: &mut RequestContext) -> Flow {
        "ok".into()
    }

    async fn echo_uid(ctx: &mut RequestContext) -> Flow {
        ctx.param("uid").unwrap_or_default().to_string().into()
    }

    async fn wrap(ctx: &mut RequestContext) -> Flow {
        ctx.response_headers_mut().append("x-trace", HeaderValue::from_static("wrap-before"));
        ctx.next().await;
        ctx.response_headers_mut().append("x-trace", HeaderValue::from_static("wrap-after"));
        Flow::Continue
    }

    async fn request(server: &Server, method: Method, uri: &str) -> Response<ResponseBody> {
        let request = Request::builder().method(method).uri(uri).body(Full::new(Bytes::new())).unwrap();
        server.handle(request, None).await
    }

    async fn read_body(response: Response<ResponseBody>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    fn trace(response: &Response<ResponseBody>) -> Vec<&str> {
        response.headers().get_all("x-trace").iter().map(|value| value.to_str().unwrap()).collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_params_reach_handler() {
        let mut server = Server::default();
        let root = server.root().clone();
        server.on(&root).get("/x/:uid/members", handler_fn(ok)).unwrap();
        server.on(&root).get("/x/:uid/goals", handler_fn(echo_uid)).unwrap();

        let response = request(&server, Method::GET, "/x/1034/goals").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_body(response).await, "1034");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_middleware_respond_short_circuits() {
        async fn deny(_ctx: &mut RequestContext) -> Flow {
            (StatusCode::FORBIDDEN, "denied").into()
        }

        let later = Arc::new(AtomicUsize::new(0));
        let handled = Arc::new(AtomicUsize::new(0));

        let mut server = Server::default();
        server.use_middleware(handler_fn(deny));
        server.use_middleware(Count(Arc::clone(&later)));
        let root = server.root().clone();
        let handlers: Vec<BoxHandler> = vec![Arc::new(Count(Arc::clone(&handled))), Arc::new(handler_fn(ok))];
        server.on(&root).get("/secret", handlers).unwrap();

        let response = request(&server, Method::GET, "/secret").await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(read_body(response).await, "denied");
        assert_eq!(later.load(Ordering::SeqCst), 0);
        assert_eq!(handled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_middleware_break_writes_nothing() {
        async fn observe(ctx: &mut RequestContext) -> Flow {
            ctx.next().await;
            let written = if ctx.written_status().is_some() { "status" } else { "none" };
            let bytes = ctx.bytes_written();
            ctx.response_headers_mut().insert("x-written", HeaderValue::from_static(written));
            ctx.response_headers_mut().insert("x-bytes", bytes.into());
            Flow::Continue
        }

        let handled = Arc::new(AtomicUsize::new(0));

        let mut server = Server::default();
        server.use_middleware(handler_fn(observe));
        server.use_middleware(sync_handler_fn(|_ctx: &mut RequestContext| Flow::Break));
        let root = server.root().clone();
        server.on(&root).get("/quiet", Count(Arc::clone(&handled))).unwrap();

        let response = request(&server, Method::GET, "/quiet").await;
        assert_eq!(response.headers()["x-written"], "none");
        assert_eq!(response.headers()["x-bytes"], "0");
        assert!(response.headers().get(CONTENT_TYPE).is_none());
        assert_eq!(handled.load(Ordering::SeqCst), 0);
        assert!(read_body(response).await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_handler_respond_stops_later_handlers() {
        let handled = Arc::new(AtomicUsize::new(0));

        let mut server = Server::default();
        let root = server.root().clone();
        let handlers: Vec<BoxHandler> = vec![Arc::new(handler_fn(ok)), Arc::new(Count(Arc::clone(&handled)))];
        server.on(&root).get("/", handlers).unwrap();

        let response = request(&server, Method::GET, "/").await;
        assert_eq!(read_body(response).await, "ok");
        assert_eq!(handled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_wrapping_middleware_runs_chain_once() {
        let handled = Arc::new(AtomicUsize::new(0));

        let mut server = Server::default();
        server.use_middleware(handler_fn(wrap));
        server.use_middleware(Trace("inner"));
        let root = server.root().clone();
        let handlers: Vec<BoxHandler> = vec![Arc::new(Count(Arc::clone(&handled))), Arc::new(Trace("handler")), Arc::new(handler_fn(ok))];
        server.on(&root).get("/wrapped", handlers).unwrap();

        let response = request(&server, Method::GET, "/wrapped").await;
        assert_eq!(trace(&response), vec!["wrap-before", "inner", "handler", "wrap-after"]);
        assert_eq!(handled.load(Ordering::SeqCst), 1);
        assert_eq!(read_body(response).await, "ok");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_group_middleware() {
        let mut server = Server::default();
        server.use_middleware(Trace("root"));
        let root = server.root().clone();
        let api = server.sub_group("api", "/api");
        api.use_middleware(Trace("api"));

        server.on(&root).get("/ping", handler_fn(ok)).unwrap();
        let route = server.on(&api).get("/ping", handler_fn(ok)).unwrap();
        assert_eq!(route.path(), "/api/ping");
        assert_eq!(route.group(), "api");

        // registered before, still applies
        api.use_middleware(Trace("late"));

        let response = request(&server, Method::GET, "/api/ping").await;
        assert_eq!(trace(&response), vec!["root", "api", "late"]);

        let response = request(&server, Method::GET, "/ping").await;
        assert_eq!(trace(&response), vec!["root"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_not_found_and_method_not_allowed() {
        let mut server = Server::default();
        let root = server.root().clone();
        server.on(&root).get("/items/:id", handler_fn(ok)).unwrap();
        server.on(&root).delete("/items/:id", handler_fn(ok)).unwrap();

        let response = request(&server, Method::GET, "/nothing").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = serde_json::from_slice(&read_body(response).await).unwrap();
        assert_eq!(body, json!({"errors": [{"message": "Not Found"}], "code": 404, "success": false}));

        let response = request(&server, Method::POST, "/items/1").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET, DELETE, HEAD");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_custom_not_found() {
        async fn missing(ctx: &mut RequestContext) -> Flow {
            assert!(ctx.route().is_none());
            (StatusCode::NOT_FOUND, format!("no page at {}", ctx.path())).into()
        }

        let mut server = Server::default();
        server.not_found(handler_fn(missing));

        let response = request(&server, Method::GET, "/gone").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(read_body(response).await, "no page at /gone");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_head_uses_get_route_without_body() {
        let mut server = Server::default();
        let root = server.root().clone();
        server.on(&root).get("/page", handler_fn(ok)).unwrap();

        let response = request(&server, Method::HEAD, "/page").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert!(read_body(response).await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_panic_is_answered_once() {
        async fn explode(ctx: &mut RequestContext) -> Flow {
            ctx.set_status(StatusCode::ACCEPTED);
            ctx.response_headers_mut().insert("x-partial", HeaderValue::from_static("1"));
            panic!("handler exploded");
        }

        let mut server = Server::new(ServerOptions::default().catch_panics(true));
        let root = server.root().clone();
        server.on(&root).get("/explode", handler_fn(explode)).unwrap();
        server.on(&root).get("/ok", handler_fn(ok)).unwrap();

        let response = request(&server, Method::GET, "/explode").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get("x-partial").is_none());
        let body: serde_json::Value = serde_json::from_slice(&read_body(response).await).unwrap();
        assert_eq!(body, json!({"errors": [{"message": "internal server error"}], "code": 500, "success": false}));

        let response = request(&server, Method::GET, "/ok").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_body(response).await, "ok");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_custom_panic_handler() {
        async fn explode(_ctx: &mut RequestContext) -> Flow {
            panic!("custom");
        }

        let mut server = Server::new(ServerOptions::default().catch_panics(true));
        server.panic_handler(|ctx, fault| {
            let message = format!("caught: {}", fault.message());
            ctx.render(&(StatusCode::SERVICE_UNAVAILABLE, message));
        });
        let root = server.root().clone();
        server.on(&root).get("/explode", handler_fn(explode)).unwrap();

        let response = request(&server, Method::GET, "/explode").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(read_body(response).await, "caught: custom");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_uncaught_panic_propagates() {
        async fn explode(_ctx: &mut RequestContext) -> Flow {
            panic!("uncaught");
        }

        let mut server = Server::default();
        let root = server.root().clone();
        server.on(&root).get("/explode", handler_fn(explode)).unwrap();
        server.on(&root).get("/ok", handler_fn(ok)).unwrap();

        let outcome = AssertUnwindSafe(request(&server, Method::GET, "/explode")).catch_unwind().await;
        assert!(matches!(outcome, Err(_)));

        let response = request(&server, Method::GET, "/ok").await;
        assert_eq!(read_body(response).await, "ok");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_user_data_does_not_leak() {
        async fn visit(ctx: &mut RequestContext) -> Flow {
            let seen = ctx.get::<u32>("seen").is_some();
            ctx.set("seen", 1_u32);
            if seen { "dirty".into() } else { "clean".into() }
        }

        let mut server = Server::default();
        let root = server.root().clone();
        server.on(&root).get("/visit", handler_fn(visit)).unwrap();

        for _ in 0..3 {
            let response = request(&server, Method::GET, "/visit").await;
            assert_eq!(read_body(response).await, "clean");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_disable_route() {
        let mut server = Server::default();
        let api = server.sub_group("api", "/api");
        server.on(&api).get("/ping", handler_fn(ok)).unwrap();

        assert!(server.on(&api).disable_route(&Method::GET, "/ping", true));
        assert_eq!(request(&server, Method::GET, "/api/ping").await.status(), StatusCode::NOT_FOUND);

        assert!(server.disable_route(&Method::GET, "/api/ping", false));
        assert_eq!(request(&server, Method::GET, "/api/ping").await.status(), StatusCode::OK);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_request_done_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let options = ServerOptions::default().profile_labels(true).on_request_done(move |summary| {
            sink.lock().unwrap().push((summary.group.to_string(), summary.method.clone(), summary.path.to_string(), summary.status));
        });

        let mut server = Server::new(options);
        let admin = server.sub_group("admin", "/admin");
        server.on(&admin).post("/stats", handler_fn(ok)).unwrap();

        request(&server, Method::POST, "/admin/./stats/").await;
        request(&server, Method::GET, "/missing").await;

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![("admin".to_string(), Method::POST, "/admin/stats".to_string(), StatusCode::OK)]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_keep_params_apart() {
        let mut server = Server::default();
        let root = server.root().clone();
        server.on(&root).get("/x/:uid/goals", handler_fn(echo_uid)).unwrap();
        let server = Arc::new(server);

        let tasks: Vec<_> = (0..64)
            .map(|i| {
                let server = Arc::clone(&server);
                tokio::spawn(async move {
                    let response = request(&server, Method::GET, &format!("/x/{i}/goals")).await;
                    assert_eq!(read_body(response).await, i.to_string());
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_static_dir() {
        let dir = tempfile::tempdir().unwrap();
        let public = dir.path().join("public");
        std::fs::create_dir_all(public.join("css")).unwrap();
        std::fs::write(public.join("css/site.css"), "body {}").unwrap();
        std::fs::write(public.join("index.html"), "<h1>home</h1>").unwrap();
        std::fs::write(dir.path().join("outside.txt"), "secret").unwrap();

        let mut server = Server::default();
        let assets = server.sub_group("assets", "/assets");
        let route = server.on(&assets).static_dir("/", &public).unwrap();
        assert_eq!(route.path(), "/assets/*fp");

        let response = request(&server, Method::GET, "/assets/css/site.css").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/css; charset=utf-8");
        assert_eq!(read_body(response).await, "body {}");

        let response = request(&server, Method::GET, "/assets/").await;
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(read_body(response).await, "<h1>home</h1>");

        let response = request(&server, Method::HEAD, "/assets/css/site.css").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(read_body(response).await.is_empty());

        assert_eq!(request(&server, Method::GET, "/assets/missing.js").await.status(), StatusCode::NOT_FOUND);
        assert_eq!(request(&server, Method::GET, "/assets/%2E%2E/outside.txt").await.status(), StatusCode::NOT_FOUND);
        assert_eq!(request(&server, Method::GET, "/assets/..%2Foutside.txt").await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_static_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("robots.txt");
        std::fs::write(&file, "User-agent: *").unwrap();

        let mut server = Server::default();
        let root = server.root().clone();
        server.on(&root).static_file("/robots.txt", &file).unwrap();
        server.on(&root).static_file("/gone.txt", dir.path().join("gone.txt")).unwrap();

        let response = request(&server, Method::GET, "/robots.txt").await;
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(read_body(response).await, "User-agent: *");

        assert_eq!(request(&server, Method::GET, "/gone.txt").await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_allow_cors() {
        let mut server = Server::default();
        let root = server.root().clone();
        server.on(&root).put("/items/:id", handler_fn(ok)).unwrap();
        server.allow_cors("/items/:id", &[Method::GET, Method::PUT]).unwrap();

        let preflight = Request::builder()
            .method(Method::OPTIONS)
            .uri("/items/7")
            .header("origin", "https://example.com")
            .header("access-control-request-headers", "content-type")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = server.handle(preflight, None).await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()["access-control-allow-origin"], "https://example.com");
        assert_eq!(response.headers()["access-control-allow-methods"], "GET, PUT");
        assert_eq!(response.headers()["access-control-allow-headers"], "content-type");
        assert!(read_body(response).await.is_empty());

        let response = request(&server, Method::OPTIONS, "/items/7").await;
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }

    #[test]
    fn test_options_deserialize() {
        let options: ServerOptions = serde_json::from_str(r#"{"catch_panics": true, "router": {"head_to_get": false}}"#).unwrap();
        assert!(options.catch_panics);
        assert!(!options.profile_labels);
        assert!(!options.router.head_to_get);
        assert!(options.router.auto_clean_path);
        assert!(options.on_request_done.is_none());
    }
}
