//! Middleware and handler dispatch on top of [`micro_router`].
//!
//! A [`Server`] owns the route tables, the route groups and a pool of [`RequestContext`]s. Every
//! request is matched once, its context is taken from the pool, and the matched route's chain
//! runs on it: the group middleware first, then the route handlers. Each entry returns a [`Flow`]
//! to continue, respond or break.
//!
//! # Example
//!
//! ```no_run
//! use micro_dispatch::{Flow, RequestContext, Server, ServerOptions, handler_fn, log_requests};
//!
//! async fn goals(ctx: &mut RequestContext) -> Flow {
//!     format!("goals of {}", ctx.param("uid").unwrap_or_default()).into()
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let mut server = Server::new(ServerOptions::default().catch_panics(true));
//!     server.use_middleware(log_requests());
//!
//!     let api = server.sub_group("api", "/api");
//!     server.on(&api).get("/x/:uid/goals", handler_fn(goals)).expect("valid route");
//!
//!     server.start("127.0.0.1:8080").await
//! }
//! ```

mod body;
mod chain;
mod context;
mod error;
mod fault;
mod files;
mod group;
mod middleware;
mod responder;
mod serve;
mod server;

pub use body::ResponseBody;
pub use chain::{BoxHandler, Chain, Flow, FnHandler, Handler, HandlerFn, IntoHandlers, SyncHandler, handler_fn, sync_handler_fn};
pub use context::RequestContext;
pub use error::{BoxError, DispatchError};
pub use fault::{Fault, PanicHandler, default_panic_handler};
pub use files::{AllowCors, StaticDir, StaticFile};
pub use group::{Group, join_path};
pub use middleware::{LogRequests, log_requests};
pub use responder::{ErrorMessage, JsonResponse, PlainResponse, Redirect, Responder};
pub use server::{RequestDone, RequestSummary, Routes, Server, ServerOptions};

pub use micro_router::{Lookup, Params, Route, RouteError, RouterOptions};
