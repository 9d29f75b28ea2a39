//! Handler chain primitives.
//!
//! A route stores its group's middleware list together with its own handlers. At request time
//! the list pair is turned into a [`ChainState`] inside the request context and driven by
//! [`RequestContext::next`], which runs middleware first and handlers second, each list in
//! registration order, until one of them responds or breaks.

use crate::context::RequestContext;
use crate::responder::Responder;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// What a middleware or handler wants to happen next.
pub enum Flow {
    /// Keep going with the next entry of the chain.
    Continue,
    /// Render this response and stop the chain.
    Respond(Box<dyn Responder>),
    /// Stop the chain without writing anything.
    Break,
}

impl Flow {
    pub fn respond<R: Responder + 'static>(responder: R) -> Self {
        Flow::Respond(Box::new(responder))
    }
}

impl<R: Responder + 'static> From<R> for Flow {
    fn from(responder: R) -> Self {
        Flow::respond(responder)
    }
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flow::Continue => f.write_str("Continue"),
            Flow::Respond(responder) => f.debug_tuple("Respond").field(&responder.status()).finish(),
            Flow::Break => f.write_str("Break"),
        }
    }
}

/// A middleware or handler.
///
/// Both share one signature; the only difference is the list they are registered in.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, ctx: &mut RequestContext) -> Flow;
}

pub type BoxHandler = Arc<dyn Handler>;

/// An async function usable as a [`Handler`], see [`handler_fn`].
pub trait HandlerFn<'ctx>: Send + Sync {
    type Future: Future<Output = Flow> + Send + 'ctx;

    fn invoke(&self, ctx: &'ctx mut RequestContext) -> Self::Future;
}

impl<'ctx, F, Fut> HandlerFn<'ctx> for F
where
    F: Fn(&'ctx mut RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = Flow> + Send + 'ctx,
{
    type Future = Fut;

    #[inline]
    fn invoke(&self, ctx: &'ctx mut RequestContext) -> Self::Future {
        (self)(ctx)
    }
}

/// a `HandlerFn` holder
pub struct FnHandler<F> {
    f: F,
}

/// Wraps an `async fn(&mut RequestContext) -> Flow` item into a handler.
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: for<'ctx> HandlerFn<'ctx>,
{
    FnHandler { f }
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: for<'ctx> HandlerFn<'ctx>,
{
    async fn call(&self, ctx: &mut RequestContext) -> Flow {
        self.f.invoke(ctx).await
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnHandler")
    }
}

/// A handler made of a plain closure that never awaits.
pub struct SyncHandler<F> {
    f: F,
}

/// Wraps a `Fn(&mut RequestContext) -> Flow` closure into a handler.
pub fn sync_handler_fn<F>(f: F) -> SyncHandler<F>
where
    F: Fn(&mut RequestContext) -> Flow + Send + Sync,
{
    SyncHandler { f }
}

#[async_trait]
impl<F> Handler for SyncHandler<F>
where
    F: Fn(&mut RequestContext) -> Flow + Send + Sync,
{
    async fn call(&self, ctx: &mut RequestContext) -> Flow {
        (self.f)(ctx)
    }
}

impl<F> fmt::Debug for SyncHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SyncHandler")
    }
}

/// Anything that can be registered as the handler list of a route.
pub trait IntoHandlers {
    fn into_handlers(self) -> Vec<BoxHandler>;
}

impl<H: Handler + 'static> IntoHandlers for H {
    fn into_handlers(self) -> Vec<BoxHandler> {
        vec![Arc::new(self)]
    }
}

impl IntoHandlers for Vec<BoxHandler> {
    fn into_handlers(self) -> Vec<BoxHandler> {
        self
    }
}

/// The value stored with every route: the group middleware, read at dispatch time, and the
/// route's own handlers.
pub struct Chain {
    middleware: Arc<ArcSwap<Vec<BoxHandler>>>,
    handlers: Arc<[BoxHandler]>,
}

impl Chain {
    pub(crate) fn new(middleware: Arc<ArcSwap<Vec<BoxHandler>>>, handlers: Vec<BoxHandler>) -> Self {
        Self { middleware, handlers: handlers.into() }
    }

    /// Number of middleware currently attached through the route's group.
    pub fn middleware_len(&self) -> usize {
        self.middleware.load().len()
    }

    pub fn handlers_len(&self) -> usize {
        self.handlers.len()
    }

    pub(crate) fn state(&self) -> ChainState {
        ChainState::new(self.middleware.load_full(), Arc::clone(&self.handlers))
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("middleware", &self.middleware_len())
            .field("handlers", &self.handlers_len())
            .finish()
    }
}

/// Cursor over the two lists of a chain.
///
/// Each list is open until it has been driven once; a middleware `Break` closes the handler list
/// before it ever opens.
pub(crate) struct ChainState {
    middleware: Arc<Vec<BoxHandler>>,
    handlers: Arc<[BoxHandler]>,
    middleware_index: usize,
    handler_index: usize,
    middleware_open: bool,
    handlers_open: bool,
}

impl ChainState {
    pub(crate) fn new(middleware: Arc<Vec<BoxHandler>>, handlers: Arc<[BoxHandler]>) -> Self {
        Self { middleware, handlers, middleware_index: 0, handler_index: 0, middleware_open: true, handlers_open: true }
    }

    /// A chain made of a single handler, used for the fallback handlers.
    pub(crate) fn single(handler: &BoxHandler) -> Self {
        Self::new(Arc::default(), Arc::from([Arc::clone(handler)]))
    }

    pub(crate) fn next_middleware(&mut self) -> Option<BoxHandler> {
        if !self.middleware_open {
            return None;
        }
        let handler = self.middleware.get(self.middleware_index).cloned();
        self.middleware_index += 1;
        handler
    }

    pub(crate) fn next_handler(&mut self) -> Option<BoxHandler> {
        if !self.handlers_open {
            return None;
        }
        let handler = self.handlers.get(self.handler_index).cloned();
        self.handler_index += 1;
        handler
    }

    pub(crate) fn close_middleware(&mut self) {
        self.middleware_open = false;
    }

    pub(crate) fn close_handlers(&mut self) {
        self.handlers_open = false;
    }

    pub(crate) fn halt(&mut self) {
        self.middleware_open = false;
        self.handlers_open = false;
    }
}

impl Default for ChainState {
    fn default() -> Self {
        let mut state = Self::new(Arc::default(), Arc::from([]));
        state.halt();
        state
    }
}
