//! Panic interception.
//!
//! When panics are caught, the whole chain of a request runs inside one `catch_unwind`. The
//! payload only carries the message, so a process wide panic hook records where the panic
//! happened in a thread local slot; unwinding ends on the same thread, where the slot is read back.

use crate::context::RequestContext;
use crate::responder::JsonResponse;
use http::StatusCode;
use once_cell::sync::OnceCell;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::panic;
use std::sync::Arc;
use tracing::error;

thread_local! {
    static LAST_LOCATION: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: OnceCell<()> = OnceCell::new();

/// Installs the location recording hook once; the previous hook still runs after it.
pub(crate) fn install_panic_hook() {
    PANIC_HOOK.get_or_init(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let location = info.location().map(|location| format!("{}:{}:{}", location.file(), location.line(), location.column()));
            LAST_LOCATION.with(|last| *last.borrow_mut() = location);
            previous(info);
        }));
    });
}

/// A panic caught while running a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    message: String,
    location: Option<String>,
}

impl Fault {
    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_owned()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "unknown panic payload".to_owned()
        };

        let location = LAST_LOCATION.with(|last| last.borrow_mut().take());
        Self { message, location }
    }

    /// The panic message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// `file:line:column` of the panic, when the hook saw it.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} at {location}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Called with the context of the faulting request; the partial response is already discarded.
pub type PanicHandler = Arc<dyn Fn(&mut RequestContext, &Fault) + Send + Sync>;

/// Logs the fault and answers `500` with the JSON error envelope.
pub fn default_panic_handler(ctx: &mut RequestContext, fault: &Fault) {
    error!(
        method = %ctx.method(),
        path = ctx.path(),
        location = fault.location().unwrap_or("unknown"),
        "panic while serving request: {}",
        fault.message()
    );
    ctx.render(&JsonResponse::error_with(StatusCode::INTERNAL_SERVER_ERROR, ["internal server error"]));
}
