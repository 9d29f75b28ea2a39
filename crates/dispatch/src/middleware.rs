use crate::chain::{Flow, Handler};
use crate::context::RequestContext;
use async_trait::async_trait;
use http::header::USER_AGENT;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Logs one line per request once the rest of the chain has run.
#[derive(Debug, Default)]
pub struct LogRequests {
    next_id: AtomicU64,
}

/// Creates the request logging middleware. Register it first so it sees the final status.
pub fn log_requests() -> LogRequests {
    LogRequests::default()
}

#[async_trait]
impl Handler for LogRequests {
    async fn call(&self, ctx: &mut RequestContext) -> Flow {
        let start = Instant::now();
        let req_id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;

        ctx.next().await;

        let client_ip = ctx.client_ip();
        let user_agent = ctx.headers().get(USER_AGENT).and_then(|value| value.to_str().ok()).unwrap_or_default();
        info!(
            req_id,
            client_ip = client_ip.as_deref().unwrap_or("-"),
            user_agent,
            status = ctx.status().as_u16(),
            method = %ctx.method(),
            path = ctx.path(),
            elapsed = ?start.elapsed(),
            "request served"
        );
        Flow::Continue
    }
}
