//! The hyper serving loop.

use crate::body::ResponseBody;
use crate::server::Server;
use futures::FutureExt;
use http::{Request, Response, StatusCode};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

impl Server {
    /// Installs a default `tracing` subscriber, binds `address` and serves forever.
    ///
    /// # Errors
    ///
    /// Fails when the address cannot be bound.
    pub async fn start(self, address: impl ToSocketAddrs) -> io::Result<()> {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            debug!(cause = %e, "global subscriber already set");
        }

        let listener = match TcpListener::bind(address).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(cause = %e, "bind server error");
                return Err(e);
            }
        };

        info!("start listening at {:?}", listener.local_addr()?);
        Arc::new(self).serve(listener).await;
        Ok(())
    }

    /// Accepts connections from `listener` and serves each one on its own task.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        loop {
            let (tcp_stream, remote_addr) = match listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let server = Arc::clone(&self);
            tokio::spawn(async move {
                let service = service_fn(move |request: Request<Incoming>| {
                    let server = Arc::clone(&server);
                    async move { Ok::<_, Infallible>(server.handle_guarded(request, remote_addr).await) }
                });

                match http1::Builder::new().serve_connection(TokioIo::new(tcp_stream), service).await {
                    Ok(()) => debug!(%remote_addr, "finished process, connection shutdown"),
                    Err(e) => error!(cause = %e, %remote_addr, "service has error, connection shutdown"),
                }
            });
        }
    }

    /// Panics the server did not intercept end here as a bare `500`.
    async fn handle_guarded(&self, request: Request<Incoming>, remote_addr: SocketAddr) -> Response<ResponseBody> {
        match AssertUnwindSafe(self.handle(request, Some(remote_addr))).catch_unwind().await {
            Ok(response) => response,
            Err(_) => {
                error!(%remote_addr, "request handling panicked");
                let mut response = Response::new(ResponseBody::empty());
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                response
            }
        }
    }
}
