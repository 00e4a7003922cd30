use std::future::IntoFuture;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio_util::sync::CancellationToken;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::rest;
use crate::IrisState;

/// In-flight requests get this long to finish once shutdown starts.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct IrisApp {
    pub state: IrisState,
    pub router: Router<()>,
}

impl IrisApp {
    pub fn new(state: IrisState) -> Self {
        let server = &state.config.server;
        let middleware = ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                    let request_id = req
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-");
                    tracing::info_span!("http", method = %req.method(), uri = %req.uri(), request_id)
                }),
            )
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TimeoutLayer::new(server.timeout))
            .layer(GlobalConcurrencyLimitLayer::new(server.max_conns.max(1)));

        let router = rest::routes(state.clone()).layer(middleware);
        Self { state, router }
    }

    /// Serve until `shutdown` fires, then drain for up to [`SHUTDOWN_GRACE`]
    /// and run the transformer's shutdown hook.
    pub async fn listen<A>(self, addr: A, shutdown: CancellationToken) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "listening");

        let signal = shutdown.clone();
        let server = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { signal.cancelled().await });
        let mut server = tokio::spawn(server.into_future());

        tokio::select! {
            res = &mut server => res??,
            _ = shutdown.cancelled() => {
                tracing::info!(grace = ?SHUTDOWN_GRACE, "shutting down, draining requests");
                match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
                    Ok(res) => res??,
                    Err(_) => {
                        tracing::warn!("grace period elapsed, closing remaining connections");
                        server.abort();
                    }
                }
            }
        }

        self.state.transformer.shutdown().await;
        tracing::info!(transformer = self.state.transformer.name(), "server stopped");
        Ok(())
    }
}

pub fn iris(state: IrisState) -> IrisApp {
    IrisApp::new(state)
}
