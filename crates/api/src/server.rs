//! Serving with a bounded graceful shutdown.

use std::future::{Future, IntoFuture};
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

/// How [`serve`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every in-flight request finished after the shutdown signal.
    Drained,
    /// `drain_timeout` elapsed first and remaining connections were dropped.
    TimedOut,
}

/// Serve `app` until `signal` resolves, then give in-flight requests at most
/// `drain_timeout` to finish.
pub async fn serve<S>(
    listener: TcpListener,
    app: Router,
    signal: S,
    drain_timeout: Duration,
) -> std::io::Result<ShutdownOutcome>
where
    S: Future<Output = ()> + Send + 'static,
{
    let (draining_tx, mut draining_rx) = tokio::sync::watch::channel(false);

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal.await;
            let _ = draining_tx.send(true);
        })
        .into_future();

    let deadline = async move {
        if draining_rx.wait_for(|draining| *draining).await.is_err() {
            // Server finished without a signal; let it win the race.
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(drain_timeout).await;
    };

    tokio::select! {
        result = server => result.map(|()| ShutdownOutcome::Drained),
        () = deadline => {
            tracing::warn!(
                timeout_secs = drain_timeout.as_secs(),
                "In-flight requests did not finish in time, shutting down anyway"
            );
            Ok(ShutdownOutcome::TimedOut)
        }
    }
}
