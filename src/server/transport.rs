//! server::transport
//!
//! Binding listeners and serving the router on them.
//!
//! Every configured address gets its own accept loop. An address that
//! cannot be bound is logged and skipped; serving fails only when no
//! address could be bound at all. All loops stop together on shutdown and
//! drain their in-flight requests first.

use std::future::{Future, IntoFuture};

use axum::Router;
use thiserror::Error;
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::core::config::ListenAddress;

/// Errors from serving.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("none of the {attempted} configured listeners could be bound")]
    NoListeners { attempted: usize },
}

/// Serve `app` on every address until interrupted.
pub async fn serve(listeners: &[ListenAddress], app: Router) -> Result<(), ServeError> {
    serve_until(listeners, app, shutdown_signal()).await
}

/// Serve `app` on every address until `shutdown` completes.
pub async fn serve_until<F>(
    listeners: &[ListenAddress],
    app: Router,
    shutdown: F,
) -> Result<(), ServeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (stop_tx, stop_rx) = watch::channel(false);
    let mut servers = JoinSet::new();

    for address in listeners {
        let stop = stopped(stop_rx.clone());
        let bound = match address {
            ListenAddress::Tcp(addr) => TcpListener::bind(addr.as_str()).await.map(|listener| {
                servers.spawn(
                    axum::serve(listener, app.clone())
                        .with_graceful_shutdown(stop)
                        .into_future(),
                );
            }),
            ListenAddress::Unix(path) => UnixListener::bind(path).map(|listener| {
                servers.spawn(
                    axum::serve(listener, app.clone())
                        .with_graceful_shutdown(stop)
                        .into_future(),
                );
            }),
        };

        match bound {
            Ok(()) => info!(%address, "listening"),
            Err(err) => error!(%address, error = %err, "cannot listen"),
        }
    }

    if servers.is_empty() {
        return Err(ServeError::NoListeners {
            attempted: listeners.len(),
        });
    }

    tokio::spawn(async move {
        shutdown.await;
        info!("shutting down");
        let _ = stop_tx.send(true);
    });

    while let Some(joined) = servers.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(error = %err, "listener stopped"),
            Err(err) => error!(error = %err, "listener task failed"),
        }
    }
    Ok(())
}

async fn stopped(mut stop: watch::Receiver<bool>) {
    // A dropped sender also means stop.
    let _ = stop.wait_for(|stop| *stop).await;
}

/// Completes on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Hostname;
    use crate::core::modules::ModuleMap;
    use crate::server::{router, RegistryState};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixStream;
    use tokio::sync::oneshot;

    fn app() -> Router {
        router(RegistryState::new(
            Hostname::parse("registry.example.com").unwrap(),
            ModuleMap::new(),
        ))
    }

    #[tokio::test]
    async fn no_bindable_listener_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let listeners = vec![ListenAddress::Unix(dir.path().join("absent/dir/registry.sock"))];
        let result = serve_until(&listeners, app(), async {}).await;
        assert!(matches!(
            result,
            Err(ServeError::NoListeners { attempted: 1 })
        ));
    }

    #[tokio::test]
    async fn serves_on_unix_socket_until_shutdown() {
        let dir = tempfile::TempDir::new().unwrap();
        let socket = dir.path().join("registry.sock");
        let listeners = vec![
            ListenAddress::Unix(socket.clone()),
            ListenAddress::Unix(dir.path().join("absent/dir/other.sock")),
        ];

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            serve_until(&listeners, app(), async move {
                let _ = stop_rx.await;
            })
            .await
        });

        let mut stream = None;
        for _ in 0..100 {
            if let Ok(s) = UnixStream::connect(&socket).await {
                stream = Some(s);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let mut stream = stream.expect("socket never came up");

        stream
            .write_all(b"GET /.well-known/terraform.json HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.contains("modules.v1"));

        stop_tx.send(()).unwrap();
        assert!(server.await.unwrap().is_ok());
    }
}
