//! Development server: serves the output directory, pushes live-reload
//! messages to connected browsers and reruns tasks when sources change.

mod http;
mod watch;

use std::net::SocketAddr;

use console::style;
use tokio::net::TcpListener;
use tracing::info;

pub use self::http::router;
pub use self::watch::{WatchBinding, Watcher, resolve_watch_path};

use crate::TaskContext;
use crate::error::ServeError;

/// Start the file server and the watchers, then keep going until the server
/// goes down. Failures of triggered tasks are only logged.
pub async fn serve(ctx: TaskContext, bindings: Vec<WatchBinding>) -> Result<(), ServeError> {
    let config = &ctx.env.config.server;

    let address = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(address).await?;
    let port = listener.local_addr()?.port();

    info!(url = %style(format!("http://localhost:{port}/")).yellow(), "starting a HTTP server");

    let watcher = Watcher::new(&bindings)?;

    tokio::select! {
        result = http::serve(listener, &config.root, ctx.env.reload.clone()) => result,
        () = watcher.listen(ctx.pipeline.clone(), ctx.env.clone()) => Ok(()),
    }
}
