use axum::Router;
use axum::body::Body;
use axum::extract::ws::{Message as Frame, WebSocket, WebSocketUpgrade};
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use camino::Utf8Path;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower_http::services::ServeDir;

use crate::error::ServeError;
use crate::live::{CLIENT_SCRIPT, LiveReload, Message, SCRIPT_PATH, SOCKET_PATH, inject_snippet};

/// Static file server for the output directory, with the live-reload
/// endpoints mounted next to it.
pub fn router(root: &Utf8Path, reload: LiveReload) -> Router {
    Router::new()
        .route(SOCKET_PATH, get(socket))
        .route(SCRIPT_PATH, get(script))
        // path to the dist directory with generated website
        .fallback_service(ServeDir::new(root))
        .layer(middleware::from_fn(inject))
        .with_state(reload)
}

pub async fn serve(
    listener: TcpListener,
    root: &Utf8Path,
    reload: LiveReload,
) -> Result<(), ServeError> {
    axum::serve(listener, router(root, reload)).await?;
    Ok(())
}

async fn script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript")], CLIENT_SCRIPT)
}

async fn socket(ws: WebSocketUpgrade, State(reload): State<LiveReload>) -> Response {
    ws.on_upgrade(move |socket| forward(socket, reload))
}

/// Pass hub messages on to a single browser until it goes away.
///
/// The socket is read at the same time, so a closed tab is noticed right
/// away and control frames get answered.
async fn forward(mut socket: WebSocket, reload: LiveReload) {
    let mut rx = reload.subscribe();
    tracing::debug!("live-reload client connected, {} total", reload.clients());

    if send(&mut socket, &Message::Connected).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            message = rx.recv() => {
                let message = match message {
                    Ok(message) => message,
                    // Missed something, a reload covers whatever it was.
                    Err(RecvError::Lagged(_)) => Message::Reload,
                    Err(RecvError::Closed) => break,
                };

                if send(&mut socket, &message).await.is_err() {
                    break;
                }
            }
            frame = socket.recv() => match frame {
                Some(Ok(Frame::Close(_))) | Some(Err(_)) | None => break,
                // the client never sends anything meaningful
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::debug!("live-reload client disconnected");
}

async fn send(socket: &mut WebSocket, message: &Message) -> anyhow::Result<()> {
    let json = serde_json::to_string(message)?;
    socket.send(Frame::Text(json.into())).await?;
    Ok(())
}

/// Add the client script to every HTML page served.
async fn inject(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/html"));

    if response.status() != StatusCode::OK || !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();

    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    let html = inject_snippet(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);

    Response::from_parts(parts, Body::from(html))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    async fn get(port: u16, path: &str) -> String {
        let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port))
            .await
            .unwrap();

        let request =
            format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_serves_dist_with_client_script() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap().to_owned();

        fs::write(root.join("index.html"), "<html><body><h1>hi</h1></body></html>").unwrap();
        fs::create_dir_all(root.join("css")).unwrap();
        fs::write(root.join("css/main.css"), "h1{color:red}").unwrap();

        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let reload = LiveReload::new(root.clone());
        tokio::spawn(async move { serve(listener, &root, reload).await });

        let page = get(port, "/").await;
        assert!(page.starts_with("HTTP/1.1 200"), "{page}");
        assert!(
            page.contains(r#"<h1>hi</h1><script src="/__livereload.js" async></script></body>"#),
            "{page}"
        );

        let css = get(port, "/css/main.css").await;
        assert!(css.contains("h1{color:red}"), "{css}");
        assert!(!css.contains("__livereload"), "{css}");

        let script = get(port, SCRIPT_PATH).await;
        assert!(script.contains("application/javascript"), "{script}");
        assert!(script.contains("new WebSocket"), "{script}");

        let missing = get(port, "/nope.html").await;
        assert!(missing.starts_with("HTTP/1.1 404"), "{missing}");
    }

    #[tokio::test]
    async fn test_closed_socket_unsubscribes() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap().to_owned();

        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let reload = LiveReload::new(root.clone());
        let hub = reload.clone();
        tokio::spawn(async move { serve(listener, &root, hub).await });

        let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port))
            .await
            .unwrap();

        let handshake = format!(
            "GET {SOCKET_PATH} HTTP/1.1\r\n\
             Host: localhost\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
             Sec-WebSocket-Version: 13\r\n\r\n"
        );
        stream.write_all(handshake.as_bytes()).await.unwrap();

        // wait for the greeting, sent after the client is subscribed
        let mut received = Vec::new();
        let mut buf = [0u8; 512];
        while !String::from_utf8_lossy(&received).contains(r#"{"type":"connected"}"#) {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "{}", String::from_utf8_lossy(&received));
            received.extend_from_slice(&buf[..n]);
        }

        assert!(String::from_utf8_lossy(&received).starts_with("HTTP/1.1 101"));
        assert_eq!(reload.clients(), 1);

        drop(stream);

        // nothing is ever broadcast, the hangup alone has to be noticed
        tokio::time::timeout(Duration::from_secs(5), async {
            while reload.clients() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("client is still subscribed after hanging up");
    }
}
