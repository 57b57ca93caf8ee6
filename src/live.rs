//! Live-reload channel shared by every task.
//!
//! The hub is a single broadcast sender created once at startup and handed to
//! the tasks through [`Env`](crate::Env). The development server subscribes a
//! receiver for each connected browser tab and forwards the messages over a
//! websocket. When no browser is connected the messages are simply dropped,
//! which is also what happens during a one-off `build`.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tokio::sync::broadcast;

/// Path of the websocket endpoint.
pub const SOCKET_PATH: &str = "/__livereload";

/// Path the client script is served from.
pub const SCRIPT_PATH: &str = "/__livereload.js";

/// Browser side of the channel.
pub const CLIENT_SCRIPT: &str = include_str!("../assets/livereload.js");

/// A message sent to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Sent once after the socket is opened.
    Connected,
    /// Full page reload.
    Reload,
    /// Swap the listed stylesheets without reloading the page.
    Inject { paths: Vec<String> },
    /// Show a short message on top of the page.
    Notify { message: String },
}

#[derive(Debug, Clone)]
pub struct LiveReload {
    root: Utf8PathBuf,
    sender: broadcast::Sender<Message>,
}

impl LiveReload {
    /// Create the hub for a server serving files from `root`.
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        let (sender, _) = broadcast::channel(64);
        Self {
            root: root.into(),
            sender,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.sender.subscribe()
    }

    /// Number of connected clients.
    pub fn clients(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn reload(&self) {
        tracing::debug!("sending reload to {} client(s)", self.clients());
        self.send(Message::Reload);
    }

    pub fn notify(&self, message: impl Into<String>) {
        self.send(Message::Notify {
            message: message.into(),
        });
    }

    /// Push freshly written files to the browsers. Stylesheets are injected in
    /// place, anything else needs a full reload.
    pub fn stream(&self, files: &[Utf8PathBuf]) {
        if files.is_empty() {
            return;
        }

        if files.iter().all(|file| file.extension() == Some("css")) {
            let paths = files.iter().map(|file| self.to_href(file)).collect();
            self.send(Message::Inject { paths });
        } else {
            self.reload();
        }
    }

    /// Map a path on disk to the URL it is served under.
    pub fn to_href(&self, file: &Utf8Path) -> String {
        let relative = file.strip_prefix(&self.root).unwrap_or(file);
        let mut href = String::from("/");
        href.push_str(&relative.as_str().replace('\\', "/"));
        href
    }

    fn send(&self, message: Message) {
        // An error only means that nobody is listening.
        let _ = self.sender.send(message);
    }
}

/// Insert the client script tag into an HTML document, right before the last
/// `</body>`. Documents without a body get the tag appended at the end.
pub fn inject_snippet(html: &str) -> String {
    let tag = format!(r#"<script src="{SCRIPT_PATH}" async></script>"#);

    // ASCII lowercasing keeps byte offsets intact.
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(index) => {
            let mut out = String::with_capacity(html.len() + tag.len());
            out.push_str(&html[..index]);
            out.push_str(&tag);
            out.push_str(&html[index..]);
            out
        }
        None => format!("{html}{tag}"),
    }
}
