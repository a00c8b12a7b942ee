use std::sync::{Arc, Mutex};

use axum::Router;

/// Requests a stub upstream saw, one summary line each.
pub type Seen = Arc<Mutex<Vec<String>>>;

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Base URL nothing listens on (discard port).
pub const UNREACHABLE: &str = "http://127.0.0.1:9";
