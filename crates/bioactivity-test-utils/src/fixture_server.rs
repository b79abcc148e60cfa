//! Loopback HTTP server answering GET requests from canned bodies.
//!
//! Routes match on the longest path prefix of the request target, query
//! string included, so `/activity.json?offset=2` can answer differently from
//! `/activity.json`. Unmatched targets get a 404.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use url::Url;

#[derive(Debug, Clone)]
struct Route {
    prefix: String,
    status: u16,
    body: String,
}

/// Route table for a [`FixtureServer`].
#[derive(Debug, Clone, Default)]
pub struct FixtureRoutes {
    routes: Vec<Route>,
}

impl FixtureRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `200` with a JSON body.
    pub fn json(self, prefix: &str, body: &str) -> Self {
        self.status(prefix, 200, body)
    }

    pub fn status(mut self, prefix: &str, status: u16, body: &str) -> Self {
        self.routes.push(Route {
            prefix: prefix.to_string(),
            status,
            body: body.to_string(),
        });
        self
    }

    pub async fn start(self) -> std::io::Result<FixtureServer> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let requests = Arc::new(Mutex::new(Vec::new()));

        let routes = Arc::new(self.routes);
        let log = Arc::clone(&requests);
        let task = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let routes = Arc::clone(&routes);
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let _ = serve(socket, &routes, &log).await;
                });
            }
        });

        Ok(FixtureServer { addr, requests, task })
    }
}

/// Running server; shut down on drop.
pub struct FixtureServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl FixtureServer {
    /// Absolute URL for a server path, e.g. `url("/chembl/api/data")`.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Request targets (path and query) in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for FixtureServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Decoded query parameters of a recorded request target.
pub fn query_params(target: &str) -> HashMap<String, String> {
    Url::parse(&format!("http://fixture{}", target))
        .map(|u| u.query_pairs().into_owned().collect())
        .unwrap_or_default()
}

async fn serve(
    mut socket: TcpStream,
    routes: &[Route],
    log: &Mutex<Vec<String>>,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&buf);
    let target = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    log.lock().unwrap().push(target.clone());

    let (status, body) = routes
        .iter()
        .filter(|r| target.starts_with(&r.prefix))
        .max_by_key(|r| r.prefix.len())
        .map(|r| (r.status, r.body.as_str()))
        .unwrap_or((404, r#"{"error": "not found"}"#));

    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        _ => "Fixture",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}
