//! Local HTTP server with canned responses for scraper tests.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// A canned response for every request whose target starts with `prefix`.
#[derive(Debug, Clone)]
pub struct Route {
    prefix: String,
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl Route {
    pub fn ok(prefix: &str, body: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            status: 200,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    pub fn status(prefix: &str, status: u16) -> Self {
        Self {
            status,
            ..Self::ok(prefix, "")
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

fn request_target(request: &str) -> &str {
    request.split_whitespace().nth(1).unwrap_or("/")
}

/// Serve `routes` on an ephemeral local port and return the base URL.
///
/// The first route whose prefix matches the request target (path and
/// query) answers; anything else gets a 404.
pub async fn serve(routes: Vec<Route>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let routes = routes.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&buf);
                let target = request_target(&request);

                let route = routes.iter().find(|r| target.starts_with(&r.prefix));
                let (status, headers, body) = match route {
                    Some(r) => (r.status, r.headers.clone(), r.body.clone()),
                    None => (404, Vec::new(), String::new()),
                };
                let mut response = format!(
                    "HTTP/1.1 {status} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
                    if status < 400 { "OK" } else { "Error" },
                    body.len()
                );
                for (name, value) in headers {
                    response.push_str(&format!("{name}: {value}\r\n"));
                }
                response.push_str("\r\n");
                response.push_str(&body);

                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{addr}")
}
