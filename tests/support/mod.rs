#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

#[derive(Clone)]
struct Route {
    content_type: &'static str,
    body: Vec<u8>,
    /// Sent with `Transfer-Encoding: chunked`, so the client never learns the length.
    chunked: bool,
}

/// Minimal HTTP/1.1 server answering fixed bodies per path and counting hits.
pub struct StubServer {
    addr: SocketAddr,
    routes: Arc<Mutex<HashMap<String, Route>>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

impl StubServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: Arc<Mutex<HashMap<String, Route>>> = Arc::default();
        let hits: Arc<Mutex<HashMap<String, usize>>> = Arc::default();

        let (task_routes, task_hits) = (routes.clone(), hits.clone());
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let routes = task_routes.clone();
                let hits = task_hits.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, routes, hits).await;
                });
            }
        });

        Self { addr, routes, hits }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn json(&self, path: &str, body: &str) {
        self.route(path, "application/json", body.as_bytes().to_vec());
    }

    pub fn bytes(&self, path: &str, body: Vec<u8>) {
        self.route(path, "application/gzip", body);
    }

    pub fn bytes_chunked(&self, path: &str, body: Vec<u8>) {
        self.insert(
            path,
            Route {
                content_type: "application/gzip",
                body,
                chunked: true,
            },
        );
    }

    fn route(&self, path: &str, content_type: &'static str, body: Vec<u8>) {
        self.insert(
            path,
            Route {
                content_type,
                body,
                chunked: false,
            },
        );
    }

    fn insert(&self, path: &str, route: Route) {
        self.routes.lock().unwrap().insert(path.to_string(), route);
    }

    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

async fn serve(
    mut stream: tokio::net::TcpStream,
    routes: Arc<Mutex<HashMap<String, Route>>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        request.extend_from_slice(&buf[..n]);
    }

    let head = String::from_utf8_lossy(&request);
    let path = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();

    *hits.lock().unwrap().entry(path.clone()).or_default() += 1;
    let route = routes.lock().unwrap().get(&path).cloned();

    let (status, route) = match route {
        Some(route) => ("200 OK", route),
        None => (
            "404 Not Found",
            Route {
                content_type: "text/plain",
                body: b"not found".to_vec(),
                chunked: false,
            },
        ),
    };

    if route.chunked {
        let header = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
            status, route.content_type
        );
        stream.write_all(header.as_bytes()).await?;
        for chunk in route.body.chunks(512) {
            stream
                .write_all(format!("{:x}\r\n", chunk.len()).as_bytes())
                .await?;
            stream.write_all(chunk).await?;
            stream.write_all(b"\r\n").await?;
        }
        stream.write_all(b"0\r\n\r\n").await?;
    } else {
        let header = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status,
            route.content_type,
            route.body.len()
        );
        stream.write_all(header.as_bytes()).await?;
        stream.write_all(&route.body).await?;
    }
    stream.shutdown().await
}

/// Gzipped tarball holding executable files at the given paths.
pub fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
    let mut builder = tar::Builder::new(encoder);
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, path, content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Shell script standing in for a node binary: prints a version banner on `--version`, otherwise
/// logs its arguments and idles until interrupted.
pub fn fake_node(version_line: &str) -> String {
    format!(
        "#!/bin/sh\n\
         if [ \"$1\" = \"--version\" ]; then echo '{}'; exit 0; fi\n\
         trap 'echo interrupted; exit 0' INT\n\
         echo \"args: $*\"\n\
         while true; do sleep 0.05; done\n",
        version_line
    )
}

pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut file = fs::File::create(path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
}
