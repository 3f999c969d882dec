//! Shared helpers for the integration tests.
//!
//! Each test builds a throwaway document root with `static/` and `dynamic/`
//! subtrees, binds a server to port 0, and talks plain HTTP over a
//! `std::net::TcpStream`.

use skiff::{Server, ServerConfig};
use std::fs;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use tempfile::TempDir;

/// Binds a server on a fresh port serving `root` and runs it on a thread.
pub fn spawn_server(root: &TempDir) -> SocketAddr {
    spawn_server_with(root, ServerConfig::default())
}

/// Like [`spawn_server`] but with caller-tuned limits.
pub fn spawn_server_with(root: &TempDir, mut config: ServerConfig) -> SocketAddr {
    config.listen_addr = "127.0.0.1:0".parse().unwrap();
    config.document_root = root.path().to_path_buf();

    let server = Server::bind(config).expect("Failed to bind server");
    let addr = server.local_addr().expect("Failed to get local address");

    thread::spawn(move || server.run());

    addr
}

/// Creates a file under the `static/` or `dynamic/` subtree.
pub fn populate(root: &TempDir, kind: &str, name: &str, contents: &[u8]) {
    let dir = root.path().join(kind);
    fs::create_dir_all(&dir).expect("Failed to create subtree");
    fs::write(dir.join(name), contents).expect("Failed to write fixture");
}

/// A parsed response: status line, declared content length, body bytes.
pub struct Response {
    pub status: String,
    pub content_length: u64,
    pub body: Vec<u8>,
}

/// Sends one GET request and reads the connection to EOF.
pub fn get(addr: SocketAddr, path: &str) -> Response {
    let mut stream = TcpStream::connect(addr).expect("Failed to connect");

    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
    stream
        .write_all(request.as_bytes())
        .expect("Failed to send request");

    read_response(&mut stream)
}

/// Reads and parses a full response from an already-written stream.
pub fn read_response(stream: &mut TcpStream) -> Response {
    let mut raw = Vec::new();
    stream
        .read_to_end(&mut raw)
        .expect("Failed to read response");

    let header_end = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("Response has no header terminator")
        + 4;

    let header = std::str::from_utf8(&raw[..header_end]).expect("Header is not UTF-8");
    let status = header.lines().next().expect("Missing status line").to_string();

    let content_length = header
        .lines()
        .find_map(|l| l.strip_prefix("Content-Length: "))
        .expect("Missing Content-Length")
        .trim()
        .parse()
        .expect("Bad Content-Length");

    Response {
        status,
        content_length,
        body: raw[header_end..].to_vec(),
    }
}

/// Deterministic non-repeating payload of the given length.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Number of file descriptors currently open in this process.
///
/// The server threads share the test process, so a descriptor leaked by a
/// connection shows up here.
pub fn open_fds() -> usize {
    fs::read_dir("/proc/self/fd")
        .expect("Failed to read /proc/self/fd")
        .count()
}
