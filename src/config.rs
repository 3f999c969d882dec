use std::net::SocketAddr;
use std::path::PathBuf;

/// Configuration for a [`Server`](crate::Server) instance.
///
/// Every listener carries its own configuration; there is no process-wide
/// state, so several independent servers can run in one process.
///
/// The defaults mirror a plain document-root deployment: listen on port
/// 8888, serve files from the current directory.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address the listening socket binds to.
    pub listen_addr: SocketAddr,

    /// Backlog passed to `listen(2)`.
    pub backlog: i32,

    /// Directory containing the `static/` and `dynamic/` subtrees.
    pub document_root: PathBuf,

    /// Upper bound on the size of a buffered request.
    ///
    /// A connection whose headers exceed this limit without producing a
    /// terminator is answered with `413 Request Entity Too Large`.
    pub max_request_bytes: usize,

    /// Size of one transfer unit.
    ///
    /// Bounds both a single `sendfile(2)` chunk on the static path and the
    /// AIO read buffer on the dynamic path.
    pub chunk_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8888)),
            backlog: 128,
            document_root: PathBuf::from("."),
            max_request_bytes: 8192,
            chunk_bytes: 8192,
        }
    }
}
