//! Request-line extraction.
//!
//! Requests arrive as an accumulated byte buffer that may grow across
//! several deliveries. Nothing here assumes the request arrived whole:
//! [`find_header_end`] scans the full buffer each time, so a terminator
//! split across reads is still found.

const TERMINATOR: &[u8] = b"\r\n\r\n";

/// Locates the header terminator (`CRLFCRLF`) in the accumulated buffer.
///
/// Returns the index one past the terminator, i.e. the length of the
/// complete header block, or `None` if the headers are still incomplete.
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(TERMINATOR.len())
        .position(|w| w == TERMINATOR)
        .map(|pos| pos + TERMINATOR.len())
}

/// Extracts the request path from a complete header block.
///
/// Only the second whitespace-separated token of the first line is
/// consulted; method and version are not interpreted. Returns `None` for
/// request lines that do not carry a path token or are not valid UTF-8.
pub fn request_path(buf: &[u8]) -> Option<&str> {
    let line_end = buf.windows(2).position(|w| w == b"\r\n")?;
    let line = std::str::from_utf8(&buf[..line_end]).ok()?;

    line.split_whitespace().nth(1)
}
