//! Response-header builders.
//!
//! Every response closes the connection and declares an exact
//! `Content-Length`; bodies, when present, are streamed separately by the
//! transfer machinery.

/// Header for a successful file response carrying `len` body bytes.
pub fn ok_header(len: u64) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\n\
         Connection: close\r\n\
         Content-Length: {len}\r\n\
         \r\n"
    )
    .into_bytes()
}

/// Header for an unresolved or missing resource. No body follows.
pub fn not_found_header() -> Vec<u8> {
    b"HTTP/1.1 404 Not Found\r\n\
      Connection: close\r\n\
      Content-Length: 0\r\n\
      \r\n"
        .to_vec()
}

/// Header for a request that exceeded the buffered-size cap. No body follows.
pub fn too_large_header() -> Vec<u8> {
    b"HTTP/1.1 413 Request Entity Too Large\r\n\
      Connection: close\r\n\
      Content-Length: 0\r\n\
      \r\n"
        .to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_header_declares_length() {
        let header = String::from_utf8(ok_header(1234)).unwrap();
        assert!(header.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(header.contains("Content-Length: 1234\r\n"));
        assert!(header.contains("Connection: close\r\n"));
        assert!(header.ends_with("\r\n\r\n"));
    }

    #[test]
    fn error_headers_are_bodiless() {
        for header in [not_found_header(), too_large_header()] {
            let header = String::from_utf8(header).unwrap();
            assert!(header.contains("Content-Length: 0\r\n"));
            assert!(header.ends_with("\r\n\r\n"));
        }
    }
}
