//! Minimal HTTP surface.
//!
//! The server understands exactly enough of HTTP/1.1 to extract the request
//! path and emit fixed response headers; everything else (methods, header
//! fields, versions) passes through uninterpreted.

pub mod request;
pub mod response;
