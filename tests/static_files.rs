mod support;

use support::{get, open_fds, pattern, populate, spawn_server};
use tempfile::TempDir;

#[test]
fn small_static_file_roundtrip() {
    let root = TempDir::new().expect("Failed to create root");
    populate(&root, "static", "hello.txt", b"hello from the static subtree\n");
    let addr = spawn_server(&root);

    let resp = get(addr, "/static/hello.txt");

    assert_eq!(resp.status, "HTTP/1.1 200 OK");
    assert_eq!(resp.content_length, 30);
    assert_eq!(resp.body, b"hello from the static subtree\n");
}

#[test]
fn static_file_spanning_many_chunks() {
    let root = TempDir::new().expect("Failed to create root");
    // Larger than several sendfile chunks and not a multiple of the chunk size.
    let payload = pattern(40_111);
    populate(&root, "static", "big.bin", &payload);
    let addr = spawn_server(&root);

    let resp = get(addr, "/static/big.bin");

    assert_eq!(resp.status, "HTTP/1.1 200 OK");
    assert_eq!(resp.content_length, payload.len() as u64);
    assert_eq!(resp.body, payload);
}

#[test]
fn empty_static_file() {
    let root = TempDir::new().expect("Failed to create root");
    populate(&root, "static", "empty", b"");
    let addr = spawn_server(&root);

    let resp = get(addr, "/static/empty");

    assert_eq!(resp.status, "HTTP/1.1 200 OK");
    assert_eq!(resp.content_length, 0);
    assert!(resp.body.is_empty());
}

#[test]
fn nested_static_path() {
    let root = TempDir::new().expect("Failed to create root");
    populate(&root, "static/sub", "nested.txt", b"nested");
    let addr = spawn_server(&root);

    let resp = get(addr, "/static/sub/nested.txt");

    assert_eq!(resp.status, "HTTP/1.1 200 OK");
    assert_eq!(resp.body, b"nested");
}

#[test]
fn repeated_requests_on_one_server() {
    let root = TempDir::new().expect("Failed to create root");
    let payload = pattern(9_000);
    populate(&root, "static", "a.bin", &payload);
    let addr = spawn_server(&root);

    // Warm up so lazy allocations do not count as growth.
    let resp = get(addr, "/static/a.bin");
    assert_eq!(resp.status, "HTTP/1.1 200 OK");

    let before = open_fds();

    // Slab slots and descriptors are recycled across connections; a leaked
    // socket or file would show up as monotonic growth.
    for _ in 0..20 {
        let resp = get(addr, "/static/a.bin");
        assert_eq!(resp.status, "HTTP/1.1 200 OK");
        assert_eq!(resp.body, payload);
    }

    let after = open_fds();

    // A small margin absorbs descriptors opened by concurrent test threads.
    assert!(
        after < before + 10,
        "descriptor count grew from {before} to {after}"
    );
}
