mod support;

use support::{get, populate, spawn_server};
use tempfile::TempDir;

#[test]
fn unknown_prefix_is_404() {
    let root = TempDir::new().expect("Failed to create root");
    populate(&root, "static", "a.txt", b"a");
    let addr = spawn_server(&root);

    let resp = get(addr, "/other/a.txt");

    assert_eq!(resp.status, "HTTP/1.1 404 Not Found");
    assert_eq!(resp.content_length, 0);
    assert!(resp.body.is_empty());
}

#[test]
fn missing_file_is_404() {
    let root = TempDir::new().expect("Failed to create root");
    populate(&root, "static", "a.txt", b"a");
    let addr = spawn_server(&root);

    let resp = get(addr, "/static/missing.txt");

    assert_eq!(resp.status, "HTTP/1.1 404 Not Found");
    assert!(resp.body.is_empty());
}

#[test]
fn missing_dynamic_file_is_404() {
    let root = TempDir::new().expect("Failed to create root");
    populate(&root, "dynamic", "a.txt", b"a");
    let addr = spawn_server(&root);

    let resp = get(addr, "/dynamic/missing.txt");

    assert_eq!(resp.status, "HTTP/1.1 404 Not Found");
    assert!(resp.body.is_empty());
}

#[test]
fn traversal_is_404() {
    let root = TempDir::new().expect("Failed to create root");
    populate(&root, "static", "a.txt", b"a");
    std::fs::write(root.path().join("secret"), b"secret").expect("Failed to write fixture");
    let addr = spawn_server(&root);

    let resp = get(addr, "/static/../secret");

    assert_eq!(resp.status, "HTTP/1.1 404 Not Found");
    assert!(resp.body.is_empty());
}

#[test]
fn directory_is_404() {
    let root = TempDir::new().expect("Failed to create root");
    populate(&root, "static/sub", "a.txt", b"a");
    let addr = spawn_server(&root);

    let resp = get(addr, "/static/sub");

    assert_eq!(resp.status, "HTTP/1.1 404 Not Found");
    assert!(resp.body.is_empty());
}

#[test]
fn root_path_is_404() {
    let root = TempDir::new().expect("Failed to create root");
    let addr = spawn_server(&root);

    let resp = get(addr, "/");

    assert_eq!(resp.status, "HTTP/1.1 404 Not Found");
}
