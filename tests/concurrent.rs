mod support;

use std::thread;
use support::{get, pattern, populate, spawn_server};
use tempfile::TempDir;

#[test]
fn concurrent_clients_get_their_own_bodies() {
    let root = TempDir::new().expect("Failed to create root");

    let mut payloads = Vec::new();
    for i in 0..4 {
        let payload = pattern(10_000 + i * 1_337);
        populate(&root, "static", &format!("s{i}.bin"), &payload);
        payloads.push(payload);

        let payload = pattern(12_000 + i * 2_003);
        populate(&root, "dynamic", &format!("d{i}.bin"), &payload);
        payloads.push(payload);
    }

    let addr = spawn_server(&root);

    let mut handles = Vec::new();
    for i in 0..4 {
        let static_expected = payloads[i * 2].clone();
        let dynamic_expected = payloads[i * 2 + 1].clone();

        handles.push(thread::spawn(move || {
            let resp = get(addr, &format!("/static/s{i}.bin"));
            assert_eq!(resp.status, "HTTP/1.1 200 OK");
            assert_eq!(resp.body, static_expected, "static body {i} corrupted");

            let resp = get(addr, &format!("/dynamic/d{i}.bin"));
            assert_eq!(resp.status, "HTTP/1.1 200 OK");
            assert_eq!(resp.body, dynamic_expected, "dynamic body {i} corrupted");
        }));
    }

    for handle in handles {
        handle.join().expect("Client thread panicked");
    }
}

#[test]
fn slow_client_does_not_block_others() {
    use std::io::Write;
    use std::net::TcpStream;
    use std::time::Duration;

    let root = TempDir::new().expect("Failed to create root");
    populate(&root, "static", "fast.txt", b"fast");
    let addr = spawn_server(&root);

    // A client that never finishes its request parks in the receive phase.
    let mut stalled = TcpStream::connect(addr).expect("Failed to connect");
    stalled
        .write_all(b"GET /static/fast.txt HTTP/1.1\r\n")
        .expect("Failed to send partial request");

    // Other clients are served meanwhile.
    for _ in 0..5 {
        let resp = get(addr, "/static/fast.txt");
        assert_eq!(resp.status, "HTTP/1.1 200 OK");
        assert_eq!(resp.body, b"fast");
    }

    thread::sleep(Duration::from_millis(50));
    drop(stalled);
}
