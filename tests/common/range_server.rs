//! Minimal HTTP/1.1 server over a std `TcpListener` for end-to-end tests.
//!
//! Serves one static body. GET with `Range: bytes=a-b` gets `206 Partial
//! Content` when ranges are enabled; anything else gets `200 OK` with the
//! whole body. Every response closes the connection.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Starts the server on an ephemeral port and returns a URL ending in `name`.
pub fn start(body: Vec<u8>, support_ranges: bool, name: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            thread::spawn(move || handle(stream, &body, support_ranges));
        }
    });
    format!("http://127.0.0.1:{port}/files/{name}")
}

fn handle(mut stream: TcpStream, body: &[u8], support_ranges: bool) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));

    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };

    let total = body.len();
    let range = if support_ranges { parse_range(request) } else { None };
    let accept_ranges = if support_ranges { "Accept-Ranges: bytes\r\n" } else { "" };

    let (status, content_range, slice) = match range {
        Some((start, end)) if start < total && start <= end => {
            let end = end.min(total - 1);
            (
                "206 Partial Content",
                format!("Content-Range: bytes {start}-{end}/{total}\r\n"),
                &body[start..=end],
            )
        }
        Some(_) => (
            "416 Range Not Satisfiable",
            format!("Content-Range: bytes */{total}\r\n"),
            &body[0..0],
        ),
        None => ("200 OK", String::new(), body),
    };

    let head = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\n{content_range}{accept_ranges}Connection: close\r\n\r\n",
        slice.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(slice);
    let _ = stream.flush();
}

/// `(start, end_inclusive)` from a `Range: bytes=a-b` header.
fn parse_range(request: &str) -> Option<(usize, usize)> {
    request
        .lines()
        .skip(1)
        .take_while(|line| !line.trim().is_empty())
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if !name.trim().eq_ignore_ascii_case("range") {
                return None;
            }
            let (a, b) = value.trim().strip_prefix("bytes=")?.split_once('-')?;
            let start = a.trim().parse().ok()?;
            let end = match b.trim() {
                "" => usize::MAX,
                b => b.parse().ok()?,
            };
            Some((start, end))
        })
}
