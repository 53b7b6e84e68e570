#![allow(dead_code)]

pub mod fake;
pub mod range_server;

/// Deterministic test payload that differs at every chunk boundary.
pub fn body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
