//! Scripted in-process transport.
//!
//! Serves a fixed body, records every request's Range header, can fail a
//! given range a set number of times, and tracks how many fetches are in
//! flight at once.

use bytes::Bytes;
use futures::StreamExt;
use rangedl::transport::{Discovery, Response, Transport};
use rangedl::TransportError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const FOREVER: usize = usize::MAX;

pub struct FakeServer {
    body: Arc<Vec<u8>>,
    honor_ranges: bool,
    truncate: bool,
    padding: usize,
    delay: Duration,
    failures: Mutex<HashMap<String, usize>>,
    requests: Mutex<Vec<Option<String>>>,
    in_flight: Arc<AtomicUsize>,
    peak: AtomicUsize,
}

impl FakeServer {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body: Arc::new(body),
            honor_ranges: true,
            truncate: false,
            padding: 0,
            delay: Duration::ZERO,
            failures: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: AtomicUsize::new(0),
        }
    }

    /// Answers every request with `200 OK` and the full body.
    pub fn ignoring_ranges(mut self) -> Self {
        self.honor_ranges = false;
        self
    }

    /// Ranged responses carry only half of the requested bytes.
    pub fn truncating(mut self) -> Self {
        self.truncate = true;
        self
    }

    /// Ranged responses carry `extra` junk bytes past the requested range.
    pub fn padding(mut self, extra: usize) -> Self {
        self.padding = extra;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fails the next `times` requests for exactly this Range header.
    pub fn fail(self, range: &str, times: usize) -> Self {
        self.failures.lock().unwrap().insert(range.to_string(), times);
        self
    }

    pub fn requests(&self) -> Vec<Option<String>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, range: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.as_deref() == Some(range))
            .count()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn should_fail(&self, range: &str) -> bool {
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(range) {
            Some(0) | None => false,
            Some(n) if *n == FOREVER => true,
            Some(n) => {
                *n -= 1;
                true
            }
        }
    }
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn parse_range(value: &str, len: usize) -> Option<(usize, usize)> {
    let (a, b) = value.strip_prefix("bytes=")?.split_once('-')?;
    let start: usize = a.parse().ok()?;
    let end: usize = b.parse().ok()?;
    let end = end.min(len.checked_sub(1)?);
    (start <= end).then_some((start, end))
}

impl Transport for FakeServer {
    async fn get(
        &self,
        _url: &str,
        _headers: &[(String, String)],
        range: Option<&str>,
    ) -> Result<Response, TransportError> {
        self.requests
            .lock()
            .unwrap()
            .push(range.map(str::to_string));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(self.in_flight.clone());

        if let Some(range) = range {
            if self.should_fail(range) {
                return Err(TransportError::Other(format!("injected failure for {range}")));
            }
        }

        let (status, slice) = match range.and_then(|r| parse_range(r, self.body.len())) {
            Some((start, end)) if self.honor_ranges => {
                let mut slice = self.body[start..=end].to_vec();
                if self.truncate {
                    slice.truncate(slice.len() / 2);
                }
                slice.extend(std::iter::repeat(0xAA).take(self.padding));
                (206, slice)
            }
            _ => (200, self.body.to_vec()),
        };

        let delay = self.delay;
        let body = futures::stream::once(async move {
            tokio::time::sleep(delay).await;
            drop(guard);
            Ok::<_, std::io::Error>(Bytes::from(slice))
        })
        .boxed();
        Ok(Response { status, body })
    }

    async fn discover(
        &self,
        url: &str,
        _headers: &[(String, String)],
    ) -> Result<Discovery, TransportError> {
        self.requests.lock().unwrap().push(None);
        Ok(Discovery {
            status: 200,
            url: url.to_string(),
            content_length: Some(self.body.len() as u64),
            accept_ranges: self.honor_ranges,
            content_disposition: None,
        })
    }
}
