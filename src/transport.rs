//! HTTP access for the engine.
//!
//! The engine only needs "GET this URL, optionally restricted to a byte
//! range, and hand me the status and a body stream"; the manager also needs
//! the response metadata of the first unranged GET. Those two calls are the
//! whole [`Transport`] trait. [`ReqwestTransport`] is the production
//! implementation; it is built from an explicit [`ClientConfig`] so separate
//! sessions never share proxy or cookie settings.

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::{header, Client};
use std::future::Future;
use std::io;
use std::path::Path;

use crate::config::ClientConfig;
use crate::error::{ConfigError, DownloadError, TransportError};

pub type Body = BoxStream<'static, io::Result<Bytes>>;

pub struct Response {
    pub status: u16,
    pub body: Body,
}

pub trait Transport: Send + Sync + 'static {
    /// Issues a GET for `url`. `range` is a full Range header value such as
    /// `bytes=0-1023`.
    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        range: Option<&str>,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send;

    /// Sends the initial unranged GET and reports its headers; the body is
    /// dropped unread.
    fn discover(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<Discovery, TransportError>> + Send;
}

/// What the initial, unranged GET tells us about a resource.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub status: u16,
    /// URL after following redirects.
    pub url: String,
    pub content_length: Option<u64>,
    pub accept_ranges: bool,
    pub content_disposition: Option<String>,
}

pub struct ReqwestTransport {
    client: Client,
    cookie_header: Option<String>,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, DownloadError> {
        let mut builder = Client::builder()
            .user_agent(config.user_agent.clone())
            .pool_max_idle_per_host(100)
            .connect_timeout(std::time::Duration::from_secs(10));

        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(parse_proxy(proxy)?);
        }
        if config.http1_only {
            builder = builder.http1_only();
        }

        let cookie_header = match &config.cookies_file {
            Some(path) => load_cookie_header(path)?,
            None => None,
        };

        let client = builder.build().map_err(TransportError::from)?;
        Ok(Self {
            client,
            cookie_header,
        })
    }

    fn request(
        &self,
        url: &str,
        headers: &[(String, String)],
        range: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let mut request = self.client.get(url);
        for (key, value) in headers {
            request = request.header(key.as_str(), value.as_str());
        }
        if let Some(cookies) = &self.cookie_header {
            request = request.header(header::COOKIE, cookies.as_str());
        }
        if let Some(range) = range {
            request = request.header(header::RANGE, range);
        }
        request
    }
}

impl Transport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        range: Option<&str>,
    ) -> Result<Response, TransportError> {
        let response = self.request(url, headers, range).send().await?;
        let status = response.status().as_u16();
        let body = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
            .boxed();
        Ok(Response { status, body })
    }

    async fn discover(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<Discovery, TransportError> {
        let response = self.request(url, headers, None).send().await?;
        let header_str = |name: header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        Ok(Discovery {
            status: response.status().as_u16(),
            url: response.url().to_string(),
            content_length: response.content_length(),
            accept_ranges: header_str(header::ACCEPT_RANGES)
                .map(|v| v.trim().eq_ignore_ascii_case("bytes"))
                .unwrap_or(false),
            content_disposition: header_str(header::CONTENT_DISPOSITION),
        })
    }
}

fn parse_proxy(raw: &str) -> Result<reqwest::Proxy, DownloadError> {
    let parsed = url::Url::parse(raw).map_err(|e| ConfigError::ProxyUrl(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" | "socks5" => {}
        other => return Err(ConfigError::ProxyScheme(other.to_string()).into()),
    }
    Ok(reqwest::Proxy::all(parsed.as_str()).map_err(TransportError::from)?)
}

fn load_cookie_header(path: &Path) -> Result<Option<String>, TransportError> {
    let contents = std::fs::read_to_string(path).map_err(|source| TransportError::Cookies {
        path: path.to_path_buf(),
        source,
    })?;
    let pairs = parse_netscape_cookies(&contents);
    if pairs.is_empty() {
        return Ok(None);
    }
    let header = pairs
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ");
    Ok(Some(header))
}

/// Name/value pairs from a Netscape cookies.txt file.
///
/// Lines are `domain flag path secure expiry name value`, tab separated.
/// Comments start with `#`, except the `#HttpOnly_` domain prefix.
pub fn parse_netscape_cookies(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .filter_map(|line| {
            let line = line.trim_end_matches(['\r', '\n']);
            let line = line.strip_prefix("#HttpOnly_").unwrap_or(line);
            if line.trim().is_empty() || line.starts_with('#') {
                return None;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 7 {
                return None;
            }
            Some((fields[5].to_string(), fields[6].to_string()))
        })
        .collect()
}
