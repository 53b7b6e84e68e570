use anyhow::{anyhow, bail, Result};

use rangedl::config::{MAX_THREADS, MIN_CLI_CHUNK_SIZE};

/// Parses sizes like `512K`, `1M`, `2g` or a plain byte count (1024-based suffixes).
pub fn parse_size(raw: &str) -> Result<u64> {
    let s = raw.trim().to_ascii_uppercase();
    let (digits, factor) = match s.chars().last() {
        Some('K') => (&s[..s.len() - 1], 1024u64),
        Some('M') => (&s[..s.len() - 1], 1024 * 1024),
        Some('G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s.as_str(), 1),
    };
    let value: u64 = digits
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid size: {raw}"))?;
    value
        .checked_mul(factor)
        .ok_or_else(|| anyhow!("size too large: {raw}"))
}

pub fn parse_chunk_size(raw: &str) -> Result<u64> {
    let size = parse_size(raw)?;
    if size < MIN_CLI_CHUNK_SIZE {
        bail!("chunk size must be at least 1 megabytes");
    }
    Ok(size)
}

pub fn parse_threads(raw: &str) -> Result<usize> {
    let threads: usize = raw.trim().parse().map_err(|_| anyhow!("invalid thread count: {raw}"))?;
    if threads < 1 || threads > MAX_THREADS {
        bail!("thread must be between 1 and {MAX_THREADS}");
    }
    Ok(threads)
}

/// Parses `Name: value`.
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .trim()
        .split_once(':')
        .ok_or_else(|| anyhow!("invalid header format: {raw}"))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("invalid header format: {raw}");
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Applies defaults on top of user headers: `Accept`, `User-Agent`, optional `Referer`.
pub fn finalize_headers(
    mut headers: Vec<(String, String)>,
    referer: Option<&str>,
    user_agent: &str,
) -> Vec<(String, String)> {
    let has = |headers: &[(String, String)], name: &str| {
        headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    };
    if !has(&headers, "Accept") {
        headers.push(("Accept".to_string(), "*/*".to_string()));
    }
    if let Some(referer) = referer {
        headers.retain(|(k, _)| !k.eq_ignore_ascii_case("Referer"));
        headers.push(("Referer".to_string(), referer.to_string()));
    }
    if !user_agent.is_empty() {
        headers.retain(|(k, _)| !k.eq_ignore_ascii_case("User-Agent"));
        headers.push(("User-Agent".to_string(), user_agent.to_string()));
    }
    headers
}

pub fn check_scheme(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url).map_err(|_| anyhow!("invalid URL"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => bail!("{other} scheme not supported"),
    }
}
