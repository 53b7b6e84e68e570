use percent_encoding::percent_decode_str;
use url::Url;

/// File name to save a response under.
///
/// Prefers the `Content-Disposition` filename, then the last URL path
/// segment, then a generated `download_<uuid>` name.
pub fn infer_filename(url: &str, content_disposition: Option<&str>) -> String {
    let name = content_disposition
        .and_then(filename_from_disposition)
        .or_else(|| filename_from_url(url))
        .unwrap_or_else(|| format!("download_{}", uuid::Uuid::new_v4()));
    sanitize_filename(&name)
}

/// `filename` parameter of a Content-Disposition header, quoted or bare.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    value.split(';').skip(1).find_map(|param| {
        let (key, raw) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let name = raw.trim().trim_matches('"').trim();
        (!name.is_empty()).then(|| name.to_string())
    })
}

/// Last non-empty path segment of `url`, percent-decoded.
pub fn filename_from_url(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let decoded = percent_decode_str(segment).decode_utf8_lossy().to_string();
    match decoded.as_str() {
        "" | "." | ".." => None,
        _ => Some(decoded),
    }
}

pub fn sanitize_filename(filename: &str) -> String {
    filename.replace(
        |c: char| !c.is_alphanumeric() && c != '.' && c != '-' && c != '_',
        "_",
    )
}
