//! `UriResourceFetcher`: downloads any composite URI into a temporary file,
//! and the blocking HTTP handler the pipeline's `http:`/`https:` scheme
//! uses.

use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;

use crate::digest::sha1_hex;
use crate::error::{Error, HttpStatusError, IoResultExt, Result};
use crate::fsutils::make_executable;
use crate::tempspace::TemporarySpace;

use super::ParsedUri;

static HTTP_CLIENT: Lazy<reqwest::blocking::Client> = Lazy::new(|| {
    reqwest::blocking::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .timeout(Duration::from_secs(30))
        .redirect(reqwest::redirect::Policy::limited(10))
        .user_agent(format!(
            "protoc-forge/{} ({})",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS
        ))
        .build()
        .expect("static HTTP client configuration is always valid")
});

/// Performs a blocking GET, translating a 404 into [`Error::NotFound`] and
/// any other non-2xx status into [`HttpStatusError`].
pub(crate) fn http_get(url: &str) -> Result<Vec<u8>> {
    let response = HTTP_CLIENT.get(url).send()?;
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(Error::not_found(url));
    }
    if !status.is_success() {
        let headers = response.headers().clone();
        let snippet: String = {
            let text = response.text().unwrap_or_default();
            text.chars().take(256).collect()
        };
        return Err(Error::HttpStatus(HttpStatusError {
            status: status.as_u16(),
            correlation_id: header_str(&headers, "x-correlation-id"),
            request_id: header_str(&headers, "x-request-id"),
            www_authenticate: header_str(&headers, "www-authenticate"),
            proxy_authenticate: header_str(&headers, "proxy-authenticate"),
            response_body_snippet: snippet,
        }));
    }
    Ok(response.bytes()?.to_vec())
}

fn header_str(headers: &reqwest::header::HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

/// Downloads composite URIs into scoped temporary files, refusing network
/// access entirely in offline mode unless the innermost scheme is `file:`.
pub struct UriResourceFetcher<'a> {
    temp_space: &'a TemporarySpace,
    offline: bool,
}

impl<'a> UriResourceFetcher<'a> {
    pub fn new(temp_space: &'a TemporarySpace, offline: bool) -> Self {
        Self { temp_space, offline }
    }

    /// Fetches `uri`, materialising it under a temp file named
    /// `"<lastPathSegment>-<sha1(uri)>.<extensionHint>"` (or
    /// `"<sha1(uri)>.<extensionHint>"` if the resource has no path segment).
    ///
    /// Returns `Ok(None)` when the resource genuinely doesn't exist
    /// (§4.5's `NotFound` recovered to an empty optional at this boundary);
    /// any other failure propagates.
    pub fn fetch(&self, uri: &str, extension_hint: &str, set_executable: bool) -> Result<Option<PathBuf>> {
        let parsed = ParsedUri::parse(uri)?;
        if self.offline && parsed.innermost_scheme() != "file" {
            return Err(Error::offline(uri));
        }

        let bytes = match super::resolve_bytes(&parsed) {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        let last_segment = last_path_segment(&parsed);
        let digest = sha1_hex(uri);
        let file_name = match last_segment {
            Some(segment) => format!("{segment}-{digest}.{extension_hint}"),
            None => format!("{digest}.{extension_hint}"),
        };

        let dest_dir = self.temp_space.scoped_dir(&["fetch"])?;
        let dest_path = dest_dir.join(file_name);
        std::fs::write(&dest_path, &bytes).path_ctx(&dest_path)?;
        if set_executable {
            make_executable(&dest_path)?;
        }
        Ok(Some(dest_path))
    }
}

fn last_path_segment(parsed: &ParsedUri) -> Option<String> {
    let source = parsed.entry_paths.last().map(String::as_str).unwrap_or(&parsed.inner_url);
    let segment = Path::new(source).file_name()?.to_string_lossy().into_owned();
    if segment.is_empty() {
        None
    } else {
        Some(segment)
    }
}
