//! `download_from_link` and the subtitle sub-protocol, grounded
//! on the original's `exec_step_download_from_link` / `download_subtitle_direct`
//! / `extract_vtt_content`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use reqwest::Url;

use crate::browser::AgenticBrowser;
use crate::error::{Error, Result};

/// A realistic desktop User-Agent for the direct-HTTP fallback.
const DOWNLOAD_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const SUBTITLE_POLL_ATTEMPTS: u32 = 10;
const SUBTITLE_POLL_INTERVAL: Duration = Duration::from_secs(1);
const SUBTITLE_MIN_LEN: usize = 10;
const MAX_HTTP_RETRIES: u32 = 3;
const HTTP_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Replaces filesystem-hostile characters with `_`.
pub fn sanitize_filename(name: &str) -> String {
    let trimmed = name.trim();
    let base = if trimmed.is_empty() { "download" } else { trimmed };
    let mut out = String::with_capacity(base.len());
    for ch in base.chars() {
        if matches!(ch, '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|') {
            out.push('_');
        } else {
            out.push(ch);
        }
    }
    out
}

/// Absolutizes `href` against `page_url` if it is relative.
pub fn absolutize(page_url: &str, href: &str) -> Result<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Ok(href.to_string());
    }
    let base = Url::parse(page_url).map_err(|e| Error::ConfigError(format!("invalid page URL: {e}")))?;
    let joined = base
        .join(href)
        .map_err(|e| Error::ConfigError(format!("cannot resolve relative href '{href}': {e}")))?;
    Ok(joined.to_string())
}

/// Determines the download extension: explicit field
/// wins, then the URL's `fileExtension=` query parameter, then the final
/// dotted path segment, then `.mp4`.
pub fn resolve_extension(explicit: Option<&str>, url: &str) -> String {
    if let Some(ext) = explicit {
        return normalize_ext(ext);
    }
    if let Ok(parsed) = Url::parse(url) {
        if let Some(qp) = parsed.query_pairs().find(|(k, _)| k == "fileExtension") {
            return normalize_ext(&qp.1);
        }
        let path = parsed.path();
        if let Some(last_segment) = path.rsplit('/').next() {
            if let Some(dot) = last_segment.rfind('.') {
                let ext = &last_segment[dot + 1..];
                if !ext.is_empty() {
                    return normalize_ext(ext);
                }
            }
        }
    }
    ".mp4".to_string()
}

fn normalize_ext(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches('.');
    format!(".{}", trimmed.to_lowercase())
}

/// Builds the output path: `{sanitized page title}_{index}{.ext}` in
/// `download_dir`.
pub fn build_output_path(download_dir: &Path, page_title: &str, index: i64, ext: &str) -> PathBuf {
    let safe_title = sanitize_filename(page_title);
    download_dir.join(format!("{safe_title}_{index}{ext}"))
}

/// Everything `download_from_link` needs, already extracted from the step
/// and locator resolution.
pub struct DownloadRequest<'a> {
    pub href: &'a str,
    pub page_url: &'a str,
    pub page_title: &'a str,
    pub index: i64,
    pub explicit_extension: Option<&'a str>,
    pub download_dir: &'a Path,
}

pub struct DownloadOutcome {
    pub path: PathBuf,
    pub via_subtitle_protocol: bool,
}

/// Runs the full `download_from_link` protocol.
pub async fn download_from_link(
    browser: &AgenticBrowser,
    req: DownloadRequest<'_>,
) -> Result<DownloadOutcome> {
    let absolute = absolutize(req.page_url, req.href)?;
    let ext = resolve_extension(req.explicit_extension, &absolute);
    let out_path = build_output_path(req.download_dir, req.page_title, req.index, &ext);

    if let Some(parent) = out_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    if matches!(ext.as_str(), ".vtt" | ".srt") {
        if download_subtitle(browser, &absolute, &out_path).await? {
            return Ok(DownloadOutcome {
                path: out_path,
                via_subtitle_protocol: true,
            });
        }
    }

    download_direct(&absolute, &out_path).await?;
    Ok(DownloadOutcome {
        path: out_path,
        via_subtitle_protocol: false,
    })
}

/// The subtitle sub-protocol: open the URL in a fresh page of
/// the same browser context, poll up to ~10s for `WEBVTT`/`<pre>` on a 202
/// response, extract the text, and fall through to direct HTTP if the
/// extracted content is too short.
async fn download_subtitle(browser: &AgenticBrowser, url: &str, out_path: &Path) -> Result<bool> {
    let page = match browser.new_page(url).await {
        Ok(p) => p,
        Err(_) => return Ok(false),
    };

    let mut content = String::new();
    for attempt in 0..SUBTITLE_POLL_ATTEMPTS {
        let html = page.html().await.unwrap_or_default();
        if html.contains("WEBVTT") || html.contains("<pre") {
            content = html;
            break;
        }
        if attempt + 1 < SUBTITLE_POLL_ATTEMPTS {
            tokio::time::sleep(SUBTITLE_POLL_INTERVAL).await;
        } else {
            content = html;
        }
    }

    let _ = page.close().await;

    let extracted = extract_vtt_content(&content);
    if extracted.trim().len() < SUBTITLE_MIN_LEN {
        return Ok(false);
    }

    tokio::fs::write(out_path, extracted).await?;
    Ok(true)
}

/// Extracts subtitle text from served HTML: `<pre>` contents
/// first, then `<body>` contents, then the raw body — each with HTML tags
/// stripped and entities decoded. Grounded on the original's
/// `extract_vtt_content` regex pipeline.
pub fn extract_vtt_content(html: &str) -> String {
    let pre_re = Regex::new(r"(?is)<pre[^>]*>(.*?)</pre>").unwrap();
    if let Some(caps) = pre_re.captures(html) {
        return clean_fragment(&caps[1]);
    }
    let body_re = Regex::new(r"(?is)<body[^>]*>(.*?)</body>").unwrap();
    if let Some(caps) = body_re.captures(html) {
        return clean_fragment(&caps[1]);
    }
    html.to_string()
}

fn clean_fragment(fragment: &str) -> String {
    let tag_re = Regex::new(r"(?s)<[^>]+>").unwrap();
    let stripped = tag_re.replace_all(fragment, "");
    decode_html_entities(&stripped).trim().to_string()
}

/// Minimal HTML entity decoder covering the handful of entities subtitle
/// markup actually uses (no full named-entity table dependency needed).
fn decode_html_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'&' {
            if let Some(semi) = s[i..].find(';').map(|p| p + i) {
                let entity = &s[i + 1..semi];
                if let Some(decoded) = decode_entity(entity) {
                    out.push(decoded);
                    i = semi + 1;
                    continue;
                }
            }
        }
        let ch = s[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "#39" | "apos" => Some('\''),
        "nbsp" => Some('\u{00a0}'),
        _ => {
            if let Some(code) = entity.strip_prefix('#') {
                if let Some(hex) = code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
                    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
                } else {
                    code.parse::<u32>().ok().and_then(char::from_u32)
                }
            } else {
                None
            }
        }
    }
}

/// Direct HTTP GET download: realistic User-Agent, up to
/// 3 retries with 1s backoff, 200/202/206 treated as success.
async fn download_direct(url: &str, out_path: &Path) -> Result<()> {
    let client = reqwest::Client::builder()
        .user_agent(DOWNLOAD_USER_AGENT)
        .build()
        .map_err(|e| Error::IoError(std::io::Error::other(format!("failed to build HTTP client: {e}"))))?;

    let mut last_err: Option<Error> = None;
    for attempt in 0..=MAX_HTTP_RETRIES {
        match try_download(&client, url, out_path).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                last_err = Some(e);
                if attempt < MAX_HTTP_RETRIES {
                    tokio::time::sleep(HTTP_RETRY_BACKOFF).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| Error::IoError(std::io::Error::other("download failed"))))
}

async fn try_download(client: &reqwest::Client, url: &str, out_path: &Path) -> Result<()> {
    use futures::StreamExt;
    use tokio::io::AsyncWriteExt;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::IoError(std::io::Error::other(format!("download request failed: {e}"))))?;

    let status = response.status().as_u16();
    if !matches!(status, 200 | 202 | 206) {
        return Err(Error::IoError(std::io::Error::other(format!("download failed with status {status}"))));
    }

    let mut file = tokio::fs::File::create(out_path).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Error::IoError(std::io::Error::other(format!("download stream error: {e}"))))?;
        file.write_all(&chunk).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_reserved_filesystem_characters() {
        assert_eq!(sanitize_filename("a/b\\c*d?e:f\"g<h>i|j"), "a_b_c_d_e_f_g_h_i_j");
    }

    #[test]
    fn empty_title_falls_back_to_default() {
        assert_eq!(sanitize_filename("   "), "download");
    }

    #[test]
    fn absolutizes_relative_href() {
        let abs = absolutize("https://host.example/path/", "./sub.vtt").unwrap();
        assert_eq!(abs, "https://host.example/path/sub.vtt");
    }

    #[test]
    fn absolute_href_is_unchanged() {
        let abs = absolutize("https://host.example/a/", "https://other.example/x.mp4").unwrap();
        assert_eq!(abs, "https://other.example/x.mp4");
    }

    #[test]
    fn extension_prefers_explicit_field() {
        assert_eq!(resolve_extension(Some("srt"), "https://h/x.mp4"), ".srt");
    }

    #[test]
    fn extension_falls_back_to_query_param() {
        assert_eq!(
            resolve_extension(None, "https://h/d?fileExtension=vtt&x=1"),
            ".vtt"
        );
    }

    #[test]
    fn extension_falls_back_to_path_segment() {
        assert_eq!(resolve_extension(None, "https://h/video.mkv"), ".mkv");
    }

    #[test]
    fn extension_defaults_to_mp4() {
        assert_eq!(resolve_extension(None, "https://h/download"), ".mp4");
    }

    #[test]
    fn output_path_matches_documented_format() {
        let path = build_output_path(Path::new("/tmp/out"), "My: Title", 1, ".vtt");
        assert_eq!(path, Path::new("/tmp/out/My_ Title_1.vtt"));
    }

    #[test]
    fn extracts_pre_tag_content_and_decodes_entities() {
        let html = "<html><body><pre>WEBVTT\n\n1\n00:00&amp;00:01\nHi</pre></body></html>";
        let extracted = extract_vtt_content(html);
        assert!(extracted.starts_with("WEBVTT"));
        assert!(extracted.contains("00:00&00:01"));
    }

    #[test]
    fn falls_back_to_body_when_no_pre_tag() {
        let html = "<html><body>WEBVTT plain text</body></html>";
        assert_eq!(extract_vtt_content(html), "WEBVTT plain text");
    }
}
