//! Utility functions
//!
use std::{collections::HashMap, fs::File, io::Cursor, path::Path};

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{header::CONTENT_TYPE, Client, Response, Url};

use crate::SignError;

/// Make sure a file exists at `filepath`, downloading it from `url` if it does not.
///
/// Returns `true` if a download happened. An existing file is never touched or validated.
pub async fn ensure_file(
    client: &Client,
    url: &str,
    filepath: impl AsRef<Path>,
) -> Result<bool, SignError> {
    let filepath = filepath.as_ref();
    if filepath.exists() {
        log::debug!("{} exists, skipping download", filepath.display());
        return Ok(false);
    }

    log::info!("Downloading {} to {}", url, filepath.display());
    download_file(client, url, filepath).await?;

    Ok(true)
}

/// Download a file from a URL to a given filepath.
///
/// Hosts like Google Drive answer requests for large files with an HTML page asking the user to
/// confirm the download. In that case the confirmation URL found on the page is requested once
/// and the answer to it is stored instead.
pub async fn download_file(
    client: &Client,
    url: &str,
    filepath: impl AsRef<Path>,
) -> Result<(), SignError> {
    let mut resp = get(client, url).await?;

    if is_html(&resp) {
        let page_url = resp.url().clone();
        let page = resp.text().await.map_err(|source| download_error(url, source))?;
        let confirm_url = confirmation_url(&page, &page_url)
            .ok_or_else(|| SignError::ConfirmationPage(url.to_owned()))?;

        log::info!("Confirming download via {}", confirm_url);
        resp = get(client, confirm_url.as_str()).await?;
        if is_html(&resp) {
            return Err(SignError::ConfirmationPage(url.to_owned()));
        }
    }

    let bytes = resp.bytes().await.map_err(|source| download_error(url, source))?;
    log::info!("Received {} bytes", bytes.len());

    let mut file = File::create(filepath)?;
    let mut content = Cursor::new(bytes);
    std::io::copy(&mut content, &mut file)?;

    Ok(())
}

async fn get(client: &Client, url: &str) -> Result<Response, SignError> {
    client
        .get(url)
        .send()
        .await
        .and_then(Response::error_for_status)
        .map_err(|source| download_error(url, source))
}

fn download_error(url: &str, source: reqwest::Error) -> SignError {
    SignError::Download {
        url: url.to_owned(),
        source,
    }
}

fn is_html(resp: &Response) -> bool {
    resp.headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("text/html"))
        .unwrap_or(false)
}

static FORM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<form\b[^>]*?\baction\s*=\s*"([^"]*)"[^>]*>(.*?)</form>"#)
        .expect("static regex")
});
static INPUT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<input\b[^>]*>").expect("static regex"));
static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)\b([a-z][a-z0-9_-]*)\s*=\s*"([^"]*)""#).expect("static regex")
});
static CONFIRM_HREF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)href\s*=\s*"(/uc\?export=download[^"]+)""#).expect("static regex")
});
static DOWNLOAD_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""downloadUrl"\s*:\s*"([^"]+)""#).expect("static regex"));

/// Find the URL that confirms a download on a confirmation page.
///
/// Understands a form with hidden inputs, a `/uc?export=download` link and an embedded
/// `"downloadUrl"` value. Relative URLs are resolved against `base`.
fn confirmation_url(page: &str, base: &Url) -> Option<Url> {
    form_url(page, base)
        .or_else(|| {
            let href = CONFIRM_HREF_RE.captures(page)?.get(1)?.as_str();
            base.join(&unescape(href)).ok()
        })
        .or_else(|| {
            let download_url = DOWNLOAD_URL_RE.captures(page)?.get(1)?.as_str();
            base.join(&unescape_js(download_url)).ok()
        })
}

/// URL submitted by the first form: its action with every hidden input as query parameter.
fn form_url(page: &str, base: &Url) -> Option<Url> {
    let form = FORM_RE.captures(page)?;
    let mut url = base.join(&unescape(form.get(1)?.as_str())).ok()?;

    {
        let mut query = url.query_pairs_mut();
        for input in INPUT_RE.find_iter(form.get(2)?.as_str()) {
            let attrs: HashMap<String, &str> = ATTR_RE
                .captures_iter(input.as_str())
                .filter_map(|cap| {
                    let name = cap.get(1)?.as_str().to_ascii_lowercase();
                    Some((name, cap.get(2)?.as_str()))
                })
                .collect();

            let hidden = attrs
                .get("type")
                .map_or(false, |kind| kind.eq_ignore_ascii_case("hidden"));
            if !hidden {
                continue;
            }
            if let (Some(name), Some(value)) = (attrs.get("name"), attrs.get("value")) {
                query.append_pair(&unescape(name), &unescape(value));
            }
        }
    }

    Some(url)
}

fn unescape(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Undo the escaping of URLs embedded in JavaScript strings.
fn unescape_js(value: &str) -> String {
    value
        .replace("\\u003d", "=")
        .replace("\\u0026", "&")
        .replace("\\/", "/")
}
