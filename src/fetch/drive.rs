// src/fetch/drive.rs
//! Google Drive downloads, including the "can't scan for viruses" confirmation hop.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use std::path::Path;
use tracing::{debug, info, warn};
use url::Url;

use super::{is_html, network_error, status_error, stream_to_file};
use crate::error::AcquisitionError;

const DRIVE_DOWNLOAD_URL: &str = "https://drive.google.com/uc";
const DRIVE_HOSTS: &[&str] = &["drive.google.com", "docs.google.com", "drive.usercontent.google.com"];
const MAX_CONFIRM_HOPS: usize = 3;

static FORM_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("form#download-form").expect("selector should parse"));
static HIDDEN_INPUT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"input[type="hidden"]"#).expect("selector should parse"));
static CONFIRM_LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href*="confirm="]"#).expect("selector should parse"));
static CONFIRM_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"confirm=([0-9A-Za-z_\-]+)").expect("valid regex"));
static FILE_PATH_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/file/d/([0-9A-Za-z_\-]+)").expect("valid regex"));

/// Extract a Drive file id from a share or download URL.
pub fn file_id_from_url(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    if !DRIVE_HOSTS.contains(&host) {
        return None;
    }
    if let Some((_, id)) = url.query_pairs().find(|(k, _)| k == "id") {
        if !id.is_empty() {
            return Some(id.into_owned());
        }
    }
    FILE_PATH_ID
        .captures(url.path())
        .map(|caps| caps[1].to_string())
}

/// The public Drive download endpoint.
pub fn default_base() -> Url {
    Url::parse(DRIVE_DOWNLOAD_URL).expect("static Drive URL should parse")
}

/// `https://drive.google.com/uc?export=download&id=<id>`
pub fn download_url(id: &str) -> Url {
    download_url_at(&default_base(), id)
}

/// `<base>?export=download&id=<id>`
pub fn download_url_at(base: &Url, id: &str) -> Url {
    let mut url = base.clone();
    url.set_query(None);
    url.query_pairs_mut()
        .append_pair("export", "download")
        .append_pair("id", id);
    url
}

fn with_confirm(base: &Url, id: &str, token: &str) -> Url {
    let mut url = download_url_at(base, id);
    url.query_pairs_mut().append_pair("confirm", token);
    url
}

/// Work out where the confirmation page wants us to go next.
///
/// Tries, in order: the `download-form` form, a `confirm=` link, a bare
/// `confirm=<token>` anywhere in the body.
pub fn confirm_url(html: &str, page: &Url, id: &str) -> Option<Url> {
    let doc = Html::parse_document(html);

    if let Some(form) = doc.select(&FORM_SELECTOR).next() {
        let action = form.value().attr("action").unwrap_or(page.path());
        if let Ok(mut url) = page.join(action) {
            {
                let mut pairs = url.query_pairs_mut();
                for input in form.select(&HIDDEN_INPUT_SELECTOR) {
                    if let Some(name) = input.value().attr("name") {
                        pairs.append_pair(name, input.value().attr("value").unwrap_or(""));
                    }
                }
            }
            return Some(url);
        }
    }

    if let Some(href) = doc
        .select(&CONFIRM_LINK_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .next()
    {
        if let Ok(url) = page.join(href) {
            return Some(url);
        }
    }

    CONFIRM_TOKEN
        .captures(html)
        .map(|caps| with_confirm(page, id, &caps[1]))
}

/// Download Drive file `id` from the endpoint at `base` into `dest`,
/// following confirmation pages. Returns the number of bytes written.
pub async fn download(
    client: &Client,
    base: &Url,
    id: &str,
    dest: &Path,
) -> Result<u64, AcquisitionError> {
    let mut url = download_url_at(base, id);

    for hop in 0..=MAX_CONFIRM_HOPS {
        debug!(%url, hop, "requesting Drive download");
        let resp = client
            .get(url.clone())
            .send()
            .await
            .map_err(network_error(&url))?;
        if !resp.status().is_success() {
            return Err(status_error(&url, resp.status()));
        }

        if !is_html(resp.headers()) {
            let bytes = stream_to_file(resp, dest).await?;
            info!(id, bytes, "Drive download complete");
            return Ok(bytes);
        }

        let cookie_token = resp
            .cookies()
            .find(|c| c.name().starts_with("download_warning"))
            .map(|c| c.value().to_string());
        let page = resp.url().clone();
        let body = resp.text().await.map_err(network_error(&url))?;

        url = match cookie_token {
            Some(token) => with_confirm(base, id, &token),
            None => confirm_url(&body, &page, id)
                .ok_or_else(|| AcquisitionError::Confirmation(id.to_string()))?,
        };
        warn!(id, next = %url, "Drive returned a confirmation page");
    }

    Err(AcquisitionError::Confirmation(id.to_string()))
}
