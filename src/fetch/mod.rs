// src/fetch/mod.rs
//! Source acquisition: turn a location string into a `RecordTable`.

use futures::StreamExt;
use reqwest::{header::HeaderMap, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{io::AsyncWriteExt, task, time::Instant};
use tracing::{debug, info};
use url::Url;

use crate::error::AcquisitionError;
use crate::process::{load_file, read_records, RecordTable};

pub mod cache;
pub mod drive;

pub use cache::SourceCache;

/// Where a table comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Url(Url),
    Drive { id: String },
    Path(PathBuf),
}

impl Location {
    /// Accepts `http(s)://…`, Drive share links, `gdrive:<id>`, `file://…` and plain paths.
    pub fn parse(raw: &str) -> Result<Self, AcquisitionError> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(AcquisitionError::InvalidLocation(raw.to_string()));
        }

        if let Some(id) = s.strip_prefix("gdrive:") {
            if id.is_empty() {
                return Err(AcquisitionError::InvalidLocation(raw.to_string()));
            }
            return Ok(Location::Drive { id: id.to_string() });
        }

        if s.starts_with("http://") || s.starts_with("https://") {
            let url = Url::parse(s).map_err(|_| AcquisitionError::InvalidLocation(raw.to_string()))?;
            return Ok(match drive::file_id_from_url(&url) {
                Some(id) => Location::Drive { id },
                None => Location::Url(url),
            });
        }

        if s.starts_with("file://") {
            return Url::parse(s)
                .ok()
                .and_then(|u| u.to_file_path().ok())
                .map(Location::Path)
                .ok_or_else(|| AcquisitionError::InvalidLocation(raw.to_string()));
        }

        if s.contains("://") {
            return Err(AcquisitionError::InvalidLocation(raw.to_string()));
        }
        Ok(Location::Path(PathBuf::from(s)))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Url(u) => write!(f, "{}", u),
            Location::Drive { id } => write!(f, "gdrive:{}", id),
            Location::Path(p) => write!(f, "{}", p.display()),
        }
    }
}

/// How remote sources are read.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Drive files are staged, other URLs streamed.
    #[default]
    Auto,
    /// Stream the HTTP body straight into the CSV reader.
    Direct,
    /// Download to a staging file, then read it locally.
    Staged,
}

/// Loads tables and memoizes them per `(location, row cap)` for the session.
pub struct Acquirer {
    client: Client,
    strategy: Strategy,
    staging_dir: PathBuf,
    drive_base: Url,
    cache: SourceCache,
}

impl Acquirer {
    pub fn new(strategy: Strategy, staging_dir: impl Into<PathBuf>) -> Result<Self, AcquisitionError> {
        let client = Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| AcquisitionError::Network {
                url: String::new(),
                source: e,
            })?;
        Ok(Self {
            client,
            strategy,
            staging_dir: staging_dir.into(),
            drive_base: drive::default_base(),
            cache: SourceCache::new(),
        })
    }

    /// Send Drive requests to `base` instead of `drive.google.com/uc`.
    pub fn with_drive_base(mut self, base: Url) -> Self {
        self.drive_base = base;
        self
    }

    pub fn cache(&self) -> &SourceCache {
        &self.cache
    }

    /// Load `location`, keeping only the first `row_cap` records when given.
    /// A repeated call with the same arguments returns the cached table.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn acquire(
        &mut self,
        location: &str,
        row_cap: Option<usize>,
    ) -> Result<Arc<RecordTable>, AcquisitionError> {
        if let Some(table) = self.cache.get(location, row_cap) {
            return Ok(table);
        }

        let parsed = Location::parse(location)?;
        let start = Instant::now();
        let table = match (&parsed, self.strategy) {
            (Location::Path(path), _) => read_local(path.clone(), row_cap).await?,
            (Location::Drive { id }, Strategy::Direct) => {
                read_direct(drive::download_url_at(&self.drive_base, id), row_cap).await?
            }
            (Location::Drive { id }, _) => self.read_drive_staged(id, row_cap).await?,
            (Location::Url(url), Strategy::Staged) => self.read_url_staged(url, row_cap).await?,
            (Location::Url(url), _) => read_direct(url.clone(), row_cap).await?,
        };

        info!(
            source = %parsed,
            rows = table.len(),
            columns = table.columns.len(),
            elapsed = ?start.elapsed(),
            "loaded table"
        );
        Ok(self.cache.insert(location, row_cap, table))
    }

    async fn read_drive_staged(
        &self,
        id: &str,
        row_cap: Option<usize>,
    ) -> Result<RecordTable, AcquisitionError> {
        let staged = self.staging_file()?;
        drive::download(&self.client, &self.drive_base, id, staged.path()).await?;
        read_staged(staged, row_cap).await
    }

    async fn read_url_staged(
        &self,
        url: &Url,
        row_cap: Option<usize>,
    ) -> Result<RecordTable, AcquisitionError> {
        let staged = self.staging_file()?;
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(network_error(url))?;
        if !resp.status().is_success() {
            return Err(status_error(url, resp.status()));
        }
        if is_html(resp.headers()) {
            return Err(AcquisitionError::NotTabular(format!("{} served an HTML page", url)));
        }
        let bytes = stream_to_file(resp, staged.path()).await?;
        debug!(%url, bytes, path = %staged.path().display(), "staged download");
        read_staged(staged, row_cap).await
    }

    fn staging_file(&self) -> Result<tempfile::NamedTempFile, AcquisitionError> {
        fs::create_dir_all(&self.staging_dir)?;
        Ok(tempfile::Builder::new()
            .prefix("cordscope-")
            .suffix(".download")
            .tempfile_in(&self.staging_dir)?)
    }
}

async fn read_local(path: PathBuf, row_cap: Option<usize>) -> Result<RecordTable, AcquisitionError> {
    task::spawn_blocking(move || load_file(&path, row_cap)).await?
}

/// The staging file is removed once the table is read.
async fn read_staged(
    staged: tempfile::NamedTempFile,
    row_cap: Option<usize>,
) -> Result<RecordTable, AcquisitionError> {
    task::spawn_blocking(move || load_file(staged.path(), row_cap)).await?
}

/// Stream `url` into the CSV reader, stopping once `row_cap` records are read.
async fn read_direct(url: Url, row_cap: Option<usize>) -> Result<RecordTable, AcquisitionError> {
    task::spawn_blocking(move || {
        let client = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(network_error(&url))?;
        let resp = client
            .get(url.as_str())
            .send()
            .map_err(network_error(&url))?;
        if !resp.status().is_success() {
            return Err(status_error(&url, resp.status()));
        }
        if is_html(resp.headers()) {
            return Err(AcquisitionError::NotTabular(format!(
                "{} served an HTML page; try the staged strategy",
                url
            )));
        }
        read_records(resp, row_cap)
    })
    .await?
}

pub(crate) async fn stream_to_file(
    resp: reqwest::Response,
    dest: &Path,
) -> Result<u64, AcquisitionError> {
    let url = resp.url().clone();
    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = resp.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(network_error(&url))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

pub(crate) fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.to_ascii_lowercase().starts_with("text/html"))
        .unwrap_or(false)
}

pub(crate) fn network_error(url: &Url) -> impl FnOnce(reqwest::Error) -> AcquisitionError {
    let url = url.to_string();
    move |source| AcquisitionError::Network { url, source }
}

pub(crate) fn status_error(url: &Url, status: StatusCode) -> AcquisitionError {
    AcquisitionError::Status {
        url: url.to_string(),
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{init_test_logging, serve, Reply};
    use reqwest::header::{HeaderValue, CONTENT_TYPE};
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    const METADATA: &str = "cord_uid,title,publish_time\n\
a1,Alpha,2020-03-01\n\
a2,Beta,2019\n\
a3,Gamma,2021-06-30\n\
a4,Delta,2020\n";

    fn staging_entries(dir: &Path) -> usize {
        fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    fn csv_file(content: &str) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(content.as_bytes()).unwrap();
        tmp
    }

    #[test]
    fn parses_location_forms() {
        init_test_logging();
        assert!(matches!(
            Location::parse("https://example.org/metadata.csv").unwrap(),
            Location::Url(_)
        ));
        assert_eq!(
            Location::parse("https://drive.google.com/uc?export=download&id=1xNK8").unwrap(),
            Location::Drive { id: "1xNK8".into() }
        );
        assert_eq!(
            Location::parse("gdrive:abc").unwrap(),
            Location::Drive { id: "abc".into() }
        );
        assert_eq!(
            Location::parse("data/metadata.csv").unwrap(),
            Location::Path(PathBuf::from("data/metadata.csv"))
        );
        assert_eq!(
            Location::parse("file:///tmp/metadata.csv").unwrap(),
            Location::Path(PathBuf::from("/tmp/metadata.csv"))
        );
    }

    #[test]
    fn rejects_bad_locations() {
        init_test_logging();
        for bad in ["", "   ", "gdrive:", "ftp://host/file.csv"] {
            assert!(
                matches!(Location::parse(bad), Err(AcquisitionError::InvalidLocation(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn html_content_type_is_detected() {
        init_test_logging();
        let mut h = HeaderMap::new();
        assert!(!is_html(&h));
        h.insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
        assert!(is_html(&h));
        h.insert(CONTENT_TYPE, HeaderValue::from_static("text/csv"));
        assert!(!is_html(&h));
    }

    #[tokio::test]
    async fn acquires_local_file_with_row_cap() {
        init_test_logging();
        let tmp = csv_file("id,publish_time\n1,2020\n2,2021\n3,2022\n");
        let dir = tempdir().unwrap();
        let mut acq = Acquirer::new(Strategy::Auto, dir.path()).unwrap();

        let loc = tmp.path().to_string_lossy().to_string();
        let capped = acq.acquire(&loc, Some(2)).await.unwrap();
        assert_eq!(capped.len(), 2);
        let full = acq.acquire(&loc, None).await.unwrap();
        assert_eq!(full.len(), 3);
        assert_eq!(acq.cache().len(), 2);
    }

    #[tokio::test]
    async fn repeated_acquire_is_served_from_cache() {
        init_test_logging();
        let tmp = csv_file("id,publish_time\n1,2020\n");
        let dir = tempdir().unwrap();
        let mut acq = Acquirer::new(Strategy::Auto, dir.path()).unwrap();
        let loc = tmp.path().to_string_lossy().to_string();

        let first = acq.acquire(&loc, Some(50_000)).await.unwrap();

        // change the source; the cached table must not be re-read
        std::fs::write(tmp.path(), "other\nx\ny\n").unwrap();

        let second = acq.acquire(&loc, Some(50_000)).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.columns, vec!["id", "publish_time"]);
        assert_eq!(acq.cache().hits(), 1);

        let fresh = acq.acquire(&loc, None).await.unwrap();
        assert_eq!(fresh.columns, vec!["other"]);
    }

    #[tokio::test]
    async fn missing_file_is_an_acquisition_error() {
        init_test_logging();
        let dir = tempdir().unwrap();
        let mut acq = Acquirer::new(Strategy::Auto, dir.path()).unwrap();
        let missing = dir.path().join("nope.csv");
        let err = acq
            .acquire(&missing.to_string_lossy(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::Io(_)));
        assert!(acq.cache().is_empty());
    }

    #[tokio::test]
    async fn every_strategy_reads_a_url_with_row_cap() {
        init_test_logging();
        let server = serve(|req| match req.url.path() {
            "/metadata.csv" => Reply::csv(METADATA),
            _ => Reply::not_found(),
        })
        .await;
        let loc = server.url("metadata.csv").to_string();

        for strategy in [Strategy::Direct, Strategy::Staged, Strategy::Auto] {
            let dir = tempdir().unwrap();
            let mut acq = Acquirer::new(strategy, dir.path()).unwrap();
            let table = acq.acquire(&loc, Some(2)).await.unwrap();
            assert_eq!(table.len(), 2, "{strategy:?}");
            assert_eq!(table.columns, vec!["cord_uid", "title", "publish_time"]);
            assert_eq!(table.rows[1][1].to_string(), "Beta");
            assert_eq!(staging_entries(dir.path()), 0, "{strategy:?} left a staging file");
        }
        assert_eq!(server.hits(), 3);
    }

    #[tokio::test]
    async fn http_error_status_is_reported() {
        init_test_logging();
        let server = serve(|_| Reply::not_found()).await;
        let loc = server.url("missing.csv").to_string();

        for strategy in [Strategy::Direct, Strategy::Staged] {
            let dir = tempdir().unwrap();
            let mut acq = Acquirer::new(strategy, dir.path()).unwrap();
            match acq.acquire(&loc, None).await {
                Err(AcquisitionError::Status { status, .. }) => {
                    assert_eq!(status, StatusCode::NOT_FOUND, "{strategy:?}")
                }
                other => panic!("{strategy:?}: unexpected {other:?}"),
            }
            assert!(acq.cache().is_empty());
        }
    }

    #[tokio::test]
    async fn html_response_is_not_tabular() {
        init_test_logging();
        let server = serve(|_| Reply::html("<html><body>Sign in</body></html>")).await;
        let loc = server.url("metadata.csv").to_string();

        for strategy in [Strategy::Direct, Strategy::Staged] {
            let dir = tempdir().unwrap();
            let mut acq = Acquirer::new(strategy, dir.path()).unwrap();
            let err = acq.acquire(&loc, None).await.unwrap_err();
            assert!(matches!(err, AcquisitionError::NotTabular(_)), "{strategy:?}: {err:?}");
            assert_eq!(staging_entries(dir.path()), 0);
        }
    }

    #[tokio::test]
    async fn drive_sources_go_through_the_drive_endpoint() {
        init_test_logging();
        let server = serve(|req| {
            let id = req
                .url
                .query_pairs()
                .find(|(k, _)| k == "id")
                .map(|(_, v)| v.into_owned());
            match (req.url.path(), id.as_deref()) {
                ("/uc", Some("abc123")) => Reply::csv(METADATA),
                _ => Reply::not_found(),
            }
        })
        .await;

        for strategy in [Strategy::Auto, Strategy::Direct] {
            let dir = tempdir().unwrap();
            let mut acq = Acquirer::new(strategy, dir.path())
                .unwrap()
                .with_drive_base(server.url("uc"));
            let table = acq.acquire("gdrive:abc123", Some(3)).await.unwrap();
            assert_eq!(table.len(), 3, "{strategy:?}");
        }
    }
}
