//! Site snapshots via an external mirroring tool.
//!
//! [`extract_website`] runs `wget` in mirror mode against one host and, if
//! that fails for any reason, falls back to a single-page HTTP capture saved
//! as `index.html`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use url::Url;
use walkdir::WalkDir;

use crate::fetch::{BROWSER_ACCEPT, FetchConfig, fetch_url, parse_site_url};
use crate::{Result, SpliceError};

/// wget exit status for "server issued an error response".
///
/// Raised when any single requisite fails, so it is tolerated as long as a
/// page was saved.
const WGET_SERVER_ERROR: i32 = 8;

/// Configuration for the mirroring subprocess and its fallback.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Path or name of the `wget` binary.
    pub wget_path: PathBuf,
    /// Overall timeout for the mirroring subprocess in seconds.
    pub timeout: u64,
    /// Per-request timeout handed to `wget` in seconds.
    pub request_timeout: u64,
    /// Number of tries per resource.
    pub tries: u32,
    /// Whether to fall back to a single-page HTTP fetch.
    pub fallback: bool,
    /// Settings for the fallback fetch (also supplies the User-Agent for `wget`).
    pub fetch: FetchConfig,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            wget_path: PathBuf::from("wget"),
            timeout: 300,
            request_timeout: 30,
            tries: 3,
            fallback: true,
            fetch: FetchConfig::default(),
        }
    }
}

/// How a snapshot was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMethod {
    /// Recursive mirror with page requisites.
    Mirror,
    /// Single page fetched over HTTP.
    Fallback,
}

/// A locally mirrored copy of a website.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSnapshot {
    /// Directory holding the mirrored files.
    pub root: PathBuf,
    /// Sanitized domain used as the directory name.
    pub domain: String,
    /// URL the snapshot was taken from, if known.
    pub url: Option<String>,
    /// How the snapshot was captured, if known.
    pub method: Option<CaptureMethod>,
}

impl SiteSnapshot {
    /// Opens an existing snapshot directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(SpliceError::FileNotFound(root));
        }
        let domain = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { root, domain, url: None, method: None })
    }

    /// All `.html`/`.htm` files in the snapshot, sorted by path.
    pub fn html_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| is_html_file(path))
            .collect();
        files.sort();
        files
    }

    /// The page screenshots are matched against.
    ///
    /// Prefers the shallowest `index.html`, then the shallowest HTML file.
    pub fn root_page(&self) -> Result<PathBuf> {
        let files = self.html_files();
        let depth = |p: &PathBuf| p.strip_prefix(&self.root).map(|r| r.components().count()).unwrap_or(usize::MAX);

        let index = files
            .iter()
            .filter(|p| p.file_name().is_some_and(|n| n.eq_ignore_ascii_case("index.html")))
            .min_by_key(|p| depth(p));

        index
            .or_else(|| files.iter().min_by_key(|p| depth(p)))
            .cloned()
            .ok_or_else(|| SpliceError::NoHtmlFiles(self.root.clone()))
    }
}

/// Summary entry for a snapshot directory listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub name: String,
    pub path: PathBuf,
}

/// Lists snapshot directories under `sites_dir`, sorted by name.
///
/// A missing `sites_dir` yields an empty list.
pub fn list_snapshots(sites_dir: &Path) -> Result<Vec<SnapshotEntry>> {
    if !sites_dir.exists() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(sites_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            entries.push(SnapshotEntry { name: entry.file_name().to_string_lossy().into_owned(), path: entry.path() });
        }
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

fn is_html_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
}

/// Directory name for a URL's host: dots become underscores, a non-default
/// port is appended.
///
/// `https://www.example.com` becomes `www_example_com`,
/// `http://127.0.0.1:8080` becomes `127_0_0_1_8080`.
pub fn sanitize_domain(url: &Url) -> String {
    let host = url.host_str().unwrap_or("unknown");
    let mut name: String = host
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();

    if let Some(port) = url.port() {
        name.push('_');
        name.push_str(&port.to_string());
    }
    name
}

/// Mirrors `url` into `<sites_dir>/<sanitized domain>`.
///
/// Any previous snapshot of the same domain is removed first. If the
/// mirroring tool fails and `config.fallback` is set, the page is fetched
/// once over HTTP instead and saved as `index.html`; the fallback's own
/// error is returned if that fails too.
pub async fn extract_website(url: &str, sites_dir: &Path, config: &MirrorConfig) -> Result<SiteSnapshot> {
    let parsed = parse_site_url(url)?;
    let domain = sanitize_domain(&parsed);
    let root = sites_dir.join(&domain);

    reset_dir(&root)?;

    let method = match run_mirror(&parsed, &root, config).await {
        Ok(()) => CaptureMethod::Mirror,
        Err(err) if config.fallback => {
            tracing::warn!(url, error = %err, "mirroring failed, falling back to single-page fetch");
            reset_dir(&root)?;
            fetch_single_page(url, &root, &config.fetch).await?;
            CaptureMethod::Fallback
        }
        Err(err) => return Err(err),
    };

    tracing::info!(url, root = %root.display(), ?method, "website extracted");

    Ok(SiteSnapshot { root, domain, url: Some(url.to_string()), method: Some(method) })
}

fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Arguments passed to `wget` for a host-scoped mirror into `root`.
pub fn mirror_args(url: &Url, root: &Path, config: &MirrorConfig) -> Vec<String> {
    vec![
        "--mirror".to_string(),
        "--convert-links".to_string(),
        "--adjust-extension".to_string(),
        "--page-requisites".to_string(),
        "--no-parent".to_string(),
        "--no-host-directories".to_string(),
        "--no-verbose".to_string(),
        format!("--user-agent={}", config.fetch.user_agent),
        format!("--header=Accept: {BROWSER_ACCEPT}"),
        "--header=Accept-Language: en-US,en;q=0.5".to_string(),
        format!("--timeout={}", config.request_timeout),
        format!("--tries={}", config.tries),
        "--retry-connrefused".to_string(),
        "--directory-prefix".to_string(),
        root.to_string_lossy().into_owned(),
        url.to_string(),
    ]
}

async fn run_mirror(url: &Url, root: &Path, config: &MirrorConfig) -> Result<()> {
    let tool = config.wget_path.to_string_lossy().into_owned();
    let args = mirror_args(url, root, config);
    tracing::debug!(tool = %tool, ?args, "running mirroring tool");

    let child = Command::new(&config.wget_path)
        .args(&args)
        .current_dir(root)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => SpliceError::ToolUnavailable { tool: tool.clone() },
            _ => SpliceError::Io(e),
        })?;

    let output = tokio::time::timeout(Duration::from_secs(config.timeout), child.wait_with_output())
        .await
        .map_err(|_| SpliceError::ConnectionFailed {
            detail: format!("{tool} did not finish within {}s", config.timeout),
        })??;

    let code = output.status.code();
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if code == Some(WGET_SERVER_ERROR) && !stderr.contains("403 Forbidden") {
        let snapshot = SiteSnapshot { root: root.to_path_buf(), domain: String::new(), url: None, method: None };
        if !snapshot.html_files().is_empty() {
            tracing::debug!("mirror finished with server errors on some requisites");
            return Ok(());
        }
    }

    Err(classify_mirror_failure(code, &stderr))
}

/// Maps a failed mirror run to an error category using its stderr.
pub fn classify_mirror_failure(code: Option<i32>, stderr: &str) -> SpliceError {
    let detail = stderr.trim().lines().last().unwrap_or_default().to_string();
    let lower = stderr.to_lowercase();

    if stderr.contains("403 Forbidden") {
        SpliceError::Blocked { detail }
    } else if stderr.contains("404 Not Found") {
        SpliceError::NotFound { detail }
    } else if lower.contains("connection refused")
        || lower.contains("unable to resolve")
        || lower.contains("name or service not known")
        || lower.contains("connection timed out")
        || lower.contains("failed: network is unreachable")
    {
        SpliceError::ConnectionFailed { detail }
    } else {
        SpliceError::MirrorFailed { code, stderr: stderr.trim().to_string() }
    }
}

async fn fetch_single_page(url: &str, root: &Path, config: &FetchConfig) -> Result<()> {
    let html = fetch_url(url, config).await?;
    let index = root.join("index.html");
    fs::write(&index, html)?;
    tracing::info!(index = %index.display(), "saved single-page capture");
    Ok(())
}
