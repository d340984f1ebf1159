use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, State};
use axum::response::{Html, IntoResponse};
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use splice_core::{
    AssemblyRequest, MatchHint, MatchOutcome, PageSpec, Screenshot, SiteSnapshot, list_screenshots, list_snapshots,
    suggest_names_or_default,
};

use crate::AppState;
use crate::error::{ApiError, ApiResult};

const UPLOAD_FIELD: &str = "screenshot";

pub async fn index() -> impl IntoResponse {
    Html(include_str!("index.html"))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct ExtractWebsiteRequest {
    #[serde(default)]
    pub url: String,
}

pub async fn extract_website(
    State(state): State<Arc<AppState>>, Json(req): Json<ExtractWebsiteRequest>,
) -> ApiResult<Json<Value>> {
    let url = req.url.trim();
    if url.is_empty() {
        return Err(ApiError::InvalidInput("URL is required".to_string()));
    }

    let snapshot = splice_core::extract_website(url, &state.workspace.sites_path(), &state.mirror).await?;
    let site_folder = snapshot.root.display().to_string();

    Ok(Json(json!({
        "success": true,
        "site_folder": site_folder,
        "domain": snapshot.domain,
        "method": snapshot.method,
        "message": format!("Website extracted successfully to {}", site_folder),
    })))
}

/// Stores an uploaded screenshot under a content-derived name.
pub async fn upload_screenshot(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> ApiResult<Json<Value>> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::InvalidInput(e.to_string()))? {
        if field.name() == Some(UPLOAD_FIELD) {
            let bytes = field.bytes().await.map_err(|e| ApiError::InvalidInput(e.to_string()))?;
            upload = Some(bytes.to_vec());
            break;
        }
    }
    let bytes = upload.ok_or_else(|| ApiError::InvalidInput("No screenshot file provided".to_string()))?;

    let dir = state.workspace.screenshots_path();
    let (path, width, height) = tokio::task::spawn_blocking(move || save_screenshot(&dir, bytes)).await??;
    let filename = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();

    tracing::info!(file = %filename, width, height, "screenshot uploaded");
    Ok(Json(json!({
        "success": true,
        "screenshot_path": path.display().to_string(),
        "filename": filename,
        "width": width,
        "height": height,
    })))
}

fn save_screenshot(dir: &Path, bytes: Vec<u8>) -> ApiResult<(PathBuf, u32, u32)> {
    let shot = Screenshot::from_bytes(bytes)?;
    let digest = format!("{:x}", Sha256::digest(shot.bytes()));
    let ext = shot.mime().strip_prefix("image/").unwrap_or("png");
    let path = dir.join(format!("{}.{}", &digest[..16], ext));

    fs::create_dir_all(dir).map_err(splice_core::SpliceError::from)?;
    fs::write(&path, shot.bytes()).map_err(splice_core::SpliceError::from)?;

    let features = shot.features();
    Ok((path, features.width, features.height))
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub screenshot_path: String,
    #[serde(default)]
    pub site_folder: String,
    pub section_name: Option<String>,
    pub hint: Option<String>,
    pub api_key: Option<String>,
}

pub async fn analyze_section(
    State(state): State<Arc<AppState>>, Json(req): Json<AnalyzeRequest>,
) -> ApiResult<Json<Value>> {
    if req.screenshot_path.trim().is_empty() || req.site_folder.trim().is_empty() {
        return Err(ApiError::InvalidInput("Screenshot path and site folder are required".to_string()));
    }

    let shot_path = state.screenshot_path(&req.screenshot_path)?;
    let site_root = state.site_path(&req.site_folder)?;
    let snapshot = SiteSnapshot::open(site_root)?;
    let shot = tokio::task::spawn_blocking(move || Screenshot::open(&shot_path)).await??;

    let mut hint = MatchHint::new(req.section_name.unwrap_or_default());
    if let Some(text) = req.hint.filter(|t| !t.trim().is_empty()) {
        hint = hint.with_text(text);
    }

    let matcher = state.matcher(req.api_key)?;
    match matcher.match_snapshot(&snapshot, &shot, &hint).await? {
        MatchOutcome::Matched(section_info) => Ok(Json(json!({ "success": true, "section_info": section_info }))),
        MatchOutcome::NoMatch { best_score, floor } => Err(ApiError::NoMatch { best_score, floor }),
    }
}

#[derive(Debug, Deserialize)]
pub struct SectionInfo {
    pub html_file: Option<String>,
    pub css_selector: String,
}

#[derive(Debug, Deserialize)]
pub struct ExtractSectionRequest {
    #[serde(default)]
    pub site_folder: String,
    pub section_info: Option<SectionInfo>,
    #[serde(default)]
    pub section_name: String,
}

pub async fn extract_section(
    State(state): State<Arc<AppState>>, Json(req): Json<ExtractSectionRequest>,
) -> ApiResult<Json<Value>> {
    let Some(info) = req.section_info else {
        return Err(ApiError::InvalidInput("Site folder and section info are required".to_string()));
    };
    if req.site_folder.trim().is_empty() {
        return Err(ApiError::InvalidInput("Site folder and section info are required".to_string()));
    }

    let site_root = state.site_path(&req.site_folder)?;
    let page = match info.html_file.as_deref().filter(|f| !f.trim().is_empty()) {
        Some(file) => Some(page_within(&site_root, file)?),
        None => None,
    };
    let store = state.workspace.section_store();
    let name = req.section_name;

    let section = tokio::task::spawn_blocking(move || {
        let snapshot = SiteSnapshot::open(site_root)?;
        splice_core::extract_section(&snapshot, page.as_deref(), &info.css_selector, &name, &store)
    })
    .await??;

    Ok(Json(json!({ "success": true, "extracted_section": section })))
}

/// Page path relative to the snapshot root, which must stay inside it.
fn page_within(site_root: &Path, file: &str) -> ApiResult<PathBuf> {
    let resolved = crate::state::resolve_within(site_root, site_root, file)?;
    let root = site_root.canonicalize().map_err(splice_core::SpliceError::from)?;
    resolved
        .strip_prefix(&root)
        .map(Path::to_path_buf)
        .map_err(|_| ApiError::InvalidInput(format!("Path is outside the site: {}", file)))
}

#[derive(Debug, Default, Deserialize)]
pub struct SiteStructure {
    pub title: Option<String>,
    #[serde(default)]
    pub pages: BTreeMap<String, PageSpec>,
}

#[derive(Debug, Deserialize)]
pub struct AssembleRequest {
    #[serde(default)]
    pub sections: Vec<String>,
    #[serde(default)]
    pub site_structure: SiteStructure,
}

pub async fn assemble_site(
    State(state): State<Arc<AppState>>, Json(req): Json<AssembleRequest>,
) -> ApiResult<Json<Value>> {
    let mut request = AssemblyRequest::new(req.sections);
    if let Some(title) = req.site_structure.title.filter(|t| !t.trim().is_empty()) {
        request = request.with_title(title);
    }
    for (name, page) in req.site_structure.pages {
        request = request.with_page(name, page);
    }

    let assembler = state.workspace.assembler();
    let site = tokio::task::spawn_blocking(move || assembler.assemble(&request)).await??;
    let dir_name = site.output_dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();

    Ok(Json(json!({
        "success": true,
        "output_path": site.output_dir.display().to_string(),
        "url": format!("/output/{}/index.html", dir_name),
        "pages": site.pages,
        "message": "Site assembled successfully",
    })))
}

pub async fn list_extracted_sites(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let sites = list_snapshots(&state.workspace.sites_path())?;
    Ok(Json(json!({ "success": true, "sites": sites })))
}

pub async fn list_uploaded(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let screenshots = list_screenshots(&state.workspace.screenshots_path())?;
    Ok(Json(json!({ "success": true, "screenshots": screenshots })))
}

pub async fn list_sections(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let sections = state.workspace.section_store().list()?;
    Ok(Json(json!({ "success": true, "sections": sections })))
}

#[derive(Debug, Deserialize)]
pub struct SuggestionRequest {
    #[serde(default)]
    pub screenshot_path: String,
    pub api_key: Option<String>,
}

pub async fn section_suggestions(
    State(state): State<Arc<AppState>>, Json(req): Json<SuggestionRequest>,
) -> ApiResult<Json<Value>> {
    if req.screenshot_path.trim().is_empty() {
        return Err(ApiError::InvalidInput("Screenshot path is required".to_string()));
    }

    let path = state.screenshot_path(&req.screenshot_path)?;
    let shot = tokio::task::spawn_blocking(move || Screenshot::open(&path)).await??;
    let advisor = state.advisor(req.api_key)?;
    let suggestions = suggest_names_or_default(advisor.as_deref(), &shot).await;

    Ok(Json(json!({ "success": true, "suggestions": suggestions })))
}
