use std::path::{Path, PathBuf};
use std::sync::Arc;

use splice_core::{GeminiAdvisor, MatchConfig, MirrorConfig, SectionMatcher, VisionAdvisor, VisionConfig, WorkspaceConfig};

use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};

/// Shared application state
#[derive(Debug, Clone)]
pub struct AppState {
    pub workspace: WorkspaceConfig,
    pub vision: VisionConfig,
    pub matching: MatchConfig,
    pub mirror: MirrorConfig,
}

impl AppState {
    /// State over `workspace`, creating its folders.
    pub fn new(workspace: WorkspaceConfig) -> splice_core::Result<Self> {
        workspace.ensure_dirs()?;
        Ok(Self {
            workspace,
            vision: VisionConfig::default(),
            matching: MatchConfig::default(),
            mirror: MirrorConfig::default(),
        })
    }

    pub fn from_config(config: &ServerConfig) -> splice_core::Result<Self> {
        let mut state = Self::new(WorkspaceConfig::at(&config.workspace))?;
        state.vision.api_key = config.gemini_api_key.clone();
        Ok(state)
    }

    pub fn with_vision(mut self, vision: VisionConfig) -> Self {
        self.vision = vision;
        self
    }

    /// Matcher for one request; a per-request key overrides the configured one.
    pub fn matcher(&self, api_key: Option<String>) -> ApiResult<SectionMatcher> {
        let matcher = SectionMatcher::new(self.matching.clone());
        Ok(match self.advisor(api_key)? {
            Some(advisor) => matcher.with_advisor(advisor),
            None => matcher,
        })
    }

    pub fn advisor(&self, api_key: Option<String>) -> ApiResult<Option<Arc<dyn VisionAdvisor>>> {
        let mut vision = self.vision.clone();
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            vision.api_key = Some(key);
        }
        let advisor = GeminiAdvisor::new(vision)?;
        Ok(advisor.map(|a| Arc::new(a) as Arc<dyn VisionAdvisor>))
    }

    pub fn site_path(&self, given: &str) -> ApiResult<PathBuf> {
        resolve_within(&self.workspace.sites_path(), &self.workspace.base_dir, given)
    }

    pub fn screenshot_path(&self, given: &str) -> ApiResult<PathBuf> {
        resolve_within(&self.workspace.screenshots_path(), &self.workspace.base_dir, given)
    }
}

/// Resolves a client-supplied path to an existing entry below `dir`.
///
/// Relative paths are tried against the workspace `base` and against `dir`
/// itself, so both `extracted_sites/example_com` and `example_com` work.
/// Symlinks are resolved before the containment check.
pub fn resolve_within(dir: &Path, base: &Path, given: &str) -> ApiResult<PathBuf> {
    let given = given.trim();
    if given.is_empty() {
        return Err(ApiError::InvalidInput("Path is required".to_string()));
    }

    let dir = dir
        .canonicalize()
        .map_err(|e| ApiError::Internal(format!("workspace folder {} unavailable: {e}", dir.display())))?;

    let requested = Path::new(given);
    let attempts =
        if requested.is_absolute() { vec![requested.to_path_buf()] } else { vec![base.join(requested), dir.join(requested)] };

    let mut found_outside = false;
    for attempt in attempts {
        let Ok(path) = attempt.canonicalize() else { continue };
        if path.starts_with(&dir) && path != dir {
            return Ok(path);
        }
        found_outside = true;
    }

    if found_outside {
        Err(ApiError::InvalidInput(format!("Path is outside the workspace: {}", given)))
    } else {
        Err(ApiError::NotFound(format!("Not found: {}", given)))
    }
}
