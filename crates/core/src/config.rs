//! Workspace layout configuration.
//!
//! Every operation reads and writes below one base directory. The
//! [`WorkspaceConfig`] names the four folders used inside it.
//!
//! # Example
//!
//! ```rust
//! use splice_core::WorkspaceConfig;
//!
//! let config = WorkspaceConfig::builder()
//!     .base_dir("/tmp/splice")
//!     .output_dir("builds")
//!     .build();
//! assert!(config.output_path().ends_with("builds"));
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::Result;
use crate::assemble::Assembler;
use crate::section::SectionStore;

/// Directory layout of a splice workspace.
///
/// Relative folder names are resolved against `base_dir`; absolute ones are
/// used as-is.
#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    /// Root of the workspace (default: current directory).
    pub base_dir: PathBuf,
    /// Site snapshots, one folder per mirrored domain (default: `extracted_sites`).
    pub extracted_sites_dir: PathBuf,
    /// Extracted sections, one folder per section name (default: `extracted_sections`).
    pub sections_dir: PathBuf,
    /// Assembled sites (default: `output`).
    pub output_dir: PathBuf,
    /// Uploaded screenshots (default: `screenshots`).
    pub screenshots_dir: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            extracted_sites_dir: PathBuf::from("extracted_sites"),
            sections_dir: PathBuf::from("extracted_sections"),
            output_dir: PathBuf::from("output"),
            screenshots_dir: PathBuf::from("screenshots"),
        }
    }
}

impl WorkspaceConfig {
    /// Creates a new builder for WorkspaceConfig.
    pub fn builder() -> WorkspaceConfigBuilder {
        WorkspaceConfigBuilder::new()
    }

    /// Workspace rooted at `base_dir` with the default folder names.
    pub fn at(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into(), ..Default::default() }
    }

    fn resolve(&self, dir: &Path) -> PathBuf {
        if dir.is_absolute() { dir.to_path_buf() } else { self.base_dir.join(dir) }
    }

    /// Absolute-or-base-relative path of the snapshot folder.
    pub fn sites_path(&self) -> PathBuf {
        self.resolve(&self.extracted_sites_dir)
    }

    /// Path of the section folder.
    pub fn sections_path(&self) -> PathBuf {
        self.resolve(&self.sections_dir)
    }

    /// Path of the assembly output folder.
    pub fn output_path(&self) -> PathBuf {
        self.resolve(&self.output_dir)
    }

    /// Path of the screenshot upload folder.
    pub fn screenshots_path(&self) -> PathBuf {
        self.resolve(&self.screenshots_dir)
    }

    /// Creates all four folders if they are missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.sites_path(), self.sections_path(), self.output_path(), self.screenshots_path()] {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    /// Section store over this workspace's section folder.
    pub fn section_store(&self) -> SectionStore {
        SectionStore::new(self.sections_path())
    }

    /// Assembler reading from the section store and writing to the output folder.
    pub fn assembler(&self) -> Assembler {
        Assembler::new(self.section_store(), self.output_path())
    }
}

/// Builder for WorkspaceConfig.
pub struct WorkspaceConfigBuilder {
    config: WorkspaceConfig,
}

impl WorkspaceConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self { config: WorkspaceConfig::default() }
    }

    /// Sets the workspace root.
    pub fn base_dir(mut self, value: impl Into<PathBuf>) -> Self {
        self.config.base_dir = value.into();
        self
    }

    /// Sets the snapshot folder.
    pub fn extracted_sites_dir(mut self, value: impl Into<PathBuf>) -> Self {
        self.config.extracted_sites_dir = value.into();
        self
    }

    /// Sets the section folder.
    pub fn sections_dir(mut self, value: impl Into<PathBuf>) -> Self {
        self.config.sections_dir = value.into();
        self
    }

    /// Sets the assembly output folder.
    pub fn output_dir(mut self, value: impl Into<PathBuf>) -> Self {
        self.config.output_dir = value.into();
        self
    }

    /// Sets the screenshot folder.
    pub fn screenshots_dir(mut self, value: impl Into<PathBuf>) -> Self {
        self.config.screenshots_dir = value.into();
        self
    }

    /// Builds the config.
    pub fn build(self) -> WorkspaceConfig {
        self.config
    }
}

impl Default for WorkspaceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
