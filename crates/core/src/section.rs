//! Extracted sections on disk.
//!
//! Each section lives in `<sections_dir>/<name>/`:
//!
//! ```text
//! hero/
//! ├── section.html
//! ├── section.json
//! ├── css/
//! ├── js/
//! └── media/
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::{Result, SpliceError};

pub const SECTION_HTML: &str = "section.html";
pub const MANIFEST_FILE: &str = "section.json";
pub const CSS_DIR: &str = "css";
pub const JS_DIR: &str = "js";
pub const MEDIA_DIR: &str = "media";

const MAX_NAME_LEN: usize = 64;

/// Checks that `name` is 1 to 64 characters of `[A-Za-z0-9_-]`.
pub fn validate_section_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid { Ok(()) } else { Err(SpliceError::InvalidSectionName(name.to_string())) }
}

/// Manifest of one extracted section (`section.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    /// Snapshot directory name the section was cut from.
    #[serde(default)]
    pub source_site: String,
    /// Page path relative to the snapshot root.
    #[serde(default)]
    pub source_page: String,
    #[serde(default)]
    pub css_selector: String,
    /// RFC 3339 creation time.
    #[serde(default)]
    pub created_at: String,
    /// File names under `css/`, in source order.
    #[serde(default)]
    pub css_files: Vec<String>,
    /// File names under `js/`, in source order.
    #[serde(default)]
    pub js_files: Vec<String>,
    /// File names under `media/`.
    #[serde(default)]
    pub media_files: Vec<String>,
    #[serde(skip)]
    dir: PathBuf,
}

impl Section {
    pub(crate) fn new(name: &str, dir: PathBuf) -> Self {
        Self {
            name: name.to_string(),
            source_site: String::new(),
            source_page: String::new(),
            css_selector: String::new(),
            created_at: now_rfc3339(),
            css_files: Vec::new(),
            js_files: Vec::new(),
            media_files: Vec::new(),
            dir,
        }
    }

    /// Directory holding the section's files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn html_path(&self) -> PathBuf {
        self.dir.join(SECTION_HTML)
    }

    pub fn css_paths(&self) -> Vec<PathBuf> {
        self.css_files.iter().map(|f| self.dir.join(CSS_DIR).join(f)).collect()
    }

    pub fn js_paths(&self) -> Vec<PathBuf> {
        self.js_files.iter().map(|f| self.dir.join(JS_DIR).join(f)).collect()
    }

    pub fn media_paths(&self) -> Vec<PathBuf> {
        self.media_files.iter().map(|f| self.dir.join(MEDIA_DIR).join(f)).collect()
    }

    pub fn read_html(&self) -> Result<String> {
        let path = self.html_path();
        if !path.exists() {
            return Err(SpliceError::FileNotFound(path));
        }
        Ok(fs::read_to_string(path)?)
    }
}

pub(crate) fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

/// The sections directory.
#[derive(Debug, Clone)]
pub struct SectionStore {
    root: PathBuf,
}

impl SectionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for `name`, after validating the name.
    pub fn dir_for(&self, name: &str) -> Result<PathBuf> {
        validate_section_name(name)?;
        Ok(self.root.join(name))
    }

    /// Whether a section with `section.html` exists under `name`.
    pub fn exists(&self, name: &str) -> bool {
        self.dir_for(name).is_ok_and(|dir| dir.join(SECTION_HTML).is_file())
    }

    /// Loads a section's manifest.
    ///
    /// Directories without `section.json` (e.g. copied in by hand) are
    /// described from their `css/`, `js/` and `media/` listings.
    ///
    /// # Errors
    ///
    /// [`SpliceError::UnknownSection`] when the section does not exist.
    pub fn load(&self, name: &str) -> Result<Section> {
        let dir = self.dir_for(name)?;
        if !dir.join(SECTION_HTML).is_file() {
            return Err(SpliceError::UnknownSection { name: name.to_string() });
        }

        let manifest = dir.join(MANIFEST_FILE);
        let mut section = if manifest.is_file() {
            serde_json::from_str::<Section>(&fs::read_to_string(&manifest)?)?
        } else {
            tracing::debug!(section = name, "no manifest, listing files");
            let mut section = Section::new(name, dir.clone());
            section.created_at = String::new();
            section.css_files = list_file_names(&dir.join(CSS_DIR))?;
            section.js_files = list_file_names(&dir.join(JS_DIR))?;
            section.media_files = list_file_names(&dir.join(MEDIA_DIR))?;
            section
        };
        section.name = name.to_string();
        section.dir = dir;
        Ok(section)
    }

    /// All sections, sorted by name. Unreadable entries are skipped.
    pub fn list(&self) -> Result<Vec<Section>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();

        let mut sections = Vec::new();
        for name in names {
            match self.load(&name) {
                Ok(section) => sections.push(section),
                Err(err) => tracing::debug!(section = %name, error = %err, "skipping section directory"),
            }
        }
        Ok(sections)
    }

    /// Deletes a section. Returns whether anything was removed.
    pub fn remove(&self, name: &str) -> Result<bool> {
        let dir = self.dir_for(name)?;
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir)?;
        tracing::info!(section = name, "removed section");
        Ok(true)
    }

    /// Clears and recreates the directory tree for `name`.
    pub(crate) fn prepare(&self, name: &str) -> Result<PathBuf> {
        let dir = self.dir_for(name)?;
        if dir.exists() {
            tracing::debug!(section = name, "replacing existing section");
            fs::remove_dir_all(&dir)?;
        }
        for sub in [CSS_DIR, JS_DIR, MEDIA_DIR] {
            fs::create_dir_all(dir.join(sub))?;
        }
        Ok(dir)
    }

    pub(crate) fn write_manifest(&self, section: &Section) -> Result<()> {
        let json = serde_json::to_string_pretty(section)?;
        fs::write(section.dir.join(MANIFEST_FILE), json)?;
        Ok(())
    }
}

fn list_file_names(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("hero", true)]
    #[case("site-header_2", true)]
    #[case("", false)]
    #[case("../etc", false)]
    #[case("with space", false)]
    #[case("a/b", false)]
    fn test_validate_section_name(#[case] name: &str, #[case] valid: bool) {
        assert_eq!(validate_section_name(name).is_ok(), valid);
    }

    #[test]
    fn test_name_length_limit() {
        assert!(validate_section_name(&"a".repeat(64)).is_ok());
        assert!(validate_section_name(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_manifest_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SectionStore::new(tmp.path());
        let dir = store.prepare("hero").unwrap();
        fs::write(dir.join(SECTION_HTML), "<p>hi</p>").unwrap();

        let mut section = Section::new("hero", dir.clone());
        section.css_files = vec!["site.css".to_string()];
        store.write_manifest(&section).unwrap();

        let loaded = store.load("hero").unwrap();
        assert_eq!(loaded.css_files, vec!["site.css"]);
        assert_eq!(loaded.dir(), dir.as_path());
        assert_eq!(loaded.css_paths(), vec![dir.join("css/site.css")]);
        assert_eq!(loaded.read_html().unwrap(), "<p>hi</p>");
    }

    #[test]
    fn test_load_without_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("legacy");
        fs::create_dir_all(dir.join("css")).unwrap();
        fs::write(dir.join(SECTION_HTML), "<p>old</p>").unwrap();
        fs::write(dir.join("css/b.css"), "").unwrap();
        fs::write(dir.join("css/a.css"), "").unwrap();

        let section = SectionStore::new(tmp.path()).load("legacy").unwrap();
        assert_eq!(section.css_files, vec!["a.css", "b.css"]);
        assert!(section.js_files.is_empty());
    }

    #[test]
    fn test_unknown_section() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SectionStore::new(tmp.path());

        assert!(!store.exists("missing"));
        assert!(matches!(store.load("missing"), Err(SpliceError::UnknownSection { .. })));
        assert!(matches!(store.load("../x"), Err(SpliceError::InvalidSectionName(_))));
    }

    #[test]
    fn test_list_and_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SectionStore::new(tmp.path());
        for name in ["footer", "header"] {
            let dir = store.prepare(name).unwrap();
            fs::write(dir.join(SECTION_HTML), name).unwrap();
        }
        fs::create_dir_all(tmp.path().join("junk")).unwrap();

        let names: Vec<String> = store.list().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["footer", "header"]);

        assert!(store.remove("footer").unwrap());
        assert!(!store.remove("footer").unwrap());
        assert!(!store.exists("footer"));
    }

    #[test]
    fn test_list_missing_root() {
        let store = SectionStore::new("/nonexistent/splice/sections");
        assert!(store.list().unwrap().is_empty());
    }
}
