//! Combining extracted sections into a new site.
//!
//! # Example
//!
//! ```rust,no_run
//! use splice_core::{AssemblyRequest, WorkspaceConfig};
//!
//! let workspace = WorkspaceConfig::at("/tmp/splice");
//! let request = AssemblyRequest::new(["header", "hero", "footer"]).with_title("Landing");
//! let site = workspace.assembler().assemble(&request).unwrap();
//! println!("{}", site.output_dir.display());
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::parse::{Document, escape_html};
use crate::section::{JS_DIR, MEDIA_DIR, Section, SectionStore, now_rfc3339, validate_section_name};
use crate::{Result, SpliceError};

pub const INDEX_FILE: &str = "index.html";
pub const STYLES_FILE: &str = "styles.css";
pub const SCRIPTS_FILE: &str = "scripts.js";
pub const ASSETS_DIR: &str = "assets";
pub const README_FILE: &str = "README.md";

/// Prefix of every assembled output directory.
pub const OUTPUT_PREFIX: &str = "assembled_site_";

fn default_title() -> String {
    "Assembled Website".to_string()
}

/// An extra page of an assembled site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSpec {
    /// Page title; the page name when absent.
    #[serde(default)]
    pub title: Option<String>,
    pub sections: Vec<String>,
}

/// What to assemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyRequest {
    /// Sections of `index.html`, in order. Repeats are allowed.
    pub sections: Vec<String>,
    #[serde(default = "default_title")]
    pub title: String,
    /// Additional pages, written as `<name>.html`.
    #[serde(default)]
    pub pages: BTreeMap<String, PageSpec>,
}

impl AssemblyRequest {
    pub fn new<I, S>(sections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { sections: sections.into_iter().map(Into::into).collect(), title: default_title(), pages: BTreeMap::new() }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_page(mut self, name: impl Into<String>, page: PageSpec) -> Self {
        self.pages.insert(name.into(), page);
        self
    }

    /// Main sections in order, then sections only used by extra pages.
    fn included_sections(&self) -> Vec<&str> {
        let mut included: Vec<&str> = self.sections.iter().map(String::as_str).collect();
        let mut seen: BTreeSet<&str> = included.iter().copied().collect();
        for page in self.pages.values() {
            for name in &page.sections {
                if seen.insert(name.as_str()) {
                    included.push(name.as_str());
                }
            }
        }
        included
    }
}

/// Result of an assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledSite {
    pub output_dir: PathBuf,
    pub title: String,
    pub sections: Vec<String>,
    /// HTML files written, `index.html` first.
    pub pages: Vec<String>,
    /// Media file names under `assets/`.
    pub assets: Vec<String>,
    pub created_at: String,
}

/// Builds assembled sites from a section store.
#[derive(Debug, Clone)]
pub struct Assembler {
    store: SectionStore,
    output_root: PathBuf,
}

impl Assembler {
    pub fn new(store: SectionStore, output_root: impl Into<PathBuf>) -> Self {
        Self { store, output_root: output_root.into() }
    }

    /// Assembles the requested sections into a fresh output directory.
    ///
    /// Every section is checked before anything is written; a failed write
    /// removes the partial output.
    ///
    /// # Errors
    ///
    /// - [`SpliceError::NoSections`] for an empty section list
    /// - [`SpliceError::UnknownSection`] when a named section does not exist
    /// - [`SpliceError::InvalidSectionName`] for a malformed section or page name
    pub fn assemble(&self, request: &AssemblyRequest) -> Result<AssembledSite> {
        if request.sections.is_empty() {
            return Err(SpliceError::NoSections);
        }
        for page in request.pages.keys() {
            validate_section_name(page)?;
            if page.eq_ignore_ascii_case("index") {
                return Err(SpliceError::InvalidSectionName(page.clone()));
            }
        }

        let mut sections = BTreeMap::new();
        for name in request.included_sections() {
            if !sections.contains_key(name) {
                sections.insert(name.to_string(), self.store.load(name)?);
            }
        }

        let output_dir = self.new_output_dir();
        fs::create_dir_all(&self.output_root)?;

        match write_site(&output_dir, request, &sections) {
            Ok(site) => {
                tracing::info!(
                    output = %site.output_dir.display(),
                    sections = site.sections.len(),
                    pages = site.pages.len(),
                    "assembled site"
                );
                Ok(site)
            }
            Err(err) => {
                tracing::warn!(output = %output_dir.display(), error = %err, "assembly failed, removing output");
                let _ = fs::remove_dir_all(&output_dir);
                Err(err)
            }
        }
    }

    fn new_output_dir(&self) -> PathBuf {
        loop {
            let id = uuid::Uuid::new_v4().simple().to_string();
            let dir = self.output_root.join(format!("{OUTPUT_PREFIX}{}", &id[..8]));
            if !dir.exists() {
                return dir;
            }
        }
    }
}

fn write_site(dir: &Path, request: &AssemblyRequest, sections: &BTreeMap<String, Section>) -> Result<AssembledSite> {
    let assets_dir = dir.join(ASSETS_DIR);
    fs::create_dir_all(&assets_dir)?;

    let included = request.included_sections();

    let mut assets = Vec::new();
    let mut seen_assets = BTreeSet::new();
    for name in &included {
        let section = lookup(sections, name)?;
        for (file_name, source) in section.media_files.iter().zip(section.media_paths()) {
            if seen_assets.insert(file_name.clone()) {
                if source.is_file() {
                    fs::copy(&source, assets_dir.join(file_name))?;
                    assets.push(file_name.clone());
                } else {
                    tracing::debug!(section = name, file = %file_name, "media file missing, skipping");
                }
            }
        }
    }

    let mut bodies = BTreeMap::new();
    for name in &included {
        bodies.insert(name.to_string(), section_body(lookup(sections, name)?)?);
    }

    let render = |title: &str, names: &[String]| -> String {
        let mut body = String::new();
        for name in names {
            let content = bodies.get(name).map(String::as_str).unwrap_or_default();
            let _ = writeln!(body, "<!-- Section: {name} -->\n{content}");
        }
        page_shell(title, &body)
    };

    fs::write(dir.join(INDEX_FILE), render(&request.title, &request.sections))?;
    let mut pages = vec![INDEX_FILE.to_string()];
    for (page, spec) in &request.pages {
        let title = spec.title.clone().unwrap_or_else(|| page.clone());
        let file_name = format!("{page}.html");
        fs::write(dir.join(&file_name), render(&title, &spec.sections))?;
        pages.push(file_name);
    }

    let mut styles = String::new();
    let mut scripts = String::new();
    let merge_order: Vec<&str> = request
        .sections
        .iter()
        .map(String::as_str)
        .chain(included.iter().skip(request.sections.len()).copied())
        .collect();
    for name in merge_order {
        let section = lookup(sections, name)?;
        let _ = writeln!(styles, "/* Section: {name} */");
        for path in section.css_paths() {
            styles.push_str(&read_if_exists(&path)?);
            styles.push('\n');
        }
        let _ = writeln!(scripts, "// Section: {name}");
        for path in section.js_paths() {
            scripts.push_str(&read_if_exists(&path)?);
            scripts.push('\n');
        }
    }
    fs::write(dir.join(STYLES_FILE), styles)?;
    fs::write(dir.join(SCRIPTS_FILE), scripts)?;

    let site = AssembledSite {
        output_dir: dir.to_path_buf(),
        title: request.title.clone(),
        sections: request.sections.clone(),
        pages,
        assets,
        created_at: now_rfc3339(),
    };
    fs::write(dir.join(README_FILE), readme(&site, request))?;
    Ok(site)
}

fn lookup<'a>(sections: &'a BTreeMap<String, Section>, name: &str) -> Result<&'a Section> {
    sections.get(name).ok_or_else(|| SpliceError::UnknownSection { name: name.to_string() })
}

fn read_if_exists(path: &Path) -> Result<String> {
    if !path.is_file() {
        tracing::debug!(path = %path.display(), "section asset missing, skipping");
        return Ok(String::new());
    }
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Body content of a section document, with its own script tags removed and
/// media pointed at the shared assets folder.
fn section_body(section: &Section) -> Result<String> {
    let html = section.read_html()?;
    let doc = Document::parse(&html)?;
    let inner = doc.body().map(|b| b.inner_html()).unwrap_or(html);
    Ok(rewrite_for_site(inner.trim()))
}

fn to_assets(value: &str) -> Option<String> {
    value.strip_prefix(&format!("{MEDIA_DIR}/")).map(|rest| format!("{ASSETS_DIR}/{rest}"))
}

fn rewrite_for_site(html: &str) -> String {
    let js_prefix = format!("{JS_DIR}/");
    let mut output = String::new();
    let mut rewriter = lol_html::HtmlRewriter::new(
        lol_html::Settings {
            element_content_handlers: vec![
                lol_html::element!("script[src]", |el| {
                    if el.get_attribute("src").is_some_and(|src| src.starts_with(&js_prefix)) {
                        el.remove();
                    }
                    Ok(())
                }),
                lol_html::element!("img[src]", |el| {
                    if let Some(local) = el.get_attribute("src").and_then(|v| to_assets(&v)) {
                        el.set_attribute("src", &local).ok();
                    }
                    Ok(())
                }),
                lol_html::element!("source[src]", |el| {
                    if let Some(local) = el.get_attribute("src").and_then(|v| to_assets(&v)) {
                        el.set_attribute("src", &local).ok();
                    }
                    Ok(())
                }),
                lol_html::element!("video[poster]", |el| {
                    if let Some(local) = el.get_attribute("poster").and_then(|v| to_assets(&v)) {
                        el.set_attribute("poster", &local).ok();
                    }
                    Ok(())
                }),
            ],
            ..Default::default()
        },
        |c: &[u8]| {
            output.push_str(&String::from_utf8_lossy(c));
        },
    );

    if rewriter.write(html.as_bytes()).is_err() {
        return html.to_string();
    }

    if rewriter.end().is_err() {
        return html.to_string();
    }

    output
}

fn page_shell(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n    <meta charset=\"UTF-8\">\n    \
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n    \
         <title>{}</title>\n    <link rel=\"stylesheet\" href=\"{STYLES_FILE}\">\n</head>\n<body>\n{body}\
         <script src=\"{SCRIPTS_FILE}\"></script>\n</body>\n</html>\n",
        escape_html(title)
    )
}

fn readme(site: &AssembledSite, request: &AssemblyRequest) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", site.title);
    let _ = writeln!(out, "Assembled by splice on {}.\n", site.created_at);

    let _ = writeln!(out, "## Sections\n");
    for (i, name) in site.sections.iter().enumerate() {
        let _ = writeln!(out, "{}. {name}", i + 1);
    }

    let _ = writeln!(out, "\n## Pages\n");
    let _ = writeln!(out, "- `{INDEX_FILE}`: {}", site.title);
    for (page, spec) in &request.pages {
        let title = spec.title.as_deref().unwrap_or(page);
        let _ = writeln!(out, "- `{page}.html`: {title} ({})", spec.sections.join(", "));
    }

    let _ = writeln!(out, "\n## File structure\n");
    let _ = writeln!(out, "- `{INDEX_FILE}`: main page");
    let _ = writeln!(out, "- `{STYLES_FILE}`: merged styles of all sections");
    let _ = writeln!(out, "- `{SCRIPTS_FILE}`: merged scripts of all sections");
    let _ = writeln!(out, "- `{ASSETS_DIR}/`: shared media ({} files)", site.assets.len());
    let _ = writeln!(out, "- `{README_FILE}`: this file");
    out
}
