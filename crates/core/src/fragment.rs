//! Cutting a DOM subtree out of a mirrored page into a standalone section.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::Result;
use crate::fetch::fetch_file;
use crate::mirror::SiteSnapshot;
use crate::parse::{Document, escape_html, unescape_attribute};
use crate::section::{CSS_DIR, JS_DIR, MEDIA_DIR, SECTION_HTML, Section, SectionStore, validate_section_name};

/// A local file to copy into the section directory.
#[derive(Debug, Clone)]
struct CopyPlan {
    source: PathBuf,
    file_name: String,
}

/// Files referenced by one asset kind, deduplicated by source path.
#[derive(Debug, Default)]
struct AssetSet {
    plans: Vec<CopyPlan>,
    used_names: BTreeSet<String>,
    by_source: HashMap<PathBuf, String>,
}

impl AssetSet {
    /// Adds a source file and returns the name it gets in the section.
    fn add(&mut self, source: PathBuf) -> String {
        if let Some(name) = self.by_source.get(&source) {
            return name.clone();
        }
        let file_name = unique_file_name(&mut self.used_names, &source);
        self.by_source.insert(source.clone(), file_name.clone());
        self.plans.push(CopyPlan { source, file_name: file_name.clone() });
        file_name
    }

    fn names(&self) -> Vec<String> {
        self.plans.iter().map(|p| p.file_name.clone()).collect()
    }

    fn copy_into(&self, dir: &Path) -> Result<()> {
        for plan in &self.plans {
            fs::copy(&plan.source, dir.join(&plan.file_name))?;
        }
        Ok(())
    }
}

/// Extracts the element matching `selector` on `page` into section `name`.
///
/// `page` is relative to the snapshot root; `None` uses the snapshot's root
/// page. Local stylesheets and scripts of the page, and media inside the
/// subtree, are copied next to the fragment. An existing section with the
/// same name is replaced.
///
/// # Errors
///
/// - [`SpliceError::InvalidSectionName`](crate::SpliceError::InvalidSectionName)
/// - [`SpliceError::FileNotFound`](crate::SpliceError::FileNotFound) for a missing page
/// - [`SpliceError::HtmlParseError`](crate::SpliceError::HtmlParseError) for an invalid selector
/// - [`SpliceError::SelectorNotFound`](crate::SpliceError::SelectorNotFound) when nothing matches
pub fn extract_section(
    snapshot: &SiteSnapshot, page: Option<&Path>, selector: &str, name: &str, store: &SectionStore,
) -> Result<Section> {
    validate_section_name(name)?;

    let page_path = match page {
        Some(p) if p.is_absolute() => p.to_path_buf(),
        Some(p) => snapshot.root.join(p),
        None => snapshot.root_page()?,
    };
    let html = fetch_file(&page_path)?;
    let page_dir = page_path.parent().unwrap_or(&snapshot.root).to_path_buf();

    let doc = Document::parse(&html)?;
    let element = doc.select_first(selector)?;

    let mut css = AssetSet::default();
    for href in doc.stylesheet_hrefs() {
        if let Some(source) = resolve_local(&href, &snapshot.root, &page_dir) {
            css.add(source);
        }
    }

    let mut js = AssetSet::default();
    let mut copied_scripts = HashSet::new();
    for src in doc.script_srcs() {
        if let Some(source) = resolve_local(&src, &snapshot.root, &page_dir) {
            js.add(source.clone());
            copied_scripts.insert(source);
        }
    }

    let mut media = AssetSet::default();
    let mut media_refs = HashMap::new();
    for (sel, attr) in [("img[src]", "src"), ("source[src]", "src"), ("video[poster]", "poster")] {
        for el in element.select(sel)? {
            if let Some(value) = el.attr(attr)
                && let Some(source) = resolve_local(value, &snapshot.root, &page_dir)
            {
                let file_name = media.add(source.clone());
                media_refs.insert(source, format!("{MEDIA_DIR}/{file_name}"));
            }
        }
    }

    let fragment = rewrite_fragment(&element.outer_html(), &snapshot.root, &page_dir, &media_refs, &copied_scripts);

    let dir = store.prepare(name)?;
    css.copy_into(&dir.join(CSS_DIR))?;
    js.copy_into(&dir.join(JS_DIR))?;
    media.copy_into(&dir.join(MEDIA_DIR))?;

    let mut section = Section::new(name, dir.clone());
    section.source_site = snapshot.domain.clone();
    section.source_page = relative_display(&page_path, &snapshot.root);
    section.css_selector = selector.to_string();
    section.css_files = css.names();
    section.js_files = js.names();
    section.media_files = media.names();

    fs::write(dir.join(SECTION_HTML), section_document(&section, &fragment))?;
    store.write_manifest(&section)?;

    tracing::info!(
        section = name,
        selector,
        css = section.css_files.len(),
        js = section.js_files.len(),
        media = section.media_files.len(),
        "extracted section"
    );
    Ok(section)
}

/// Resolves a page reference to an existing local file inside `root`.
///
/// Remote (`http:`, `//host`), `data:` and other scheme URLs yield `None`.
/// The reference is joined as a URL, so percent escapes are decoded and query
/// strings and fragments are ignored; `/x` is relative to `root`, anything
/// else to `page_dir`.
pub fn resolve_local(reference: &str, root: &Path, page_dir: &Path) -> Option<PathBuf> {
    let reference = reference.trim();
    if reference.is_empty() || reference.starts_with("//") || url::Url::parse(reference).is_ok() {
        return None;
    }

    let root = normalize(&std::path::absolute(root).ok()?);
    let (base, relative) = match reference.strip_prefix('/') {
        Some(rooted) => (root.clone(), rooted),
        None => (normalize(&std::path::absolute(page_dir).ok()?), reference),
    };
    let resolved = url::Url::from_directory_path(&base)
        .ok()
        .and_then(|base| base.join(relative).ok())
        .and_then(|joined| joined.to_file_path().ok())?;

    if !resolved.starts_with(&root) {
        tracing::debug!(reference, "asset outside snapshot, skipping");
        return None;
    }
    if !resolved.is_file() {
        tracing::debug!(reference, path = %resolved.display(), "asset not found, skipping");
        return None;
    }
    Some(resolved)
}

/// Lexically removes `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// `style.css`, then `style-1.css`, `style-2.css`, ...
fn unique_file_name(used: &mut BTreeSet<String>, source: &Path) -> String {
    let original = source.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "asset".to_string());

    let mut candidate = original.clone();
    let mut n = 1;
    while used.contains(&candidate) {
        candidate = match (source.file_stem(), source.extension()) {
            (Some(stem), Some(ext)) => format!("{}-{n}.{}", stem.to_string_lossy(), ext.to_string_lossy()),
            _ => format!("{original}-{n}"),
        };
        n += 1;
    }
    used.insert(candidate.clone());
    candidate
}

fn relative_display(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
}

/// Points media at the copied files and drops script tags that the section
/// shell loads itself.
///
/// Attribute values arrive serialized, so they are unescaped and resolved
/// again before the lookup by source path.
fn rewrite_fragment(
    html: &str, root: &Path, page_dir: &Path, media_refs: &HashMap<PathBuf, String>, copied_scripts: &HashSet<PathBuf>,
) -> String {
    let locate = |raw: &str| resolve_local(&unescape_attribute(raw), root, page_dir);
    let media_target = |raw: &str| locate(raw).and_then(|source| media_refs.get(&source));

    let mut output = String::new();
    let mut rewriter = lol_html::HtmlRewriter::new(
        lol_html::Settings {
            element_content_handlers: vec![
                lol_html::element!("img[src]", |el| {
                    if let Some(local) = el.get_attribute("src").and_then(|src| media_target(&src)) {
                        el.set_attribute("src", local).ok();
                    }
                    Ok(())
                }),
                lol_html::element!("source[src]", |el| {
                    if let Some(local) = el.get_attribute("src").and_then(|src| media_target(&src)) {
                        el.set_attribute("src", local).ok();
                    }
                    Ok(())
                }),
                lol_html::element!("video[poster]", |el| {
                    if let Some(local) = el.get_attribute("poster").and_then(|poster| media_target(&poster)) {
                        el.set_attribute("poster", local).ok();
                    }
                    Ok(())
                }),
                lol_html::element!("script[src]", |el| {
                    let copied = el.get_attribute("src").and_then(|src| locate(&src));
                    if copied.is_some_and(|source| copied_scripts.contains(&source)) {
                        el.remove();
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

    if output.is_empty() { html.to_string() } else { output }
}

fn section_document(section: &Section, fragment: &str) -> String {
    let links: String = section
        .css_files
        .iter()
        .map(|f| format!("    <link rel=\"stylesheet\" href=\"{CSS_DIR}/{}\">\n", escape_html(f)))
        .collect();
    let scripts: String = section
        .js_files
        .iter()
        .map(|f| format!("    <script src=\"{JS_DIR}/{}\"></script>\n", escape_html(f)))
        .collect();

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n    <meta charset=\"UTF-8\">\n    \
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n    \
         <title>{}</title>\n{links}</head>\n<body>\n{fragment}\n{scripts}</body>\n</html>\n",
        escape_html(&section.name)
    )
}
