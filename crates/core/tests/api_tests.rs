//! Library API integration tests
use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, Rgb, RgbImage};
use splice_core::*;
use tempfile::TempDir;
use walkdir::WalkDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn get_site_fixture_path(site: &str) -> PathBuf {
    PathBuf::from(format!("../../tests/fixtures/sites/{}", site))
}

fn copy_dir(from: &Path, to: &Path) {
    for entry in WalkDir::new(from).into_iter().filter_map(|e| e.ok()) {
        let target = to.join(entry.path().strip_prefix(from).unwrap());
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).unwrap();
        } else {
            fs::copy(entry.path(), &target).unwrap();
        }
    }
}

/// A workspace with the fixture site already mirrored into it.
fn workspace() -> (TempDir, WorkspaceConfig, SiteSnapshot) {
    let tmp = tempfile::tempdir().unwrap();
    let config = WorkspaceConfig::at(tmp.path());
    config.ensure_dirs().unwrap();

    let root = config.sites_path().join("acme_example");
    copy_dir(&get_site_fixture_path("acme_example"), &root);
    let snapshot = SiteSnapshot::open(&root).unwrap();
    (tmp, config, snapshot)
}

fn screenshot(width: u32, height: u32) -> Screenshot {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([11, 61, 145])));
    let mut buf = Vec::new();
    img.write_with_encoder(image::codecs::png::PngEncoder::new(&mut buf)).unwrap();
    Screenshot::from_bytes(buf).unwrap()
}

#[tokio::test]
async fn test_match_extract_assemble() {
    let (_tmp, config, snapshot) = workspace();
    let matcher = SectionMatcher::default();
    let store = config.section_store();

    let mut located = Vec::new();
    for (name, text) in [
        ("header", "Home About Pricing"),
        ("hero", "Rockets for every backyard"),
        ("footer", "Copyright 2024 Acme Rockets"),
    ] {
        let hint = MatchHint::new(name).with_text(text);
        let outcome = matcher.match_snapshot(&snapshot, &screenshot(1200, 400), &hint).await.unwrap();
        let found = outcome.into_matched().unwrap_or_else(|| panic!("no match for {name}"));
        located.push((name, found));
    }

    assert_eq!(located[0].1.css_selector, "header.site-header");
    assert_eq!(located[1].1.css_selector, "section.hero");
    assert_eq!(located[2].1.css_selector, "footer.site-footer");

    for (name, found) in &located {
        let section =
            extract_section(&snapshot, found.html_file.as_deref(), &found.css_selector, name, &store).unwrap();
        assert_eq!(section.css_files, vec!["style.css"]);
        assert_eq!(section.js_files, vec!["main.js"]);
    }
    assert_eq!(store.load("header").unwrap().media_files, vec!["logo.png"]);

    let site = config.assembler().assemble(&AssemblyRequest::new(["header", "hero", "footer"])).unwrap();

    let index = fs::read_to_string(site.output_dir.join("index.html")).unwrap();
    let header = index.find("<!-- Section: header -->").unwrap();
    let hero = index.find("<!-- Section: hero -->").unwrap();
    let footer = index.find("<!-- Section: footer -->").unwrap();
    assert!(header < hero && hero < footer);
    assert!(index.contains("Rockets for every backyard"));
    assert!(index.contains(r#"src="assets/logo.png""#));

    let styles = fs::read_to_string(site.output_dir.join("styles.css")).unwrap();
    assert_eq!(styles.matches(".hero { padding").count(), 3);
    assert!(site.output_dir.join("assets/logo.png").is_file());
    assert!(site.output_dir.starts_with(config.output_path()));
}

#[test]
fn test_hero_screenshot_selects_hero() {
    let html = fs::read_to_string(get_site_fixture_path("acme_example").join("index.html")).unwrap();
    let doc = Document::parse(&html).unwrap();
    let hint = MatchHint::new("hero").with_text("Rockets for every backyard. Launch your own payload in minutes");

    let matcher = SectionMatcher::default();
    let outcome = matcher.match_document(&doc, &screenshot(1200, 500), &hint, None);
    let found = outcome.matched().unwrap();

    assert_eq!(found.css_selector, "section.hero");
    assert!(found.confidence >= matcher.config().confidence_floor);
    assert_eq!(found.ranked[0].css_selector, "section.hero");
}

#[test]
fn test_unrelated_screenshot_has_no_match() {
    let html = fs::read_to_string(get_site_fixture_path("acme_example").join("index.html")).unwrap();
    let doc = Document::parse(&html).unwrap();
    let hint = MatchHint::new("testimonials").with_text("Customers love the quarterly newsletter");

    let outcome = SectionMatcher::default().match_document(&doc, &screenshot(900, 900), &hint, None);
    assert!(matches!(outcome, MatchOutcome::NoMatch { .. }));
}

#[test]
fn test_section_name_alone_has_no_match() {
    let html = fs::read_to_string(get_site_fixture_path("acme_example").join("index.html")).unwrap();
    let doc = Document::parse(&html).unwrap();
    let green = {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(800, 600, Rgb([0, 200, 0])));
        let mut buf = Vec::new();
        img.write_with_encoder(image::codecs::png::PngEncoder::new(&mut buf)).unwrap();
        Screenshot::from_bytes(buf).unwrap()
    };

    let matcher = SectionMatcher::default();
    for hint in [MatchHint::new("section"), MatchHint::new(""), MatchHint::new("pricing")] {
        match matcher.match_document(&doc, &green, &hint, None) {
            MatchOutcome::NoMatch { best_score, floor } => assert!(best_score < floor),
            other => panic!("{hint:?} matched: {other:?}"),
        }
    }
}

#[test]
fn test_section_name_is_last_write_wins() {
    let (_tmp, config, snapshot) = workspace();
    let store = config.section_store();

    extract_section(&snapshot, None, "header.site-header", "header", &store).unwrap();
    extract_section(&snapshot, Some(Path::new("about/index.html")), "article.story", "header", &store).unwrap();

    let section = store.load("header").unwrap();
    let html = section.read_html().unwrap();
    assert!(html.contains("Our story"));
    assert!(!html.contains("Pricing"));
    assert_eq!(section.source_page, "about/index.html");
    assert!(section.media_files.is_empty());
    assert_eq!(store.list().unwrap().len(), 1);
}

#[test]
fn test_assembly_with_missing_section_fails_cleanly() {
    let (_tmp, config, snapshot) = workspace();
    let store = config.section_store();
    extract_section(&snapshot, None, "header.site-header", "header", &store).unwrap();
    extract_section(&snapshot, None, "section.hero", "hero", &store).unwrap();

    let err = config.assembler().assemble(&AssemblyRequest::new(["header", "hero", "footer"])).unwrap_err();
    assert_eq!(err.kind(), "unknown_section");
    assert_eq!(fs::read_dir(config.output_path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_vision_failures_degrade_to_baseline() {
    let (_tmp, _config, snapshot) = workspace();
    let hint = MatchHint::new("hero").with_text("Rockets for every backyard");
    let shot = screenshot(1200, 500);
    let baseline = SectionMatcher::default().match_snapshot(&snapshot, &shot, &hint).await.unwrap();

    let failing = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(500)).mount(&failing).await;
    let garbage = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<<not json>>"))
        .mount(&garbage)
        .await;

    for uri in [failing.uri(), garbage.uri()] {
        let vision = VisionConfig { base_url: uri, ..Default::default() }.with_api_key("k");
        let advisor = GeminiAdvisor::new(vision).unwrap().unwrap();
        let matcher = SectionMatcher::default().with_advisor(std::sync::Arc::new(advisor));

        let outcome = matcher.match_snapshot(&snapshot, &shot, &hint).await.unwrap();
        assert_eq!(outcome, baseline);
    }
}

#[tokio::test]
async fn test_vision_selector_overrides_baseline() {
    let (_tmp, _config, snapshot) = workspace();
    let server = MockServer::start().await;
    let answer = serde_json::json!({
        "candidates": [{ "content": { "parts": [{ "text": "{\"css_selector\": \"#pricing\", \"confidence\": 0.88, \"section_type\": \"pricing\"}" }] } }]
    });
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(answer))
        .mount(&server)
        .await;

    let vision = VisionConfig { base_url: server.uri(), ..Default::default() }.with_api_key("k");
    let matcher = SectionMatcher::default().with_advisor(std::sync::Arc::new(GeminiAdvisor::new(vision).unwrap().unwrap()));

    let outcome = matcher.match_snapshot(&snapshot, &screenshot(1200, 500), &MatchHint::new("hero")).await.unwrap();
    let found = outcome.matched().unwrap();
    assert_eq!(found.css_selector, "#pricing");
    assert_eq!(found.method, MatchMethod::Vision);
    assert_eq!(found.section_type, "pricing");
}

fn wget_available() -> bool {
    std::process::Command::new("wget").arg("--version").output().is_ok_and(|o| o.status.success())
}

#[tokio::test]
async fn test_mirror_keeps_internal_assets() {
    if !wget_available() {
        eprintln!("wget not installed, skipping");
        return;
    }

    let server = MockServer::start().await;
    let fixture = get_site_fixture_path("acme_example");
    for (route, file, mime) in [
        ("/", "index.html", "text/html"),
        ("/index.html", "index.html", "text/html"),
        ("/css/style.css", "css/style.css", "text/css"),
        ("/js/main.js", "js/main.js", "application/javascript"),
    ] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_raw(fs::read(fixture.join(file)).unwrap(), mime))
            .mount(&server)
            .await;
    }

    let tmp = tempfile::tempdir().unwrap();
    let config = MirrorConfig { fallback: false, ..Default::default() };
    let snapshot = extract_website(&format!("{}/", server.uri()), tmp.path(), &config).await.unwrap();

    assert_eq!(snapshot.method, Some(CaptureMethod::Mirror));
    let page = snapshot.root_page().unwrap();
    let doc = Document::parse(&fs::read_to_string(&page).unwrap()).unwrap();
    for href in doc.stylesheet_hrefs().into_iter().filter(|h| !h.starts_with("http")) {
        assert!(page.parent().unwrap().join(&href).is_file(), "{href} missing from snapshot");
    }
}

#[tokio::test]
async fn test_missing_mirror_tool_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body><h1>Only page</h1></body></html>"))
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let config = MirrorConfig { wget_path: PathBuf::from("/nonexistent/wget"), ..Default::default() };
    let snapshot = extract_website(&server.uri(), tmp.path(), &config).await.unwrap();

    assert_eq!(snapshot.method, Some(CaptureMethod::Fallback));
    let html = fs::read_to_string(snapshot.root_page().unwrap()).unwrap();
    assert!(html.contains("Only page"));
    assert_eq!(list_snapshots(tmp.path()).unwrap().len(), 1);
}
