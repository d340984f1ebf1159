//! CLI integration tests
use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, Rgb, RgbImage};
use predicates::prelude::*;
use tempfile::TempDir;

fn cmd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("splice");
    cmd.env_remove("GEMINI_API_KEY").env_remove("RUST_LOG");
    cmd
}

fn get_site_fixture_path(site: &str) -> PathBuf {
    PathBuf::from(format!("../../tests/fixtures/sites/{}", site))
}

fn copy_dir(from: &Path, to: &Path) {
    fs::create_dir_all(to).unwrap();
    for entry in fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), &target).unwrap();
        }
    }
}

/// Workspace with the fixture site under `extracted_sites/acme_example`.
fn workspace() -> TempDir {
    let tmp = TempDir::new().unwrap();
    copy_dir(&get_site_fixture_path("acme_example"), &tmp.path().join("extracted_sites/acme_example"));
    tmp
}

fn write_screenshot(dir: &Path) -> PathBuf {
    let path = dir.join("shot.png");
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(1200, 400, Rgb([11, 61, 145])));
    img.save(&path).unwrap();
    path
}

fn ws_args(tmp: &TempDir) -> [String; 2] {
    ["--workspace".to_string(), tmp.path().display().to_string()]
}

fn extract(tmp: &TempDir, selector: &str, name: &str) {
    cmd()
        .args(ws_args(tmp))
        .args(["extract", "acme_example", "--selector", selector, "--name", name])
        .assert()
        .success();
}

#[test]
fn test_cli_help() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("mirror").and(predicate::str::contains("assemble")));
}

#[test]
fn test_cli_sites() {
    let tmp = workspace();
    cmd()
        .args(ws_args(&tmp))
        .arg("sites")
        .assert()
        .success()
        .stdout(predicate::str::contains("acme_example"));
}

#[test]
fn test_cli_match_hero() {
    let tmp = workspace();
    let shot = write_screenshot(tmp.path());

    cmd()
        .args(ws_args(&tmp))
        .args(["match", "acme_example", shot.to_str().unwrap(), "--name", "hero"])
        .args(["--hint", "Rockets for every backyard"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"css_selector\": \"section.hero\""))
        .stdout(predicate::str::contains("\"method\": \"baseline\""));
}

#[test]
fn test_cli_match_without_overlap_fails() {
    let tmp = workspace();
    let shot = write_screenshot(tmp.path());

    cmd()
        .args(ws_args(&tmp))
        .args(["match", "acme_example", shot.to_str().unwrap(), "--name", "testimonials"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("no_match"))
        .stderr(predicate::str::contains("No confident match"));
}

#[test]
fn test_cli_match_without_name_or_hint_fails() {
    let tmp = workspace();
    let shot = write_screenshot(tmp.path());

    cmd()
        .args(ws_args(&tmp))
        .args(["match", "acme_example", shot.to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicate::str::contains("no_match"));
}

#[test]
fn test_cli_match_custom_floor() {
    let tmp = workspace();
    let shot = write_screenshot(tmp.path());

    cmd()
        .args(ws_args(&tmp))
        .args(["--floor", "0.99", "match", "acme_example", shot.to_str().unwrap(), "--name", "hero"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("0.99"));
}

#[test]
fn test_cli_match_bad_screenshot() {
    let tmp = workspace();
    let bogus = tmp.path().join("shot.png");
    fs::write(&bogus, b"not an image").unwrap();

    cmd()
        .args(ws_args(&tmp))
        .args(["match", "acme_example", bogus.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Malformed upload"));
}

#[test]
fn test_cli_extract() {
    let tmp = workspace();

    cmd()
        .args(ws_args(&tmp))
        .args(["extract", "acme_example", "-s", "header.site-header", "-n", "header"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"header\""))
        .stdout(predicate::str::contains("logo.png"));

    assert!(tmp.path().join("extracted_sections/header/section.html").is_file());
    assert!(tmp.path().join("extracted_sections/header/css/style.css").is_file());
}

#[test]
fn test_cli_extract_missing_selector() {
    let tmp = workspace();

    cmd()
        .args(ws_args(&tmp))
        .args(["extract", "acme_example", "-s", "#nowhere", "-n", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("#nowhere"));
}

#[test]
fn test_cli_extract_invalid_name() {
    let tmp = workspace();

    cmd()
        .args(ws_args(&tmp))
        .args(["extract", "acme_example", "-s", "footer", "-n", "../up"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid section name"));
}

#[test]
fn test_cli_sections() {
    let tmp = workspace();
    extract(&tmp, "footer.site-footer", "footer");
    extract(&tmp, "header.site-header", "header");

    cmd()
        .args(ws_args(&tmp))
        .arg("sections")
        .assert()
        .success()
        .stdout(predicate::str::diff("footer\nheader\n"));
}

#[test]
fn test_cli_assemble() {
    let tmp = workspace();
    extract(&tmp, "header.site-header", "header");
    extract(&tmp, "section.hero", "hero");
    extract(&tmp, "footer.site-footer", "footer");

    let output = cmd()
        .args(ws_args(&tmp))
        .args(["assemble", "header", "hero", "footer", "--title", "Launch", "--page", "about=header,footer"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let dir = PathBuf::from(String::from_utf8(output).unwrap().trim());
    let index = fs::read_to_string(dir.join("index.html")).unwrap();
    assert!(index.contains("<title>Launch</title>"));
    assert!(index.find("Section: header").unwrap() < index.find("Section: footer").unwrap());
    assert!(dir.join("about.html").is_file());
    assert!(dir.join("styles.css").is_file());
    assert!(dir.join("README.md").is_file());
}

#[test]
fn test_cli_assemble_unknown_section() {
    let tmp = workspace();
    extract(&tmp, "header.site-header", "header");

    cmd()
        .args(ws_args(&tmp))
        .args(["assemble", "header", "footer"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown section: footer"))
        .stderr(predicate::str::contains("Extract the section first"));
}

#[test]
fn test_cli_assemble_requires_sections() {
    cmd().arg("assemble").assert().failure();
}

#[test]
fn test_cli_suggest_defaults_without_key() {
    let tmp = TempDir::new().unwrap();
    let shot = write_screenshot(tmp.path());

    cmd()
        .args(["suggest", shot.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::diff("header\ncontent\nsection\n"));
}

#[test]
fn test_cli_mirror_invalid_url() {
    cmd().args(["mirror", "ftp://example.com"]).assert().failure();
}

#[test]
fn test_cli_mirror_missing_tool_hint() {
    let tmp = TempDir::new().unwrap();

    cmd()
        .args(ws_args(&tmp))
        .args(["mirror", "https://example.com", "--no-fallback", "--wget", "/nonexistent/wget"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Install wget"));
}

#[test]
fn test_cli_verbose() {
    let tmp = workspace();
    cmd()
        .args(ws_args(&tmp))
        .args(["-v", "sites"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Splice"));
}

#[test]
fn test_cli_completions() {
    cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("splice"));
}
