use owo_colors::OwoColorize;
use splice_core::{AssembledSite, Section, SectionMatch};

use crate::VERSION;

/// Print a styled banner for verbose mode
pub fn print_banner() {
    eprintln!("\n{} {} {}", "Splice".bold().bright_blue(), "v".dimmed(), VERSION.dimmed());
    eprintln!("{}", "Cut sections out of websites and splice them into new pages\n".dimmed());
}

/// Print a styled step message
pub fn print_step(step: usize, total: usize, message: &str) {
    eprintln!("{} {}", format!("[{}/{}]", step, total).dimmed(), message.bright_cyan());
}

/// Print a success message
pub fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green(), message.bright_green());
}

/// Print an info message
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue(), message.bright_blue());
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow(), message.bright_yellow());
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message.bright_red());
}

/// Print the located section with its runner-up candidates
pub fn print_match_details(found: &SectionMatch) {
    eprintln!("\n{}", "═".repeat(60).dimmed());
    eprintln!("{}", "Match Details".bold().cyan());
    eprintln!("{}", "═".repeat(60).dimmed());
    eprintln!("  {} {}", "Selector:".dimmed(), found.css_selector.bright_white());
    eprintln!("  {} {}", "Confidence:".dimmed(), format!("{:.2}", found.confidence).bright_white());
    eprintln!("  {} {}", "Method:".dimmed(), found.method.as_str().bright_white());
    if !found.reasoning.is_empty() {
        eprintln!("  {} {}", "Reasoning:".dimmed(), found.reasoning);
    }

    if found.ranked.len() > 1 {
        eprintln!("  {}", "Candidates:".dimmed());
        for candidate in &found.ranked {
            eprintln!("    {:>5.2}  {}", candidate.score, candidate.css_selector);
        }
    }
    eprintln!();
}

/// Print a one-line summary of an extracted section
pub fn print_section_summary(section: &Section) {
    eprintln!(
        "  {} {} css, {} js, {} media",
        format!("{}:", section.name).bright_white(),
        section.css_files.len(),
        section.js_files.len(),
        section.media_files.len()
    );
}

/// Print where an assembled site was written and what it holds
pub fn print_assembly_summary(site: &AssembledSite) {
    eprintln!("  {} {}", "Title:".dimmed(), site.title.bright_white());
    eprintln!("  {} {}", "Sections:".dimmed(), site.sections.join(", ").bright_white());
    eprintln!("  {} {}", "Pages:".dimmed(), site.pages.join(", ").bright_white());
    eprintln!("  {} {}", "Assets:".dimmed(), site.assets.len().to_string().bright_white());
}

/// Format file size for display
pub fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * KB;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
