use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use owo_colors::OwoColorize;
use splice_core::fetch::BROWSER_USER_AGENT;
use splice_core::{
    AssemblyRequest, FetchConfig, GeminiAdvisor, MatchConfig, MatchHint, MatchOutcome, MirrorConfig, PageSpec,
    Screenshot, SectionMatcher, SiteSnapshot, SpliceError, VisionAdvisor, VisionConfig, WorkspaceConfig,
    extract_section, extract_website, list_snapshots, parse_site_url, suggest_names_or_default,
};
use tracing_subscriber::EnvFilter;
use url::Url;

mod echo;

use echo::{
    format_size, print_assembly_summary, print_banner, print_error, print_info, print_match_details,
    print_section_summary, print_step, print_success, print_warning,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Cut sections out of websites and splice them into new pages
#[derive(Parser, Debug)]
#[command(name = "splice")]
#[command(author = "Splice Contributors")]
#[command(version)]
#[command(about = "Cut sections out of websites and splice them into new pages", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Workspace directory holding sites, sections and output
    #[arg(long, global = true, default_value = ".", value_name = "DIR")]
    workspace: PathBuf,

    /// HTTP timeout in seconds
    #[arg(long, global = true, default_value = "30", value_name = "SECS")]
    timeout: u64,

    /// Custom User-Agent for HTTP requests
    #[arg(long, global = true, value_name = "UA")]
    user_agent: Option<String>,

    /// Minimum score for a screenshot match (0.0 - 1.0)
    #[arg(long, global = true, value_name = "SCORE", value_parser = parse_floor)]
    floor: Option<f64>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mirror a website into the workspace
    Mirror {
        /// Website URL (http or https)
        #[arg(value_parser = parse_url)]
        url: Url,

        /// Fail instead of fetching the single page when mirroring fails
        #[arg(long)]
        no_fallback: bool,

        /// Path to the wget binary
        #[arg(long, default_value = "wget", value_name = "PATH")]
        wget: PathBuf,
    },

    /// Locate the part of a mirrored page shown in a screenshot
    Match {
        /// Snapshot directory, or its name under the workspace
        site: PathBuf,

        /// Screenshot image (png, jpeg, webp, gif, bmp)
        screenshot: PathBuf,

        /// Section name, e.g. header or hero
        #[arg(short, long)]
        name: Option<String>,

        /// Text visible in the screenshot
        #[arg(long, value_name = "TEXT")]
        hint: Option<String>,

        /// Gemini API key for vision matching
        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, value_name = "KEY")]
        api_key: Option<String>,
    },

    /// Extract an element of a mirrored page as a named section
    Extract {
        /// Snapshot directory, or its name under the workspace
        site: PathBuf,

        /// CSS selector of the element
        #[arg(short, long)]
        selector: String,

        /// Section name ([A-Za-z0-9_-], up to 64 characters)
        #[arg(short, long)]
        name: String,

        /// Page relative to the snapshot root (default: the root page)
        #[arg(long, value_name = "FILE")]
        page: Option<PathBuf>,
    },

    /// Assemble sections into a new site
    Assemble {
        /// Section names in page order
        #[arg(required = true, num_args = 1..)]
        sections: Vec<String>,

        /// Site title
        #[arg(short, long, default_value = "Assembled Website")]
        title: String,

        /// Extra page as name=section,section (repeatable)
        #[arg(long = "page", value_name = "NAME=SECTIONS", value_parser = parse_page)]
        pages: Vec<(String, Vec<String>)>,
    },

    /// List extracted sections
    Sections,

    /// List mirrored sites
    Sites,

    /// Suggest names for the section shown in a screenshot
    Suggest {
        /// Screenshot image
        screenshot: PathBuf,

        /// Gemini API key
        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, value_name = "KEY")]
        api_key: Option<String>,
    },

    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_url(value: &str) -> Result<Url, String> {
    parse_site_url(value).map_err(|e| e.to_string())
}

fn parse_floor(value: &str) -> Result<f64, String> {
    let floor: f64 = value.parse().map_err(|_| format!("Invalid score: {}", value))?;
    if (0.0..=1.0).contains(&floor) { Ok(floor) } else { Err(format!("Score must be between 0 and 1, got {}", floor)) }
}

fn parse_page(value: &str) -> Result<(String, Vec<String>), String> {
    let (name, sections) = value.split_once('=').ok_or_else(|| format!("Expected NAME=SECTIONS, got {}", value))?;
    let sections: Vec<String> =
        sections.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect();
    if name.trim().is_empty() || sections.is_empty() {
        return Err(format!("Expected NAME=SECTIONS, got {}", value));
    }
    Ok((name.trim().to_string(), sections))
}

impl Args {
    fn workspace(&self) -> WorkspaceConfig {
        WorkspaceConfig::at(&self.workspace)
    }

    fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            timeout: self.timeout,
            user_agent: self.user_agent.clone().unwrap_or_else(|| BROWSER_USER_AGENT.to_string()),
        }
    }

    fn match_config(&self) -> MatchConfig {
        let mut config = MatchConfig::default();
        if let Some(floor) = self.floor {
            config.confidence_floor = floor;
        }
        config
    }

    /// A path as given, or the snapshot of that name in the workspace.
    fn site_dir(&self, site: &Path) -> PathBuf {
        if site.is_dir() { site.to_path_buf() } else { self.workspace().sites_path().join(site) }
    }
}

fn advisor(api_key: Option<String>) -> anyhow::Result<Option<Arc<dyn VisionAdvisor>>> {
    let config = VisionConfig { api_key, ..Default::default() };
    let advisor = GeminiAdvisor::new(config).context("Failed to create vision client")?;
    Ok(advisor.map(|a| Arc::new(a) as Arc<dyn VisionAdvisor>))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info,splice_core=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).compact().init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.verbose {
        print_banner();
        print_info("Debug logging enabled");
        eprintln!();
    }

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            print_error(&format!("{:#}", err));
            if let Some(hint) = err.chain().find_map(|e| e.downcast_ref::<SpliceError>()).and_then(SpliceError::hint) {
                print_info(hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> anyhow::Result<()> {
    match &args.command {
        Command::Mirror { url, no_fallback, wget } => mirror(args, url, !no_fallback, wget).await,
        Command::Match { site, screenshot, name, hint, api_key } => {
            match_screenshot(args, site, screenshot, name.as_deref(), hint.as_deref(), api_key.clone()).await
        }
        Command::Extract { site, selector, name, page } => extract(args, site, selector, name, page.as_deref()),
        Command::Assemble { sections, title, pages } => assemble(args, sections, title, pages),
        Command::Sections => list_sections(args),
        Command::Sites => list_sites(args),
        Command::Suggest { screenshot, api_key } => suggest(screenshot, api_key.clone()).await,
        Command::Completions { shell } => {
            clap_complete::generate(*shell, &mut Args::command(), "splice", &mut std::io::stdout());
            Ok(())
        }
    }
}

async fn mirror(args: &Args, url: &Url, fallback: bool, wget: &Path) -> anyhow::Result<()> {
    let workspace = args.workspace();
    workspace.ensure_dirs().context("Failed to create workspace directories")?;

    if args.verbose {
        print_step(1, 2, &format!("Mirroring {}", url.as_str().bright_white().underline()));
    }

    let config = MirrorConfig {
        wget_path: wget.to_path_buf(),
        fallback,
        fetch: args.fetch_config(),
        ..Default::default()
    };
    let snapshot = extract_website(url.as_str(), &workspace.sites_path(), &config)
        .await
        .with_context(|| format!("Failed to extract {}", url))?;

    let files = snapshot.html_files();
    if args.verbose {
        print_step(2, 2, "Inspecting snapshot");
        let size: u64 = files.iter().filter_map(|f| f.metadata().ok()).map(|m| m.len()).sum();
        eprintln!("  {} {}", "HTML files:".dimmed(), files.len().to_string().bright_white());
        eprintln!("  {} {}", "HTML size:".dimmed(), format_size(size as usize).bright_white());
        eprintln!();
    }

    if let Some(splice_core::CaptureMethod::Fallback) = snapshot.method {
        print_warning("Mirroring failed, captured the single page only");
    }
    print_success(&format!("Website extracted to {}", snapshot.root.display().bright_white()));
    println!("{}", snapshot.root.display());
    Ok(())
}

async fn match_screenshot(
    args: &Args, site: &Path, screenshot: &Path, name: Option<&str>, hint: Option<&str>, api_key: Option<String>,
) -> anyhow::Result<()> {
    let site_dir = args.site_dir(site);
    let snapshot =
        SiteSnapshot::open(&site_dir).with_context(|| format!("Failed to open site: {}", site_dir.display()))?;
    let shot = Screenshot::open(screenshot)
        .with_context(|| format!("Failed to read screenshot: {}", screenshot.display()))?;

    if args.verbose {
        let features = shot.features();
        print_step(1, 2, "Loaded screenshot");
        eprintln!(
            "  {} {}x{} ({})",
            "Image:".dimmed(),
            features.width,
            features.height,
            format_size(shot.bytes().len())
        );
        eprintln!();
    }

    let mut matcher = SectionMatcher::new(args.match_config());
    if let Some(advisor) = advisor(api_key)? {
        matcher = matcher.with_advisor(advisor);
    }

    let mut match_hint = MatchHint::new(name.unwrap_or_default());
    if let Some(text) = hint {
        match_hint = match_hint.with_text(text);
    }

    if args.verbose {
        let mode = if matcher.has_advisor() { "vision + heuristic" } else { "heuristic" };
        print_step(2, 2, &format!("Matching against {} ({})", snapshot.domain, mode));
    }

    let outcome = matcher.match_snapshot(&snapshot, &shot, &match_hint).await.context("Failed to match screenshot")?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    match outcome {
        MatchOutcome::Matched(found) => {
            if args.verbose {
                print_match_details(&found);
            }
            print_success(&format!("Found {} ({:.2})", found.css_selector.bright_white(), found.confidence));
            Ok(())
        }
        MatchOutcome::NoMatch { best_score, floor } => {
            bail!("No confident match: best score {:.2} is below the floor {:.2}", best_score, floor)
        }
    }
}

fn extract(args: &Args, site: &Path, selector: &str, name: &str, page: Option<&Path>) -> anyhow::Result<()> {
    let workspace = args.workspace();
    let site_dir = args.site_dir(site);
    let snapshot =
        SiteSnapshot::open(&site_dir).with_context(|| format!("Failed to open site: {}", site_dir.display()))?;

    if args.verbose {
        print_step(1, 1, &format!("Extracting {} as {}", selector.bright_white(), name.bright_white()));
    }

    let section = extract_section(&snapshot, page, selector, name, &workspace.section_store())
        .with_context(|| format!("Failed to extract section {}", name))?;

    if args.verbose {
        print_section_summary(&section);
    }
    print_success(&format!("Section saved to {}", section.dir().display().bright_white()));
    println!("{}", serde_json::to_string_pretty(&section)?);
    Ok(())
}

fn assemble(args: &Args, sections: &[String], title: &str, pages: &[(String, Vec<String>)]) -> anyhow::Result<()> {
    let workspace = args.workspace();
    let mut request = AssemblyRequest::new(sections.iter().cloned()).with_title(title);
    for (name, page_sections) in pages {
        request = request.with_page(name.clone(), PageSpec { title: None, sections: page_sections.clone() });
    }

    if args.verbose {
        print_step(1, 1, &format!("Assembling {} sections", sections.len()));
    }

    let site = workspace.assembler().assemble(&request).context("Failed to assemble site")?;

    if args.verbose {
        print_assembly_summary(&site);
    }
    print_success(&format!("Site assembled in {}", site.output_dir.display().bright_white()));
    println!("{}", site.output_dir.display());
    Ok(())
}

fn list_sections(args: &Args) -> anyhow::Result<()> {
    let sections = args.workspace().section_store().list().context("Failed to list sections")?;
    if sections.is_empty() {
        print_info("No sections extracted yet");
    }
    for section in &sections {
        println!("{}", section.name);
        if args.verbose {
            print_section_summary(section);
        }
    }
    Ok(())
}

fn list_sites(args: &Args) -> anyhow::Result<()> {
    let sites = list_snapshots(&args.workspace().sites_path()).context("Failed to list sites")?;
    if sites.is_empty() {
        print_info("No sites extracted yet");
    }
    for site in sites {
        println!("{}\t{}", site.name, site.path.display());
    }
    Ok(())
}

async fn suggest(screenshot: &Path, api_key: Option<String>) -> anyhow::Result<()> {
    let shot = Screenshot::open(screenshot)
        .with_context(|| format!("Failed to read screenshot: {}", screenshot.display()))?;
    let advisor = advisor(api_key)?;
    if advisor.is_none() {
        print_warning("No API key configured, showing default names");
    }

    for name in suggest_names_or_default(advisor.as_deref(), &shot).await {
        println!("{}", name);
    }
    Ok(())
}
