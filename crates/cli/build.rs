use std::{env, fs, path::PathBuf};

fn site_arg() -> clap::Arg {
    clap::arg!(<SITE> "Snapshot directory, or its name under the workspace")
        .value_parser(clap::value_parser!(std::path::PathBuf))
}

fn screenshot_arg() -> clap::Arg {
    clap::arg!(<SCREENSHOT> "Screenshot image (png, jpeg, webp, gif, bmp)")
        .value_parser(clap::value_parser!(std::path::PathBuf))
}

fn api_key_arg() -> clap::Arg {
    clap::arg!(--api_key <KEY> "Gemini API key").value_name("KEY")
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=OUT_DIR");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let completions_dir = out_dir.join("completions");

    fs::create_dir_all(&completions_dir).unwrap();

    let mut cmd = clap::Command::new("splice")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Splice Contributors")
        .about("Cut sections out of websites and splice them into new pages")
        .arg(
            clap::arg!(--workspace <DIR> "Workspace directory holding sites, sections and output")
                .global(true)
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(clap::arg!(--timeout <SECS> "HTTP timeout in seconds").global(true).default_value("30"))
        .arg(clap::arg!(--user_agent <UA> "Custom User-Agent for HTTP requests").global(true).value_name("UA"))
        .arg(clap::arg!(--floor <SCORE> "Minimum score for a screenshot match (0.0 - 1.0)").global(true))
        .arg(clap::arg!(-v --verbose "Enable debug logging").global(true))
        .subcommand(
            clap::Command::new("mirror")
                .about("Mirror a website into the workspace")
                .arg(clap::arg!(<URL> "Website URL (http or https)"))
                .arg(clap::arg!(--no_fallback "Fail instead of fetching the single page when mirroring fails"))
                .arg(
                    clap::arg!(--wget <PATH> "Path to the wget binary")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
        .subcommand(
            clap::Command::new("match")
                .about("Locate the part of a mirrored page shown in a screenshot")
                .arg(site_arg())
                .arg(screenshot_arg())
                .arg(clap::arg!(-n --name <NAME> "Section name, e.g. header or hero"))
                .arg(clap::arg!(--hint <TEXT> "Text visible in the screenshot"))
                .arg(api_key_arg()),
        )
        .subcommand(
            clap::Command::new("extract")
                .about("Extract an element of a mirrored page as a named section")
                .arg(site_arg())
                .arg(clap::arg!(-s --selector <SELECTOR> "CSS selector of the element"))
                .arg(clap::arg!(-n --name <NAME> "Section name"))
                .arg(
                    clap::arg!(--page <FILE> "Page relative to the snapshot root")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
        .subcommand(
            clap::Command::new("assemble")
                .about("Assemble sections into a new site")
                .arg(clap::arg!(<SECTIONS> ... "Section names in page order"))
                .arg(clap::arg!(-t --title <TITLE> "Site title"))
                .arg(clap::arg!(--page <PAGE> ... "Extra page as name=section,section")),
        )
        .subcommand(clap::Command::new("sections").about("List extracted sections"))
        .subcommand(clap::Command::new("sites").about("List mirrored sites"))
        .subcommand(
            clap::Command::new("suggest")
                .about("Suggest names for the section shown in a screenshot")
                .arg(screenshot_arg())
                .arg(api_key_arg()),
        )
        .subcommand(
            clap::Command::new("completions")
                .about("Print a shell completion script")
                .arg(clap::arg!(<SHELL> "Shell").value_parser(["bash", "zsh", "fish", "powershell", "elvish"])),
        );

    clap_complete::generate_to(clap_complete::shells::Bash, &mut cmd, "splice", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Zsh, &mut cmd, "splice", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Fish, &mut cmd, "splice", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::PowerShell, &mut cmd, "splice", &completions_dir).unwrap();

    println!(
        "cargo:warning=Shell completions generated in: {}",
        completions_dir.display()
    );
}
