pub mod assemble;
pub mod candidate;
pub mod config;
pub mod error;
pub mod fetch;
pub mod fragment;
pub mod matcher;
pub mod mirror;
pub mod parse;
pub mod scoring;
pub mod screenshot;
pub mod section;
pub mod vision;

pub use assemble::{AssembledSite, Assembler, AssemblyRequest, PageSpec};
#[doc(hidden)]
pub use candidate::{Candidate, collect_candidates, unique_selector};
pub use config::{WorkspaceConfig, WorkspaceConfigBuilder};
pub use error::{Result, SpliceError};
pub use fetch::FetchConfig;
pub use fetch::{fetch_file, fetch_url, parse_site_url};
pub use fragment::extract_section;
pub use matcher::{MatchMethod, MatchOutcome, RankedCandidate, SectionMatch, SectionMatcher};
pub use mirror::{CaptureMethod, MirrorConfig, SiteSnapshot, SnapshotEntry, extract_website, list_snapshots};
pub use parse::Document;
#[doc(hidden)]
pub use scoring::{ScoreResult, jaccard, name_affinity, structure_similarity};
pub use scoring::{BaselineScorer, CandidateScorer, MatchConfig, MatchHint};
pub use screenshot::{ImageFeatures, Screenshot, ScreenshotEntry, list_screenshots};
pub use section::{Section, SectionStore, validate_section_name};
pub use vision::{GeminiAdvisor, VisionAdvisor, VisionConfig, VisionSuggestion, suggest_names_or_default};
