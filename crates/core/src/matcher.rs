//! Screenshot-to-subtree matching.
//!
//! [`SectionMatcher`] ranks the candidate blocks of a page against a
//! screenshot with a [`CandidateScorer`] and, when a [`VisionAdvisor`] is
//! configured, lets the vision service override or re-rank the result.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::candidate::{Candidate, collect_candidates};
use crate::fetch::fetch_file;
use crate::mirror::SiteSnapshot;
use crate::parse::Document;
use crate::scoring::{BaselineScorer, CandidateScorer, MatchConfig, MatchHint, ScoreResult};
use crate::screenshot::Screenshot;
use crate::vision::{VisionAdvisor, VisionSuggestion};

/// Characters of element text kept in a [`SectionMatch`].
const ELEMENT_TEXT_CHARS: usize = 200;

/// How a match was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMethod {
    /// Heuristic scoring only.
    Baseline,
    /// Selector suggested by the vision service.
    Vision,
    /// Selector scraped from a free-text vision answer.
    VisionText,
    /// Heuristic scoring with the vision description folded into the hint.
    VisionRerank,
}

impl MatchMethod {
    /// Label used in reports; same as the serialized name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Vision => "vision",
            Self::VisionText => "vision-text",
            Self::VisionRerank => "vision-rerank",
        }
    }
}

/// A scored candidate in a match report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub css_selector: String,
    pub tag_name: String,
    pub score: f64,
}

/// The located section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionMatch {
    /// Page the selector applies to, relative to the snapshot root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_file: Option<PathBuf>,
    pub css_selector: String,
    /// Score in `[0, 1]`.
    pub confidence: f64,
    pub method: MatchMethod,
    /// Leading visible text of the matched element.
    pub element_text: String,
    pub tag_name: String,
    pub reasoning: String,
    #[serde(default)]
    pub section_type: String,
    /// Best heuristic candidates, highest first.
    #[serde(default)]
    pub ranked: Vec<RankedCandidate>,
}

/// Result of matching one screenshot against one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MatchOutcome {
    Matched(SectionMatch),
    /// No candidate reached the confidence floor.
    NoMatch { best_score: f64, floor: f64 },
}

impl MatchOutcome {
    pub fn matched(&self) -> Option<&SectionMatch> {
        match self {
            Self::Matched(m) => Some(m),
            Self::NoMatch { .. } => None,
        }
    }

    pub fn into_matched(self) -> Option<SectionMatch> {
        match self {
            Self::Matched(m) => Some(m),
            Self::NoMatch { .. } => None,
        }
    }
}

/// Locates the DOM subtree a screenshot shows.
pub struct SectionMatcher {
    scorer: Box<dyn CandidateScorer>,
    advisor: Option<Arc<dyn VisionAdvisor>>,
    config: MatchConfig,
}

impl Default for SectionMatcher {
    fn default() -> Self {
        Self::new(MatchConfig::default())
    }
}

impl SectionMatcher {
    /// A baseline-only matcher.
    pub fn new(config: MatchConfig) -> Self {
        Self { scorer: Box::new(BaselineScorer::new(config.clone())), advisor: None, config }
    }

    /// Replaces the heuristic scorer.
    pub fn with_scorer(mut self, scorer: Box<dyn CandidateScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Enables the vision override.
    pub fn with_advisor(mut self, advisor: Arc<dyn VisionAdvisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn has_advisor(&self) -> bool {
        self.advisor.is_some()
    }

    /// Scores every candidate; highest first, ties in document order.
    pub fn rank(&self, candidates: &[Candidate], screenshot: &Screenshot, hint: &MatchHint) -> Vec<(usize, ScoreResult)> {
        let mut scored: Vec<(usize, ScoreResult)> = candidates
            .iter()
            .enumerate()
            .map(|(idx, c)| (idx, self.scorer.score(c, screenshot.features(), hint)))
            .collect();

        scored.sort_by(|a, b| b.1.final_score.total_cmp(&a.1.final_score).then(a.0.cmp(&b.0)));
        scored
    }

    /// Matches against a parsed page, given an optional vision suggestion.
    pub fn match_document(
        &self, doc: &Document, screenshot: &Screenshot, hint: &MatchHint, suggestion: Option<&VisionSuggestion>,
    ) -> MatchOutcome {
        let candidates = collect_candidates(doc);
        let floor = self.config.confidence_floor;

        let Some(suggestion) = suggestion else {
            return self.select_best(&candidates, screenshot, hint, MatchMethod::Baseline);
        };

        if suggestion.confidence >= floor
            && let Ok(element) = doc.select_first(&suggestion.css_selector)
        {
            let method = if suggestion.from_text { MatchMethod::VisionText } else { MatchMethod::Vision };
            tracing::debug!(selector = %suggestion.css_selector, confidence = suggestion.confidence, "vision override");
            return MatchOutcome::Matched(SectionMatch {
                html_file: None,
                css_selector: suggestion.css_selector.clone(),
                confidence: suggestion.confidence,
                method,
                element_text: truncate_chars(&element.text(), ELEMENT_TEXT_CHARS),
                tag_name: element.tag_name(),
                reasoning: suggestion.reasoning.clone(),
                section_type: suggestion.section_type.clone(),
                ranked: self.ranked_report(&candidates, &self.rank(&candidates, screenshot, hint)),
            });
        }

        tracing::debug!(
            selector = %suggestion.css_selector,
            confidence = suggestion.confidence,
            "vision suggestion unusable, re-ranking with its description"
        );
        let mut enriched = hint.clone();
        enriched.extend_text(&suggestion.text_content);
        enriched.extend_text(&suggestion.section_type);
        let mut outcome = self.select_best(&candidates, screenshot, &enriched, MatchMethod::VisionRerank);
        if let MatchOutcome::Matched(m) = &mut outcome
            && m.section_type.is_empty()
        {
            m.section_type = suggestion.section_type.clone();
        }
        outcome
    }

    /// Matches against page HTML, consulting the advisor first.
    ///
    /// Advisor failures are logged and the heuristic result returned.
    pub async fn match_page(
        &self, html: &str, html_file: Option<PathBuf>, screenshot: &Screenshot, hint: &MatchHint,
    ) -> Result<MatchOutcome> {
        let suggestion = match &self.advisor {
            Some(advisor) => match advisor.locate(screenshot, html, &hint.section_name).await {
                Ok(s) => Some(s),
                Err(err) => {
                    tracing::warn!(error = %err, "vision service failed, falling back to heuristic matching");
                    None
                }
            },
            None => None,
        };

        let doc = Document::parse(html)?;
        let mut outcome = self.match_document(&doc, screenshot, hint, suggestion.as_ref());
        if let MatchOutcome::Matched(m) = &mut outcome {
            m.html_file = html_file;
        }
        Ok(outcome)
    }

    /// Matches against a snapshot's root page.
    pub async fn match_snapshot(
        &self, snapshot: &SiteSnapshot, screenshot: &Screenshot, hint: &MatchHint,
    ) -> Result<MatchOutcome> {
        let page = snapshot.root_page()?;
        let html = fetch_file(&page)?;
        let relative = relative_to(&page, &snapshot.root);

        tracing::info!(page = %relative.display(), section = %hint.section_name, "matching screenshot");
        self.match_page(&html, Some(relative), screenshot, hint).await
    }

    fn select_best(
        &self, candidates: &[Candidate], screenshot: &Screenshot, hint: &MatchHint, method: MatchMethod,
    ) -> MatchOutcome {
        let floor = self.config.confidence_floor;
        let ranking = self.rank(candidates, screenshot, hint);

        let Some((idx, best)) = ranking.first() else {
            return MatchOutcome::NoMatch { best_score: 0.0, floor };
        };
        if best.final_score < floor {
            tracing::debug!(best = best.final_score, floor, "no candidate reached the floor");
            return MatchOutcome::NoMatch { best_score: best.final_score, floor };
        }

        let candidate = &candidates[*idx];
        MatchOutcome::Matched(SectionMatch {
            html_file: None,
            css_selector: candidate.selector.clone(),
            confidence: best.final_score,
            method,
            element_text: truncate_chars(&candidate.text, ELEMENT_TEXT_CHARS),
            tag_name: candidate.tag_name.clone(),
            reasoning: format!(
                "text similarity {:.2}, name affinity {:.2}, structure {:.2}",
                best.text_similarity, best.name_affinity, best.structure
            ),
            section_type: String::new(),
            ranked: self.ranked_report(candidates, &ranking),
        })
    }

    fn ranked_report(&self, candidates: &[Candidate], ranking: &[(usize, ScoreResult)]) -> Vec<RankedCandidate> {
        ranking
            .iter()
            .take(self.config.max_ranked)
            .map(|(idx, score)| RankedCandidate {
                css_selector: candidates[*idx].selector.clone(),
                tag_name: candidates[*idx].tag_name.clone(),
                score: score.final_score,
            })
            .collect()
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn relative_to(path: &Path, root: &Path) -> PathBuf {
    path.strip_prefix(root).map(Path::to_path_buf).unwrap_or_else(|_| path.to_path_buf())
}
