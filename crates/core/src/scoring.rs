use std::collections::BTreeSet;

use crate::candidate::{Candidate, tokenize};
use crate::screenshot::ImageFeatures;

/// Configuration for screenshot-to-subtree scoring.
///
/// The weights and the floor are heuristic placeholders; tune them per site.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Minimum score a candidate needs to be reported as a match
    pub confidence_floor: f64,
    /// Weight of the Jaccard text similarity
    pub text_weight: f64,
    /// Weight of the section-name affinity
    pub name_weight: f64,
    /// Weight of the image/structure similarity
    pub structure_weight: f64,
    /// Aspect ratio (width / height) from which a screenshot counts as a strip
    pub strip_aspect_ratio: f64,
    /// Maximum number of ranked candidates kept in a match report
    pub max_ranked: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.2,
            text_weight: 0.6,
            name_weight: 0.25,
            structure_weight: 0.15,
            strip_aspect_ratio: 4.0,
            max_ranked: 5,
        }
    }
}

/// What the user tells the matcher about a screenshot.
#[derive(Debug, Clone, Default)]
pub struct MatchHint {
    /// Section name chosen by the user, e.g. `hero` or `site-footer`
    pub section_name: String,
    /// Text visible in the screenshot, a caption, or text reported by the vision service
    pub text: Option<String>,
}

impl MatchHint {
    pub fn new(section_name: impl Into<String>) -> Self {
        Self { section_name: section_name.into(), text: None }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Tokens of the section name only.
    pub fn name_tokens(&self) -> BTreeSet<String> {
        tokenize(&self.section_name)
    }

    /// Tokens of the hint text only.
    pub fn text_words(&self) -> BTreeSet<String> {
        self.text.as_deref().map(tokenize).unwrap_or_default()
    }

    /// Tokens of the section name and the hint text.
    pub fn words(&self) -> BTreeSet<String> {
        let mut words = self.name_tokens();
        words.extend(self.text_words());
        words
    }

    /// Appends more text, e.g. from a vision suggestion.
    pub fn extend_text(&mut self, more: &str) {
        if more.trim().is_empty() {
            return;
        }
        self.text = Some(match self.text.take() {
            Some(existing) => format!("{existing} {more}"),
            None => more.to_string(),
        });
    }
}

/// Breakdown of one candidate's score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    /// Jaccard similarity of hint words and candidate context words
    pub text_similarity: f64,
    /// 1.0 when the hinted name appears in the candidate's tag, id or classes
    pub name_affinity: f64,
    /// Similarity of image shape/density to the candidate's structure
    pub structure: f64,
    /// Weighted sum in `[0, 1]`
    pub final_score: f64,
}

/// Scores a candidate subtree against a screenshot.
///
/// Implementations must return a `final_score` in `[0, 1]`.
pub trait CandidateScorer: Send + Sync {
    fn score(&self, candidate: &Candidate, image: &ImageFeatures, hint: &MatchHint) -> ScoreResult;
}

/// Jaccard similarity `|a ∩ b| / |a ∪ b|`; zero when either set is empty.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// 1.0 if any hint name token names the candidate.
pub fn name_affinity(candidate: &Candidate, hint: &MatchHint) -> f64 {
    let hinted = hint.name_tokens();
    if hinted.is_empty() {
        return 0.0;
    }
    if candidate.name_tokens().iter().any(|t| hinted.contains(t)) { 1.0 } else { 0.0 }
}

/// Characters of text at which a block counts as half full.
const TEXT_VOLUME_SCALE: f64 = 200.0;

const TEXT_TAGS: &[&str] = &["p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "blockquote", "span"];

/// Shape, text volume and tag profile similarity in `[0, 1]`.
///
/// - wide strips favour page chrome, taller shots favour content blocks
/// - the taller the shot, the larger the text block it is expected to show
/// - the candidate's media/link/text tag frequencies are compared with the
///   profile the screenshot suggests: colourful or dark, edge-poor images
///   read as media; strips read as link rows, the rest as text
pub fn structure_similarity(candidate: &Candidate, image: &ImageFeatures, config: &MatchConfig) -> f64 {
    let is_strip = image.aspect_ratio >= config.strip_aspect_ratio;
    let shape = match (is_strip, candidate.is_chrome()) {
        (true, true) | (false, false) => 1.0,
        _ => 0.3,
    };

    let tallness = (1.0 / image.aspect_ratio.max(f64::EPSILON)).clamp(0.0, 1.0);
    let text_len = candidate.text_len() as f64;
    let volume = text_len / (text_len + TEXT_VOLUME_SCALE);
    let volume_fit = 1.0 - (volume - tallness).abs();

    let expected = image_profile(image, is_strip);
    let distance: f64 = tag_profile(candidate).iter().zip(expected).map(|(a, b)| (a - b).abs()).sum();
    let profile_fit = 1.0 - 0.5 * distance;

    ((shape + volume_fit + profile_fit) / 3.0).clamp(0.0, 1.0)
}

/// Media, link and text shares of the candidate's descendant tags.
fn tag_profile(candidate: &Candidate) -> [f64; 3] {
    let count = |tags: &[&str]| -> f64 {
        tags.iter().map(|t| candidate.tag_counts.get(*t).copied().unwrap_or(0)).sum::<usize>() as f64
    };

    let media = (candidate.image_count as f64) + count(&["svg", "canvas"]);
    let links = (candidate.link_count as f64) + count(&["button"]);
    let text = count(TEXT_TAGS);
    let total = media + links + text;
    if total == 0.0 {
        return [1.0 / 3.0; 3];
    }
    [media / total, links / total, text / total]
}

/// Media, link and text shares a screenshot suggests.
fn image_profile(image: &ImageFeatures, is_strip: bool) -> [f64; 3] {
    let tone = image.colorfulness * 2.0 + (1.0 - image.mean_luminance) * 0.5;
    let media = (tone * (1.0 - image.edge_density)).clamp(0.0, 1.0);
    let rest = 1.0 - media;
    if is_strip { [media, rest * 0.7, rest * 0.3] } else { [media, rest * 0.3, rest * 0.7] }
}

/// Weighted text, name and structure scorer.
#[derive(Debug, Clone, Default)]
pub struct BaselineScorer {
    config: MatchConfig,
}

impl BaselineScorer {
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }
}

impl CandidateScorer for BaselineScorer {
    fn score(&self, candidate: &Candidate, image: &ImageFeatures, hint: &MatchHint) -> ScoreResult {
        let context = candidate.context_words();
        // The name only counts once the hint text touches the candidate.
        let (text_similarity, name_affinity) = if hint.text_words().is_disjoint(&context) {
            (0.0, 0.0)
        } else {
            (jaccard(&hint.words(), &context), name_affinity(candidate, hint))
        };
        let structure = structure_similarity(candidate, image, &self.config);

        let total = self.config.text_weight + self.config.name_weight + self.config.structure_weight;
        let weighted = self.config.text_weight * text_similarity
            + self.config.name_weight * name_affinity
            + self.config.structure_weight * structure;
        let final_score = if total > 0.0 { (weighted / total).clamp(0.0, 1.0) } else { 0.0 };

        ScoreResult { text_similarity, name_affinity, structure, final_score }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::collect_candidates;
    use crate::parse::Document;
    use rstest::rstest;

    fn set(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn wide_white() -> ImageFeatures {
        ImageFeatures {
            width: 1200,
            height: 600,
            aspect_ratio: 2.0,
            mean_luminance: 1.0,
            edge_density: 0.1,
            colorfulness: 0.0,
        }
    }

    #[rstest]
    #[case(&["a", "b"], &["a", "b"], 1.0)]
    #[case(&["a", "b"], &["b", "c"], 1.0 / 3.0)]
    #[case(&["a"], &["b"], 0.0)]
    #[case(&[], &["b"], 0.0)]
    fn test_jaccard(#[case] a: &[&str], #[case] b: &[&str], #[case] expected: f64) {
        assert!((jaccard(&set(a), &set(b)) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_name_affinity_matches_class_parts() {
        let doc = Document::parse(r#"<body><section class="hero-banner"><h1>Hi</h1></section></body>"#).unwrap();
        let candidate = &collect_candidates(&doc)[0];

        assert_eq!(name_affinity(candidate, &MatchHint::new("hero")), 1.0);
        assert_eq!(name_affinity(candidate, &MatchHint::new("pricing")), 0.0);
    }

    #[test]
    fn test_strip_favours_chrome() {
        let doc = Document::parse("<body><header><a href='/'>Home</a></header><section><p>Body copy</p></section></body>")
            .unwrap();
        let candidates = collect_candidates(&doc);
        let strip = ImageFeatures { aspect_ratio: 8.0, ..wide_white() };
        let config = MatchConfig::default();

        let header = structure_similarity(&candidates[0], &strip, &config);
        let section = structure_similarity(&candidates[1], &strip, &config);
        assert!(header > section);
    }

    #[test]
    fn test_tall_shot_favours_long_text() {
        let long = "word ".repeat(120);
        let html = format!("<body><section><p>Short</p></section><section><p>{long}</p></section></body>");
        let doc = Document::parse(&html).unwrap();
        let candidates = collect_candidates(&doc);
        let config = MatchConfig::default();

        let tall = ImageFeatures { width: 800, height: 1600, aspect_ratio: 0.5, ..wide_white() };
        let short_score = structure_similarity(&candidates[0], &tall, &config);
        let long_score = structure_similarity(&candidates[1], &tall, &config);
        assert!(long_score > short_score);

        let wide = ImageFeatures { width: 1200, height: 400, aspect_ratio: 3.0, ..wide_white() };
        let short_score = structure_similarity(&candidates[0], &wide, &config);
        let long_score = structure_similarity(&candidates[1], &wide, &config);
        assert!(short_score > long_score);
    }

    #[test]
    fn test_colourful_shot_favours_media_blocks() {
        let doc = Document::parse(
            "<body><section><img src='a.png'><img src='b.png'><p>Gallery</p></section>\
             <section><p>Plain words here</p><p>More words</p></section></body>",
        )
        .unwrap();
        let candidates = collect_candidates(&doc);
        let photo = ImageFeatures {
            width: 1200,
            height: 800,
            aspect_ratio: 1.5,
            mean_luminance: 0.5,
            edge_density: 0.1,
            colorfulness: 0.5,
        };
        let config = MatchConfig::default();

        let gallery = structure_similarity(&candidates[0], &photo, &config);
        let prose = structure_similarity(&candidates[1], &photo, &config);
        assert!(gallery > prose);
    }

    #[test]
    fn test_tag_profile_without_tags_is_uniform() {
        let doc = Document::parse("<body><section>bare text</section></body>").unwrap();
        let profile = tag_profile(&collect_candidates(&doc)[0]);
        assert!(profile.iter().all(|share| (share - 1.0 / 3.0).abs() < 1e-9));
    }

    #[test]
    fn test_score_is_bounded() {
        let doc = Document::parse("<body><section class='hero'><h1>Build faster</h1></section></body>").unwrap();
        let candidate = &collect_candidates(&doc)[0];
        let hint = MatchHint::new("hero").with_text("Build faster");

        let result = BaselineScorer::default().score(candidate, &wide_white(), &hint);
        assert!(result.final_score > 0.0 && result.final_score <= 1.0);
        // {hero, build, faster} against {build, faster, section, hero}
        assert!((result.text_similarity - 0.75).abs() < 1e-9);
        assert_eq!(result.name_affinity, 1.0);
    }

    #[test]
    fn test_name_without_text_overlap_stays_below_floor() {
        let doc = Document::parse("<body><footer class='site-footer'><p>Copyright 2024 Acme</p></footer></body>").unwrap();
        let candidate = &collect_candidates(&doc)[0];
        let scorer = BaselineScorer::default();

        for hint in [MatchHint::new("footer"), MatchHint::new("footer").with_text("quarterly newsletter subscription")] {
            let result = scorer.score(candidate, &wide_white(), &hint);
            assert_eq!(result.text_similarity, 0.0);
            assert_eq!(result.name_affinity, 0.0);
            assert!(result.final_score < scorer.config().confidence_floor);
        }
    }

    #[test]
    fn test_structure_alone_stays_below_floor() {
        let doc = Document::parse("<body><section><p>Lorem ipsum dolor</p></section></body>").unwrap();
        let candidate = &collect_candidates(&doc)[0];
        let hint = MatchHint::new("checkout").with_text("cart total payment");

        let scorer = BaselineScorer::default();
        let result = scorer.score(candidate, &wide_white(), &hint);
        assert!(result.final_score < scorer.config().confidence_floor);
    }

    #[test]
    fn test_text_words_ignore_name() {
        let hint = MatchHint::new("site-footer").with_text("About us");
        assert_eq!(hint.text_words(), set(&["about", "us"]));
        assert!(MatchHint::new("footer").text_words().is_empty());
    }

    #[test]
    fn test_extend_text() {
        let mut hint = MatchHint::new("hero");
        hint.extend_text("Welcome");
        hint.extend_text("  ");
        hint.extend_text("aboard");
        assert_eq!(hint.text.as_deref(), Some("Welcome aboard"));
    }
}
