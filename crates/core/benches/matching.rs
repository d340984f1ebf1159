use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, Rgb, RgbImage};
use splice_core::{BaselineScorer, CandidateScorer, Document, MatchHint, Screenshot, SectionMatcher, collect_candidates};

fn screenshot() -> Screenshot {
    let img = DynamicImage::ImageRgb8(RgbImage::from_fn(1200, 500, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128])));
    let mut buf = Vec::new();
    img.write_with_encoder(image::codecs::png::PngEncoder::new(&mut buf)).unwrap();
    Screenshot::from_bytes(buf).unwrap()
}

fn large_page(sections: usize) -> String {
    let mut body = String::from("<header class='site-header'><nav><a href='/'>Home</a></nav></header>");
    for i in 0..sections {
        body.push_str(&format!(
            "<section class='block-{i}'><h2>Heading {i}</h2><p>Paragraph about topic {i} with several words.</p></section>"
        ));
    }
    body.push_str("<footer><p>Copyright</p></footer>");
    format!("<html><body><div id='app'>{body}</div></body></html>")
}

fn bench_collect_candidates(c: &mut Criterion) {
    let fixture = std::fs::read_to_string("../../tests/fixtures/sites/acme_example/index.html").unwrap();
    let large = large_page(200);

    let mut group = c.benchmark_group("collect_candidates");

    group.bench_with_input(BenchmarkId::new("fixture", "4 blocks"), &fixture, |b, html| {
        let doc = Document::parse(html).unwrap();
        b.iter(|| collect_candidates(black_box(&doc)))
    });

    group.bench_with_input(BenchmarkId::new("generated", "200 blocks"), &large, |b, html| {
        let doc = Document::parse(html).unwrap();
        b.iter(|| collect_candidates(black_box(&doc)))
    });

    group.finish();
}

fn bench_baseline_scoring(c: &mut Criterion) {
    let doc = Document::parse(&large_page(200)).unwrap();
    let candidates = collect_candidates(&doc);
    let shot = screenshot();
    let hint = MatchHint::new("block").with_text("Heading 150 paragraph about topic");
    let scorer = BaselineScorer::default();

    c.bench_function("baseline_scoring", |b| {
        b.iter(|| {
            candidates
                .iter()
                .map(|c| scorer.score(black_box(c), shot.features(), &hint).final_score)
                .fold(0.0, f64::max)
        })
    });
}

fn bench_match_document(c: &mut Criterion) {
    let html = std::fs::read_to_string("../../tests/fixtures/sites/acme_example/index.html").unwrap();
    let doc = Document::parse(&html).unwrap();
    let shot = screenshot();
    let hint = MatchHint::new("hero").with_text("Rockets for every backyard");
    let matcher = SectionMatcher::default();

    c.bench_function("match_document", |b| {
        b.iter(|| matcher.match_document(black_box(&doc), &shot, &hint, None))
    });
}

fn bench_screenshot_features(c: &mut Criterion) {
    let shot = screenshot();
    let bytes = shot.bytes().to_vec();

    c.bench_function("screenshot_decode_and_features", |b| {
        b.iter(|| Screenshot::from_bytes(black_box(bytes.clone())))
    });
}

criterion_group!(
    benches,
    bench_collect_candidates,
    bench_baseline_scoring,
    bench_match_document,
    bench_screenshot_features
);
criterion_main!(benches);
