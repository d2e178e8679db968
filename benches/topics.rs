use cablebus_rs::KnowledgeBase;
use cablebus_rs::config::ChatConfig;
use cablebus_rs::faq::FaqIndex;
use cablebus_rs::router::{ConversationState, Router};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::sync::Once;

fn ensure_loaded() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        // Parse the embedded knowledge data up front so benches measure lookups only.
        let _ = KnowledgeBase::topic("horarios");
    });
}

fn bench_detect_topics(c: &mut Criterion) {
    ensure_loaded();
    const INPUTS: &[&str] = &[
        "cuanto cuesta",
        "horarios y tarifas",
        "es accesible para silla de ruedas y cuantas personas caben",
        "xyz",
    ];
    for &input in INPUTS {
        c.bench_with_input(BenchmarkId::new("detect_topics", input), &input, |b, &input| {
            b.iter(|| black_box(KnowledgeBase::detect_topics(input)));
        });
    }
}

fn bench_router(c: &mut Criterion) {
    ensure_loaded();
    const TURNS: &[&str] = &["hola", "me llamo Ana", "cuanto cuesta", "si", "adios"];
    c.bench_function("router::five_turn_session", |b| {
        b.iter(|| {
            let mut router = Router::with_rng(ChatConfig::default(), SmallRng::seed_from_u64(7));
            let mut state = ConversationState::new();
            for turn in TURNS {
                black_box(router.respond(&mut state, turn));
            }
        });
    });
}

fn bench_faq_search(c: &mut Criterion) {
    ensure_loaded();
    let index = FaqIndex::from_knowledge();
    for term in ["estaciones", "mxn", "teleférico"] {
        c.bench_with_input(BenchmarkId::new("faq_search", term), &term, |b, &term| {
            b.iter(|| black_box(index.search(term)));
        });
    }
}

criterion_group!(benches, bench_detect_topics, bench_router, bench_faq_search);
criterion_main!(benches);
