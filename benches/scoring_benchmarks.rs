//! Scoring Benchmarks
//!
//! Recommendation latency as the candidate set grows, both for the pure
//! scorer and for the full service path (candidates, snapshots, cache).

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use recipe_engine::clock::{Clock, ManualClock};
use recipe_engine::personalization::{
    BehaviorAction, BehaviorEvent, CancelSignal, Difficulty, FactorWeights, InMemoryCatalog,
    Mood, NoopSink, PersonalizationService, RecipeAttributes, RecommendationQuery,
    RecommendationScorer, ScoringContext, SeasonalContext, ServiceConfig,
};

const CUISINES: [&str; 6] = ["italian", "thai", "mexican", "indian", "japanese", "french"];
const INGREDIENTS: [&str; 8] = [
    "tomatoes", "basil", "corn", "lime", "rice", "citrus", "kale", "chicken",
];
const TAGS: [&str; 6] = ["quick", "comfort", "spicy", "light", "vegan", "rich"];

fn catalog(n: usize) -> Vec<RecipeAttributes> {
    (0..n)
        .map(|i| {
            let difficulty = match i % 3 {
                0 => Difficulty::Easy,
                1 => Difficulty::Medium,
                _ => Difficulty::Hard,
            };
            RecipeAttributes::new(format!("recipe-{i}"), CUISINES[i % CUISINES.len()])
                .with_ingredients([INGREDIENTS[i % 8], INGREDIENTS[(i * 3 + 1) % 8]])
                .with_tags([TAGS[i % TAGS.len()]])
                .with_difficulty(difficulty)
        })
        .collect()
}

/// Service with `n` recipes and a user with some history
fn warmed_service(n: usize) -> PersonalizationService {
    let clock = Arc::new(ManualClock::at_epoch());
    let recipes = catalog(n);
    let service = PersonalizationService::new(
        ServiceConfig::default(),
        Arc::new(InMemoryCatalog::from_recipes(recipes.clone())),
        Arc::new(NoopSink),
        clock.clone(),
    );
    for (i, recipe) in recipes.iter().take(25).enumerate() {
        let action = if i % 4 == 0 {
            BehaviorAction::Favorited
        } else {
            BehaviorAction::Viewed
        };
        service.record_behavior(BehaviorEvent::new("bench-user", action, recipe.clone(), clock.now()));
    }
    service
}

// ==============================================================================
// Pure scorer
// ==============================================================================

fn bench_scorer(c: &mut Criterion) {
    let mut group = c.benchmark_group("score_candidates");
    let scorer = RecommendationScorer::new(FactorWeights::default());
    let seasonal = SeasonalContext::new(7).expect("valid month");

    for n in [10usize, 100, 1_000, 5_000] {
        let service = warmed_service(n);
        let candidates = catalog(n);
        let profile = service.profile("bench-user");
        let ids: Vec<&str> = candidates.iter().map(|c| c.recipe_id.as_str()).collect();
        let trending = service.trending_aggregator().snapshot(&ids[..]);
        let ctx = ScoringContext {
            profile: &profile,
            trending: &trending,
            seasonal: &seasonal,
            mood: Some(Mood::Comfort),
        };

        group.bench_with_input(BenchmarkId::from_parameter(n), &candidates, |b, candidates| {
            b.iter(|| {
                scorer
                    .score(&ctx, candidates, &CancelSignal::none())
                    .expect("not cancelled")
            })
        });
    }

    group.finish();
}

// ==============================================================================
// Service path
// ==============================================================================

fn bench_service(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_recommendations");

    for n in [100usize, 1_000] {
        let service = warmed_service(n);
        let query = RecommendationQuery::new("bench-user").with_mood(Some(Mood::Quick));

        group.bench_with_input(BenchmarkId::new("cold", n), &query, |b, query| {
            b.iter(|| {
                service.invalidate_recommendations(Some("bench-user"));
                service
                    .get_recommendations(query, &CancelSignal::none())
                    .expect("recommendations")
            })
        });

        group.bench_with_input(BenchmarkId::new("cached", n), &query, |b, query| {
            b.iter(|| {
                service
                    .get_recommendations(query, &CancelSignal::none())
                    .expect("recommendations")
            })
        });
    }

    group.bench_function("record_behavior", |b| {
        let service = warmed_service(100);
        let recipe = catalog(1).remove(0);
        b.iter(|| {
            service.record_behavior(BehaviorEvent::new(
                "bench-user",
                BehaviorAction::Saved,
                recipe.clone(),
                recipe_engine::chrono::Utc::now(),
            ))
        })
    });

    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .sample_size(50)
        .measurement_time(std::time::Duration::from_secs(5));
    targets =
        bench_scorer,
        bench_service
);

criterion_main!(benches);
