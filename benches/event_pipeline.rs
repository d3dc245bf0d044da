use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fake::faker::lorem::en::{Sentence, Words};
use fake::Fake;
use ticket_shop::models::{Event, EventSummary, EVENT_CATEGORIES};
use ticket_shop::services::event_filter::{filter_and_sort, EventFilter, SortKey};

fn catalogue(size: usize) -> Vec<EventSummary> {
    let now = Utc::now();
    (0..size)
        .map(|i| {
            let words: Vec<String> = Words(2..5).fake();
            EventSummary {
                event: Event {
                    id: i as i64,
                    title: words.join(" "),
                    date: now + Duration::hours((-500..2000).fake::<i64>()),
                    description: Some(Sentence(5..15).fake()),
                    price: Some((0.0..250.0).fake()),
                    available_tickets: (0..300).fake(),
                    category: Some(EVENT_CATEGORIES[i % EVENT_CATEGORIES.len()].to_string()),
                    image_url: None,
                    created_by_user_id: None,
                },
                average_rating: (0.0..5.0).fake(),
                total_ratings: (0..80).fake(),
            }
        })
        .collect()
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_and_sort");
    for size in [100usize, 1_000, 10_000] {
        let events = catalogue(size);
        for sort in [SortKey::Date, SortKey::Rating] {
            let filter = EventFilter {
                search: Some("et".to_string()),
                sort,
                ..EventFilter::default()
            };
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", sort), size),
                &events,
                |b, events| b.iter(|| filter_and_sort(black_box(events), &filter, Utc::now())),
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
