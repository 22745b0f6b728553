use chrono::{TimeZone, Utc};
use criterion::{criterion_group, criterion_main, Criterion};

use famarchive::model::{ArchiveItem, Category, ItemType};
use famarchive::search::{filter_and_search, ItemFilters, OwnerFilter};
use famarchive::sync::merge_visible;

fn synthetic_items(owner: &str, count: usize, offset: usize) -> Vec<ArchiveItem> {
    (0..count)
        .map(|i| {
            let n = i + offset;
            ArchiveItem {
                id: format!("item-{n}"),
                owner_id: owner.to_string(),
                owner_email: format!("{owner}@example.com"),
                title: format!("Heirloom number {n}"),
                item_type: ItemType::ALL[n % ItemType::ALL.len()],
                category: Category::ALL[n % Category::ALL.len()],
                description: format!("<p>Kept in <b>box {}</b> since 19{:02}</p>", n % 40, n % 100),
                transcription: String::new(),
                related_date: format!("19{:02}", n % 100),
                physical_location: format!("Shelf {}", n % 12),
                shared_with: vec!["viewer@example.com".into()],
                files: vec![],
                created_at: Utc.timestamp_millis_opt(1_600_000_000_000 + n as i64 * 1_000).single(),
                updated_at: None,
            }
        })
        .collect()
}

fn bench_merge(c: &mut Criterion) {
    let owned = synthetic_items("viewer", 2_000, 0);
    // Half of the shared set overlaps the owned set.
    let shared = synthetic_items("cousin", 2_000, 1_000);

    c.bench_function("merge_visible_4k", |b| {
        b.iter(|| merge_visible(owned.clone(), shared.clone()))
    });
}

fn bench_filter(c: &mut Criterion) {
    let items = merge_visible(
        synthetic_items("viewer", 2_000, 0),
        synthetic_items("cousin", 2_000, 2_000),
    );
    let filters = ItemFilters {
        owner: OwnerFilter::Shared,
        category: Some(Category::FamilyHistory),
        ..Default::default()
    };

    c.bench_function("search_html_descriptions", |b| {
        b.iter(|| filter_and_search(&items, "box 7", &ItemFilters::default()))
    });
    c.bench_function("filter_shared_family_history", |b| {
        b.iter(|| filter_and_search(&items, "", &filters))
    });
}

criterion_group!(benches, bench_merge, bench_filter);
criterion_main!(benches);
