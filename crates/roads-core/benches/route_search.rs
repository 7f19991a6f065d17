use criterion::{Criterion, criterion_group, criterion_main};
use roads_core::RoadMap;
use roads_core::engine::{SearchRequest, shortest_path};
use roads_core::index::Treap;
use std::hint::black_box;

fn city(row: usize, col: usize) -> String {
    format!("c{}_{}", row, col)
}

/// Square grid of cities with mixed lengths and dates.
fn build_grid(side: usize) -> RoadMap {
    let mut map = RoadMap::new();
    for row in 0..side {
        for col in 0..side {
            let length = 1 + ((row * 7 + col * 13) % 5) as u32;
            let date = 1950 + ((row * 31 + col * 17) % 70) as i32;
            if col + 1 < side {
                map.add_road(&city(row, col), &city(row, col + 1), length, date)
                    .unwrap();
            }
            if row + 1 < side {
                map.add_road(&city(row, col), &city(row + 1, col), length + 1, date + 1)
                    .unwrap();
            }
        }
    }
    map
}

fn bench_search_grid_30(c: &mut Criterion) {
    let map = build_grid(30);
    let graph = map.graph();
    let from = graph.city_id(&city(0, 0)).unwrap();
    let to = graph.city_id(&city(29, 29)).unwrap();
    let request = SearchRequest::new(from, to);

    c.bench_function("shortest_path_grid_30x30", |b| {
        b.iter(|| shortest_path(black_box(graph), black_box(&request)).unwrap())
    });
}

fn bench_build_grid_30(c: &mut Criterion) {
    c.bench_function("build_grid_30x30", |b| b.iter(|| build_grid(black_box(30))));
}

fn bench_treap_insert_remove(c: &mut Criterion) {
    c.bench_function("treap_insert_remove_10k", |b| {
        b.iter(|| {
            let mut index: Treap<u64, u64> = Treap::seeded(7);
            for key in 0..10_000u64 {
                index.insert(key.wrapping_mul(0x9E37_79B9_7F4A_7C15), key);
            }
            while index.pop_first().is_some() {}
            black_box(index.len())
        })
    });
}

criterion_group!(
    benches,
    bench_search_grid_30,
    bench_build_grid_30,
    bench_treap_insert_remove,
);
criterion_main!(benches);
