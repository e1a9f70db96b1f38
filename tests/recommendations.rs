//! Integration tests for the recommendation waterfall and similar books.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;

use common::{interaction, memory_context, review, test_embedding_service, BookBuilder};
use shelfmark::config::{DiscoveryConfig, RecommendConfig};
use shelfmark::init::AppContext;
use shelfmark::models::{Interaction, InteractionHistory, InteractionKind, ItemStats, Patron};
use shelfmark::repository::{CatalogStore, InMemoryCatalogStore};
use shelfmark::services::{compose, Stage};
use shelfmark::ShelfmarkError;

const PATRON: i64 = 1;

async fn add_patron(store: &InMemoryCatalogStore, patron_id: i64) {
    store
        .upsert_patron(Patron {
            patron_id,
            name: Some(format!("Patron {}", patron_id)),
        })
        .await
        .unwrap();
}

/// Borrows of `book_id` by `count` distinct patrons numbered from `first`.
async fn borrows(store: &InMemoryCatalogStore, book_id: i64, first: i64, count: i64) {
    for patron_id in first..first + count {
        store
            .record_interaction(interaction(patron_id, book_id, patron_id))
            .await
            .unwrap();
    }
}

/// Fiction A (10 borrows, 4.5), Fiction B (2 borrows, 3.0) and
/// Science C (50 borrows, 4.9); the patron has read A.
async fn three_book_catalog() -> Arc<InMemoryCatalogStore> {
    let store = Arc::new(InMemoryCatalogStore::new());
    store
        .upsert_book(BookBuilder::new(1, "A").genre("Fiction").build())
        .await
        .unwrap();
    store
        .upsert_book(BookBuilder::new(2, "B").genre("Fiction").build())
        .await
        .unwrap();
    store
        .upsert_book(BookBuilder::new(3, "C").genre("Science").build())
        .await
        .unwrap();
    add_patron(&store, PATRON).await;

    borrows(&store, 1, PATRON, 10).await;
    borrows(&store, 2, 100, 2).await;
    borrows(&store, 3, 200, 50).await;

    store.add_review(review(1, 100, 4.5)).await.unwrap();
    store.add_review(review(2, 100, 3.0)).await.unwrap();
    store.add_review(review(3, 200, 4.9)).await.unwrap();
    store
}

fn context(store: Arc<InMemoryCatalogStore>) -> AppContext {
    memory_context(store, test_embedding_service(), DiscoveryConfig::default())
}

#[tokio::test]
async fn test_affinity_pick_precedes_more_popular_book() {
    let ctx = context(three_book_catalog().await);

    let picks = ctx.recommendations.recommend(PATRON, Some(2)).await.unwrap();
    let got: Vec<(i64, Stage)> = picks.iter().map(|r| (r.book.book_id, r.stage)).collect();

    assert_eq!(got, vec![(2, Stage::Affinity), (3, Stage::Popular)]);
    assert_eq!(picks[0].book.review_count, 1);
}

#[tokio::test]
async fn test_history_is_never_recommended() {
    let ctx = context(three_book_catalog().await);

    let picks = ctx.recommendations.recommend(PATRON, Some(10)).await.unwrap();
    let ids: Vec<i64> = picks.iter().map(|r| r.book.book_id).collect();

    assert!(!ids.contains(&1));
    assert_eq!(ids.len(), 2);
}

#[tokio::test]
async fn test_patron_without_history_gets_popular_first() {
    let store = three_book_catalog().await;
    add_patron(&store, 999).await;
    let ctx = context(store);

    let picks = ctx.recommendations.recommend(999, Some(3)).await.unwrap();
    let got: Vec<(i64, Stage)> = picks.iter().map(|r| (r.book.book_id, r.stage)).collect();

    assert_eq!(
        got,
        vec![(3, Stage::Popular), (1, Stage::Popular), (2, Stage::Popular)]
    );
}

#[tokio::test]
async fn test_unknown_patron_gets_nothing() {
    let ctx = context(three_book_catalog().await);

    let picks = ctx.recommendations.recommend(424242, None).await.unwrap();
    assert!(picks.is_empty());
}

#[tokio::test]
async fn test_zero_limit_is_rejected() {
    let ctx = context(three_book_catalog().await);

    let err = ctx.recommendations.recommend(PATRON, Some(0)).await.unwrap_err();
    assert!(matches!(err, ShelfmarkError::Validation(_)));
}

#[tokio::test]
async fn test_unavailable_books_are_skipped() {
    let store = three_book_catalog().await;
    store
        .upsert_book(
            BookBuilder::new(3, "C")
                .genre("Science")
                .copies(0, 2)
                .build(),
        )
        .await
        .unwrap();
    let ctx = context(store);

    let picks = ctx.recommendations.recommend(PATRON, Some(5)).await.unwrap();
    let ids: Vec<i64> = picks.iter().map(|r| r.book.book_id).collect();

    assert_eq!(ids, vec![2]);
}

#[tokio::test]
async fn test_similar_books_by_tier() {
    let store = Arc::new(InMemoryCatalogStore::new());
    let books = vec![
        BookBuilder::new(1, "Target")
            .genre("Fantasy")
            .sub_genre("Epic")
            .author("Robin Hobb")
            .build(),
        BookBuilder::new(2, "Same Genre").genre("Fantasy").build(),
        BookBuilder::new(3, "Same Both")
            .genre("Fantasy")
            .sub_genre("Epic")
            .build(),
        BookBuilder::new(4, "Same Author")
            .genre("Essay")
            .author("Robin Hobb")
            .build(),
        BookBuilder::new(5, "Unrelated").genre("Cooking").build(),
        BookBuilder::new(6, "Withdrawn")
            .genre("Fantasy")
            .inactive()
            .build(),
    ];
    for book in books {
        store.upsert_book(book).await.unwrap();
    }
    let ctx = context(store);

    let similar = ctx.similar.similar(1, 10).await.unwrap();
    let got: Vec<(i64, u8)> = similar.iter().map(|s| (s.book.book_id, s.tier)).collect();
    assert_eq!(got, vec![(3, 1), (2, 2), (4, 3)]);

    assert!(ctx.similar.similar(77, 10).await.unwrap().is_empty());
    assert_eq!(ctx.similar.similar(1, 1).await.unwrap().len(), 1);
}

fn stage_rank(stage: Stage) -> u8 {
    match stage {
        Stage::Affinity => 0,
        Stage::Popular => 1,
        Stage::TopRated => 2,
    }
}

fn arb_items() -> impl Strategy<Value = Vec<ItemStats>> {
    prop::collection::vec(
        (
            0..3usize,
            prop::option::of(0..3usize),
            any::<bool>(),
            0..20u32,
            prop::option::of(1.0..5.0f64),
            0..6u32,
        ),
        0..30,
    )
    .prop_map(|rows| {
        let genres = ["Fiction", "Science", "History"];
        let ages = ["A", "B", "C"];
        rows.into_iter()
            .enumerate()
            .map(|(i, (genre, age, available, popularity, rating, reviews))| ItemStats {
                book_id: i as i64 + 1,
                genre: Some(genres[genre].to_string()),
                sub_genre: None,
                age_rating: age.map(|a| ages[a].to_string()),
                authors: Vec::new(),
                is_active: true,
                available_items: u32::from(available),
                popularity,
                avg_rating: rating,
                review_count: reviews,
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_waterfall_invariants(
        items in arb_items(),
        history_ids in prop::collection::vec(1..31i64, 0..8),
        limit in 1..15usize,
    ) {
        let entries: Vec<Interaction> = history_ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let mut row = interaction(PATRON, *id, i as i64);
                row.kind = InteractionKind::Read;
                row.into_interaction().1
            })
            .collect();
        let history = InteractionHistory::new(PATRON, entries);
        let config = RecommendConfig::default();

        let picks = compose(&history, &items, limit, &config);

        prop_assert!(picks.len() <= limit);

        let ids: HashSet<i64> = picks.iter().map(|(id, _)| *id).collect();
        prop_assert_eq!(ids.len(), picks.len(), "duplicate book in {:?}", picks);

        let seen: HashSet<i64> = history_ids.iter().copied().collect();
        prop_assert!(ids.is_disjoint(&seen), "history leaked into {:?}", picks);

        for (id, _) in &picks {
            let item = items.iter().find(|i| i.book_id == *id);
            prop_assert!(item.is_some_and(|i| i.is_available()));
        }

        let affinity = picks.iter().filter(|(_, s)| *s == Stage::Affinity).count();
        prop_assert!(affinity <= limit / 2);
        if history_ids.is_empty() {
            prop_assert_eq!(affinity, 0);
        }

        prop_assert!(picks
            .windows(2)
            .all(|w| stage_rank(w[0].1) <= stage_rank(w[1].1)));

        // Short of `limit` only when the catalog has nothing else to offer.
        let preferred_ages: HashSet<&str> = items
            .iter()
            .filter(|i| seen.contains(&i.book_id))
            .filter_map(|i| i.age_rating.as_deref())
            .collect();
        let eligible = items
            .iter()
            .filter(|i| i.is_available() && !seen.contains(&i.book_id))
            .filter(|i| {
                let age_ok = preferred_ages.is_empty()
                    || i.age_rating.as_deref().is_some_and(|a| preferred_ages.contains(a));
                age_ok || i.review_count >= config.min_review_count
            })
            .count();
        prop_assert_eq!(picks.len(), limit.min(eligible));
    }
}
