//! Accuracy runs against a snapshot source and a scripted fetcher

mod helpers;

use chrono::{Duration, TimeZone, Utc};
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use helpers::FakeFetcher;
use pmon_checker::services::{
    AccuracyChecker, AccuracyRunOutcome, PacingPolicy, RecipeSource, Sampler, SnapshotSource,
};
use pmon_common::db::parsers;

const PARSER: &str = "allrecipes";

fn recipe(url: Option<&str>, names: &[&str]) -> Value {
    let added = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    helpers::recipe_json(url, added, names)
}

fn checker(
    pool: &SqlitePool,
    dir: &tempfile::TempDir,
    recipes: &[Value],
    fetcher: Arc<FakeFetcher>,
) -> AccuracyChecker {
    paced_checker(pool, dir, recipes, fetcher, PacingPolicy::none())
}

fn paced_checker(
    pool: &SqlitePool,
    dir: &tempfile::TempDir,
    recipes: &[Value],
    fetcher: Arc<FakeFetcher>,
    pacing: PacingPolicy,
) -> AccuracyChecker {
    let path = helpers::write_snapshot(dir.path(), recipes);
    let source: Arc<dyn RecipeSource> = Arc::new(SnapshotSource::new(path));
    AccuracyChecker::new(pool.clone(), Sampler::new(source), fetcher).with_pacing(pacing)
}

#[tokio::test]
async fn test_mean_of_item_scores_is_written() {
    let pool = helpers::test_pool().await;
    helpers::seed_parser(&pool, PARSER, 100.0, 0).await;
    let dir = tempfile::tempdir().unwrap();

    let recipes = vec![
        recipe(Some("https://recipes.example/80"), &["abcdefghij"]),
        recipe(Some("https://recipes.example/90"), &["abcdefghij"]),
        recipe(Some("https://recipes.example/100"), &["abcdefghij"]),
    ];
    let fetcher = Arc::new(
        FakeFetcher::new()
            .with_page("https://recipes.example/80", &["abcdefghxx"])
            .with_page("https://recipes.example/90", &["abcdefghix"])
            .with_page("https://recipes.example/100", &["ABCDEFGHIJ"]),
    );

    let outcome = checker(&pool, &dir, &recipes, fetcher.clone())
        .check_parser_accuracy(PARSER)
        .await;

    let AccuracyRunOutcome::Updated(summary) = outcome else {
        panic!("Expected an update, got {:?}", outcome);
    };
    assert_eq!(summary.sampled, 3);
    assert_eq!(summary.compared, 3);
    assert!((summary.accuracy_score - 90.0).abs() < 1e-9);

    let stored = parsers::find_by_name(&pool, PARSER).await.unwrap().unwrap();
    assert!((stored.accuracy_score - 90.0).abs() < 1e-9);
    assert_eq!(stored.last_run_recipes, 3);
    assert!(stored.avg_parse_time >= 0.0);

    let last_run = stored.last_run.expect("last_run set");
    assert_eq!(last_run, summary.finished_at);
    assert_eq!(stored.next_run, Some(last_run + Duration::days(7)));

    assert_eq!(fetcher.calls().len(), 3);
}

#[tokio::test]
async fn test_recipes_without_urls_leave_record_unchanged() {
    let pool = helpers::test_pool().await;
    let before = helpers::seed_parser(&pool, PARSER, 87.5, 12).await;
    let dir = tempfile::tempdir().unwrap();

    let recipes = vec![
        recipe(None, &["flour"]),
        recipe(Some("   "), &["sugar"]),
    ];
    let fetcher = Arc::new(FakeFetcher::new());

    let outcome = checker(&pool, &dir, &recipes, fetcher.clone())
        .check_parser_accuracy(PARSER)
        .await;

    assert_eq!(
        outcome,
        AccuracyRunOutcome::NoComparableItems {
            parser: PARSER.to_string(),
            sampled: 2,
        }
    );
    assert!(fetcher.calls().is_empty());

    let after = parsers::find_by_name(&pool, PARSER).await.unwrap().unwrap();
    assert_eq!(after, before);
}

#[tokio::test]
async fn test_unavailable_pages_are_skipped() {
    let pool = helpers::test_pool().await;
    helpers::seed_parser(&pool, PARSER, 100.0, 0).await;
    let dir = tempfile::tempdir().unwrap();

    let recipes = vec![
        recipe(Some("https://recipes.example/ok"), &["abcdefghij"]),
        recipe(Some("https://recipes.example/down"), &["abcdefghij"]),
    ];
    let fetcher = Arc::new(
        FakeFetcher::new().with_page("https://recipes.example/ok", &["abcdefghxx"]),
    );

    let outcome = checker(&pool, &dir, &recipes, fetcher.clone())
        .check_parser_accuracy(PARSER)
        .await;

    let AccuracyRunOutcome::Updated(summary) = outcome else {
        panic!("Expected an update, got {:?}", outcome);
    };
    assert_eq!(summary.compared, 1);
    assert!((summary.accuracy_score - 80.0).abs() < 1e-9);
    assert_eq!(fetcher.calls().len(), 2);
}

#[tokio::test]
async fn test_recipe_without_parsed_ingredients_excluded() {
    let pool = helpers::test_pool().await;
    helpers::seed_parser(&pool, PARSER, 100.0, 0).await;
    let dir = tempfile::tempdir().unwrap();

    let recipes = vec![
        recipe(Some("https://recipes.example/full"), &["abcdefghij"]),
        recipe(Some("https://recipes.example/empty"), &[]),
    ];
    let fetcher = Arc::new(
        FakeFetcher::new()
            .with_page("https://recipes.example/full", &["abcdefghij"])
            .with_page("https://recipes.example/empty", &["1 cup milk"]),
    );

    let outcome = checker(&pool, &dir, &recipes, fetcher)
        .check_parser_accuracy(PARSER)
        .await;

    let AccuracyRunOutcome::Updated(summary) = outcome else {
        panic!("Expected an update, got {:?}", outcome);
    };
    assert_eq!(summary.compared, 1);
    assert!((summary.accuracy_score - 100.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_unknown_parser_does_nothing() {
    let pool = helpers::test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(FakeFetcher::new());

    let outcome = checker(
        &pool,
        &dir,
        &[recipe(Some("https://recipes.example/1"), &["salt"])],
        fetcher.clone(),
    )
    .check_parser_accuracy("nonexistent")
    .await;

    assert_eq!(
        outcome,
        AccuracyRunOutcome::ParserNotFound {
            parser: "nonexistent".to_string()
        }
    );
    assert!(fetcher.calls().is_empty());
    assert!(parsers::list_parsers(&pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_pool_is_nothing_to_check() {
    let pool = helpers::test_pool().await;
    let before = helpers::seed_parser(&pool, PARSER, 95.0, 3).await;
    let dir = tempfile::tempdir().unwrap();

    let outcome = checker(&pool, &dir, &[], Arc::new(FakeFetcher::new()))
        .check_parser_accuracy(PARSER)
        .await;

    assert_eq!(
        outcome,
        AccuracyRunOutcome::NothingToCheck {
            parser: PARSER.to_string()
        }
    );
    assert_eq!(parsers::find_by_name(&pool, PARSER).await.unwrap().unwrap(), before);
}

#[tokio::test]
async fn test_unreadable_source_is_nothing_to_check() {
    let pool = helpers::test_pool().await;
    helpers::seed_parser(&pool, PARSER, 95.0, 3).await;
    let dir = tempfile::tempdir().unwrap();

    let source: Arc<dyn RecipeSource> = Arc::new(SnapshotSource::new(dir.path().join("absent.json")));
    let checker = AccuracyChecker::new(pool.clone(), Sampler::new(source), Arc::new(FakeFetcher::new()))
        .with_pacing(PacingPolicy::none());

    assert!(matches!(
        checker.check_parser_accuracy(PARSER).await,
        AccuracyRunOutcome::NothingToCheck { .. }
    ));
}

#[tokio::test]
async fn test_store_failure_is_reported_not_raised() {
    let pool = helpers::test_pool().await;
    let dir = tempfile::tempdir().unwrap();
    let checker = checker(&pool, &dir, &[], Arc::new(FakeFetcher::new()));

    pool.close().await;

    assert!(matches!(
        checker.check_parser_accuracy(PARSER).await,
        AccuracyRunOutcome::Failed { .. }
    ));
}

#[tokio::test]
async fn test_sample_capped_at_five() {
    let pool = helpers::test_pool().await;
    helpers::seed_parser(&pool, PARSER, 100.0, 0).await;
    let dir = tempfile::tempdir().unwrap();

    let urls: Vec<String> = (0..12).map(|i| format!("https://recipes.example/{}", i)).collect();
    let recipes: Vec<Value> = urls.iter().map(|u| recipe(Some(u), &["salt"])).collect();
    let fetcher = urls
        .iter()
        .fold(FakeFetcher::new(), |f, u| f.with_page(u, &["salt"]));
    let fetcher = Arc::new(fetcher);

    let outcome = checker(&pool, &dir, &recipes, fetcher.clone())
        .check_parser_accuracy(PARSER)
        .await;

    let AccuracyRunOutcome::Updated(summary) = outcome else {
        panic!("Expected an update, got {:?}", outcome);
    };
    assert_eq!(summary.sampled, 5);
    assert_eq!(fetcher.calls().len(), 5);
}

#[tokio::test]
async fn test_pause_follows_every_fetch_even_when_it_fails() {
    let pool = helpers::test_pool().await;
    helpers::seed_parser(&pool, PARSER, 100.0, 0).await;
    let dir = tempfile::tempdir().unwrap();

    // Neither page is scripted, so both fetches come back empty
    let recipes = vec![
        recipe(Some("https://recipes.example/down/1"), &["salt"]),
        recipe(Some("https://recipes.example/down/2"), &["salt"]),
    ];
    let fetcher = Arc::new(FakeFetcher::new());
    let delay = StdDuration::from_millis(200);

    let started = Instant::now();
    let outcome = paced_checker(&pool, &dir, &recipes, fetcher.clone(), PacingPolicy::new(delay))
        .check_parser_accuracy(PARSER)
        .await;
    let elapsed = started.elapsed();

    assert!(matches!(outcome, AccuracyRunOutcome::NoComparableItems { sampled: 2, .. }));
    assert_eq!(fetcher.calls().len(), 2);
    assert!(elapsed >= delay * 2, "Expected two pauses, run took {:?}", elapsed);
}

#[tokio::test]
async fn test_no_pause_for_recipes_without_urls() {
    let pool = helpers::test_pool().await;
    helpers::seed_parser(&pool, PARSER, 100.0, 0).await;
    let dir = tempfile::tempdir().unwrap();

    let recipes = vec![
        recipe(None, &["flour"]),
        recipe(Some(" "), &["sugar"]),
        recipe(Some("https://recipes.example/1"), &["salt"]),
    ];
    let fetcher = Arc::new(FakeFetcher::new().with_page("https://recipes.example/1", &["salt"]));
    let delay = StdDuration::from_millis(400);

    let started = Instant::now();
    let outcome = paced_checker(&pool, &dir, &recipes, fetcher.clone(), PacingPolicy::new(delay))
        .check_parser_accuracy(PARSER)
        .await;
    let elapsed = started.elapsed();

    assert!(matches!(outcome, AccuracyRunOutcome::Updated(_)));
    assert_eq!(fetcher.calls().len(), 1);
    assert!(elapsed >= delay, "Expected one pause, run took {:?}", elapsed);
    assert!(elapsed < delay * 2, "URL-less recipes were paced, run took {:?}", elapsed);
}
