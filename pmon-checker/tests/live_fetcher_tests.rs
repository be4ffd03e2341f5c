//! Live fetcher against a local HTTP server

mod helpers;

use axum::{http::StatusCode, response::Html, routing::get, Router};
use std::time::Duration;

use pmon_checker::services::{IngredientFetcher, LiveFetcher};

const RECIPE_PAGE: &str = r#"
<html><body>
  <h1>Pancakes</h1>
  <ul>
    <li data-ingredient>  1 1/2 cups flour </li>
    <li data-ingredient>2 eggs</li>
    <li>Serving suggestion</li>
    <li data-ingredient>1 cup milk</li>
  </ul>
</body></html>
"#;

fn fetcher() -> LiveFetcher {
    LiveFetcher::new("pmon-test", Duration::from_secs(5), "[data-ingredient]")
        .expect("Failed to build fetcher")
}

async fn recipe_server() -> String {
    let app = Router::new()
        .route("/recipe", get(|| async { Html(RECIPE_PAGE) }))
        .route("/plain", get(|| async { Html("<html><body><p>No list</p></body></html>") }))
        .route("/gone", get(|| async { (StatusCode::NOT_FOUND, "gone") }));

    let addr = helpers::spawn_server(app).await;
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_extracts_marked_lines_in_order() {
    let base = recipe_server().await;

    let lines = fetcher()
        .fetch_ingredients(&format!("{}/recipe", base))
        .await
        .expect("Expected ingredients");

    assert_eq!(lines, vec!["1 1/2 cups flour", "2 eggs", "1 cup milk"]);
}

#[tokio::test]
async fn test_non_success_status_is_unavailable() {
    let base = recipe_server().await;
    assert!(fetcher()
        .fetch_ingredients(&format!("{}/gone", base))
        .await
        .is_none());
}

#[tokio::test]
async fn test_page_without_markers_is_unavailable() {
    let base = recipe_server().await;
    assert!(fetcher()
        .fetch_ingredients(&format!("{}/plain", base))
        .await
        .is_none());
}

#[tokio::test]
async fn test_unreachable_host_is_unavailable() {
    // Bind and drop to get a port with nothing listening
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    assert!(fetcher()
        .fetch_ingredients(&format!("http://{}/recipe", addr))
        .await
        .is_none());
}

#[test]
fn test_invalid_selector_rejected() {
    assert!(LiveFetcher::new("pmon-test", Duration::from_secs(5), "[[").is_err());
}
