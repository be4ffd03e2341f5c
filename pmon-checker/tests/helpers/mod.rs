//! Shared test helpers for pmon-checker integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use pmon_checker::services::IngredientFetcher;
use pmon_common::db::init_in_memory_database;
use pmon_common::db::models::ParserStats;
use pmon_common::db::parsers;

/// In-memory database with the full schema
pub async fn test_pool() -> SqlitePool {
    init_in_memory_database()
        .await
        .expect("Failed to create in-memory database")
}

/// Provision a parser and overwrite its accuracy and counters
pub async fn seed_parser(
    pool: &SqlitePool,
    name: &str,
    accuracy: f64,
    total_recipes: i64,
) -> ParserStats {
    let (parser, _) = parsers::provision_parser(pool, name, "1.0.0", Utc::now(), Duration::days(7))
        .await
        .expect("Failed to provision parser");

    sqlx::query("UPDATE parsers SET accuracy_score = ?, total_recipes = ? WHERE id = ?")
        .bind(accuracy)
        .bind(total_recipes)
        .bind(parser.id)
        .execute(pool)
        .await
        .expect("Failed to seed parser");

    parsers::find_by_name(pool, name)
        .await
        .expect("Failed to reload parser")
        .expect("Parser missing after seeding")
}

/// Serve `app` on an ephemeral local port
pub async fn spawn_server(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("No local address");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server failed");
    });

    addr
}

/// Stored recipe JSON with one ingredient per name (name-only lines)
pub fn recipe_json(url: Option<&str>, date_added: DateTime<Utc>, names: &[&str]) -> Value {
    let ingredients: Vec<Value> = names.iter().map(|n| json!({ "name": n })).collect();
    json!({
        "url": url,
        "ingredients": ingredients,
        "dateAdded": date_added.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    })
}

/// Write a snapshot file holding `recipes`
pub fn write_snapshot(dir: &Path, recipes: &[Value]) -> PathBuf {
    let path = dir.join("recent_recipes.json");
    std::fs::write(&path, serde_json::to_string(recipes).expect("Serialize snapshot"))
        .expect("Failed to write snapshot");
    path
}

/// Fetcher answering from a fixed URL map; unknown URLs are unavailable
#[derive(Default)]
pub struct FakeFetcher {
    pages: HashMap<String, Vec<String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, lines: &[&str]) -> Self {
        self.pages
            .insert(url.to_string(), lines.iter().map(|l| l.to_string()).collect());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IngredientFetcher for FakeFetcher {
    async fn fetch_ingredients(&self, url: &str) -> Option<Vec<String>> {
        self.calls.lock().unwrap().push(url.to_string());
        self.pages.get(url).cloned()
    }
}
