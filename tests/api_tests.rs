use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use axum_test::TestServer;
use serde_json::json;

use lexica_api::api::{create_router, AppState};
use lexica_api::error::AppResult;
use lexica_api::models::{Page, UserActivity};
use lexica_api::services::orchestrator::{RecommendationService, Settings};
use lexica_api::stores::memory::MemoryHistory;
use lexica_api::stores::{
    CategoryIndex, EditGraph, EditHistoryProvider, EditorActivity, MoreLikeSearch, UserEdits,
    WikiGraph,
};

// Stub collaborators over a small fixed wiki: the user edited "Fjord", a
// neighbor shares it, the link graph and search index each know two more
// pages, and one category holds everything recommendable.

struct StubEditGraph;

#[async_trait]
impl EditGraph for StubEditGraph {
    async fn editors_of(&self, _lang: &str, title: &str) -> AppResult<Vec<EditorActivity>> {
        if title == "Fjord" {
            Ok(vec![EditorActivity {
                user: "bob".to_string(),
                has_nonminor: true,
                total_edits: 30,
            }])
        } else {
            Ok(vec![])
        }
    }

    async fn edits_of(&self, _lang: &str, user: &str) -> AppResult<UserEdits> {
        if user == "bob" {
            Ok(UserEdits {
                all: vec![
                    "Fjord".to_string(),
                    "Glacier".to_string(),
                    "Moraine".to_string(),
                ],
                nonminor: vec![],
                total: 30,
            })
        } else {
            Ok(UserEdits::default())
        }
    }
}

struct StubWiki;

#[async_trait]
impl WikiGraph for StubWiki {
    async fn resolve_titles(&self, _lang: &str, titles: &[String]) -> AppResult<Vec<Page>> {
        Ok(titles
            .iter()
            .filter(|t| t.as_str() == "Fjord")
            .map(|t| Page {
                id: 1,
                title: t.clone(),
            })
            .collect())
    }

    async fn links_from(&self, _lang: &str, _ids: &[i64]) -> AppResult<Vec<Page>> {
        Ok(vec![
            Page {
                id: 2,
                title: "Aurlandsfjord".to_string(),
            },
            Page {
                id: 3,
                title: "Sognefjord".to_string(),
            },
        ])
    }

    async fn inlink_counts(&self, _lang: &str, _ids: &[i64]) -> AppResult<HashMap<i64, i64>> {
        Ok(HashMap::new())
    }
}

struct StubSearch;

#[async_trait]
impl MoreLikeSearch for StubSearch {
    async fn more_like(&self, _lang: &str, _title: &str, _limit: usize) -> AppResult<Vec<String>> {
        Ok(vec!["Geiranger".to_string(), "Lysefjord".to_string()])
    }
}

struct StubCategories {
    members: HashMap<String, Vec<String>>,
}

impl StubCategories {
    fn new() -> Self {
        let mut members = HashMap::new();
        members.insert(
            "short".to_string(),
            vec![
                "Glacier".to_string(),
                "Moraine".to_string(),
                "Aurlandsfjord".to_string(),
                "Sognefjord".to_string(),
                "Geiranger".to_string(),
                "Lysefjord".to_string(),
                "Hardangervidda".to_string(),
                "Jotunheimen".to_string(),
            ],
        );
        Self { members }
    }
}

#[async_trait]
impl CategoryIndex for StubCategories {
    async fn known(&self, _lang: &str, category: &str) -> AppResult<bool> {
        Ok(self.members.contains_key(category))
    }

    async fn contains(&self, _lang: &str, category: &str, title: &str) -> AppResult<bool> {
        Ok(self
            .members
            .get(category)
            .is_some_and(|m| m.iter().any(|t| t == title)))
    }

    async fn categories_of(&self, _lang: &str, title: &str) -> AppResult<Vec<String>> {
        Ok(self
            .members
            .iter()
            .filter(|(_, titles)| titles.iter().any(|t| t == title))
            .map(|(category, _)| category.clone())
            .collect())
    }

    async fn random_member(
        &self,
        _lang: &str,
        category: &str,
        exclude: &HashSet<String>,
    ) -> AppResult<Option<String>> {
        Ok(self
            .members
            .get(category)
            .and_then(|m| m.iter().find(|t| !exclude.contains(*t)).cloned()))
    }
}

struct StubActivity;

#[async_trait]
impl EditHistoryProvider for StubActivity {
    async fn activity(&self, _lang: &str, _user: &str) -> AppResult<UserActivity> {
        Ok(UserActivity {
            all_edited: vec!["Fjord".to_string()],
            basket: vec!["Fjord".to_string()],
        })
    }
}

fn create_test_server() -> TestServer {
    let service = RecommendationService::new(
        Arc::new(StubEditGraph),
        Arc::new(StubWiki),
        Arc::new(StubCategories::new()),
        Arc::new(StubSearch),
        Arc::new(StubActivity),
        Arc::new(MemoryHistory::new()),
        Settings::default(),
    );
    let app = create_router(AppState::new(Arc::new(service)));
    TestServer::new(app).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_recommendations_fill_requested_slots() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({
            "user": "alice",
            "lang": "en",
            "categories": ["short"],
            "nrecs_per_category": 3
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();

    let status = body["status"].as_str().unwrap();
    assert!(status == "ok" || status == "partial");

    let recs = body["recs"].as_object().unwrap();
    assert_eq!(recs.len(), 3);

    // The basket item is never recommended back
    assert!(!recs.contains_key("Fjord"));

    for (_, entry) in recs {
        assert_eq!(entry["category"], "short");
        let rank = entry["rank"].as_u64().unwrap();
        assert!((1..=3).contains(&rank));
        assert!(entry["source_rank"].as_u64().unwrap() >= 1);
        assert!(entry["categories"]
            .as_array()
            .unwrap()
            .contains(&json!("short")));
    }
}

#[tokio::test]
async fn test_unsupported_language_rejected() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({
            "user": "alice",
            "lang": "tlh",
            "categories": ["short"]
        }))
        .await;

    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_category_rejected() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({
            "user": "alice",
            "categories": ["no-such-category"]
        }))
        .await;

    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("no-such-category"));
}

#[tokio::test]
async fn test_empty_category_list_rejected() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({
            "user": "alice",
            "categories": []
        }))
        .await;

    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_logged_results_are_not_repeated() {
    let server = create_test_server();
    let request = json!({
        "user": "alice",
        "categories": ["short"],
        "nrecs_per_category": 3,
        "log_results": true
    });

    let first = server.post("/api/v1/recommendations").json(&request).await;
    first.assert_status_ok();
    let first_body: serde_json::Value = first.json();
    let first_titles: HashSet<String> = first_body["recs"]
        .as_object()
        .unwrap()
        .keys()
        .cloned()
        .collect();

    let second = server.post("/api/v1/recommendations").json(&request).await;
    second.assert_status_ok();
    let second_body: serde_json::Value = second.json();
    let second_titles: HashSet<String> = second_body["recs"]
        .as_object()
        .unwrap()
        .keys()
        .cloned()
        .collect();

    assert_eq!(first_titles.len(), 3);
    assert_eq!(second_titles.len(), 3);
    assert!(
        first_titles.is_disjoint(&second_titles),
        "recently recommended titles must not repeat: {:?} vs {:?}",
        first_titles,
        second_titles
    );
}

#[tokio::test]
async fn test_coedit_rpc_returns_scored_items() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/recommenders/coedit")
        .json(&json!({
            "user": "alice",
            "basket": ["Fjord"],
            "count": 10,
            "options": { "threshold": 1 }
        }))
        .await;

    response.assert_status_ok();
    let items: Vec<serde_json::Value> = response.json();
    let names: HashSet<&str> = items.iter().map(|i| i["item"].as_str().unwrap()).collect();

    assert_eq!(names, HashSet::from(["Glacier", "Moraine"]));
    for item in &items {
        assert!(item["value"].as_f64().unwrap() > 0.0);
    }
}

#[tokio::test]
async fn test_links_rpc_returns_linked_pages() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/recommenders/links")
        .json(&json!({
            "user": "alice",
            "basket": ["Fjord"],
            "count": 10,
            "options": { "depth": 1 }
        }))
        .await;

    response.assert_status_ok();
    let items: Vec<serde_json::Value> = response.json();
    let names: HashSet<&str> = items.iter().map(|i| i["item"].as_str().unwrap()).collect();

    assert_eq!(names, HashSet::from(["Aurlandsfjord", "Sognefjord"]));
}

#[tokio::test]
async fn test_textmatch_rpc_scores_by_rank() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/recommenders/textmatch")
        .json(&json!({
            "user": "alice",
            "basket": ["Fjord"],
            "count": 10
        }))
        .await;

    response.assert_status_ok();
    let items: Vec<serde_json::Value> = response.json();

    // Borda: the top match outranks the second
    assert_eq!(items[0]["item"], "Geiranger");
    assert_eq!(items[1]["item"], "Lysefjord");
    assert!(items[0]["value"].as_f64().unwrap() > items[1]["value"].as_f64().unwrap());
}
