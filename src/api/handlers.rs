use std::collections::HashMap;

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::models::{Candidate, Recommendation, RecommenderId};
use crate::services::orchestrator::AggregationRequest;

use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct RecommendationsRequest {
    pub user: String,
    #[serde(default = "default_lang")]
    pub lang: String,
    pub categories: Vec<String>,
    #[serde(default = "default_per_category")]
    pub nrecs_per_category: usize,
    /// 0 means "use the service default"
    #[serde(default)]
    pub nrecs_per_source: usize,
    #[serde(default)]
    pub log_results: bool,
}

fn default_lang() -> String {
    "en".to_string()
}

fn default_per_category() -> usize {
    3
}

fn default_count() -> usize {
    100
}

#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    pub status: String,
    pub generated_at: DateTime<Utc>,
    pub recs: HashMap<String, RecEntry>,
}

#[derive(Debug, Serialize)]
pub struct RecEntry {
    pub category: String,
    pub rank: usize,
    pub source: RecommenderId,
    pub source_rank: usize,
    pub categories: Vec<String>,
}

impl From<Recommendation> for RecEntry {
    fn from(rec: Recommendation) -> Self {
        Self {
            category: rec.category,
            rank: rec.rank,
            source: rec.source,
            source_rank: rec.source_rank,
            categories: rec.categories,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SourceRequest {
    pub user: String,
    #[serde(default = "default_lang")]
    pub lang: String,
    pub basket: Vec<String>,
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default)]
    pub options: SourceOptions,
}

#[derive(Debug, Default, Deserialize)]
pub struct SourceOptions {
    pub threshold: Option<u32>,
    pub backoff: Option<bool>,
    pub depth: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ScoredItem {
    pub item: String,
    pub value: f64,
}

impl From<Candidate> for ScoredItem {
    fn from(candidate: Candidate) -> Self {
        Self {
            item: candidate.title,
            value: candidate.score,
        }
    }
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// Runs the full aggregation pipeline for one user
pub async fn get_recommendations(
    State(state): State<AppState>,
    Json(request): Json<RecommendationsRequest>,
) -> AppResult<Json<RecommendationsResponse>> {
    let aggregation = state
        .service
        .aggregate(&AggregationRequest {
            user: request.user,
            lang: request.lang,
            categories: request.categories,
            per_category: request.nrecs_per_category,
            per_source: request.nrecs_per_source,
            log_results: request.log_results,
        })
        .await?;

    let status = if aggregation.complete { "ok" } else { "partial" };
    let recs: HashMap<String, RecEntry> = aggregation
        .recs
        .into_iter()
        .map(|rec| (rec.title.clone(), RecEntry::from(rec)))
        .collect();

    Ok(Json(RecommendationsResponse {
        status: status.to_string(),
        generated_at: Utc::now(),
        recs,
    }))
}

/// Standalone co-edit recommender RPC
pub async fn coedit(
    State(state): State<AppState>,
    Json(request): Json<SourceRequest>,
) -> AppResult<Json<Vec<ScoredItem>>> {
    let candidates = state
        .service
        .coedit(
            &request.lang,
            &request.user,
            &request.basket,
            request.count,
            request.options.threshold,
            request.options.backoff,
        )
        .await?;

    Ok(Json(candidates.into_iter().map(ScoredItem::from).collect()))
}

/// Standalone link recommender RPC
pub async fn links(
    State(state): State<AppState>,
    Json(request): Json<SourceRequest>,
) -> AppResult<Json<Vec<ScoredItem>>> {
    let candidates = state
        .service
        .links(
            &request.lang,
            &request.basket,
            request.count,
            request.options.depth,
        )
        .await?;

    Ok(Json(candidates.into_iter().map(ScoredItem::from).collect()))
}

/// Standalone search-rank recommender RPC
pub async fn textmatch(
    State(state): State<AppState>,
    Json(request): Json<SourceRequest>,
) -> AppResult<Json<Vec<ScoredItem>>> {
    let candidates = state
        .service
        .textmatch(&request.lang, &request.basket, request.count)
        .await?;

    Ok(Json(candidates.into_iter().map(ScoredItem::from).collect()))
}
