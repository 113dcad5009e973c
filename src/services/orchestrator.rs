use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::error::{AppError, AppResult};
use crate::models::{Candidate, Recommendation, RecommenderId};
use crate::services::coedit::{self, CoEditParams};
use crate::services::filter;
use crate::services::lang;
use crate::services::links::{self, LinkParams};
use crate::services::sources::{ListSource, RandomFallback, RecommenderSource};
use crate::services::textmatch::{self, TextMatchParams};
use crate::stores::{
    CategoryIndex, EditGraph, EditHistoryProvider, HistoryStore, MoreLikeSearch, WikiGraph,
};

/// Service-wide recommendation settings; per-request options override the
/// relevant fields
#[derive(Debug, Clone)]
pub struct Settings {
    /// Independent deadline per recommender call
    pub source_timeout: Duration,
    /// Titles requested from each recommender when the request does not say
    pub per_source_default: usize,
    /// History rows are evicted once their age reaches this limit
    pub history_max_age: i32,
    pub coedit: CoEditParams,
    pub links: LinkParams,
    pub textmatch: TextMatchParams,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source_timeout: Duration::from_secs(10),
            per_source_default: 500,
            history_max_age: 7,
            coedit: CoEditParams::default(),
            links: LinkParams::default(),
            textmatch: TextMatchParams::default(),
        }
    }
}

/// One aggregation request, already validated at the HTTP boundary
#[derive(Debug, Clone)]
pub struct AggregationRequest {
    pub user: String,
    pub lang: String,
    pub categories: Vec<String>,
    pub per_category: usize,
    pub per_source: usize,
    pub log_results: bool,
}

/// The finished result set. `complete` is false when any source failed,
/// timed out, or could not meet its quota — an observable outcome rather
/// than a silent truncation.
#[derive(Debug)]
pub struct Aggregation {
    pub complete: bool,
    pub recs: Vec<Recommendation>,
}

/// Coordinates the three recommenders and the filter stage
///
/// The recommenders are independent, side-effect-free reads and run
/// concurrently; all of them complete or time out before the filter runs. A
/// timed-out or failed recommender contributes an empty list. History is
/// only written after the result set is finalized.
pub struct RecommendationService {
    edit_graph: Arc<dyn EditGraph>,
    wiki: Arc<dyn WikiGraph>,
    categories: Arc<dyn CategoryIndex>,
    search: Arc<dyn MoreLikeSearch>,
    activity: Arc<dyn EditHistoryProvider>,
    history: Arc<dyn HistoryStore>,
    settings: Settings,
}

impl RecommendationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        edit_graph: Arc<dyn EditGraph>,
        wiki: Arc<dyn WikiGraph>,
        categories: Arc<dyn CategoryIndex>,
        search: Arc<dyn MoreLikeSearch>,
        activity: Arc<dyn EditHistoryProvider>,
        history: Arc<dyn HistoryStore>,
        settings: Settings,
    ) -> Self {
        Self {
            edit_graph,
            wiki,
            categories,
            search,
            activity,
            history,
            settings,
        }
    }

    /// Runs the full pipeline: validate, gather, filter, log
    pub async fn aggregate(&self, request: &AggregationRequest) -> AppResult<Aggregation> {
        // Configuration problems fail fast, before any recommender runs
        let profile = lang::profile(&request.lang)
            .ok_or_else(|| AppError::UnsupportedLanguage(request.lang.clone()))?;
        if request.categories.is_empty() {
            return Err(AppError::InvalidInput(
                "at least one category is required".to_string(),
            ));
        }
        if request.per_category == 0 {
            return Err(AppError::InvalidInput(
                "nrecs_per_category must be positive".to_string(),
            ));
        }
        for category in &request.categories {
            if !self.categories.known(&request.lang, category).await? {
                return Err(AppError::InvalidInput(format!(
                    "unknown category: {}",
                    category
                )));
            }
        }

        let activity = self
            .activity
            .activity(&request.lang, &request.user)
            .await?;

        tracing::info!(
            user = %request.user,
            lang = %request.lang,
            basket = activity.basket.len(),
            categories = request.categories.len(),
            "Starting recommendation aggregation"
        );

        // Exclusion set: everything the user already knows, plus whatever the
        // history log says was recommended recently
        let mut exclude: HashSet<String> = activity.all_edited.iter().cloned().collect();
        exclude.extend(activity.basket.iter().cloned());
        for entry in self
            .history
            .recent(&request.lang, &request.user)
            .await?
        {
            exclude.insert(entry.title);
        }

        let per_source = if request.per_source == 0 {
            self.settings.per_source_default
        } else {
            request.per_source
        };

        // Join barrier: every recommender completes or times out before the
        // filter stage runs
        let deadline = self.settings.source_timeout;
        let (coedit_out, links_out, text_out) = tokio::join!(
            timeout(
                deadline,
                coedit::recommend(
                    self.edit_graph.as_ref(),
                    &request.lang,
                    &request.user,
                    &activity.basket,
                    per_source,
                    &self.settings.coedit,
                )
            ),
            timeout(
                deadline,
                links::recommend(
                    self.wiki.as_ref(),
                    profile,
                    &request.lang,
                    &activity.basket,
                    per_source,
                    &self.settings.links,
                )
            ),
            timeout(
                deadline,
                textmatch::recommend(
                    self.search.as_ref(),
                    &request.lang,
                    &activity.basket,
                    per_source,
                    &self.settings.textmatch,
                )
            ),
        );

        let mut complete = true;

        let coedit_titles = match coedit_out {
            Ok(Ok(result)) => {
                if !result.satisfied {
                    complete = false;
                }
                titles_of(result.candidates)
            }
            Ok(Err(e)) => {
                tracing::warn!(source = "coedit", error = %e, "Recommender failed, contributing empty list");
                complete = false;
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(source = "coedit", "Recommender timed out, contributing empty list");
                complete = false;
                Vec::new()
            }
        };
        let links_titles = flatten_source(RecommenderId::Links, links_out, &mut complete);
        let text_titles = flatten_source(RecommenderId::TextMatch, text_out, &mut complete);

        let mut sources: Vec<Box<dyn RecommenderSource>> = vec![
            Box::new(ListSource::new(RecommenderId::CoEdit, coedit_titles)),
            Box::new(ListSource::new(RecommenderId::Links, links_titles)),
            Box::new(ListSource::new(RecommenderId::TextMatch, text_titles)),
        ];
        let mut fallback = RandomFallback::new(
            self.categories.clone(),
            request.lang.clone(),
            exclude.clone(),
        );

        let recs = filter::merge(
            self.categories.as_ref(),
            profile,
            &request.lang,
            &mut sources,
            &mut fallback,
            &request.categories,
            &exclude,
            request.per_category,
        )
        .await?;

        // All history mutation happens only once the result set is finalized,
        // so a cancelled request leaves no partial writes
        if request.log_results {
            let titles: Vec<String> = recs.iter().map(|r| r.title.clone()).collect();
            self.history
                .record(
                    &request.lang,
                    &request.user,
                    &titles,
                    self.settings.history_max_age,
                )
                .await?;
        }

        tracing::info!(
            user = %request.user,
            accepted = recs.len(),
            complete = complete,
            "Recommendation aggregation completed"
        );

        Ok(Aggregation { complete, recs })
    }

    /// The co-edit recommender's standalone RPC
    pub async fn coedit(
        &self,
        lang: &str,
        user: &str,
        basket: &[String],
        count: usize,
        threshold: Option<u32>,
        backoff: Option<bool>,
    ) -> AppResult<Vec<Candidate>> {
        let mut params = self.settings.coedit.clone();
        if let Some(threshold) = threshold {
            params.threshold = threshold;
        }
        if let Some(backoff) = backoff {
            params.backoff = backoff;
        }

        let result = timeout(
            self.settings.source_timeout,
            coedit::recommend(self.edit_graph.as_ref(), lang, user, basket, count, &params),
        )
        .await
        .map_err(|_| AppError::Timeout("coedit".to_string()))??;

        Ok(result.candidates)
    }

    /// The link recommender's standalone RPC
    pub async fn links(
        &self,
        lang: &str,
        basket: &[String],
        count: usize,
        depth: Option<u32>,
    ) -> AppResult<Vec<Candidate>> {
        let profile = lang::profile(lang)
            .ok_or_else(|| AppError::UnsupportedLanguage(lang.to_string()))?;
        let mut params = self.settings.links.clone();
        if let Some(depth) = depth {
            params.depth = depth;
        }

        timeout(
            self.settings.source_timeout,
            links::recommend(self.wiki.as_ref(), profile, lang, basket, count, &params),
        )
        .await
        .map_err(|_| AppError::Timeout("links".to_string()))?
    }

    /// The search-rank recommender's standalone RPC
    pub async fn textmatch(
        &self,
        lang: &str,
        basket: &[String],
        count: usize,
    ) -> AppResult<Vec<Candidate>> {
        timeout(
            self.settings.source_timeout,
            textmatch::recommend(
                self.search.as_ref(),
                lang,
                basket,
                count,
                &self.settings.textmatch,
            ),
        )
        .await
        .map_err(|_| AppError::Timeout("textmatch".to_string()))?
    }
}

fn titles_of(candidates: Vec<Candidate>) -> Vec<String> {
    candidates.into_iter().map(|c| c.title).collect()
}

fn flatten_source(
    source: RecommenderId,
    outcome: Result<AppResult<Vec<Candidate>>, tokio::time::error::Elapsed>,
    complete: &mut bool,
) -> Vec<String> {
    match outcome {
        Ok(Ok(candidates)) => titles_of(candidates),
        Ok(Err(e)) => {
            tracing::warn!(source = %source, error = %e, "Recommender failed, contributing empty list");
            *complete = false;
            Vec::new()
        }
        Err(_) => {
            tracing::warn!(source = %source, "Recommender timed out, contributing empty list");
            *complete = false;
            Vec::new()
        }
    }
}
