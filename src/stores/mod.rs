//! Collaborator interfaces the recommendation pipeline consumes.
//!
//! The recommenders only ever see these traits; production wires them to the
//! Postgres-backed [`pg::PgStore`] and the HTTP-backed [`search::CirrusSearch`],
//! tests substitute mocks or the in-memory implementations.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::models::{HistoryEntry, Page, PageId, UserActivity};

pub mod memory;
pub mod pg;
pub mod search;

/// One editor's footprint on a single page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorActivity {
    pub user: String,
    /// Whether the editor made at least one non-minor, non-reverting edit here
    pub has_nonminor: bool,
    /// The editor's total edit count across the wiki
    pub total_edits: i64,
}

/// A user's edit sets, split for the expertise quality filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserEdits {
    /// Every distinct title the user edited
    pub all: Vec<String>,
    /// Titles with at least one non-minor, non-reverting edit
    pub nonminor: Vec<String>,
    /// Total edit count across the wiki
    pub total: i64,
}

/// Co-edit signal: who touched a page, and what else a user touched
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EditGraph: Send + Sync {
    async fn editors_of(&self, lang: &str, title: &str) -> AppResult<Vec<EditorActivity>>;

    async fn edits_of(&self, lang: &str, user: &str) -> AppResult<UserEdits>;
}

/// Link-graph queries: identity resolution, outbound links, inlink popularity
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WikiGraph: Send + Sync {
    /// Resolves titles to canonical pages, following a single redirect hop.
    /// Double redirects and unresolvable titles are dropped.
    async fn resolve_titles(&self, lang: &str, titles: &[String]) -> AppResult<Vec<Page>>;

    /// Outbound links of the given pages, redirect-resolved one hop.
    /// Returns one entry per (source, target) link.
    async fn links_from(&self, lang: &str, ids: &[PageId]) -> AppResult<Vec<Page>>;

    async fn inlink_counts(&self, lang: &str, ids: &[PageId]) -> AppResult<HashMap<PageId, i64>>;
}

/// Category membership data used by the filter stage
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CategoryIndex: Send + Sync {
    /// Whether the category exists at all for this language
    async fn known(&self, lang: &str, category: &str) -> AppResult<bool>;

    async fn contains(&self, lang: &str, category: &str, title: &str) -> AppResult<bool>;

    async fn categories_of(&self, lang: &str, title: &str) -> AppResult<Vec<String>>;

    /// Uniform random member of the category, excluding the given titles
    async fn random_member(
        &self,
        lang: &str,
        category: &str,
        exclude: &HashSet<String>,
    ) -> AppResult<Option<String>>;
}

/// Full-text index exposing "more-like" similarity queries
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MoreLikeSearch: Send + Sync {
    /// Titles most similar to `title`, best match first
    async fn more_like(&self, lang: &str, title: &str, limit: usize) -> AppResult<Vec<String>>;
}

/// Supplies the seed basket and the full set of titles a user already knows
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EditHistoryProvider: Send + Sync {
    async fn activity(&self, lang: &str, user: &str) -> AppResult<UserActivity>;
}

/// The per-user recommendation history log
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// All live history rows for the user, any age
    async fn recent(&self, lang: &str, user: &str) -> AppResult<Vec<HistoryEntry>>;

    /// Ages all prior rows by one cycle, records the new recommendations at
    /// age zero, and evicts rows that reached `max_age` — one logical
    /// transaction.
    async fn record(
        &self,
        lang: &str,
        user: &str,
        titles: &[String],
        max_age: i32,
    ) -> AppResult<()>;
}
