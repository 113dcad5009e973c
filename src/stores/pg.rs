use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sqlx::PgPool;

use crate::cached;
use crate::db::redis::{Cache, CacheKey};
use crate::db::with_retry;
use crate::error::AppResult;
use crate::models::{HistoryEntry, Page, PageId, UserActivity};
use crate::stores::{
    CategoryIndex, EditGraph, EditHistoryProvider, EditorActivity, HistoryStore, UserEdits,
    WikiGraph,
};

const EDITORS_CACHE_TTL: u64 = 3600; // 1 hour

/// How many titles of recent activity seed the recommenders
const BASKET_SIZE: i64 = 20;

/// Postgres-backed implementation of the relational collaborators
///
/// One store serves every relational interface: the co-edit signal, the link
/// graph, category membership, user activity, and the recommendation history.
/// Editor lists are the most expensive lookup and go through the Redis cache.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    cache: Cache,
}

impl PgStore {
    pub fn new(pool: PgPool, cache: Cache) -> Self {
        Self { pool, cache }
    }

    /// Follows one redirect hop for the given pages, dropping double redirects
    async fn resolve_one_hop(
        &self,
        lang: &str,
        pages: Vec<(PageId, String, Option<PageId>)>,
    ) -> AppResult<Vec<Page>> {
        let mut resolved = Vec::new();
        let mut redirect_targets: Vec<PageId> = Vec::new();

        for (id, title, redirect_to) in pages {
            match redirect_to {
                None => resolved.push(Page { id, title }),
                Some(target) => redirect_targets.push(target),
            }
        }

        if redirect_targets.is_empty() {
            return Ok(resolved);
        }

        let targets: Vec<(PageId, String, Option<PageId>)> = sqlx::query_as(
            r#"
            SELECT page_id, title, redirect_to
            FROM pages
            WHERE lang = $1 AND page_id = ANY($2)
            "#,
        )
        .bind(lang)
        .bind(&redirect_targets)
        .fetch_all(&self.pool)
        .await?;

        for (id, title, redirect_to) in targets {
            if redirect_to.is_none() {
                resolved.push(Page { id, title });
            } else {
                tracing::debug!(page_id = id, title = %title, "Dropping double redirect");
            }
        }

        Ok(resolved)
    }
}

#[async_trait]
impl EditGraph for PgStore {
    async fn editors_of(&self, lang: &str, title: &str) -> AppResult<Vec<EditorActivity>> {
        cached!(
            self.cache,
            CacheKey::Editors(lang.to_string(), title.to_string()),
            EDITORS_CACHE_TTL,
            async move {
                let pool = self.pool.clone();
                let rows: Vec<(String, bool, i64)> = with_retry("editors_of", || {
                    let pool = pool.clone();
                    async move {
                        sqlx::query_as(
                            r#"
                            SELECT r.user_name,
                                   BOOL_OR(NOT (r.minor OR r.reverted)) AS has_nonminor,
                                   MAX(s.total_edits) AS total_edits
                            FROM revisions r
                            JOIN editor_stats s
                              ON s.lang = r.lang AND s.user_name = r.user_name
                            WHERE r.lang = $1 AND r.title = $2
                            GROUP BY r.user_name
                            "#,
                        )
                        .bind(lang)
                        .bind(title)
                        .fetch_all(&pool)
                        .await
                    }
                })
                .await?;

                let editors: Vec<EditorActivity> = rows
                    .into_iter()
                    .map(|(user, has_nonminor, total_edits)| EditorActivity {
                        user,
                        has_nonminor,
                        total_edits,
                    })
                    .collect();

                Ok::<_, crate::error::AppError>(editors)
            }
        )
    }

    async fn edits_of(&self, lang: &str, user: &str) -> AppResult<UserEdits> {
        let rows: Vec<(String, bool)> = sqlx::query_as(
            r#"
            SELECT title, BOOL_OR(NOT (minor OR reverted)) AS nonminor
            FROM revisions
            WHERE lang = $1 AND user_name = $2
            GROUP BY title
            "#,
        )
        .bind(lang)
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        let total: Option<i64> =
            sqlx::query_scalar("SELECT total_edits FROM editor_stats WHERE lang = $1 AND user_name = $2")
                .bind(lang)
                .bind(user)
                .fetch_optional(&self.pool)
                .await?;

        let mut edits = UserEdits {
            total: total.unwrap_or(rows.len() as i64),
            ..UserEdits::default()
        };
        for (title, nonminor) in rows {
            if nonminor {
                edits.nonminor.push(title.clone());
            }
            edits.all.push(title);
        }

        Ok(edits)
    }
}

#[async_trait]
impl WikiGraph for PgStore {
    async fn resolve_titles(&self, lang: &str, titles: &[String]) -> AppResult<Vec<Page>> {
        let pages: Vec<(PageId, String, Option<PageId>)> = sqlx::query_as(
            r#"
            SELECT page_id, title, redirect_to
            FROM pages
            WHERE lang = $1 AND title = ANY($2)
            "#,
        )
        .bind(lang)
        .bind(titles)
        .fetch_all(&self.pool)
        .await?;

        self.resolve_one_hop(lang, pages).await
    }

    async fn links_from(&self, lang: &str, ids: &[PageId]) -> AppResult<Vec<Page>> {
        let pool = self.pool.clone();
        let ids_vec = ids.to_vec();
        let rows: Vec<(PageId, String, Option<PageId>)> = with_retry("links_from", || {
            let pool = pool.clone();
            let ids = ids_vec.clone();
            async move {
                sqlx::query_as(
                    r#"
                    SELECT p.page_id, p.title, p.redirect_to
                    FROM pagelinks l
                    JOIN pages p ON p.lang = l.lang AND p.page_id = l.to_id
                    WHERE l.lang = $1 AND l.from_id = ANY($2)
                    "#,
                )
                .bind(lang)
                .bind(&ids)
                .fetch_all(&pool)
                .await
            }
        })
        .await?;

        self.resolve_one_hop(lang, rows).await
    }

    async fn inlink_counts(&self, lang: &str, ids: &[PageId]) -> AppResult<HashMap<PageId, i64>> {
        let pool = self.pool.clone();
        let ids_vec = ids.to_vec();
        let rows: Vec<(PageId, i64)> = with_retry("inlink_counts", || {
            let pool = pool.clone();
            let ids = ids_vec.clone();
            async move {
                sqlx::query_as(
                    "SELECT page_id, inlinks FROM inlink_counts WHERE lang = $1 AND page_id = ANY($2)",
                )
                .bind(lang)
                .bind(&ids)
                .fetch_all(&pool)
                .await
            }
        })
        .await?;

        Ok(rows.into_iter().collect())
    }
}

#[async_trait]
impl CategoryIndex for PgStore {
    async fn known(&self, lang: &str, category: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM category_pages WHERE lang = $1 AND category = $2)",
        )
        .bind(lang)
        .bind(category)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn contains(&self, lang: &str, category: &str, title: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM category_pages
                WHERE lang = $1 AND category = $2 AND title = $3
            )
            "#,
        )
        .bind(lang)
        .bind(category)
        .bind(title)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn categories_of(&self, lang: &str, title: &str) -> AppResult<Vec<String>> {
        let categories: Vec<String> = sqlx::query_scalar(
            "SELECT category FROM category_pages WHERE lang = $1 AND title = $2 ORDER BY category",
        )
        .bind(lang)
        .bind(title)
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    async fn random_member(
        &self,
        lang: &str,
        category: &str,
        exclude: &HashSet<String>,
    ) -> AppResult<Option<String>> {
        let excluded: Vec<String> = exclude.iter().cloned().collect();
        let member: Option<String> = sqlx::query_scalar(
            r#"
            SELECT title FROM category_pages
            WHERE lang = $1 AND category = $2 AND NOT (title = ANY($3))
            ORDER BY random()
            LIMIT 1
            "#,
        )
        .bind(lang)
        .bind(category)
        .bind(&excluded)
        .fetch_optional(&self.pool)
        .await?;

        Ok(member)
    }
}

#[async_trait]
impl EditHistoryProvider for PgStore {
    async fn activity(&self, lang: &str, user: &str) -> AppResult<UserActivity> {
        let all_edited: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT title FROM revisions WHERE lang = $1 AND user_name = $2",
        )
        .bind(lang)
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        // Most recently touched titles first
        let basket: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT title FROM revisions
            WHERE lang = $1 AND user_name = $2
            GROUP BY title
            ORDER BY MAX(ts) DESC
            LIMIT $3
            "#,
        )
        .bind(lang)
        .bind(user)
        .bind(BASKET_SIZE)
        .fetch_all(&self.pool)
        .await?;

        Ok(UserActivity { all_edited, basket })
    }
}

#[async_trait]
impl HistoryStore for PgStore {
    async fn recent(&self, lang: &str, user: &str) -> AppResult<Vec<HistoryEntry>> {
        let pool = self.pool.clone();
        let rows: Vec<(String, i32)> = with_retry("history_recent", || {
            let pool = pool.clone();
            async move {
                sqlx::query_as(
                    "SELECT title, age FROM rec_history WHERE lang = $1 AND user_name = $2",
                )
                .bind(lang)
                .bind(user)
                .fetch_all(&pool)
                .await
            }
        })
        .await?;

        Ok(rows
            .into_iter()
            .map(|(title, age)| HistoryEntry { title, age })
            .collect())
    }

    async fn record(
        &self,
        lang: &str,
        user: &str,
        titles: &[String],
        max_age: i32,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        // Age every prior row for this user by one cycle
        sqlx::query("UPDATE rec_history SET age = age + 1 WHERE lang = $1 AND user_name = $2")
            .bind(lang)
            .bind(user)
            .execute(&mut *tx)
            .await?;

        for title in titles {
            sqlx::query(
                r#"
                INSERT INTO rec_history (lang, user_name, title, age)
                VALUES ($1, $2, $3, 0)
                ON CONFLICT (lang, user_name, title) DO UPDATE SET age = 0
                "#,
            )
            .bind(lang)
            .bind(user)
            .bind(title)
            .execute(&mut *tx)
            .await?;
        }

        let evicted = sqlx::query(
            "DELETE FROM rec_history WHERE lang = $1 AND user_name = $2 AND age >= $3",
        )
        .bind(lang)
        .bind(user)
        .bind(max_age)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            user = %user,
            recorded = titles.len(),
            evicted = evicted.rows_affected(),
            "Recommendation history updated"
        );

        Ok(())
    }
}
