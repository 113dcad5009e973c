use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::AppResult;
use crate::models::{AgingLog, HistoryEntry};
use crate::stores::HistoryStore;

/// In-memory history store backed by [`AgingLog`]
///
/// Serves tests and single-process deployments; applies the same
/// advance/record/evict cycle as the relational store.
#[derive(Default)]
pub struct MemoryHistory {
    logs: Mutex<HashMap<(String, String), AgingLog>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn recent(&self, lang: &str, user: &str) -> AppResult<Vec<HistoryEntry>> {
        let logs = self.logs.lock().await;
        let entries = logs
            .get(&(lang.to_string(), user.to_string()))
            .map(|log| {
                log.entries()
                    .map(|(title, age)| HistoryEntry {
                        title: title.to_string(),
                        age,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(entries)
    }

    async fn record(
        &self,
        lang: &str,
        user: &str,
        titles: &[String],
        max_age: i32,
    ) -> AppResult<()> {
        let mut logs = self.logs.lock().await;
        let log = logs
            .entry((lang.to_string(), user.to_string()))
            .or_default();

        log.advance();
        for title in titles {
            log.record(title);
        }
        let evicted = log.evict(max_age);

        tracing::debug!(
            user = %user,
            recorded = titles.len(),
            evicted = evicted.len(),
            "In-memory recommendation history updated"
        );

        Ok(())
    }
}
