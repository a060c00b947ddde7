use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use pulse_core::{
    AnalyticsIndex, ArticleDoc, ArticleId, ArticleIndex, EngagementDoc, ReportingIndex, Result,
    TimeWindow, ViewBucket, MAX_RESULTS,
};

/// One page-view event, the unit stored in the analytics index.
#[derive(Debug, Clone)]
pub struct ViewEvent {
    pub nid: ArticleId,
    pub date: DateTime<Utc>,
}

#[derive(Default)]
struct MemoryIndex {
    events: Vec<ViewEvent>,
    articles: Vec<ArticleDoc>,
    reports: BTreeMap<ArticleId, EngagementDoc>,
}

/// In-memory stand-in for all three search-backend roles. Used by the
/// pipeline tests; seeded with view events and article docs, then
/// inspected for what was written.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<RwLock<MemoryIndex>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_view(&self, nid: &str, date: DateTime<Utc>) {
        let mut index = self.inner.write().await;
        index.events.push(ViewEvent {
            nid: nid.to_string(),
            date,
        });
    }

    /// Records `count` views of the same article at the same instant.
    pub async fn record_views(&self, nid: &str, date: DateTime<Utc>, count: usize) {
        let mut index = self.inner.write().await;
        for _ in 0..count {
            index.events.push(ViewEvent {
                nid: nid.to_string(),
                date,
            });
        }
    }

    pub async fn insert_article(&self, doc: ArticleDoc) {
        let mut index = self.inner.write().await;
        index.articles.push(doc);
    }

    /// Everything written to the reporting index so far, ordered by id.
    pub async fn written_reports(&self) -> Vec<EngagementDoc> {
        let index = self.inner.read().await;
        index.reports.values().cloned().collect()
    }
}

#[async_trait]
impl AnalyticsIndex for MemoryBackend {
    async fn viewed_articles(
        &self,
        window: &TimeWindow,
        min_views: u64,
    ) -> Result<Vec<ViewBucket>> {
        let index = self.inner.read().await;
        let mut counts: BTreeMap<ArticleId, u64> = BTreeMap::new();
        for event in &index.events {
            if event.date >= window.start && event.date <= window.end {
                *counts.entry(event.nid.clone()).or_default() += 1;
            }
        }
        Ok(counts
            .into_iter()
            .filter(|(_, doc_count)| *doc_count >= min_views)
            .map(|(id, doc_count)| ViewBucket { id, doc_count })
            .take(MAX_RESULTS)
            .collect())
    }

    async fn page_views(&self, ids: &[ArticleId]) -> Result<Vec<ViewBucket>> {
        let index = self.inner.read().await;
        let mut counts: BTreeMap<ArticleId, u64> = BTreeMap::new();
        for event in &index.events {
            if ids.contains(&event.nid) {
                *counts.entry(event.nid.clone()).or_default() += 1;
            }
        }
        Ok(counts
            .into_iter()
            .map(|(id, doc_count)| ViewBucket { id, doc_count })
            .take(MAX_RESULTS)
            .collect())
    }
}

#[async_trait]
impl ArticleIndex for MemoryBackend {
    async fn articles_by_id(&self, ids: &[ArticleId]) -> Result<Vec<ArticleDoc>> {
        let index = self.inner.read().await;
        Ok(index
            .articles
            .iter()
            .filter(|doc| ids.contains(&doc.id))
            .take(MAX_RESULTS)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReportingIndex for MemoryBackend {
    async fn write_engagements(&self, docs: &[EngagementDoc]) -> Result<()> {
        let mut index = self.inner.write().await;
        for doc in docs {
            index.reports.insert(doc.article_id.clone(), doc.clone());
        }
        Ok(())
    }
}
