use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use pulse_core::{
    AnalyticsIndex, ArticleIndex, ArticleRecord, EngagementApi, EngagementDoc, Error,
    ReportingIndex, Result, TimeWindow,
};

type RecordMap = BTreeMap<String, ArticleRecord>;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Minimum in-window view count for an article to be selected.
    pub min_view_count: u64,
    /// Prefix joined with the article slug to form its public URL.
    pub article_base_url: String,
    /// Emit a progress line after this many engagement lookups.
    pub progress_every: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_view_count: 5,
            article_base_url: "https://content.example/posts/".to_string(),
            progress_every: 10,
        }
    }
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub window: TimeWindow,
    pub started_at: DateTime<Utc>,
    /// Candidates selected in stage 1.
    pub selected: usize,
    /// Records dropped for missing metadata.
    pub dropped: usize,
    /// Documents written to the reporting index.
    pub written: usize,
}

/// The five-stage engagement pipeline. Backends are constructed by the
/// caller and passed in once; stages run strictly in order, and the
/// first unrecovered fault aborts the run with nothing written.
pub struct Pipeline {
    analytics: Arc<dyn AnalyticsIndex>,
    articles: Arc<dyn ArticleIndex>,
    reporting: Arc<dyn ReportingIndex>,
    engagement: Arc<dyn EngagementApi>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        analytics: Arc<dyn AnalyticsIndex>,
        articles: Arc<dyn ArticleIndex>,
        reporting: Arc<dyn ReportingIndex>,
        engagement: Arc<dyn EngagementApi>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            analytics,
            articles,
            reporting,
            engagement,
            config,
        }
    }

    pub async fn run(&self, window: TimeWindow) -> Result<RunSummary> {
        let started_at = Utc::now();

        info!("🔎 Getting recently viewed articles...");
        let mut records = self.select_candidates(&window).await?;
        let selected = records.len();
        info!("Found {} recently viewed articles", selected);

        info!("📈 Getting page views...");
        self.fill_page_views(&mut records).await?;

        info!("📰 Fetching article details...");
        let dropped = self.fill_metadata(&mut records).await?;

        info!("📣 Fetching engagement data...");
        self.fill_engagement(&mut records).await?;

        info!("📤 Uploading stats...");
        let written = self.write_report(&records, started_at).await?;
        info!(
            "✅ Processed {} articles from {} to {}",
            written, window.start, window.end
        );

        Ok(RunSummary {
            window,
            started_at,
            selected,
            dropped,
            written,
        })
    }

    /// Stage 1: distinct ids viewed at least `min_view_count` times
    /// inside the window, each starting with an empty record.
    async fn select_candidates(&self, window: &TimeWindow) -> Result<RecordMap> {
        let buckets = self
            .analytics
            .viewed_articles(window, self.config.min_view_count)
            .await?;
        Ok(buckets
            .into_iter()
            .map(|bucket| (bucket.id, ArticleRecord::default()))
            .collect())
    }

    /// Stage 2: exact view counts for the candidates, unbounded by time.
    /// Ids with no bucket keep `page_views` unset.
    async fn fill_page_views(&self, records: &mut RecordMap) -> Result<()> {
        let ids: Vec<String> = records.keys().cloned().collect();
        let buckets = self.analytics.page_views(&ids).await?;
        info!("Found page views for {} articles", buckets.len());
        for bucket in buckets {
            if let Some(record) = records.get_mut(&bucket.id) {
                record.page_views = Some(bucket.doc_count);
            }
        }
        Ok(())
    }

    /// Stage 3: metadata enrichment. A record whose document is missing
    /// or carries an empty slug is dropped from the run; the rest get a
    /// derived url plus the five descriptive fields, absent values
    /// copied as empty placeholders.
    async fn fill_metadata(&self, records: &mut RecordMap) -> Result<usize> {
        let ids: Vec<String> = records.keys().cloned().collect();
        let docs = self.articles.articles_by_id(&ids).await?;
        info!("Found data for {} articles", docs.len());

        for doc in docs {
            let Some(record) = records.get_mut(&doc.id) else {
                continue;
            };
            if let Some(slug) = doc.field("slug").filter(|slug| !slug.is_empty()) {
                record.url = Some(format!("{}{}", self.config.article_base_url, slug));
                record.writer_id = Some(doc.field("writer_id").unwrap_or_default().to_string());
                record.title = Some(doc.field("title").unwrap_or_default().to_string());
                record.category = Some(doc.field("kcategory").unwrap_or_default().to_string());
                record.county = Some(doc.field("klocation").unwrap_or_default().to_string());
                record.publish_date =
                    Some(doc.field("publish_date").unwrap_or_default().to_string());
            }
        }

        // No record without a url survives this stage, including ids the
        // metadata index returned nothing for.
        let before = records.len();
        records.retain(|id, record| {
            if record.url.is_none() {
                warn!("Failed to get slug for: {}", id);
            }
            record.url.is_some()
        });
        Ok(before - records.len())
    }

    /// Stage 4: one engagement lookup per surviving record, sequential,
    /// in map order. The first failed lookup aborts the run.
    async fn fill_engagement(&self, records: &mut RecordMap) -> Result<()> {
        let mut count = 0usize;
        for (id, record) in records.iter_mut() {
            let url = record
                .url
                .as_deref()
                .ok_or_else(|| Error::Engagement(format!("record {} has no url", id)))?;
            let engagement = self.engagement.engagement_for(url).await?;
            record.shares = engagement.shares;
            record.comments = engagement.comments;
            count += 1;
            if count % self.config.progress_every == 0 {
                info!("...processed {} articles", count);
            }
        }
        Ok(())
    }

    /// Stage 5: one bulk write of the finished documents, id = article
    /// id so a re-run overwrites the previous documents.
    async fn write_report(&self, records: &RecordMap, started_at: DateTime<Utc>) -> Result<usize> {
        let docs: Vec<EngagementDoc> = records
            .iter()
            .map(|(id, record)| EngagementDoc {
                publish_date: record.publish_date.clone(),
                writer_id: record.writer_id.clone(),
                title: record.title.clone(),
                article_id: id.clone(),
                updated_ts: started_at,
                shares: record.shares,
                comments: record.comments,
                category: record.category.clone(),
                county: record.county.clone(),
                page_views: record.page_views,
            })
            .collect();
        self.reporting.write_engagements(&docs).await?;
        Ok(docs.len())
    }
}
