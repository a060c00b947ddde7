use async_trait::async_trait;

use crate::types::{ArticleDoc, ArticleId, Engagement, EngagementDoc, TimeWindow, ViewBucket};
use crate::Result;

/// The analytics index of raw page-view events (one event per view,
/// carrying at least `nid` and `date`).
#[async_trait]
pub trait AnalyticsIndex: Send + Sync {
    /// Distinct article ids viewed inside the window, with their view
    /// counts, keeping only ids seen at least `min_views` times.
    /// Capped at [`crate::MAX_RESULTS`] buckets.
    async fn viewed_articles(
        &self,
        window: &TimeWindow,
        min_views: u64,
    ) -> Result<Vec<ViewBucket>>;

    /// All-time view counts for exactly the given ids, no time bound and
    /// no minimum threshold. Ids with no matching events yield no bucket.
    async fn page_views(&self, ids: &[ArticleId]) -> Result<Vec<ViewBucket>>;
}

/// The article-metadata index, queried by document id list.
#[async_trait]
pub trait ArticleIndex: Send + Sync {
    /// Metadata documents for the given ids with the fixed six-field
    /// projection (slug, writer_id, title, kcategory, klocation,
    /// publish_date). Unknown ids are simply absent from the result.
    async fn articles_by_id(&self, ids: &[ArticleId]) -> Result<Vec<ArticleDoc>>;
}

/// The reporting index that receives the finished engagement documents.
#[async_trait]
pub trait ReportingIndex: Send + Sync {
    /// Writes all documents in one bulk call, document id =
    /// `article_id`, so re-runs overwrite rather than duplicate.
    async fn write_engagements(&self, docs: &[EngagementDoc]) -> Result<()>;
}

/// External social-engagement API, one lookup per article URL.
#[async_trait]
pub trait EngagementApi: Send + Sync {
    async fn engagement_for(&self, url: &str) -> Result<Engagement>;
}
