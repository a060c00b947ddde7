pub mod backend;
pub mod error;
pub mod types;

pub use backend::{AnalyticsIndex, ArticleIndex, EngagementApi, ReportingIndex};
pub use error::Error;
pub use types::{
    ArticleDoc, ArticleId, ArticleRecord, Engagement, EngagementDoc, TimeWindow, ViewBucket,
};

pub type Result<T> = std::result::Result<T, Error>;

/// Cap applied to every search-backend query: aggregation bucket counts
/// and id-list hit counts alike.
pub const MAX_RESULTS: usize = 10_000;
