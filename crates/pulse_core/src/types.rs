use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::Result;

/// Opaque article identifier (`nid` in the analytics events).
pub type ArticleId = String;

/// Accumulator for one article, filled in as the pipeline advances.
/// Every field except the id is optional until the stage that sets it
/// has run; a record missing its slug never survives past metadata
/// enrichment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub page_views: Option<u64>,
    pub url: Option<String>,
    pub writer_id: Option<String>,
    pub title: Option<String>,
    pub category: Option<String>,
    pub county: Option<String>,
    pub publish_date: Option<String>,
    pub shares: Option<i64>,
    pub comments: Option<i64>,
}

/// Inclusive time range used to select stage-1 candidates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Default window: thirty minutes back, one hour forward.
    pub fn around(now: DateTime<Utc>) -> Self {
        Self {
            start: now - Duration::minutes(30),
            end: now + Duration::hours(1),
        }
    }

    /// Window with an explicit start; the end keeps its default.
    pub fn starting_at(start: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            start,
            end: now + Duration::hours(1),
        }
    }

    /// Parses a start override in `YYYY-MM-DD:HH` form (hour resolution, UTC).
    pub fn parse_start(s: &str) -> Result<DateTime<Utc>> {
        let (date, hour) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::Window(format!("expected YYYY-MM-DD:HH, got {:?}", s)))?;
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| Error::Window(format!("bad date in {:?}: {}", s, e)))?;
        let hour: u32 = hour
            .parse()
            .map_err(|_| Error::Window(format!("bad hour in {:?}", s)))?;
        let naive = date
            .and_hms_opt(hour, 0, 0)
            .ok_or_else(|| Error::Window(format!("hour out of range in {:?}", s)))?;
        Ok(Utc.from_utc_datetime(&naive))
    }
}

/// One terms-aggregation bucket: an article id and its document count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewBucket {
    pub id: ArticleId,
    pub doc_count: u64,
}

/// Raw metadata hit from the articles index: the document id plus the
/// projected source fields as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleDoc {
    pub id: ArticleId,
    #[serde(default)]
    pub source: serde_json::Map<String, serde_json::Value>,
}

impl ArticleDoc {
    pub fn new(id: impl Into<ArticleId>) -> Self {
        Self {
            id: id.into(),
            source: serde_json::Map::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.source.insert(name.to_string(), value.into());
        self
    }

    /// Looks up a projected source field. Returns `None` when the field
    /// is absent; the call site decides whether that is fatal (slug) or
    /// tolerable (everything else). Single-element string lists are
    /// unwrapped, since the backend returns list-valued `_source`
    /// projections for some mappings.
    pub fn field(&self, name: &str) -> Option<&str> {
        match self.source.get(name)? {
            serde_json::Value::String(s) => Some(s.as_str()),
            serde_json::Value::Array(items) => items.first().and_then(|v| v.as_str()),
            _ => None,
        }
    }
}

/// Share and comment counts for one article URL. The upstream API may
/// return nulls; they pass through into the written document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Engagement {
    pub shares: Option<i64>,
    pub comments: Option<i64>,
}

/// The document written to the reporting index, one per article,
/// keyed by `article_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementDoc {
    pub publish_date: Option<String>,
    pub writer_id: Option<String>,
    pub title: Option<String>,
    pub article_id: ArticleId,
    pub updated_ts: DateTime<Utc>,
    pub shares: Option<i64>,
    pub comments: Option<i64>,
    pub category: Option<String>,
    pub county: Option<String>,
    pub page_views: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn parses_hour_resolution_start() {
        let start = TimeWindow::parse_start("2026-08-24:13").unwrap();
        assert_eq!(start.hour(), 13);
        assert_eq!(start.minute(), 0);
        assert_eq!(start.date_naive().to_string(), "2026-08-24");
    }

    #[test]
    fn rejects_malformed_start() {
        assert!(TimeWindow::parse_start("2026-08-24").is_err());
        assert!(TimeWindow::parse_start("2026-08-24:xx").is_err());
        assert!(TimeWindow::parse_start("2026-08-24:25").is_err());
    }

    #[test]
    fn default_window_spans_thirty_minutes_back_one_hour_forward() {
        let now = Utc::now();
        let window = TimeWindow::around(now);
        assert_eq!(window.end - window.start, Duration::minutes(90));
        assert!(window.start < now && now < window.end);
    }

    #[test]
    fn field_accessor_unwraps_lists_and_reports_absence() {
        let mut doc = ArticleDoc::new("42").with_field("slug", "my-article");
        doc.source
            .insert("title".into(), serde_json::json!(["Listed title"]));
        assert_eq!(doc.field("slug"), Some("my-article"));
        assert_eq!(doc.field("title"), Some("Listed title"));
        assert_eq!(doc.field("writer_id"), None);
    }
}
