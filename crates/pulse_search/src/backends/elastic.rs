use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use pulse_core::{
    AnalyticsIndex, ArticleDoc, ArticleId, ArticleIndex, EngagementDoc, Error, ReportingIndex,
    Result, TimeWindow, ViewBucket, MAX_RESULTS,
};

/// Fields projected from the articles index in metadata queries.
const METADATA_FIELDS: [&str; 6] = [
    "slug",
    "writer_id",
    "title",
    "kcategory",
    "klocation",
    "publish_date",
];

#[derive(Debug, Clone)]
pub struct EsConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub analytics_index: String,
    pub articles_index: String,
    pub reporting_index: String,
    pub timeout: Duration,
    pub retry_on_timeout: bool,
}

impl Default for EsConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            username: None,
            password: None,
            analytics_index: "pageviews".to_string(),
            articles_index: "articles".to_string(),
            reporting_index: "social_engagements".to_string(),
            timeout: Duration::from_secs(30),
            retry_on_timeout: true,
        }
    }
}

/// HTTP client for an Elasticsearch-style search backend. One handle
/// serves all three index roles; it is constructed once at startup and
/// passed into the pipeline.
pub struct ElasticBackend {
    client: reqwest::Client,
    config: EsConfig,
}

impl ElasticBackend {
    pub fn new(config: EsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.url.trim_end_matches('/'), path)
    }

    async fn search(&self, index: &str, body: Value) -> Result<Value> {
        let url = self.endpoint(&format!("{}/_search", index));
        self.execute(self.client.post(&url).json(&body)).await
    }

    /// Sends the request with basic auth applied, retrying once when the
    /// backend times out and `retry_on_timeout` is set.
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let request = match &self.config.username {
            Some(user) => request.basic_auth(user, self.config.password.as_deref()),
            None => request,
        };
        let retry = if self.config.retry_on_timeout {
            request.try_clone()
        } else {
            None
        };
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => match retry {
                Some(retry) => {
                    tracing::warn!("search backend timed out, retrying once");
                    retry.send().await?
                }
                None => return Err(e.into()),
            },
            Err(e) => return Err(e.into()),
        };
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Search(format!("HTTP {}: {}", status, body)));
        }
        Ok(response.json().await?)
    }
}

/// Pulls the buckets out of a terms-aggregation response. Bucket keys
/// come back numeric for numeric field mappings, so both forms are
/// accepted.
fn parse_buckets(response: &Value, agg: &str) -> Result<Vec<ViewBucket>> {
    let buckets = response["aggregations"][agg]["buckets"]
        .as_array()
        .ok_or_else(|| Error::Search(format!("no {:?} aggregation in response", agg)))?;
    buckets
        .iter()
        .map(|bucket| {
            let id = match &bucket["key"] {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                other => {
                    return Err(Error::Search(format!("unexpected bucket key: {}", other)))
                }
            };
            let doc_count = bucket["doc_count"]
                .as_u64()
                .ok_or_else(|| Error::Search(format!("missing doc_count for {}", id)))?;
            Ok(ViewBucket { id, doc_count })
        })
        .collect()
}

fn parse_hits(response: &Value) -> Result<Vec<ArticleDoc>> {
    let hits = response["hits"]["hits"]
        .as_array()
        .ok_or_else(|| Error::Search("no hits in response".to_string()))?;
    hits.iter()
        .map(|hit| {
            let id = match &hit["_id"] {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                other => return Err(Error::Search(format!("unexpected hit id: {}", other))),
            };
            let source = hit["_source"].as_object().cloned().unwrap_or_default();
            Ok(ArticleDoc { id, source })
        })
        .collect()
}

/// Builds the NDJSON payload for a bulk index call, one action line and
/// one source line per document, id = article id.
fn bulk_body(index: &str, docs: &[EngagementDoc]) -> Result<String> {
    let mut body = String::new();
    for doc in docs {
        let action = json!({"index": {"_index": index, "_id": doc.article_id}});
        body.push_str(&action.to_string());
        body.push('\n');
        body.push_str(&serde_json::to_string(doc)?);
        body.push('\n');
    }
    Ok(body)
}

#[async_trait]
impl AnalyticsIndex for ElasticBackend {
    async fn viewed_articles(
        &self,
        window: &TimeWindow,
        min_views: u64,
    ) -> Result<Vec<ViewBucket>> {
        let body = json!({
            "query": {
                "range": {
                    "date": {
                        "gte": window.start.to_rfc3339(),
                        "lte": window.end.to_rfc3339(),
                    }
                }
            },
            "aggs": {
                "articles": {
                    "terms": {
                        "field": "nid",
                        "size": MAX_RESULTS,
                        "min_doc_count": min_views,
                    }
                }
            },
            "size": 0,
        });
        let response = self.search(&self.config.analytics_index, body).await?;
        parse_buckets(&response, "articles")
    }

    async fn page_views(&self, ids: &[ArticleId]) -> Result<Vec<ViewBucket>> {
        let body = json!({
            "query": {
                "constant_score": {
                    "filter": {
                        "terms": { "nid": ids }
                    }
                }
            },
            "size": 0,
            "aggs": {
                "page_views": {
                    "terms": {
                        "field": "nid",
                        "size": MAX_RESULTS,
                    }
                }
            },
        });
        let response = self.search(&self.config.analytics_index, body).await?;
        parse_buckets(&response, "page_views")
    }
}

#[async_trait]
impl ArticleIndex for ElasticBackend {
    async fn articles_by_id(&self, ids: &[ArticleId]) -> Result<Vec<ArticleDoc>> {
        let body = json!({
            "query": {
                "ids": { "values": ids }
            },
            "size": MAX_RESULTS,
            "_source": METADATA_FIELDS,
        });
        let response = self.search(&self.config.articles_index, body).await?;
        parse_hits(&response)
    }
}

#[async_trait]
impl ReportingIndex for ElasticBackend {
    async fn write_engagements(&self, docs: &[EngagementDoc]) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }
        let body = bulk_body(&self.config.reporting_index, docs)?;
        let url = self.endpoint("_bulk");
        let response = self
            .execute(
                self.client
                    .post(&url)
                    .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
                    .body(body),
            )
            .await?;
        // A 200 with item-level errors still counts as a failed bulk
        // call; individual items are not diagnosed.
        if response["errors"].as_bool() == Some(true) {
            return Err(Error::BulkWrite(
                "bulk response reported item errors".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn parses_string_and_numeric_bucket_keys() {
        let response = json!({
            "aggregations": {
                "articles": {
                    "buckets": [
                        {"key": "101", "doc_count": 12},
                        {"key": 102, "doc_count": 3},
                    ]
                }
            }
        });
        let buckets = parse_buckets(&response, "articles").unwrap();
        assert_eq!(
            buckets,
            vec![
                ViewBucket { id: "101".to_string(), doc_count: 12 },
                ViewBucket { id: "102".to_string(), doc_count: 3 },
            ]
        );
    }

    #[test]
    fn missing_aggregation_is_an_error() {
        let response = json!({"aggregations": {}});
        assert!(parse_buckets(&response, "articles").is_err());
    }

    #[test]
    fn parses_hits_with_projected_source() {
        let response = json!({
            "hits": {
                "hits": [
                    {"_id": "101", "_source": {"slug": "my-article", "title": "T"}},
                    {"_id": 102, "_source": {}},
                ]
            }
        });
        let docs = parse_hits(&response).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "101");
        assert_eq!(docs[0].field("slug"), Some("my-article"));
        assert_eq!(docs[1].id, "102");
        assert_eq!(docs[1].field("slug"), None);
    }

    #[test]
    fn bulk_body_pairs_action_and_source_lines() {
        let doc = EngagementDoc {
            publish_date: Some("2026-08-20".to_string()),
            writer_id: Some("w1".to_string()),
            title: Some("Title".to_string()),
            article_id: "101".to_string(),
            updated_ts: Utc::now(),
            shares: Some(42),
            comments: Some(7),
            category: None,
            county: None,
            page_views: Some(12),
        };
        let body = bulk_body("social_engagements", &[doc]).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 2);
        let action: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(action["index"]["_index"], "social_engagements");
        assert_eq!(action["index"]["_id"], "101");
        let source: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(source["article_id"], "101");
        assert_eq!(source["shares"], 42);
    }
}
