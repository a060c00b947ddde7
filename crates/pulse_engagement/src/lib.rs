use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use pulse_core::{Engagement, EngagementApi, Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://plus.sharedcount.com/url";

#[derive(Debug, Clone)]
pub struct SharedCountConfig {
    pub base_url: String,
    pub api_key: String,
}

impl SharedCountConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }
}

/// Client for the SharedCount-style engagement API: a key-authenticated
/// GET per article URL. Deliberately no timeout override and no retry;
/// any fault here is fatal to the whole run.
pub struct SharedCountClient {
    client: reqwest::Client,
    config: SharedCountConfig,
}

#[derive(Debug, Deserialize)]
struct SharedCountResponse {
    #[serde(rename = "Facebook")]
    facebook: FacebookCounts,
}

#[derive(Debug, Deserialize)]
struct FacebookCounts {
    share_count: Option<i64>,
    comment_count: Option<i64>,
}

impl SharedCountClient {
    pub fn new(config: SharedCountConfig) -> Result<Self> {
        Url::parse(&config.base_url)
            .map_err(|e| Error::Engagement(format!("invalid base url {:?}: {}", config.base_url, e)))?;
        Ok(Self {
            client: reqwest::Client::new(),
            config,
        })
    }
}

#[async_trait]
impl EngagementApi for SharedCountClient {
    async fn engagement_for(&self, url: &str) -> Result<Engagement> {
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[("apikey", self.config.api_key.as_str()), ("url", url)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Engagement(format!(
                "HTTP {} for {}: {}",
                status, url, body
            )));
        }

        let counts: SharedCountResponse = response
            .json()
            .await
            .map_err(|e| Error::Engagement(format!("bad response for {}: {}", url, e)))?;
        tracing::debug!(url, facebook = ?counts.facebook, "engagement fetched");
        Ok(Engagement {
            shares: counts.facebook.share_count,
            comments: counts.facebook.comment_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_facebook_counts() {
        let raw = r#"{"Facebook": {"share_count": 42, "comment_count": 7}}"#;
        let parsed: SharedCountResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.facebook.share_count, Some(42));
        assert_eq!(parsed.facebook.comment_count, Some(7));
    }

    #[test]
    fn null_counts_pass_through() {
        let raw = r#"{"Facebook": {"share_count": null, "comment_count": null}}"#;
        let parsed: SharedCountResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.facebook.share_count, None);
        assert_eq!(parsed.facebook.comment_count, None);
    }

    #[test]
    fn rejects_invalid_base_url() {
        let config = SharedCountConfig {
            base_url: "not a url".to_string(),
            api_key: "k".to_string(),
        };
        assert!(SharedCountClient::new(config).is_err());
    }
}
