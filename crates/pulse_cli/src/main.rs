use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tracing::info;

use pulse_core::{Error, Result, TimeWindow};
use pulse_engagement::{SharedCountClient, SharedCountConfig, DEFAULT_BASE_URL};
use pulse_pipeline::{Pipeline, PipelineConfig};
use pulse_search::{ElasticBackend, EsConfig};

/// Computes social-engagement metrics for recently viewed articles and
/// writes them to the reporting index. Meant to run from a scheduler;
/// re-running the same window overwrites the same documents.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Window start override, format YYYY-MM-DD:HH (UTC). Defaults to
    /// thirty minutes before now.
    start: Option<String>,

    /// Search backend base URL
    #[arg(long, default_value = "http://localhost:9200")]
    search_url: String,

    /// Analytics (page-view event) index name
    #[arg(long, default_value = "pageviews")]
    analytics_index: String,

    /// Article metadata index name
    #[arg(long, default_value = "articles")]
    articles_index: String,

    /// Reporting index name
    #[arg(long, default_value = "social_engagements")]
    reporting_index: String,

    /// Base URL prepended to article slugs
    #[arg(long, default_value = "https://content.example/posts/")]
    article_base_url: String,

    /// Engagement API endpoint
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    engagement_url: String,

    /// Minimum in-window views for an article to be selected
    #[arg(long, default_value_t = 5)]
    min_views: u64,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let now = Utc::now();
    let window = match &cli.start {
        Some(start) => TimeWindow::starting_at(TimeWindow::parse_start(start)?, now),
        None => TimeWindow::around(now),
    };

    let search = Arc::new(ElasticBackend::new(EsConfig {
        url: cli.search_url,
        username: env_var("PULSE_SEARCH_USERNAME"),
        password: env_var("PULSE_SEARCH_PASSWORD"),
        analytics_index: cli.analytics_index,
        articles_index: cli.articles_index,
        reporting_index: cli.reporting_index,
        timeout: Duration::from_secs(30),
        retry_on_timeout: true,
    })?);

    let api_key = env_var("PULSE_ENGAGEMENT_API_KEY")
        .ok_or_else(|| Error::Engagement("PULSE_ENGAGEMENT_API_KEY is not set".to_string()))?;
    let engagement = Arc::new(SharedCountClient::new(SharedCountConfig {
        base_url: cli.engagement_url,
        api_key,
    })?);

    let pipeline = Pipeline::new(
        search.clone(),
        search.clone(),
        search,
        engagement,
        PipelineConfig {
            min_view_count: cli.min_views,
            article_base_url: cli.article_base_url,
            ..PipelineConfig::default()
        },
    );

    let summary = pipeline.run(window).await?;
    info!(
        selected = summary.selected,
        dropped = summary.dropped,
        written = summary.written,
        "run complete"
    );
    Ok(())
}
