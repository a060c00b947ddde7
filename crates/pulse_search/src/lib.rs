pub mod backends;

pub use backends::elastic::{ElasticBackend, EsConfig};
pub use backends::memory::{MemoryBackend, ViewEvent};

pub mod prelude {
    pub use super::backends::elastic::{ElasticBackend, EsConfig};
    pub use super::backends::memory::MemoryBackend;
    pub use pulse_core::{AnalyticsIndex, ArticleIndex, ReportingIndex};
}
