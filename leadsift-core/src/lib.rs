pub mod ai;
pub mod config;
pub mod domain;
pub mod email;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod relevance;
pub mod sink;
pub mod snowball;

pub use ai::{ExternalEmail, ExternalEmailSource, NoExternalSource, OpenAiEmailSource};
pub use config::{
    ExternalExtractionConfig, FetchMode, MarketProfile, PipelineConfig, SnowballConfig,
};
pub use domain::{RegionFilter, normalize_domain};
pub use email::EmailExtractor;
pub use error::{LeadError, Result};
pub use model::{DomainRecord, EmailCandidate, EmailType, ExtractedBy, LeadRow};
pub use pipeline::{DomainOutcome, DomainState, Pipeline, ProgressCallback};
pub use relevance::{Relevance, RelevanceScorer};
pub use sink::{ResultSink, RunLog, RunSummary};
pub use snowball::SnowballExpander;
