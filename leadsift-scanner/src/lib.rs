pub mod cache;
pub mod crawler;
pub mod error;
pub mod fetcher;
pub mod links;
pub mod result;
pub mod robots;

pub use cache::PageCache;
pub use crawler::{CrawlOptions, DomainCrawler};
pub use error::{Result, ScanError};
pub use fetcher::{
    BrowserlessStrategy, FetchOptions, FetchStats, FetchStatsSnapshot, FetchStrategy,
    HttpStrategy, PageFetcher,
};
pub use result::PageResult;
pub use robots::{AllowAll, AllowPolicy, RobotsPolicy};
