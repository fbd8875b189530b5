//! Provider Client Infrastructure
//!
//! Rate limiting, retry, response caching and error folding shared by every
//! external data source adapter.

pub mod cache;
pub mod error;
pub mod http;
pub mod rate_limiter;

pub use cache::{CacheEntry, CacheStats, CacheStore};
pub use error::{fold_stage, ProviderError};
pub use http::{classify, Disposition, ProviderHttp, RawResponse, RetryPolicy};
pub use rate_limiter::{RateLimitRule, RateLimitState, RateLimiter};
