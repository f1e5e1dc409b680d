pub mod cache;
pub mod fetcher;
pub mod scheduler;
pub mod symbols;

pub use cache::LookupCache;
pub use fetcher::{EnrichmentFetcher, RetryPolicy};
pub use scheduler::{BatchScheduler, RunBudget};
