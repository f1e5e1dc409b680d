use std::path::PathBuf;
use std::time::Duration;

pub mod loader;
pub mod validator;

pub use loader::from_env;

pub const DEFAULT_API_BASE: &str = "https://financialmodelingprep.com/stable";
pub const DEFAULT_DAILY_LIMIT: i64 = 250;
pub const DEFAULT_CACHE_PATH: &str = "data/cache/fmp_cache.json";
pub const DEFAULT_OUTPUT_PATH: &str = "data/processed/listings_enriched.csv";
pub const DEFAULT_MAX_TICKERS: usize = 20;
pub const DEFAULT_BATCH_SIZE: usize = 20;
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(50);
pub const DEFAULT_CHUNK_SIZE: usize = 200;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Connection and quota settings for the market-data API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub key: String,
    /// Endpoint prefix without a trailing slash.
    pub base_url: String,
    /// Resolve ISIN-shaped symbols through the search endpoint before lookup.
    pub resolve_isin: bool,
    /// Maximum outbound requests per UTC day; zero or negative disables the cap.
    pub daily_limit: i64,
    /// Cache file location; `None` keeps the cache in memory only.
    pub cache_path: Option<PathBuf>,
    pub timeout: Duration,
    pub retries: u32,
    pub retry_delay: Duration,
}

/// Per-run shaping of the enrichment fan-out.
#[derive(Debug, Clone)]
pub struct EnrichConfig {
    /// Rows considered for enrichment per chunk.
    pub max_tickers: usize,
    /// Global cap on symbols enriched across all chunks of a run; zero disables.
    pub total_max: usize,
    pub batch_size: usize,
    pub batch_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    pub output_path: PathBuf,
    pub demo: Option<DemoConfig>,
}

/// Placeholder values used when demo mode fills gaps left by enrichment.
#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub last_price: String,
    pub sector: String,
    pub industry: String,
    pub market_cap: String,
    pub pe_ratio: String,
    pub sectors: Vec<String>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            last_price: "EUR 10.00".to_string(),
            sector: "Technology".to_string(),
            industry: "Software".to_string(),
            market_cap: "1000000000".to_string(),
            pe_ratio: "18.5".to_string(),
            sectors: [
                "Technology",
                "Healthcare",
                "Finance",
                "Energy",
                "Consumer",
                "Industrial",
                "Utilities",
                "Materials",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub enrich: EnrichConfig,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Default configuration for the given API key; every field can be
    /// overridden before handing the config to the pipeline.
    pub fn with_key(key: impl Into<String>) -> Self {
        Config {
            api: ApiConfig {
                key: key.into(),
                base_url: DEFAULT_API_BASE.to_string(),
                resolve_isin: false,
                daily_limit: DEFAULT_DAILY_LIMIT,
                cache_path: Some(PathBuf::from(DEFAULT_CACHE_PATH)),
                timeout: DEFAULT_TIMEOUT,
                retries: DEFAULT_RETRIES,
                retry_delay: DEFAULT_RETRY_DELAY,
            },
            enrich: EnrichConfig {
                max_tickers: DEFAULT_MAX_TICKERS,
                total_max: 0,
                batch_size: DEFAULT_BATCH_SIZE,
                batch_delay: DEFAULT_BATCH_DELAY,
            },
            pipeline: PipelineConfig {
                chunk_size: DEFAULT_CHUNK_SIZE,
                output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
                demo: None,
            },
        }
    }
}
