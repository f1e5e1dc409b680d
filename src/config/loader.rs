use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};

use super::{validator, Config, DemoConfig};

/// Build the configuration from the process environment. Only `FMP_API_KEY`
/// is required; every other variable falls back to its default.
pub fn from_env() -> Result<Config> {
    let key = env::var("FMP_API_KEY")
        .map_err(|_| AppError::message("FMP_API_KEY is not set. Configure the environment."))?;

    let mut config = Config::with_key(key);

    if let Ok(base) = env::var("FMP_API_BASE") {
        config.api.base_url = base.trim_end_matches('/').to_string();
    }
    config.api.resolve_isin = env_flag("FMP_RESOLVE_ISIN", config.api.resolve_isin);
    config.api.daily_limit = env_parse("FMP_DAILY_LIMIT", config.api.daily_limit)?;
    if let Ok(path) = env::var("FMP_CACHE_PATH") {
        let trimmed = path.trim();
        config.api.cache_path = if trimmed.is_empty() {
            None
        } else {
            Some(PathBuf::from(trimmed))
        };
    }

    config.enrich.max_tickers = env_parse("ENRICH_MAX_TICKERS", config.enrich.max_tickers)?;
    config.enrich.total_max = env_parse("ENRICH_TOTAL_MAX", config.enrich.total_max)?;
    config.enrich.batch_size = env_parse("ENRICH_BATCH_SIZE", config.enrich.batch_size)?;
    config.enrich.batch_delay = env_seconds("ENRICH_BATCH_DELAY", config.enrich.batch_delay)?;

    config.pipeline.chunk_size = env_parse("CHUNK_SIZE", config.pipeline.chunk_size)?;
    if let Ok(path) = env::var("PROCESSED_PATH") {
        config.pipeline.output_path = PathBuf::from(path);
    }

    if env_flag("DEMO_MODE", false) {
        config.pipeline.demo = Some(demo_from_env());
    }

    validator::validate(&config)?;
    Ok(config)
}

fn demo_from_env() -> DemoConfig {
    let mut demo = DemoConfig::default();
    if let Ok(value) = env::var("DEMO_LAST_PRICE") {
        demo.last_price = value;
    }
    if let Ok(value) = env::var("DEMO_SECTOR") {
        demo.sector = value;
    }
    if let Ok(value) = env::var("DEMO_INDUSTRY") {
        demo.industry = value;
    }
    if let Ok(value) = env::var("DEMO_MARKET_CAP") {
        demo.market_cap = value;
    }
    if let Ok(value) = env::var("DEMO_PE_RATIO") {
        demo.pe_ratio = value;
    }
    if let Ok(value) = env::var("DEMO_SECTORS") {
        let sectors: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect();
        if !sectors.is_empty() {
            demo.sectors = sectors;
        }
    }
    demo
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| AppError::message(format!("Invalid value for {}: {}", name, value))),
        Err(_) => Ok(default),
    }
}

fn env_seconds(name: &str, default: Duration) -> Result<Duration> {
    match env::var(name) {
        Ok(value) => {
            let secs: f64 = value
                .trim()
                .parse()
                .map_err(|_| AppError::message(format!("Invalid value for {}: {}", name, value)))?;
            if !secs.is_finite() || secs < 0.0 {
                return Err(AppError::message(format!(
                    "Invalid value for {}: {}",
                    name, value
                )));
            }
            Ok(Duration::from_secs_f64(secs))
        }
        Err(_) => Ok(default),
    }
}
