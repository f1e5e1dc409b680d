use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::records::EnrichmentResult;
use crate::utils::{ensure_parent_dir, utc_day_key};

/// On-disk layout of the cache file. Read fully on startup, rewritten fully
/// after every mutation.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    count: u64,
    #[serde(default)]
    api: HashMap<String, EnrichmentResult>,
    #[serde(default)]
    isin: HashMap<String, String>,
}

#[derive(Debug)]
struct CacheState {
    api: HashMap<String, EnrichmentResult>,
    isin: HashMap<String, String>,
    date: String,
    count: u64,
    limit_warned: bool,
}

/// Durable lookup cache shared by every coroutine of a run: symbol→result and
/// ISIN→symbol maps plus the daily request counter. All access goes through
/// one mutex; critical sections only touch memory and the cache file, never
/// the network, so the lock is held only for short synchronous work.
#[derive(Debug)]
pub struct LookupCache {
    path: Option<PathBuf>,
    daily_limit: i64,
    state: Mutex<CacheState>,
}

impl LookupCache {
    /// Load previously cached lookups and today's request count from disk.
    /// A missing or unreadable file starts from an empty state.
    pub fn load(path: Option<PathBuf>, daily_limit: i64) -> Self {
        let mut file = CacheFile::default();
        if let Some(cache_path) = &path {
            if let Ok(contents) = fs::read_to_string(cache_path) {
                match serde_json::from_str::<CacheFile>(&contents) {
                    Ok(parsed) => file = parsed,
                    Err(err) => warn!(
                        "Ignoring malformed cache file {}: {}",
                        cache_path.display(),
                        err
                    ),
                }
            }
        }

        let today = utc_day_key();
        let date = file.date.unwrap_or_else(|| today.clone());
        let count = if date == today { file.count } else { 0 };

        Self {
            path,
            daily_limit,
            state: Mutex::new(CacheState {
                api: file.api,
                isin: file.isin,
                date: today,
                count,
                limit_warned: false,
            }),
        }
    }

    /// Claim one unit of today's request budget. Returns `false` once the
    /// daily limit is exhausted; the exhaustion notice is logged at most once
    /// per process. A limit of zero or below disables the cap.
    pub fn reserve_slot(&self) -> bool {
        if self.daily_limit <= 0 {
            return true;
        }

        let mut state = self.state.lock().unwrap();
        let today = utc_day_key();
        if state.date != today {
            state.date = today;
            state.count = 0;
        }

        if state.count >= self.daily_limit as u64 {
            if !state.limit_warned {
                warn!("Daily API request limit reached. Enrichment suspended until tomorrow.");
                state.limit_warned = true;
            }
            return false;
        }

        state.count += 1;
        self.persist(&state);
        true
    }

    pub fn get(&self, symbol: &str) -> Option<EnrichmentResult> {
        self.state.lock().unwrap().api.get(symbol).cloned()
    }

    pub fn put(&self, symbol: &str, result: &EnrichmentResult) {
        let mut state = self.state.lock().unwrap();
        state.api.insert(symbol.to_string(), result.clone());
        self.persist(&state);
    }

    pub fn get_isin(&self, isin: &str) -> Option<String> {
        self.state.lock().unwrap().isin.get(isin).cloned()
    }

    pub fn put_isin(&self, isin: &str, symbol: &str) {
        let mut state = self.state.lock().unwrap();
        state.isin.insert(isin.to_string(), symbol.to_string());
        self.persist(&state);
    }

    /// Requests reserved against today's budget.
    pub fn requests_today(&self) -> u64 {
        self.state.lock().unwrap().count
    }

    /// Write-through persistence. A write failure degrades to a warning so a
    /// full disk cannot take the enrichment run down.
    fn persist(&self, state: &CacheState) {
        let Some(path) = &self.path else {
            return;
        };

        let file = CacheFile {
            date: Some(state.date.clone()),
            count: state.count,
            api: state.api.clone(),
            isin: state.isin.clone(),
        };

        let result = ensure_parent_dir(path).and_then(|_| {
            let json = serde_json::to_string_pretty(&file)?;
            fs::write(path, json)?;
            Ok(())
        });

        if let Err(err) = result {
            warn!("Failed to persist cache to {}: {}", path.display(), err);
        }
    }
}
