use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future;
use tokio::time::sleep;

use crate::config::EnrichConfig;
use crate::enrich::{symbols, EnrichmentFetcher};
use crate::records::{EnrichmentResult, Row};

/// Shared pool of enrichment slots for one run. Chunks execute concurrently;
/// the pool keeps them from collectively exceeding the global cap. This caps
/// symbols per run, one level above the cache's daily request quota.
#[derive(Debug)]
pub struct RunBudget {
    remaining: Mutex<usize>,
}

impl RunBudget {
    pub fn new(total: usize) -> Arc<Self> {
        Arc::new(Self {
            remaining: Mutex::new(total),
        })
    }

    /// Grant up to `want` slots, decrementing the pool.
    fn take(&self, want: usize) -> usize {
        let mut remaining = self.remaining.lock().unwrap();
        let granted = want.min(*remaining);
        *remaining -= granted;
        granted
    }
}

/// Partitions a chunk's eligible symbols into fixed-size batches, fans each
/// batch out concurrently, and pauses between batches to smooth the outbound
/// request rate.
pub struct BatchScheduler {
    fetcher: Arc<EnrichmentFetcher>,
    settings: EnrichConfig,
    budget: Option<Arc<RunBudget>>,
}

impl BatchScheduler {
    pub fn new(
        fetcher: Arc<EnrichmentFetcher>,
        settings: EnrichConfig,
        budget: Option<Arc<RunBudget>>,
    ) -> Self {
        Self {
            fetcher,
            settings,
            budget,
        }
    }

    /// Enrich one chunk of rows. The result is aligned with the input: one
    /// entry per row, null-valued wherever the row had no resolvable symbol
    /// or fell outside a cap.
    pub async fn enrich_rows(&self, rows: &[Row]) -> Vec<EnrichmentResult> {
        let mut results = vec![EnrichmentResult::default(); rows.len()];

        // Eligible rows in input order, stopping at the per-run ticker cap.
        let resolve_isin = self.fetcher.resolves_isin();
        let mut eligible: Vec<(usize, String)> = Vec::new();
        for (idx, row) in rows.iter().enumerate() {
            if eligible.len() >= self.settings.max_tickers {
                break;
            }
            let candidate = symbols::candidate_for_row(
                row.ticker.as_deref(),
                row.source_link.as_deref(),
                resolve_isin,
            );
            if let Some(symbol) = candidate {
                eligible.push((idx, symbol));
            }
        }

        // Many rows can share one ticker; look each symbol up once.
        let mut order: Vec<String> = Vec::new();
        let mut row_indices: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, symbol) in eligible {
            if !row_indices.contains_key(&symbol) {
                order.push(symbol.clone());
            }
            row_indices.entry(symbol).or_default().push(idx);
        }

        if let Some(budget) = &self.budget {
            let granted = budget.take(order.len());
            order.truncate(granted);
        }

        let batch_size = self.settings.batch_size.max(1);
        for (batch_no, batch) in order.chunks(batch_size).enumerate() {
            if batch_no > 0 {
                sleep(self.settings.batch_delay).await;
            }

            let lookups = batch.iter().map(|symbol| self.fetcher.fetch(symbol));
            let batch_results = future::join_all(lookups).await;

            for (symbol, result) in batch.iter().zip(batch_results) {
                if let Some(indices) = row_indices.get(symbol) {
                    for &idx in indices {
                        results[idx] = result.clone();
                    }
                }
            }
        }

        results
    }
}
