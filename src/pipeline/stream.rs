use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use csv::StringRecord;
use futures::future;
use log::{info, warn};

use crate::config::Config;
use crate::enrich::{BatchScheduler, EnrichmentFetcher, LookupCache, RunBudget};
use crate::error::{Context, Result};
use crate::pipeline::demo::DemoDefaults;
use crate::pipeline::mapper;
use crate::records::EnrichedChunk;
use crate::utils::ensure_parent_dir;

/// Excel-friendly UTF-8 marker written ahead of the output CSV.
const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// One chunk of raw CSV records, all sharing the input's header row.
struct RawChunk {
    headers: StringRecord,
    records: Vec<StringRecord>,
}

/// Drives a full run: splits the input CSV into chunks, processes every chunk
/// concurrently on one cooperative task set, and serializes the results to a
/// single output file in original chunk order.
pub struct Pipeline {
    scheduler: BatchScheduler,
    chunk_size: usize,
    output_path: PathBuf,
    demo: Option<DemoDefaults>,
}

impl Pipeline {
    pub fn new(config: &Config) -> Result<Self> {
        crate::config::validator::validate(config)?;

        let cache = Arc::new(LookupCache::load(
            config.api.cache_path.clone(),
            config.api.daily_limit,
        ));
        let fetcher = Arc::new(EnrichmentFetcher::new(config.api.clone(), cache)?);
        let budget = if config.enrich.total_max > 0 {
            Some(RunBudget::new(config.enrich.total_max))
        } else {
            None
        };
        let scheduler = BatchScheduler::new(fetcher, config.enrich.clone(), budget);

        Ok(Self {
            scheduler,
            chunk_size: config.pipeline.chunk_size,
            output_path: config.pipeline.output_path.clone(),
            demo: config.pipeline.demo.clone().map(DemoDefaults::new),
        })
    }

    /// Process a raw CSV document. Returns the output path, or `None` when
    /// the input cannot be parsed ("no new data"). Failing chunks are logged
    /// and contribute zero rows; they never abort the run.
    pub async fn process_stream(&self, content: &[u8]) -> Result<Option<PathBuf>> {
        info!("Processing CSV stream in chunks of {} rows", self.chunk_size);

        let chunks = match parse_chunks(content, self.chunk_size) {
            Ok(chunks) => chunks,
            Err(err) => {
                warn!("Failed to read input CSV: {}", err);
                return Ok(None);
            }
        };

        let tasks = chunks.iter().map(|chunk| self.process_chunk(chunk));
        let results = future::join_all(tasks).await;

        let path = self.write_output(&results)?;
        info!("Enriched CSV written to {}", path.display());
        Ok(Some(path))
    }

    async fn process_chunk(&self, chunk: &RawChunk) -> EnrichedChunk {
        match self.try_process_chunk(chunk).await {
            Ok(enriched) => enriched,
            Err(err) => {
                warn!("Failed to process chunk: {}", err);
                EnrichedChunk::empty()
            }
        }
    }

    async fn try_process_chunk(&self, chunk: &RawChunk) -> Result<EnrichedChunk> {
        let rows = mapper::map_chunk(&chunk.headers, &chunk.records);
        let enrichment = self.scheduler.enrich_rows(&rows).await;

        let mut enriched = EnrichedChunk { rows, enrichment };
        if let Some(demo) = &self.demo {
            demo.apply(&mut enriched);
        }
        Ok(enriched)
    }

    /// Write all chunk results in original chunk order. The header comes from
    /// the first non-empty chunk; empty results are skipped entirely.
    fn write_output(&self, chunks: &[EnrichedChunk]) -> Result<PathBuf> {
        ensure_parent_dir(&self.output_path)?;

        let mut file = File::create(&self.output_path).with_context(|| {
            format!("Failed to create output file {}", self.output_path.display())
        })?;
        file.write_all(UTF8_BOM)?;

        let mut writer = csv::Writer::from_writer(file);
        let mut header_written = false;
        for chunk in chunks {
            if chunk.is_empty() {
                continue;
            }
            chunk.write_records(&mut writer, !header_written)?;
            header_written = true;
        }
        writer.flush()?;

        Ok(self.output_path.clone())
    }
}

/// Split the raw document into ≤ `chunk_size` row chunks. Any CSV error
/// aborts the whole parse; the caller decides what that means for the run.
fn parse_chunks(content: &[u8], chunk_size: usize) -> Result<Vec<RawChunk>> {
    let mut reader = csv::Reader::from_reader(content);
    let headers = reader
        .headers()
        .context("Input CSV has no readable header row")?
        .clone();

    let mut chunks = Vec::new();
    let mut current: Vec<StringRecord> = Vec::new();
    for record in reader.records() {
        current.push(record?);
        if current.len() == chunk_size {
            chunks.push(RawChunk {
                headers: headers.clone(),
                records: std::mem::take(&mut current),
            });
        }
    }
    if !current.is_empty() {
        chunks.push(RawChunk {
            headers,
            records: current,
        });
    }

    Ok(chunks)
}
