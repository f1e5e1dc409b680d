use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::{Context, Result};

/// Output header, mapped schema columns first, enrichment columns last.
pub const MAPPED_HEADERS: [&str; 7] = [
    "Name",
    "Ticker",
    "Market",
    "LastPrice",
    "ChangePercent",
    "Timestamp",
    "SourceLink",
];

pub const ENRICHMENT_HEADERS: [&str; 4] = ["MarketCap", "Sector", "Industry", "PERatio"];

/// One listed instrument after column mapping. Fields mirror the internal
/// schema; anything the source CSV did not carry stays `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    pub name: Option<String>,
    pub ticker: Option<String>,
    pub market: Option<String>,
    pub last_price: Option<String>,
    pub change_percent: Option<String>,
    pub timestamp: Option<String>,
    pub source_link: Option<String>,
}

/// Financial metadata for one resolved symbol. Field names match the cache
/// file and the output CSV columns. MarketCap is kept as a string because the
/// upstream payload mixes integers and decimal notations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    #[serde(rename = "MarketCap")]
    pub market_cap: Option<String>,
    #[serde(rename = "Sector")]
    pub sector: Option<String>,
    #[serde(rename = "Industry")]
    pub industry: Option<String>,
    #[serde(rename = "PERatio")]
    pub pe_ratio: Option<String>,
}

impl EnrichmentResult {
    pub fn is_empty(&self) -> bool {
        self.market_cap.is_none()
            && self.sector.is_none()
            && self.industry.is_none()
            && self.pe_ratio.is_none()
    }
}

/// A processed chunk: mapped rows paired position-by-position with their
/// enrichment results.
#[derive(Debug, Default)]
pub struct EnrichedChunk {
    pub rows: Vec<Row>,
    pub enrichment: Vec<EnrichmentResult>,
}

impl EnrichedChunk {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append this chunk to a CSV writer, optionally emitting the header row.
    pub fn write_records<W: Write>(
        &self,
        writer: &mut csv::Writer<W>,
        include_header: bool,
    ) -> Result<()> {
        if include_header {
            let header: Vec<&str> = MAPPED_HEADERS
                .iter()
                .chain(ENRICHMENT_HEADERS.iter())
                .copied()
                .collect();
            writer
                .write_record(&header)
                .context("Failed to write output header")?;
        }

        for (row, enrichment) in self.rows.iter().zip(self.enrichment.iter()) {
            writer.write_record([
                field(&row.name),
                field(&row.ticker),
                field(&row.market),
                field(&row.last_price),
                field(&row.change_percent),
                field(&row.timestamp),
                field(&row.source_link),
                field(&enrichment.market_cap),
                field(&enrichment.sector),
                field(&enrichment.industry),
                field(&enrichment.pe_ratio),
            ])?;
        }

        Ok(())
    }
}

fn field(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}
