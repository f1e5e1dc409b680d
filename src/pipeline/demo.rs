use crate::config::DemoConfig;
use crate::records::{EnrichedChunk, EnrichmentResult, Row};

/// Industries rotated per sector when demo mode invents one.
const SECTOR_INDUSTRIES: &[(&str, &[&str])] = &[
    ("Technology", &["Software", "Semiconductors", "IT Services"]),
    ("Healthcare", &["Pharma", "Biotech", "Medical Devices"]),
    ("Finance", &["Banking", "Insurance", "Asset Management"]),
    ("Energy", &["Oil & Gas", "Renewables", "Utilities Services"]),
    ("Consumer", &["Retail", "Food & Beverage", "Leisure"]),
    ("Industrial", &["Manufacturing", "Logistics", "Aerospace"]),
    ("Utilities", &["Power", "Water", "Gas"]),
    ("Materials", &["Chemicals", "Metals", "Construction"]),
];

/// Nordic venues quote in NOK; everything else the crawler covers is EUR.
const NOK_MARKETS: &[&str] = &["XOSL", "MERK", "XOAS"];

/// Fills the gaps enrichment left behind with deterministic, plausible
/// values so demo runs produce a fully populated output. Only missing or
/// placeholder-valued fields are touched; real data always survives.
pub struct DemoDefaults {
    config: DemoConfig,
}

impl DemoDefaults {
    pub fn new(config: DemoConfig) -> Self {
        Self { config }
    }

    pub fn apply(&self, chunk: &mut EnrichedChunk) {
        for (row, enrichment) in chunk.rows.iter_mut().zip(chunk.enrichment.iter_mut()) {
            let seed = seed_for(row);
            self.fill_row(row, seed);
            self.fill_enrichment(enrichment, seed);
        }
    }

    fn fill_row(&self, row: &mut Row, seed: u64) {
        if needs_fill(row.last_price.as_deref(), &self.config.last_price) {
            row.last_price = Some(demo_price(seed, row.market.as_deref()));
        }
    }

    fn fill_enrichment(&self, enrichment: &mut EnrichmentResult, seed: u64) {
        if needs_fill(enrichment.sector.as_deref(), &self.config.sector) {
            enrichment.sector = Some(
                pick(&self.config.sectors, seed, 0)
                    .unwrap_or_else(|| self.config.sector.clone()),
            );
        }

        if needs_fill(enrichment.industry.as_deref(), &self.config.industry) {
            let sector = enrichment
                .sector
                .clone()
                .unwrap_or_else(|| self.config.sector.clone());
            let industries = industries_for(&sector);
            enrichment.industry = Some(
                pick_str(industries, seed, 3)
                    .unwrap_or_else(|| self.config.industry.clone()),
            );
        }

        if needs_fill(enrichment.market_cap.as_deref(), &self.config.market_cap) {
            enrichment.market_cap = Some(demo_market_cap(seed));
        }

        if needs_fill(enrichment.pe_ratio.as_deref(), &self.config.pe_ratio) {
            enrichment.pe_ratio = Some(demo_pe_ratio(seed));
        }
    }
}

/// Stable per-row seed derived from ticker and name, so repeated runs fill
/// the same values.
fn seed_for(row: &Row) -> u64 {
    let key = format!(
        "{}-{}",
        row.ticker.as_deref().unwrap_or(""),
        row.name.as_deref().unwrap_or("")
    );
    let digest = blake3::hash(key.as_bytes());
    let mut prefix = [0u8; 4];
    prefix.copy_from_slice(&digest.as_bytes()[..4]);
    u32::from_be_bytes(prefix) as u64
}

fn is_missing(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(text) => {
            let trimmed = text.trim();
            trimmed.is_empty() || matches!(trimmed, "-" | "--" | "nan" | "None")
        }
    }
}

fn needs_fill(value: Option<&str>, placeholder: &str) -> bool {
    is_missing(value) || value.map(str::trim) == Some(placeholder.trim())
}

fn pick(options: &[String], seed: u64, offset: u64) -> Option<String> {
    if options.is_empty() {
        return None;
    }
    let idx = ((seed + offset) % options.len() as u64) as usize;
    Some(options[idx].clone())
}

fn pick_str(options: &[&str], seed: u64, offset: u64) -> Option<String> {
    if options.is_empty() {
        return None;
    }
    let idx = ((seed + offset) % options.len() as u64) as usize;
    Some(options[idx].to_string())
}

fn industries_for(sector: &str) -> &'static [&'static str] {
    SECTOR_INDUSTRIES
        .iter()
        .find(|(name, _)| *name == sector)
        .map(|(_, industries)| *industries)
        .unwrap_or(&[])
}

fn demo_market_cap(seed: u64) -> String {
    let cap = 500_000_000u64 + (seed % 900) * 25_000_000;
    cap.to_string()
}

fn demo_pe_ratio(seed: u64) -> String {
    let pe = 8.0 + (seed % 260) as f64 / 10.0;
    format!("{:.1}", pe)
}

fn demo_currency(market: Option<&str>) -> &'static str {
    let code = market.unwrap_or("").trim().to_uppercase();
    if NOK_MARKETS.contains(&code.as_str()) {
        "NOK"
    } else {
        "EUR"
    }
}

fn demo_price(seed: u64, market: Option<&str>) -> String {
    let price = 5.0 + (seed % 5000) as f64 / 100.0;
    let text = format!("{:.2}", price).replace('.', ",");
    format!("{} {}", demo_currency(market), text)
}
